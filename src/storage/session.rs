//! Harvest session lifecycle
//!
//! Sessions move `running -> complete` or `running -> error` exactly once.
//! Updates against a terminal session are dropped with a warning.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::models::{HarvestSession, RecordType, SessionUpdate};
use crate::storage::repository::SharedRepository;

const MAX_ID_ATTEMPTS: u32 = 16;

/// Build the base session id for a harvest started at `at`
pub fn session_id(provider: &str, record_type: RecordType, server: &str, at: &DateTime<Utc>) -> String {
    format!("{provider}_{record_type}_{server}_{}", at.timestamp_millis())
}

/// Creates and updates harvest sessions
#[derive(Clone)]
pub struct SessionStore {
    repo: SharedRepository,
}

impl SessionStore {
    pub fn new(repo: SharedRepository) -> Self {
        Self { repo }
    }

    /// Create a running session and return its id
    ///
    /// A colliding id gets a numeric suffix.
    pub fn create(&self, server: &str, record_type: RecordType, provider: &str) -> Result<String> {
        let mut session = HarvestSession::new("", server, record_type, provider);
        let base = session_id(provider, record_type, server, &session.started_at);

        for attempt in 0..MAX_ID_ATTEMPTS {
            session.id = if attempt == 0 {
                base.clone()
            } else {
                format!("{base}_{attempt}")
            };

            if self.repo.insert_session(&session)? {
                tracing::info!(
                    session = %session.id,
                    server,
                    record_type = %record_type,
                    provider,
                    "Harvest session created"
                );
                return Ok(session.id);
            }
        }

        Err(Error::other(format!(
            "Could not allocate a unique session id for {base}"
        )))
    }

    /// Apply a partial update
    ///
    /// Returns `Ok(false)` when the session is unknown or already terminal.
    pub fn update(&self, id: &str, update: SessionUpdate) -> Result<bool> {
        let applied = self.repo.update_session(id, &update)?;
        if !applied && !update.is_empty() {
            tracing::warn!(session = %id, ?update, "Session update ignored (unknown or finished session)");
        }
        Ok(applied)
    }

    pub fn get(&self, id: &str) -> Result<Option<HarvestSession>> {
        self.repo.get_session(id)
    }

    pub fn recent(&self, limit: usize) -> Result<Vec<HarvestSession>> {
        self.repo.recent_sessions(limit)
    }
}
