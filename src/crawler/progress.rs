//! In-memory progress of running harvests

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::models::ProgressSnapshot;

/// Session id to latest snapshot, shared by every crawl task
///
/// Cloning shares the same map. Readers always get an owned copy.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    inner: Arc<RwLock<HashMap<String, ProgressSnapshot>>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot for `session_id`
    pub fn set(&self, session_id: &str, snapshot: ProgressSnapshot) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session_id.to_string(), snapshot);
    }

    pub fn get(&self, session_id: &str) -> Option<ProgressSnapshot> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned()
    }

    /// Drop every snapshot
    pub fn reset(&self) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
