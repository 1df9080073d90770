// Core data structures for the harvester

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// DNS record type a reverse lookup is keyed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Mx,
    Ns,
}

impl RecordType {
    /// Get string representation (also the column and filter key)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mx => "mx",
            Self::Ns => "ns",
        }
    }

    /// Create from string, case-insensitive
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "mx" => Some(Self::Mx),
            "ns" => Some(Self::Ns),
            _ => None,
        }
    }

    /// Get all record types
    pub fn all() -> [Self; 2] {
        [Self::Mx, Self::Ns]
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RecordType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown record type: {s} (expected mx or ns)"))
    }
}

/// Lifecycle state of a harvest session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Complete,
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }

    /// Unknown values read back from storage are treated as `Error`
    pub fn from_db(s: &str) -> Self {
        match s {
            "running" => Self::Running,
            "complete" => Self::Complete,
            _ => Self::Error,
        }
    }

    /// Terminal states are never left again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One harvest invocation and its outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestSession {
    pub id: String,
    pub server: String,
    pub record_type: RecordType,
    pub provider: String,
    pub status: SessionStatus,
    pub total_domains: u64,
    pub pages_fetched: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl HarvestSession {
    /// Fresh running session with zeroed counters
    pub fn new(
        id: impl Into<String>,
        server: impl Into<String>,
        record_type: RecordType,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            server: server.into(),
            record_type,
            provider: provider.into(),
            status: SessionStatus::Running,
            total_domains: 0,
            pages_fetched: 0,
            started_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// Partial session update; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionUpdate {
    pub status: Option<SessionStatus>,
    pub total_domains: Option<u64>,
    pub pages_fetched: Option<u64>,
}

impl SessionUpdate {
    /// Progress after a productive page
    pub fn progress(pages_fetched: u64, total_domains: u64) -> Self {
        Self {
            status: None,
            total_domains: Some(total_domains),
            pages_fetched: Some(pages_fetched),
        }
    }

    /// Normal termination with the final running total
    pub fn complete(total_domains: u64) -> Self {
        Self {
            status: Some(SessionStatus::Complete),
            total_domains: Some(total_domains),
            pages_fetched: None,
        }
    }

    /// Abnormal termination
    pub fn failed() -> Self {
        Self {
            status: Some(SessionStatus::Error),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.total_domains.is_none() && self.pages_fetched.is_none()
    }
}

/// Persisted domain row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainRecord {
    pub id: i64,
    pub domain: String,
    pub mx: Option<String>,
    pub ns: Option<String>,
    pub provider: String,
    pub session_id: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

/// Domain row waiting to be inserted
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NewDomainRecord {
    pub domain: String,
    pub mx: Option<String>,
    pub ns: Option<String>,
    pub provider: String,
    pub session_id: Option<String>,
}

impl NewDomainRecord {
    /// Build a record for `domain` discovered behind `server`
    pub fn new(
        domain: impl Into<String>,
        record_type: RecordType,
        server: &str,
        provider: impl Into<String>,
    ) -> Self {
        let (mx, ns) = match record_type {
            RecordType::Mx => (Some(server.to_string()), None),
            RecordType::Ns => (None, Some(server.to_string())),
        };
        Self {
            domain: domain.into(),
            mx,
            ns,
            provider: provider.into(),
            session_id: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Composite identity used for deduplication
    pub fn key(&self) -> RecordKey {
        RecordKey {
            domain: self.domain.clone(),
            mx: self.mx.clone(),
            ns: self.ns.clone(),
            provider: self.provider.clone(),
        }
    }
}

/// Uniqueness key (domain, mx, ns, provider)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub domain: String,
    pub mx: Option<String>,
    pub ns: Option<String>,
    pub provider: String,
}

/// In-memory progress of a running session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub page: u64,
    pub total_domains: u64,
    pub server: String,
    pub record_type: RecordType,
}

/// Optional filters for listing records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    #[serde(default, rename = "type")]
    pub record_type: Option<RecordType>,
    #[serde(default)]
    pub server: Option<String>,
}

/// Row count for one server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCount {
    pub server: String,
    pub count: u64,
}

/// Record counts per type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCounts {
    pub mx: u64,
    pub ns: u64,
}

/// Most frequent servers per type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopServers {
    pub mx: Vec<ServerCount>,
    pub ns: Vec<ServerCount>,
}

/// Aggregate statistics over everything persisted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarvestStats {
    pub total_records: u64,
    pub unique_domains: u64,
    pub by_type: TypeCounts,
    pub by_provider: BTreeMap<String, u64>,
    pub top_servers: TopServers,
    pub recent_sessions: Vec<HarvestSession>,
}

/// Result of an administrative wipe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearSummary {
    pub domains_removed: u64,
    pub sessions_removed: u64,
}
