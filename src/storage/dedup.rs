//! In-run deduplication of provider records
//!
//! Each crawl owns one [`Deduplicator`]. It normalizes raw provider values
//! into canonical domains and admits every (domain, mx, ns, provider) key at
//! most once per run. The bypass crawler seeds it with the domains already in
//! storage so only genuinely new ones reach the writer.

use std::collections::HashSet;

use serde_json::Value;

use crate::models::{NewDomainRecord, RecordKey, RecordType};

/// Scheme prepended to bare domains
pub const DEFAULT_SCHEME: &str = "http://";

const RECOGNIZED_SCHEMES: [&str; 2] = ["http://", "https://"];

// ============================================================================
// Normalization
// ============================================================================

/// Extract the domain string from a raw provider value
///
/// Accepts a bare string or an object carrying `hostname` or `domain`.
pub fn extract_domain(raw: &Value) -> Option<&str> {
    match raw {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map
            .get("hostname")
            .or_else(|| map.get("domain"))
            .and_then(Value::as_str),
        _ => None,
    }
}

/// Canonical form of a domain: trimmed and carrying a scheme
///
/// Returns `None` for empty input.
pub fn canonicalize(domain: &str) -> Option<String> {
    let trimmed = domain.trim();
    if trimmed.is_empty() {
        return None;
    }
    if RECOGNIZED_SCHEMES.iter().any(|s| trimmed.starts_with(s)) {
        Some(trimmed.to_string())
    } else {
        Some(format!("{DEFAULT_SCHEME}{trimmed}"))
    }
}

/// Normalize a raw provider value into a canonical domain
pub fn normalize(raw: &Value) -> Option<String> {
    extract_domain(raw).and_then(canonicalize)
}

// ============================================================================
// Deduplicator
// ============================================================================

/// Fixed attributes shared by every record of one crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordContext {
    pub record_type: RecordType,
    pub server: String,
    pub provider: String,
    pub session_id: Option<String>,
}

impl RecordContext {
    pub fn new(record_type: RecordType, server: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            record_type,
            server: server.into(),
            provider: provider.into(),
            session_id: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    fn record(&self, domain: String) -> NewDomainRecord {
        let record = NewDomainRecord::new(domain, self.record_type, &self.server, &self.provider);
        match &self.session_id {
            Some(id) => record.with_session(id.clone()),
            None => record,
        }
    }
}

/// Outcome of submitting one raw record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// First sighting; ready to persist
    New(NewDomainRecord),
    /// Already seen in this run
    Duplicate,
    /// Already persisted before this run started
    AlreadyStored,
    /// No usable domain
    Malformed,
}

impl Admission {
    pub fn is_new(&self) -> bool {
        matches!(self, Self::New(_))
    }
}

/// Counters kept by a [`Deduplicator`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupCounters {
    pub admitted: u64,
    pub duplicates: u64,
    pub already_stored: u64,
    pub malformed: u64,
}

/// Per-run deduplicator
#[derive(Debug)]
pub struct Deduplicator {
    context: RecordContext,
    seen: HashSet<RecordKey>,
    existing: HashSet<String>,
    counters: DedupCounters,
}

impl Deduplicator {
    pub fn new(context: RecordContext) -> Self {
        Self {
            context,
            seen: HashSet::new(),
            existing: HashSet::new(),
            counters: DedupCounters::default(),
        }
    }

    /// Seed with domains persisted before this run
    ///
    /// Values are canonicalized, so bare stored domains still match.
    pub fn with_existing<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.existing
            .extend(domains.into_iter().filter_map(|d| canonicalize(d.as_ref())));
        self
    }

    /// Submit one raw provider value
    pub fn admit(&mut self, raw: &Value) -> Admission {
        let Some(domain) = normalize(raw) else {
            self.counters.malformed += 1;
            return Admission::Malformed;
        };

        let already_stored = self.existing.contains(&domain);
        let record = self.context.record(domain);
        if !self.seen.insert(record.key()) {
            self.counters.duplicates += 1;
            return Admission::Duplicate;
        }

        if already_stored {
            self.counters.already_stored += 1;
            return Admission::AlreadyStored;
        }

        self.counters.admitted += 1;
        Admission::New(record)
    }

    /// Submit a page of raw values, returning the records to persist
    pub fn admit_all(&mut self, raws: &[Value]) -> Vec<NewDomainRecord> {
        raws.iter()
            .filter_map(|raw| match self.admit(raw) {
                Admission::New(record) => Some(record),
                _ => None,
            })
            .collect()
    }

    pub fn counters(&self) -> DedupCounters {
        self.counters
    }

    /// Distinct well-formed domains seen in this run, stored or not
    pub fn unique_observed(&self) -> usize {
        self.seen.len()
    }

    pub fn context(&self) -> &RecordContext {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn dedup() -> Deduplicator {
        Deduplicator::new(RecordContext::new(RecordType::Mx, "mx.example.com", "viewdns"))
    }

    #[test]
    fn test_canonicalize() {
        assert_eq!(canonicalize("example.com").as_deref(), Some("http://example.com"));
        assert_eq!(canonicalize("  example.com \n").as_deref(), Some("http://example.com"));
        assert_eq!(canonicalize("https://example.com").as_deref(), Some("https://example.com"));
        assert_eq!(canonicalize("http://example.com").as_deref(), Some("http://example.com"));
        assert_eq!(canonicalize("   "), None);
        assert_eq!(canonicalize(""), None);
    }

    #[test]
    fn test_extract_domain_shapes() {
        assert_eq!(extract_domain(&json!("a.com")), Some("a.com"));
        assert_eq!(extract_domain(&json!({"hostname": "b.com"})), Some("b.com"));
        assert_eq!(extract_domain(&json!({"domain": "c.com", "last_resolved": "2024-01-01"})), Some("c.com"));
        assert_eq!(extract_domain(&json!({"name": "d.com"})), None);
        assert_eq!(extract_domain(&json!(42)), None);
        assert_eq!(extract_domain(&json!({"hostname": null})), None);
    }

    #[test]
    fn test_admit_twice() {
        let mut d = dedup();
        assert!(d.admit(&json!("a.com")).is_new());
        assert_eq!(d.admit(&json!("a.com")), Admission::Duplicate);
        // Canonical forms collide across shapes
        assert_eq!(d.admit(&json!({"hostname": "http://a.com"})), Admission::Duplicate);
        assert_eq!(d.counters().admitted, 1);
        assert_eq!(d.counters().duplicates, 2);
    }

    #[test]
    fn test_malformed_counted() {
        let mut d = dedup();
        assert_eq!(d.admit(&json!("   ")), Admission::Malformed);
        assert_eq!(d.admit(&json!(null)), Admission::Malformed);
        assert_eq!(d.admit(&json!({"other": 1})), Admission::Malformed);
        assert_eq!(d.counters().malformed, 3);
        assert_eq!(d.unique_observed(), 0);
    }

    #[test]
    fn test_seeded_with_existing() {
        let mut d = dedup().with_existing(["http://old.com", "bare-old.com"]);
        assert_eq!(d.admit(&json!("old.com")), Admission::AlreadyStored);
        assert_eq!(d.admit(&json!("bare-old.com")), Admission::AlreadyStored);
        assert!(d.admit(&json!("new.com")).is_new());
        // A second sighting of a stored domain is an in-run duplicate
        assert_eq!(d.admit(&json!("old.com")), Admission::Duplicate);

        let counters = d.counters();
        assert_eq!(counters.already_stored, 2);
        assert_eq!(counters.admitted, 1);
        assert_eq!(d.unique_observed(), 3);
    }

    #[test]
    fn test_admit_all_builds_records() {
        let mut d = Deduplicator::new(
            RecordContext::new(RecordType::Ns, "ns1.example.com", "securitytrails").with_session("s1"),
        );
        let records = d.admit_all(&[json!("a.com"), json!("a.com"), json!({"hostname": "b.com"})]);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].domain, "http://a.com");
        assert_eq!(records[0].ns.as_deref(), Some("ns1.example.com"));
        assert!(records[0].mx.is_none());
        assert_eq!(records[0].session_id.as_deref(), Some("s1"));
        assert_eq!(records[1].provider, "securitytrails");
    }

    proptest! {
        #[test]
        fn prop_second_submission_rejected(domain in "[a-z0-9]{1,20}\\.[a-z]{2,6}") {
            let mut d = dedup();
            prop_assert!(d.admit(&json!(domain.clone())).is_new());
            prop_assert!(!d.admit(&json!(domain.clone())).is_new());
            let padded = format!("  {domain}  ");
            prop_assert!(!d.admit(&json!(padded)).is_new());
        }

        #[test]
        fn prop_admitted_never_exceeds_submissions(domains in proptest::collection::vec("[a-c]{1,3}\\.com", 0..50)) {
            let mut d = dedup();
            let raws: Vec<Value> = domains.iter().map(|s| json!(s)).collect();
            let records = d.admit_all(&raws);
            let distinct: HashSet<&String> = domains.iter().collect();
            prop_assert_eq!(records.len(), distinct.len());
        }
    }
}
