//! Repository Pattern for Database Abstraction
//!
//! Trait-based repository abstractions that keep the crawlers independent of
//! the storage engine:
//! - [`DomainRepository`] - discovered domains, unique on (domain, mx, ns, provider)
//! - [`SessionRepository`] - harvest sessions and their monotonic lifecycle
//! - [`Repository`] - both, plus the cross-table operations
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │        Deduplicator / BatchWriter / SessionStore            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Repository Traits                         │
//! │            DomainRepository, SessionRepository              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                   ┌──────────┴──────────┐
//!                   ▼                     ▼
//!          ┌─────────────────┐   ┌─────────────────┐
//!          │     SQLite      │   │      Mock       │
//!          │  Implementation │   │ Implementation  │
//!          └─────────────────┘   └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use revharvest::storage::repository::{SqliteRepository, MockRepository};
//!
//! // Production: use SQLite
//! let repo = SqliteRepository::new("data/domains.db")?;
//!
//! // Testing: use Mock
//! let mock_repo = MockRepository::new();
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::Utc;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::error::{Error, Result};
use crate::models::{
    ClearSummary, DomainRecord, HarvestSession, HarvestStats, NewDomainRecord, RecordFilter,
    RecordKey, RecordType, ServerCount, SessionStatus, SessionUpdate, TopServers, TypeCounts,
};
use crate::utils::{format_timestamp, parse_timestamp};

// ============================================================================
// Repository Traits
// ============================================================================

/// Repository for discovered domains
pub trait DomainRepository: Send + Sync {
    /// Insert all records in one transaction, ignoring rows that already exist
    ///
    /// Returns the number of newly inserted rows. On error nothing is written.
    fn insert_domains(&self, records: &[NewDomainRecord]) -> Result<usize>;

    /// Insert one record; `Ok(false)` when it already existed
    fn insert_domain(&self, record: &NewDomainRecord) -> Result<bool>;

    /// Distinct domains already stored for a server under the given record type
    fn existing_domains(&self, record_type: RecordType, server: &str) -> Result<HashSet<String>>;

    /// List records, most recently fetched first
    fn list_domains(&self, filter: &RecordFilter) -> Result<Vec<DomainRecord>>;

    /// Count stored rows
    fn count_domains(&self) -> Result<u64>;

    /// Aggregate counts over the domain relation (sessions left empty)
    fn domain_stats(&self, top_n: usize) -> Result<HarvestStats>;
}

/// Repository for harvest sessions
pub trait SessionRepository: Send + Sync {
    /// Insert a session; `Ok(false)` when the id is already taken
    fn insert_session(&self, session: &HarvestSession) -> Result<bool>;

    /// Apply a partial update to a running session
    ///
    /// Returns `Ok(false)` when the session does not exist or is terminal.
    fn update_session(&self, id: &str, update: &SessionUpdate) -> Result<bool>;

    /// Get session by ID
    fn get_session(&self, id: &str) -> Result<Option<HarvestSession>>;

    /// Most recently started sessions
    fn recent_sessions(&self, limit: usize) -> Result<Vec<HarvestSession>>;
}

/// Combined repository used by the harvester
pub trait Repository: DomainRepository + SessionRepository {
    /// Statistics over everything persisted
    fn stats(&self, top_n: usize, recent_n: usize) -> Result<HarvestStats> {
        let mut stats = self.domain_stats(top_n)?;
        stats.recent_sessions = self.recent_sessions(recent_n)?;
        Ok(stats)
    }

    /// Remove every domain and session
    fn clear_all(&self) -> Result<ClearSummary>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

const INSERT_DOMAIN_SQL: &str = r#"
    INSERT OR IGNORE INTO domains (domain, mx, ns, provider, session_id, fetched_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
"#;

const SESSION_COLUMNS: &str = "id, server, record_type, provider, status, total_domains, \
                               pages_fetched, started_at, completed_at";

/// SQLite implementation of [`Repository`]
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection.
pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    /// Create a new SQLite repository
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite repository initialized");
        Ok(repo)
    }

    /// Create in-memory repository (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.create_schema()?;
        Ok(repo)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::other("SQLite connection mutex poisoned"))
    }

    /// Create database schema
    fn create_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS domains (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    domain TEXT NOT NULL,
                    mx TEXT,
                    ns TEXT,
                    provider TEXT NOT NULL DEFAULT 'viewdns',
                    session_id TEXT,
                    fetched_at TEXT NOT NULL
                );

                CREATE UNIQUE INDEX IF NOT EXISTS idx_domains_identity
                    ON domains(domain, IFNULL(mx, ''), IFNULL(ns, ''), provider);

                CREATE INDEX IF NOT EXISTS idx_domains_domain ON domains(domain);
                CREATE INDEX IF NOT EXISTS idx_domains_mx ON domains(mx);
                CREATE INDEX IF NOT EXISTS idx_domains_ns ON domains(ns);
                CREATE INDEX IF NOT EXISTS idx_domains_provider ON domains(provider);
                CREATE INDEX IF NOT EXISTS idx_domains_fetched_at ON domains(fetched_at);

                CREATE TABLE IF NOT EXISTS harvest_sessions (
                    id TEXT PRIMARY KEY,
                    server TEXT NOT NULL,
                    record_type TEXT NOT NULL,
                    provider TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'running',
                    total_domains INTEGER NOT NULL DEFAULT 0,
                    pages_fetched INTEGER NOT NULL DEFAULT 0,
                    started_at TEXT NOT NULL,
                    completed_at TEXT
                );

                CREATE INDEX IF NOT EXISTS idx_sessions_server ON harvest_sessions(server);
                CREATE INDEX IF NOT EXISTS idx_sessions_status ON harvest_sessions(status);
                CREATE INDEX IF NOT EXISTS idx_sessions_started_at
                    ON harvest_sessions(started_at);
                "#,
        )?;

        Ok(())
    }

    fn row_to_domain(row: &Row<'_>) -> rusqlite::Result<DomainRecord> {
        Ok(DomainRecord {
            id: row.get(0)?,
            domain: row.get(1)?,
            mx: row.get(2)?,
            ns: row.get(3)?,
            provider: row.get(4)?,
            session_id: row.get(5)?,
            fetched_at: parse_timestamp(&row.get::<_, String>(6)?).unwrap_or_else(Utc::now),
        })
    }

    fn row_to_session(row: &Row<'_>) -> rusqlite::Result<HarvestSession> {
        let record_type: String = row.get(2)?;
        let record_type = RecordType::parse(&record_type)
            .ok_or_else(|| rusqlite::Error::InvalidColumnType(2, record_type, Type::Text))?;

        Ok(HarvestSession {
            id: row.get(0)?,
            server: row.get(1)?,
            record_type,
            provider: row.get(3)?,
            status: SessionStatus::from_db(&row.get::<_, String>(4)?),
            total_domains: row.get::<_, i64>(5)?.max(0) as u64,
            pages_fetched: row.get::<_, i64>(6)?.max(0) as u64,
            started_at: parse_timestamp(&row.get::<_, String>(7)?).unwrap_or_else(Utc::now),
            completed_at: row
                .get::<_, Option<String>>(8)?
                .as_deref()
                .and_then(parse_timestamp),
        })
    }

    fn top_servers(conn: &Connection, column: &str, top_n: usize) -> Result<Vec<ServerCount>> {
        let sql = format!(
            "SELECT {column}, COUNT(*) AS cnt FROM domains WHERE {column} IS NOT NULL \
             GROUP BY {column} ORDER BY cnt DESC, {column} ASC LIMIT ?1"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![top_n as i64], |row| {
                Ok(ServerCount {
                    server: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

impl DomainRepository for SqliteRepository {
    fn insert_domains(&self, records: &[NewDomainRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let now = format_timestamp(&Utc::now());
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(INSERT_DOMAIN_SQL)?;
            for record in records {
                inserted += stmt.execute(params![
                    record.domain,
                    record.mx,
                    record.ns,
                    record.provider,
                    record.session_id,
                    now
                ])?;
            }
        }
        tx.commit()?;

        Ok(inserted)
    }

    fn insert_domain(&self, record: &NewDomainRecord) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            INSERT_DOMAIN_SQL,
            params![
                record.domain,
                record.mx,
                record.ns,
                record.provider,
                record.session_id,
                format_timestamp(&Utc::now())
            ],
        )?;
        Ok(changed == 1)
    }

    fn existing_domains(&self, record_type: RecordType, server: &str) -> Result<HashSet<String>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT DISTINCT domain FROM domains WHERE {} = ?1",
            record_type.as_str()
        );
        let mut stmt = conn.prepare(&sql)?;
        let domains = stmt
            .query_map(params![server], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(domains)
    }

    fn list_domains(&self, filter: &RecordFilter) -> Result<Vec<DomainRecord>> {
        let conn = self.conn()?;

        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        match (filter.record_type, filter.server.as_deref()) {
            (Some(rt), Some(server)) => {
                clauses.push(format!("{} = ?1", rt.as_str()));
                values.push(Value::Text(server.to_string()));
            }
            (Some(rt), None) => clauses.push(format!("{} IS NOT NULL", rt.as_str())),
            (None, Some(server)) => {
                clauses.push("(mx = ?1 OR ns = ?1)".to_string());
                values.push(Value::Text(server.to_string()));
            }
            (None, None) => {}
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let sql = format!(
            "SELECT id, domain, mx, ns, provider, session_id, fetched_at FROM domains \
             {where_clause} ORDER BY fetched_at DESC, id DESC"
        );

        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(values), Self::row_to_domain)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn count_domains(&self) -> Result<u64> {
        let conn = self.conn()?;
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM domains", [], |row| row.get(0))?;
        Ok(total as u64)
    }

    fn domain_stats(&self, top_n: usize) -> Result<HarvestStats> {
        let conn = self.conn()?;

        let (total, unique, mx, ns): (i64, i64, i64, i64) = conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT domain), COUNT(mx), COUNT(ns) FROM domains",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;

        let mut by_provider = BTreeMap::new();
        {
            let mut stmt =
                conn.prepare("SELECT provider, COUNT(*) FROM domains GROUP BY provider")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (provider, count) = row?;
                by_provider.insert(provider, count as u64);
            }
        }

        let top_servers = TopServers {
            mx: Self::top_servers(&conn, "mx", top_n)?,
            ns: Self::top_servers(&conn, "ns", top_n)?,
        };

        Ok(HarvestStats {
            total_records: total as u64,
            unique_domains: unique as u64,
            by_type: TypeCounts {
                mx: mx as u64,
                ns: ns as u64,
            },
            by_provider,
            top_servers,
            recent_sessions: Vec::new(),
        })
    }
}

impl SessionRepository for SqliteRepository {
    fn insert_session(&self, session: &HarvestSession) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            r#"
                INSERT OR IGNORE INTO harvest_sessions
                    (id, server, record_type, provider, status, total_domains,
                     pages_fetched, started_at, completed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            params![
                session.id,
                session.server,
                session.record_type.as_str(),
                session.provider,
                session.status.as_str(),
                session.total_domains as i64,
                session.pages_fetched as i64,
                format_timestamp(&session.started_at),
                session.completed_at.as_ref().map(format_timestamp),
            ],
        )?;
        Ok(changed == 1)
    }

    fn update_session(&self, id: &str, update: &SessionUpdate) -> Result<bool> {
        if update.is_empty() {
            return Ok(false);
        }

        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(status) = update.status {
            sets.push("status");
            values.push(Value::Text(status.as_str().to_string()));
            if status.is_terminal() {
                sets.push("completed_at");
                values.push(Value::Text(format_timestamp(&Utc::now())));
            }
        }
        if let Some(total) = update.total_domains {
            sets.push("total_domains");
            values.push(Value::Integer(total as i64));
        }
        if let Some(pages) = update.pages_fetched {
            sets.push("pages_fetched");
            values.push(Value::Integer(pages as i64));
        }

        let assignments = sets
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{column} = ?{}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let id_param = sets.len() + 1;
        values.push(Value::Text(id.to_string()));

        let sql = format!(
            "UPDATE harvest_sessions SET {assignments} WHERE id = ?{id_param} AND status = 'running'"
        );

        let conn = self.conn()?;
        let changed = conn.execute(&sql, params_from_iter(values))?;
        Ok(changed == 1)
    }

    fn get_session(&self, id: &str) -> Result<Option<HarvestSession>> {
        let conn = self.conn()?;
        let session = conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM harvest_sessions WHERE id = ?1"),
                params![id],
                Self::row_to_session,
            )
            .optional()?;
        Ok(session)
    }

    fn recent_sessions(&self, limit: usize) -> Result<Vec<HarvestSession>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM harvest_sessions \
             ORDER BY started_at DESC, id DESC LIMIT ?1"
        ))?;
        let sessions = stmt
            .query_map(params![limit as i64], Self::row_to_session)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }
}

impl Repository for SqliteRepository {
    fn clear_all(&self) -> Result<ClearSummary> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let domains: i64 = tx.query_row("SELECT COUNT(*) FROM domains", [], |row| row.get(0))?;
        let sessions: i64 =
            tx.query_row("SELECT COUNT(*) FROM harvest_sessions", [], |row| row.get(0))?;

        tx.execute("DELETE FROM domains", [])?;
        tx.execute("DELETE FROM harvest_sessions", [])?;
        tx.execute("DELETE FROM sqlite_sequence WHERE name = 'domains'", [])?;
        tx.commit()?;

        Ok(ClearSummary {
            domains_removed: domains as u64,
            sessions_removed: sessions as u64,
        })
    }
}

// ============================================================================
// Mock Implementation (for testing)
// ============================================================================

#[derive(Default)]
struct MockState {
    domains: Vec<DomainRecord>,
    keys: HashSet<RecordKey>,
    sessions: HashMap<String, HarvestSession>,
    next_id: i64,
}

/// In-memory mock implementation of [`Repository`]
///
/// Can be told to fail bulk inserts, or any write touching specific domains,
/// to exercise the per-record fallback of the batch writer.
#[derive(Default)]
pub struct MockRepository {
    state: RwLock<MockState>,
    fail_bulk: AtomicBool,
    failing_domains: RwLock<HashSet<String>>,
}

impl MockRepository {
    /// Create a new mock repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every bulk insert fail
    pub fn fail_bulk_inserts(&self, fail: bool) {
        self.fail_bulk.store(fail, Ordering::SeqCst);
    }

    /// Make any write containing `domain` fail
    pub fn fail_domain(&self, domain: impl Into<String>) {
        self.failing_domains
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(domain.into());
    }

    /// Get the number of stored domain rows
    pub fn len(&self) -> usize {
        self.read().domains.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.read().domains.is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, MockState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MockState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_failing(&self, domain: &str) -> bool {
        self.failing_domains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(domain)
    }

    fn simulated_failure(what: &str) -> Error {
        Error::Io(io::Error::new(io::ErrorKind::Other, format!("simulated {what} failure")))
    }

    fn push(state: &mut MockState, record: &NewDomainRecord) -> bool {
        if !state.keys.insert(record.key()) {
            return false;
        }
        state.next_id += 1;
        let id = state.next_id;
        state.domains.push(DomainRecord {
            id,
            domain: record.domain.clone(),
            mx: record.mx.clone(),
            ns: record.ns.clone(),
            provider: record.provider.clone(),
            session_id: record.session_id.clone(),
            fetched_at: Utc::now(),
        });
        true
    }

    fn top_servers<'a>(
        servers: impl Iterator<Item = &'a String>,
        top_n: usize,
    ) -> Vec<ServerCount> {
        let mut counts: HashMap<&str, u64> = HashMap::new();
        for server in servers {
            *counts.entry(server.as_str()).or_default() += 1;
        }
        let mut ranked: Vec<ServerCount> = counts
            .into_iter()
            .map(|(server, count)| ServerCount {
                server: server.to_string(),
                count,
            })
            .collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.server.cmp(&b.server)));
        ranked.truncate(top_n);
        ranked
    }
}

impl DomainRepository for MockRepository {
    fn insert_domains(&self, records: &[NewDomainRecord]) -> Result<usize> {
        if self.fail_bulk.load(Ordering::SeqCst) {
            return Err(Self::simulated_failure("bulk insert"));
        }
        if records.iter().any(|r| self.is_failing(&r.domain)) {
            return Err(Self::simulated_failure("bulk insert"));
        }

        let mut state = self.write();
        Ok(records
            .iter()
            .filter(|record| Self::push(&mut state, record))
            .count())
    }

    fn insert_domain(&self, record: &NewDomainRecord) -> Result<bool> {
        if self.is_failing(&record.domain) {
            return Err(Self::simulated_failure("insert"));
        }
        let mut state = self.write();
        Ok(Self::push(&mut state, record))
    }

    fn existing_domains(&self, record_type: RecordType, server: &str) -> Result<HashSet<String>> {
        let state = self.read();
        Ok(state
            .domains
            .iter()
            .filter(|r| {
                let column = match record_type {
                    RecordType::Mx => r.mx.as_deref(),
                    RecordType::Ns => r.ns.as_deref(),
                };
                column == Some(server)
            })
            .map(|r| r.domain.clone())
            .collect())
    }

    fn list_domains(&self, filter: &RecordFilter) -> Result<Vec<DomainRecord>> {
        let state = self.read();
        let server = filter.server.as_deref();
        let mut records: Vec<DomainRecord> = state
            .domains
            .iter()
            .filter(|r| match (filter.record_type, server) {
                (Some(RecordType::Mx), Some(s)) => r.mx.as_deref() == Some(s),
                (Some(RecordType::Ns), Some(s)) => r.ns.as_deref() == Some(s),
                (Some(RecordType::Mx), None) => r.mx.is_some(),
                (Some(RecordType::Ns), None) => r.ns.is_some(),
                (None, Some(s)) => r.mx.as_deref() == Some(s) || r.ns.as_deref() == Some(s),
                (None, None) => true,
            })
            .cloned()
            .collect();
        records.sort_by(|a, b| b.fetched_at.cmp(&a.fetched_at).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    fn count_domains(&self) -> Result<u64> {
        Ok(self.read().domains.len() as u64)
    }

    fn domain_stats(&self, top_n: usize) -> Result<HarvestStats> {
        let state = self.read();

        let unique: HashSet<&str> = state.domains.iter().map(|r| r.domain.as_str()).collect();
        let mut by_provider = BTreeMap::new();
        for record in &state.domains {
            *by_provider.entry(record.provider.clone()).or_insert(0) += 1;
        }

        Ok(HarvestStats {
            total_records: state.domains.len() as u64,
            unique_domains: unique.len() as u64,
            by_type: TypeCounts {
                mx: state.domains.iter().filter(|r| r.mx.is_some()).count() as u64,
                ns: state.domains.iter().filter(|r| r.ns.is_some()).count() as u64,
            },
            by_provider,
            top_servers: TopServers {
                mx: Self::top_servers(state.domains.iter().filter_map(|r| r.mx.as_ref()), top_n),
                ns: Self::top_servers(state.domains.iter().filter_map(|r| r.ns.as_ref()), top_n),
            },
            recent_sessions: Vec::new(),
        })
    }
}

impl SessionRepository for MockRepository {
    fn insert_session(&self, session: &HarvestSession) -> Result<bool> {
        let mut state = self.write();
        if state.sessions.contains_key(&session.id) {
            return Ok(false);
        }
        state.sessions.insert(session.id.clone(), session.clone());
        Ok(true)
    }

    fn update_session(&self, id: &str, update: &SessionUpdate) -> Result<bool> {
        if update.is_empty() {
            return Ok(false);
        }

        let mut state = self.write();
        let Some(session) = state.sessions.get_mut(id) else {
            return Ok(false);
        };
        if session.status.is_terminal() {
            return Ok(false);
        }

        if let Some(status) = update.status {
            session.status = status;
            if status.is_terminal() {
                session.completed_at = Some(Utc::now());
            }
        }
        if let Some(total) = update.total_domains {
            session.total_domains = total;
        }
        if let Some(pages) = update.pages_fetched {
            session.pages_fetched = pages;
        }
        Ok(true)
    }

    fn get_session(&self, id: &str) -> Result<Option<HarvestSession>> {
        Ok(self.read().sessions.get(id).cloned())
    }

    fn recent_sessions(&self, limit: usize) -> Result<Vec<HarvestSession>> {
        let state = self.read();
        let mut sessions: Vec<HarvestSession> = state.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        sessions.truncate(limit);
        Ok(sessions)
    }
}

impl Repository for MockRepository {
    fn clear_all(&self) -> Result<ClearSummary> {
        let mut state = self.write();
        let summary = ClearSummary {
            domains_removed: state.domains.len() as u64,
            sessions_removed: state.sessions.len() as u64,
        };
        *state = MockState::default();
        Ok(summary)
    }
}

// ============================================================================
// Shared Repository Types
// ============================================================================

/// Thread-safe shared repository wrapper
pub type SharedRepository = Arc<dyn Repository>;

/// Create a shared SQLite repository
pub fn create_sqlite_repository(path: impl AsRef<Path>) -> Result<SharedRepository> {
    let repo = SqliteRepository::new(path)?;
    Ok(Arc::new(repo))
}

/// Create a shared mock repository
pub fn create_mock_repository() -> SharedRepository {
    Arc::new(MockRepository::new())
}

// ============================================================================
// Tests
// ============================================================================
