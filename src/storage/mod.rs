//! Persistence for discovered domains and harvest sessions
//!
//! - [`repository`] - storage traits with SQLite and in-memory implementations
//! - [`dedup`] - per-run deduplication of provider records
//! - [`writer`] - batched inserts with per-record fallback
//! - [`session`] - harvest session lifecycle

pub mod dedup;
pub mod repository;
pub mod session;
pub mod writer;

pub use dedup::{Admission, DedupCounters, Deduplicator, RecordContext};
pub use repository::{
    create_mock_repository, create_sqlite_repository, DomainRepository, MockRepository,
    Repository, SessionRepository, SharedRepository, SqliteRepository,
};
pub use session::SessionStore;
pub use writer::BatchWriter;
