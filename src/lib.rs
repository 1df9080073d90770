//! revharvest - reverse MX/NS domain harvester
//!
//! Enumerates every domain whose MX or NS record points at a given server by
//! paging through third-party reverse-lookup APIs, deduplicating what comes
//! back, and persisting it to SQLite with per-session bookkeeping.
//!
//! # Architecture
//!
//! - [`config`] - Configuration management and settings
//! - [`provider`] - Reverse-lookup providers behind one paging capability
//! - [`crawler`] - Pagination, scroll and bypass strategies plus the [`Harvester`](crawler::Harvester)
//! - [`storage`] - Deduplication, batched writes, sessions and the SQLite repository
//! - [`models`] - Core data structures and types
//! - [`server`] - Thin HTTP surface
//! - [`metrics`] - Prometheus metrics
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use revharvest::config::Config;
//! use revharvest::crawler::{HarvestRequest, Harvester};
//! use revharvest::models::RecordType;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let harvester = Harvester::from_config(&config)?;
//!     let id = harvester.start_harvest(HarvestRequest::new("mx.example.com", RecordType::Mx))?;
//!     harvester.wait(&id).await;
//!     println!("{:?}", harvester.get_session(&id)?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crawler;
pub mod error;
pub mod metrics;
pub mod models;
pub mod provider;
pub mod server;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::crawler::{HarvestReport, HarvestRequest, Harvester, StopReason};
    pub use crate::error::{Error, ErrorCategory, HarvestErrorTrait, Result};
    pub use crate::models::{
        DomainRecord, HarvestSession, HarvestStats, ProgressSnapshot, RecordFilter, RecordType,
        SessionStatus,
    };
    pub use crate::provider::{ReverseLookupProvider, Strategy};
}

// Direct re-exports for convenience
pub use models::{DomainRecord, HarvestSession, RecordType, SessionStatus};
