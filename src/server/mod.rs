//! HTTP surface over the harvester
//!
//! ```text
//! GET  /api/health
//! POST /api/harvest                 {server, type, provider?, max_pages?, strategy?}
//! GET  /api/progress/{session_id}
//! GET  /api/sessions/{session_id}
//! GET  /api/stats
//! GET  /api/records?type=mx&server=...
//! POST /api/clear
//! GET  /metrics
//! ```

pub mod api;
#[allow(clippy::module_inception)]
pub mod server;

pub use api::{create_router, ApiResponse, ErrorResponse};
pub use server::{AppState, HarvestServer, ServerError};
