//! Harvest crawling
//!
//! Three strategies share one page sink ([`pipeline::HarvestPipeline`]):
//!
//! - [`PaginationDriver`]: offset pages until an empty streak or a page cap
//! - [`ScrollCrawler`]: cursor scroll with endpoint fallback, degrading to pagination
//! - [`MultiStrategyCrawler`]: page-size probing then hostname-prefix segments
//!
//! [`Harvester`] picks a strategy per request and runs it in the background.

pub mod bypass;
pub mod fetcher;
pub mod harvester;
pub mod pagination;
pub mod pipeline;
pub mod progress;
pub mod scroll;

use std::time::Duration;

use serde::Serialize;

use crate::config::HarvestConfig;
use crate::provider::Strategy;
use crate::storage::DedupCounters;

pub use bypass::MultiStrategyCrawler;
pub use fetcher::ApiFetcher;
pub use harvester::{HarvestRequest, Harvester, ProviderCheck};
pub use pagination::PaginationDriver;
pub use pipeline::{HarvestJob, HarvestPipeline, HarvestServices};
pub use progress::ProgressTracker;
pub use scroll::ScrollCrawler;

/// Crawl thresholds resolved from [`HarvestConfig`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestSettings {
    pub request_delay: Duration,
    pub max_empty_pages: u32,
    pub segment_max_empty_pages: u32,
    pub bypass_page_cap: u32,
    pub bypass_page_sizes: Vec<u32>,
    pub soft_domain_ceiling: usize,
    pub scroll_batch_ceiling: u32,
}

impl HarvestSettings {
    /// Drop request pacing (tests and local stubs)
    #[must_use]
    pub fn without_delay(mut self) -> Self {
        self.request_delay = Duration::ZERO;
        self
    }
}

impl From<&HarvestConfig> for HarvestSettings {
    fn from(config: &HarvestConfig) -> Self {
        Self {
            request_delay: Duration::from_millis(config.request_delay_ms),
            max_empty_pages: config.max_empty_pages,
            segment_max_empty_pages: config.segment_max_empty_pages,
            bypass_page_cap: config.bypass_page_cap,
            bypass_page_sizes: config.bypass_page_sizes.clone(),
            soft_domain_ceiling: config.soft_domain_ceiling,
            scroll_batch_ceiling: config.scroll_batch_ceiling,
        }
    }
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self::from(&HarvestConfig::default())
    }
}

/// Why a crawl (or one bypass segment) stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Consecutive empty pages reached the threshold
    EmptyStreak,
    /// Page cap or caller's max pages reached
    PageCap,
    /// Provider reported this was its last page
    ProviderMaxPage,
    /// Scroll response carried no continuation token
    NoContinuation,
    /// Received records reached the provider's declared total
    DeclaredTotalReached,
    /// Scroll continuation ceiling reached
    BatchCeiling,
    /// A scroll continuation request failed
    ContinuationFailed,
    /// A scroll continuation returned no records
    Exhausted,
    /// Bypass crawl passed the unique domain ceiling
    DomainCeiling,
    /// Every bypass segment ran to its own stop
    SegmentsExhausted,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyStreak => "empty_streak",
            Self::PageCap => "page_cap",
            Self::ProviderMaxPage => "provider_max_page",
            Self::NoContinuation => "no_continuation",
            Self::DeclaredTotalReached => "declared_total_reached",
            Self::BatchCeiling => "batch_ceiling",
            Self::ContinuationFailed => "continuation_failed",
            Self::Exhausted => "exhausted",
            Self::DomainCeiling => "domain_ceiling",
            Self::SegmentsExhausted => "segments_exhausted",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one finished harvest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarvestReport {
    pub session_id: String,
    /// Strategy that actually produced the records
    pub strategy: Strategy,
    /// Rows inserted by this run
    pub new_records: u64,
    /// Distinct domains observed, including ones stored earlier
    pub unique_observed: usize,
    pub pages_fetched: u64,
    pub requests: u64,
    pub failed_requests: u64,
    #[serde(skip)]
    pub counters: DedupCounters,
    pub stop: StopReason,
}
