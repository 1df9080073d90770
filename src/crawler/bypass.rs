//! Result-limit bypass crawling
//!
//! Providers cap how many results one query can page through. This crawler
//! issues many narrower queries instead:
//!
//! 1. the base query at each configured page size
//! 2. the base query split by hostname prefix, `a*` through `z*` then `0*` through `9*`
//!
//! Every segment runs the ordinary page loop with its own empty-page
//! threshold and page cap. Domains already stored for the server are seeded
//! into deduplication first, so only genuinely new domains are written.

use super::pagination::{run_pages, PageBudget};
use super::pipeline::HarvestPipeline;
use super::{HarvestSettings, StopReason};
use crate::error::Result;
use crate::provider::{LookupQuery, ReverseLookupProvider};

/// Hostname prefixes in crawl order
pub fn prefix_segments() -> Vec<String> {
    ('a'..='z')
        .chain('0'..='9')
        .map(|c| format!("{c}*"))
        .collect()
}

pub struct MultiStrategyCrawler<'a> {
    provider: &'a dyn ReverseLookupProvider,
    settings: &'a HarvestSettings,
    max_pages: Option<u32>,
}

impl<'a> MultiStrategyCrawler<'a> {
    pub fn new(provider: &'a dyn ReverseLookupProvider, settings: &'a HarvestSettings) -> Self {
        Self {
            provider,
            settings,
            max_pages: None,
        }
    }

    /// Tighten the per-segment page cap
    pub fn with_max_pages(mut self, max_pages: Option<u32>) -> Self {
        self.max_pages = max_pages.filter(|n| *n > 0);
        self
    }

    fn page_cap(&self) -> u32 {
        match self.max_pages {
            Some(n) => n.min(self.settings.bypass_page_cap),
            None => self.settings.bypass_page_cap,
        }
    }

    /// Only domains that were new to the store count toward the ceiling
    fn ceiling_reached(&self, pipeline: &HarvestPipeline) -> bool {
        let fetched = pipeline.counters().admitted as usize;
        if fetched > self.settings.soft_domain_ceiling {
            tracing::warn!(
                session = %pipeline.job().session_id,
                fetched,
                ceiling = self.settings.soft_domain_ceiling,
                "Domain ceiling reached, skipping remaining segments"
            );
            return true;
        }
        false
    }

    async fn segment(
        &self,
        query: LookupQuery,
        max_empty: u32,
        pipeline: &mut HarvestPipeline,
    ) -> Result<()> {
        let budget = PageBudget {
            max_empty,
            page_cap: Some(self.page_cap()),
        };
        let (run, stop) = run_pages(self.provider, &query, budget, pipeline).await?;
        tracing::info!(
            session = %pipeline.job().session_id,
            segment = %query.label(),
            pages = run.pages_requested,
            inserted = run.inserted,
            total = pipeline.inserted(),
            stop = %stop,
            "Segment finished"
        );
        Ok(())
    }

    /// Crawl every segment of `base` and mark the session complete
    ///
    /// The pipeline should already be seeded with stored domains.
    pub async fn run(&self, base: &LookupQuery, pipeline: &mut HarvestPipeline) -> Result<StopReason> {
        tracing::info!(
            session = %pipeline.job().session_id,
            query = %base.label(),
            page_sizes = ?self.settings.bypass_page_sizes,
            "Starting bypass crawl"
        );

        let stop = 'crawl: {
            for size in &self.settings.bypass_page_sizes {
                let query = base.clone().with_page_size(*size);
                self.segment(query, self.settings.max_empty_pages, pipeline).await?;
                if self.ceiling_reached(pipeline) {
                    break 'crawl StopReason::DomainCeiling;
                }
            }

            for prefix in prefix_segments() {
                let query = base.clone().with_prefix(prefix);
                self.segment(query, self.settings.segment_max_empty_pages, pipeline)
                    .await?;
                if self.ceiling_reached(pipeline) {
                    break 'crawl StopReason::DomainCeiling;
                }
            }

            StopReason::SegmentsExhausted
        };

        tracing::info!(
            session = %pipeline.job().session_id,
            new_records = pipeline.inserted(),
            unique_observed = pipeline.unique_observed(),
            stop = %stop,
            "Bypass crawl finished"
        );

        pipeline.complete()?;
        Ok(stop)
    }
}
