//! Cursor-based scroll crawling
//!
//! The provider's scroll endpoints are tried in order and the first accepted
//! response is adopted. Continuations follow until one of:
//!
//! - no continuation token
//! - received records reach the declared total
//! - the continuation ceiling
//! - a failed or empty continuation
//!
//! When no endpoint accepts the query the crawl degrades to pagination.

use super::pagination::PaginationDriver;
use super::pipeline::HarvestPipeline;
use super::{HarvestSettings, StopReason};
use crate::error::Result;
use crate::provider::{Cursor, LookupQuery, Page, ReverseLookupProvider, Strategy};

pub struct ScrollCrawler<'a> {
    provider: &'a dyn ReverseLookupProvider,
    settings: &'a HarvestSettings,
    max_pages: Option<u32>,
}

impl<'a> ScrollCrawler<'a> {
    pub fn new(provider: &'a dyn ReverseLookupProvider, settings: &'a HarvestSettings) -> Self {
        Self {
            provider,
            settings,
            max_pages: None,
        }
    }

    /// Page cap applied if the crawl degrades to pagination
    pub fn with_max_pages(mut self, max_pages: Option<u32>) -> Self {
        self.max_pages = max_pages;
        self
    }

    async fn open(&self, query: &LookupQuery, pipeline: &mut HarvestPipeline) -> Option<Page> {
        for endpoint in self.provider.scroll_endpoints() {
            match pipeline
                .fetch(self.provider, query, &Cursor::OpenScroll(endpoint.clone()))
                .await
            {
                Ok(page) => {
                    tracing::info!(
                        session = %pipeline.job().session_id,
                        endpoint = %endpoint.label,
                        records = page.records.len(),
                        declared_total = ?page.declared_total,
                        "Scroll opened"
                    );
                    return Some(page);
                }
                Err(_) => {
                    tracing::info!(endpoint = %endpoint.label, "Scroll endpoint rejected, trying next");
                }
            }
        }
        None
    }

    /// Crawl `query` and mark the session complete
    pub async fn run(&self, query: &LookupQuery, pipeline: &mut HarvestPipeline) -> Result<StopReason> {
        let Some(mut page) = self.open(query, pipeline).await else {
            tracing::warn!(
                session = %pipeline.job().session_id,
                "No scroll endpoint accepted the query, falling back to pagination"
            );
            pipeline.switch_strategy(Strategy::Paginate);
            return PaginationDriver::new(self.provider, self.settings)
                .with_max_pages(self.max_pages)
                .run(query, pipeline)
                .await;
        };

        let declared_total = page.declared_total;
        let mut received = 0u64;
        let mut continuations = 0u32;

        let stop = loop {
            received += page.records.len() as u64;
            pipeline.ingest(u64::from(continuations) + 1, &page.records)?;

            if continuations > 0 && page.is_empty() {
                break StopReason::Exhausted;
            }
            let Some(token) = page.continuation().map(str::to_string) else {
                break StopReason::NoContinuation;
            };
            if declared_total.is_some_and(|total| received >= total) {
                break StopReason::DeclaredTotalReached;
            }
            if continuations >= self.settings.scroll_batch_ceiling {
                break StopReason::BatchCeiling;
            }

            continuations += 1;
            match pipeline
                .fetch(self.provider, query, &Cursor::Continue(token))
                .await
            {
                Ok(next) => page = next,
                Err(_) => break StopReason::ContinuationFailed,
            }
        };

        tracing::info!(
            session = %pipeline.job().session_id,
            received,
            continuations,
            inserted = pipeline.inserted(),
            stop = %stop,
            "Scroll crawl finished"
        );

        pipeline.complete()?;
        Ok(stop)
    }
}
