//! Sequential offset pagination

use super::pipeline::HarvestPipeline;
use super::{HarvestSettings, StopReason};
use crate::error::Result;
use crate::provider::{Cursor, LookupQuery, ReverseLookupProvider};

/// Limits for one run of the page loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PageBudget {
    /// Consecutive empty pages that end the run
    pub max_empty: u32,
    /// Highest page number requested
    pub page_cap: Option<u32>,
}

/// Result of one run of the page loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PageRun {
    pub pages_requested: u32,
    pub productive_pages: u32,
    pub last_productive_page: Option<u32>,
    pub inserted: u64,
}

/// Walk pages 1, 2, 3, ... of `query` through the pipeline
///
/// A failed request counts as an empty page. Storage errors propagate.
pub(crate) async fn run_pages(
    provider: &dyn ReverseLookupProvider,
    query: &LookupQuery,
    budget: PageBudget,
    pipeline: &mut HarvestPipeline,
) -> Result<(PageRun, StopReason)> {
    let inserted_before = pipeline.inserted();
    let mut run = PageRun::default();
    let mut consecutive_empty = 0u32;
    let mut page = 1u32;

    let stop = loop {
        if budget.page_cap.is_some_and(|cap| page > cap) {
            break StopReason::PageCap;
        }

        run.pages_requested += 1;
        let mut provider_max = None;
        let productive = match pipeline.fetch(provider, query, &Cursor::Page(page)).await {
            Ok(response) => {
                provider_max = response.max_page;
                pipeline
                    .ingest(u64::from(page), &response.records)?
                    .is_productive()
            }
            Err(_) => false,
        };

        if productive {
            consecutive_empty = 0;
            run.productive_pages += 1;
            run.last_productive_page = Some(page);
        } else {
            consecutive_empty += 1;
            tracing::debug!(
                query = %query.label(),
                page,
                consecutive_empty,
                "Empty page"
            );
            if consecutive_empty >= budget.max_empty {
                break StopReason::EmptyStreak;
            }
        }

        if provider_max.is_some_and(|max| page >= max) {
            break StopReason::ProviderMaxPage;
        }

        page += 1;
    };

    run.inserted = pipeline.inserted() - inserted_before;
    tracing::debug!(
        query = %query.label(),
        requested = run.pages_requested,
        productive = run.productive_pages,
        inserted = run.inserted,
        stop = %stop,
        "Page run finished"
    );
    Ok((run, stop))
}

/// Sequential pagination until an empty streak, a page cap, or the provider's last page
pub struct PaginationDriver<'a> {
    provider: &'a dyn ReverseLookupProvider,
    settings: &'a HarvestSettings,
    max_pages: Option<u32>,
}

impl<'a> PaginationDriver<'a> {
    pub fn new(provider: &'a dyn ReverseLookupProvider, settings: &'a HarvestSettings) -> Self {
        Self {
            provider,
            settings,
            max_pages: None,
        }
    }

    /// Stop after page `max_pages`; `None` or zero means unbounded
    pub fn with_max_pages(mut self, max_pages: Option<u32>) -> Self {
        self.max_pages = max_pages.filter(|n| *n > 0);
        self
    }

    /// Crawl `query` and mark the session complete
    pub async fn run(&self, query: &LookupQuery, pipeline: &mut HarvestPipeline) -> Result<StopReason> {
        let budget = PageBudget {
            max_empty: self.settings.max_empty_pages,
            page_cap: self.max_pages,
        };

        tracing::info!(
            session = %pipeline.job().session_id,
            query = %query.label(),
            max_pages = ?self.max_pages,
            "Starting paginated crawl"
        );

        let (run, stop) = run_pages(self.provider, query, budget, pipeline).await?;
        tracing::info!(
            session = %pipeline.job().session_id,
            last_page = ?run.last_productive_page,
            inserted = run.inserted,
            stop = %stop,
            "Paginated crawl finished"
        );

        pipeline.complete()?;
        Ok(stop)
    }
}
