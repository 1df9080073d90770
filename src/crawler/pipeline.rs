//! Shared page sink for every crawl strategy
//!
//! ```text
//!   provider page ──▶ Deduplicator ──▶ BatchWriter ──▶ SessionStore.update
//!                                                  └──▶ ProgressTracker.set
//! ```
//!
//! Strategies decide *which* page to ask for next; [`HarvestPipeline`] does
//! everything that happens to a page once it arrives, plus request pacing.

use std::time::Duration;

use serde_json::Value;

use super::progress::ProgressTracker;
use super::{HarvestReport, HarvestSettings, StopReason};
use crate::error::{HarvestErrorTrait, Result};
use crate::metrics;
use crate::models::{ProgressSnapshot, RecordType, SessionUpdate};
use crate::provider::{Cursor, LookupQuery, Page, ReverseLookupProvider, Strategy};
use crate::storage::{
    BatchWriter, DedupCounters, Deduplicator, RecordContext, SessionStore, SharedRepository,
};
use crate::utils::error::FetchError;

// ============================================================================
// Shared Services
// ============================================================================

/// Handles shared by every harvest task
#[derive(Clone)]
pub struct HarvestServices {
    pub repository: SharedRepository,
    pub sessions: SessionStore,
    pub writer: BatchWriter,
    pub progress: ProgressTracker,
    pub settings: HarvestSettings,
}

impl HarvestServices {
    pub fn new(repository: SharedRepository, settings: HarvestSettings) -> Self {
        Self {
            sessions: SessionStore::new(repository.clone()),
            writer: BatchWriter::new(repository.clone()),
            progress: ProgressTracker::new(),
            repository,
            settings,
        }
    }
}

// ============================================================================
// Job Description
// ============================================================================

/// Identity of one harvest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestJob {
    pub session_id: String,
    pub record_type: RecordType,
    pub server: String,
    pub provider: String,
}

impl HarvestJob {
    /// Base query without prefix or page size
    pub fn query(&self) -> LookupQuery {
        LookupQuery::new(self.record_type, self.server.clone())
    }
}

/// How `pagesFetched` advances on a productive page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCounting {
    /// Set to the page number (sequential pagination)
    LastPage,
    /// Incremented once per productive page or batch
    Cumulative,
}

impl PageCounting {
    fn for_strategy(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Paginate => Self::LastPage,
            Strategy::Scroll | Strategy::Bypass => Self::Cumulative,
        }
    }
}

/// What happened to one page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOutcome {
    /// Raw records in the page
    pub received: usize,
    /// Records that passed deduplication
    pub admitted: usize,
    /// Rows actually inserted
    pub inserted: u64,
}

impl IngestOutcome {
    pub fn is_productive(&self) -> bool {
        self.received > 0
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Per-harvest state threaded through a strategy
pub struct HarvestPipeline {
    job: HarvestJob,
    strategy: Strategy,
    counting: PageCounting,
    dedup: Deduplicator,
    repository: SharedRepository,
    writer: BatchWriter,
    sessions: SessionStore,
    progress: ProgressTracker,
    request_delay: Duration,
    inserted: u64,
    pages_fetched: u64,
    requests: u64,
    failed_requests: u64,
}

impl HarvestPipeline {
    pub fn new(job: HarvestJob, strategy: Strategy, services: &HarvestServices) -> Self {
        let context = RecordContext::new(job.record_type, job.server.clone(), job.provider.clone())
            .with_session(job.session_id.clone());

        Self {
            dedup: Deduplicator::new(context),
            counting: PageCounting::for_strategy(strategy),
            strategy,
            job,
            repository: services.repository.clone(),
            writer: services.writer.clone(),
            sessions: services.sessions.clone(),
            progress: services.progress.clone(),
            request_delay: services.settings.request_delay,
            inserted: 0,
            pages_fetched: 0,
            requests: 0,
            failed_requests: 0,
        }
    }

    /// Seed deduplication with domains stored before this run
    ///
    /// Returns the number of known domains.
    pub fn seed_existing(&mut self) -> Result<usize> {
        let existing = self
            .repository
            .existing_domains(self.job.record_type, &self.job.server)?;
        let count = existing.len();

        let context = self.dedup.context().clone();
        self.dedup = Deduplicator::new(context).with_existing(existing);

        tracing::info!(
            session = %self.job.session_id,
            known = count,
            "Seeded deduplication with stored domains"
        );
        Ok(count)
    }

    /// Switch strategy label and page counting (used when a scroll degrades)
    pub fn switch_strategy(&mut self, strategy: Strategy) {
        self.strategy = strategy;
        self.counting = PageCounting::for_strategy(strategy);
    }

    /// Issue one provider request, pacing it after the previous one
    ///
    /// Failures are logged and counted here; callers only decide what a
    /// failure means for their loop.
    pub async fn fetch(
        &mut self,
        provider: &dyn ReverseLookupProvider,
        query: &LookupQuery,
        cursor: &Cursor,
    ) -> std::result::Result<Page, FetchError> {
        if self.requests > 0 && !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }
        self.requests += 1;

        let result = provider.fetch_page(query, cursor).await;
        if let Err(e) = &result {
            self.failed_requests += 1;
            let kind = e.category().as_str();
            metrics::record_fetch_error(&self.job.provider, kind);
            tracing::warn!(
                session = %self.job.session_id,
                provider = %self.job.provider,
                query = %query.label(),
                cursor = cursor.kind(),
                kind,
                error = %e,
                "Provider request failed"
            );
        }
        result
    }

    /// Deduplicate, persist and report one page
    ///
    /// `page` is the page number for sequential counting and is ignored for
    /// cumulative counting. Empty pages leave session and progress untouched.
    pub fn ingest(&mut self, page: u64, records: &[Value]) -> Result<IngestOutcome> {
        let productive = !records.is_empty();
        metrics::record_page(&self.job.provider, self.strategy.as_str(), productive);
        if !productive {
            return Ok(IngestOutcome::default());
        }

        let before = self.dedup.counters();
        let admitted = self.dedup.admit_all(records);
        let after = self.dedup.counters();
        metrics::record_dedup(
            &self.job.provider,
            after.admitted - before.admitted,
            (after.duplicates - before.duplicates) + (after.already_stored - before.already_stored),
            after.malformed - before.malformed,
        );

        let inserted = self.writer.write(&admitted);
        self.inserted += inserted;

        self.pages_fetched = match self.counting {
            PageCounting::LastPage => page,
            PageCounting::Cumulative => self.pages_fetched + 1,
        };

        self.sessions.update(
            &self.job.session_id,
            SessionUpdate::progress(self.pages_fetched, self.inserted),
        )?;
        self.progress.set(
            &self.job.session_id,
            ProgressSnapshot {
                page: self.pages_fetched,
                total_domains: self.inserted,
                server: self.job.server.clone(),
                record_type: self.job.record_type,
            },
        );

        tracing::debug!(
            session = %self.job.session_id,
            page,
            received = records.len(),
            admitted = admitted.len(),
            inserted,
            total = self.inserted,
            "Page ingested"
        );

        Ok(IngestOutcome {
            received: records.len(),
            admitted: admitted.len(),
            inserted,
        })
    }

    /// Mark the session complete with the running total
    pub fn complete(&self) -> Result<()> {
        self.sessions
            .update(&self.job.session_id, SessionUpdate::complete(self.inserted))?;
        tracing::info!(
            session = %self.job.session_id,
            strategy = %self.strategy,
            total = self.inserted,
            pages = self.pages_fetched,
            requests = self.requests,
            failed_requests = self.failed_requests,
            "Harvest complete"
        );
        Ok(())
    }

    pub fn job(&self) -> &HarvestJob {
        &self.job
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Rows inserted so far
    pub fn inserted(&self) -> u64 {
        self.inserted
    }

    pub fn pages_fetched(&self) -> u64 {
        self.pages_fetched
    }

    pub fn requests(&self) -> u64 {
        self.requests
    }

    pub fn unique_observed(&self) -> usize {
        self.dedup.unique_observed()
    }

    pub fn counters(&self) -> DedupCounters {
        self.dedup.counters()
    }

    /// Summary of the run so far
    pub fn report(&self, stop: StopReason) -> HarvestReport {
        HarvestReport {
            session_id: self.job.session_id.clone(),
            strategy: self.strategy,
            new_records: self.inserted,
            unique_observed: self.unique_observed(),
            pages_fetched: self.pages_fetched,
            requests: self.requests,
            failed_requests: self.failed_requests,
            counters: self.counters(),
            stop,
        }
    }
}
