//! Harvest orchestration
//!
//! [`Harvester`] is the single entry point used by the CLI and the HTTP
//! layer. Each accepted request gets a session row and a background task;
//! a supervisor task watches it and marks the session `error` if the crawl
//! fails or panics.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use super::bypass::MultiStrategyCrawler;
use super::pagination::PaginationDriver;
use super::pipeline::{HarvestJob, HarvestPipeline, HarvestServices};
use super::scroll::ScrollCrawler;
use super::{HarvestReport, HarvestSettings};
use crate::config::Config;
use crate::error::{Error, HarvestErrorTrait, Result};
use crate::metrics;
use crate::models::{
    ClearSummary, DomainRecord, HarvestSession, HarvestStats, ProgressSnapshot, RecordFilter,
    RecordType, SessionStatus, SessionUpdate,
};
use crate::provider::{Cursor, LookupQuery, ProviderRegistry, SharedProvider, Strategy};
use crate::storage::repository::create_sqlite_repository;
use crate::storage::SharedRepository;
use crate::utils::error::FailureKind;

/// Servers listed per record type in [`Harvester::get_stats`]
pub const STATS_TOP_SERVERS: usize = 10;

/// Sessions listed in [`Harvester::get_stats`]
pub const STATS_RECENT_SESSIONS: usize = 10;

/// Mail server queried by [`Harvester::test_provider`] when none is given
pub const CHECK_SERVER: &str = "mx01.ionos.de";

// ============================================================================
// Request
// ============================================================================

/// Parameters of a harvest
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HarvestRequest {
    /// MX or NS server host name
    pub server: String,

    #[serde(rename = "type", alias = "record_type")]
    pub record_type: RecordType,

    /// Provider name; the configured default when absent
    #[serde(default)]
    pub provider: Option<String>,

    /// Page cap; absent or zero means unbounded
    #[serde(default)]
    pub max_pages: Option<u32>,

    /// Crawl strategy; the provider's preference when absent
    #[serde(default)]
    pub strategy: Option<Strategy>,
}

impl HarvestRequest {
    pub fn new(server: impl Into<String>, record_type: RecordType) -> Self {
        Self {
            server: server.into(),
            record_type,
            provider: None,
            max_pages: None,
            strategy: None,
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }
}

/// A request that passed validation
struct ValidatedRequest {
    server: String,
    record_type: RecordType,
    provider: SharedProvider,
    max_pages: Option<u32>,
    strategy: Strategy,
}

/// Outcome of a single page-1 request against a provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderCheck {
    pub provider: String,
    pub server: String,
    pub ok: bool,
    /// Records on the returned page
    pub records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

// ============================================================================
// Harvester
// ============================================================================

pub struct Harvester {
    services: HarvestServices,
    providers: ProviderRegistry,
    default_provider: String,
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl Harvester {
    pub fn new(
        repository: SharedRepository,
        providers: ProviderRegistry,
        settings: HarvestSettings,
        default_provider: impl Into<String>,
    ) -> Self {
        Self {
            services: HarvestServices::new(repository, settings),
            providers,
            default_provider: default_provider.into(),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Build from configuration, opening the SQLite database
    pub fn from_config(config: &Config) -> Result<Self> {
        let repository = create_sqlite_repository(&config.database.sqlite_path)?;
        let providers = ProviderRegistry::from_config(&config.provider)?;
        Ok(Self::new(
            repository,
            providers,
            HarvestSettings::from(&config.harvest),
            config.provider.default.clone(),
        ))
    }

    pub fn services(&self) -> &HarvestServices {
        &self.services
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    fn validate(&self, request: &HarvestRequest) -> Result<ValidatedRequest> {
        let server = request.server.trim();
        if server.is_empty() {
            return Err(Error::invalid("server must not be empty"));
        }

        let name = request
            .provider
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(&self.default_provider);
        let provider = self.providers.get(name)?;
        let mut strategy = request
            .strategy
            .unwrap_or_else(|| provider.preferred_strategy());
        if strategy == Strategy::Bypass && !provider.supports_segmentation() {
            tracing::warn!(
                provider = provider.name(),
                "Provider ignores segment filters; paginating instead of bypass"
            );
            strategy = Strategy::Paginate;
        }

        Ok(ValidatedRequest {
            server: server.to_string(),
            record_type: request.record_type,
            max_pages: request.max_pages.filter(|n| *n > 0),
            strategy,
            provider,
        })
    }

    /// Create a session and crawl it in the background
    ///
    /// Returns the session id immediately. Invalid requests fail before any
    /// session is created.
    pub fn start_harvest(&self, request: HarvestRequest) -> Result<String> {
        let request = self.validate(&request)?;
        let provider_name = request.provider.name().to_string();
        let session_id =
            self.services
                .sessions
                .create(&request.server, request.record_type, &provider_name)?;

        let job = HarvestJob {
            session_id: session_id.clone(),
            record_type: request.record_type,
            server: request.server,
            provider: provider_name,
        };

        tracing::info!(
            session = %session_id,
            server = %job.server,
            record_type = %job.record_type,
            provider = %job.provider,
            strategy = %request.strategy,
            max_pages = ?request.max_pages,
            "Harvest accepted"
        );

        let crawl = tokio::spawn(run_harvest(
            self.services.clone(),
            request.provider,
            job,
            request.strategy,
            request.max_pages,
        ));
        let supervisor = tokio::spawn(supervise(
            self.services.clone(),
            session_id.clone(),
            request.strategy,
            crawl,
        ));

        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session_id.clone(), supervisor);

        Ok(session_id)
    }

    /// Wait for a harvest started by this instance to finish
    ///
    /// Returns `false` when no task is known for the id.
    pub async fn wait(&self, session_id: &str) -> bool {
        let handle = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id);

        match handle {
            Some(handle) => {
                if let Err(e) = handle.await {
                    tracing::error!(session = %session_id, error = %e, "Supervisor task failed");
                }
                true
            }
            None => false,
        }
    }

    /// Number of harvests still running in this process
    pub fn running(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// Latest in-memory progress of a harvest
    pub fn get_progress(&self, session_id: &str) -> Option<ProgressSnapshot> {
        self.services.progress.get(session_id)
    }

    pub fn get_session(&self, session_id: &str) -> Result<Option<HarvestSession>> {
        self.services.sessions.get(session_id)
    }

    pub fn get_stats(&self) -> Result<HarvestStats> {
        self.services
            .repository
            .stats(STATS_TOP_SERVERS, STATS_RECENT_SESSIONS)
    }

    pub fn list_records(&self, filter: &RecordFilter) -> Result<Vec<DomainRecord>> {
        self.services.repository.list_domains(filter)
    }

    /// Delete every record and session and forget all progress
    ///
    /// Running tasks are not cancelled; their later writes land in the
    /// emptied store.
    pub fn clear_all(&self) -> Result<ClearSummary> {
        let summary = self.services.repository.clear_all()?;
        self.services.progress.reset();
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, handle| !handle.is_finished());

        tracing::warn!(
            domains = summary.domains_removed,
            sessions = summary.sessions_removed,
            "All harvest data cleared"
        );
        Ok(summary)
    }

    /// Check that a provider answers and its payload parses
    ///
    /// Issues one MX page-1 request for `server` (default [`CHECK_SERVER`])
    /// without creating a session or storing anything. A failed request is a
    /// successful check with `ok: false`; only an unknown provider is an error.
    pub async fn test_provider(&self, name: &str, server: Option<&str>) -> Result<ProviderCheck> {
        let provider = self.providers.get(name)?;
        let server = server
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(CHECK_SERVER)
            .to_string();
        let query = LookupQuery::new(RecordType::Mx, server.clone());

        let started = Instant::now();
        let result = provider.fetch_page(&query, &Cursor::Page(1)).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let check = match result {
            Ok(page) => ProviderCheck {
                provider: provider.name().to_string(),
                server,
                ok: true,
                records: page.records.len(),
                declared_total: page.declared_total,
                failure: None,
                error: None,
                elapsed_ms,
            },
            Err(e) => {
                metrics::record_fetch_error(provider.name(), e.category().as_str());
                ProviderCheck {
                    provider: provider.name().to_string(),
                    server,
                    ok: false,
                    records: 0,
                    declared_total: None,
                    failure: Some(e.kind()),
                    error: Some(e.to_string()),
                    elapsed_ms,
                }
            }
        };

        tracing::info!(
            provider = %check.provider,
            server = %check.server,
            ok = check.ok,
            records = check.records,
            failure = ?check.failure,
            elapsed_ms,
            "Provider check finished"
        );
        Ok(check)
    }
}

// ============================================================================
// Background Tasks
// ============================================================================

/// Run one harvest with the chosen strategy
pub async fn run_harvest(
    services: HarvestServices,
    provider: SharedProvider,
    job: HarvestJob,
    strategy: Strategy,
    max_pages: Option<u32>,
) -> Result<HarvestReport> {
    let query = job.query();
    let settings = &services.settings;
    let mut pipeline = HarvestPipeline::new(job, strategy, &services);

    let stop = match strategy {
        Strategy::Paginate => {
            PaginationDriver::new(provider.as_ref(), settings)
                .with_max_pages(max_pages)
                .run(&query, &mut pipeline)
                .await?
        }
        Strategy::Scroll => {
            ScrollCrawler::new(provider.as_ref(), settings)
                .with_max_pages(max_pages)
                .run(&query, &mut pipeline)
                .await?
        }
        Strategy::Bypass => {
            pipeline.seed_existing()?;
            MultiStrategyCrawler::new(provider.as_ref(), settings)
                .with_max_pages(max_pages)
                .run(&query, &mut pipeline)
                .await?
        }
    };

    Ok(pipeline.report(stop))
}

async fn supervise(
    services: HarvestServices,
    session_id: String,
    strategy: Strategy,
    crawl: JoinHandle<Result<HarvestReport>>,
) {
    let _timer = metrics::start_harvest_timer(strategy.as_str());
    metrics::harvest_started();

    let status = match crawl.await {
        Ok(Ok(report)) => {
            tracing::info!(
                session = %session_id,
                strategy = %report.strategy,
                new_records = report.new_records,
                unique_observed = report.unique_observed,
                pages = report.pages_fetched,
                requests = report.requests,
                stop = %report.stop,
                "Harvest finished"
            );
            SessionStatus::Complete
        }
        Ok(Err(e)) => {
            tracing::error!(
                session = %session_id,
                category = e.category().as_str(),
                error = %e,
                "Harvest failed"
            );
            mark_failed(&services, &session_id);
            SessionStatus::Error
        }
        Err(e) => {
            tracing::error!(
                session = %session_id,
                panicked = e.is_panic(),
                error = %e,
                "Harvest task aborted"
            );
            mark_failed(&services, &session_id);
            SessionStatus::Error
        }
    };

    metrics::harvest_finished(status.as_str());
}

fn mark_failed(services: &HarvestServices, session_id: &str) {
    if let Err(e) = services.sessions.update(session_id, SessionUpdate::failed()) {
        tracing::error!(session = %session_id, error = %e, "Could not mark session failed");
    }
}
