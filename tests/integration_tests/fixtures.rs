//! Test fixtures for integration tests
//!
//! A scriptable provider plus helpers for building services and pipelines.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use revharvest::crawler::{HarvestJob, HarvestPipeline, HarvestServices, HarvestSettings};
use revharvest::models::RecordType;
use revharvest::provider::{Cursor, LookupQuery, Page, ReverseLookupProvider, ScrollEndpoint, Strategy};
use revharvest::storage::create_mock_repository;
use revharvest::utils::error::FetchError;

pub const STUB_PROVIDER: &str = "stub";
pub const SERVER: &str = "mx.example.com";

type Responder = dyn Fn(&LookupQuery, &Cursor) -> Result<Page, FetchError> + Send + Sync;

/// Provider whose answers come from a closure; every request is logged
pub struct StubProvider {
    name: String,
    strategy: Strategy,
    endpoints: usize,
    segmenting: bool,
    responder: Box<Responder>,
    log: Mutex<Vec<(LookupQuery, Cursor)>>,
}

impl StubProvider {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&LookupQuery, &Cursor) -> Result<Page, FetchError> + Send + Sync + 'static,
    {
        Self {
            name: STUB_PROVIDER.to_string(),
            strategy: Strategy::Paginate,
            endpoints: 0,
            segmenting: false,
            responder: Box::new(responder),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn preferring(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_scroll_endpoints(mut self, count: usize) -> Self {
        self.endpoints = count;
        self
    }

    /// Honour hostname-prefix and page-size filters, enabling bypass
    pub fn with_segmentation(mut self) -> Self {
        self.segmenting = true;
        self
    }

    pub fn requests(&self) -> Vec<(LookupQuery, Cursor)> {
        self.log.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    /// Requests whose query carried `prefix`
    pub fn requests_for_prefix(&self, prefix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|(q, _)| q.hostname_prefix.as_deref() == Some(prefix))
            .count()
    }
}

#[async_trait]
impl ReverseLookupProvider for StubProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn preferred_strategy(&self) -> Strategy {
        self.strategy
    }

    fn supports_segmentation(&self) -> bool {
        self.segmenting
    }

    fn scroll_endpoints(&self) -> Vec<ScrollEndpoint> {
        (0..self.endpoints)
            .map(|index| ScrollEndpoint {
                index,
                label: format!("endpoint-{index}"),
            })
            .collect()
    }

    async fn fetch_page(&self, query: &LookupQuery, cursor: &Cursor) -> Result<Page, FetchError> {
        self.log.lock().unwrap().push((query.clone(), cursor.clone()));
        (self.responder)(query, cursor)
    }
}

// ============================================================================
// Page Builders
// ============================================================================

/// `count` bare domains named `{stem}{i}.com`
pub fn domains(stem: &str, range: std::ops::Range<usize>) -> Vec<Value> {
    range.map(|i| json!(format!("{stem}{i}.com"))).collect()
}

pub fn page(records: Vec<Value>) -> Page {
    Page {
        records,
        ..Page::default()
    }
}

pub fn scroll_page(records: Vec<Value>, token: Option<&str>, declared_total: Option<u64>) -> Page {
    Page {
        records,
        next: token.map(|t| Cursor::Continue(t.to_string())),
        declared_total,
        max_page: None,
    }
}

pub fn unavailable() -> FetchError {
    FetchError::status(503, "service unavailable")
}

// ============================================================================
// Services
// ============================================================================

pub fn settings() -> HarvestSettings {
    HarvestSettings::default().without_delay()
}

pub fn services(settings: HarvestSettings) -> HarvestServices {
    HarvestServices::new(create_mock_repository(), settings)
}

/// Create a running session and a pipeline for it
pub fn pipeline(services: &HarvestServices, strategy: Strategy) -> HarvestPipeline {
    let session_id = services
        .sessions
        .create(SERVER, RecordType::Mx, STUB_PROVIDER)
        .unwrap();
    let job = HarvestJob {
        session_id,
        record_type: RecordType::Mx,
        server: SERVER.to_string(),
        provider: STUB_PROVIDER.to_string(),
    };
    HarvestPipeline::new(job, strategy, services)
}

pub fn shared(provider: StubProvider) -> Arc<StubProvider> {
    Arc::new(provider)
}
