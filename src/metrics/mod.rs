//! Prometheus metrics for harvests and the HTTP surface
//!
//! This module provides metrics tracking for:
//! - Crawls: pages fetched, provider failures, dedup outcomes, harvest duration
//! - Storage: rows inserted, bulk-insert fallbacks, skipped rows
//! - Sessions: active harvests and terminal outcomes
//! - API: request counts and latency
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram_vec, Counter,
    CounterVec, Encoder, Gauge, HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for crawl metrics
struct HarvestMetrics {
    pages: CounterVec,
    fetch_errors: CounterVec,
    dedup: CounterVec,
    harvest_duration: HistogramVec,
    active_harvests: Gauge,
    sessions_finished: CounterVec,
}

/// Container for storage metrics
struct StorageMetrics {
    records_inserted: Counter,
    bulk_fallbacks: Counter,
    insert_failures: Counter,
}

/// Container for API metrics
struct ApiMetrics {
    requests: CounterVec,
    duration: HistogramVec,
}

static HARVEST_METRICS: OnceLock<HarvestMetrics> = OnceLock::new();

static STORAGE_METRICS: OnceLock<StorageMetrics> = OnceLock::new();

static API_METRICS: OnceLock<ApiMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// Call once at startup. If registration fails the error is returned and
/// every recording function stays a no-op.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = revharvest::metrics::init_metrics() {
///     eprintln!("Warning: Metrics initialization failed: {}", e);
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    // Prevent double initialization
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let harvest = HarvestMetrics {
        pages: register_counter_vec!(
            "revharvest_pages_total",
            "Provider pages fetched, by outcome",
            &["provider", "strategy", "outcome"]
        )?,
        fetch_errors: register_counter_vec!(
            "revharvest_fetch_errors_total",
            "Failed provider requests by failure kind",
            &["provider", "kind"]
        )?,
        dedup: register_counter_vec!(
            "revharvest_dedup_records_total",
            "Raw provider records by deduplication outcome",
            &["provider", "outcome"]
        )?,
        harvest_duration: register_histogram_vec!(
            "revharvest_harvest_duration_seconds",
            "Wall-clock duration of a harvest",
            &["strategy"],
            vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0, 7200.0]
        )?,
        active_harvests: register_gauge!(
            "revharvest_active_harvests",
            "Harvests currently running"
        )?,
        sessions_finished: register_counter_vec!(
            "revharvest_sessions_finished_total",
            "Harvest sessions reaching a terminal state",
            &["status"]
        )?,
    };

    let storage = StorageMetrics {
        records_inserted: register_counter!(
            "revharvest_records_inserted_total",
            "Domain rows newly inserted"
        )?,
        bulk_fallbacks: register_counter!(
            "revharvest_bulk_insert_fallbacks_total",
            "Batches retried record by record"
        )?,
        insert_failures: register_counter!(
            "revharvest_insert_failures_total",
            "Individual rows skipped after an insert error"
        )?,
    };

    let api = ApiMetrics {
        requests: register_counter_vec!(
            "revharvest_api_requests_total",
            "Total API requests by endpoint and status",
            &["endpoint", "status"]
        )?,
        duration: register_histogram_vec!(
            "revharvest_api_request_duration_seconds",
            "API request duration in seconds",
            &["endpoint"],
            vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
        )?,
    };

    HARVEST_METRICS
        .set(harvest)
        .map_err(|_| "Harvest metrics already initialized")?;
    STORAGE_METRICS
        .set(storage)
        .map_err(|_| "Storage metrics already initialized")?;
    API_METRICS
        .set(api)
        .map_err(|_| "API metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record one fetched page
pub fn record_page(provider: &str, strategy: &str, productive: bool) {
    if let Some(m) = HARVEST_METRICS.get() {
        let outcome = if productive { "productive" } else { "empty" };
        m.pages
            .with_label_values(&[provider, strategy, outcome])
            .inc();
    }
}

/// Record a failed provider request
pub fn record_fetch_error(provider: &str, kind: &str) {
    if let Some(m) = HARVEST_METRICS.get() {
        m.fetch_errors.with_label_values(&[provider, kind]).inc();
    }
}

/// Record deduplication outcomes for one page
pub fn record_dedup(provider: &str, admitted: u64, duplicates: u64, malformed: u64) {
    let Some(m) = HARVEST_METRICS.get() else {
        return;
    };

    for (outcome, count) in [
        ("admitted", admitted),
        ("duplicate", duplicates),
        ("malformed", malformed),
    ] {
        if count > 0 {
            m.dedup
                .with_label_values(&[provider, outcome])
                .inc_by(count as f64);
        }
    }
}

/// Record newly inserted rows
pub fn record_inserted(count: u64) {
    if count == 0 {
        return;
    }
    if let Some(m) = STORAGE_METRICS.get() {
        m.records_inserted.inc_by(count as f64);
    }
}

/// Record a bulk insert that fell back to per-record writes
pub fn record_bulk_fallback() {
    if let Some(m) = STORAGE_METRICS.get() {
        m.bulk_fallbacks.inc();
    }
}

/// Record a row skipped after an insert error
pub fn record_insert_failure() {
    if let Some(m) = STORAGE_METRICS.get() {
        m.insert_failures.inc();
    }
}

/// Mark a harvest as started
pub fn harvest_started() {
    if let Some(m) = HARVEST_METRICS.get() {
        m.active_harvests.inc();
    }
}

/// Mark a harvest as finished with its terminal status
pub fn harvest_finished(status: &str) {
    if let Some(m) = HARVEST_METRICS.get() {
        m.active_harvests.dec();
        m.sessions_finished.with_label_values(&[status]).inc();
    }
}

/// Record API request
pub fn record_api_request(endpoint: &str, status: u16, duration_secs: f64) {
    let Some(m) = API_METRICS.get() else {
        return;
    };

    let status_str = status.to_string();
    m.requests
        .with_label_values(&[endpoint, &status_str])
        .inc();
    m.duration
        .with_label_values(&[endpoint])
        .observe(duration_secs);
}

/// Histogram timer guard that records duration on drop
pub struct MetricsTimer {
    timer: Option<prometheus::HistogramTimer>,
}

impl MetricsTimer {
    fn new(timer: prometheus::HistogramTimer) -> Self {
        Self { timer: Some(timer) }
    }

    /// Create a no-op timer when metrics are not initialized
    fn noop() -> Self {
        Self { timer: None }
    }
}

impl Drop for MetricsTimer {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop_and_record();
        }
    }
}

/// Start a harvest timer (returns a timer handle)
pub fn start_harvest_timer(strategy: &str) -> MetricsTimer {
    match HARVEST_METRICS.get() {
        Some(m) => MetricsTimer::new(
            m.harvest_duration
                .with_label_values(&[strategy])
                .start_timer(),
        ),
        None => MetricsTimer::noop(),
    }
}

// ============================================================================
// Tests
// ============================================================================
