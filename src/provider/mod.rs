//! Reverse-lookup providers
//!
//! A provider answers "which domains use this MX/NS server?" one page at a
//! time. All crawl strategies talk to providers through the single
//! [`ReverseLookupProvider::fetch_page`] capability; the [`Cursor`] decides
//! whether a request is an offset page, the opening request of a scroll, or
//! a scroll continuation.

pub mod envelope;
pub mod securitytrails;
pub mod viewdns;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::models::RecordType;
use crate::utils::error::FetchError;

pub use securitytrails::SecurityTrailsProvider;
pub use viewdns::ViewDnsProvider;

// ============================================================================
// Core Types
// ============================================================================

/// Crawl strategy used for a harvest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Sequential offset pagination
    Paginate,
    /// Cursor-based scroll, degrading to pagination
    Scroll,
    /// Page-size probing followed by hostname-prefix segmentation
    Bypass,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paginate => "paginate",
            Self::Scroll => "scroll",
            Self::Bypass => "bypass",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "paginate" | "pagination" | "standard" => Some(Self::Paginate),
            "scroll" => Some(Self::Scroll),
            "bypass" | "multi" => Some(Self::Bypass),
            _ => None,
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown strategy: {s} (expected paginate, scroll or bypass)"))
    }
}

/// What to look up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupQuery {
    pub record_type: RecordType,
    pub server: String,
    /// Hostname pattern such as `a*`, for providers that support compound filters
    pub hostname_prefix: Option<String>,
    pub page_size: Option<u32>,
}

impl LookupQuery {
    pub fn new(record_type: RecordType, server: impl Into<String>) -> Self {
        Self {
            record_type,
            server: server.into(),
            hostname_prefix: None,
            page_size: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.hostname_prefix = Some(prefix.into());
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Short description for log lines
    pub fn label(&self) -> String {
        let mut label = format!("{}={}", self.record_type, self.server);
        if let Some(prefix) = &self.hostname_prefix {
            label.push_str(&format!(" hostname={prefix}"));
        }
        if let Some(size) = self.page_size {
            label.push_str(&format!(" limit={size}"));
        }
        label
    }
}

/// One candidate endpoint for opening a scroll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollEndpoint {
    /// Position in the provider's preference order
    pub index: usize,
    pub label: String,
}

/// Position of a request within a crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// 1-based offset page
    Page(u32),
    /// Opening request against one scroll endpoint
    OpenScroll(ScrollEndpoint),
    /// Continuation token from a previous scroll response
    Continue(String),
}

impl Cursor {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Page(_) => "page",
            Self::OpenScroll(_) => "scroll-open",
            Self::Continue(_) => "scroll-continue",
        }
    }
}

/// One provider response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Raw records, normalized later by the deduplicator
    pub records: Vec<Value>,
    /// Continuation cursor, if the provider handed one back
    pub next: Option<Cursor>,
    /// Total record count the provider claims for the query
    pub declared_total: Option<u64>,
    /// Highest page number the provider will serve for the query
    pub max_page: Option<u32>,
}

impl Page {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Continuation token, if the next cursor is one
    pub fn continuation(&self) -> Option<&str> {
        match &self.next {
            Some(Cursor::Continue(token)) => Some(token.as_str()),
            _ => None,
        }
    }
}

// ============================================================================
// Provider Trait
// ============================================================================

/// Unified page-retrieval capability
#[async_trait]
pub trait ReverseLookupProvider: Send + Sync {
    /// Provider name as stored with each record
    fn name(&self) -> &str;

    /// Strategy used when the caller does not pick one
    fn preferred_strategy(&self) -> Strategy {
        Strategy::Paginate
    }

    /// Scroll endpoints in preference order; empty when scrolling is unsupported
    fn scroll_endpoints(&self) -> Vec<ScrollEndpoint> {
        Vec::new()
    }

    /// Whether `hostname_prefix` and `page_size` actually narrow the result set
    ///
    /// Bypass crawling is only meaningful when they do.
    fn supports_segmentation(&self) -> bool {
        false
    }

    /// Fetch one page for `query` at `cursor`
    async fn fetch_page(&self, query: &LookupQuery, cursor: &Cursor) -> std::result::Result<Page, FetchError>;
}

/// Thread-safe shared provider
pub type SharedProvider = Arc<dyn ReverseLookupProvider>;

/// Providers available to the harvester, keyed by name
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, SharedProvider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from configuration
    ///
    /// Providers without an API key are skipped.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let mut registry = Self::new();

        if let Some(key) = &config.viewdns_api_key {
            let provider = ViewDnsProvider::new(&config.viewdns_base_url, key, timeout)?
                .with_user_agent(&config.user_agent)?;
            registry.register(Arc::new(provider));
        }

        if let Some(key) = &config.securitytrails_api_key {
            let provider =
                SecurityTrailsProvider::new(&config.securitytrails_base_url, key, timeout)?
                    .with_user_agent(&config.user_agent)?;
            registry.register(Arc::new(provider));
        }

        if registry.providers.is_empty() {
            tracing::warn!("No provider API keys configured; harvests will be rejected");
        }

        Ok(registry)
    }

    pub fn register(&mut self, provider: SharedProvider) {
        tracing::debug!(provider = provider.name(), "Provider registered");
        self.providers.insert(provider.name().to_lowercase(), provider);
    }

    pub fn with(mut self, provider: SharedProvider) -> Self {
        self.register(provider);
        self
    }

    /// Look up a provider by name (case-insensitive)
    pub fn get(&self, name: &str) -> Result<SharedProvider> {
        self.providers
            .get(&name.trim().to_lowercase())
            .cloned()
            .ok_or_else(|| Error::config(format!("provider '{name}' is not configured")))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }
}
