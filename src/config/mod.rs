//! Configuration management for the harvester
//!
//! Configuration is loaded from a TOML file or from environment variables and
//! validated before any component is constructed from it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Upstream provider credentials and endpoints
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Crawl thresholds and pacing
    #[serde(default)]
    pub harvest: HarvestConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// HTTP surface configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider used when a request does not name one
    pub default: String,

    /// ViewDNS API key (optional, provider disabled without it)
    pub viewdns_api_key: Option<String>,

    /// SecurityTrails API key (optional, provider disabled without it)
    pub securitytrails_api_key: Option<String>,

    /// ViewDNS API base URL
    pub viewdns_base_url: String,

    /// SecurityTrails API base URL
    pub securitytrails_base_url: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// User agent string
    pub user_agent: String,
}

/// Crawl thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Delay between consecutive provider requests in milliseconds
    pub request_delay_ms: u64,

    /// Consecutive empty pages that end a sequential crawl
    pub max_empty_pages: u32,

    /// Consecutive empty pages that end one bypass segment
    pub segment_max_empty_pages: u32,

    /// Page cap applied to every bypass segment
    pub bypass_page_cap: u32,

    /// Page sizes tried by the bypass crawler before prefix segmentation
    pub bypass_page_sizes: Vec<u32>,

    /// Unique domain count after which remaining bypass segments are skipped
    pub soft_domain_ceiling: usize,

    /// Maximum continuation requests for one scroll crawl
    pub scroll_batch_ceiling: u32,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

/// HTTP surface configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (host:port)
    pub bind_address: String,

    /// Enable permissive CORS
    pub enable_cors: bool,

    /// Enable request tracing
    pub enable_request_logging: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            default: String::from("viewdns"),
            viewdns_api_key: None,
            securitytrails_api_key: None,
            viewdns_base_url: String::from("https://api.viewdns.info"),
            securitytrails_base_url: String::from("https://api.securitytrails.com/v1"),
            request_timeout_secs: 30,
            user_agent: format!("revharvest/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: 1000,
            max_empty_pages: 3,
            segment_max_empty_pages: 2,
            bypass_page_cap: 100,
            bypass_page_sizes: vec![500, 1000],
            soft_domain_ceiling: 500_000,
            scroll_batch_ceiling: 500,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/domains.db"),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: String::from("0.0.0.0:5000"),
            enable_cors: true,
            enable_request_logging: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            harvest: HarvestConfig::default(),
            database: DatabaseConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Unset variables fall back to [`Config::default`].
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let provider = ProviderConfig {
            default: env_non_empty("API_PROVIDER")
                .map(|p| p.to_lowercase())
                .unwrap_or(defaults.provider.default),
            viewdns_api_key: env_non_empty("VIEWDNS_API_KEY"),
            securitytrails_api_key: env_non_empty("SECURITYTRAILS_API_KEY"),
            viewdns_base_url: env_non_empty("REVHARVEST_VIEWDNS_URL")
                .unwrap_or(defaults.provider.viewdns_base_url),
            securitytrails_base_url: env_non_empty("REVHARVEST_SECURITYTRAILS_URL")
                .unwrap_or(defaults.provider.securitytrails_base_url),
            request_timeout_secs: env_parse("REVHARVEST_REQUEST_TIMEOUT")
                .unwrap_or(defaults.provider.request_timeout_secs),
            user_agent: env_non_empty("REVHARVEST_USER_AGENT")
                .unwrap_or(defaults.provider.user_agent),
        };

        let harvest = HarvestConfig {
            request_delay_ms: env_parse("REVHARVEST_REQUEST_DELAY_MS")
                .unwrap_or(defaults.harvest.request_delay_ms),
            ..defaults.harvest
        };

        let database = DatabaseConfig {
            sqlite_path: env_non_empty("REVHARVEST_SQLITE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database.sqlite_path),
        };

        let server = ServerConfig {
            bind_address: env_non_empty("REVHARVEST_BIND").unwrap_or(defaults.server.bind_address),
            ..defaults.server
        };

        let logging = LoggingConfig {
            level: env_non_empty("REVHARVEST_LOG_LEVEL").unwrap_or(defaults.logging.level),
            format: env_non_empty("REVHARVEST_LOG_FORMAT").unwrap_or(defaults.logging.format),
        };

        Ok(Self {
            provider,
            harvest,
            database,
            server,
            logging,
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load from `path` when given, otherwise from the environment, then validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.provider.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        if self.provider.default.trim().is_empty() {
            anyhow::bail!("default provider must not be empty");
        }

        if self.harvest.max_empty_pages == 0 || self.harvest.segment_max_empty_pages == 0 {
            anyhow::bail!("empty page thresholds must be greater than 0");
        }

        if self.harvest.bypass_page_cap == 0 {
            anyhow::bail!("bypass_page_cap must be greater than 0");
        }

        if self.harvest.bypass_page_sizes.is_empty()
            || self.harvest.bypass_page_sizes.contains(&0)
        {
            anyhow::bail!("bypass_page_sizes must contain only positive sizes");
        }

        if self.harvest.soft_domain_ceiling == 0 {
            anyhow::bail!("soft_domain_ceiling must be greater than 0");
        }

        if self.harvest.scroll_batch_ceiling == 0 {
            anyhow::bail!("scroll_batch_ceiling must be greater than 0");
        }

        self.server
            .bind_address
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid bind address: {}", self.server.bind_address))?;

        Ok(())
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.provider.request_timeout_secs)
    }

    /// Get inter-request delay as Duration
    #[must_use]
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.harvest.request_delay_ms)
    }
}
