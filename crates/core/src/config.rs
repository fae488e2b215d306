//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Serve only resolution and status routes (no minting or updates).
    #[serde(default)]
    pub resolver_only: bool,
    /// Enable the /metrics endpoint for Prometheus scraping.
    /// The endpoint is unauthenticated; restrict it at the network level.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
    /// Maximum accepted request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            resolver_only: false,
            metrics_enabled: default_metrics_enabled(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Minting configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MinterConfig {
    /// Number of generated characters before the check character.
    #[serde(default = "default_noid_length")]
    pub noid_length: usize,
}

fn default_noid_length() -> usize {
    crate::DEFAULT_NOID_LENGTH
}

impl Default for MinterConfig {
    fn default() -> Self {
        Self {
            noid_length: default_noid_length(),
        }
    }
}

impl MinterConfig {
    /// Longest accepted name length.
    pub const MAX_NOID_LENGTH: usize = 64;

    pub fn validate(&self) -> Result<(), String> {
        if self.noid_length == 0 || self.noid_length > Self::MAX_NOID_LENGTH {
            return Err(format!(
                "minter.noid_length must be between 1 and {}, got {}",
                Self::MAX_NOID_LENGTH,
                self.noid_length
            ));
        }
        Ok(())
    }
}

/// Resolution configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Resolver that receives ARKs whose NAAN is not registered locally.
    #[serde(default = "default_global_resolver_url")]
    pub global_resolver_url: String,
}

fn default_global_resolver_url() -> String {
    crate::DEFAULT_GLOBAL_RESOLVER.to_string()
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            global_resolver_url: default_global_resolver_url(),
        }
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<(), String> {
        let url = url::Url::parse(&self.global_resolver_url)
            .map_err(|e| format!("resolver.global_resolver_url is not a URL: {e}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err("resolver.global_resolver_url must use http or https".to_string());
        }
        Ok(())
    }
}

/// PostgreSQL SSL mode configuration.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PgSslMode {
    /// Disable SSL/TLS entirely.
    Disable,
    /// Prefer SSL/TLS but allow unencrypted connections (default).
    #[default]
    Prefer,
    /// Require SSL/TLS for all connections.
    Require,
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database (single node deployments).
    Sqlite {
        /// Database file path.
        path: PathBuf,
        /// Lock wait in seconds before a write gives up with "database is locked".
        #[serde(default = "default_sqlite_busy_timeout_secs")]
        busy_timeout_secs: Option<u64>,
    },
    /// PostgreSQL database.
    Postgres {
        /// Connection URL. Takes precedence over individual fields.
        url: Option<String>,
        /// Database host.
        host: Option<String>,
        /// Database port (default: 5432).
        #[serde(default = "default_pg_port")]
        port: Option<u16>,
        /// Database username.
        username: Option<String>,
        /// Database password. Prefer ARKLET_METADATA__PASSWORD over the config file.
        password: Option<String>,
        /// Database name.
        database: Option<String>,
        /// SSL mode for connections.
        ssl_mode: Option<PgSslMode>,
        /// Maximum connections in the pool.
        #[serde(default = "default_max_connections")]
        max_connections: u32,
        /// Statement timeout in milliseconds. PostgreSQL cancels longer queries.
        #[serde(default = "default_statement_timeout_ms")]
        statement_timeout_ms: Option<u64>,
    },
}

fn default_max_connections() -> u32 {
    10
}

fn default_pg_port() -> Option<u16> {
    Some(5432)
}

fn default_statement_timeout_ms() -> Option<u64> {
    Some(30_000)
}

fn default_sqlite_busy_timeout_secs() -> Option<u64> {
    Some(5)
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/arklet.db"),
            busy_timeout_secs: default_sqlite_busy_timeout_secs(),
        }
    }
}

impl MetadataConfig {
    /// Validate metadata configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            MetadataConfig::Sqlite { .. } => Ok(()),
            MetadataConfig::Postgres {
                url,
                host,
                database,
                ..
            } => match (url.as_ref(), host.as_ref(), database.as_ref()) {
                (Some(_), _, _) => Ok(()),
                (None, Some(_), Some(_)) => Ok(()),
                (None, None, _) => Err(
                    "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                ),
                (None, Some(_), None) => Err(
                    "postgres config requires 'database' when using individual fields".to_string(),
                ),
            },
        }
    }
}

/// Per-IP rate limiting configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    #[serde(default)]
    pub enabled: bool,
    /// Sustained requests per minute per client IP.
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    /// Burst allowance above the sustained rate.
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,
    /// Proxies whose X-Forwarded-For / X-Real-IP headers are trusted.
    /// Empty means never trust them; `["*"]` trusts every peer.
    #[serde(default)]
    pub trusted_proxies: Vec<String>,
    /// Maximum number of tracked client IPs; new clients beyond this get 429.
    #[serde(default = "default_max_entries")]
    pub max_entries: u32,
    /// Seconds between sweeps of idle limiter entries.
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
    /// Seconds a client may stay idle before its entry is swept.
    #[serde(default = "default_entry_ttl_secs")]
    pub entry_ttl_secs: u64,
}

fn default_requests_per_minute() -> u32 {
    120
}

fn default_burst_size() -> u32 {
    20
}

fn default_max_entries() -> u32 {
    100_000
}

fn default_cleanup_interval_secs() -> u64 {
    60
}

fn default_entry_ttl_secs() -> u64 {
    600
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_minute: default_requests_per_minute(),
            burst_size: default_burst_size(),
            trusted_proxies: Vec::new(),
            max_entries: default_max_entries(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            entry_ttl_secs: default_entry_ttl_secs(),
        }
    }
}

impl RateLimitConfig {
    /// Returns warnings for risky but allowed settings, or an error for
    /// settings that cannot work.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();
        if !self.enabled {
            return Ok(warnings);
        }
        if self.requests_per_minute == 0 || self.burst_size == 0 {
            return Err(
                "rate_limit.requests_per_minute and rate_limit.burst_size must be non-zero"
                    .to_string(),
            );
        }
        if self.cleanup_interval_secs == 0 {
            return Err("rate_limit.cleanup_interval_secs cannot be 0".to_string());
        }
        if self.trusted_proxies.len() == 1 && self.trusted_proxies[0] == "*" {
            warnings.push(
                "rate_limit.trusted_proxies=['*'] lets any client choose its own IP \
                 through forwarded headers"
                    .to_string(),
            );
        }
        Ok(warnings)
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub minter: MinterConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    /// Validate every section. Returns rate limit warnings on success.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        self.minter.validate()?;
        self.resolver.validate()?;
        self.metadata.validate()?;
        self.rate_limit.validate()
    }

    /// Configuration for tests: SQLite at `db_path`, everything else default.
    pub fn for_testing(db_path: impl Into<PathBuf>) -> Self {
        Self {
            metadata: MetadataConfig::Sqlite {
                path: db_path.into(),
                busy_timeout_secs: None,
            },
            ..Default::default()
        }
    }
}
