//! Application state shared across handlers.

use crate::minter::Minter;
use crate::ratelimit::RateLimitState;
use crate::resolver::Resolver;
use arklet_core::config::AppConfig;
use arklet_metadata::MetadataStore;
use std::sync::Arc;
use std::time::Duration;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Record, key and authority store.
    pub metadata: Arc<dyn MetadataStore>,
    /// Identifier allocator.
    pub minter: Minter,
    /// Resolution engine.
    pub resolver: Resolver,
    /// Rate limiting state.
    pub rate_limit: RateLimitState,
}

impl AppState {
    /// Validate `config` and build the state around `metadata`.
    ///
    /// Rate limit warnings are logged; an invalid configuration is an error.
    pub fn new(config: AppConfig, metadata: Arc<dyn MetadataStore>) -> Result<Self, String> {
        for warning in config.validate()? {
            tracing::warn!("configuration warning: {warning}");
        }
        let minter = Minter::random(config.minter.noid_length);
        Ok(Self::with_minter(config, metadata, minter))
    }

    /// Like [`AppState::new`] with a caller-supplied minter and no validation.
    pub fn with_minter(config: AppConfig, metadata: Arc<dyn MetadataStore>, minter: Minter) -> Self {
        let resolver = Resolver::new(config.resolver.global_resolver_url.clone());
        let rate_limit = RateLimitState::new(&config.rate_limit);
        Self {
            config: Arc::new(config),
            metadata,
            minter,
            resolver,
            rate_limit,
        }
    }

    /// Sweep interval for the rate limiter, or `None` when it is disabled.
    pub fn rate_limit_cleanup_interval(&self) -> Option<Duration> {
        if !self.rate_limit.is_enabled() {
            return None;
        }
        let interval_secs = self.config.rate_limit.cleanup_interval_secs;
        // tokio::time::interval panics on zero.
        if interval_secs == 0 {
            tracing::warn!("rate_limit.cleanup_interval_secs is 0, using 60 seconds");
            Some(Duration::from_secs(60))
        } else {
            Some(Duration::from_secs(interval_secs))
        }
    }
}
