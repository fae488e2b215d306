//! Per-client-IP rate limiting with a token bucket.
//!
//! Every route sits behind the limiter, including resolution. The main
//! thing it protects is key verification: each mint or update attempt
//! costs one Argon2 hash per active key of the NAAN.
//!
//! # Memory Safety
//!
//! - At most `max_entries` client IPs are tracked; new clients beyond that
//!   are turned away until a sweep frees room.
//! - Entries idle for longer than `entry_ttl_secs` are swept by a background
//!   task, and the governor limiter is rebuilt once enough of them are gone.
//!
//! # Security Note
//!
//! X-Forwarded-For and X-Real-IP are ignored unless the direct peer is in
//! `trusted_proxies`:
//!
//! - Empty list (default): only the connection IP is used
//! - List of IPs/CIDRs: headers trusted only from those peers
//! - ["*"]: headers trusted from everyone (development only)

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use arklet_core::config::RateLimitConfig;
use dashmap::{DashMap, mapref::entry::Entry};
use governor::{
    Quota, RateLimiter, clock::DefaultClock, middleware::NoOpMiddleware, state::InMemoryState,
};
use ipnet::IpNet;
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    sync::{
        Arc, RwLock,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

type IpLimiter = RateLimiter<String, DashMap<String, InMemoryState>, DefaultClock, NoOpMiddleware>;

/// Fraction of tracked entries that must be evicted before the limiter is rebuilt.
const REBUILD_EVICTION_THRESHOLD_FRACTION: f64 = 0.10;

/// Evictions that always justify a rebuild.
const REBUILD_EVICTION_MIN_COUNT: usize = 100;

/// Rebuild at least this often when anything was evicted.
const REBUILD_MIN_INTERVAL: Duration = Duration::from_secs(300);

/// Rate limiter state shared across requests. Cheap to clone.
#[derive(Clone)]
pub struct RateLimitState {
    inner: Option<Arc<RateLimitStateInner>>,
}

struct RateLimitStateInner {
    /// Behind a lock so a sweep can swap in a fresh limiter.
    limiter: RwLock<IpLimiter>,
    last_access: DashMap<String, Instant>,
    trusted_proxies: TrustedProxies,
    max_entries: u32,
    entry_ttl: Duration,
    quota: Quota,
    last_rebuild: RwLock<Instant>,
    connect_info_warned: AtomicBool,
    at_capacity_warned: AtomicBool,
}

#[derive(Clone, Debug)]
enum TrustedEntry {
    Ip(IpAddr),
    Cidr(IpNet),
}

#[derive(Clone, Debug)]
enum TrustedProxies {
    None,
    All,
    List(Vec<TrustedEntry>),
}

impl TrustedProxies {
    fn from_config(proxies: &[String]) -> Self {
        if proxies.is_empty() {
            Self::None
        } else if proxies.len() == 1 && proxies[0] == "*" {
            Self::All
        } else {
            let entries = proxies
                .iter()
                .filter_map(|p| {
                    if p.contains('/') {
                        match p.parse::<IpNet>() {
                            Ok(net) => Some(TrustedEntry::Cidr(net)),
                            Err(e) => {
                                tracing::warn!(proxy = %p, error = %e, "ignoring invalid CIDR in trusted_proxies");
                                None
                            }
                        }
                    } else {
                        match p.parse::<IpAddr>() {
                            Ok(ip) => Some(TrustedEntry::Ip(ip)),
                            Err(e) => {
                                tracing::warn!(proxy = %p, error = %e, "ignoring invalid IP in trusted_proxies");
                                None
                            }
                        }
                    }
                })
                .collect();
            Self::List(entries)
        }
    }

    fn is_trusted(&self, peer: &str) -> bool {
        match self {
            Self::None => false,
            Self::All => true,
            Self::List(entries) => {
                let Ok(ip) = peer.parse::<IpAddr>() else {
                    return false;
                };
                entries.iter().any(|entry| match entry {
                    TrustedEntry::Ip(trusted) => *trusted == ip,
                    TrustedEntry::Cidr(network) => network.contains(&ip),
                })
            }
        }
    }
}

fn recover<T>(lock: std::sync::LockResult<T>, what: &str) -> T {
    lock.unwrap_or_else(|poisoned| {
        tracing::warn!(lock = what, "rate limiter lock was poisoned, recovering");
        poisoned.into_inner()
    })
}

impl RateLimitState {
    /// Build the limiter; a disabled config yields a no-op state.
    pub fn new(config: &RateLimitConfig) -> Self {
        if !config.enabled {
            return Self { inner: None };
        }

        let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_minute(per_minute).allow_burst(burst);

        Self {
            inner: Some(Arc::new(RateLimitStateInner {
                limiter: RwLock::new(RateLimiter::dashmap(quota)),
                last_access: DashMap::new(),
                trusted_proxies: TrustedProxies::from_config(&config.trusted_proxies),
                max_entries: config.max_entries,
                entry_ttl: Duration::from_secs(config.entry_ttl_secs),
                quota,
                last_rebuild: RwLock::new(Instant::now()),
                connect_info_warned: AtomicBool::new(false),
                at_capacity_warned: AtomicBool::new(false),
            })),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Charge one request to `ip`.
    pub fn check_ip(&self, ip: &str) -> Result<(), RateLimitError> {
        let Some(inner) = &self.inner else {
            return Ok(());
        };

        let now = Instant::now();
        // len() must not be called while holding an entry guard.
        let current_len = inner.last_access.len();
        let at_capacity = current_len >= inner.max_entries as usize;

        match inner.last_access.entry(ip.to_string()) {
            Entry::Occupied(mut entry) => {
                entry.insert(now);
            }
            Entry::Vacant(entry) => {
                if at_capacity {
                    if !inner.at_capacity_warned.swap(true, Ordering::Relaxed) {
                        tracing::warn!(
                            current_entries = current_len,
                            max_entries = inner.max_entries,
                            "rate limiter at capacity, rejecting new clients"
                        );
                    }
                    return Err(RateLimitError {
                        retry_after_secs: 60,
                        reason: RateLimitReason::AtCapacity,
                    });
                }
                entry.insert(now);
            }
        }

        let limiter = recover(inner.limiter.read(), "limiter");
        match limiter.check_key(&ip.to_string()) {
            Ok(()) => Ok(()),
            Err(not_until) => {
                let wait = not_until.wait_time_from(governor::clock::Clock::now(
                    &DefaultClock::default(),
                ));
                Err(RateLimitError {
                    retry_after_secs: wait.as_secs() + 1,
                    reason: RateLimitReason::RateLimited,
                })
            }
        }
    }

    /// Forget clients idle for longer than the entry TTL. Returns how many
    /// were evicted.
    pub fn cleanup(&self) -> usize {
        let Some(inner) = &self.inner else {
            return 0;
        };

        let now = Instant::now();
        let ttl = inner.entry_ttl;
        let stale: Vec<String> = inner
            .last_access
            .iter()
            .filter(|entry| now.duration_since(*entry.value()) > ttl)
            .map(|entry| entry.key().clone())
            .collect();

        let mut evicted = 0;
        for key in stale {
            // Re-check under the shard lock; the client may have come back.
            if inner
                .last_access
                .remove_if(&key, |_, last| now.duration_since(*last) > ttl)
                .is_some()
            {
                evicted += 1;
            }
        }
        if evicted == 0 {
            return 0;
        }

        // governor's keyed state cannot drop single keys, so memory is only
        // reclaimed by replacing the limiter, which also resets every bucket.
        let before = inner.last_access.len() + evicted;
        let threshold = ((before as f64 * REBUILD_EVICTION_THRESHOLD_FRACTION) as usize)
            .max(REBUILD_EVICTION_MIN_COUNT);
        let due = now.duration_since(*recover(inner.last_rebuild.read(), "last_rebuild"))
            >= REBUILD_MIN_INTERVAL;
        if evicted >= threshold || due {
            *recover(inner.limiter.write(), "limiter") = RateLimiter::dashmap(inner.quota);
            *recover(inner.last_rebuild.write(), "last_rebuild") = Instant::now();
            tracing::debug!(evicted, remaining = inner.last_access.len(), "rebuilt rate limiter");
        }

        inner.at_capacity_warned.store(false, Ordering::Relaxed);
        evicted
    }

    /// Number of client IPs currently tracked.
    pub fn entry_count(&self) -> usize {
        self.inner.as_ref().map_or(0, |inner| inner.last_access.len())
    }

    fn client_ip(&self, req: &Request<Body>) -> String {
        let Some(inner) = &self.inner else {
            return "unknown".to_string();
        };

        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string());

        let trust_headers = match (&peer, &inner.trusted_proxies) {
            (None, TrustedProxies::All) => true,
            (None, _) => false,
            (Some(peer), proxies) => proxies.is_trusted(peer),
        };
        if trust_headers && let Some(forwarded) = forwarded_ip(req) {
            return forwarded;
        }

        match peer {
            Some(ip) => ip,
            None => {
                if !inner.connect_info_warned.swap(true, Ordering::Relaxed) {
                    tracing::warn!(
                        "ConnectInfo not available; all clients share one rate limit bucket"
                    );
                }
                "unknown".to_string()
            }
        }
    }
}

fn forwarded_ip(req: &Request<Body>) -> Option<String> {
    if let Some(forwarded) = req.headers().get("x-forwarded-for")
        && let Ok(s) = forwarded.to_str()
        && let Some(first) = s.split(',').next()
    {
        return Some(first.trim().to_string());
    }
    req.headers()
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitReason {
    RateLimited,
    /// Too many distinct clients are being tracked.
    AtCapacity,
}

/// Rejection returned by [`RateLimitState::check_ip`].
#[derive(Debug)]
pub struct RateLimitError {
    pub retry_after_secs: u64,
    pub reason: RateLimitReason,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let (code, message) = match self.reason {
            RateLimitReason::RateLimited => (
                "rate_limit_exceeded",
                format!(
                    "rate limit exceeded, retry after {} seconds",
                    self.retry_after_secs
                ),
            ),
            RateLimitReason::AtCapacity => (
                "rate_limiter_at_capacity",
                "server is under heavy load, retry later".to_string(),
            ),
        };
        let body = serde_json::json!({
            "code": code,
            "message": message,
        });
        (
            StatusCode::TOO_MANY_REQUESTS,
            [("Retry-After", self.retry_after_secs.to_string())],
            axum::Json(body),
        )
            .into_response()
    }
}

/// Per-IP rate limiting middleware.
pub async fn ip_rate_limit_middleware(
    State(rate_limit): State<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !rate_limit.is_enabled() {
        return next.run(req).await;
    }
    let ip = rate_limit.client_ip(&req);
    match rate_limit.check_ip(&ip) {
        Ok(()) => next.run(req).await,
        Err(e) => {
            tracing::debug!(ip = %ip, reason = ?e.reason, "request rate limited");
            e.into_response()
        }
    }
}

/// Periodically sweep idle entries.
pub fn spawn_cleanup_task(state: RateLimitState, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let evicted = state.cleanup();
            if evicted > 0 {
                tracing::info!(evicted, "rate limiter evicted idle clients");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled(burst_size: u32, max_entries: u32) -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            requests_per_minute: 60,
            burst_size,
            max_entries,
            ..Default::default()
        }
    }

    #[test]
    fn test_disabled_allows_everything() {
        let state = RateLimitState::new(&RateLimitConfig::default());
        assert!(!state.is_enabled());
        for _ in 0..1000 {
            assert!(state.check_ip("127.0.0.1").is_ok());
        }
    }

    #[test]
    fn test_burst_then_limited() {
        let state = RateLimitState::new(&enabled(5, 1000));
        for _ in 0..5 {
            assert!(state.check_ip("127.0.0.1").is_ok());
        }
        let err = state.check_ip("127.0.0.1").unwrap_err();
        assert_eq!(err.reason, RateLimitReason::RateLimited);
        assert!(err.retry_after_secs >= 1);

        // Other clients have their own bucket.
        assert!(state.check_ip("192.168.1.1").is_ok());
    }

    #[test]
    fn test_capacity_rejects_new_clients_only() {
        let state = RateLimitState::new(&enabled(5, 2));
        assert!(state.check_ip("1.1.1.1").is_ok());
        assert!(state.check_ip("2.2.2.2").is_ok());
        let err = state.check_ip("3.3.3.3").unwrap_err();
        assert_eq!(err.reason, RateLimitReason::AtCapacity);
        assert!(state.check_ip("1.1.1.1").is_ok());
    }

    #[test]
    fn test_cleanup_evicts_idle_clients() {
        let state = RateLimitState::new(&RateLimitConfig {
            entry_ttl_secs: 0,
            ..enabled(5, 1000)
        });
        state.check_ip("1.1.1.1").unwrap();
        state.check_ip("2.2.2.2").unwrap();
        assert_eq!(state.entry_count(), 2);

        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(state.cleanup(), 2);
        assert_eq!(state.entry_count(), 0);
    }

    #[test]
    fn test_trusted_proxies() {
        assert!(!TrustedProxies::from_config(&[]).is_trusted("127.0.0.1"));
        assert!(TrustedProxies::from_config(&["*".to_string()]).is_trusted("10.0.0.1"));

        let proxies =
            TrustedProxies::from_config(&["127.0.0.1".to_string(), "10.0.0.0/8".to_string()]);
        assert!(proxies.is_trusted("127.0.0.1"));
        assert!(proxies.is_trusted("10.255.255.255"));
        assert!(!proxies.is_trusted("192.168.1.1"));
        assert!(!proxies.is_trusted("not an ip"));
    }

    #[test]
    fn test_forwarded_headers_need_trusted_peer() {
        let request = |peer: &str| {
            let mut req = Request::builder()
                .uri("/")
                .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
                .body(Body::empty())
                .unwrap();
            req.extensions_mut()
                .insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
            req
        };

        let state = RateLimitState::new(&RateLimitConfig {
            trusted_proxies: vec!["10.0.0.0/8".to_string()],
            ..enabled(5, 1000)
        });
        assert_eq!(state.client_ip(&request("10.1.2.3:4000")), "203.0.113.9");
        assert_eq!(state.client_ip(&request("198.51.100.7:4000")), "198.51.100.7");
    }
}
