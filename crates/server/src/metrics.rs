//! Prometheus metrics for the Arklet server.
//!
//! Exposes counters for minting, resolution, authorization and batch work.
//!
//! # Security Note
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus scraping.
//! Metrics carry no identifiers or NAANs, only aggregate counts, but the
//! endpoint should still be network-restricted to the scraper.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{self, Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Minting metrics
pub static ARKS_MINTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("arklet_arks_minted_total", "Total number of ARKs minted")
        .expect("metric creation failed")
});

pub static MINT_COLLISIONS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "arklet_mint_collisions_total",
        "Total number of generated names that collided with an existing ARK",
    )
    .expect("metric creation failed")
});

pub static MINT_EXHAUSTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "arklet_mint_exhausted_total",
        "Total number of mint requests that ran out of attempts",
    )
    .expect("metric creation failed")
});

// Resolution metrics
pub static RESOLUTIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "arklet_resolutions_total",
            "Total number of resolution requests by outcome",
        ),
        &["outcome"],
    )
    .expect("metric creation failed")
});

// Authorization metrics
pub static AUTH_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "arklet_auth_failures_total",
        "Total number of requests rejected by the API key check",
    )
    .expect("metric creation failed")
});

// Batch metrics
pub static BATCH_REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "arklet_batch_requests_total",
            "Total number of batch requests by operation",
        ),
        &["operation"],
    )
    .expect("metric creation failed")
});

pub static BATCH_RECORDS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "arklet_batch_records_total",
            "Total number of records received in batch requests by operation",
        ),
        &["operation"],
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Idempotent, so tests can build many routers.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(ARKS_MINTED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(MINT_COLLISIONS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(MINT_EXHAUSTED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(RESOLUTIONS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(AUTH_FAILURES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BATCH_REQUESTS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BATCH_RECORDS.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Record the outcome of a resolution.
pub fn record_resolution(outcome: &str) {
    RESOLUTIONS.with_label_values(&[outcome]).inc();
}

/// Record a batch request and its size.
pub fn record_batch(operation: &str, records: usize) {
    BATCH_REQUESTS.with_label_values(&[operation]).inc();
    BATCH_RECORDS
        .with_label_values(&[operation])
        .inc_by(records as u64);
}
