//! HTTP API server for Arklet.
//!
//! This crate provides:
//! - Identifier minting, singly and in batches
//! - Record updates, authorized by per-NAAN API keys
//! - Resolution with prefix, authority and global fallbacks
//! - Status and Prometheus metrics endpoints

pub mod auth;
pub mod authz;
pub mod batch;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod minter;
pub mod ratelimit;
pub mod record;
pub mod resolver;
pub mod routes;
pub mod state;

pub use auth::TraceId;
pub use error::ApiError;
pub use minter::Minter;
pub use ratelimit::RateLimitState;
pub use resolver::Resolver;
pub use routes::create_router;
pub use state::AppState;
