//! Core domain types and shared logic for Arklet.
//!
//! This crate defines the identifier model used by every other crate:
//! - NOID name generation and check characters
//! - ARK parsing, shoulders and identity composition
//! - The closed set of descriptive fields and their JSON annotations
//! - API key hashing
//! - Shared configuration

pub mod ark;
pub mod config;
pub mod credential;
pub mod error;
pub mod fields;
pub mod noid;

pub use ark::{ArkId, AssignedName, Naan, Shoulder};
pub use error::{Error, Result};
pub use fields::{ArkField, ArkFields, ArkUpdate};
pub use noid::{NoidGenerator, RandomNoid};

/// Default number of generated characters in a new name.
pub const DEFAULT_NOID_LENGTH: usize = 8;

/// Attempts the minter makes before giving up on a unique name.
pub const MAX_MINT_ATTEMPTS: usize = 10;

/// Largest number of records accepted by one batch request.
pub const MAX_BATCH_SIZE: usize = 100;

/// Resolver that receives ARKs for NAANs not registered locally.
pub const DEFAULT_GLOBAL_RESOLVER: &str = "https://n2t.net";
