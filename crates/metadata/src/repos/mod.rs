//! Repository traits for metadata operations.

pub mod arks;
pub mod keys;
pub mod naans;
pub mod shoulders;

pub use arks::ArkRepo;
pub use keys::KeyRepo;
pub use naans::NaanRepo;
pub use shoulders::ShoulderRepo;
