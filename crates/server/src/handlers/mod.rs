//! HTTP request handlers.

pub mod ark;
pub mod bulk;
pub mod common;
pub mod resolve;
pub mod status;

pub use ark::*;
pub use bulk::*;
pub use resolve::*;
pub use status::*;
