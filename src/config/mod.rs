//! Configuration module for slicepack
//!
//! Provides types and parsing for `slicepack.toml`.

pub mod loader;
pub mod schema;

pub use loader::*;
pub use schema::*;
