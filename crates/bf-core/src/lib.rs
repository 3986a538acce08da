//! bf-core: shared types, IDs, errors, and configuration.
//!
//! This crate is the foundational dependency for all other bf-* crates. It
//! holds the audiobook domain model ([`AudiobookRequest`], [`ChapterSource`],
//! [`ChapterTimestamp`]), the unified error type, and application
//! configuration.

pub mod book;
pub mod config;
pub mod error;
pub mod ids;

// Re-export the most commonly used items at the crate root.
pub use book::*;
pub use error::{Error, Result};
pub use ids::*;
