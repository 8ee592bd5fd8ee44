//! Shared types and utilities for Strata
//!
//! This crate contains the record model that flows from the message bus into
//! the hot cache, plus small time helpers used by both the engine and the CLI.

pub mod types;
pub mod utils;

// Re-export commonly used types
pub use types::{data_type::*, record::*};
