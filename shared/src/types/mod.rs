//! Record model shared across the engine and CLI

pub mod data_type;
pub mod record;
