//! Error types for the storage engine

use crate::storage::Tier;
use thiserror::Error;

/// Failure talking to the hot or cold store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("{tier} store query failed: {message}")]
    Query { tier: Tier, message: String },
    #[error("cannot reach {tier} store: {message}")]
    Connect { tier: Tier, message: String },
}

impl StoreError {
    pub fn query(tier: Tier, err: impl std::fmt::Display) -> Self {
        StoreError::Query {
            tier,
            message: err.to_string(),
        }
    }

    pub fn tier(&self) -> Tier {
        match self {
            StoreError::Query { tier, .. } | StoreError::Connect { tier, .. } => *tier,
        }
    }
}

/// Step of a table migration that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationPhase {
    CountHot,
    Copy,
    CountCold,
    Delete,
}

impl std::fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            MigrationPhase::CountHot => "count-hot",
            MigrationPhase::Copy => "copy",
            MigrationPhase::CountCold => "count-cold",
            MigrationPhase::Delete => "delete",
        })
    }
}

#[derive(Debug, Clone, Error)]
#[error("migration of {table} failed during {phase}: {source}")]
pub struct MigrationError {
    pub table: String,
    pub phase: MigrationPhase,
    #[source]
    pub source: StoreError,
}

impl MigrationError {
    pub fn new(table: &str, phase: MigrationPhase, source: StoreError) -> Self {
        Self {
            table: table.to_string(),
            phase,
            source,
        }
    }
}

/// Invalid configuration detected at startup.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
    #[error("unknown column {column} in allowed fields for table {table}")]
    UnknownColumn { table: String, column: String },
    #[error("allowed fields for table {table} drop key column {column}")]
    MissingKeyColumn { table: String, column: String },
    #[error("unknown table {0}")]
    UnknownTable(String),
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
