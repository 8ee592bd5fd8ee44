//! Store gateway for the hot and cold tiers
//!
//! The engine only needs "statement in, status and text out" from the store:
//! run a mutation, or run a `count()` query. Everything above this seam renders
//! SQL; everything below it is transport.

#[cfg(feature = "clickhouse-storage")]
pub mod clickhouse;

use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which physical store a statement targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Hot,
    Cold,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Hot => "hot",
            Tier::Cold => "cold",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw statement transport to the hot and cold stores.
#[async_trait]
pub trait StoreGateway: Send + Sync {
    /// Run a statement that returns no rows (insert, mutation, DDL).
    async fn execute(&self, tier: Tier, statement: &str) -> Result<(), StoreError>;

    /// Run a statement that yields a single `count()` value.
    async fn fetch_count(&self, tier: Tier, statement: &str) -> Result<u64, StoreError>;

    /// SQL expression naming `table` in `tier`, as seen by a statement that
    /// executes on `from`. Cross-server references need a table function.
    fn table_ref(&self, tier: Tier, table: &str, from: Tier) -> String;
}
