//! ClickHouse store gateway
//!
//! One HTTP client per tier. Statements arrive fully rendered; this layer
//! only runs them and maps errors to the tier they came from.

use crate::config::{EndpointConfig, StoreConfig};
use crate::error::StoreError;
use crate::sql::quote_str;
use crate::storage::{StoreGateway, Tier};
use async_trait::async_trait;
use clickhouse::Client;
use tracing::info;

pub struct ClickHouseGateway {
    hot: Client,
    cold: Client,
    config: StoreConfig,
}

impl ClickHouseGateway {
    /// Build both clients and check that each server answers.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let hot = Self::client(&config.hot, config)
            // Deletes are recounted right after they run.
            .with_option("mutations_sync", "1");
        let cold = Self::client(&config.cold, config);

        let gateway = Self {
            hot,
            cold,
            config: config.clone(),
        };
        for tier in [Tier::Hot, Tier::Cold] {
            gateway.ping(tier).await?;
            let endpoint = gateway.endpoint(tier);
            info!(%tier, url = %endpoint.url(), database = %endpoint.database, "ClickHouse reachable");
        }
        Ok(gateway)
    }

    fn client(endpoint: &EndpointConfig, config: &StoreConfig) -> Client {
        let mut client = Client::default()
            .with_url(endpoint.url())
            .with_database(&endpoint.database)
            .with_user(&endpoint.user)
            .with_option("connect_timeout", config.connect_timeout_secs.to_string())
            .with_option("receive_timeout", config.receive_timeout_secs.to_string());
        if let Some(password) = &endpoint.password {
            client = client.with_password(password);
        }
        client
    }

    fn client_for(&self, tier: Tier) -> &Client {
        match tier {
            Tier::Hot => &self.hot,
            Tier::Cold => &self.cold,
        }
    }

    fn endpoint(&self, tier: Tier) -> &EndpointConfig {
        match tier {
            Tier::Hot => &self.config.hot,
            Tier::Cold => &self.config.cold,
        }
    }

    async fn ping(&self, tier: Tier) -> Result<(), StoreError> {
        self.client_for(tier)
            .query("SELECT 1")
            .fetch_one::<u8>()
            .await
            .map(|_| ())
            .map_err(|e| StoreError::Connect {
                tier,
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl StoreGateway for ClickHouseGateway {
    async fn execute(&self, tier: Tier, statement: &str) -> Result<(), StoreError> {
        self.client_for(tier)
            .query(statement)
            .execute()
            .await
            .map_err(|e| StoreError::query(tier, e))
    }

    async fn fetch_count(&self, tier: Tier, statement: &str) -> Result<u64, StoreError> {
        self.client_for(tier)
            .query(statement)
            .fetch_one::<u64>()
            .await
            .map_err(|e| StoreError::query(tier, e))
    }

    fn table_ref(&self, tier: Tier, table: &str, from: Tier) -> String {
        remote_or_local(self.endpoint(tier), self.endpoint(from), table)
    }
}

/// `db.table` when both sides share a server, else a `remote()` call
/// (`remoteSecure()` when the target only accepts TLS).
fn remote_or_local(target: &EndpointConfig, from: &EndpointConfig, table: &str) -> String {
    if target.same_server(from) {
        return format!("{}.{}", target.database, table);
    }
    let mut args = vec![
        quote_str(&target.address()),
        quote_str(&target.database),
        quote_str(table),
        quote_str(&target.user),
    ];
    if let Some(password) = &target.password {
        args.push(quote_str(password));
    }
    let function = if target.secure { "remoteSecure" } else { "remote" };
    format!("{}({})", function, args.join(", "))
}
