use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use tokio::sync::Mutex;

use crate::{
    config::RedisConfig,
    error::{GatewayError, external_service},
    ports::CounterStorePort,
};

/// Counter store backed by Redis `INCR` / `GET`. Connects on first use.
pub struct RedisCounterStore {
    client: Client,
    connection: Mutex<Option<ConnectionManager>>,
}

impl RedisCounterStore {
    pub fn new(config: &RedisConfig) -> Result<Self, GatewayError> {
        let client = Client::open(config.url.as_str())
            .map_err(|err| external_service(format!("invalid redis url: {err}")))?;
        Ok(Self {
            client,
            connection: Mutex::new(None),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, GatewayError> {
        let mut guard = self.connection.lock().await;
        if let Some(connection) = guard.as_ref() {
            return Ok(connection.clone());
        }

        let connection = ConnectionManager::new(self.client.clone())
            .await
            .map_err(|err| external_service(format!("redis connect failed: {err}")))?;
        tracing::info!(target: "adapters", "redis_connected");
        *guard = Some(connection.clone());
        Ok(connection)
    }
}

#[async_trait]
impl CounterStorePort for RedisCounterStore {
    async fn increment(&self, key: &str) -> Result<i64, GatewayError> {
        let mut connection = self.connection().await?;
        let value: i64 = connection
            .incr(key, 1_i64)
            .await
            .map_err(|err| external_service(format!("redis INCR {key} failed: {err}")))?;
        Ok(value)
    }

    async fn get(&self, key: &str) -> Result<Option<i64>, GatewayError> {
        let mut connection = self.connection().await?;
        let value: Option<i64> = connection
            .get(key)
            .await
            .map_err(|err| external_service(format!("redis GET {key} failed: {err}")))?;
        Ok(value)
    }
}
