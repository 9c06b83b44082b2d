use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_postgres::{Client, NoTls};

use crate::{
    config::PostgresConfig,
    error::{GatewayError, external_service},
    ports::StructuredLogPort,
    types::StructuredLogRecord,
};

/// Append-only prediction table in PostgreSQL.
pub struct PostgresStructuredLog {
    url: String,
    create_sql: String,
    insert_sql: String,
    client: Mutex<Option<Arc<Client>>>,
}

impl PostgresStructuredLog {
    pub fn new(config: &PostgresConfig) -> Self {
        let table = &config.table;
        Self {
            url: config.url.clone(),
            create_sql: format!(
                "CREATE TABLE IF NOT EXISTS {table} (\
                 id BIGSERIAL PRIMARY KEY, \
                 feature1 BIGINT NOT NULL, \
                 feature2 BIGINT NOT NULL, \
                 prediction INTEGER NOT NULL, \
                 created_at TIMESTAMPTZ NOT NULL DEFAULT now())"
            ),
            insert_sql: format!(
                "INSERT INTO {table} (feature1, feature2, prediction) VALUES ($1, $2, $3)"
            ),
            client: Mutex::new(None),
        }
    }

    async fn client(&self) -> Result<Arc<Client>, GatewayError> {
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.as_ref()
            && !client.is_closed()
        {
            return Ok(Arc::clone(client));
        }

        let (client, connection) = tokio_postgres::connect(&self.url, NoTls)
            .await
            .map_err(|err| external_service(format!("postgres connect failed: {err}")))?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                tracing::warn!(target: "adapters", error = %err, "postgres_connection_closed");
            }
        });

        client
            .batch_execute(&self.create_sql)
            .await
            .map_err(|err| external_service(format!("postgres schema setup failed: {err}")))?;
        tracing::info!(target: "adapters", "postgres_connected");

        let client = Arc::new(client);
        *guard = Some(Arc::clone(&client));
        Ok(client)
    }
}

#[async_trait]
impl StructuredLogPort for PostgresStructuredLog {
    async fn append(&self, record: StructuredLogRecord) -> Result<(), GatewayError> {
        let client = self.client().await?;
        client
            .execute(
                self.insert_sql.as_str(),
                &[&record.feature1, &record.feature2, &record.prediction],
            )
            .await
            .map_err(|err| external_service(format!("postgres insert failed: {err}")))?;
        Ok(())
    }
}
