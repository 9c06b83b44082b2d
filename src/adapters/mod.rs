pub mod http;
pub mod memory;
pub mod mongo;
pub mod postgres;
pub mod redis_store;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::{
    config::{Config, CounterStoreConfig, StructuredLogConfig, UnstructuredLogConfig},
    ports::{CounterStorePort, ExternalCallPort, StructuredLogPort, UnstructuredLogPort},
};

/// Client handles for every external collaborator, passed explicitly into the
/// serving loop and the viewer.
#[derive(Clone)]
pub struct Backends {
    pub counters: Arc<dyn CounterStorePort>,
    pub structured: Arc<dyn StructuredLogPort>,
    pub unstructured: Arc<dyn UnstructuredLogPort>,
    pub external: Arc<dyn ExternalCallPort>,
}

impl Backends {
    pub fn from_config(config: &Config) -> Result<Self> {
        let counters: Arc<dyn CounterStorePort> = match &config.counter_store {
            CounterStoreConfig::Redis { config } => Arc::new(
                redis_store::RedisCounterStore::new(config).context("failed to set up redis client")?,
            ),
            CounterStoreConfig::InMemory => Arc::new(memory::InMemoryCounterStore::new()),
        };

        let structured: Arc<dyn StructuredLogPort> = match &config.structured_log {
            StructuredLogConfig::Postgres { config } => {
                Arc::new(postgres::PostgresStructuredLog::new(config))
            }
            StructuredLogConfig::InMemory => Arc::new(memory::InMemoryStructuredLog::new()),
        };

        let unstructured: Arc<dyn UnstructuredLogPort> = match &config.unstructured_log {
            UnstructuredLogConfig::Mongodb { config } => {
                Arc::new(mongo::MongoUnstructuredLog::new(config))
            }
            UnstructuredLogConfig::InMemory => Arc::new(memory::InMemoryUnstructuredLog::new()),
        };

        let external: Arc<dyn ExternalCallPort> = Arc::new(
            http::HttpExternalCaller::new().context("failed to set up external call client")?,
        );

        tracing::info!(
            target: "adapters",
            counter_store = config.counter_store.backend_name(),
            structured_log = config.structured_log.backend_name(),
            unstructured_log = config.unstructured_log.backend_name(),
            "backends_configured"
        );

        Ok(Self {
            counters,
            structured,
            unstructured,
            external,
        })
    }
}
