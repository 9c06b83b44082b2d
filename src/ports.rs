use std::time::Duration;

use async_trait::async_trait;

use crate::{
    error::GatewayError,
    types::{Document, StructuredLogRecord},
};

/// Atomic counters owned by an external store. Callers never read-modify-write.
#[async_trait]
pub trait CounterStorePort: Send + Sync {
    async fn increment(&self, key: &str) -> Result<i64, GatewayError>;

    async fn get(&self, key: &str) -> Result<Option<i64>, GatewayError>;
}

#[async_trait]
pub trait StructuredLogPort: Send + Sync {
    async fn append(&self, record: StructuredLogRecord) -> Result<(), GatewayError>;
}

#[async_trait]
pub trait UnstructuredLogPort: Send + Sync {
    async fn append(&self, document: Document) -> Result<(), GatewayError>;

    /// Most recent documents first.
    async fn recent(&self, limit: usize) -> Result<Vec<Document>, GatewayError>;
}

#[async_trait]
pub trait ExternalCallPort: Send + Sync {
    /// Returns the response status code; expiry of `timeout` is a `Timeout` error.
    async fn get(&self, url: &str, timeout: Duration) -> Result<u16, GatewayError>;
}
