use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    error::GatewayError,
    ports::{CounterStorePort, StructuredLogPort, UnstructuredLogPort},
    types::{Document, StructuredLogRecord},
};

#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    counters: Mutex<HashMap<String, i64>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> HashMap<String, i64> {
        self.counters.lock().await.clone()
    }
}

#[async_trait]
impl CounterStorePort for InMemoryCounterStore {
    async fn increment(&self, key: &str) -> Result<i64, GatewayError> {
        let mut guard = self.counters.lock().await;
        let value = guard.entry(key.to_string()).or_insert(0);
        *value = value.saturating_add(1);
        Ok(*value)
    }

    async fn get(&self, key: &str) -> Result<Option<i64>, GatewayError> {
        Ok(self.counters.lock().await.get(key).copied())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStructuredLog {
    records: Mutex<Vec<StructuredLogRecord>>,
}

impl InMemoryStructuredLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<StructuredLogRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl StructuredLogPort for InMemoryStructuredLog {
    async fn append(&self, record: StructuredLogRecord) -> Result<(), GatewayError> {
        self.records.lock().await.push(record);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryUnstructuredLog {
    documents: Mutex<Vec<Document>>,
}

impl InMemoryUnstructuredLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn documents(&self) -> Vec<Document> {
        self.documents.lock().await.clone()
    }

    pub async fn documents_of_kind(&self, kind: &str) -> Vec<Document> {
        self.documents
            .lock()
            .await
            .iter()
            .filter(|document| document.get("kind").and_then(|value| value.as_str()) == Some(kind))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl UnstructuredLogPort for InMemoryUnstructuredLog {
    async fn append(&self, document: Document) -> Result<(), GatewayError> {
        self.documents.lock().await.push(document);
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Document>, GatewayError> {
        let guard = self.documents.lock().await;
        Ok(guard.iter().rev().take(limit).cloned().collect())
    }
}
