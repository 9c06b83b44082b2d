//! Fault-injecting backends for exercising the serving path without real services.

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    adapters::{
        Backends,
        memory::{InMemoryCounterStore, InMemoryStructuredLog, InMemoryUnstructuredLog},
    },
    error::{GatewayError, external_service, timeout},
    ports::{CounterStorePort, ExternalCallPort, StructuredLogPort, UnstructuredLogPort},
    types::{Document, StructuredLogRecord},
};

/// Every call fails immediately, as if the service were unreachable.
#[derive(Debug, Default)]
pub struct UnreachableBackend {
    attempts: AtomicUsize,
}

impl UnreachableBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn refuse(&self) -> GatewayError {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        external_service("connection refused")
    }
}

#[async_trait]
impl CounterStorePort for UnreachableBackend {
    async fn increment(&self, _key: &str) -> Result<i64, GatewayError> {
        Err(self.refuse())
    }

    async fn get(&self, _key: &str) -> Result<Option<i64>, GatewayError> {
        Err(self.refuse())
    }
}

#[async_trait]
impl StructuredLogPort for UnreachableBackend {
    async fn append(&self, _record: StructuredLogRecord) -> Result<(), GatewayError> {
        Err(self.refuse())
    }
}

#[async_trait]
impl UnstructuredLogPort for UnreachableBackend {
    async fn append(&self, _document: Document) -> Result<(), GatewayError> {
        Err(self.refuse())
    }

    async fn recent(&self, _limit: usize) -> Result<Vec<Document>, GatewayError> {
        Err(self.refuse())
    }
}

/// Every call hangs until the caller gives up.
#[derive(Debug, Default)]
pub struct StalledBackend {
    attempts: AtomicUsize,
}

impl StalledBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    async fn hang<T>(&self) -> T {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

#[async_trait]
impl CounterStorePort for StalledBackend {
    async fn increment(&self, _key: &str) -> Result<i64, GatewayError> {
        self.hang().await
    }

    async fn get(&self, _key: &str) -> Result<Option<i64>, GatewayError> {
        self.hang().await
    }
}

#[async_trait]
impl StructuredLogPort for StalledBackend {
    async fn append(&self, _record: StructuredLogRecord) -> Result<(), GatewayError> {
        self.hang().await
    }
}

#[async_trait]
impl UnstructuredLogPort for StalledBackend {
    async fn append(&self, _document: Document) -> Result<(), GatewayError> {
        self.hang().await
    }

    async fn recent(&self, _limit: usize) -> Result<Vec<Document>, GatewayError> {
        self.hang().await
    }
}

#[derive(Debug, Clone)]
pub enum ScriptedCall {
    Status(u16),
    Fail(String),
    /// Sleeps for the given duration, then answers 200 unless the timeout expires first.
    Delay(Duration),
}

/// External call fake replaying a script; once exhausted it answers 200.
#[derive(Debug, Default)]
pub struct ScriptedExternalCall {
    script: Mutex<VecDeque<ScriptedCall>>,
    calls: AtomicUsize,
}

impl ScriptedExternalCall {
    pub fn new(script: impl IntoIterator<Item = ScriptedCall>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExternalCallPort for ScriptedExternalCall {
    async fn get(&self, _url: &str, call_timeout: Duration) -> Result<u16, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().await.pop_front();
        match step {
            None => Ok(200),
            Some(ScriptedCall::Status(status)) => Ok(status),
            Some(ScriptedCall::Fail(reason)) => Err(external_service(reason)),
            Some(ScriptedCall::Delay(delay)) => {
                if delay >= call_timeout {
                    tokio::time::sleep(call_timeout).await;
                    Err(timeout("scripted call timed out"))
                } else {
                    tokio::time::sleep(delay).await;
                    Ok(200)
                }
            }
        }
    }
}

/// In-memory backends with typed handles kept for assertions.
pub struct MemoryBackends {
    pub counters: Arc<InMemoryCounterStore>,
    pub structured: Arc<InMemoryStructuredLog>,
    pub unstructured: Arc<InMemoryUnstructuredLog>,
    pub external: Arc<ScriptedExternalCall>,
}

impl MemoryBackends {
    pub fn new() -> Self {
        Self::with_script(Vec::new())
    }

    pub fn with_script(script: Vec<ScriptedCall>) -> Self {
        Self {
            counters: Arc::new(InMemoryCounterStore::new()),
            structured: Arc::new(InMemoryStructuredLog::new()),
            unstructured: Arc::new(InMemoryUnstructuredLog::new()),
            external: Arc::new(ScriptedExternalCall::new(script)),
        }
    }

    pub fn backends(&self) -> Backends {
        Backends {
            counters: self.counters.clone(),
            structured: self.structured.clone(),
            unstructured: self.unstructured.clone(),
            external: self.external.clone(),
        }
    }

    pub async fn counter(&self, key: &str) -> i64 {
        self.counters
            .get(key)
            .await
            .ok()
            .flatten()
            .unwrap_or_default()
    }
}

impl Default for MemoryBackends {
    fn default() -> Self {
        Self::new()
    }
}
