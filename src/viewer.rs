//! Read-only dashboard over the counter store and the unstructured log.
//!
//! Runs as its own process with its own clients; it never talks to the serving
//! loop and only issues reads.

use std::{fmt::Write as _, future::Future, sync::Arc, time::Duration};

use anyhow::{Result, bail};
use serde_json::Value;
use time::OffsetDateTime;
use tokio::time::timeout;

use crate::{
    config::{Config, CounterStoreConfig, UnstructuredLogConfig, ViewerConfig},
    error::{self, GatewayError},
    ports::{CounterStorePort, UnstructuredLogPort},
    types::{Channel, Document, format_timestamp, now},
};

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub taken_at: OffsetDateTime,
    pub request: Result<i64, GatewayError>,
    pub stream: Result<i64, GatewayError>,
    pub recent: Result<Vec<Document>, GatewayError>,
}

impl DashboardSnapshot {
    /// Sum of the channels that could be read.
    pub fn total(&self) -> i64 {
        [&self.request, &self.stream]
            .into_iter()
            .filter_map(|value| value.as_ref().ok())
            .sum()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "== Inference Gateway Dashboard ({})",
            format_timestamp(self.taken_at)
        );
        let _ = writeln!(out, "Request predictions: {}", render_count(&self.request));
        let _ = writeln!(out, "Stream predictions:  {}", render_count(&self.stream));
        let _ = writeln!(out, "Total predictions:   {}", self.total());
        let _ = writeln!(out, "-- Recent log entries");
        match &self.recent {
            Ok(documents) if documents.is_empty() => {
                let _ = writeln!(out, "(none)");
            }
            Ok(documents) => {
                for document in documents {
                    let _ = writeln!(out, "{}", Value::Object(document.clone()));
                }
            }
            Err(err) => {
                let _ = writeln!(out, "unavailable: {err}");
            }
        }
        out
    }
}

fn render_count(value: &Result<i64, GatewayError>) -> String {
    match value {
        Ok(count) => count.to_string(),
        Err(err) => format!("unavailable ({err})"),
    }
}

pub struct Viewer {
    counters: Arc<dyn CounterStorePort>,
    unstructured: Arc<dyn UnstructuredLogPort>,
    config: ViewerConfig,
}

impl Viewer {
    pub fn new(
        counters: Arc<dyn CounterStorePort>,
        unstructured: Arc<dyn UnstructuredLogPort>,
        config: ViewerConfig,
    ) -> Self {
        Self {
            counters,
            unstructured,
            config,
        }
    }

    /// Reads both counters and the recent log entries. Each read is bounded by
    /// `read_timeout_ms`; an expired read shows up as unavailable.
    pub async fn snapshot(&self) -> DashboardSnapshot {
        let read_timeout = self.config.read_timeout();
        let (request, stream, recent) = tokio::join!(
            bounded(read_timeout, "request counter", self.count(Channel::Request)),
            bounded(read_timeout, "stream counter", self.count(Channel::Stream)),
            bounded(
                read_timeout,
                "recent log entries",
                self.unstructured.recent(self.config.recent_logs)
            ),
        );

        for (source, err) in [
            ("request_counter", request.as_ref().err()),
            ("stream_counter", stream.as_ref().err()),
            ("recent_logs", recent.as_ref().err()),
        ] {
            if let Some(err) = err {
                tracing::warn!(target: "viewer", source = source, error = %err, "viewer_read_failed");
            }
        }

        DashboardSnapshot {
            taken_at: now(),
            request,
            stream,
            recent,
        }
    }

    async fn count(&self, channel: Channel) -> Result<i64, GatewayError> {
        Ok(self.counters.get(channel.as_str()).await?.unwrap_or(0))
    }

    /// Refreshes until `stop` resolves, handing each rendered snapshot to `sink`.
    pub async fn run<F, S>(&self, stop: F, mut sink: S) -> &'static str
    where
        F: Future<Output = &'static str>,
        S: FnMut(&DashboardSnapshot),
    {
        let mut ticker = tokio::time::interval(self.config.refresh_interval());
        tokio::pin!(stop);
        loop {
            tokio::select! {
                signal_name = &mut stop => return signal_name,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                signal_name = &mut stop => return signal_name,
                snapshot = self.snapshot() => sink(&snapshot),
            }
        }
    }
}

async fn bounded<T, F>(limit: Duration, what: &str, read: F) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    match timeout(limit, read).await {
        Ok(result) => result,
        Err(_) => Err(error::timeout(format!(
            "{what} not read within {} ms",
            limit.as_millis()
        ))),
    }
}

/// The viewer runs as its own process, so in-memory stores would only ever
/// show its own empty state.
pub fn ensure_shared_stores(config: &Config) -> Result<()> {
    if matches!(config.counter_store, CounterStoreConfig::InMemory) {
        bail!("viewer needs an external counter_store; in-memory holds no server data");
    }
    if matches!(config.unstructured_log, UnstructuredLogConfig::InMemory) {
        bail!("viewer needs an external unstructured_log; in-memory holds no server data");
    }
    Ok(())
}
