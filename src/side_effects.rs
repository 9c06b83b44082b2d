//! Best-effort telemetry writes issued after every inference.
//!
//! Each write runs as its own tracked task with a bounded timeout, so a slow or
//! unreachable sink never holds the caller and never cancels the other writes.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::{sync::Mutex, time::timeout};
use tokio_util::task::TaskTracker;

use crate::{
    error::{GatewayError, timeout as timeout_error},
    ports::{CounterStorePort, StructuredLogPort, UnstructuredLogPort},
    types::{Channel, InferenceResult, UnstructuredLogEvent},
};

#[derive(Clone)]
pub struct SideEffectDispatcher {
    counters: Arc<dyn CounterStorePort>,
    structured: Arc<dyn StructuredLogPort>,
    unstructured: Arc<dyn UnstructuredLogPort>,
    write_timeout: Duration,
    tracker: TaskTracker,
    drain_lock: Arc<Mutex<()>>,
}

impl SideEffectDispatcher {
    pub fn new(
        counters: Arc<dyn CounterStorePort>,
        structured: Arc<dyn StructuredLogPort>,
        unstructured: Arc<dyn UnstructuredLogPort>,
        write_timeout: Duration,
    ) -> Self {
        Self {
            counters,
            structured,
            unstructured,
            write_timeout,
            tracker: TaskTracker::new(),
            drain_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Issues the counter increment and both log writes for one inference.
    pub fn record_inference(&self, channel: Channel, result: &InferenceResult) {
        let counters = Arc::clone(&self.counters);
        self.spawn_bounded("counter_store", channel, async move {
            counters.increment(channel.as_str()).await.map(|_| ())
        });

        let structured = Arc::clone(&self.structured);
        let record = result.structured_record();
        self.spawn_bounded("structured_log", channel, async move {
            structured.append(record).await
        });

        let event = UnstructuredLogEvent::inference(channel, result);
        self.record_event_for(Some(channel), event);
    }

    /// Appends a free-form event to the unstructured log.
    pub fn record_event(&self, event: UnstructuredLogEvent) {
        self.record_event_for(None, event);
    }

    fn record_event_for(&self, channel: Option<Channel>, event: UnstructuredLogEvent) {
        let unstructured = Arc::clone(&self.unstructured);
        let document = event.into_document();
        self.spawn_bounded("unstructured_log", channel, async move {
            unstructured.append(document).await
        });
    }

    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Waits until every write issued so far has finished or timed out.
    /// Concurrent drains run one after another.
    pub async fn drain(&self) {
        let _draining = self.drain_lock.lock().await;
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    fn spawn_bounded<F>(&self, sink: &'static str, channel: impl Into<Option<Channel>>, write: F)
    where
        F: Future<Output = Result<(), GatewayError>> + Send + 'static,
    {
        let channel = channel.into();
        let write_timeout = self.write_timeout;
        self.tracker.spawn(async move {
            let outcome = match timeout(write_timeout, write).await {
                Ok(result) => result,
                Err(_) => Err(timeout_error(format!(
                    "{sink} write exceeded {} ms",
                    write_timeout.as_millis()
                ))),
            };

            match outcome {
                Ok(()) => tracing::trace!(
                    target: "side_effects",
                    sink = sink,
                    channel = channel.map(Channel::as_str),
                    "side_effect_written"
                ),
                Err(err) => tracing::warn!(
                    target: "side_effects",
                    sink = sink,
                    channel = channel.map(Channel::as_str),
                    kind = err.kind.as_str(),
                    error = %err,
                    "side_effect_failed"
                ),
            }
        });
    }
}
