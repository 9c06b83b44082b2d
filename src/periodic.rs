//! Fixed-interval outbound call whose outcome lands in the unstructured log.

use std::{sync::Arc, time::Duration};

use tokio::time::timeout;

use crate::{
    config::PeriodicConfig,
    error::GatewayErrorKind,
    ports::{ExternalCallPort, UnstructuredLogPort},
    types::{CallOutcome, PeriodicOutcome, UnstructuredLogEvent, now},
};

pub struct PeriodicTaskRunner {
    external: Arc<dyn ExternalCallPort>,
    unstructured: Arc<dyn UnstructuredLogPort>,
    target_url: String,
    call_timeout: Duration,
    write_timeout: Duration,
}

impl PeriodicTaskRunner {
    pub fn new(
        external: Arc<dyn ExternalCallPort>,
        unstructured: Arc<dyn UnstructuredLogPort>,
        config: &PeriodicConfig,
        write_timeout: Duration,
    ) -> Self {
        Self {
            external,
            unstructured,
            target_url: config.target_url.clone(),
            call_timeout: config.call_timeout(),
            write_timeout,
        }
    }

    /// One firing: call, record, forget. Never retried and never fatal.
    #[tracing::instrument(name = "periodic_fire", target = "periodic", skip(self))]
    pub async fn fire(&self, firing_id: u64) -> PeriodicOutcome {
        // Outer bound also covers ports that ignore the timeout argument.
        let call = self.external.get(&self.target_url, self.call_timeout);
        let result = match timeout(self.call_timeout, call).await {
            Ok(Ok(status)) => CallOutcome::Status(status),
            Ok(Err(err)) if err.kind == GatewayErrorKind::Timeout => CallOutcome::TimedOut,
            Ok(Err(err)) => CallOutcome::Failed(err.to_string()),
            Err(_) => CallOutcome::TimedOut,
        };

        let outcome = PeriodicOutcome {
            firing_id,
            url: self.target_url.clone(),
            result,
            timestamp: now(),
        };

        match &outcome.result {
            CallOutcome::Status(status) => tracing::info!(
                target: "periodic",
                firing_id = firing_id,
                status = status,
                "periodic_call_completed"
            ),
            CallOutcome::TimedOut => tracing::warn!(
                target: "periodic",
                firing_id = firing_id,
                timeout_ms = self.call_timeout.as_millis() as u64,
                "periodic_call_timed_out"
            ),
            CallOutcome::Failed(reason) => tracing::warn!(
                target: "periodic",
                firing_id = firing_id,
                reason = %reason,
                "periodic_call_failed"
            ),
        }

        let document = UnstructuredLogEvent::periodic(&outcome).into_document();
        match timeout(self.write_timeout, self.unstructured.append(document)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(
                target: "periodic",
                firing_id = firing_id,
                kind = err.kind.as_str(),
                error = %err,
                "periodic_outcome_not_logged"
            ),
            Err(_) => tracing::warn!(
                target: "periodic",
                firing_id = firing_id,
                kind = GatewayErrorKind::Timeout.as_str(),
                "periodic_outcome_not_logged"
            ),
        }

        outcome
    }
}
