//! The serving loop: HTTP/WebSocket traffic and the periodic timer multiplexed
//! onto one cooperative scheduler.

use std::{future::Future, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use tokio::{
    net::TcpListener,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    adapters::Backends,
    api::{AppState, build_router},
    classifier::{Classifier, LogisticClassifier},
    config::{Config, PeriodicConfig},
    periodic::PeriodicTaskRunner,
    service::InferenceService,
    session::SessionRegistry,
    side_effects::SideEffectDispatcher,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    Signal(&'static str),
    ServerStopped(String),
}

pub struct ServingLoop {
    listener: TcpListener,
    state: AppState,
    periodic: Arc<PeriodicTaskRunner>,
    periodic_config: PeriodicConfig,
    shutdown: CancellationToken,
}

impl ServingLoop {
    pub async fn bind(config: &Config, backends: Backends) -> Result<Self> {
        Self::bind_with_classifier(config, backends, Arc::new(LogisticClassifier::pretrained()))
            .await
    }

    pub async fn bind_with_classifier(
        config: &Config,
        backends: Backends,
        classifier: Arc<dyn Classifier>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(&config.server.bind_address)
            .await
            .with_context(|| format!("unable to bind {}", config.server.bind_address))?;

        let write_timeout = config.side_effects.write_timeout();
        let side_effects = SideEffectDispatcher::new(
            Arc::clone(&backends.counters),
            Arc::clone(&backends.structured),
            Arc::clone(&backends.unstructured),
            write_timeout,
        );
        let service = Arc::new(InferenceService::new(classifier, side_effects));
        let periodic = Arc::new(PeriodicTaskRunner::new(
            Arc::clone(&backends.external),
            Arc::clone(&backends.unstructured),
            &config.periodic,
            write_timeout,
        ));

        let shutdown = CancellationToken::new();
        let state = AppState {
            service,
            sessions: SessionRegistry::new(shutdown.clone()),
        };

        Ok(Self {
            listener,
            state,
            periodic,
            periodic_config: config.periodic.clone(),
            shutdown,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("unable to read listener address")
    }

    /// Runs until `stop` resolves or the HTTP server exits, then drains in-flight
    /// side-effect writes and periodic firings.
    #[tracing::instrument(name = "serving_loop_run", target = "serving_loop", skip_all)]
    pub async fn run<F>(self, stop: F) -> Result<ExitReason>
    where
        F: Future<Output = &'static str>,
    {
        let Self {
            listener,
            state,
            periodic,
            periodic_config,
            shutdown,
        } = self;

        let local_addr = listener.local_addr().ok();
        let router = build_router(state.clone());
        let server_shutdown = shutdown.clone();
        let mut server: JoinHandle<std::io::Result<()>> = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
                .await
        });

        tracing::info!(
            target: "serving_loop",
            addr = ?local_addr,
            periodic_enabled = periodic_config.enabled,
            periodic_interval_ms = periodic_config.interval_ms,
            "serving_loop_started"
        );

        let interval = periodic_config.interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let firings = TaskTracker::new();
        let mut firing_id = 0_u64;
        let mut server_finished = false;

        tokio::pin!(stop);
        let exit_reason = loop {
            tokio::select! {
                signal_name = &mut stop => break ExitReason::Signal(signal_name),
                _ = ticker.tick(), if periodic_config.enabled => {
                    firing_id = firing_id.saturating_add(1);
                    let runner = Arc::clone(&periodic);
                    let id = firing_id;
                    firings.spawn(async move {
                        runner.fire(id).await;
                    });
                }
                joined = &mut server => {
                    server_finished = true;
                    let detail = match joined {
                        Ok(Ok(())) => "server exited".to_string(),
                        Ok(Err(err)) => format!("server failed: {err}"),
                        Err(err) => format!("server task failed: {err}"),
                    };
                    break ExitReason::ServerStopped(detail);
                }
            }
        };

        let open_sessions = state.sessions.open_sessions().await;
        tracing::info!(
            target: "serving_loop",
            reason = ?exit_reason,
            open_sessions = open_sessions,
            "serving_loop_stopping"
        );
        shutdown.cancel();

        if !server_finished {
            match server.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::warn!(target: "serving_loop", error = %err, "server_shutdown_failed")
                }
                Err(err) => {
                    tracing::warn!(target: "serving_loop", error = %err, "server_task_join_failed")
                }
            }
        }

        firings.close();
        firings.wait().await;
        state.service.drain().await;

        tracing::info!(
            target: "serving_loop",
            firings = firing_id,
            "serving_loop_stopped"
        );
        Ok(exit_reason)
    }
}
