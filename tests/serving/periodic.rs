use std::{sync::Arc, time::Duration};

use futures_util::SinkExt;
use serde_json::json;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use infergate::{
    config::PeriodicConfig,
    periodic::PeriodicTaskRunner,
    testing::{MemoryBackends, ScriptedCall, StalledBackend},
    types::CallOutcome,
};

use crate::{RunningServer, stream_session::next_text, test_config};

fn periodic_config(timeout_ms: u64) -> PeriodicConfig {
    PeriodicConfig {
        enabled: true,
        interval_ms: 40,
        target_url: "http://example.invalid/get".to_string(),
        timeout_ms,
    }
}

fn runner(memory: &MemoryBackends, timeout_ms: u64) -> PeriodicTaskRunner {
    PeriodicTaskRunner::new(
        memory.external.clone(),
        memory.unstructured.clone(),
        &periodic_config(timeout_ms),
        Duration::from_millis(200),
    )
}

#[tokio::test]
async fn failed_firing_does_not_block_the_next_one() {
    let memory = MemoryBackends::with_script(vec![
        ScriptedCall::Fail("connection reset".to_string()),
        ScriptedCall::Delay(Duration::from_millis(500)),
        ScriptedCall::Status(204),
    ]);
    let runner = runner(&memory, 50);

    let first = runner.fire(1).await;
    let second = runner.fire(2).await;
    let third = runner.fire(3).await;

    assert!(matches!(first.result, CallOutcome::Failed(ref reason) if reason.contains("connection reset")));
    assert_eq!(second.result, CallOutcome::TimedOut);
    assert_eq!(third.result, CallOutcome::Status(204));
    assert_eq!(memory.external.calls(), 3);

    let documents = memory.unstructured.documents_of_kind("periodic_http_call").await;
    assert_eq!(documents.len(), 3);
    assert_eq!(documents[0]["payload"]["failure"], json!("error"));
    assert_eq!(documents[1]["payload"]["failure"], json!("timeout"));
    assert_eq!(documents[2]["payload"]["status"], json!(204));
    assert_eq!(documents[2]["payload"]["firing_id"], json!(3));
    assert_eq!(
        documents[2]["payload"]["url"],
        json!("http://example.invalid/get")
    );
}

#[tokio::test]
async fn non_success_status_is_recorded_as_a_status() {
    let memory = MemoryBackends::with_script(vec![ScriptedCall::Status(503)]);
    let outcome = runner(&memory, 50).fire(7).await;

    assert_eq!(outcome.result, CallOutcome::Status(503));
    assert!(!outcome.result.is_failure());
}

#[tokio::test]
async fn stalled_log_store_does_not_hang_a_firing() {
    let memory = MemoryBackends::new();
    let stalled = Arc::new(StalledBackend::new());
    let runner = PeriodicTaskRunner::new(
        memory.external.clone(),
        stalled.clone(),
        &periodic_config(50),
        Duration::from_millis(30),
    );

    let outcome = tokio::time::timeout(Duration::from_secs(2), runner.fire(1))
        .await
        .expect("firing should be bounded by the write timeout");
    assert_eq!(outcome.result, CallOutcome::Status(200));
    assert_eq!(stalled.attempts(), 1);
}

#[tokio::test]
async fn timer_keeps_firing_while_requests_are_served() {
    let memory = MemoryBackends::with_script(vec![
        ScriptedCall::Delay(Duration::from_millis(300)),
        ScriptedCall::Fail("boom".to_string()),
    ]);
    let mut config = test_config();
    config.periodic = periodic_config(150);
    let server = RunningServer::start(&config, memory.backends()).await;

    let client = reqwest::Client::new();
    for _ in 0..3 {
        let response = client
            .get(server.http("/predict?f1=1&f2=1"))
            .send()
            .await
            .expect("request should be served during a slow firing");
        assert_eq!(response.status(), 200);
    }

    tokio::time::sleep(Duration::from_millis(400)).await;
    server.stop().await;

    assert!(
        memory.external.calls() >= 3,
        "expected several firings, got {}",
        memory.external.calls()
    );
    assert_eq!(memory.counter("request").await, 3);

    let firings = memory.unstructured.documents_of_kind("periodic_http_call").await;
    assert_eq!(firings.len(), memory.external.calls());
    assert!(
        firings
            .iter()
            .any(|document| document["payload"]["failure"] == json!("timeout"))
    );
}

#[tokio::test]
async fn closing_a_session_leaves_the_timer_running() {
    let memory = MemoryBackends::new();
    let mut config = test_config();
    config.periodic = periodic_config(150);
    let server = RunningServer::start(&config, memory.backends()).await;

    let (mut closing, _) = connect_async(server.ws()).await.expect("ws connect");
    let (mut staying, _) = connect_async(server.ws()).await.expect("ws connect");
    for client in [&mut closing, &mut staying] {
        client
            .send(Message::Text("0,1".into()))
            .await
            .expect("send should succeed");
        assert_eq!(next_text(client).await, "Prediction: 1");
    }

    closing.close(None).await.expect("close should succeed");
    drop(closing);
    let calls_at_close = memory.external.calls();

    tokio::time::sleep(Duration::from_millis(250)).await;
    staying
        .send(Message::Text("1,1".into()))
        .await
        .expect("remaining session should stay open");
    assert_eq!(next_text(&mut staying).await, "Prediction: 1");

    let calls_after_close = memory.external.calls();
    assert!(
        calls_after_close >= calls_at_close + 2,
        "timer stalled after a session closed: {calls_at_close} -> {calls_after_close}"
    );

    staying.close(None).await.expect("close should succeed");
    server.stop().await;

    assert_eq!(memory.counter("stream").await, 3);
    assert_eq!(
        memory.unstructured.documents_of_kind("periodic_http_call").await.len(),
        memory.external.calls()
    );
}
