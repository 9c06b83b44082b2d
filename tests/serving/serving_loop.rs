use std::time::Duration;

use futures_util::{SinkExt, StreamExt, future::join_all};
use serde_json::{Value, json};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use infergate::{core_loop::ExitReason, testing::MemoryBackends};

use crate::{RunningServer, test_config};

#[tokio::test]
async fn predict_returns_label_as_json() {
    let memory = MemoryBackends::new();
    let server = RunningServer::start(&test_config(), memory.backends()).await;

    let body: Value = reqwest::get(server.http("/predict?f1=0&f2=1"))
        .await
        .expect("request should succeed")
        .json()
        .await
        .expect("json body");
    assert_eq!(body, json!({ "prediction": 1 }));

    let body: Value = reqwest::get(server.http("/predict/?f1=1&f2=0"))
        .await
        .expect("trailing slash route should be served")
        .json()
        .await
        .expect("json body");
    assert_eq!(body, json!({ "prediction": 0 }));

    server.stop().await;
}

#[tokio::test]
async fn invalid_query_is_rejected_with_422() {
    let memory = MemoryBackends::new();
    let server = RunningServer::start(&test_config(), memory.backends()).await;

    for query in ["/predict?f1=1", "/predict?f1=a&f2=1", "/predict"] {
        let response = reqwest::get(server.http(query))
            .await
            .expect("request should complete");
        assert_eq!(response.status(), 422, "query {query}");
        let body: Value = response.json().await.expect("json body");
        assert_eq!(body["error"]["kind"], json!("invalid_input"));
        assert!(body["error"]["message"].is_string());
    }

    server.stop().await;
    assert_eq!(memory.counter("request").await, 0);
    assert!(memory.structured.records().await.is_empty());
}

#[tokio::test]
async fn undecodable_query_gets_the_same_error_body() {
    let memory = MemoryBackends::new();
    let server = RunningServer::start(&test_config(), memory.backends()).await;

    let response = reqwest::get(server.http("/predict?f1=1&f1=2&f2=0"))
        .await
        .expect("request should complete");
    assert_eq!(response.status(), 422);
    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["error"]["kind"], json!("invalid_input"));

    server.stop().await;
    assert_eq!(memory.counter("request").await, 0);
}

#[tokio::test]
async fn root_returns_banner_and_logs_the_call() {
    let memory = MemoryBackends::new();
    let server = RunningServer::start(&test_config(), memory.backends()).await;

    let body: Value = reqwest::get(server.http("/"))
        .await
        .expect("request should succeed")
        .json()
        .await
        .expect("json body");
    let message = body["message"].as_str().expect("message field");
    assert!(message.starts_with("Inference Gateway API"), "got {message}");

    server.stop().await;
    assert_eq!(memory.unstructured.documents_of_kind("root_call").await.len(), 1);
    assert_eq!(memory.counter("request").await, 0);
}

#[tokio::test]
async fn concurrent_channels_are_counted_separately() {
    let memory = MemoryBackends::new();
    let server = RunningServer::start(&test_config(), memory.backends()).await;

    let client = reqwest::Client::new();
    let requests = ["/predict?f1=0&f2=1", "/predict?f1=1&f2=0", "/predict?f1=1&f2=1"]
        .map(|query| client.get(server.http(query)).send());

    let (mut stream, _) = connect_async(server.ws()).await.expect("ws connect");
    let stream_task = async {
        for input in ["0,1", "0,0"] {
            stream
                .send(Message::Text(input.into()))
                .await
                .expect("send should succeed");
        }
        let mut replies = Vec::new();
        while replies.len() < 2 {
            match tokio::time::timeout(Duration::from_secs(5), stream.next()).await {
                Ok(Some(Ok(Message::Text(text)))) => replies.push(text.to_string()),
                Ok(Some(Ok(_))) => continue,
                other => panic!("stream ended early: {other:?}"),
            }
        }
        replies
    };

    let (responses, replies) = tokio::join!(join_all(requests), stream_task);
    for response in responses {
        assert_eq!(response.expect("request should succeed").status(), 200);
    }
    assert_eq!(replies, vec!["Prediction: 1", "Prediction: 0"]);

    stream.close(None).await.expect("close should succeed");
    assert_eq!(server.stop().await, ExitReason::Signal("TEST_STOP"));

    assert_eq!(memory.counter("request").await, 3);
    assert_eq!(memory.counter("stream").await, 2);
    assert_eq!(memory.structured.records().await.len(), 5);
    assert_eq!(memory.unstructured.documents_of_kind("inference").await.len(), 5);
}

#[tokio::test]
async fn stop_drains_pending_side_effects() {
    let memory = MemoryBackends::new();
    let server = RunningServer::start(&test_config(), memory.backends()).await;

    let client = reqwest::Client::new();
    for _ in 0..10 {
        client
            .get(server.http("/predict?f1=1&f2=1"))
            .send()
            .await
            .expect("request should succeed");
    }

    server.stop().await;
    assert_eq!(memory.counter("request").await, 10);
    assert_eq!(memory.structured.records().await.len(), 10);
}
