use std::{sync::Arc, time::Duration};

use tokio::time::{Instant, timeout};

use infergate::{
    adapters::Backends,
    classifier::{Classifier, LogisticClassifier},
    error::GatewayErrorKind,
    testing::{MemoryBackends, StalledBackend, UnreachableBackend},
    types::{InferenceInput, Label, StructuredLogRecord},
};

use crate::service_over;

#[tokio::test]
async fn request_label_matches_direct_classifier_call() {
    let memory = MemoryBackends::new();
    let service = service_over(&memory.backends(), Duration::from_millis(200));
    let classifier = LogisticClassifier::pretrained();

    for (f1, f2) in [(0, 1), (1, 1), (1, 0), (0, 0), (-5, 9), (42, -3)] {
        let result = service
            .handle_request(Some(&f1.to_string()), Some(&f2.to_string()))
            .expect("valid features");
        assert_eq!(
            result.label,
            classifier.classify(&InferenceInput::new(f1, f2)),
            "input ({f1},{f2})"
        );
    }
}

#[tokio::test]
async fn each_request_attempts_one_record_per_sink() {
    let memory = MemoryBackends::new();
    let service = service_over(&memory.backends(), Duration::from_millis(200));

    let result = service
        .handle_request(Some("0"), Some("1"))
        .expect("valid features");
    assert_eq!(result.label, Label::One);
    service.drain().await;

    assert_eq!(
        memory.structured.records().await,
        vec![StructuredLogRecord {
            feature1: 0,
            feature2: 1,
            prediction: 1,
        }]
    );
    let events = memory.unstructured.documents_of_kind("inference").await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["payload"]["channel"], "request");
    assert_eq!(events[0]["payload"]["data"], serde_json::json!([0, 1]));
    assert_eq!(memory.counter("request").await, 1);
    assert_eq!(memory.counter("stream").await, 0);
}

#[tokio::test]
async fn invalid_request_has_no_side_effects() {
    let memory = MemoryBackends::new();
    let service = service_over(&memory.backends(), Duration::from_millis(200));

    for (f1, f2) in [(None, Some("1")), (Some("a"), Some("1")), (Some("1.5"), Some("0"))] {
        let err = service
            .handle_request(f1, f2)
            .expect_err("malformed input must be rejected");
        assert_eq!(err.kind, GatewayErrorKind::InvalidInput);
    }
    service.drain().await;

    assert!(memory.structured.records().await.is_empty());
    assert!(memory.unstructured.documents().await.is_empty());
    assert!(memory.counters.snapshot().await.is_empty());
}

#[tokio::test]
async fn unreachable_sinks_do_not_fail_requests() {
    let unreachable = Arc::new(UnreachableBackend::new());
    let memory = MemoryBackends::new();
    let backends = Backends {
        counters: unreachable.clone(),
        structured: unreachable.clone(),
        unstructured: unreachable.clone(),
        external: memory.external.clone(),
    };
    let service = service_over(&backends, Duration::from_millis(200));

    let result = service
        .handle_request(Some("1"), Some("1"))
        .expect("telemetry loss must not fail the request");
    assert_eq!(result.label, Label::One);

    service.drain().await;
    assert_eq!(unreachable.attempts(), 3, "all three writes are attempted");
}

#[tokio::test]
async fn one_failing_sink_does_not_cancel_the_others() {
    let memory = MemoryBackends::new();
    let backends = Backends {
        counters: Arc::new(UnreachableBackend::new()),
        ..memory.backends()
    };
    let service = service_over(&backends, Duration::from_millis(200));

    service
        .handle_request(Some("1"), Some("0"))
        .expect("valid features");
    service.drain().await;

    assert_eq!(memory.structured.records().await.len(), 1);
    assert_eq!(memory.unstructured.documents().await.len(), 1);
}

#[tokio::test]
async fn stalled_sinks_are_bounded_by_write_timeout() {
    let stalled = Arc::new(StalledBackend::new());
    let memory = MemoryBackends::new();
    let backends = Backends {
        counters: stalled.clone(),
        structured: stalled.clone(),
        unstructured: stalled.clone(),
        external: memory.external.clone(),
    };
    let service = service_over(&backends, Duration::from_millis(50));

    let started = Instant::now();
    for _ in 0..10 {
        service
            .handle_request(Some("0"), Some("1"))
            .expect("valid features");
    }
    assert!(
        started.elapsed() < Duration::from_millis(50),
        "handlers must not wait on sink I/O"
    );

    timeout(Duration::from_secs(2), service.drain())
        .await
        .expect("stalled writes must time out instead of hanging");
    assert_eq!(stalled.attempts(), 30);
    assert_eq!(service.side_effects().in_flight(), 0);
}
