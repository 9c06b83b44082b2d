use std::time::Duration;

use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

use infergate::{adapters::http::HttpExternalCaller, error::GatewayErrorKind, ports::ExternalCallPort};

async fn server_answering(status: u16, delay: Duration) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/get"))
        .respond_with(ResponseTemplate::new(status).set_delay(delay))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn returns_status_code_of_the_target() {
    let server = server_answering(200, Duration::ZERO).await;
    let caller = HttpExternalCaller::new().expect("client");

    let status = caller
        .get(&format!("{}/get", server.uri()), Duration::from_secs(2))
        .await
        .expect("call should succeed");
    assert_eq!(status, 200);
}

#[tokio::test]
async fn non_success_status_is_not_an_error() {
    let server = server_answering(503, Duration::ZERO).await;
    let caller = HttpExternalCaller::new().expect("client");

    let status = caller
        .get(&format!("{}/get", server.uri()), Duration::from_secs(2))
        .await
        .expect("call should complete");
    assert_eq!(status, 503);
}

#[tokio::test]
async fn slow_target_times_out() {
    let server = server_answering(200, Duration::from_millis(500)).await;
    let caller = HttpExternalCaller::new().expect("client");

    let err = caller
        .get(&format!("{}/get", server.uri()), Duration::from_millis(50))
        .await
        .expect_err("call should time out");
    assert_eq!(err.kind, GatewayErrorKind::Timeout);
}

#[tokio::test]
async fn refuses_non_http_targets() {
    let caller = HttpExternalCaller::new().expect("client");

    let err = caller
        .get("ftp://example.com/file", Duration::from_secs(1))
        .await
        .expect_err("scheme should be rejected");
    assert_eq!(err.kind, GatewayErrorKind::InvalidInput);

    let err = caller
        .get("not a url", Duration::from_secs(1))
        .await
        .expect_err("garbage should be rejected");
    assert_eq!(err.kind, GatewayErrorKind::InvalidInput);
}

#[tokio::test]
async fn unreachable_target_is_a_transport_failure() {
    let caller = HttpExternalCaller::new().expect("client");

    let err = caller
        .get("http://127.0.0.1:9/get", Duration::from_secs(2))
        .await
        .expect_err("nothing listens on the discard port");
    assert_ne!(err.kind, GatewayErrorKind::InvalidInput);
}
