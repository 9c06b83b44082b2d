use async_trait::async_trait;
use reqwest::{Client, Url};
use tokio::time::{Duration, timeout};

use crate::{
    error::{GatewayError, external_service, invalid_input},
    ports::ExternalCallPort,
};

/// Outbound GET calls to a third-party endpoint.
#[derive(Clone)]
pub struct HttpExternalCaller {
    client: Client,
}

impl HttpExternalCaller {
    pub fn new() -> Result<Self, GatewayError> {
        let client = Client::builder()
            .build()
            .map_err(|err| external_service(format!("http client build failed: {err}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ExternalCallPort for HttpExternalCaller {
    async fn get(&self, url: &str, call_timeout: Duration) -> Result<u16, GatewayError> {
        let url = match Url::parse(url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            Ok(url) => {
                return Err(invalid_input(format!(
                    "unsupported url scheme '{}'",
                    url.scheme()
                )));
            }
            Err(err) => return Err(invalid_input(format!("invalid url '{url}': {err}"))),
        };

        match timeout(call_timeout, self.client.get(url).send()).await {
            Ok(Ok(response)) => Ok(response.status().as_u16()),
            Ok(Err(err)) => Err(external_service(format!("request failed: {err}"))),
            Err(_) => Err(crate::error::timeout(format!(
                "no response within {} ms",
                call_timeout.as_millis()
            ))),
        }
    }
}
