use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use super::envelope::{ApiResponse, RequestEnvelope};
use super::error::{Result, SessionError};
use crate::config::ApiConfig;

/// Thin wrapper over `reqwest` that sends envelopes against the API base URL.
///
/// Every call is bounded by the configured timeout; a timeout is reported as
/// `NetworkUnavailable`, never as an authorization failure.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(config.timeout_in_ms),
        }
    }

    /// Resolve a target against the base URL. Absolute URLs pass through.
    pub fn url_for(&self, target: &str) -> String {
        if target.starts_with("http://") || target.starts_with("https://") {
            target.to_string()
        } else if target.starts_with('/') {
            format!("{}{}", self.base_url, target)
        } else {
            format!("{}/{}", self.base_url, target)
        }
    }

    /// Send the envelope, with `bearer` as the `Authorization` header when given.
    pub async fn send(&self, envelope: &RequestEnvelope, bearer: Option<&str>) -> Result<ApiResponse> {
        let url = self.url_for(&envelope.target);
        let mut request = self.client.request(envelope.method.clone(), &url);
        if !envelope.query.is_empty() {
            request = request.query(&envelope.query);
        }
        if let Some(body) = &envelope.body {
            request = request.json(body);
        }
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        debug!(
            request_id = %envelope.id,
            method = %envelope.method,
            url = url.as_str(),
            authorized = bearer.is_some(),
            retried = envelope.is_retried(),
            "Sending request"
        );

        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>(ApiResponse {
                status,
                headers,
                body,
            })
        };

        match timeout(self.timeout, exchange).await {
            Ok(Ok(response)) => {
                debug!(
                    request_id = %envelope.id,
                    status = response.status.as_u16(),
                    "Received response"
                );
                Ok(response)
            }
            Ok(Err(e)) => {
                warn!(request_id = %envelope.id, url = url.as_str(), "Request failed: {}", e);
                Err(SessionError::NetworkUnavailable(e.to_string()))
            }
            Err(_) => {
                warn!(
                    request_id = %envelope.id,
                    url = url.as_str(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Request timed out"
                );
                Err(SessionError::NetworkUnavailable(format!(
                    "no response from {} within {}ms",
                    url,
                    self.timeout.as_millis()
                )))
            }
        }
    }
}
