//! HTTP transport for vendor requests.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client};
use tracing;

use crate::error::TransportError;

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A form-encoded POST with HTTP Basic credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub url: String,
    pub form: Vec<(String, String)>,
    pub username: String,
    pub password: String,
}

impl OutboundRequest {
    pub fn encoded_body(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.form.iter())
            .finish()
    }

    /// Human-readable rendering for channel logs. The password is never included.
    pub fn describe(&self) -> String {
        format!(
            "POST {}\nContent-Type: {}\nAuthorization: Basic {}:****\n\n{}",
            self.url,
            FORM_CONTENT_TYPE,
            self.username,
            self.encoded_body()
        )
    }
}

/// A 2xx response from the vendor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorResponse {
    pub status: u16,
    pub body: String,
}

/// Issues a single request. Implementations enforce their own timeout and
/// turn non-2xx answers into [`TransportError::Status`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &OutboundRequest) -> Result<VendorResponse, TransportError>;
}

/// reqwest-backed transport shared by all sends.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(100)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, timeout })
    }

    fn classify(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            tracing::error!(
                timeout_seconds = self.timeout.as_secs_f64(),
                error = %e,
                "bm_send_timeout"
            );
            TransportError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            tracing::error!(error = %e, "bm_send_request_error");
            TransportError::Request(e.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &OutboundRequest) -> Result<VendorResponse, TransportError> {
        let resp = self
            .client
            .post(&request.url)
            .timeout(self.timeout)
            .basic_auth(&request.username, Some(&request.password))
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(request.encoded_body())
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| self.classify(e))?;

        tracing::info!(
            url = %request.url,
            status_code = status,
            body_length = body.len(),
            "bm_send_response"
        );

        if (200..300).contains(&status) {
            Ok(VendorResponse { status, body })
        } else {
            Err(TransportError::Status { status, body })
        }
    }
}
