// WHY: Network boundary to the scanning service. The orchestration layer only
// sees ScanResult or a tagged ScanError; scoring stays opaque.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ScanError, ScanErrorKind};
use crate::model::ScanResult;

/// Body of `POST /scan`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub project_id: String,
    pub content: String,
}

/// Remote similarity-scanning service
#[async_trait]
pub trait RemoteScanClient: Send + Sync {
    async fn scan(&self, request: ScanRequest) -> Result<ScanResult, ScanError>;
}

/// Error body returned by the service on failure
#[derive(Deserialize, Debug, Default)]
struct ErrorBody {
    kind: Option<ScanErrorKind>,
    message: Option<String>,
    error: Option<String>,
    #[serde(default)]
    upgrade: bool,
}

/// Classify a failed response from its status code and structured body.
/// An explicit `kind` in the body wins over the status code.
fn classify_failure(status: StatusCode, body: &str) -> ScanError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .or(parsed.error)
        .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));

    let kind = parsed.kind.unwrap_or(match status {
        StatusCode::PAYMENT_REQUIRED => ScanErrorKind::LimitReached,
        StatusCode::FORBIDDEN if parsed.upgrade => ScanErrorKind::LimitReached,
        StatusCode::SERVICE_UNAVAILABLE => ScanErrorKind::Maintenance,
        _ => ScanErrorKind::Generic,
    });

    ScanError::new(kind, message)
}

/// Version of the crate, used in User-Agent header
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// HTTP implementation of [`RemoteScanClient`]
#[derive(Debug, Clone)]
pub struct HttpScanClient {
    endpoint: String,
    client: Client,
}

impl HttpScanClient {
    /// `endpoint` is the service base URL; requests go to `{endpoint}/scan`.
    /// `timeout` bounds each request at the transport level.
    pub fn new(
        endpoint: impl Into<String>,
        token: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Self, ScanError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("originality-scan/{VERSION}"))
                .unwrap_or_else(|_| HeaderValue::from_static("originality-scan")),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| ScanError::generic(format!("Invalid auth token: {e}")))?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ScanError::generic(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn scan_url(&self) -> String {
        format!("{}/scan", self.endpoint)
    }
}

#[async_trait]
impl RemoteScanClient for HttpScanClient {
    async fn scan(&self, request: ScanRequest) -> Result<ScanResult, ScanError> {
        let url = self.scan_url();
        debug!(%url, project_id = %request.project_id, bytes = request.content.len(), "Sending scan request");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Scan request failed to send");
                ScanError::generic(format!("Network error: {e}"))
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ScanError::generic(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let err = classify_failure(status, &body);
            warn!(status = status.as_u16(), kind = %err.kind(), "Scan request rejected");
            return Err(err);
        }

        let result: ScanResult = serde_json::from_str(&body)
            .map_err(|e| ScanError::generic(format!("Failed to parse scan response: {e}")))?;
        result
            .validate_against(&request.content)
            .map_err(|e| ScanError::generic(format!("Malformed scan response: {e}")))?;
        Ok(result)
    }
}
