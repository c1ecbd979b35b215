use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::error::RemoteError;
use super::wire::{
    BatchProcessRequest, BatchProcessResult, CropRequest, DetectionRequest, DetectionResponse,
    ErrorBody, HealthResponse, RemoteComposedSheet, RemoteProcessedImage,
    SheetCompositionRequest,
};
use super::ProcessingService;
use crate::config::RemoteConfig;

/// Upper bound on the TCP connect phase, independent of the request timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum length of a remote error body kept in error messages.
const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Attempt budget and exponential backoff for transient failures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay after failed attempt number `attempt` (1-based): `base × 2^(attempt−1)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(Duration::MAX)
    }

    /// Runs `op` until it succeeds, fails permanently or the budget is spent.
    pub async fn run<T, F, Fut>(&self, name: &str, mut op: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation = name,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Remote call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    debug!(operation = name, attempt, error = %e, "Remote call gave up");
                    return Err(e);
                }
            }
        }
    }
}

/// HTTP client for the processing service.
#[derive(Clone)]
pub struct RemoteClient {
    http: Client,
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl RemoteClient {
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let timeout = config.timeout();
        let http = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .pool_max_idle_per_host(config.pool_size)
            .build()
            .map_err(|e| RemoteError::Connection {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout,
            retry: RetryPolicy {
                max_attempts: config.max_retries,
                base_delay: config.retry_delay(),
            },
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<B, T>(&self, name: &str, path: &str, body: &B) -> Result<T, RemoteError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        self.retry
            .run(name, || self.execute(self.http.post(&url).json(body)))
            .await
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RemoteError> {
        let response = request.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Service {
                status: status.as_u16(),
                message: error_message(&body, status.canonical_reason()),
            });
        }

        response.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                self.timeout_error()
            } else {
                RemoteError::Service {
                    status: status.as_u16(),
                    message: format!("invalid response body: {}", e),
                }
            }
        })
    }

    fn classify(&self, error: reqwest::Error) -> RemoteError {
        if error.is_timeout() {
            self.timeout_error()
        } else {
            RemoteError::Connection {
                message: error.to_string(),
            }
        }
    }

    fn timeout_error(&self) -> RemoteError {
        RemoteError::Timeout {
            timeout_ms: self.timeout.as_millis() as u64,
        }
    }
}

/// Pulls the message out of a structured error body, truncating raw bodies.
fn error_message(body: &str, reason: Option<&str>) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        let detail = parsed.detail.map(|d| match d {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });
        if let Some(message) = parsed.message.or(detail) {
            return match parsed.error_code {
                Some(code) => format!("{}: {}", code, message),
                None => message,
            };
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return reason.unwrap_or("request failed").to_string();
    }
    if trimmed.len() > MAX_ERROR_BODY_LENGTH {
        let cut = (0..=MAX_ERROR_BODY_LENGTH)
            .rev()
            .find(|&i| trimmed.is_char_boundary(i))
            .unwrap_or(0);
        format!("{}... (truncated)", &trimmed[..cut])
    } else {
        trimmed.to_string()
    }
}

#[async_trait]
impl ProcessingService for RemoteClient {
    async fn detect_objects(
        &self,
        request: &DetectionRequest,
    ) -> Result<DetectionResponse, RemoteError> {
        self.post_json("detect", "/api/v1/detect", request).await
    }

    async fn crop_image(&self, request: &CropRequest) -> Result<RemoteProcessedImage, RemoteError> {
        self.post_json("crop", "/api/v1/crop", request).await
    }

    async fn process_batch(
        &self,
        request: &BatchProcessRequest,
    ) -> Result<BatchProcessResult, RemoteError> {
        self.post_json("process_batch", "/api/v1/process-batch", request)
            .await
    }

    async fn compose_sheet(
        &self,
        request: &SheetCompositionRequest,
    ) -> Result<RemoteComposedSheet, RemoteError> {
        self.post_json("compose_sheet", "/api/v1/compose-sheet", request)
            .await
    }

    /// Single attempt; the health monitor polls on its own schedule.
    async fn check_health(&self) -> Result<HealthResponse, RemoteError> {
        self.execute(self.http.get(self.url("/health"))).await
    }
}
