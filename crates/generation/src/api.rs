//! HTTP client for the generation provider.
//!
//! Wraps render submission, status lookup, and result download using
//! [`reqwest`].

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::models::{Envelope, GenerationRequest, SubmitResponse, TaskStatus};

/// Envelope `code` the provider uses for success.
const CODE_OK: u16 = 200;

/// Upper bound on one HTTP exchange, response body included.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Upper bound on establishing a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the generation provider.
#[derive(Clone)]
pub struct GenerationApi {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

/// Errors from the generation provider layer.
///
/// Messages carry the numeric status so transient failures (429, 5xx)
/// can be recognised from the rendered text.
#[derive(Debug, thiserror::Error)]
pub enum GenerationApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned a non-2xx status code.
    #[error("Generation API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// HTTP succeeded but the envelope reported an error.
    #[error("Generation provider error ({code}): {message}")]
    Provider { code: u16, message: String },

    /// A success envelope without a `data` payload.
    #[error("Generation provider returned no data")]
    MissingData,
}

impl GenerationApi {
    /// Create a client for the provider with the default timeouts.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `https://api.provider.example`.
    pub fn new(api_url: String, api_key: String) -> Result<Self, GenerationApiError> {
        Self::with_timeouts(
            api_url,
            api_key,
            DEFAULT_REQUEST_TIMEOUT,
            DEFAULT_CONNECT_TIMEOUT,
        )
    }

    /// Create a client whose requests fail with a timeout error instead
    /// of waiting on an unresponsive provider.
    pub fn with_timeouts(
        api_url: String,
        api_key: String,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, GenerationApiError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self::with_client(client, api_url, api_key))
    }

    /// Create a client reusing an existing [`reqwest::Client`]
    /// (useful for sharing timeouts and connection pools).
    pub fn with_client(client: reqwest::Client, api_url: String, api_key: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Queue a render. Returns the provider's task id.
    pub async fn submit_video(
        &self,
        request: &GenerationRequest,
    ) -> Result<SubmitResponse, GenerationApiError> {
        let response = self
            .client
            .post(format!("{}/api/v1/videos/generate", self.api_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let submitted: SubmitResponse = Self::parse_envelope(response).await?;
        tracing::debug!(task_id = %submitted.task_id, model = request.model.as_str(), "Render submitted");
        Ok(submitted)
    }

    /// Fetch the current status of a render.
    pub async fn get_task_status(&self, task_id: &str) -> Result<TaskStatus, GenerationApiError> {
        let response = self
            .client
            .get(format!("{}/api/v1/videos/record-info", self.api_url))
            .bearer_auth(&self.api_key)
            .query(&[("taskId", task_id)])
            .send()
            .await?;

        Self::parse_envelope(response).await
    }

    /// Download a finished render.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, GenerationApiError> {
        let response = self.client.get(url).send().await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`GenerationApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, GenerationApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(GenerationApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse the envelope and unwrap its `data` payload.
    async fn parse_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GenerationApiError> {
        let response = Self::ensure_success(response).await?;
        let envelope = response.json::<Envelope<T>>().await?;
        unwrap_envelope(envelope)
    }
}

fn unwrap_envelope<T>(envelope: Envelope<T>) -> Result<T, GenerationApiError> {
    if envelope.code != CODE_OK {
        return Err(GenerationApiError::Provider {
            code: envelope.code,
            message: envelope.msg,
        });
    }
    envelope.data.ok_or(GenerationApiError::MissingData)
}
