//! VeoClient - handles communication with the Gemini API video endpoints.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use super::operation::OperationHandle;
use super::request::{GenerationRequest, ImagePayload};

/// The environment variable name for the Gemini API key.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Default base URL for the Gemini API.
pub const VEO_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default model for timelapse generation.
pub const DEFAULT_MODEL: &str = "veo-3.1-fast-generate-preview";

/// Number of videos requested per job.
pub const VIDEO_COUNT: u32 = 1;

/// Output resolution requested from the provider.
pub const VIDEO_RESOLUTION: &str = "720p";

/// Output aspect ratio requested from the provider (vertical).
pub const VIDEO_ASPECT_RATIO: &str = "9:16";

/// API version segment used by every endpoint.
const API_VERSION: &str = "v1beta";

/// Header carrying the API key on submission and status calls.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Query parameter carrying the API key on result downloads.
const API_KEY_QUERY_PARAM: &str = "key";

/// Default timeout for HTTP requests (120 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default connection timeout (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Request body for `predictLongRunning`.
#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    instances: [Instance<'a>; 1],
    parameters: Parameters,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Instance<'a> {
    prompt: String,
    /// Initial frame of the video.
    image: InlineImage<'a>,
    /// Target last frame of the video.
    last_frame: InlineImage<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineImage<'a> {
    bytes_base64_encoded: String,
    mime_type: &'a str,
}

impl<'a> From<&'a ImagePayload> for InlineImage<'a> {
    fn from(image: &'a ImagePayload) -> Self {
        Self {
            bytes_base64_encoded: image.to_base64(),
            mime_type: image.mime_type(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Parameters {
    sample_count: u32,
    resolution: &'static str,
    aspect_ratio: &'static str,
}

/// Error envelope returned by Google APIs on non-success responses.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Client for the Gemini API long-running video endpoints.
pub struct VeoClient {
    api_key: RwLock<String>,
    base_url: String,
    model: String,
    http_client: reqwest::Client,
}

impl VeoClient {
    /// Create a new VeoClient by reading the API key from `GEMINI_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns `VeoError::MissingApiKey` if the variable is unset or empty.
    pub fn new() -> Result<Self, VeoError> {
        Self::from_env_var(GEMINI_API_KEY_ENV)
    }

    /// Create a new VeoClient reading the API key from a named variable.
    pub fn from_env_var(var: &str) -> Result<Self, VeoError> {
        let api_key = std::env::var(var).map_err(|_| VeoError::MissingApiKey)?;
        Self::with_api_key(api_key)
    }

    /// Create a new VeoClient with an explicit API key.
    pub fn with_api_key(api_key: String) -> Result<Self, VeoError> {
        Self::with_base_url(api_key, VEO_API_BASE_URL.to_string())
    }

    /// Create a new VeoClient with a custom base URL.
    ///
    /// Useful for testing against a mock server.
    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self, VeoError> {
        if api_key.trim().is_empty() {
            return Err(VeoError::MissingApiKey);
        }

        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            api_key: RwLock::new(api_key),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: DEFAULT_MODEL.to_string(),
            http_client,
        })
    }

    /// Replace the model used for submissions.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Get the API key currently used for requests.
    pub fn api_key(&self) -> String {
        self.api_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Switch to another API key for all later requests.
    ///
    /// Blank keys are ignored and the current key is kept.
    pub fn set_api_key(&self, api_key: impl Into<String>) {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            log::warn!("Ignoring blank API key");
            return;
        }
        *self.api_key.write().unwrap_or_else(PoisonError::into_inner) = api_key;
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the model.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Submit a timelapse generation job.
    ///
    /// The "before" image becomes the initial frame and the "after" image
    /// the target last frame. The user prompt is wrapped in the fixed
    /// cinematic preamble. This is a single call and is never retried here.
    ///
    /// # Errors
    ///
    /// Returns `VeoError::InvalidInput` if an image is missing or empty
    /// (without contacting the provider), `VeoError::Api` if the provider
    /// rejects the request, or `VeoError::HttpError` if the request fails.
    pub async fn submit(&self, request: &GenerationRequest) -> Result<OperationHandle, VeoError> {
        let (before, after) = request.images()?;

        let url = format!(
            "{}/{}/models/{}:predictLongRunning",
            self.base_url, API_VERSION, self.model
        );

        let body = PredictRequest {
            instances: [Instance {
                prompt: request.composed_prompt(),
                image: before.into(),
                last_frame: after.into(),
            }],
            parameters: Parameters {
                sample_count: VIDEO_COUNT,
                resolution: VIDEO_RESOLUTION,
                aspect_ratio: VIDEO_ASPECT_RATIO,
            },
        };

        log::debug!(
            "Submitting generation to {} (before: {} bytes, after: {} bytes)",
            url,
            before.len(),
            after.len()
        );

        let response = self
            .http_client
            .post(&url)
            .header(API_KEY_HEADER, self.api_key())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let handle: OperationHandle = response.json().await?;
        log::info!("Generation submitted, operation: {}", handle.name());
        Ok(handle)
    }

    /// Fetch the current state of an operation.
    ///
    /// Returns a fresh handle; the one passed in is left untouched.
    pub async fn fetch_operation(
        &self,
        handle: &OperationHandle,
    ) -> Result<OperationHandle, VeoError> {
        let url = format!("{}/{}/{}", self.base_url, API_VERSION, handle.name());

        let response = self
            .http_client
            .get(&url)
            .header(API_KEY_HEADER, self.api_key())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let next: OperationHandle = response.json().await?;
        log::debug!("Operation {} done: {}", next.name(), next.is_done());
        Ok(next)
    }

    /// Stream a finished video into `file`.
    ///
    /// The API key is appended as the `key` query parameter, which the
    /// download endpoint requires. Returns the number of bytes written.
    pub async fn download_to(
        &self,
        uri: &str,
        file: &mut tokio::fs::File,
    ) -> Result<u64, VeoError> {
        let mut url =
            reqwest::Url::parse(uri).map_err(|e| VeoError::InvalidUri(format!("{}: {}", uri, e)))?;
        url.query_pairs_mut()
            .append_pair(API_KEY_QUERY_PARAM, &self.api_key());

        let response = self.http_client.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(VeoError::Download {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }
}

/// Turn a non-success response into `VeoError::Api`, preferring the
/// provider's own error message when the body carries one.
async fn api_error(response: reqwest::Response) -> VeoError {
    let status = response.status().as_u16();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    let message = serde_json::from_str::<ErrorEnvelope>(&error_text)
        .ok()
        .map(|envelope| envelope.error.message)
        .filter(|m| !m.is_empty())
        .unwrap_or(error_text);

    log::warn!("Gemini API returned {}: {}", status, message);
    VeoError::Api { status, message }
}

/// Errors that can occur during Veo operations.
#[derive(Debug, thiserror::Error)]
pub enum VeoError {
    #[error("API key not configured")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code of the rejected call
        status: u16,
        /// Provider error message
        message: String,
    },

    #[error("Operation failed with code {code}: {message}")]
    Operation {
        /// Provider status code carried on the operation
        code: i32,
        /// Provider error message
        message: String,
    },

    #[error("Content was filtered by the provider: {reasons}")]
    ContentFiltered { reasons: String },

    #[error("Operation completed without a video result")]
    NoResult,

    #[error("Invalid result URI {0}")]
    InvalidUri(String),

    #[error("Video download failed with status {status}: {message}")]
    Download { status: u16, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("A generation is already in progress")]
    Conflict,

    #[error("Credential selection required")]
    CredentialRequired,

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Generation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
