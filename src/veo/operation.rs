//! Long-running operation handles as returned by the provider.

use serde::Deserialize;

/// Provider-issued state of an in-flight or completed job.
///
/// Handles are immutable values. Polling produces a new handle that replaces
/// the previous one; nothing updates a handle in place.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OperationHandle {
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    response: Option<OperationResponse>,
    #[serde(default)]
    error: Option<OperationErrorInfo>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResponse {
    #[serde(default)]
    generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateVideoResponse {
    #[serde(default)]
    generated_samples: Vec<GeneratedSample>,
    #[serde(default)]
    rai_media_filtered_count: Option<u32>,
    #[serde(default)]
    rai_media_filtered_reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct GeneratedSample {
    #[serde(default)]
    video: Option<GeneratedVideo>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct GeneratedVideo {
    #[serde(default)]
    uri: Option<String>,
}

/// Error carried on a finished operation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OperationErrorInfo {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

/// Point-in-time view of an operation. Re-derive it from every new handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationStatus {
    pub done: bool,
    pub result_uri: Option<String>,
    pub error_info: Option<OperationErrorInfo>,
    /// Responsible-AI filter reasons reported instead of a video.
    pub filtered_reasons: Vec<String>,
}

impl OperationHandle {
    /// A handle for an operation that has not finished yet.
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            done: false,
            response: None,
            error: None,
        }
    }

    /// Resource name used to fetch the operation, e.g.
    /// `models/veo-3.1-fast-generate-preview/operations/abc123`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn status(&self) -> OperationStatus {
        let video_response = self
            .response
            .as_ref()
            .and_then(|r| r.generate_video_response.as_ref());

        let result_uri = video_response
            .and_then(|r| r.generated_samples.first())
            .and_then(|sample| sample.video.as_ref())
            .and_then(|video| video.uri.clone())
            .filter(|uri| !uri.is_empty());

        let mut filtered_reasons = video_response
            .map(|r| r.rai_media_filtered_reasons.clone())
            .unwrap_or_default();
        if filtered_reasons.is_empty()
            && result_uri.is_none()
            && video_response
                .and_then(|r| r.rai_media_filtered_count)
                .unwrap_or(0)
                > 0
        {
            filtered_reasons.push("all generated videos were filtered".to_string());
        }

        OperationStatus {
            done: self.done,
            result_uri,
            error_info: self.error.clone(),
            filtered_reasons,
        }
    }
}
