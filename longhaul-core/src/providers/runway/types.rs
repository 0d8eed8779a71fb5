//! Runway API types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Task family a payload creates
#[derive(Debug, Clone, PartialEq)]
pub enum RunwayPayload {
    ImageToVideo(RunwayRequest),
    /// Prompt rendered to a first frame, then animated
    TextToVideo(TextToVideo),
    Upscale(VideoUpscaleRequest),
}

/// Two-stage text-to-video: `image` runs first, its output feeds `video`
#[derive(Debug, Clone, PartialEq)]
pub struct TextToVideo {
    pub image: TextToImageRequest,

    /// Video stage with an empty `prompt_image`
    pub video: RunwayRequest,
}

impl TextToVideo {
    /// Video stage request animating the rendered frame at `image_uri`
    pub fn video_from(&self, image_uri: &str) -> RunwayRequest {
        RunwayRequest {
            prompt_image: vec![PromptImage {
                uri: image_uri.to_string(),
                position: "first".to_string(),
            }],
            ..self.video.clone()
        }
    }
}

/// Text-to-image task request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextToImageRequest {
    pub prompt_text: String,
    pub ratio: String,
    pub model: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u32>,
}

/// Video upscale task request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoUpscaleRequest {
    pub video_uri: String,
    pub model: String,
}

/// Image-to-video task request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunwayRequest {
    pub prompt_image: Vec<PromptImage>,
    pub model: String,
    pub ratio: String,
    pub duration: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_text: Option<String>,
}

/// Conditioning image, as a URL or data URI
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptImage {
    pub uri: String,
    pub position: String,
}

/// Response to task creation
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedTask {
    pub id: String,
}

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunwayStatus {
    Pending,
    Throttled,
    Running,
    Succeeded,
    Failed,
    #[serde(alias = "CANCELED")]
    Cancelled,
    #[serde(other)]
    Unknown,
}

/// Task detail returned by `GET /v1/tasks/{id}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunwayTask {
    pub id: String,
    pub status: RunwayStatus,

    /// Output URLs, present once succeeded
    #[serde(default)]
    pub output: Vec<String>,

    #[serde(default)]
    pub failure: Option<String>,

    #[serde(default)]
    pub failure_code: Option<String>,

    #[serde(default)]
    pub progress: Option<f32>,

    #[serde(default)]
    pub created_at: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Error body
#[derive(Debug, Clone, Deserialize)]
pub struct RunwayError {
    pub error: String,
}
