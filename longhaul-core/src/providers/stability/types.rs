//! Stability AI image-to-video types

use serde::Deserialize;

/// Largest seed the generation endpoint accepts
pub const MAX_SEED: u64 = 4_294_967_294;

/// `finish-reason` header values
pub const FINISH_SUCCESS: &str = "SUCCESS";
pub const FINISH_CONTENT_FILTERED: &str = "CONTENT_FILTERED";

/// Fields of the multipart `image-to-video` form
#[derive(Debug, Clone, PartialEq)]
pub struct StabilityRequest {
    pub image: Vec<u8>,
    pub mime_type: String,

    /// 0 lets the provider pick a random seed
    pub seed: u64,

    /// Adherence to the source image, 0..=10
    pub cfg_scale: f32,

    /// Amount of motion, 1..=255
    pub motion_bucket_id: u32,
}

/// Response to a generation request
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedGeneration {
    pub id: String,
}

/// Body of a `202 Accepted` result poll
#[derive(Debug, Clone, Deserialize)]
pub struct InProgress {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Finished clip fetched from the result endpoint
///
/// The endpoint answers with the raw mp4 and reports the seed and finish
/// reason in headers, so this is built by the client rather than decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct StabilityVideo {
    pub id: String,
    pub video: Vec<u8>,
    pub mime_type: String,
    pub finish_reason: Option<String>,
    pub seed: Option<u64>,
}

/// Error body
#[derive(Debug, Clone, Deserialize)]
pub struct StabilityError {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl StabilityError {
    pub fn message(&self) -> Option<String> {
        if self.errors.is_empty() {
            self.name.clone()
        } else {
            Some(self.errors.join("; "))
        }
    }
}
