//! Conversion between unified video requests and Stability generations

use super::types::{StabilityRequest, StabilityVideo, FINISH_SUCCESS, MAX_SEED};
use crate::protocol::{MediaSource, UnifiedResult, Video, VideoOutput, VideoRequest};
use crate::providers::assemble::Assembled;
use crate::providers::transform::TranslateError;

pub const DEFAULT_CFG_SCALE: f32 = 1.8;
pub const DEFAULT_MOTION_BUCKET_ID: u32 = 127;

/// Image types accepted by the form
const IMAGE_TYPES: &[&str] = &["image/png", "image/jpeg"];

/// Convert a unified video request to the image-to-video form fields
pub fn to_stability_request(request: &VideoRequest) -> Result<StabilityRequest, TranslateError> {
    let image = request.image.as_ref().ok_or_else(|| {
        TranslateError::validation("video.image", "stability generates from an image; none given")
    })?;

    let (data, mime_type) = match &image.source {
        MediaSource::Bytes { data, mime_type } => (data, mime_type),
        // rejected earlier by the descriptor; kept for direct callers
        MediaSource::Url { .. } => {
            return Err(TranslateError::UnsupportedFeature {
                provider: "stability",
                feature: "video.image.url".to_string(),
            })
        }
    };

    if data.is_empty() {
        return Err(TranslateError::validation("video.image.bytes", "image is empty"));
    }
    if !IMAGE_TYPES.contains(&mime_type.as_str()) {
        return Err(TranslateError::validation(
            "video.image.bytes",
            format!("'{}' is not one of {:?}", mime_type, IMAGE_TYPES),
        ));
    }

    let seed = request.seed.unwrap_or(0);
    if seed > MAX_SEED {
        return Err(TranslateError::validation(
            "video.seed",
            format!("{} exceeds {}", seed, MAX_SEED),
        ));
    }

    let cfg_scale = request.guidance_scale.unwrap_or(DEFAULT_CFG_SCALE);
    if !(0.0..=10.0).contains(&cfg_scale) {
        return Err(TranslateError::validation(
            "video.guidance_scale",
            format!("{} is outside 0..=10", cfg_scale),
        ));
    }

    let motion_bucket_id = request.motion_strength.unwrap_or(DEFAULT_MOTION_BUCKET_ID);
    if !(1..=255).contains(&motion_bucket_id) {
        return Err(TranslateError::validation(
            "video.motion_strength",
            format!("{} is outside 1..=255", motion_bucket_id),
        ));
    }

    Ok(StabilityRequest {
        image: data.clone(),
        mime_type: mime_type.clone(),
        seed,
        cfg_scale,
        motion_bucket_id,
    })
}

/// Convert a fetched clip to a unified video result
pub fn from_stability_video(video: &StabilityVideo) -> Assembled {
    let mut assembled = Assembled::new(UnifiedResult::Video(VideoOutput {
        videos: vec![Video {
            uri: None,
            bytes: Some(video.video.clone()),
            mime_type: video.mime_type.clone(),
            generation_id: Some(video.id.clone()),
            seed: video.seed,
        }],
    }));

    if let Some(reason) = video.finish_reason.as_deref().filter(|r| *r != FINISH_SUCCESS) {
        assembled.dropped.push(format!("stability.finish_reason.{}", reason));
    }
    assembled
}
