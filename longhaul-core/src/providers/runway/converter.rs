//! Conversion between unified video requests and Runway tasks

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::types::{
    PromptImage, RunwayPayload, RunwayRequest, RunwayTask, TextToImageRequest, TextToVideo,
    VideoUpscaleRequest,
};
use crate::capabilities::ProviderDescriptor;
use crate::protocol::{
    AspectRatio, ImageRole, MediaSource, UnifiedResult, UpscaleRequest, Video, VideoOutput,
    VideoRequest,
};
use crate::providers::assemble::Assembled;
use crate::providers::transform::{check_text, CodeTable, TranslateError};

pub const GEN3A_TURBO: &str = "gen3a_turbo";
pub const GEN4_TURBO: &str = "gen4_turbo";
pub const DEFAULT_MODEL: &str = GEN4_TURBO;
pub const DEFAULT_DURATION_SECS: u32 = 5;

/// Model rendering the first frame of a text-to-video request
pub const IMAGE_MODEL: &str = "gen4_image";

pub const UPSCALE_MODEL: &str = "upscale_v1";

/// Output ratios accepted by gen3a_turbo
pub static GEN3A_RATIOS: CodeTable<AspectRatio, &str> = CodeTable::new(
    "video.aspect_ratio",
    &[
        (AspectRatio::Landscape, "1280:768"),
        (AspectRatio::Portrait, "768:1280"),
    ],
);

/// Output ratios accepted by gen4_turbo
pub static GEN4_RATIOS: CodeTable<AspectRatio, &str> = CodeTable::new(
    "video.aspect_ratio",
    &[
        (AspectRatio::Landscape, "1280:720"),
        (AspectRatio::Portrait, "720:1280"),
        (AspectRatio::Square, "960:960"),
        (AspectRatio::Cinema, "1584:672"),
    ],
);

/// First-frame ratios accepted by gen4_image
pub static IMAGE_RATIOS: CodeTable<AspectRatio, &str> = CodeTable::new(
    "video.aspect_ratio",
    &[
        (AspectRatio::Landscape, "1920:1080"),
        (AspectRatio::Portrait, "1080:1920"),
        (AspectRatio::Square, "1024:1024"),
        (AspectRatio::Cinema, "1808:768"),
    ],
);

pub static POSITIONS: CodeTable<ImageRole, &str> = CodeTable::new(
    "video.image.role",
    &[(ImageRole::FirstFrame, "first"), (ImageRole::LastFrame, "last")],
);

/// Convert a unified video request to a Runway payload
///
/// A request with an image becomes one image-to-video task. A prompt-only
/// request becomes a text-to-image task whose output seeds the video task.
pub fn to_runway_payload(
    request: &VideoRequest,
    descriptor: &ProviderDescriptor,
) -> Result<RunwayPayload, TranslateError> {
    let Some(image) = &request.image else {
        return to_text_to_video(request, descriptor).map(RunwayPayload::TextToVideo);
    };

    let uri = match &image.source {
        MediaSource::Url { url } => {
            check_text("video.image.url", url, None)?;
            url.clone()
        }
        MediaSource::Bytes { data, mime_type } => {
            if !mime_type.starts_with("image/") {
                return Err(TranslateError::validation(
                    "video.image.bytes",
                    format!("'{}' is not an image type", mime_type),
                ));
            }
            format!("data:{};base64,{}", mime_type, STANDARD.encode(data))
        }
    };

    let position = POSITIONS.to_provider(image.role.unwrap_or(ImageRole::FirstFrame))?;

    Ok(RunwayPayload::ImageToVideo(RunwayRequest {
        prompt_image: vec![PromptImage {
            uri,
            position: position.to_string(),
        }],
        ..video_stage(request, descriptor)?
    }))
}

fn to_text_to_video(
    request: &VideoRequest,
    descriptor: &ProviderDescriptor,
) -> Result<TextToVideo, TranslateError> {
    let prompt = request.prompt.as_deref().ok_or_else(|| {
        TranslateError::validation("video.prompt", "runway needs a prompt or an image")
    })?;
    let video = video_stage(request, descriptor)?;
    let ratio = IMAGE_RATIOS.to_provider(request.aspect_ratio.unwrap_or(AspectRatio::Landscape))?;

    Ok(TextToVideo {
        image: TextToImageRequest {
            prompt_text: prompt.to_string(),
            ratio: ratio.to_string(),
            model: IMAGE_MODEL.to_string(),
            seed: video.seed,
        },
        video,
    })
}

/// Everything but the conditioning image
fn video_stage(
    request: &VideoRequest,
    descriptor: &ProviderDescriptor,
) -> Result<RunwayRequest, TranslateError> {
    let model = request.model.as_deref().unwrap_or(DEFAULT_MODEL);
    let ratios = match model {
        GEN3A_TURBO => &GEN3A_RATIOS,
        GEN4_TURBO => &GEN4_RATIOS,
        other => {
            return Err(TranslateError::validation(
                "model",
                format!("unknown runway model '{}'", other),
            ))
        }
    };
    let ratio = ratios.to_provider(request.aspect_ratio.unwrap_or(AspectRatio::Landscape))?;

    let durations = descriptor.limits.durations;
    let duration = request.duration_seconds.unwrap_or(DEFAULT_DURATION_SECS);
    if !durations.is_empty() && !durations.contains(&duration) {
        return Err(TranslateError::validation(
            "video.duration_seconds",
            format!("{}s is not one of {:?}", duration, durations),
        ));
    }

    let seed = request
        .seed
        .map(|seed| {
            u32::try_from(seed).map_err(|_| {
                TranslateError::validation("video.seed", format!("{} exceeds {}", seed, u32::MAX))
            })
        })
        .transpose()?;

    if let Some(prompt) = &request.prompt {
        check_text("video.prompt", prompt, descriptor.limits.max_prompt_chars)?;
    }

    Ok(RunwayRequest {
        prompt_image: Vec::new(),
        model: model.to_string(),
        ratio: ratio.to_string(),
        duration,
        seed,
        prompt_text: request.prompt.clone(),
    })
}

/// Convert a unified upscale request to a Runway upscale task
pub fn to_runway_upscale(request: &UpscaleRequest) -> Result<RunwayPayload, TranslateError> {
    let MediaSource::Url { url } = &request.video else {
        return Err(TranslateError::validation(
            "upscale.video.bytes",
            "runway upscales videos by URL only",
        ));
    };
    check_text("upscale.video.url", url, None)?;

    let model = request.model.as_deref().unwrap_or(UPSCALE_MODEL);
    if model != UPSCALE_MODEL {
        return Err(TranslateError::validation(
            "model",
            format!("unknown runway upscale model '{}'", model),
        ));
    }

    Ok(RunwayPayload::Upscale(VideoUpscaleRequest {
        video_uri: url.clone(),
        model: model.to_string(),
    }))
}

/// Convert a succeeded Runway task to a unified video result
pub fn from_runway_task(task: &RunwayTask) -> Assembled {
    let videos = task
        .output
        .iter()
        .map(|url| Video {
            uri: Some(url.clone()),
            bytes: None,
            mime_type: "video/mp4".to_string(),
            generation_id: Some(task.id.clone()),
            seed: None,
        })
        .collect();

    Assembled::new(UnifiedResult::Video(VideoOutput { videos })).drop_extra("runway", &task.extra)
}
