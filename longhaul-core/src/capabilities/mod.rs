//! Provider capability taxonomy
//!
//! Every provider declares, in a static [`ProviderDescriptor`], which
//! operation kinds it serves, which unified request fields it can honour,
//! which result fields it produces and how its calls complete. The
//! translator rejects requests against this table before any network call.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod descriptor;

pub use descriptor::{ProviderDescriptor, ALL_DESCRIPTORS};

/// How a provider call reaches its final result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AsyncModel {
    /// The start call returns the result
    Immediate,
    /// The start call returns a job reference that is polled until done
    Polling,
    /// The start call returns a cursor; results arrive page by page
    Paginated,
}

/// A unified request field a provider may or may not honour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestField {
    VideoPrompt,
    ImageUrl,
    ImageBytes,
    ImageRole,
    NegativePrompt,
    Seed,
    AspectRatio,
    Duration,
    Model,
    GuidanceScale,
    MotionStrength,
    VideoUrl,
    VideoBytes,
    AudioUrl,
    AudioBytes,
    Language,
    Diarization,
    ProfanityFilter,
    Vocabulary,
    SearchQuery,
    MaxResults,
    SafeSearch,
    TimeRange,
    IncludeDomains,
    Region,
}

impl RequestField {
    /// Dotted name used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            RequestField::VideoPrompt => "video.prompt",
            RequestField::ImageUrl => "video.image.url",
            RequestField::ImageBytes => "video.image.bytes",
            RequestField::ImageRole => "video.image.role",
            RequestField::NegativePrompt => "video.negative_prompt",
            RequestField::Seed => "video.seed",
            RequestField::AspectRatio => "video.aspect_ratio",
            RequestField::Duration => "video.duration_seconds",
            RequestField::Model => "model",
            RequestField::GuidanceScale => "video.guidance_scale",
            RequestField::MotionStrength => "video.motion_strength",
            RequestField::VideoUrl => "upscale.video.url",
            RequestField::VideoBytes => "upscale.video.bytes",
            RequestField::AudioUrl => "transcribe.audio.url",
            RequestField::AudioBytes => "transcribe.audio.bytes",
            RequestField::Language => "language",
            RequestField::Diarization => "transcribe.diarization",
            RequestField::ProfanityFilter => "transcribe.profanity_filter",
            RequestField::Vocabulary => "transcribe.vocabulary",
            RequestField::SearchQuery => "search.query",
            RequestField::MaxResults => "search.max_results",
            RequestField::SafeSearch => "search.safe_search",
            RequestField::TimeRange => "search.time_range",
            RequestField::IncludeDomains => "search.include_domains",
            RequestField::Region => "search.region",
        }
    }
}

impl fmt::Display for RequestField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A unified result field a provider populates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultField {
    VideoUri,
    VideoBytes,
    GenerationId,
    Seed,
    TranscriptText,
    Segments,
    Speaker,
    Confidence,
    DurationSeconds,
    Language,
    RequestId,
    HitTitle,
    HitUrl,
    HitSnippet,
    HitPublished,
    HitScore,
    Answer,
    TotalResults,
}

/// Numeric limits enforced during translation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Largest page a search provider returns
    pub max_results_per_page: Option<u32>,

    /// Longest accepted search query, in characters
    pub max_query_chars: Option<usize>,

    /// Longest accepted generation prompt, in characters
    pub max_prompt_chars: Option<usize>,

    /// Accepted clip durations in seconds; empty means unconstrained
    pub durations: &'static [u32],

    /// Pages a paginated provider will serve for one query
    pub max_pages: Option<u32>,
}

impl Limits {
    pub const NONE: Limits = Limits {
        max_results_per_page: None,
        max_query_chars: None,
        max_prompt_chars: None,
        durations: &[],
        max_pages: None,
    };
}
