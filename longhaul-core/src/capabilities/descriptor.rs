//! Static provider descriptors

use std::time::Duration;

use super::{AsyncModel, Limits, RequestField, ResultField};
use crate::protocol::OperationKind;
use crate::providers::ProviderKind;

/// Immutable capability table for one provider
#[derive(Debug)]
pub struct ProviderDescriptor {
    pub provider: ProviderKind,
    pub display_name: &'static str,
    pub kinds: &'static [OperationKind],
    pub request_fields: &'static [RequestField],
    pub result_fields: &'static [ResultField],
    pub async_model: AsyncModel,

    /// Whether an in-flight job can be cancelled on the provider side
    pub remote_cancel: bool,

    pub limits: Limits,

    /// How long the provider keeps job state and outputs around
    pub retention: Duration,
}

impl ProviderDescriptor {
    pub fn supports_kind(&self, kind: OperationKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn supports_field(&self, field: RequestField) -> bool {
        self.request_fields.contains(&field)
    }

    pub fn produces(&self, field: ResultField) -> bool {
        self.result_fields.contains(&field)
    }

    pub fn is_paginated(&self) -> bool {
        self.async_model == AsyncModel::Paginated
    }
}

const HOUR: u64 = 60 * 60;

pub static RUNWAY: ProviderDescriptor = ProviderDescriptor {
    provider: ProviderKind::Runway,
    display_name: "Runway",
    kinds: &[OperationKind::GenerateVideo, OperationKind::UpscaleVideo],
    request_fields: &[
        RequestField::VideoPrompt,
        RequestField::ImageUrl,
        RequestField::ImageBytes,
        RequestField::ImageRole,
        RequestField::Seed,
        RequestField::AspectRatio,
        RequestField::Duration,
        RequestField::Model,
        RequestField::VideoUrl,
    ],
    result_fields: &[ResultField::VideoUri, ResultField::GenerationId],
    async_model: AsyncModel::Polling,
    remote_cancel: true,
    limits: Limits {
        max_prompt_chars: Some(1000),
        durations: &[5, 10],
        ..Limits::NONE
    },
    retention: Duration::from_secs(24 * HOUR),
};

pub static STABILITY: ProviderDescriptor = ProviderDescriptor {
    provider: ProviderKind::Stability,
    display_name: "Stability AI",
    kinds: &[OperationKind::GenerateVideo],
    request_fields: &[
        RequestField::ImageBytes,
        RequestField::Seed,
        RequestField::GuidanceScale,
        RequestField::MotionStrength,
    ],
    result_fields: &[
        ResultField::VideoBytes,
        ResultField::GenerationId,
        ResultField::Seed,
    ],
    async_model: AsyncModel::Polling,
    remote_cancel: false,
    limits: Limits::NONE,
    retention: Duration::from_secs(24 * HOUR),
};

pub static DEEPGRAM: ProviderDescriptor = ProviderDescriptor {
    provider: ProviderKind::Deepgram,
    display_name: "Deepgram",
    kinds: &[OperationKind::Transcribe],
    request_fields: &[
        RequestField::AudioUrl,
        RequestField::AudioBytes,
        RequestField::Language,
        RequestField::Model,
        RequestField::Diarization,
        RequestField::ProfanityFilter,
        RequestField::Vocabulary,
    ],
    result_fields: &[
        ResultField::TranscriptText,
        ResultField::Segments,
        ResultField::Speaker,
        ResultField::Confidence,
        ResultField::DurationSeconds,
        ResultField::Language,
        ResultField::RequestId,
    ],
    async_model: AsyncModel::Immediate,
    remote_cancel: false,
    limits: Limits::NONE,
    retention: Duration::from_secs(HOUR),
};

pub static AZURE: ProviderDescriptor = ProviderDescriptor {
    provider: ProviderKind::Azure,
    display_name: "Azure AI Speech",
    kinds: &[OperationKind::Transcribe],
    request_fields: &[
        RequestField::AudioUrl,
        RequestField::Language,
        RequestField::Diarization,
        RequestField::ProfanityFilter,
    ],
    result_fields: &[
        ResultField::TranscriptText,
        ResultField::Segments,
        ResultField::Speaker,
        ResultField::Confidence,
        ResultField::DurationSeconds,
        ResultField::Language,
    ],
    async_model: AsyncModel::Polling,
    remote_cancel: true,
    limits: Limits::NONE,
    // batch transcriptions default to a 48 hour time-to-live
    retention: Duration::from_secs(48 * HOUR),
};

pub static BRAVE: ProviderDescriptor = ProviderDescriptor {
    provider: ProviderKind::Brave,
    display_name: "Brave Search",
    kinds: &[OperationKind::Search],
    request_fields: &[
        RequestField::SearchQuery,
        RequestField::MaxResults,
        RequestField::SafeSearch,
        RequestField::TimeRange,
        RequestField::Region,
        RequestField::Language,
    ],
    result_fields: &[
        ResultField::HitTitle,
        ResultField::HitUrl,
        ResultField::HitSnippet,
        ResultField::HitPublished,
    ],
    async_model: AsyncModel::Paginated,
    remote_cancel: false,
    limits: Limits {
        max_results_per_page: Some(20),
        max_query_chars: Some(400),
        max_pages: Some(10),
        ..Limits::NONE
    },
    retention: Duration::from_secs(HOUR),
};

pub static TAVILY: ProviderDescriptor = ProviderDescriptor {
    provider: ProviderKind::Tavily,
    display_name: "Tavily",
    kinds: &[OperationKind::Search],
    request_fields: &[
        RequestField::SearchQuery,
        RequestField::MaxResults,
        RequestField::TimeRange,
        RequestField::IncludeDomains,
    ],
    result_fields: &[
        ResultField::HitTitle,
        ResultField::HitUrl,
        ResultField::HitSnippet,
        ResultField::HitPublished,
        ResultField::HitScore,
        ResultField::Answer,
    ],
    async_model: AsyncModel::Immediate,
    remote_cancel: false,
    limits: Limits {
        max_results_per_page: Some(20),
        max_query_chars: Some(400),
        ..Limits::NONE
    },
    retention: Duration::from_secs(HOUR),
};

/// Every descriptor, in [`ProviderKind`] declaration order
pub static ALL_DESCRIPTORS: [&ProviderDescriptor; 6] =
    [&RUNWAY, &STABILITY, &DEEPGRAM, &AZURE, &BRAVE, &TAVILY];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_lookup_matches_tag() {
        for descriptor in ALL_DESCRIPTORS {
            assert_eq!(descriptor.provider.descriptor().provider, descriptor.provider);
        }
    }

    #[test]
    fn test_only_brave_paginates() {
        let paginated: Vec<_> = ALL_DESCRIPTORS
            .iter()
            .filter(|d| d.is_paginated())
            .map(|d| d.provider)
            .collect();
        assert_eq!(paginated, vec![ProviderKind::Brave]);
    }

    #[test]
    fn test_remote_cancel_only_on_polling_providers() {
        for descriptor in ALL_DESCRIPTORS {
            if descriptor.remote_cancel {
                assert_eq!(descriptor.async_model, AsyncModel::Polling);
            }
        }
    }

    #[test]
    fn test_runway_limits() {
        assert!(RUNWAY.supports_kind(OperationKind::GenerateVideo));
        assert!(RUNWAY.supports_kind(OperationKind::UpscaleVideo));
        assert!(!STABILITY.supports_kind(OperationKind::UpscaleVideo));
        assert!(!RUNWAY.supports_field(RequestField::VideoBytes));
        assert!(!RUNWAY.supports_field(RequestField::GuidanceScale));
        assert_eq!(RUNWAY.limits.durations, &[5, 10]);
    }
}
