//! Unified request to provider payload translation
//!
//! Translation is a pure function of the request and the provider's static
//! descriptor. Every field the caller set is checked against the descriptor
//! first, so an unsupported feature fails before any network call. Enum-like
//! values go through explicit [`CodeTable`]s: a value without a mapping is a
//! validation error, never a silent default.

use std::fmt::Debug;
use thiserror::Error;

use super::azure::types::AzureTranscriptionRequest;
use super::brave::types::BraveQuery;
use super::deepgram::types::DeepgramRequest;
use super::runway::types::RunwayPayload;
use super::stability::types::StabilityRequest;
use super::tavily::types::TavilyRequest;
use super::{azure, brave, deepgram, runway, stability, tavily, ProviderKind};
use crate::capabilities::ProviderDescriptor;
use crate::protocol::{AudioFormat, UnifiedRequest};

/// Errors produced while translating a request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    /// The provider has no equivalent for a requested field or kind
    #[error("{provider} does not support {feature}")]
    UnsupportedFeature {
        provider: &'static str,
        feature: String,
    },

    /// The field is supported but its value is not acceptable
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },
}

impl TranslateError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        TranslateError::Validation {
            field,
            reason: reason.into(),
        }
    }
}

/// Provider wire payload ready for [`crate::providers::ProviderClient::start`]
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderPayload {
    Runway(RunwayPayload),
    Stability(StabilityRequest),
    Deepgram(DeepgramRequest),
    Azure(AzureTranscriptionRequest),
    Brave(BraveQuery),
    Tavily(TavilyRequest),
}

impl ProviderPayload {
    pub fn provider(&self) -> ProviderKind {
        match self {
            ProviderPayload::Runway(_) => ProviderKind::Runway,
            ProviderPayload::Stability(_) => ProviderKind::Stability,
            ProviderPayload::Deepgram(_) => ProviderKind::Deepgram,
            ProviderPayload::Azure(_) => ProviderKind::Azure,
            ProviderPayload::Brave(_) => ProviderKind::Brave,
            ProviderPayload::Tavily(_) => ProviderKind::Tavily,
        }
    }
}

/// Translate a unified request for the provider described by `descriptor`
pub fn translate(
    request: &UnifiedRequest,
    descriptor: &ProviderDescriptor,
) -> Result<ProviderPayload, TranslateError> {
    let provider = descriptor.provider.as_str();

    if !descriptor.supports_kind(request.kind()) {
        return Err(TranslateError::UnsupportedFeature {
            provider,
            feature: request.kind().to_string(),
        });
    }

    if let Some(field) = request
        .fields()
        .into_iter()
        .find(|field| !descriptor.supports_field(*field))
    {
        return Err(TranslateError::UnsupportedFeature {
            provider,
            feature: field.name().to_string(),
        });
    }

    match (descriptor.provider, request) {
        (ProviderKind::Runway, UnifiedRequest::GenerateVideo(r)) => {
            runway::converter::to_runway_payload(r, descriptor).map(ProviderPayload::Runway)
        }
        (ProviderKind::Runway, UnifiedRequest::UpscaleVideo(r)) => {
            runway::converter::to_runway_upscale(r).map(ProviderPayload::Runway)
        }
        (ProviderKind::Stability, UnifiedRequest::GenerateVideo(r)) => {
            stability::converter::to_stability_request(r).map(ProviderPayload::Stability)
        }
        (ProviderKind::Deepgram, UnifiedRequest::Transcribe(r)) => {
            deepgram::converter::to_deepgram_request(r).map(ProviderPayload::Deepgram)
        }
        (ProviderKind::Azure, UnifiedRequest::Transcribe(r)) => {
            azure::converter::to_azure_request(r).map(ProviderPayload::Azure)
        }
        (ProviderKind::Brave, UnifiedRequest::Search(r)) => {
            brave::converter::to_brave_query(r, descriptor).map(ProviderPayload::Brave)
        }
        (ProviderKind::Tavily, UnifiedRequest::Search(r)) => {
            tavily::converter::to_tavily_request(r, descriptor).map(ProviderPayload::Tavily)
        }
        (_, request) => Err(TranslateError::UnsupportedFeature {
            provider,
            feature: request.kind().to_string(),
        }),
    }
}

/// Bidirectional mapping between a unified value and a provider code
#[derive(Debug)]
pub struct CodeTable<U: 'static, P: 'static> {
    field: &'static str,
    pairs: &'static [(U, P)],
}

impl<U, P> CodeTable<U, P> {
    pub const fn new(field: &'static str, pairs: &'static [(U, P)]) -> Self {
        Self { field, pairs }
    }

    pub fn pairs(&self) -> &'static [(U, P)] {
        self.pairs
    }
}

impl<U, P> CodeTable<U, P>
where
    U: Copy + PartialEq + Debug,
    P: Copy + PartialEq,
{
    /// Provider code for a unified value
    pub fn to_provider(&self, value: U) -> Result<P, TranslateError> {
        self.pairs
            .iter()
            .find(|(unified, _)| *unified == value)
            .map(|(_, code)| *code)
            .ok_or_else(|| {
                TranslateError::validation(self.field, format!("{:?} has no provider mapping", value))
            })
    }

    /// Unified value for a provider code
    pub fn from_provider<C>(&self, code: C) -> Option<U>
    where
        C: PartialEq<P>,
    {
        self.pairs
            .iter()
            .find(|(_, provider)| code == *provider)
            .map(|(unified, _)| *unified)
    }
}

/// Audio formats and the MIME types sent with inline audio
pub static AUDIO_MIME_TYPES: CodeTable<AudioFormat, &str> = CodeTable::new(
    "transcribe.format",
    &[
        (AudioFormat::Wav, "audio/wav"),
        (AudioFormat::Mp3, "audio/mpeg"),
        (AudioFormat::Flac, "audio/flac"),
        (AudioFormat::Ogg, "audio/ogg"),
        (AudioFormat::Aac, "audio/aac"),
    ],
);

/// Reject empty or overlong text fields
pub(crate) fn check_text(
    field: &'static str,
    value: &str,
    max_chars: Option<usize>,
) -> Result<(), TranslateError> {
    if value.trim().is_empty() {
        return Err(TranslateError::validation(field, "must not be empty"));
    }
    if let Some(max) = max_chars {
        let len = value.chars().count();
        if len > max {
            return Err(TranslateError::validation(
                field,
                format!("{} characters exceeds the limit of {}", len, max),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::descriptor::{DEEPGRAM, RUNWAY, TAVILY};
    use crate::protocol::{SearchRequest, TranscriptionRequest, VideoRequest};

    #[test]
    fn test_wrong_kind_is_unsupported() {
        let request: UnifiedRequest = SearchRequest::new("rust").into();
        let err = translate(&request, &RUNWAY).unwrap_err();
        assert_eq!(
            err,
            TranslateError::UnsupportedFeature {
                provider: "runway",
                feature: "search".to_string()
            }
        );
    }

    #[test]
    fn test_unsupported_field_names_the_field() {
        let mut request = VideoRequest::from_image_url("https://img/a.png");
        request.guidance_scale = Some(1.5);

        let err = translate(&request.into(), &RUNWAY).unwrap_err();
        assert_eq!(
            err,
            TranslateError::UnsupportedFeature {
                provider: "runway",
                feature: "video.guidance_scale".to_string()
            }
        );
    }

    #[test]
    fn test_include_domains_unsupported_outside_tavily() {
        let mut search = SearchRequest::new("rust");
        search.include_domains = vec!["docs.rs".to_string()];
        let request: UnifiedRequest = search.into();

        assert!(translate(&request, &TAVILY).is_ok());
        assert!(matches!(
            translate(&request, &crate::capabilities::descriptor::BRAVE),
            Err(TranslateError::UnsupportedFeature { .. })
        ));
    }

    #[test]
    fn test_translation_is_deterministic() {
        let request: UnifiedRequest = TranscriptionRequest::from_url("https://audio/a.wav")
            .with_language("en")
            .into();
        assert_eq!(
            translate(&request, &DEEPGRAM).unwrap(),
            translate(&request, &DEEPGRAM).unwrap()
        );
    }

    #[test]
    fn test_code_table_is_bidirectional() {
        for (format, mime) in AUDIO_MIME_TYPES.pairs() {
            assert_eq!(AUDIO_MIME_TYPES.to_provider(*format).unwrap(), *mime);
            assert_eq!(AUDIO_MIME_TYPES.from_provider(*mime), Some(*format));
        }
        assert_eq!(AUDIO_MIME_TYPES.from_provider("audio/unknown"), None);
    }

    #[test]
    fn test_check_text_limits() {
        assert!(check_text("search.query", "ok", Some(4)).is_ok());
        assert!(check_text("search.query", "   ", None).is_err());
        assert!(check_text("search.query", "toolong", Some(4)).is_err());
    }
}
