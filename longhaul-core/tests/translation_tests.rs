//! Capability-driven translation and assembly across every provider

use serde_json::json;
use test_case::test_case;

use longhaul_core::capabilities::{ProviderDescriptor, RequestField, ALL_DESCRIPTORS};
use longhaul_core::protocol::{
    AspectRatio, AudioFormat, ImageInput, ImageRole, MediaSource, SafeSearch, SearchRequest,
    TimeRange, TranscriptionRequest, UnifiedRequest, UpscaleRequest, VideoRequest,
};
use longhaul_core::providers::runway::RunwayPayload;
use longhaul_core::providers::stability::types::StabilityVideo;
use longhaul_core::providers::{
    assemble, translate, ProviderKind, ProviderPayload, ProviderResult, TranslateError,
};

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

const VIDEO_FIELDS: &[RequestField] = &[
    RequestField::VideoPrompt,
    RequestField::ImageUrl,
    RequestField::ImageBytes,
    RequestField::ImageRole,
    RequestField::NegativePrompt,
    RequestField::Seed,
    RequestField::AspectRatio,
    RequestField::Duration,
    RequestField::Model,
    RequestField::GuidanceScale,
    RequestField::MotionStrength,
];

const UPSCALE_FIELDS: &[RequestField] = &[
    RequestField::VideoUrl,
    RequestField::VideoBytes,
    RequestField::Model,
];

const TRANSCRIBE_FIELDS: &[RequestField] = &[
    RequestField::AudioUrl,
    RequestField::AudioBytes,
    RequestField::Language,
    RequestField::Model,
    RequestField::Diarization,
    RequestField::ProfanityFilter,
    RequestField::Vocabulary,
];

const SEARCH_FIELDS: &[RequestField] = &[
    RequestField::SearchQuery,
    RequestField::MaxResults,
    RequestField::SafeSearch,
    RequestField::TimeRange,
    RequestField::IncludeDomains,
    RequestField::Region,
    RequestField::Language,
];

/// Smallest request each provider accepts
fn base(provider: ProviderKind) -> UnifiedRequest {
    match provider {
        ProviderKind::Runway => VideoRequest::from_image_url("https://example.com/frame.png").into(),
        ProviderKind::Stability => VideoRequest::from_image_bytes(PNG.to_vec(), "image/png").into(),
        ProviderKind::Deepgram | ProviderKind::Azure => {
            TranscriptionRequest::from_url("https://example.com/call.wav").into()
        }
        ProviderKind::Brave | ProviderKind::Tavily => SearchRequest::new("durable workflows").into(),
    }
}

fn fields_of(request: &UnifiedRequest) -> &'static [RequestField] {
    match request {
        UnifiedRequest::GenerateVideo(_) => VIDEO_FIELDS,
        UnifiedRequest::UpscaleVideo(_) => UPSCALE_FIELDS,
        UnifiedRequest::Transcribe(_) => TRANSCRIBE_FIELDS,
        UnifiedRequest::Search(_) => SEARCH_FIELDS,
    }
}

/// Set `field` to a value every provider supporting it accepts
fn with_field(mut request: UnifiedRequest, field: RequestField) -> UnifiedRequest {
    match &mut request {
        UnifiedRequest::GenerateVideo(r) => match field {
            RequestField::VideoPrompt => r.prompt = Some("slow pan across the harbour".to_string()),
            RequestField::ImageUrl => {
                r.image = Some(ImageInput {
                    source: MediaSource::url("https://example.com/frame.png"),
                    role: None,
                })
            }
            RequestField::ImageBytes => {
                r.image = Some(ImageInput {
                    source: MediaSource::bytes(PNG.to_vec(), "image/png"),
                    role: None,
                })
            }
            RequestField::ImageRole => {
                if let Some(image) = r.image.as_mut() {
                    image.role = Some(ImageRole::LastFrame);
                }
            }
            RequestField::NegativePrompt => r.negative_prompt = Some("blur".to_string()),
            RequestField::Seed => r.seed = Some(42),
            RequestField::AspectRatio => r.aspect_ratio = Some(AspectRatio::Portrait),
            RequestField::Duration => r.duration_seconds = Some(10),
            RequestField::Model => r.model = Some("gen3a_turbo".to_string()),
            RequestField::GuidanceScale => r.guidance_scale = Some(2.5),
            RequestField::MotionStrength => r.motion_strength = Some(180),
            other => panic!("{} is not a video field", other),
        },
        UnifiedRequest::UpscaleVideo(r) => match field {
            RequestField::VideoUrl => r.video = MediaSource::url("https://example.com/clip.mp4"),
            RequestField::VideoBytes => r.video = MediaSource::bytes(vec![0, 0, 0, 24], "video/mp4"),
            RequestField::Model => r.model = Some("upscale_v1".to_string()),
            other => panic!("{} is not an upscale field", other),
        },
        UnifiedRequest::Transcribe(r) => match field {
            RequestField::AudioUrl => r.audio = MediaSource::url("https://example.com/call.wav"),
            RequestField::AudioBytes => {
                *r = TranscriptionRequest::from_bytes(vec![0x52, 0x49, 0x46, 0x46], AudioFormat::Wav)
            }
            RequestField::Language => r.language = Some("en-US".to_string()),
            RequestField::Model => r.model = Some("nova-2".to_string()),
            RequestField::Diarization => r.diarization = Some(true),
            RequestField::ProfanityFilter => r.profanity_filter = Some(true),
            RequestField::Vocabulary => r.vocabulary = vec!["longhaul".to_string()],
            other => panic!("{} is not a transcription field", other),
        },
        UnifiedRequest::Search(r) => match field {
            RequestField::SearchQuery => r.query = "rust checkpointing".to_string(),
            RequestField::MaxResults => r.max_results = Some(10),
            RequestField::SafeSearch => r.safe_search = Some(SafeSearch::Strict),
            RequestField::TimeRange => r.time_range = Some(TimeRange::Month),
            RequestField::IncludeDomains => r.include_domains = vec!["docs.rs".to_string()],
            RequestField::Region => r.region = Some("DE".to_string()),
            RequestField::Language => r.language = Some("de".to_string()),
            other => panic!("{} is not a search field", other),
        },
    }
    request
}

#[test]
fn test_every_supported_field_translates() {
    for descriptor in ALL_DESCRIPTORS {
        let request = base(descriptor.provider);
        for field in fields_of(&request) {
            if !descriptor.supports_field(*field) {
                continue;
            }
            let request = with_field(request.clone(), *field);
            let payload = translate(&request, descriptor).unwrap_or_else(|e| {
                panic!("{} rejected {}: {}", descriptor.provider, field, e)
            });
            assert_eq!(payload.provider(), descriptor.provider);
        }
    }
}

#[test]
fn test_every_unsupported_field_is_named() {
    for descriptor in ALL_DESCRIPTORS {
        let request = base(descriptor.provider);
        for field in fields_of(&request) {
            if descriptor.supports_field(*field) {
                continue;
            }
            match translate(&with_field(request.clone(), *field), descriptor) {
                Err(TranslateError::UnsupportedFeature { provider, feature }) => {
                    assert_eq!(provider, descriptor.provider.as_str());
                    assert_eq!(feature, field.name());
                }
                other => panic!(
                    "{} should reject {}, got {:?}",
                    descriptor.provider, field, other
                ),
            }
        }
    }
}

#[test]
fn test_wrong_kind_is_unsupported() {
    for descriptor in ALL_DESCRIPTORS {
        let foreign: UnifiedRequest = match descriptor.provider {
            ProviderKind::Brave | ProviderKind::Tavily => {
                TranscriptionRequest::from_url("https://example.com/a.wav").into()
            }
            _ => SearchRequest::new("q").into(),
        };
        assert!(matches!(
            translate(&foreign, descriptor),
            Err(TranslateError::UnsupportedFeature { .. })
        ));
    }
}

#[test]
fn test_translation_is_deterministic() {
    for descriptor in ALL_DESCRIPTORS {
        let request = fields_of(&base(descriptor.provider))
            .iter()
            .filter(|f| descriptor.supports_field(**f))
            .fold(base(descriptor.provider), |r, f| with_field(r, *f));
        let first = translate(&request, descriptor);
        let second = translate(&request, descriptor);
        assert_eq!(
            first.as_ref().ok(),
            second.as_ref().ok(),
            "{} translated differently",
            descriptor.provider
        );
    }
}

#[test]
fn test_upscale_fields_on_runway() {
    let descriptor = ProviderKind::Runway.descriptor();
    let base: UnifiedRequest = UpscaleRequest::from_url("https://example.com/clip.mp4").into();
    for field in UPSCALE_FIELDS {
        let result = translate(&with_field(base.clone(), *field), descriptor);
        if descriptor.supports_field(*field) {
            assert!(result.is_ok(), "runway rejected {}: {:?}", field, result);
        } else {
            assert_eq!(
                result,
                Err(TranslateError::UnsupportedFeature {
                    provider: "runway",
                    feature: field.name().to_string(),
                })
            );
        }
    }
}

#[test]
fn test_prompt_only_video_per_provider() {
    let request: UnifiedRequest = VideoRequest::from_prompt("a lighthouse in a storm").into();

    match translate(&request, ProviderKind::Runway.descriptor()).unwrap() {
        ProviderPayload::Runway(RunwayPayload::TextToVideo(staged)) => {
            assert_eq!(staged.image.prompt_text, "a lighthouse in a storm");
        }
        other => panic!("expected a staged runway payload, got {:?}", other),
    }

    // stability takes images only
    assert!(matches!(
        translate(&request, ProviderKind::Stability.descriptor()),
        Err(TranslateError::UnsupportedFeature { .. })
    ));
}

#[test_case(ProviderKind::Brave, "q".repeat(401) ; "brave query")]
#[test_case(ProviderKind::Tavily, "q".repeat(401) ; "tavily query")]
#[test_case(ProviderKind::Brave, "   ".to_string() ; "blank query")]
fn test_query_limits(provider: ProviderKind, query: String) {
    let request: UnifiedRequest = SearchRequest::new(query).into();
    assert!(matches!(
        translate(&request, provider.descriptor()),
        Err(TranslateError::Validation { .. })
    ));
}

#[test]
fn test_brave_page_size_bound_by_descriptor() {
    let request: UnifiedRequest = SearchRequest::new("q").with_max_results(21).into();
    assert!(matches!(
        translate(&request, ProviderKind::Brave.descriptor()),
        Err(TranslateError::Validation {
            field: "search.max_results",
            ..
        })
    ));

    let request: UnifiedRequest = SearchRequest::new("q").with_max_results(20).into();
    match translate(&request, ProviderKind::Brave.descriptor()).unwrap() {
        ProviderPayload::Brave(query) => {
            assert_eq!(query.count, 20);
            assert_eq!(query.offset, 0);
        }
        other => panic!("unexpected payload {:?}", other),
    }
}

/// A representative raw result for each provider
fn sample_result(provider: ProviderKind) -> ProviderResult {
    match provider {
        ProviderKind::Runway => ProviderResult::Runway(
            serde_json::from_value(json!({
                "id": "task-9",
                "status": "SUCCEEDED",
                "output": ["https://cdn.example.com/a.mp4"],
                "progress": 1.0
            }))
            .unwrap(),
        ),
        ProviderKind::Stability => ProviderResult::Stability(StabilityVideo {
            id: "gen-9".to_string(),
            video: vec![0, 0, 0, 24, b'f', b't', b'y', b'p'],
            mime_type: "video/mp4".to_string(),
            finish_reason: Some("SUCCESS".to_string()),
            seed: Some(7),
        }),
        ProviderKind::Deepgram => ProviderResult::Deepgram(
            serde_json::from_value(json!({
                "metadata": { "request_id": "req-1", "duration": 3.5, "channels": 1 },
                "results": { "channels": [{
                    "detected_language": "en",
                    "alternatives": [{
                        "transcript": "hello world",
                        "confidence": 0.97,
                        "words": [
                            { "word": "hello", "start": 0.1, "end": 0.5, "confidence": 0.98, "speaker": 0 },
                            { "word": "world", "start": 0.6, "end": 1.0, "confidence": 0.96, "speaker": 0 }
                        ]
                    }]
                }]}
            }))
            .unwrap(),
        ),
        ProviderKind::Azure => ProviderResult::Azure(
            serde_json::from_value(json!({
                "durationInTicks": 35_000_000u64,
                "combinedRecognizedPhrases": [{ "channel": 0, "display": "Hello world." }],
                "recognizedPhrases": [{
                    "channel": 0,
                    "speaker": 1,
                    "offsetInTicks": 1_000_000u64,
                    "durationInTicks": 9_000_000u64,
                    "locale": "en-US",
                    "nBest": [{ "confidence": 0.91, "display": "Hello world." }]
                }]
            }))
            .unwrap(),
        ),
        ProviderKind::Brave => ProviderResult::Brave(
            serde_json::from_value(json!({
                "type": "search",
                "query": { "original": "q", "more_results_available": true },
                "web": { "results": [{
                    "title": "Durable execution",
                    "url": "https://example.com/durable",
                    "description": "How checkpoints work",
                    "page_age": "2025-01-03T10:00:00"
                }]}
            }))
            .unwrap(),
        ),
        ProviderKind::Tavily => ProviderResult::Tavily(
            serde_json::from_value(json!({
                "query": "q",
                "answer": "Checkpoint every step.",
                "results": [{
                    "title": "Durable execution",
                    "url": "https://example.com/durable",
                    "content": "How checkpoints work",
                    "score": 0.82,
                    "published_date": "2025-01-03"
                }],
                "response_time": 1.2
            }))
            .unwrap(),
        ),
    }
}

fn assert_produces_only_declared(descriptor: &ProviderDescriptor) {
    let assembled = assemble(&sample_result(descriptor.provider));
    let fields = assembled.result.fields();
    assert!(!fields.is_empty(), "{} assembled an empty result", descriptor.provider);
    for field in fields {
        assert!(
            descriptor.produces(field),
            "{} produced undeclared {:?}",
            descriptor.provider,
            field
        );
    }
}

#[test]
fn test_assembly_stays_within_declared_fields() {
    for descriptor in ALL_DESCRIPTORS {
        assert_produces_only_declared(descriptor);
    }
}

#[test]
fn test_unknown_provider_fields_are_reported_dropped() {
    let raw = ProviderResult::Tavily(
        serde_json::from_value(json!({
            "query": "q",
            "results": [],
            "request_id": "abc",
            "usage": { "credits": 1 }
        }))
        .unwrap(),
    );
    let assembled = assemble(&raw);
    assert!(assembled.dropped.contains(&"tavily.request_id".to_string()));
    assert!(assembled.dropped.contains(&"tavily.usage".to_string()));
}
