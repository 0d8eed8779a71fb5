//! Caller-facing request, result and chunk types
//!
//! One shape per capability domain, shared by every provider that serves it.
//! Provider wire formats live next to each provider client and never leak
//! through these types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::capabilities::{RequestField, ResultField};

/// Kind of logical operation carried by an [`crate::operation::Operation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Text/image to video generation
    GenerateVideo,
    /// Resolution upscaling of an existing video
    UpscaleVideo,
    /// Speech to text
    Transcribe,
    /// Web search
    Search,
    /// Reserved for list-style resources (list models, list voices)
    ListResource,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::GenerateVideo => "generate_video",
            OperationKind::UpscaleVideo => "upscale_video",
            OperationKind::Transcribe => "transcribe",
            OperationKind::Search => "search",
            OperationKind::ListResource => "list_resource",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified request accepted by [`crate::operation::OperationEngine::submit`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnifiedRequest {
    GenerateVideo(VideoRequest),
    UpscaleVideo(UpscaleRequest),
    Transcribe(TranscriptionRequest),
    Search(SearchRequest),
}

impl UnifiedRequest {
    /// Operation kind this request belongs to
    pub fn kind(&self) -> OperationKind {
        match self {
            UnifiedRequest::GenerateVideo(_) => OperationKind::GenerateVideo,
            UnifiedRequest::UpscaleVideo(_) => OperationKind::UpscaleVideo,
            UnifiedRequest::Transcribe(_) => OperationKind::Transcribe,
            UnifiedRequest::Search(_) => OperationKind::Search,
        }
    }

    /// Every field the caller actually set, in declaration order
    pub fn fields(&self) -> Vec<RequestField> {
        match self {
            UnifiedRequest::GenerateVideo(r) => r.fields(),
            UnifiedRequest::UpscaleVideo(r) => r.fields(),
            UnifiedRequest::Transcribe(r) => r.fields(),
            UnifiedRequest::Search(r) => r.fields(),
        }
    }
}

impl From<VideoRequest> for UnifiedRequest {
    fn from(request: VideoRequest) -> Self {
        UnifiedRequest::GenerateVideo(request)
    }
}

impl From<UpscaleRequest> for UnifiedRequest {
    fn from(request: UpscaleRequest) -> Self {
        UnifiedRequest::UpscaleVideo(request)
    }
}

impl From<TranscriptionRequest> for UnifiedRequest {
    fn from(request: TranscriptionRequest) -> Self {
        UnifiedRequest::Transcribe(request)
    }
}

impl From<SearchRequest> for UnifiedRequest {
    fn from(request: SearchRequest) -> Self {
        UnifiedRequest::Search(request)
    }
}

/// Media passed by reference or inline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaSource {
    Url {
        url: String,
    },
    Bytes {
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
        mime_type: String,
    },
}

impl MediaSource {
    pub fn url(url: impl Into<String>) -> Self {
        MediaSource::Url { url: url.into() }
    }

    pub fn bytes(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        MediaSource::Bytes {
            data,
            mime_type: mime_type.into(),
        }
    }

    pub fn is_url(&self) -> bool {
        matches!(self, MediaSource::Url { .. })
    }
}

/// Where a conditioning image sits in the generated clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageRole {
    FirstFrame,
    LastFrame,
}

/// Conditioning image for video generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageInput {
    pub source: MediaSource,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<ImageRole>,
}

/// Output frame shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectRatio {
    Landscape,
    Portrait,
    Square,
    Cinema,
}

/// Video generation request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VideoRequest {
    /// Text prompt describing the motion or scene
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    /// Conditioning image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageInput>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,

    /// Seed for reproducible generations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,

    /// Clip length in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,

    /// Provider model name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// How strictly the output follows the image (provider scale)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance_scale: Option<f32>,

    /// Amount of motion (provider scale)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motion_strength: Option<u32>,
}

impl VideoRequest {
    /// Text-to-video request; providers without a native path render a
    /// first frame from the prompt and animate it
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Default::default()
        }
    }

    /// Image-to-video request from an image URL
    pub fn from_image_url(url: impl Into<String>) -> Self {
        Self {
            image: Some(ImageInput {
                source: MediaSource::url(url),
                role: None,
            }),
            ..Default::default()
        }
    }

    /// Image-to-video request from inline image bytes
    pub fn from_image_bytes(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            image: Some(ImageInput {
                source: MediaSource::bytes(data, mime_type),
                role: None,
            }),
            ..Default::default()
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.aspect_ratio = Some(ratio);
        self
    }

    pub fn with_duration(mut self, seconds: u32) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    fn fields(&self) -> Vec<RequestField> {
        let mut fields = Vec::new();
        if self.prompt.is_some() {
            fields.push(RequestField::VideoPrompt);
        }
        if let Some(image) = &self.image {
            fields.push(match image.source {
                MediaSource::Url { .. } => RequestField::ImageUrl,
                MediaSource::Bytes { .. } => RequestField::ImageBytes,
            });
            if image.role.is_some() {
                fields.push(RequestField::ImageRole);
            }
        }
        if self.negative_prompt.is_some() {
            fields.push(RequestField::NegativePrompt);
        }
        if self.seed.is_some() {
            fields.push(RequestField::Seed);
        }
        if self.aspect_ratio.is_some() {
            fields.push(RequestField::AspectRatio);
        }
        if self.duration_seconds.is_some() {
            fields.push(RequestField::Duration);
        }
        if self.model.is_some() {
            fields.push(RequestField::Model);
        }
        if self.guidance_scale.is_some() {
            fields.push(RequestField::GuidanceScale);
        }
        if self.motion_strength.is_some() {
            fields.push(RequestField::MotionStrength);
        }
        fields
    }
}

/// Video upscaling request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpscaleRequest {
    pub video: MediaSource,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl UpscaleRequest {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            video: MediaSource::url(url),
            model: None,
        }
    }

    pub fn from_bytes(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            video: MediaSource::bytes(data, mime_type),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    fn fields(&self) -> Vec<RequestField> {
        let mut fields = vec![match self.video {
            MediaSource::Url { .. } => RequestField::VideoUrl,
            MediaSource::Bytes { .. } => RequestField::VideoBytes,
        }];
        if self.model.is_some() {
            fields.push(RequestField::Model);
        }
        fields
    }
}

/// Audio container/codec of a transcription input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Mp3,
    Flac,
    Ogg,
    Aac,
}

/// Speech-to-text request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TranscriptionRequest {
    pub audio: MediaSource,

    /// Required when the audio is passed inline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<AudioFormat>,

    /// BCP-47 language tag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Label speakers in the transcript
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diarization: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub profanity_filter: Option<bool>,

    /// Words and phrases to boost
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vocabulary: Vec<String>,
}

impl TranscriptionRequest {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self::new(MediaSource::url(url), None)
    }

    pub fn from_bytes(data: Vec<u8>, format: AudioFormat) -> Self {
        let mime = crate::providers::transform::AUDIO_MIME_TYPES
            .to_provider(format)
            .unwrap_or("application/octet-stream");
        Self::new(MediaSource::bytes(data, mime), Some(format))
    }

    fn new(audio: MediaSource, format: Option<AudioFormat>) -> Self {
        Self {
            audio,
            format,
            language: None,
            model: None,
            diarization: None,
            profanity_filter: None,
            vocabulary: Vec::new(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_diarization(mut self, enabled: bool) -> Self {
        self.diarization = Some(enabled);
        self
    }

    pub fn with_vocabulary(mut self, words: Vec<String>) -> Self {
        self.vocabulary = words;
        self
    }

    fn fields(&self) -> Vec<RequestField> {
        let mut fields = vec![match self.audio {
            MediaSource::Url { .. } => RequestField::AudioUrl,
            MediaSource::Bytes { .. } => RequestField::AudioBytes,
        }];
        if self.language.is_some() {
            fields.push(RequestField::Language);
        }
        if self.model.is_some() {
            fields.push(RequestField::Model);
        }
        if self.diarization.is_some() {
            fields.push(RequestField::Diarization);
        }
        if self.profanity_filter.is_some() {
            fields.push(RequestField::ProfanityFilter);
        }
        if !self.vocabulary.is_empty() {
            fields.push(RequestField::Vocabulary);
        }
        fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafeSearch {
    Off,
    Moderate,
    Strict,
}

/// Recency window for search results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    Day,
    Week,
    Month,
    Year,
}

/// Web search request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchRequest {
    pub query: String,

    /// Results per page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub safe_search: Option<SafeSearch>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,

    /// Restrict results to these domains
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_domains: Vec<String>,

    /// ISO 3166 country code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_results: None,
            safe_search: None,
            time_range: None,
            include_domains: Vec::new(),
            region: None,
            language: None,
        }
    }

    pub fn with_max_results(mut self, max: u32) -> Self {
        self.max_results = Some(max);
        self
    }

    pub fn with_safe_search(mut self, level: SafeSearch) -> Self {
        self.safe_search = Some(level);
        self
    }

    pub fn with_time_range(mut self, range: TimeRange) -> Self {
        self.time_range = Some(range);
        self
    }

    fn fields(&self) -> Vec<RequestField> {
        let mut fields = vec![RequestField::SearchQuery];
        if self.max_results.is_some() {
            fields.push(RequestField::MaxResults);
        }
        if self.safe_search.is_some() {
            fields.push(RequestField::SafeSearch);
        }
        if self.time_range.is_some() {
            fields.push(RequestField::TimeRange);
        }
        if !self.include_domains.is_empty() {
            fields.push(RequestField::IncludeDomains);
        }
        if self.region.is_some() {
            fields.push(RequestField::Region);
        }
        if self.language.is_some() {
            fields.push(RequestField::Language);
        }
        fields
    }
}

/// Unified result stored on a succeeded operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnifiedResult {
    Video(VideoOutput),
    Transcript(Transcript),
    Search(SearchPage),
    /// Terminal summary of a paginated operation; pages went out via `stream_next`
    StreamComplete(StreamSummary),
}

impl UnifiedResult {
    /// Result fields that carry a value
    pub fn fields(&self) -> Vec<ResultField> {
        let mut fields = Vec::new();
        match self {
            UnifiedResult::Video(output) => {
                for video in &output.videos {
                    push_if(&mut fields, video.uri.is_some(), ResultField::VideoUri);
                    push_if(&mut fields, video.bytes.is_some(), ResultField::VideoBytes);
                    push_if(
                        &mut fields,
                        video.generation_id.is_some(),
                        ResultField::GenerationId,
                    );
                    push_if(&mut fields, video.seed.is_some(), ResultField::Seed);
                }
            }
            UnifiedResult::Transcript(t) => {
                push_if(&mut fields, !t.text.is_empty(), ResultField::TranscriptText);
                push_if(&mut fields, !t.segments.is_empty(), ResultField::Segments);
                push_if(
                    &mut fields,
                    t.segments.iter().any(|s| s.speaker.is_some()),
                    ResultField::Speaker,
                );
                push_if(
                    &mut fields,
                    t.segments.iter().any(|s| s.confidence.is_some()),
                    ResultField::Confidence,
                );
                push_if(
                    &mut fields,
                    t.duration_seconds.is_some(),
                    ResultField::DurationSeconds,
                );
                push_if(&mut fields, t.language.is_some(), ResultField::Language);
                push_if(&mut fields, t.request_id.is_some(), ResultField::RequestId);
            }
            UnifiedResult::Search(page) => page.collect_fields(&mut fields),
            UnifiedResult::StreamComplete(_) => {}
        }
        fields
    }
}

fn push_if(fields: &mut Vec<ResultField>, present: bool, field: ResultField) {
    if present && !fields.contains(&field) {
        fields.push(field);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoOutput {
    pub videos: Vec<Video>,
}

/// One generated clip, either hosted or inline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "base64_bytes::option"
    )]
    pub bytes: Option<Vec<u8>>,

    pub mime_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<TranscriptSegment>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f32>,

    /// Provider request id, useful for support tickets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Timed span of recognised speech
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    pub start_seconds: f32,
    pub end_seconds: f32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

/// One page of search hits
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    pub hits: Vec<SearchHit>,

    /// Synthesised answer when the provider offers one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_results: Option<u64>,
}

impl SearchPage {
    fn collect_fields(&self, fields: &mut Vec<ResultField>) {
        for hit in &self.hits {
            push_if(fields, !hit.title.is_empty(), ResultField::HitTitle);
            push_if(fields, !hit.url.is_empty(), ResultField::HitUrl);
            push_if(fields, hit.snippet.is_some(), ResultField::HitSnippet);
            push_if(fields, hit.published.is_some(), ResultField::HitPublished);
            push_if(fields, hit.score.is_some(), ResultField::HitScore);
        }
        push_if(fields, self.answer.is_some(), ResultField::Answer);
        push_if(fields, self.total_results.is_some(), ResultField::TotalResults);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,

    /// Publication date as reported by the provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,

    /// Relevance score in provider units
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

/// Counters reported when a paginated operation finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSummary {
    pub pages: u64,
    pub items: u64,
}

/// One element of a paginated result sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedChunk {
    /// Zero-based page index
    pub sequence: u64,

    pub page: SearchPage,

    /// Whether more pages follow this one
    pub has_more: bool,
}

impl UnifiedChunk {
    pub fn len(&self) -> usize {
        self.page.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.page.hits.is_empty()
    }
}

/// Serde adapter storing binary payloads as standard base64 text
pub(crate) mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            bytes: &Option<Vec<u8>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match bytes {
                Some(bytes) => super::serialize(bytes, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Vec<u8>>, D::Error> {
            let text = Option::<String>::deserialize(deserializer)?;
            text.map(|t| STANDARD.decode(t).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
