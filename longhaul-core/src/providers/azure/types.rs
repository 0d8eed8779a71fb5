//! Azure AI Speech batch transcription (v3.2) types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Durations in transcripts are counted in 100ns ticks
pub const TICKS_PER_SECOND: f64 = 10_000_000.0;

/// `POST /transcriptions` body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureTranscriptionRequest {
    pub content_urls: Vec<String>,
    pub locale: String,
    pub display_name: String,
    pub properties: AzureTranscriptionProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureTranscriptionProperties {
    pub diarization_enabled: bool,
    pub word_level_timestamps_enabled: bool,

    /// `None`, `Removed`, `Tags` or `Masked`
    pub profanity_filter_mode: String,
}

/// Transcription resource as returned by create and get
#[derive(Debug, Clone, Deserialize)]
pub struct AzureTranscription {
    /// Absolute URL of this transcription; its last segment is the id
    #[serde(rename = "self")]
    pub self_url: String,

    pub status: AzureStatus,

    #[serde(default)]
    pub properties: Option<AzureStatusProperties>,
}

impl AzureTranscription {
    pub fn id(&self) -> Option<&str> {
        self.self_url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum AzureStatus {
    NotStarted,
    Running,
    Succeeded,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AzureStatusProperties {
    #[serde(default)]
    pub error: Option<AzureApiError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AzureApiError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Error envelope of failed requests
#[derive(Debug, Clone, Deserialize)]
pub struct AzureErrorBody {
    pub error: AzureApiError,
}

/// `GET /transcriptions/{id}/files`
#[derive(Debug, Clone, Deserialize)]
pub struct AzureFileList {
    #[serde(default)]
    pub values: Vec<AzureFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AzureFile {
    pub kind: String,
    pub links: AzureFileLinks,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureFileLinks {
    pub content_url: String,
}

/// Transcript file contents
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureTranscript {
    #[serde(default)]
    pub source: Option<String>,

    #[serde(default)]
    pub timestamp: Option<String>,

    #[serde(default)]
    pub duration_in_ticks: Option<u64>,

    /// ISO 8601 form of `duration_in_ticks`
    #[serde(default)]
    pub duration: Option<String>,

    #[serde(default)]
    pub combined_recognized_phrases: Vec<AzureCombinedPhrase>,

    #[serde(default)]
    pub recognized_phrases: Vec<AzureRecognizedPhrase>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureCombinedPhrase {
    #[serde(default)]
    pub channel: u32,
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureRecognizedPhrase {
    #[serde(default)]
    pub channel: u32,

    #[serde(default)]
    pub speaker: Option<u32>,

    pub offset_in_ticks: u64,
    pub duration_in_ticks: u64,

    #[serde(default)]
    pub locale: Option<String>,

    #[serde(default)]
    pub n_best: Vec<AzureNBest>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AzureNBest {
    #[serde(default)]
    pub confidence: Option<f32>,
    pub display: String,
}
