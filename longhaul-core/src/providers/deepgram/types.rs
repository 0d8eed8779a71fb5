//! Deepgram pre-recorded transcription types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Audio sent to `/v1/listen`
#[derive(Debug, Clone, PartialEq)]
pub enum DeepgramAudio {
    /// Hosted audio, sent as `{"url": ...}`
    Url(String),
    /// Raw audio body with its content type
    Bytes { data: Vec<u8>, mime_type: String },
}

/// JSON body for hosted audio
#[derive(Debug, Clone, Serialize)]
pub struct UrlSource<'a> {
    pub url: &'a str,
}

/// Transcription request: the audio plus query-string options
#[derive(Debug, Clone, PartialEq)]
pub struct DeepgramRequest {
    pub audio: DeepgramAudio,
    pub model: String,
    pub language: Option<String>,
    pub diarize: bool,
    pub profanity_filter: bool,
    pub smart_format: bool,

    /// Boosted terms; sent as `keyterm` or `keywords` depending on the model
    pub vocabulary: Vec<String>,
}

impl DeepgramRequest {
    /// Query-string pairs for `/v1/listen`
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("model", self.model.clone()),
            ("smart_format", self.smart_format.to_string()),
        ];
        match &self.language {
            Some(language) => pairs.push(("language", language.clone())),
            None => pairs.push(("detect_language", "true".to_string())),
        }
        if self.diarize {
            pairs.push(("diarize", "true".to_string()));
        }
        if self.profanity_filter {
            pairs.push(("profanity_filter", "true".to_string()));
        }
        let vocabulary_key = if self.model.starts_with("nova-3") {
            "keyterm"
        } else {
            "keywords"
        };
        pairs.extend(self.vocabulary.iter().map(|term| (vocabulary_key, term.clone())));
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeepgramResponse {
    pub metadata: DeepgramMetadata,
    pub results: DeepgramResults,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeepgramMetadata {
    #[serde(default)]
    pub request_id: Option<String>,

    /// Audio length in seconds
    #[serde(default)]
    pub duration: Option<f32>,

    #[serde(default)]
    pub channels: Option<u32>,

    #[serde(default)]
    pub created: Option<String>,

    #[serde(default)]
    pub models: Vec<String>,

    #[serde(default)]
    pub transaction_key: Option<String>,

    #[serde(default)]
    pub sha256: Option<String>,

    #[serde(default)]
    pub model_info: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeepgramResults {
    #[serde(default)]
    pub channels: Vec<DeepgramChannel>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeepgramChannel {
    #[serde(default)]
    pub alternatives: Vec<DeepgramAlternative>,

    #[serde(default)]
    pub detected_language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeepgramAlternative {
    pub transcript: String,

    #[serde(default)]
    pub confidence: Option<f32>,

    #[serde(default)]
    pub words: Vec<DeepgramWord>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeepgramWord {
    pub word: String,
    pub start: f32,
    pub end: f32,

    #[serde(default)]
    pub confidence: Option<f32>,

    /// Present when diarization was requested
    #[serde(default)]
    pub speaker: Option<u32>,

    #[serde(default)]
    pub punctuated_word: Option<String>,
}

/// Error body
#[derive(Debug, Clone, Deserialize)]
pub struct DeepgramError {
    #[serde(default)]
    pub err_code: Option<String>,
    #[serde(default)]
    pub err_msg: Option<String>,
}
