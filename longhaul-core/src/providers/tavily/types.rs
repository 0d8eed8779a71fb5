//! Tavily search API types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `POST /search` body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TavilyRequest {
    pub query: String,
    pub max_results: u32,

    /// `basic` or `advanced`
    pub search_depth: String,

    pub include_answer: bool,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include_domains: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_range: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TavilyResponse {
    #[serde(default)]
    pub query: Option<String>,

    #[serde(default)]
    pub answer: Option<String>,

    #[serde(default)]
    pub results: Vec<TavilyResult>,

    /// Seconds spent server side
    #[serde(default)]
    pub response_time: Option<Value>,

    #[serde(default)]
    pub images: Vec<Value>,

    #[serde(default)]
    pub follow_up_questions: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TavilyResult {
    pub title: String,
    pub url: String,

    #[serde(default)]
    pub content: Option<String>,

    #[serde(default)]
    pub score: Option<f32>,

    #[serde(default)]
    pub published_date: Option<String>,
}

/// Error body, either `{"detail": {"error": ...}}` or `{"detail": "..."}`
#[derive(Debug, Clone, Deserialize)]
pub struct TavilyError {
    pub detail: TavilyErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TavilyErrorDetail {
    Object { error: String },
    Text(String),
}

impl TavilyErrorDetail {
    pub fn message(self) -> String {
        match self {
            TavilyErrorDetail::Object { error } => error,
            TavilyErrorDetail::Text(text) => text,
        }
    }
}
