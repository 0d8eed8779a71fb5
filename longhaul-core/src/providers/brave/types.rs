//! Brave Search web API types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Query-string parameters of `GET /res/v1/web/search`
///
/// The same struct, serialized, is the stream cursor: a page is fully
/// addressed by its query and offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BraveQuery {
    pub q: String,
    pub count: u32,

    /// Zero-based page index, at most 9
    pub offset: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safesearch: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freshness: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_lang: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BraveResponse {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,

    #[serde(default)]
    pub query: Option<BraveQueryInfo>,

    #[serde(default)]
    pub web: Option<BraveWeb>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BraveQueryInfo {
    #[serde(default)]
    pub original: Option<String>,

    #[serde(default)]
    pub more_results_available: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BraveWeb {
    #[serde(default)]
    pub results: Vec<BraveResult>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BraveResult {
    pub title: String,
    pub url: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Absolute timestamp of the page
    #[serde(default)]
    pub page_age: Option<String>,

    /// Human readable age such as "2 days ago"
    #[serde(default)]
    pub age: Option<String>,
}

/// Error envelope
#[derive(Debug, Clone, Deserialize)]
pub struct BraveErrorBody {
    pub error: BraveError,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BraveError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}
