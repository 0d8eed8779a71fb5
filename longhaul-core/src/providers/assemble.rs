//! Provider result to unified result assembly
//!
//! Assembly is total: every raw shape a client can return maps to a unified
//! result. Fields the unified shape has no place for are captured by the raw
//! types' flattened `extra` maps, reported in [`Assembled::dropped`] and
//! logged, never treated as a failure.

use serde_json::{Map, Value};
use tracing::warn;

use super::azure::types::AzureTranscript;
use super::brave::types::BraveResponse;
use super::deepgram::types::DeepgramResponse;
use super::runway::types::RunwayTask;
use super::stability::types::StabilityVideo;
use super::tavily::types::TavilyResponse;
use super::{azure, brave, deepgram, runway, stability, tavily, ProviderKind};
use crate::protocol::{SearchPage, UnifiedChunk, UnifiedResult};

/// Raw provider result as returned by a client
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderResult {
    Runway(RunwayTask),
    Stability(StabilityVideo),
    Deepgram(DeepgramResponse),
    Azure(AzureTranscript),
    Brave(BraveResponse),
    Tavily(TavilyResponse),
}

impl ProviderResult {
    pub fn provider(&self) -> ProviderKind {
        match self {
            ProviderResult::Runway(_) => ProviderKind::Runway,
            ProviderResult::Stability(_) => ProviderKind::Stability,
            ProviderResult::Deepgram(_) => ProviderKind::Deepgram,
            ProviderResult::Azure(_) => ProviderKind::Azure,
            ProviderResult::Brave(_) => ProviderKind::Brave,
            ProviderResult::Tavily(_) => ProviderKind::Tavily,
        }
    }
}

/// Unified result plus the names of raw fields that had no destination
#[derive(Debug, Clone, PartialEq)]
pub struct Assembled {
    pub result: UnifiedResult,
    pub dropped: Vec<String>,
}

impl Assembled {
    pub(crate) fn new(result: UnifiedResult) -> Self {
        Self {
            result,
            dropped: Vec::new(),
        }
    }

    /// Record unknown keys of a raw object under a dotted prefix
    pub(crate) fn drop_extra(mut self, prefix: &str, extra: &Map<String, Value>) -> Self {
        self.dropped
            .extend(extra.keys().map(|key| format!("{}.{}", prefix, key)));
        self
    }
}

/// Assemble a raw provider result into its unified form
pub fn assemble(raw: &ProviderResult) -> Assembled {
    let provider = raw.provider();
    let assembled = match raw {
        ProviderResult::Runway(task) => runway::converter::from_runway_task(task),
        ProviderResult::Stability(video) => stability::converter::from_stability_video(video),
        ProviderResult::Deepgram(response) => deepgram::converter::from_deepgram_response(response),
        ProviderResult::Azure(transcript) => azure::converter::from_azure_transcript(transcript),
        ProviderResult::Brave(response) => brave::converter::from_brave_response(response),
        ProviderResult::Tavily(response) => tavily::converter::from_tavily_response(response),
    };

    if !assembled.dropped.is_empty() {
        warn!(
            "{} result carried fields with no unified equivalent: {}",
            provider,
            assembled.dropped.join(", ")
        );
    }

    assembled
}

/// Assemble one page of a paginated result
///
/// A raw shape that is not a search page still yields a chunk: an empty one,
/// with the whole result listed as dropped.
pub fn assemble_page(raw: &ProviderResult, sequence: u64, has_more: bool) -> (UnifiedChunk, Vec<String>) {
    let Assembled { result, mut dropped } = assemble(raw);
    let page = match result {
        UnifiedResult::Search(page) => page,
        other => {
            let kind = match other {
                UnifiedResult::Video(_) => "video",
                UnifiedResult::Transcript(_) => "transcript",
                _ => "summary",
            };
            warn!("{} returned a {} result as a page", raw.provider(), kind);
            dropped.push(format!("{}.{}", raw.provider(), kind));
            SearchPage::default()
        }
    };

    (
        UnifiedChunk {
            sequence,
            page,
            has_more,
        },
        dropped,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::runway::types::RunwayStatus;

    fn runway_task(extra: Map<String, Value>) -> ProviderResult {
        ProviderResult::Runway(RunwayTask {
            id: "task-1".to_string(),
            status: RunwayStatus::Succeeded,
            output: vec!["https://cdn.runway/video.mp4".to_string()],
            failure: None,
            failure_code: None,
            progress: Some(1.0),
            created_at: None,
            extra,
        })
    }

    #[test]
    fn test_known_fields_drop_nothing() {
        let assembled = assemble(&runway_task(Map::new()));
        assert!(assembled.dropped.is_empty());
        assert!(matches!(assembled.result, UnifiedResult::Video(_)));
    }

    #[test]
    fn test_unknown_fields_reported_not_fatal() {
        let mut extra = Map::new();
        extra.insert("estimatedTimeToStart".to_string(), Value::from(3));
        let assembled = assemble(&runway_task(extra));
        assert_eq!(assembled.dropped, vec!["runway.estimatedTimeToStart".to_string()]);
    }

    #[test]
    fn test_non_search_page_yields_empty_chunk() {
        let (chunk, dropped) = assemble_page(&runway_task(Map::new()), 0, false);
        assert!(chunk.is_empty());
        assert_eq!(dropped, vec!["runway.video".to_string()]);
    }
}
