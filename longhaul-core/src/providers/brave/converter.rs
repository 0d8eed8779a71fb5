//! Conversion between unified searches and Brave queries

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use super::types::{BraveQuery, BraveResponse};
use crate::capabilities::ProviderDescriptor;
use crate::protocol::{SafeSearch, SearchHit, SearchPage, SearchRequest, TimeRange, UnifiedResult};
use crate::providers::assemble::Assembled;
use crate::providers::transform::{check_text, CodeTable, TranslateError};
use crate::providers::ClientError;

pub const DEFAULT_COUNT: u32 = 20;

/// Highest offset the API accepts
pub const MAX_OFFSET: u32 = 9;

pub static SAFE_SEARCH: CodeTable<SafeSearch, &str> = CodeTable::new(
    "search.safe_search",
    &[
        (SafeSearch::Off, "off"),
        (SafeSearch::Moderate, "moderate"),
        (SafeSearch::Strict, "strict"),
    ],
);

pub static FRESHNESS: CodeTable<TimeRange, &str> = CodeTable::new(
    "search.time_range",
    &[
        (TimeRange::Day, "pd"),
        (TimeRange::Week, "pw"),
        (TimeRange::Month, "pm"),
        (TimeRange::Year, "py"),
    ],
);

/// Convert a unified search to the query of its first page
pub fn to_brave_query(
    request: &SearchRequest,
    descriptor: &ProviderDescriptor,
) -> Result<BraveQuery, TranslateError> {
    check_text("search.query", &request.query, descriptor.limits.max_query_chars)?;

    let max_count = descriptor.limits.max_results_per_page.unwrap_or(DEFAULT_COUNT);
    let count = request.max_results.unwrap_or(max_count.min(DEFAULT_COUNT));
    if count == 0 || count > max_count {
        return Err(TranslateError::validation(
            "search.max_results",
            format!("{} is outside 1..={}", count, max_count),
        ));
    }

    let country = match &request.region {
        Some(region) if region.len() == 2 && region.chars().all(|c| c.is_ascii_alphabetic()) => {
            Some(region.to_ascii_lowercase())
        }
        Some(region) => {
            return Err(TranslateError::validation(
                "search.region",
                format!("'{}' is not a two-letter country code", region),
            ))
        }
        None => None,
    };

    Ok(BraveQuery {
        q: request.query.clone(),
        count,
        offset: 0,
        safesearch: request
            .safe_search
            .map(|level| SAFE_SEARCH.to_provider(level))
            .transpose()?
            .map(str::to_string),
        freshness: request
            .time_range
            .map(|range| FRESHNESS.to_provider(range))
            .transpose()?
            .map(str::to_string),
        country,
        search_lang: request.language.clone(),
    })
}

/// Encode a page query as an opaque cursor
pub fn encode_cursor(query: &BraveQuery) -> Result<String, ClientError> {
    let json = serde_json::to_vec(query)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Decode a cursor produced by [`encode_cursor`]
pub fn decode_cursor(cursor: &str) -> Result<BraveQuery, ClientError> {
    let json = URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|e| ClientError::invalid(format!("malformed cursor: {}", e)))?;
    serde_json::from_slice(&json).map_err(|e| ClientError::invalid(format!("malformed cursor: {}", e)))
}

/// Query of the page after `query`, if the response says there is one
pub fn next_query(query: &BraveQuery, response: &BraveResponse, max_pages: Option<u32>) -> Option<BraveQuery> {
    let more = response
        .query
        .as_ref()
        .map(|info| info.more_results_available)
        .unwrap_or(false);
    let last_offset = max_pages
        .map(|pages| pages.saturating_sub(1))
        .unwrap_or(MAX_OFFSET)
        .min(MAX_OFFSET);

    (more && query.offset < last_offset).then(|| BraveQuery {
        offset: query.offset + 1,
        ..query.clone()
    })
}

/// Convert one Brave response page to unified search hits
pub fn from_brave_response(response: &BraveResponse) -> Assembled {
    let hits = response
        .web
        .as_ref()
        .map(|web| {
            web.results
                .iter()
                .map(|result| SearchHit {
                    title: result.title.clone(),
                    url: result.url.clone(),
                    snippet: result.description.clone(),
                    published: result.page_age.clone().or_else(|| result.age.clone()),
                    score: None,
                })
                .collect()
        })
        .unwrap_or_default();

    Assembled::new(UnifiedResult::Search(SearchPage {
        hits,
        answer: None,
        total_results: None,
    }))
    .drop_extra("brave", &response.extra)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::descriptor::BRAVE;
    use serde_json::json;

    fn response(more: bool) -> BraveResponse {
        serde_json::from_value(json!({
            "type": "search",
            "query": {"original": "rust", "more_results_available": more},
            "web": {"results": [
                {"title": "Rust", "url": "https://rust-lang.org", "description": "A language", "age": "3 days ago"}
            ]}
        }))
        .unwrap()
    }

    #[test]
    fn test_query_mapping() {
        let request = SearchRequest::new("rust async")
            .with_max_results(10)
            .with_safe_search(SafeSearch::Strict)
            .with_time_range(TimeRange::Week);
        let query = to_brave_query(&request, &BRAVE).unwrap();

        assert_eq!(query.count, 10);
        assert_eq!(query.offset, 0);
        assert_eq!(query.safesearch.as_deref(), Some("strict"));
        assert_eq!(query.freshness.as_deref(), Some("pw"));
    }

    #[test]
    fn test_count_over_page_limit() {
        let request = SearchRequest::new("rust").with_max_results(21);
        assert!(matches!(
            to_brave_query(&request, &BRAVE),
            Err(TranslateError::Validation { field: "search.max_results", .. })
        ));
    }

    #[test]
    fn test_query_length_limit() {
        let request = SearchRequest::new("x".repeat(401));
        assert!(to_brave_query(&request, &BRAVE).is_err());
    }

    #[test]
    fn test_region_must_be_country_code() {
        let mut request = SearchRequest::new("rust");
        request.region = Some("USA".to_string());
        assert!(to_brave_query(&request, &BRAVE).is_err());

        request.region = Some("DE".to_string());
        assert_eq!(to_brave_query(&request, &BRAVE).unwrap().country.as_deref(), Some("de"));
    }

    #[test]
    fn test_cursor_round_trip() {
        let query = to_brave_query(&SearchRequest::new("rust"), &BRAVE).unwrap();
        let cursor = encode_cursor(&query).unwrap();
        assert_eq!(decode_cursor(&cursor).unwrap(), query);
        assert!(decode_cursor("not a cursor!").is_err());
    }

    #[test]
    fn test_next_query_stops_at_max_pages() {
        let mut query = to_brave_query(&SearchRequest::new("rust"), &BRAVE).unwrap();
        assert_eq!(next_query(&query, &response(true), Some(10)).unwrap().offset, 1);
        assert!(next_query(&query, &response(false), Some(10)).is_none());

        query.offset = 9;
        assert!(next_query(&query, &response(true), Some(10)).is_none());
        query.offset = 1;
        assert!(next_query(&query, &response(true), Some(2)).is_none());
    }

    #[test]
    fn test_assembly_prefers_page_age() {
        let assembled = from_brave_response(&response(false));
        let UnifiedResult::Search(page) = assembled.result else {
            panic!("expected search page");
        };
        assert_eq!(page.hits[0].published.as_deref(), Some("3 days ago"));
        assert_eq!(page.hits[0].snippet.as_deref(), Some("A language"));
        assert!(assembled.dropped.is_empty());
    }
}
