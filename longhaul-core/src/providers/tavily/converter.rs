//! Conversion between unified searches and Tavily requests

use super::types::{TavilyRequest, TavilyResponse};
use crate::capabilities::ProviderDescriptor;
use crate::protocol::{SearchHit, SearchPage, SearchRequest, TimeRange, UnifiedResult};
use crate::providers::assemble::Assembled;
use crate::providers::transform::{check_text, CodeTable, TranslateError};

pub const DEFAULT_MAX_RESULTS: u32 = 5;

pub static TIME_RANGES: CodeTable<TimeRange, &str> = CodeTable::new(
    "search.time_range",
    &[
        (TimeRange::Day, "day"),
        (TimeRange::Week, "week"),
        (TimeRange::Month, "month"),
        (TimeRange::Year, "year"),
    ],
);

pub fn to_tavily_request(
    request: &SearchRequest,
    descriptor: &ProviderDescriptor,
) -> Result<TavilyRequest, TranslateError> {
    check_text("search.query", &request.query, descriptor.limits.max_query_chars)?;

    let max_results = request.max_results.unwrap_or(DEFAULT_MAX_RESULTS);
    if let Some(limit) = descriptor.limits.max_results_per_page {
        if max_results == 0 || max_results > limit {
            return Err(TranslateError::validation(
                "search.max_results",
                format!("{} is outside 1..={}", max_results, limit),
            ));
        }
    }

    for domain in &request.include_domains {
        if domain.trim().is_empty() || domain.contains('/') {
            return Err(TranslateError::validation(
                "search.include_domains",
                format!("'{}' is not a bare domain", domain),
            ));
        }
    }

    Ok(TavilyRequest {
        query: request.query.clone(),
        max_results,
        search_depth: "basic".to_string(),
        include_answer: true,
        include_domains: request.include_domains.clone(),
        time_range: request
            .time_range
            .map(|range| TIME_RANGES.to_provider(range))
            .transpose()?
            .map(str::to_string),
    })
}

pub fn from_tavily_response(response: &TavilyResponse) -> Assembled {
    let hits = response
        .results
        .iter()
        .map(|result| SearchHit {
            title: result.title.clone(),
            url: result.url.clone(),
            snippet: result.content.clone(),
            published: result.published_date.clone(),
            score: result.score,
        })
        .collect();

    let mut assembled = Assembled::new(UnifiedResult::Search(SearchPage {
        hits,
        answer: response.answer.clone(),
        total_results: None,
    }))
    .drop_extra("tavily", &response.extra);

    if !response.images.is_empty() {
        assembled.dropped.push("tavily.images".to_string());
    }
    assembled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::descriptor::TAVILY;
    use serde_json::json;

    #[test]
    fn test_request_defaults() {
        let payload = to_tavily_request(&SearchRequest::new("rust"), &TAVILY).unwrap();
        assert_eq!(payload.max_results, DEFAULT_MAX_RESULTS);
        assert!(payload.include_answer);

        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("include_domains").is_none());
        assert!(json.get("time_range").is_none());
    }

    #[test]
    fn test_time_range_and_domains() {
        let mut request = SearchRequest::new("rust").with_time_range(TimeRange::Month);
        request.include_domains = vec!["docs.rs".to_string()];
        let payload = to_tavily_request(&request, &TAVILY).unwrap();
        assert_eq!(payload.time_range.as_deref(), Some("month"));
        assert_eq!(payload.include_domains, vec!["docs.rs".to_string()]);

        request.include_domains = vec!["https://docs.rs/tokio".to_string()];
        assert!(to_tavily_request(&request, &TAVILY).is_err());
    }

    #[test]
    fn test_assembly_keeps_answer_and_score() {
        let response: TavilyResponse = serde_json::from_value(json!({
            "query": "rust",
            "answer": "A systems language.",
            "results": [{"title": "Rust", "url": "https://rust-lang.org", "content": "...", "score": 0.93}],
            "response_time": 1.2,
            "request_id": "abc"
        }))
        .unwrap();

        let assembled = from_tavily_response(&response);
        let UnifiedResult::Search(page) = assembled.result else {
            panic!("expected search page");
        };
        assert_eq!(page.answer.as_deref(), Some("A systems language."));
        assert_eq!(page.hits[0].score, Some(0.93));
        assert_eq!(assembled.dropped, vec!["tavily.request_id".to_string()]);
    }
}
