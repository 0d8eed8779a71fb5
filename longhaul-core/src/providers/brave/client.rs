//! Brave Search client implementation

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Method, StatusCode};
use tracing::debug;

use super::converter::{decode_cursor, encode_cursor, next_query};
use super::types::{BraveErrorBody, BraveResponse};
use crate::capabilities::descriptor::BRAVE;
use crate::config::{ProviderConfig, SecretString};
use crate::http::client::FailedResponse;
use crate::http::error::{error_message, map_http_error, retry_after_from_headers};
use crate::http::{HttpClient, RequestOptions};
use crate::providers::adapter::mismatched_payload;
use crate::providers::{
    ClientError, ClientResult, Page, ProviderClient, ProviderKind, ProviderPayload,
    ProviderResult, RateLimitTracker, StartOutcome,
};

pub const DEFAULT_BASE_URL: &str = "https://api.search.brave.com";

const TOKEN_HEADER: &str = "X-Subscription-Token";

/// Brave web search client
///
/// Searches are paginated: `start` only mints the first cursor and every
/// page is fetched with `fetch_page`.
pub struct BraveClient {
    http: HttpClient,
    api_key: SecretString,
    base_url: String,
    rate_limiter: RateLimitTracker,
}

impl BraveClient {
    pub fn new(settings: &ProviderConfig, http: HttpClient) -> Self {
        Self {
            http,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
            rate_limiter: RateLimitTracker::new(settings.rate_limit.max_concurrent),
        }
    }

    /// Current rate limit window as reported by the API
    pub fn rate_limit_info(&self) -> crate::providers::RateLimitInfo {
        self.rate_limiter.info()
    }

    /// Handle API errors
    fn error_from(&self, failed: FailedResponse, options: &RequestOptions) -> ClientError {
        let body = failed.body.as_deref();
        let message = body
            .and_then(|b| serde_json::from_str::<BraveErrorBody>(b).ok())
            .and_then(|e| e.error.detail.or(e.error.code))
            .unwrap_or_else(|| error_message(failed.status, body));

        match failed.status {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                ClientError::InvalidRequest { message }
            }
            StatusCode::UNAUTHORIZED => ClientError::Authentication,
            // plan without access to the endpoint or monthly quota spent
            StatusCode::FORBIDDEN => ClientError::QuotaExhausted { message },
            StatusCode::TOO_MANY_REQUESTS => ClientError::RateLimit {
                retry_after: retry_after_from_headers(&failed.headers),
            },
            status => map_http_error(status, Some(&failed.headers), body, options.request_id),
        }
    }
}

#[async_trait]
impl ProviderClient for BraveClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Brave
    }

    async fn start(
        &self,
        payload: &ProviderPayload,
        _options: &RequestOptions,
    ) -> ClientResult<StartOutcome> {
        let ProviderPayload::Brave(query) = payload else {
            return Err(mismatched_payload(ProviderKind::Brave, payload));
        };

        let cursor = encode_cursor(query)?;
        Ok(StartOutcome::Stream {
            external_ref: cursor.clone(),
            cursor,
        })
    }

    async fn fetch_page(&self, cursor: &str, options: &RequestOptions) -> ClientResult<Page> {
        let query = decode_cursor(cursor)?;

        let _slot = self.rate_limiter.acquire(options.issued_at)?;
        let builder = self
            .http
            .request(Method::GET, &format!("{}/res/v1/web/search", self.base_url))
            .header(TOKEN_HEADER, self.api_key.expose_secret())
            .header(ACCEPT, "application/json")
            .query(&query);
        let response = self.http.send("brave", builder, options).await?;
        self.rate_limiter.update_from_headers(response.headers(), options.issued_at);

        if !response.status().is_success() {
            let failed = self.http.failure("brave", response, options).await;
            return Err(self.error_from(failed, options));
        }

        let page: BraveResponse = self.http.read_json("brave", response, options).await?;
        let next_cursor = match next_query(&query, &page, BRAVE.limits.max_pages) {
            Some(next) => Some(encode_cursor(&next)?),
            None => None,
        };
        debug!(
            "brave page {} returned {} results, more: {}",
            query.offset,
            page.web.as_ref().map(|w| w.results.len()).unwrap_or(0),
            next_cursor.is_some()
        );

        Ok(Page {
            raw: ProviderResult::Brave(page),
            next_cursor,
        })
    }
}
