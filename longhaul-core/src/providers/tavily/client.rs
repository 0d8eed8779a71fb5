//! Tavily client implementation

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use tracing::debug;

use super::types::{TavilyError, TavilyResponse};
use crate::config::{ProviderConfig, SecretString};
use crate::http::client::FailedResponse;
use crate::http::error::{error_message, map_http_error, retry_after_from_headers};
use crate::http::{HttpClient, RequestOptions};
use crate::providers::adapter::mismatched_payload;
use crate::providers::{
    ClientError, ClientResult, ProviderClient, ProviderKind, ProviderPayload, ProviderResult,
    RateLimitTracker, StartOutcome,
};

pub const DEFAULT_BASE_URL: &str = "https://api.tavily.com";

pub struct TavilyClient {
    http: HttpClient,
    api_key: SecretString,
    base_url: String,
    rate_limiter: RateLimitTracker,
}

impl TavilyClient {
    pub fn new(settings: &ProviderConfig, http: HttpClient) -> Self {
        Self {
            http,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
            rate_limiter: RateLimitTracker::new(settings.rate_limit.max_concurrent),
        }
    }

    /// Handle API errors
    fn error_from(&self, failed: FailedResponse, options: &RequestOptions) -> ClientError {
        let body = failed.body.as_deref();
        let message = body
            .and_then(|b| serde_json::from_str::<TavilyError>(b).ok())
            .map(|e| e.detail.message())
            .unwrap_or_else(|| error_message(failed.status, body));

        match failed.status.as_u16() {
            400 => ClientError::InvalidRequest { message },
            401 => ClientError::Authentication,
            // 432: plan limit, 433: pay-as-you-go limit
            432 | 433 => ClientError::QuotaExhausted { message },
            429 => ClientError::RateLimit {
                retry_after: retry_after_from_headers(&failed.headers),
            },
            _ => map_http_error(failed.status, Some(&failed.headers), body, options.request_id),
        }
    }
}

#[async_trait]
impl ProviderClient for TavilyClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Tavily
    }

    async fn start(
        &self,
        payload: &ProviderPayload,
        options: &RequestOptions,
    ) -> ClientResult<StartOutcome> {
        let ProviderPayload::Tavily(request) = payload else {
            return Err(mismatched_payload(ProviderKind::Tavily, payload));
        };

        let _slot = self.rate_limiter.acquire(options.issued_at)?;
        let builder = self
            .http
            .request(Method::POST, &format!("{}/search", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(request);
        let response = self.http.send("tavily", builder, options).await?;
        self.rate_limiter.update_from_headers(response.headers(), options.issued_at);

        if response.status() != StatusCode::OK {
            let failed = self.http.failure("tavily", response, options).await;
            return Err(self.error_from(failed, options));
        }

        let results: TavilyResponse = self.http.read_json("tavily", response, options).await?;
        debug!("tavily returned {} results", results.results.len());

        Ok(StartOutcome::Immediate(ProviderResult::Tavily(results)))
    }
}
