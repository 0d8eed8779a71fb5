//! Deepgram client implementation

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use tracing::debug;

use super::types::{DeepgramAudio, DeepgramError, DeepgramResponse, UrlSource};
use crate::config::{ProviderConfig, SecretString};
use crate::http::client::FailedResponse;
use crate::http::error::{error_message, map_http_error, retry_after_from_headers};
use crate::http::{HttpClient, RequestOptions};
use crate::providers::adapter::mismatched_payload;
use crate::providers::{
    ClientError, ClientResult, ProviderClient, ProviderKind, ProviderPayload, ProviderResult,
    RateLimitTracker, StartOutcome,
};

pub const DEFAULT_BASE_URL: &str = "https://api.deepgram.com";

/// Deepgram pre-recorded speech-to-text client
pub struct DeepgramClient {
    http: HttpClient,
    api_key: SecretString,
    base_url: String,
    rate_limiter: RateLimitTracker,
}

impl DeepgramClient {
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
            .and_then(|b| serde_json::from_str::<DeepgramError>(b).ok())
            .and_then(|e| e.err_msg)
            .unwrap_or_else(|| error_message(failed.status, body));

        match failed.status {
            StatusCode::BAD_REQUEST => ClientError::InvalidRequest { message },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Authentication,
            StatusCode::PAYMENT_REQUIRED => ClientError::QuotaExhausted { message },
            StatusCode::TOO_MANY_REQUESTS => ClientError::RateLimit {
                retry_after: retry_after_from_headers(&failed.headers),
            },
            status => map_http_error(status, Some(&failed.headers), body, options.request_id),
        }
    }
}

#[async_trait]
impl ProviderClient for DeepgramClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Deepgram
    }

    async fn start(
        &self,
        payload: &ProviderPayload,
        options: &RequestOptions,
    ) -> ClientResult<StartOutcome> {
        let ProviderPayload::Deepgram(request) = payload else {
            return Err(mismatched_payload(ProviderKind::Deepgram, payload));
        };

        let _slot = self.rate_limiter.acquire(options.issued_at)?;
        let builder = self
            .http
            .request(Method::POST, &format!("{}/v1/listen", self.base_url))
            .header(AUTHORIZATION, format!("Token {}", self.api_key.expose_secret()))
            .query(&request.query_pairs());

        let builder = match &request.audio {
            DeepgramAudio::Url(url) => builder.json(&UrlSource { url }),
            DeepgramAudio::Bytes { data, mime_type } => builder
                .header(CONTENT_TYPE, mime_type.as_str())
                .body(data.clone()),
        };

        let response = self.http.send("deepgram", builder, options).await?;
        self.rate_limiter.update_from_headers(response.headers(), options.issued_at);

        if !response.status().is_success() {
            let failed = self.http.failure("deepgram", response, options).await;
            return Err(self.error_from(failed, options));
        }

        let transcript: DeepgramResponse = self.http.read_json("deepgram", response, options).await?;
        debug!(
            "deepgram transcribed {:.1}s of audio",
            transcript.metadata.duration.unwrap_or_default()
        );

        Ok(StartOutcome::Immediate(ProviderResult::Deepgram(transcript)))
    }
}
