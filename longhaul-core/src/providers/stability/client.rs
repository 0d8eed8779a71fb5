//! Stability AI client implementation

use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, StatusCode};
use tracing::debug;

use super::types::{
    CreatedGeneration, InProgress, StabilityError, StabilityRequest, StabilityVideo,
    FINISH_CONTENT_FILTERED,
};
use crate::config::{ProviderConfig, SecretString};
use crate::http::client::FailedResponse;
use crate::http::error::{error_message, map_http_error, retry_after_from_headers};
use crate::http::{HttpClient, RequestOptions};
use crate::providers::adapter::mismatched_payload;
use crate::providers::{
    ClientError, ClientResult, PollOutcome, ProviderClient, ProviderFailure, ProviderKind,
    ProviderPayload, ProviderResult, RateLimitTracker, StartOutcome,
};

pub const DEFAULT_BASE_URL: &str = "https://api.stability.ai";

/// Stability AI image-to-video client
///
/// Jobs cannot be cancelled remotely, so `cancel` keeps the trait default.
pub struct StabilityClient {
    http: HttpClient,
    api_key: SecretString,
    base_url: String,
    rate_limiter: RateLimitTracker,
}

impl StabilityClient {
    pub fn new(settings: &ProviderConfig, http: HttpClient) -> Self {
        Self {
            http,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
            rate_limiter: RateLimitTracker::new(settings.rate_limit.max_concurrent),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, &format!("{}{}", self.base_url, path))
            .bearer_auth(self.api_key.expose_secret())
    }

    fn form(request: &StabilityRequest) -> ClientResult<Form> {
        let extension = if request.mime_type == "image/jpeg" { "jpg" } else { "png" };
        let image = Part::bytes(request.image.clone())
            .file_name(format!("image.{}", extension))
            .mime_str(&request.mime_type)
            .map_err(|e| ClientError::invalid(format!("bad image type: {}", e)))?;

        Ok(Form::new()
            .part("image", image)
            .text("seed", request.seed.to_string())
            .text("cfg_scale", request.cfg_scale.to_string())
            .text("motion_bucket_id", request.motion_bucket_id.to_string()))
    }

    /// Handle API errors
    fn error_from(&self, failed: FailedResponse, options: &RequestOptions) -> ClientError {
        let body = failed.body.as_deref();
        let message = body
            .and_then(|b| serde_json::from_str::<StabilityError>(b).ok())
            .and_then(|e| e.message())
            .unwrap_or_else(|| error_message(failed.status, body));

        match failed.status {
            StatusCode::BAD_REQUEST | StatusCode::PAYLOAD_TOO_LARGE | StatusCode::UNPROCESSABLE_ENTITY => {
                ClientError::InvalidRequest { message }
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Authentication,
            StatusCode::PAYMENT_REQUIRED => ClientError::QuotaExhausted { message },
            StatusCode::NOT_FOUND => ClientError::NotFound { message },
            StatusCode::TOO_MANY_REQUESTS => ClientError::RateLimit {
                retry_after: retry_after_from_headers(&failed.headers),
            },
            status => map_http_error(status, Some(&failed.headers), body, options.request_id),
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[async_trait]
impl ProviderClient for StabilityClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Stability
    }

    async fn start(
        &self,
        payload: &ProviderPayload,
        options: &RequestOptions,
    ) -> ClientResult<StartOutcome> {
        let ProviderPayload::Stability(request) = payload else {
            return Err(mismatched_payload(ProviderKind::Stability, payload));
        };

        let _slot = self.rate_limiter.acquire(options.issued_at)?;
        let builder = self
            .request(Method::POST, "/v2beta/image-to-video")
            .header(ACCEPT, "application/json")
            .multipart(Self::form(request)?);
        let response = self.http.send("stability", builder, options).await?;

        if !response.status().is_success() {
            let failed = self.http.failure("stability", response, options).await;
            return Err(self.error_from(failed, options));
        }

        let created: CreatedGeneration = self.http.read_json("stability", response, options).await?;
        debug!("stability accepted generation {}", created.id);

        Ok(StartOutcome::Job {
            external_ref: created.id,
        })
    }

    async fn poll(&self, external_ref: &str, options: &RequestOptions) -> ClientResult<PollOutcome> {
        let _slot = self.rate_limiter.acquire(options.issued_at)?;
        let builder = self
            .request(
                Method::GET,
                &format!("/v2beta/image-to-video/result/{}", external_ref),
            )
            .header(ACCEPT, "video/*");
        let response = self.http.send("stability", builder, options).await?;

        match response.status() {
            StatusCode::ACCEPTED => {
                let progress: InProgress = self.http.read_json("stability", response, options).await?;
                debug!(
                    "stability generation {} {}",
                    progress.id,
                    progress.status.as_deref().unwrap_or("in-progress")
                );
                Ok(PollOutcome::Pending)
            }
            StatusCode::OK => {
                let headers = response.headers().clone();
                let finish_reason = header_str(&headers, "finish-reason").map(str::to_string);

                if finish_reason.as_deref() == Some(FINISH_CONTENT_FILTERED) {
                    return Ok(PollOutcome::Failed(ProviderFailure::new(
                        finish_reason,
                        "output was withheld by the content filter",
                    )));
                }

                let mime_type = header_str(&headers, CONTENT_TYPE.as_str())
                    .unwrap_or("video/mp4")
                    .to_string();
                let seed = header_str(&headers, "seed").and_then(|s| s.parse().ok());
                let video = self.http.read_bytes(response, options).await?;

                Ok(PollOutcome::Done(ProviderResult::Stability(StabilityVideo {
                    id: external_ref.to_string(),
                    video,
                    mime_type,
                    finish_reason,
                    seed,
                })))
            }
            _ => {
                let failed = self.http.failure("stability", response, options).await;
                Err(self.error_from(failed, options))
            }
        }
    }
}
