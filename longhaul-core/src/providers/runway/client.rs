//! Runway client implementation

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

use super::types::{CreatedTask, RunwayError, RunwayPayload, RunwayStatus, RunwayTask};
use crate::config::{ProviderConfig, SecretString};
use crate::http::client::FailedResponse;
use crate::http::error::{error_message, map_http_error, retry_after_from_headers};
use crate::http::{HttpClient, RequestOptions};
use crate::providers::adapter::mismatched_payload;
use crate::providers::{
    CancelOutcome, ClientError, ClientResult, PollOutcome, ProviderClient, ProviderFailure,
    ProviderKind, ProviderPayload, ProviderResult, RateLimitTracker, StartOutcome,
};

pub const DEFAULT_BASE_URL: &str = "https://api.dev.runwayml.com";

/// API version pinned through the `X-Runway-Version` header
pub const API_VERSION: &str = "2024-11-06";

/// Marks a job ref as the first-frame task of a text-to-video pipeline
const IMAGE_STAGE: &str = "image:";

/// Runway video generation client
pub struct RunwayClient {
    http: HttpClient,
    api_key: SecretString,
    base_url: String,
    rate_limiter: RateLimitTracker,
}

impl RunwayClient {
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
            .header("X-Runway-Version", API_VERSION)
    }

    /// Create a task and return its id
    async fn create_task<T: Serialize>(
        &self,
        path: &str,
        body: &T,
        options: &RequestOptions,
    ) -> ClientResult<String> {
        let _slot = self.rate_limiter.acquire(options.issued_at)?;
        let builder = self.request(Method::POST, path).json(body);
        let response = self.http.send("runway", builder, options).await?;
        self.rate_limiter.update_from_headers(response.headers(), options.issued_at);

        if !response.status().is_success() {
            let failed = self.http.failure("runway", response, options).await;
            return Err(self.error_from(failed, options));
        }

        let created: CreatedTask = self.http.read_json("runway", response, options).await?;
        debug!("runway accepted task {} via {}", created.id, path);
        Ok(created.id)
    }

    /// Handle API errors
    fn error_from(&self, failed: FailedResponse, options: &RequestOptions) -> ClientError {
        let body = failed.body.as_deref();
        let message = body
            .and_then(|b| serde_json::from_str::<RunwayError>(b).ok())
            .map(|e| e.error)
            .unwrap_or_else(|| error_message(failed.status, body));

        match failed.status {
            StatusCode::BAD_REQUEST => ClientError::InvalidRequest { message },
            StatusCode::UNAUTHORIZED => ClientError::Authentication,
            StatusCode::NOT_FOUND => ClientError::NotFound { message },
            StatusCode::TOO_MANY_REQUESTS => ClientError::RateLimit {
                retry_after: retry_after_from_headers(&failed.headers),
            },
            status => map_http_error(status, Some(&failed.headers), body, options.request_id),
        }
    }
}

#[async_trait]
impl ProviderClient for RunwayClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Runway
    }

    async fn start(
        &self,
        payload: &ProviderPayload,
        options: &RequestOptions,
    ) -> ClientResult<StartOutcome> {
        let ProviderPayload::Runway(payload) = payload else {
            return Err(mismatched_payload(ProviderKind::Runway, payload));
        };

        let external_ref = match payload {
            RunwayPayload::ImageToVideo(request) => {
                self.create_task("/v1/image_to_video", request, options).await?
            }
            RunwayPayload::TextToVideo(staged) => {
                let id = self.create_task("/v1/text_to_image", &staged.image, options).await?;
                format!("{}{}", IMAGE_STAGE, id)
            }
            RunwayPayload::Upscale(request) => {
                self.create_task("/v1/video_upscale", request, options).await?
            }
        };

        Ok(StartOutcome::Job { external_ref })
    }

    async fn start_stage(
        &self,
        payload: &ProviderPayload,
        input: &str,
        options: &RequestOptions,
    ) -> ClientResult<StartOutcome> {
        let ProviderPayload::Runway(RunwayPayload::TextToVideo(staged)) = payload else {
            return Err(ClientError::invalid(format!(
                "runway has no follow-up stage for a {} payload",
                payload.provider()
            )));
        };

        let request = staged.video_from(input);
        let external_ref = self.create_task("/v1/image_to_video", &request, options).await?;
        Ok(StartOutcome::Job { external_ref })
    }

    async fn poll(&self, external_ref: &str, options: &RequestOptions) -> ClientResult<PollOutcome> {
        let (task_id, image_stage) = match external_ref.strip_prefix(IMAGE_STAGE) {
            Some(id) => (id, true),
            None => (external_ref, false),
        };

        let _slot = self.rate_limiter.acquire(options.issued_at)?;
        let builder = self.request(Method::GET, &format!("/v1/tasks/{}", task_id));
        let response = self.http.send("runway", builder, options).await?;
        self.rate_limiter.update_from_headers(response.headers(), options.issued_at);

        if !response.status().is_success() {
            let failed = self.http.failure("runway", response, options).await;
            return Err(self.error_from(failed, options));
        }

        let task: RunwayTask = self.http.read_json("runway", response, options).await?;

        Ok(match task.status {
            RunwayStatus::Pending | RunwayStatus::Throttled | RunwayStatus::Running => {
                debug!(
                    "runway task {} still {:?} ({:.0}%)",
                    task.id,
                    task.status,
                    task.progress.unwrap_or(0.0) * 100.0
                );
                PollOutcome::Pending
            }
            RunwayStatus::Succeeded if image_stage => {
                let frame = task.output.into_iter().next().ok_or_else(|| {
                    ClientError::parse(format!("image task {} succeeded without output", task.id))
                })?;
                debug!("runway image task {} rendered the first frame", task.id);
                PollOutcome::StageDone { output: frame }
            }
            RunwayStatus::Succeeded => PollOutcome::Done(ProviderResult::Runway(task)),
            RunwayStatus::Failed => PollOutcome::Failed(ProviderFailure::new(
                task.failure_code,
                task.failure.unwrap_or_else(|| "task failed".to_string()),
            )),
            RunwayStatus::Cancelled => PollOutcome::Failed(ProviderFailure::new(
                Some("CANCELLED".to_string()),
                "task was cancelled on the provider side",
            )),
            RunwayStatus::Unknown => {
                warn!("runway task {} reported an unknown status", task.id);
                return Err(ClientError::Custom {
                    code: "UNKNOWN_STATUS".to_string(),
                    message: format!("unrecognized status for task {}", task.id),
                });
            }
        })
    }

    async fn cancel(
        &self,
        external_ref: &str,
        options: &RequestOptions,
    ) -> ClientResult<CancelOutcome> {
        let task_id = external_ref.strip_prefix(IMAGE_STAGE).unwrap_or(external_ref);
        let builder = self.request(Method::DELETE, &format!("/v1/tasks/{}", task_id));
        let response = self.http.send("runway", builder, options).await?;

        match response.status() {
            status if status.is_success() => Ok(CancelOutcome::Remote),
            // already gone on the provider side
            StatusCode::NOT_FOUND => Ok(CancelOutcome::Remote),
            _ => {
                let failed = self.http.failure("runway", response, options).await;
                Err(self.error_from(failed, options))
            }
        }
    }
}
