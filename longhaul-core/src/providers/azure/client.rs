//! Azure AI Speech batch transcription client

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};

use super::types::{
    AzureErrorBody, AzureFileList, AzureStatus, AzureTranscript, AzureTranscription,
};
use crate::config::{ProviderConfig, SecretString};
use crate::http::client::FailedResponse;
use crate::http::error::{error_message, map_http_error, retry_after_from_headers};
use crate::http::{HttpClient, RequestOptions};
use crate::providers::adapter::mismatched_payload;
use crate::providers::{
    CancelOutcome, ClientError, ClientResult, PollOutcome, ProviderClient, ProviderFailure,
    ProviderKind, ProviderPayload, ProviderResult, RateLimitTracker, StartOutcome,
};

/// Path of the batch transcription API below the regional host
pub const API_PATH: &str = "/speechtotext/v3.2";

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// File kind holding the transcript JSON
const TRANSCRIPTION_FILE: &str = "Transcription";

/// Azure batch transcription client
pub struct AzureClient {
    http: HttpClient,
    api_key: SecretString,
    base_url: String,
    rate_limiter: RateLimitTracker,
}

impl AzureClient {
    /// Create a client; the endpoint comes from `base_url` or is derived from `region`
    pub fn new(settings: &ProviderConfig, http: HttpClient) -> Result<Self, ClientError> {
        let base_url = match (&settings.base_url, &settings.region) {
            (Some(_), _) => settings.base_url_or(""),
            (None, Some(region)) => format!(
                "https://{}.api.cognitive.microsoft.com{}",
                region, API_PATH
            ),
            (None, None) => {
                return Err(ClientError::invalid(format!(
                    "provider '{}' needs a region or base_url",
                    settings.name
                )))
            }
        };

        Ok(Self {
            http,
            api_key: settings.api_key.clone(),
            base_url,
            rate_limiter: RateLimitTracker::new(settings.rate_limit.max_concurrent),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, &format!("{}{}", self.base_url, path))
            .header(SUBSCRIPTION_KEY_HEADER, self.api_key.expose_secret())
    }

    /// Handle API errors
    fn error_from(&self, failed: FailedResponse, options: &RequestOptions) -> ClientError {
        let body = failed.body.as_deref();
        let message = body
            .and_then(|b| serde_json::from_str::<AzureErrorBody>(b).ok())
            .and_then(|e| e.error.message)
            .unwrap_or_else(|| error_message(failed.status, body));

        match failed.status {
            StatusCode::BAD_REQUEST => ClientError::InvalidRequest { message },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Authentication,
            StatusCode::NOT_FOUND => ClientError::NotFound { message },
            StatusCode::TOO_MANY_REQUESTS => ClientError::RateLimit {
                retry_after: retry_after_from_headers(&failed.headers),
            },
            status => map_http_error(status, Some(&failed.headers), body, options.request_id),
        }
    }

    async fn checked(&self, response: Response, options: &RequestOptions) -> ClientResult<Response> {
        self.rate_limiter.update_from_headers(response.headers(), options.issued_at);
        if response.status().is_success() {
            Ok(response)
        } else {
            let failed = self.http.failure("azure", response, options).await;
            Err(self.error_from(failed, options))
        }
    }

    /// Locate and download the transcript of a succeeded job
    async fn fetch_transcript(
        &self,
        external_ref: &str,
        options: &RequestOptions,
    ) -> ClientResult<AzureTranscript> {
        let builder = self.request(
            Method::GET,
            &format!("/transcriptions/{}/files", external_ref),
        );
        let response = self.http.send("azure", builder, options).await?;
        let response = self.checked(response, options).await?;
        let files: AzureFileList = self.http.read_json("azure", response, options).await?;

        let file = files
            .values
            .iter()
            .find(|file| file.kind == TRANSCRIPTION_FILE)
            .ok_or_else(|| {
                ClientError::parse(format!("transcription {} has no transcript file", external_ref))
            })?;

        // content URLs carry their own SAS token
        let builder = self.http.request(Method::GET, &file.links.content_url);
        let response = self.http.send("azure", builder, options).await?;
        let response = self.checked(response, options).await?;
        self.http.read_json("azure", response, options).await
    }
}

#[async_trait]
impl ProviderClient for AzureClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Azure
    }

    async fn start(
        &self,
        payload: &ProviderPayload,
        options: &RequestOptions,
    ) -> ClientResult<StartOutcome> {
        let ProviderPayload::Azure(request) = payload else {
            return Err(mismatched_payload(ProviderKind::Azure, payload));
        };

        let _slot = self.rate_limiter.acquire(options.issued_at)?;
        let builder = self.request(Method::POST, "/transcriptions").json(request);
        let response = self.http.send("azure", builder, options).await?;
        let response = self.checked(response, options).await?;

        let created: AzureTranscription = self.http.read_json("azure", response, options).await?;
        let id = created
            .id()
            .ok_or_else(|| ClientError::parse(format!("no id in '{}'", created.self_url)))?;
        debug!("azure created transcription {}", id);

        Ok(StartOutcome::Job {
            external_ref: id.to_string(),
        })
    }

    async fn poll(&self, external_ref: &str, options: &RequestOptions) -> ClientResult<PollOutcome> {
        let _slot = self.rate_limiter.acquire(options.issued_at)?;
        let builder = self.request(Method::GET, &format!("/transcriptions/{}", external_ref));
        let response = self.http.send("azure", builder, options).await?;
        let response = self.checked(response, options).await?;
        let job: AzureTranscription = self.http.read_json("azure", response, options).await?;

        match job.status {
            AzureStatus::NotStarted | AzureStatus::Running => Ok(PollOutcome::Pending),
            AzureStatus::Succeeded => {
                let transcript = self.fetch_transcript(external_ref, options).await?;
                Ok(PollOutcome::Done(ProviderResult::Azure(transcript)))
            }
            AzureStatus::Failed => {
                let error = job.properties.and_then(|p| p.error);
                let (code, message) = match error {
                    Some(e) => (e.code, e.message),
                    None => (None, None),
                };
                Ok(PollOutcome::Failed(ProviderFailure::new(
                    code,
                    message.unwrap_or_else(|| "transcription failed".to_string()),
                )))
            }
            AzureStatus::Unknown => {
                warn!("azure transcription {} reported an unknown status", external_ref);
                Err(ClientError::Custom {
                    code: "UNKNOWN_STATUS".to_string(),
                    message: format!("unrecognized status for transcription {}", external_ref),
                })
            }
        }
    }

    async fn cancel(
        &self,
        external_ref: &str,
        options: &RequestOptions,
    ) -> ClientResult<CancelOutcome> {
        let builder = self.request(Method::DELETE, &format!("/transcriptions/{}", external_ref));
        let response = self.http.send("azure", builder, options).await?;

        match response.status() {
            status if status.is_success() => Ok(CancelOutcome::Remote),
            StatusCode::NOT_FOUND => Ok(CancelOutcome::Remote),
            _ => {
                let failed = self.http.failure("azure", response, options).await;
                Err(self.error_from(failed, options))
            }
        }
    }
}
