//! Provider client trait and provider tags
//!
//! A [`ProviderClient`] performs exactly one provider call per method and
//! never retries; the operation state machine owns retry, backoff and
//! persistence. [`ProviderKind::create_client`] is the only place that knows
//! which concrete client serves which tag.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::capabilities::{descriptor, ProviderDescriptor};
use crate::config::ProviderConfig;
use crate::http::{CallKind, HttpClient, RequestOptions};
use crate::providers::assemble::ProviderResult;
use crate::providers::transform::ProviderPayload;
use crate::providers::{ClientError, ClientResult};

/// Provider tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Runway,
    Stability,
    Deepgram,
    Azure,
    Brave,
    Tavily,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 6] = [
        ProviderKind::Runway,
        ProviderKind::Stability,
        ProviderKind::Deepgram,
        ProviderKind::Azure,
        ProviderKind::Brave,
        ProviderKind::Tavily,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Runway => "runway",
            ProviderKind::Stability => "stability",
            ProviderKind::Deepgram => "deepgram",
            ProviderKind::Azure => "azure",
            ProviderKind::Brave => "brave",
            ProviderKind::Tavily => "tavily",
        }
    }

    /// Static capability table for this provider
    pub fn descriptor(&self) -> &'static ProviderDescriptor {
        match self {
            ProviderKind::Runway => &descriptor::RUNWAY,
            ProviderKind::Stability => &descriptor::STABILITY,
            ProviderKind::Deepgram => &descriptor::DEEPGRAM,
            ProviderKind::Azure => &descriptor::AZURE,
            ProviderKind::Brave => &descriptor::BRAVE,
            ProviderKind::Tavily => &descriptor::TAVILY,
        }
    }

    /// Create a client instance for this provider
    pub fn create_client(
        &self,
        settings: &ProviderConfig,
        http: HttpClient,
    ) -> Result<Box<dyn ProviderClient>, ClientError> {
        if settings.kind != *self {
            return Err(ClientError::invalid(format!(
                "settings '{}' are for {}, not {}",
                settings.name, settings.kind, self
            )));
        }

        Ok(match self {
            ProviderKind::Runway => Box::new(super::runway::RunwayClient::new(settings, http)),
            ProviderKind::Stability => {
                Box::new(super::stability::StabilityClient::new(settings, http))
            }
            ProviderKind::Deepgram => Box::new(super::deepgram::DeepgramClient::new(settings, http)),
            ProviderKind::Azure => Box::new(super::azure::AzureClient::new(settings, http)?),
            ProviderKind::Brave => Box::new(super::brave::BraveClient::new(settings, http)),
            ProviderKind::Tavily => Box::new(super::tavily::TavilyClient::new(settings, http)),
        })
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown provider '{}'", s))
    }
}

/// Outcome of a start call
#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    /// The provider answered with the final result
    Immediate(ProviderResult),
    /// The provider accepted a job to be polled
    Job { external_ref: String },
    /// The provider opened a paginated result; `cursor` addresses the first page
    Stream { external_ref: String, cursor: String },
}

/// Provider-reported failure of a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    pub code: Option<String>,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(code: Option<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{}] {}", code, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Outcome of a poll call
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Pending,
    Done(ProviderResult),
    Failed(ProviderFailure),
    /// One stage of a multi-stage job finished; `output` seeds the next
    StageDone { output: String },
}

/// Outcome of a cancel call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    /// The provider acknowledged the cancellation
    Remote,
    /// Only local scheduling stopped; the provider may finish the job anyway
    LocalOnly,
}

/// One fetched page of a paginated result
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub raw: ProviderResult,
    /// Cursor of the following page, `None` on the last one
    pub next_cursor: Option<String>,
}

/// A provider client
///
/// Implementations cover the subset of calls their async model needs.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Tag of the provider this client talks to
    fn kind(&self) -> ProviderKind;

    /// Submit work
    async fn start(
        &self,
        payload: &ProviderPayload,
        options: &RequestOptions,
    ) -> ClientResult<StartOutcome>;

    /// Check a job's progress
    async fn poll(&self, external_ref: &str, options: &RequestOptions) -> ClientResult<PollOutcome> {
        let _ = (external_ref, options);
        Err(ClientError::Unsupported {
            provider: self.kind().as_str(),
            call: CallKind::Poll,
        })
    }

    /// Start the stage that follows a [`PollOutcome::StageDone`]
    async fn start_stage(
        &self,
        payload: &ProviderPayload,
        input: &str,
        options: &RequestOptions,
    ) -> ClientResult<StartOutcome> {
        let _ = (payload, input, options);
        Err(ClientError::Unsupported {
            provider: self.kind().as_str(),
            call: CallKind::Start,
        })
    }

    /// Cancel a job on the provider side
    async fn cancel(
        &self,
        external_ref: &str,
        options: &RequestOptions,
    ) -> ClientResult<CancelOutcome> {
        let _ = (external_ref, options);
        Ok(CancelOutcome::LocalOnly)
    }

    /// Fetch the page addressed by `cursor`
    async fn fetch_page(&self, cursor: &str, options: &RequestOptions) -> ClientResult<Page> {
        let _ = (cursor, options);
        Err(ClientError::Unsupported {
            provider: self.kind().as_str(),
            call: CallKind::FetchPage,
        })
    }
}

/// Error for a payload routed to the wrong client
pub(crate) fn mismatched_payload(expected: ProviderKind, payload: &ProviderPayload) -> ClientError {
    ClientError::invalid(format!(
        "{} client received a {} payload",
        expected,
        payload.provider()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.as_str().parse::<ProviderKind>().unwrap(), kind);
        }
        assert!("openai".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&ProviderKind::Deepgram).unwrap();
        assert_eq!(json, "\"deepgram\"");
    }

    #[test]
    fn test_create_client_checks_settings_kind() {
        let settings = ProviderConfig::new("brave", ProviderKind::Brave, "key");
        let http = HttpClient::new().unwrap();

        let client = ProviderKind::Brave.create_client(&settings, http.clone()).unwrap();
        assert_eq!(client.kind(), ProviderKind::Brave);

        assert!(ProviderKind::Tavily.create_client(&settings, http).is_err());
    }
}
