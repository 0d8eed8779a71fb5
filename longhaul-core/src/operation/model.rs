//! Operation record and its lifecycle transitions
//!
//! Every mutation of an [`Operation`] goes through one of the transition
//! methods below, which refuse moves outside the phase graph. The state
//! machine persists the result of each transition; nothing else writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::protocol::{OperationKind, UnifiedRequest, UnifiedResult};
use crate::providers::{CancelOutcome, ProviderKind, TranslateError};

/// Caller-assigned identifier of one logical operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identifier
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for OperationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Created,
    Submitted,
    Polling,
    Streaming,
    Succeeded,
    Failed,
    Cancelled,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Succeeded | Phase::Failed | Phase::Cancelled)
    }

    /// Position along the lifecycle; never decreases over an operation's life
    pub fn rank(&self) -> u8 {
        match self {
            Phase::Created => 0,
            Phase::Submitted => 1,
            Phase::Polling | Phase::Streaming => 2,
            Phase::Succeeded | Phase::Failed | Phase::Cancelled => 3,
        }
    }

    /// Whether `next` is an edge of the lifecycle graph
    pub fn can_transition_to(&self, next: Phase) -> bool {
        use Phase::*;

        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (_, Failed) | (_, Cancelled) => true,
            (Created, Created) | (Created, Submitted) | (Created, Succeeded) => true,
            (Submitted, Polling) | (Submitted, Streaming) => true,
            (Polling, Polling) | (Polling, Succeeded) => true,
            (Streaming, Streaming) | (Streaming, Succeeded) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Created => "created",
            Phase::Submitted => "submitted",
            Phase::Polling => "polling",
            Phase::Streaming => "streaming",
            Phase::Succeeded => "succeeded",
            Phase::Failed => "failed",
            Phase::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification attached to every recorded error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Validation,
    UnsupportedFeature,
    TransientProvider,
    TerminalProvider,
    ExhaustedRetries,
    CheckpointCorruption,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{class:?}: {message}")]
pub struct OperationError {
    pub class: ErrorClass,
    pub message: String,
}

impl OperationError {
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }
}

impl From<&TranslateError> for OperationError {
    fn from(err: &TranslateError) -> Self {
        let class = match err {
            TranslateError::UnsupportedFeature { .. } => ErrorClass::UnsupportedFeature,
            TranslateError::Validation { .. } => ErrorClass::Validation,
        };
        Self::new(class, err.to_string())
    }
}

/// Move outside the lifecycle graph
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("operation {id}: illegal transition {from} -> {to}")]
pub struct TransitionError {
    pub id: OperationId,
    pub from: Phase,
    pub to: Phase,
}

/// Progress of a paginated operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialProgress {
    pub pages_delivered: u64,
    pub items_delivered: u64,

    /// Cursor of the next undelivered page
    pub cursor: Option<String>,
}

/// Durable state of one logical provider call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub(crate) id: OperationId,
    pub(crate) provider: ProviderKind,
    pub(crate) kind: OperationKind,
    pub(crate) phase: Phase,

    /// Provider job id, set once on submission
    pub(crate) external_ref: Option<String>,

    /// Consecutive transient failures since the last good response
    pub(crate) attempt: u32,

    pub(crate) last_error: Option<OperationError>,
    pub(crate) result: Option<UnifiedResult>,
    pub(crate) request: UnifiedRequest,

    pub(crate) cursor: Option<String>,
    #[serde(default)]
    pub(crate) pages_delivered: u64,
    #[serde(default)]
    pub(crate) items_delivered: u64,

    #[serde(default)]
    pub(crate) cancel_outcome: Option<CancelOutcome>,

    /// Output of a finished stage whose follow-up has not started yet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) stage_input: Option<String>,

    /// Provider job of the latest follow-up stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) stage_ref: Option<String>,

    /// No provider call before this instant
    pub(crate) not_before: Option<DateTime<Utc>>,

    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,

    /// Write counter checked by compare-and-set
    pub(crate) revision: u64,
}

impl Operation {
    /// Fresh operation in `Created`
    pub fn new(
        id: OperationId,
        provider: ProviderKind,
        request: UnifiedRequest,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            provider,
            kind: request.kind(),
            phase: Phase::Created,
            external_ref: None,
            attempt: 0,
            last_error: None,
            result: None,
            request,
            cursor: None,
            pages_delivered: 0,
            items_delivered: 0,
            cancel_outcome: None,
            stage_input: None,
            stage_ref: None,
            not_before: None,
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    pub fn id(&self) -> &OperationId {
        &self.id
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn external_ref(&self) -> Option<&str> {
        self.external_ref.as_deref()
    }

    pub fn stage_ref(&self) -> Option<&str> {
        self.stage_ref.as_deref()
    }

    /// Job polled next: the latest stage, else the submitted job
    pub fn current_ref(&self) -> Option<&str> {
        self.stage_ref.as_deref().or(self.external_ref.as_deref())
    }

    /// Whether a finished stage is waiting for its follow-up to start
    pub fn awaiting_stage(&self) -> bool {
        self.stage_input.is_some()
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn last_error(&self) -> Option<&OperationError> {
        self.last_error.as_ref()
    }

    pub fn result(&self) -> Option<&UnifiedResult> {
        self.result.as_ref()
    }

    pub fn request(&self) -> &UnifiedRequest {
        &self.request
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub fn cancel_outcome(&self) -> Option<CancelOutcome> {
        self.cancel_outcome
    }

    pub fn not_before(&self) -> Option<DateTime<Utc>> {
        self.not_before
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether the next provider call may be made at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.not_before.map_or(true, |at| at <= now)
    }

    pub fn partial(&self) -> PartialProgress {
        PartialProgress {
            pages_delivered: self.pages_delivered,
            items_delivered: self.items_delivered,
            cursor: self.cursor.clone(),
        }
    }

    fn advance(&mut self, to: Phase, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if !self.phase.can_transition_to(to) {
            return Err(TransitionError {
                id: self.id.clone(),
                from: self.phase,
                to,
            });
        }
        self.phase = to;
        self.updated_at = now;
        Ok(())
    }

    /// Take ownership of a `Created` operation before calling `start`
    ///
    /// The claim is a lease: other drivers see the operation as not due
    /// until `lease_until`, so a claimer that dies mid-call is retried only
    /// after the lease runs out.
    pub(crate) fn claim(
        &mut self,
        lease_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.advance(Phase::Created, now)?;
        self.not_before = Some(lease_until);
        Ok(())
    }

    /// Record the provider's job reference (and first cursor for streams)
    pub(crate) fn mark_submitted(
        &mut self,
        external_ref: String,
        cursor: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if self.external_ref.is_some() {
            return Err(TransitionError {
                id: self.id.clone(),
                from: self.phase,
                to: Phase::Submitted,
            });
        }
        self.advance(Phase::Submitted, now)?;
        self.external_ref = Some(external_ref);
        self.cursor = cursor;
        self.record_response();
        Ok(())
    }

    pub(crate) fn begin_polling(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.advance(Phase::Polling, now)
    }

    pub(crate) fn begin_streaming(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.advance(Phase::Streaming, now)
    }

    /// The job is still running; wait until `next_poll`
    pub(crate) fn record_pending(
        &mut self,
        next_poll: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.advance(Phase::Polling, now)?;
        self.record_response();
        self.not_before = Some(next_poll);
        Ok(())
    }

    /// A stage finished with `output`; the follow-up start is due now
    pub(crate) fn finish_stage(
        &mut self,
        output: String,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.advance(Phase::Polling, now)?;
        self.record_response();
        self.stage_input = Some(output);
        Ok(())
    }

    /// Take ownership of a pending follow-up start, leased like [`Self::claim`]
    pub(crate) fn claim_stage(
        &mut self,
        lease_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.require_stage_input()?;
        self.advance(Phase::Polling, now)?;
        self.not_before = Some(lease_until);
        Ok(())
    }

    /// Record the provider job of the follow-up stage
    pub(crate) fn begin_stage(
        &mut self,
        stage_ref: String,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.require_stage_input()?;
        self.advance(Phase::Polling, now)?;
        self.stage_input = None;
        self.stage_ref = Some(stage_ref);
        self.record_response();
        Ok(())
    }

    fn require_stage_input(&self) -> Result<(), TransitionError> {
        if self.stage_input.is_none() {
            return Err(TransitionError {
                id: self.id.clone(),
                from: self.phase,
                to: Phase::Polling,
            });
        }
        Ok(())
    }

    /// A page went out; `next_cursor` addresses the following one
    pub(crate) fn record_page(
        &mut self,
        next_cursor: Option<String>,
        items: u64,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.advance(Phase::Streaming, now)?;
        self.record_response();
        self.pages_delivered += 1;
        self.items_delivered += items;
        self.cursor = next_cursor;
        Ok(())
    }

    pub(crate) fn succeed(
        &mut self,
        result: UnifiedResult,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.advance(Phase::Succeeded, now)?;
        self.record_response();
        self.result = Some(result);
        self.cursor = None;
        Ok(())
    }

    pub(crate) fn fail(
        &mut self,
        error: OperationError,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.advance(Phase::Failed, now)?;
        self.last_error = Some(error);
        self.not_before = None;
        Ok(())
    }

    pub(crate) fn cancel(
        &mut self,
        outcome: CancelOutcome,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.advance(Phase::Cancelled, now)?;
        self.cancel_outcome = Some(outcome);
        self.not_before = None;
        Ok(())
    }

    /// Absorb a transient failure; the phase is unchanged
    pub(crate) fn record_transient(
        &mut self,
        error: OperationError,
        retry_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.advance(self.phase, now)?;
        self.attempt += 1;
        self.last_error = Some(error);
        self.not_before = Some(retry_at);
        Ok(())
    }

    /// Note an error without changing phase or attempt
    pub(crate) fn note_error(&mut self, error: OperationError) {
        self.last_error = Some(error);
    }

    fn record_response(&mut self) {
        self.attempt = 0;
        self.not_before = None;
    }

    /// Check the structural invariants of a decoded operation
    pub fn validate(&self) -> Result<(), String> {
        if self.result.is_some() != (self.phase == Phase::Succeeded) {
            return Err(format!(
                "result presence does not match phase {}",
                self.phase
            ));
        }
        if self.kind != self.request.kind() {
            return Err(format!(
                "kind {} does not match a {} request",
                self.kind,
                self.request.kind()
            ));
        }
        match self.phase {
            Phase::Created if self.external_ref.is_some() => {
                Err("created operation carries an external ref".to_string())
            }
            Phase::Submitted | Phase::Polling | Phase::Streaming if self.external_ref.is_none() => {
                Err(format!("{} operation has no external ref", self.phase))
            }
            Phase::Streaming if self.cursor.is_none() => {
                Err("streaming operation has no cursor".to_string())
            }
            Phase::Created | Phase::Submitted | Phase::Streaming
                if self.stage_input.is_some() || self.stage_ref.is_some() =>
            {
                Err(format!("{} operation carries pipeline stage state", self.phase))
            }
            _ => Ok(()),
        }
    }
}
