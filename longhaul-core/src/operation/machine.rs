//! Operation state machine
//!
//! Each public method advances an operation by at most one provider call and
//! checkpoints the outcome with a compare-and-set against the phase and
//! revision it started from. Losing that race means another driver owns the
//! operation: the loser drops whatever it computed and reports what is stored.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::checkpoint::{CheckpointStore, Expected, OperationRecord};
use super::clock::{after, Clock};
use super::error::{EngineError, EngineResult};
use super::model::{ErrorClass, Operation, OperationError, OperationId, Phase};
use crate::http::{CallKind, RequestOptions};
use crate::protocol::{StreamSummary, UnifiedChunk, UnifiedResult};
use crate::providers::{
    assemble, assemble_page, translate, CancelOutcome, ClientError, PollOutcome, ProviderClient,
    ProviderKind, RetryPolicy, StartOutcome,
};

/// Slack on top of the request timeout before a start claim lapses
const CLAIM_MARGIN: Duration = Duration::from_secs(5);

/// Retry and scheduling settings for one provider
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderTiming {
    pub retry: RetryPolicy,

    /// Wait between polls of a pending job
    pub poll_interval: Duration,

    /// Timeout of a single provider call
    pub request_timeout: Duration,
}

impl Default for ProviderTiming {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            poll_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(60),
        }
    }
}

pub(crate) struct ProviderSlot {
    pub(crate) client: Box<dyn ProviderClient>,
    pub(crate) timing: ProviderTiming,
}

enum Commit {
    Stored(Operation),
    Lost(Operation),
}

/// Outcome of one advancement attempt
pub(crate) enum Step {
    /// Nothing was due; the operation is unchanged
    Idle(Operation),
    /// A transition was checkpointed
    Progressed(Operation),
    /// Another driver wrote first; this is the stored state
    Contended(Operation),
}

impl Step {
    pub(crate) fn into_operation(self) -> Operation {
        match self {
            Step::Idle(op) | Step::Progressed(op) | Step::Contended(op) => op,
        }
    }
}

enum Fetch {
    Chunk(UnifiedChunk),
    Retry(Operation),
    Contended(Operation),
}

pub(crate) struct OperationMachine {
    store: Arc<dyn CheckpointStore>,
    clock: Arc<dyn Clock>,
    providers: HashMap<ProviderKind, ProviderSlot>,
}

impl OperationMachine {
    pub(crate) fn new(
        store: Arc<dyn CheckpointStore>,
        clock: Arc<dyn Clock>,
        providers: HashMap<ProviderKind, ProviderSlot>,
    ) -> Self {
        Self {
            store,
            clock,
            providers,
        }
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub(crate) fn store(&self) -> &dyn CheckpointStore {
        self.store.as_ref()
    }

    pub(crate) fn has_provider(&self, provider: ProviderKind) -> bool {
        self.providers.contains_key(&provider)
    }

    fn slot(&self, provider: ProviderKind) -> EngineResult<&ProviderSlot> {
        self.providers
            .get(&provider)
            .ok_or(EngineError::UnknownProvider { provider })
    }

    fn options(&self, op: &Operation, call: CallKind, timing: &ProviderTiming) -> RequestOptions {
        RequestOptions::new(call)
            .with_timeout(timing.request_timeout)
            .for_operation(op.id().as_str())
            .at(self.clock.now())
    }

    pub(crate) async fn load(&self, id: &OperationId) -> EngineResult<Operation> {
        let record = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| EngineError::NotFound { id: id.clone() })?;
        Ok(record.decode()?)
    }

    /// Store a new operation; `false` if the id is taken
    pub(crate) async fn insert(&self, op: &Operation) -> EngineResult<bool> {
        let record = OperationRecord::encode(op)?;
        Ok(self
            .store
            .compare_and_set(op.id(), Expected::Absent, record)
            .await?)
    }

    async fn commit(&self, current: &Operation, mut next: Operation) -> EngineResult<Commit> {
        next.revision = current.revision + 1;
        let record = OperationRecord::encode(&next)?;

        if self
            .store
            .compare_and_set(current.id(), Expected::of(current), record)
            .await?
        {
            if next.phase != current.phase {
                info!(
                    "operation {} [{}]: {} -> {}",
                    next.id, next.provider, current.phase, next.phase
                );
            } else {
                debug!(
                    "operation {} [{}]: checkpointed {} at revision {}",
                    next.id, next.provider, next.phase, next.revision
                );
            }
            return Ok(Commit::Stored(next));
        }

        let stored = self.load(current.id()).await?;
        warn!(
            "operation {} [{}]: lost checkpoint race at revision {} (stored: {} r{})",
            current.id, current.provider, current.revision, stored.phase, stored.revision
        );
        Ok(Commit::Lost(stored))
    }

    async fn finish(&self, current: &Operation, next: Operation) -> EngineResult<Step> {
        match self.commit(current, next).await? {
            Commit::Stored(op) => Ok(Step::Progressed(op)),
            Commit::Lost(stored) => {
                if stored.phase == Phase::Cancelled {
                    debug!(
                        "operation {} [{}]: discarding late provider result after cancel",
                        stored.id, stored.provider
                    );
                }
                Ok(Step::Contended(stored))
            }
        }
    }

    /// Fold a client error into `next`: backoff, exhaustion or terminal failure
    fn absorb(
        &self,
        next: &mut Operation,
        err: &ClientError,
        retry: &RetryPolicy,
    ) -> EngineResult<()> {
        let now = self.clock.now();

        if !err.is_transient() {
            warn!(
                "operation {} [{}]: terminal provider error: {}",
                next.id, next.provider, err
            );
            next.fail(OperationError::new(ErrorClass::TerminalProvider, err.to_string()), now)?;
            return Ok(());
        }

        if !retry.should_retry(err, next.attempt) {
            warn!(
                "operation {} [{}]: giving up after {} transient failures: {}",
                next.id, next.provider, next.attempt, err
            );
            next.fail(
                OperationError::new(
                    ErrorClass::ExhaustedRetries,
                    format!("gave up after {} retries: {}", next.attempt, err),
                ),
                now,
            )?;
            return Ok(());
        }

        let delay = retry.calculate_delay(next.attempt, err);
        debug!(
            "operation {} [{}]: transient failure {}, retrying in {:?}: {}",
            next.id,
            next.provider,
            next.attempt + 1,
            delay,
            err
        );
        next.record_transient(
            OperationError::new(ErrorClass::TransientProvider, err.to_string()),
            after(now, delay),
            now,
        )?;
        Ok(())
    }

    /// Advance by at most one provider call if one is due
    pub(crate) async fn step(&self, op: Operation) -> EngineResult<Step> {
        let now = self.clock.now();
        if op.phase.is_terminal() || !op.is_due(now) {
            return Ok(Step::Idle(op));
        }

        match op.phase {
            Phase::Created => self.start(op).await,
            // paginated operations only move when a page is requested
            Phase::Submitted | Phase::Streaming if op.provider.descriptor().is_paginated() => {
                Ok(Step::Idle(op))
            }
            Phase::Submitted => {
                let mut polling = op.clone();
                polling.begin_polling(now)?;
                match self.commit(&op, polling).await? {
                    Commit::Stored(polling) => self.poll(polling).await,
                    Commit::Lost(stored) => Ok(Step::Contended(stored)),
                }
            }
            Phase::Polling if op.awaiting_stage() => self.start_stage(op).await,
            Phase::Polling => self.poll(op).await,
            _ => Ok(Step::Idle(op)),
        }
    }

    async fn start(&self, op: Operation) -> EngineResult<Step> {
        let slot = self.slot(op.provider)?;

        // the claim is committed before start; concurrent drivers see a
        // lease and back off until the call has had time to finish
        let now = self.clock.now();
        let mut claimed = op.clone();
        claimed.claim(after(now, slot.timing.request_timeout + CLAIM_MARGIN), now)?;
        let op = match self.commit(&op, claimed).await? {
            Commit::Stored(op) => op,
            Commit::Lost(stored) => return Ok(Step::Contended(stored)),
        };

        let mut next = op.clone();
        match translate(&op.request, op.provider.descriptor()) {
            Err(err) => {
                warn!(
                    "operation {} [{}]: request rejected: {}",
                    op.id, op.provider, err
                );
                next.fail(OperationError::from(&err), self.clock.now())?;
            }
            Ok(payload) => {
                let options = self
                    .options(&op, CallKind::Start, &slot.timing)
                    .with_idempotency_key(op.id().as_str());
                let outcome = slot.client.start(&payload, &options).await;
                let now = self.clock.now();

                match outcome {
                    Ok(StartOutcome::Immediate(raw)) => {
                        next.succeed(assemble(&raw).result, now)?;
                    }
                    Ok(StartOutcome::Job { external_ref }) => {
                        next.mark_submitted(external_ref, None, now)?;
                    }
                    Ok(StartOutcome::Stream {
                        external_ref,
                        cursor,
                    }) => {
                        next.mark_submitted(external_ref, Some(cursor), now)?;
                    }
                    Err(err) => self.absorb(&mut next, &err, &slot.timing.retry)?,
                }
            }
        }

        let started = next.external_ref.clone();
        self.finish_start(&op, next, started, slot).await
    }

    /// Start the follow-up of a finished pipeline stage
    ///
    /// Claimed with the same lease as `start`, so one driver issues it.
    async fn start_stage(&self, op: Operation) -> EngineResult<Step> {
        let slot = self.slot(op.provider)?;

        let now = self.clock.now();
        let mut claimed = op.clone();
        claimed.claim_stage(after(now, slot.timing.request_timeout + CLAIM_MARGIN), now)?;
        let op = match self.commit(&op, claimed).await? {
            Commit::Stored(op) => op,
            Commit::Lost(stored) => return Ok(Step::Contended(stored)),
        };

        let (Some(input), Some(finished)) = (op.stage_input.as_deref(), op.current_ref()) else {
            return Err(EngineError::CheckpointCorruption {
                id: op.id.clone(),
                reason: "stage handoff without a finished job".to_string(),
            });
        };

        let mut next = op.clone();
        let mut started = None;
        match translate(&op.request, op.provider.descriptor()) {
            Err(err) => {
                warn!(
                    "operation {} [{}]: request no longer translates: {}",
                    op.id, op.provider, err
                );
                next.fail(OperationError::from(&err), self.clock.now())?;
            }
            Ok(payload) => {
                let options = self
                    .options(&op, CallKind::Start, &slot.timing)
                    .with_idempotency_key(format!("{}:{}", op.id(), finished));
                let outcome = slot.client.start_stage(&payload, input, &options).await;
                let now = self.clock.now();

                match outcome {
                    Ok(StartOutcome::Job { external_ref }) => {
                        debug!(
                            "operation {} [{}]: stage {} handed off to {}",
                            op.id, op.provider, finished, external_ref
                        );
                        started = Some(external_ref.clone());
                        next.begin_stage(external_ref, now)?;
                    }
                    Ok(StartOutcome::Immediate(raw)) => {
                        next.succeed(assemble(&raw).result, now)?;
                    }
                    Ok(StartOutcome::Stream { .. }) => {
                        next.fail(
                            OperationError::new(
                                ErrorClass::TerminalProvider,
                                "follow-up stage opened a paginated result",
                            ),
                            now,
                        )?;
                    }
                    Err(err) => self.absorb(&mut next, &err, &slot.timing.retry)?,
                }
            }
        }

        self.finish_start(&op, next, started, slot).await
    }

    /// Checkpoint a start; a job it created after a cancel won is cancelled
    async fn finish_start(
        &self,
        op: &Operation,
        next: Operation,
        started: Option<String>,
        slot: &ProviderSlot,
    ) -> EngineResult<Step> {
        let step = self.finish(op, next).await?;
        if let (Step::Contended(stored), Some(external_ref)) = (&step, started.as_deref()) {
            if stored.phase == Phase::Cancelled {
                self.cancel_orphan(op, external_ref, slot).await;
            }
        }
        Ok(step)
    }

    /// Best-effort cancel of a job started after the operation was cancelled
    async fn cancel_orphan(&self, op: &Operation, external_ref: &str, slot: &ProviderSlot) {
        if !op.provider.descriptor().remote_cancel {
            warn!(
                "operation {} [{}]: job {} started after cancel and cannot be cancelled remotely",
                op.id, op.provider, external_ref
            );
            return;
        }

        let options = self.options(op, CallKind::Cancel, &slot.timing);
        match slot.client.cancel(external_ref, &options).await {
            Ok(_) => info!(
                "operation {} [{}]: cancelled job {} started after cancel",
                op.id, op.provider, external_ref
            ),
            Err(err) => warn!(
                "operation {} [{}]: could not cancel job {} started after cancel: {}",
                op.id, op.provider, external_ref, err
            ),
        }
    }

    async fn poll(&self, op: Operation) -> EngineResult<Step> {
        let slot = self.slot(op.provider)?;
        let Some(external_ref) = op.current_ref() else {
            return Err(EngineError::CheckpointCorruption {
                id: op.id.clone(),
                reason: "polling without an external ref".to_string(),
            });
        };

        let options = self.options(&op, CallKind::Poll, &slot.timing);
        let outcome = slot.client.poll(external_ref, &options).await;
        let now = self.clock.now();

        let mut next = op.clone();
        match outcome {
            Ok(PollOutcome::Pending) => {
                next.record_pending(after(now, slot.timing.poll_interval), now)?;
            }
            Ok(PollOutcome::Done(raw)) => {
                next.succeed(assemble(&raw).result, now)?;
            }
            Ok(PollOutcome::StageDone { output }) => {
                next.finish_stage(output, now)?;
            }
            Ok(PollOutcome::Failed(failure)) => {
                warn!(
                    "operation {} [{}]: provider reported failure {}",
                    op.id, op.provider, failure
                );
                next.fail(
                    OperationError::new(ErrorClass::TerminalProvider, failure.to_string()),
                    now,
                )?;
            }
            Err(err) => self.absorb(&mut next, &err, &slot.timing.retry)?,
        }

        self.finish(&op, next).await
    }

    /// Deliver the next page of a paginated operation
    ///
    /// Transient fetch failures are retried here after their backoff, so a
    /// call returns only with a page, the end of the sequence or a failure.
    pub(crate) async fn next_chunk(&self, op: Operation) -> EngineResult<Option<UnifiedChunk>> {
        if !op.provider.descriptor().is_paginated() {
            return Err(EngineError::NotStreamable {
                id: op.id.clone(),
                provider: op.provider,
            });
        }

        let mut op = op;
        loop {
            if let Some(at) = op.not_before.filter(|_| !op.phase.is_terminal()) {
                self.clock.sleep_until(at).await;
            }

            op = match op.phase {
                Phase::Succeeded | Phase::Cancelled => return Ok(None),
                Phase::Failed => return Err(failure_of(&op)),
                Phase::Created => match self.start(op).await? {
                    Step::Contended(stored) => return Err(owned_elsewhere(&stored)),
                    step => step.into_operation(),
                },
                Phase::Submitted => {
                    let mut streaming = op.clone();
                    streaming.begin_streaming(self.clock.now())?;
                    match self.commit(&op, streaming).await? {
                        Commit::Stored(streaming) => streaming,
                        Commit::Lost(stored) => return Err(owned_elsewhere(&stored)),
                    }
                }
                Phase::Streaming => match self.fetch(op).await? {
                    Fetch::Chunk(chunk) => return Ok(Some(chunk)),
                    Fetch::Retry(op) => op,
                    Fetch::Contended(stored) => return Err(owned_elsewhere(&stored)),
                },
                Phase::Polling => {
                    return Err(EngineError::NotStreamable {
                        id: op.id.clone(),
                        provider: op.provider,
                    })
                }
            };
        }
    }

    async fn fetch(&self, op: Operation) -> EngineResult<Fetch> {
        let slot = self.slot(op.provider)?;
        let Some(cursor) = op.cursor.as_deref() else {
            return Err(EngineError::CheckpointCorruption {
                id: op.id.clone(),
                reason: "streaming without a cursor".to_string(),
            });
        };

        let options = self.options(&op, CallKind::FetchPage, &slot.timing);
        let outcome = slot.client.fetch_page(cursor, &options).await;
        let now = self.clock.now();

        let mut next = op.clone();
        let chunk = match outcome {
            Ok(page) => {
                let has_more = page.next_cursor.is_some();
                let (chunk, _) = assemble_page(&page.raw, op.pages_delivered, has_more);
                next.record_page(page.next_cursor, chunk.len() as u64, now)?;
                if !has_more {
                    let summary = StreamSummary {
                        pages: next.pages_delivered,
                        items: next.items_delivered,
                    };
                    next.succeed(UnifiedResult::StreamComplete(summary), now)?;
                }
                Some(chunk)
            }
            Err(err) => {
                self.absorb(&mut next, &err, &slot.timing.retry)?;
                None
            }
        };

        Ok(match (self.commit(&op, next).await?, chunk) {
            (Commit::Stored(_), Some(chunk)) => Fetch::Chunk(chunk),
            (Commit::Stored(op), None) => Fetch::Retry(op),
            (Commit::Lost(stored), _) => Fetch::Contended(stored),
        })
    }

    /// Stop scheduling an operation, cancelling remotely when the provider can
    pub(crate) async fn cancel(&self, op: Operation) -> EngineResult<CancelOutcome> {
        let mut op = op;
        let mut remote: Option<(CancelOutcome, Option<OperationError>)> = None;

        loop {
            match op.phase {
                Phase::Cancelled => return Ok(op.cancel_outcome.unwrap_or(CancelOutcome::LocalOnly)),
                Phase::Succeeded | Phase::Failed => {
                    return Err(EngineError::AlreadyTerminal {
                        id: op.id.clone(),
                        phase: op.phase,
                    })
                }
                _ => {}
            }

            let (outcome, error) = match &remote {
                Some(done) => done.clone(),
                None => {
                    let done = self.cancel_remote(&op).await?;
                    remote = Some(done.clone());
                    done
                }
            };

            let mut next = op.clone();
            if let Some(error) = error {
                next.note_error(error);
            }
            next.cancel(outcome, self.clock.now())?;

            match self.commit(&op, next).await? {
                Commit::Stored(_) => return Ok(outcome),
                // a driver moved it meanwhile; cancel the fresh state
                Commit::Lost(stored) => op = stored,
            }
        }
    }

    async fn cancel_remote(
        &self,
        op: &Operation,
    ) -> EngineResult<(CancelOutcome, Option<OperationError>)> {
        // between stages nothing runs remotely
        let Some(external_ref) = op.current_ref().filter(|_| !op.awaiting_stage()) else {
            return Ok((CancelOutcome::LocalOnly, None));
        };
        if !op.provider.descriptor().remote_cancel {
            return Ok((CancelOutcome::LocalOnly, None));
        }

        let slot = self.slot(op.provider)?;
        let options = self.options(op, CallKind::Cancel, &slot.timing);
        match slot.client.cancel(external_ref, &options).await {
            Ok(outcome) => Ok((outcome, None)),
            Err(err) => {
                warn!(
                    "operation {} [{}]: remote cancel of {} failed, cancelling locally: {}",
                    op.id, op.provider, external_ref, err
                );
                let class = if err.is_transient() {
                    ErrorClass::TransientProvider
                } else {
                    ErrorClass::TerminalProvider
                };
                Ok((
                    CancelOutcome::LocalOnly,
                    Some(OperationError::new(class, format!("remote cancel failed: {}", err))),
                ))
            }
        }
    }
}

pub(crate) fn failure_of(op: &Operation) -> EngineError {
    EngineError::OperationFailed {
        id: op.id.clone(),
        error: op
            .last_error
            .clone()
            .unwrap_or_else(|| OperationError::new(ErrorClass::TerminalProvider, "failed")),
        partial: op.partial(),
    }
}

fn owned_elsewhere(stored: &Operation) -> EngineError {
    EngineError::OwnedElsewhere {
        id: stored.id.clone(),
        phase: stored.phase,
    }
}
