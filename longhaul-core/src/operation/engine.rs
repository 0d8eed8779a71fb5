//! Caller-facing operation engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::checkpoint::{CheckpointStore, MemoryCheckpointStore};
use super::clock::{after, Clock, SystemClock};
use super::error::{EngineError, EngineResult};
use super::machine::{failure_of, OperationMachine, ProviderSlot, ProviderTiming, Step};
use super::model::{Operation, OperationError, OperationId, PartialProgress, Phase};
use crate::config::{ConfigError, ConfigValidator, LonghaulConfig};
use crate::http::HttpClient;
use crate::protocol::{OperationKind, UnifiedChunk, UnifiedRequest, UnifiedResult};
use crate::providers::{CancelOutcome, ProviderClient, ProviderKind};

/// Reference to a submitted operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationHandle {
    pub id: OperationId,
    pub provider: ProviderKind,
    pub kind: OperationKind,
}

impl OperationHandle {
    fn of(op: &Operation) -> Self {
        Self {
            id: op.id().clone(),
            provider: op.provider(),
            kind: op.kind(),
        }
    }
}

/// Snapshot of an operation as the caller sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationStatus {
    pub id: OperationId,
    pub provider: ProviderKind,
    pub phase: Phase,
    pub result: Option<UnifiedResult>,
    pub error: Option<OperationError>,
    pub attempt: u32,
    pub external_ref: Option<String>,

    /// Job of the latest follow-up stage, for multi-stage operations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_ref: Option<String>,

    /// Page progress, for paginated operations
    pub partial: Option<PartialProgress>,

    /// Earliest time the next provider call will be made
    pub not_before: Option<DateTime<Utc>>,
}

impl From<&Operation> for OperationStatus {
    fn from(op: &Operation) -> Self {
        Self {
            id: op.id().clone(),
            provider: op.provider(),
            phase: op.phase(),
            result: op.result().cloned(),
            error: op.last_error().cloned(),
            attempt: op.attempt(),
            external_ref: op.external_ref().map(str::to_string),
            stage_ref: op.stage_ref().map(str::to_string),
            partial: op
                .provider()
                .descriptor()
                .is_paginated()
                .then(|| op.partial()),
            not_before: op.not_before(),
        }
    }
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }
}

/// Builder for [`OperationEngine`]
pub struct EngineBuilder {
    store: Option<Arc<dyn CheckpointStore>>,
    clock: Arc<dyn Clock>,
    providers: HashMap<ProviderKind, ProviderSlot>,
    retention: Option<Duration>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            store: None,
            clock: Arc::new(SystemClock),
            providers: HashMap::new(),
            retention: None,
        }
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Register a client with default timing
    pub fn provider(self, client: Box<dyn ProviderClient>) -> Self {
        self.provider_with(client, ProviderTiming::default())
    }

    pub fn provider_with(mut self, client: Box<dyn ProviderClient>, timing: ProviderTiming) -> Self {
        self.providers
            .insert(client.kind(), ProviderSlot { client, timing });
        self
    }

    /// Override every provider's retention window for garbage collection
    pub fn retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    pub fn build(self) -> OperationEngine {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryCheckpointStore::new()));
        OperationEngine {
            machine: OperationMachine::new(store, self.clock, self.providers),
            retention: self.retention,
        }
    }
}

/// Durable driver of provider operations
///
/// All state lives in the checkpoint store; any number of engines sharing a
/// store may drive the same operations, and a fresh engine picks up where a
/// crashed one stopped.
pub struct OperationEngine {
    machine: OperationMachine,
    retention: Option<Duration>,
}

impl OperationEngine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Build an engine with one client per enabled provider account
    pub fn from_config(config: &LonghaulConfig, store: Arc<dyn CheckpointStore>) -> EngineResult<Self> {
        ConfigValidator::new()?
            .validate(config)
            .map_err(ConfigError::from)?;

        let http = HttpClient::from_connection(&config.connection)?;
        let mut builder = EngineBuilder::new().store(store);

        for settings in config.providers.iter().filter(|p| p.enabled) {
            let client = settings.kind.create_client(settings, http.clone())?;
            let timing = ProviderTiming {
                retry: settings.retry_policy.clone(),
                poll_interval: config.poll_interval(settings),
                request_timeout: config.request_timeout(settings),
            };
            info!(
                "registered provider '{}' ({}) with key {}",
                settings.name,
                settings.kind,
                settings.api_key.partial_redact()
            );
            builder = builder.provider_with(client, timing);
        }

        if let Some(retention) = config.durability.retention() {
            builder = builder.retention(retention);
        }
        Ok(builder.build())
    }

    /// Record a new operation in `Created`; no provider call is made
    ///
    /// Submitting an existing id with the same request returns its handle.
    pub async fn submit(
        &self,
        id: OperationId,
        provider: ProviderKind,
        request: impl Into<UnifiedRequest>,
    ) -> EngineResult<OperationHandle> {
        if !self.machine.has_provider(provider) {
            return Err(EngineError::UnknownProvider { provider });
        }

        let op = Operation::new(id, provider, request.into(), self.machine.clock().now());
        if self.machine.insert(&op).await? {
            info!(
                "operation {} [{}]: created {}",
                op.id(),
                provider,
                op.kind()
            );
            return Ok(OperationHandle::of(&op));
        }

        let existing = self.machine.load(op.id()).await?;
        if existing.provider() == provider && existing.request() == op.request() {
            Ok(OperationHandle::of(&existing))
        } else {
            Err(EngineError::DuplicateOperation { id: op.id().clone() })
        }
    }

    /// Stored status, no provider call
    pub async fn status(&self, handle: &OperationHandle) -> EngineResult<OperationStatus> {
        let op = self.machine.load(&handle.id).await?;
        Ok(OperationStatus::from(&op))
    }

    /// Advance at most one step if the operation is due, then report
    pub async fn poll(&self, handle: &OperationHandle) -> EngineResult<OperationStatus> {
        let op = self.machine.load(&handle.id).await?;
        let op = self.machine.step(op).await?.into_operation();
        Ok(OperationStatus::from(&op))
    }

    /// Drive the operation until it is terminal, suspending between calls
    ///
    /// Paginated operations stop once submitted; their pages come from
    /// [`OperationEngine::stream_next`]. Stops early when another driver
    /// owns the operation.
    pub async fn run(&self, handle: &OperationHandle) -> EngineResult<OperationStatus> {
        let mut op = self.machine.load(&handle.id).await?;
        loop {
            if op.phase().is_terminal() {
                return Ok(OperationStatus::from(&op));
            }
            if let Some(at) = op.not_before() {
                self.machine.clock().sleep_until(at).await;
            }

            op = match self.machine.step(op).await? {
                Step::Progressed(op) => op,
                Step::Contended(stored) => return Ok(OperationStatus::from(&stored)),
                Step::Idle(op) if op.is_due(self.machine.clock().now()) => {
                    return Ok(OperationStatus::from(&op))
                }
                Step::Idle(op) => op,
            };
        }
    }

    /// Next page of a paginated operation, `None` once the sequence ended
    pub async fn stream_next(&self, handle: &OperationHandle) -> EngineResult<Option<UnifiedChunk>> {
        let op = self.machine.load(&handle.id).await?;
        self.machine.next_chunk(op).await
    }

    /// Stop the operation; remote cancellation is attempted where supported
    ///
    /// A failed remote cancel still cancels locally and reports `LocalOnly`.
    pub async fn cancel(&self, handle: &OperationHandle) -> EngineResult<CancelOutcome> {
        let op = self.machine.load(&handle.id).await?;
        self.machine.cancel(op).await
    }

    /// Restart procedure for one stored operation
    ///
    /// `Created` re-runs submission, `Submitted` and `Polling` resume polling
    /// with the stored reference, everything else is reported as stored.
    pub async fn resume(&self, id: &OperationId) -> EngineResult<(OperationHandle, OperationStatus)> {
        let op = self.machine.load(id).await?;
        let handle = OperationHandle::of(&op);
        if op.phase().is_terminal() {
            return Ok((handle, OperationStatus::from(&op)));
        }

        let op = self.machine.step(op).await?.into_operation();
        Ok((handle, OperationStatus::from(&op)))
    }

    /// Resume every stored, non-terminal operation
    ///
    /// Corrupt checkpoints are logged and left in place.
    pub async fn resume_all(&self) -> EngineResult<Vec<(OperationHandle, OperationStatus)>> {
        let mut resumed = Vec::new();
        for id in self.machine.store().list_ids().await? {
            match self.resume(&id).await {
                Ok(entry) => resumed.push(entry),
                Err(EngineError::CheckpointCorruption { id, reason }) => {
                    error!("operation {}: not resumed, checkpoint corrupt: {}", id, reason);
                }
                Err(EngineError::UnknownProvider { provider }) => {
                    warn!("operation {}: not resumed, no client for {}", id, provider);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(resumed)
    }

    /// Result of a succeeded operation, or its failure
    pub async fn outcome(&self, handle: &OperationHandle) -> EngineResult<Option<UnifiedResult>> {
        let op = self.machine.load(&handle.id).await?;
        match op.phase() {
            Phase::Failed => Err(failure_of(&op)),
            _ => Ok(op.result().cloned()),
        }
    }

    /// Forget a terminal operation the caller has observed
    pub async fn acknowledge(&self, handle: &OperationHandle) -> EngineResult<()> {
        let op = self.machine.load(&handle.id).await?;
        if !op.phase().is_terminal() {
            return Err(EngineError::NotTerminal {
                id: op.id().clone(),
                phase: op.phase(),
            });
        }
        self.machine.store().remove(op.id()).await?;
        info!("operation {} [{}]: acknowledged", op.id(), op.provider());
        Ok(())
    }

    /// Remove operations older than their retention window
    ///
    /// The window is the provider's own unless overridden in configuration.
    pub async fn collect_expired(&self) -> EngineResult<Vec<OperationId>> {
        let now = self.machine.clock().now();
        let mut removed = Vec::new();

        for id in self.machine.store().list_ids().await? {
            let op = match self.machine.load(&id).await {
                Ok(op) => op,
                Err(EngineError::CheckpointCorruption { reason, .. }) => {
                    warn!("operation {}: skipping corrupt checkpoint: {}", id, reason);
                    continue;
                }
                Err(EngineError::NotFound { .. }) => continue,
                Err(err) => return Err(err),
            };

            let retention = self
                .retention
                .unwrap_or(op.provider().descriptor().retention);
            if after(op.created_at(), retention) <= now && self.machine.store().remove(&id).await? {
                info!(
                    "operation {} [{}]: expired in {}",
                    id,
                    op.provider(),
                    op.phase()
                );
                removed.push(id);
            }
        }
        Ok(removed)
    }
}
