//! Shared fixtures for operation engine tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use longhaul_core::http::RequestOptions;
use longhaul_core::operation::{
    EngineBuilder, ManualClock, MemoryCheckpointStore, OperationEngine, ProviderTiming,
};
use longhaul_core::providers::azure::types::AzureTranscript;
use longhaul_core::providers::brave::types::BraveResponse;
use longhaul_core::providers::runway::types::RunwayTask;
use longhaul_core::providers::{
    CancelOutcome, ClientError, ClientResult, Page, PollOutcome, ProviderClient, ProviderKind,
    ProviderPayload, ProviderResult, RetryPolicy, StartOutcome,
};

/// Scripted provider responses and call counters
#[derive(Default)]
pub struct Script {
    starts: Mutex<VecDeque<ClientResult<StartOutcome>>>,
    polls: Mutex<VecDeque<ClientResult<PollOutcome>>>,
    pages: Mutex<VecDeque<ClientResult<Page>>>,
    cancels: Mutex<VecDeque<ClientResult<CancelOutcome>>>,
    stage_starts: Mutex<VecDeque<ClientResult<StartOutcome>>>,

    pub start_calls: AtomicUsize,
    pub poll_calls: AtomicUsize,
    pub cancel_calls: AtomicUsize,

    /// Cursors passed to `fetch_page`, in call order
    pub fetched: Mutex<Vec<String>>,

    /// Panic when `start` is called more than once
    pub single_start: AtomicBool,

    /// When set, `poll` waits for a notification before answering
    pub poll_gate: Mutex<Option<Arc<Notify>>>,

    /// When set, `start` and `start_stage` wait for a notification before answering
    pub start_gate: Mutex<Option<Arc<Notify>>>,

    /// External refs passed to `cancel`, in call order
    pub cancelled: Mutex<Vec<String>>,

    /// External refs passed to `poll`, in call order
    pub polled: Mutex<Vec<String>>,

    /// Stage outputs passed to `start_stage`, in call order
    pub stage_inputs: Mutex<Vec<String>>,
}

impl Script {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on_start(&self, outcome: ClientResult<StartOutcome>) -> &Self {
        self.starts.lock().unwrap().push_back(outcome);
        self
    }

    pub fn on_poll(&self, outcome: ClientResult<PollOutcome>) -> &Self {
        self.polls.lock().unwrap().push_back(outcome);
        self
    }

    pub fn on_page(&self, outcome: ClientResult<Page>) -> &Self {
        self.pages.lock().unwrap().push_back(outcome);
        self
    }

    pub fn on_stage_start(&self, outcome: ClientResult<StartOutcome>) -> &Self {
        self.stage_starts.lock().unwrap().push_back(outcome);
        self
    }

    pub fn on_cancel(&self, outcome: ClientResult<CancelOutcome>) -> &Self {
        self.cancels.lock().unwrap().push_back(outcome);
        self
    }

    pub fn starts(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    pub fn cancels(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }

    pub fn polled(&self) -> Vec<String> {
        self.polled.lock().unwrap().clone()
    }

    pub fn stage_inputs(&self) -> Vec<String> {
        self.stage_inputs.lock().unwrap().clone()
    }

    pub fn gate_starts(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.start_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn gate_polls(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.poll_gate.lock().unwrap() = Some(gate.clone());
        gate
    }
}

/// Provider client answering from a [`Script`]
pub struct FakeClient {
    kind: ProviderKind,
    script: Arc<Script>,
}

impl FakeClient {
    pub fn new(kind: ProviderKind, script: Arc<Script>) -> Box<Self> {
        Box::new(Self { kind, script })
    }
}

#[async_trait]
impl ProviderClient for FakeClient {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn start(
        &self,
        payload: &ProviderPayload,
        _options: &RequestOptions,
    ) -> ClientResult<StartOutcome> {
        assert_eq!(payload.provider(), self.kind, "payload routed to the wrong client");
        let calls = self.script.start_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if calls > 1 && self.script.single_start.load(Ordering::SeqCst) {
            panic!("start called {} times for a single operation", calls);
        }
        let gate = self.script.start_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.script
            .starts
            .lock()
            .unwrap()
            .pop_front()
            .expect("unscripted start call")
    }

    async fn start_stage(
        &self,
        payload: &ProviderPayload,
        input: &str,
        _options: &RequestOptions,
    ) -> ClientResult<StartOutcome> {
        assert_eq!(payload.provider(), self.kind, "payload routed to the wrong client");
        self.script.stage_inputs.lock().unwrap().push(input.to_string());
        let gate = self.script.start_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.script
            .stage_starts
            .lock()
            .unwrap()
            .pop_front()
            .expect("unscripted stage start")
    }

    async fn poll(&self, external_ref: &str, _options: &RequestOptions) -> ClientResult<PollOutcome> {
        self.script.poll_calls.fetch_add(1, Ordering::SeqCst);
        self.script.polled.lock().unwrap().push(external_ref.to_string());
        let gate = self.script.poll_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.script
            .polls
            .lock()
            .unwrap()
            .pop_front()
            .expect("unscripted poll call")
    }

    async fn cancel(&self, external_ref: &str, _options: &RequestOptions) -> ClientResult<CancelOutcome> {
        self.script.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.script.cancelled.lock().unwrap().push(external_ref.to_string());
        self.script
            .cancels
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(CancelOutcome::Remote))
    }

    async fn fetch_page(&self, cursor: &str, _options: &RequestOptions) -> ClientResult<Page> {
        self.script.fetched.lock().unwrap().push(cursor.to_string());
        self.script
            .pages
            .lock()
            .unwrap()
            .pop_front()
            .expect("unscripted page fetch")
    }
}

/// Timing with fast, jitter-free retries
pub fn timing(max_retries: u32) -> ProviderTiming {
    ProviderTiming {
        retry: RetryPolicy {
            max_retries,
            initial_delay_ms: 1000,
            max_delay_ms: 8000,
            exponential_base: 2.0,
            jitter_factor: 0.0,
            respect_retry_after: true,
        },
        poll_interval: Duration::from_secs(5),
        request_timeout: Duration::from_secs(30),
    }
}

pub struct Harness {
    pub engine: OperationEngine,
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryCheckpointStore>,
    pub script: Arc<Script>,
}

impl Harness {
    pub fn new(kind: ProviderKind) -> Self {
        Self::with_timing(kind, timing(3))
    }

    pub fn with_timing(kind: ProviderKind, timing: ProviderTiming) -> Self {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryCheckpointStore::new());
        let script = Script::new();
        let engine = engine_on(kind, &script, &clock, &store, timing);
        Self {
            engine,
            clock,
            store,
            script,
        }
    }

    /// A second engine on the same store, clock and script
    pub fn restarted(&self, kind: ProviderKind) -> OperationEngine {
        engine_on(kind, &self.script, &self.clock, &self.store, timing(3))
    }
}

pub fn engine_on(
    kind: ProviderKind,
    script: &Arc<Script>,
    clock: &Arc<ManualClock>,
    store: &Arc<MemoryCheckpointStore>,
    timing: ProviderTiming,
) -> OperationEngine {
    EngineBuilder::new()
        .store(store.clone())
        .clock(clock.clone())
        .provider_with(FakeClient::new(kind, script.clone()), timing)
        .build()
}

pub fn runway_task(id: &str, status: &str, output: &[&str]) -> ProviderResult {
    let task: RunwayTask = serde_json::from_value(serde_json::json!({
        "id": id,
        "status": status,
        "output": output,
    }))
    .unwrap();
    ProviderResult::Runway(task)
}

pub fn azure_transcript() -> ProviderResult {
    let transcript: AzureTranscript = serde_json::from_value(serde_json::json!({
        "durationInTicks": 42_000_000u64,
        "combinedRecognizedPhrases": [{ "channel": 0, "display": "Hello there. General Kenobi." }],
        "recognizedPhrases": [
            {
                "channel": 0,
                "speaker": 1,
                "offsetInTicks": 0,
                "durationInTicks": 12_000_000u64,
                "locale": "en-US",
                "nBest": [{ "confidence": 0.93, "display": "Hello there." }]
            },
            {
                "channel": 0,
                "speaker": 2,
                "offsetInTicks": 15_000_000u64,
                "durationInTicks": 20_000_000u64,
                "locale": "en-US",
                "nBest": [{ "confidence": 0.88, "display": "General Kenobi." }]
            }
        ]
    }))
    .unwrap();
    ProviderResult::Azure(transcript)
}

pub fn brave_page(urls: &[&str], more: bool) -> ProviderResult {
    let results: Vec<_> = urls
        .iter()
        .map(|url| {
            serde_json::json!({
                "title": format!("Result for {}", url),
                "url": url,
                "description": "snippet",
                "age": "2 days ago"
            })
        })
        .collect();
    let response: BraveResponse = serde_json::from_value(serde_json::json!({
        "type": "search",
        "query": { "original": "rust async", "more_results_available": more },
        "web": { "results": results }
    }))
    .unwrap();
    ProviderResult::Brave(response)
}

pub fn rate_limited(secs: u64) -> ClientError {
    ClientError::RateLimit {
        retry_after: Some(Duration::from_secs(secs)),
    }
}
