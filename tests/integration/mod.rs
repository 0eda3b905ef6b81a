// Integration test utilities and common code
// WHY: Centralized utilities avoid duplication across integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use originality_scan::{
    RemoteScanClient, ScanConfig, ScanError, ScanEvent, ScanHandle, ScanRequest, ScanResult,
    ScanScheduler,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

/// One request seen by the scripted client
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub at: Instant,
    pub request: ScanRequest,
}

/// In-memory scanning service that replays queued outcomes in order.
/// Once the queue is empty every call succeeds with `default_result`.
pub struct ScriptedScanClient {
    outcomes: Mutex<VecDeque<Result<ScanResult, ScanError>>>,
    calls: Mutex<Vec<RecordedCall>>,
    latency: Duration,
}

impl ScriptedScanClient {
    pub fn new() -> Arc<Self> {
        Self::with_latency(Duration::ZERO)
    }

    /// Every call takes `latency` of tokio time before answering
    pub fn with_latency(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            latency,
        })
    }

    pub fn push_outcome(&self, outcome: Result<ScanResult, ScanError>) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl RemoteScanClient for ScriptedScanClient {
    async fn scan(&self, request: ScanRequest) -> Result<ScanResult, ScanError> {
        self.calls.lock().unwrap().push(RecordedCall {
            at: Instant::now(),
            request,
        });
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let next = self.outcomes.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(default_result()))
    }
}

/// Score 92, no matches
pub fn default_result() -> ScanResult {
    scored_result(92.0)
}

pub fn scored_result(score: f64) -> ScanResult {
    ScanResult {
        overall_score: score,
        matches: vec![],
        words_scanned: 4,
    }
}

pub fn auto_scan_config() -> ScanConfig {
    ScanConfig {
        auto_scan_enabled: true,
        ..ScanConfig::default()
    }
}

/// A running scheduler plus an event subscription taken before any command
pub struct TestSession {
    pub handle: ScanHandle,
    pub events: broadcast::Receiver<ScanEvent>,
    pub client: Arc<ScriptedScanClient>,
    pub started: Instant,
}

impl TestSession {
    pub fn start(config: ScanConfig, client: Arc<ScriptedScanClient>) -> Self {
        Self::start_with_content(config, client, "")
    }

    pub fn start_with_content(
        config: ScanConfig,
        client: Arc<ScriptedScanClient>,
        content: &str,
    ) -> Self {
        let started = Instant::now();
        let handle = ScanScheduler::spawn("project-1", content, config, client.clone());
        let events = handle.subscribe();
        Self {
            handle,
            events,
            client,
            started,
        }
    }

    /// Wait for the first event matching `wanted`, skipping others.
    /// Panics if nothing matches within ten minutes of (paused) tokio time.
    pub async fn wait_for(&mut self, wanted: impl Fn(&ScanEvent) -> bool) -> ScanEvent {
        let events = &mut self.events;
        tokio::time::timeout(Duration::from_secs(600), async {
            loop {
                match events.recv().await {
                    Ok(event) if wanted(&event) => return event,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => panic!("event stream closed"),
                }
            }
        })
        .await
        .expect("expected scan event never arrived")
    }

    pub async fn wait_completed(&mut self) -> Arc<ScanResult> {
        match self
            .wait_for(|e| matches!(e, ScanEvent::ScanCompleted(_)))
            .await
        {
            ScanEvent::ScanCompleted(result) => result,
            _ => unreachable!(),
        }
    }

    /// Let the scheduler drain its queue without moving the clock
    pub async fn settle(&self) {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    /// Milliseconds since the session started, on tokio's clock
    pub fn elapsed_ms(&self, at: Instant) -> u128 {
        (at - self.started).as_millis()
    }
}
