// WHY: The scheduler is a single task that owns the ScanSession and the debounce
// timer and handles one event at a time. At most one remote call is in flight;
// that is enforced by the session's transition rules, not by a lock.

use serde::Serialize;
use std::future::pending;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::client::{RemoteScanClient, ScanRequest};
use crate::config::ScanConfig;
use crate::error::{ScanError, ScanErrorKind, SessionClosed};
use crate::guard::{GuardDecision, RescanSafetyGuard};
use crate::hasher::ContentHash;
use crate::model::ScanResult;
use crate::session::{Completion, ScanSession, ScanSnapshot, ScanStatus};
use crate::timer::DebounceTimer;

const EVENT_CAPACITY: usize = 64;

/// Notifications for rendering surfaces
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    StatusChanged(ScanStatus),
    ScanStarted,
    ScanCompleted(Arc<ScanResult>),
    /// Content matched the last scan; no remote call was made
    CacheHit(Arc<ScanResult>),
    /// Rescan of near-duplicate content needs `confirm_rescan` or `decline_rescan`
    ConfirmationRequired { similarity: u8 },
    UpgradeRequired { message: String },
    Advisory { message: String },
    ScanFailed { message: String },
    /// Manual scan of blank content was ignored
    EmptyContent,
}

/// Read-only view of the session, republished after every transition
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub status: ScanStatus,
    pub auto_scan_enabled: bool,
    pub last_result: Option<Arc<ScanResult>>,
}

#[derive(Debug)]
enum SchedulerCommand {
    ContentChanged(Arc<str>),
    ScanNow,
    SetAutoScan(bool),
    ConfirmRescan,
    DeclineRescan,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Auto,
    Manual,
}

/// Consumer side of a scan session. Cloning shares the same session;
/// the session is torn down on `shutdown` or when every handle is dropped.
#[derive(Debug, Clone)]
pub struct ScanHandle {
    commands: mpsc::UnboundedSender<SchedulerCommand>,
    events: broadcast::Sender<ScanEvent>,
    view: watch::Receiver<SessionView>,
}

impl ScanHandle {
    fn send(&self, command: SchedulerCommand) -> Result<(), SessionClosed> {
        self.commands.send(command).map_err(|_| SessionClosed)
    }

    /// Editor text changed
    pub fn content_changed(&self, content: impl Into<Arc<str>>) -> Result<(), SessionClosed> {
        self.send(SchedulerCommand::ContentChanged(content.into()))
    }

    /// Skip the debounce and scan the current content now. No-op while scanning.
    pub fn scan_now(&self) -> Result<(), SessionClosed> {
        self.send(SchedulerCommand::ScanNow)
    }

    pub fn set_auto_scan(&self, enabled: bool) -> Result<(), SessionClosed> {
        self.send(SchedulerCommand::SetAutoScan(enabled))
    }

    pub fn confirm_rescan(&self) -> Result<(), SessionClosed> {
        self.send(SchedulerCommand::ConfirmRescan)
    }

    pub fn decline_rescan(&self) -> Result<(), SessionClosed> {
        self.send(SchedulerCommand::DeclineRescan)
    }

    /// Tear the session down. Pending timers are cancelled; an in-flight
    /// result is discarded when it arrives.
    pub fn shutdown(&self) -> Result<(), SessionClosed> {
        self.send(SchedulerCommand::Shutdown)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.events.subscribe()
    }

    pub fn watch_session(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Snapshot of the current session view
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Resolves once the scheduler task has exited
    pub async fn closed(&self) {
        self.commands.closed().await
    }
}

struct InFlightScan {
    snapshot: ScanSnapshot,
    outcome: oneshot::Receiver<Result<ScanResult, ScanError>>,
}

/// Debounced, cache-aware scan state machine
pub struct ScanScheduler {
    project_id: String,
    config: ScanConfig,
    auto_scan: bool,
    guard: RescanSafetyGuard,
    client: Arc<dyn RemoteScanClient>,
    session: ScanSession,
    timer: DebounceTimer,
    in_flight: Option<InFlightScan>,
    awaiting_confirmation: Option<ContentHash>,
    commands: mpsc::UnboundedReceiver<SchedulerCommand>,
    events: broadcast::Sender<ScanEvent>,
    view: watch::Sender<SessionView>,
    published_status: ScanStatus,
}

impl ScanScheduler {
    /// Start a session on the current tokio runtime
    pub fn spawn(
        project_id: impl Into<String>,
        initial_content: impl Into<Arc<str>>,
        config: ScanConfig,
        client: Arc<dyn RemoteScanClient>,
    ) -> ScanHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (view_tx, view_rx) = watch::channel(SessionView {
            auto_scan_enabled: config.auto_scan_enabled,
            ..SessionView::default()
        });

        let scheduler = ScanScheduler {
            project_id: project_id.into(),
            auto_scan: config.auto_scan_enabled,
            guard: RescanSafetyGuard::new(config.rescan_similarity_threshold),
            config,
            client,
            session: ScanSession::new(initial_content),
            timer: DebounceTimer::new(),
            in_flight: None,
            awaiting_confirmation: None,
            commands: command_rx,
            events: event_tx.clone(),
            view: view_tx,
            published_status: ScanStatus::Idle,
        };
        tokio::spawn(scheduler.run());

        ScanHandle {
            commands: command_tx,
            events: event_tx,
            view: view_rx,
        }
    }

    async fn run(mut self) {
        info!(project_id = %self.project_id, auto_scan = self.auto_scan, "Scan session started");
        if self.auto_scan {
            self.react_to_content();
        }

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(SchedulerCommand::ContentChanged(content)) => self.on_content_changed(content),
                    Some(SchedulerCommand::ScanNow) => self.on_manual_scan(),
                    Some(SchedulerCommand::SetAutoScan(enabled)) => self.on_auto_scan_toggled(enabled),
                    Some(SchedulerCommand::ConfirmRescan) => self.on_rescan_confirmed(),
                    Some(SchedulerCommand::DeclineRescan) => self.on_rescan_declined(),
                    Some(SchedulerCommand::Shutdown) | None => break,
                },
                (snapshot, outcome) = wait_for_scan(&mut self.in_flight) => {
                    self.on_scan_finished(snapshot, outcome);
                }
                () = self.timer.fired() => self.on_debounce_elapsed(),
            }
        }

        if self.timer.cancel() {
            debug!("Cancelled pending auto-scan on teardown");
        }
        if self.in_flight.take().is_some() {
            debug!("Scan still in flight on teardown; its result will be discarded");
        }
        info!(project_id = %self.project_id, "Scan session ended");
    }

    fn on_content_changed(&mut self, content: Arc<str>) {
        self.session.update_content(content);
        if self.auto_scan && !self.session.is_scanning() {
            self.react_to_content();
        }
    }

    /// Auto-scan reaction to the current content: cache hit, debounce, or settle
    fn react_to_content(&mut self) {
        self.timer.cancel();

        if self.session.current_content().trim().is_empty() {
            if self.session.status() == ScanStatus::Typing {
                self.transition(|s| s.settle_idle());
            }
            return;
        }

        let hash = self.session.current_hash();
        if self.session.cached_result_for(hash).is_some() {
            self.transition(|s| s.serve_cache().map(|_| ()));
            return;
        }

        self.transition(|s| s.start_typing());
        self.timer.arm(self.config.debounce());
        debug!(hash = %hash.short(), debounce_ms = self.config.debounce_ms, "Auto-scan armed");
    }

    fn on_debounce_elapsed(&mut self) {
        if self.auto_scan {
            self.guarded_scan(Trigger::Auto);
        }
    }

    fn on_manual_scan(&mut self) {
        if self.session.is_scanning() {
            debug!("Manual scan ignored: scan already in flight");
            return;
        }
        self.timer.cancel();
        self.guarded_scan(Trigger::Manual);
    }

    fn on_auto_scan_toggled(&mut self, enabled: bool) {
        if self.auto_scan == enabled {
            return;
        }
        self.auto_scan = enabled;
        info!(enabled, "Auto-scan toggled");

        if !enabled {
            if self.timer.cancel() {
                debug!("Pending auto-scan cancelled");
            }
        } else if !self.session.is_scanning() {
            self.react_to_content();
        }
        self.publish();
    }

    fn on_rescan_confirmed(&mut self) {
        let Some(confirmed) = self.awaiting_confirmation.take() else {
            debug!("No rescan awaiting confirmation");
            return;
        };
        if self.session.is_scanning() {
            return;
        }

        if confirmed == self.session.current_hash() {
            info!("Rescan confirmed by user");
            self.start_scan();
        } else {
            debug!("Content changed since confirmation was requested; re-evaluating");
            self.guarded_scan(Trigger::Manual);
        }
    }

    fn on_rescan_declined(&mut self) {
        if self.awaiting_confirmation.take().is_some() {
            debug!("Rescan declined by user");
        }
    }

    /// Cache check, rescan guard, then the remote call
    fn guarded_scan(&mut self, trigger: Trigger) {
        if self.session.is_scanning() {
            return;
        }

        let content = Arc::clone(self.session.current_content());
        if content.trim().is_empty() {
            match trigger {
                Trigger::Manual => self.emit(ScanEvent::EmptyContent),
                Trigger::Auto => self.transition(|s| s.settle_idle()),
            }
            return;
        }

        match self.guard.evaluate(&content, &self.session) {
            GuardDecision::ServeCache(_) => match self.session.serve_cache() {
                Ok(result) => {
                    info!(?trigger, "Smart cache hit: skipping remote scan");
                    self.publish();
                    self.emit(ScanEvent::CacheHit(result));
                }
                Err(e) => warn!(error = %e, "Cache hit could not be served"),
            },
            GuardDecision::AskConfirmation { similarity } => {
                info!(similarity, ?trigger, "Rescan needs confirmation");
                // Debounce already elapsed; nothing is pending while the user decides
                if self.session.status() == ScanStatus::Typing {
                    self.transition(|s| s.settle_idle());
                }
                self.awaiting_confirmation = Some(self.session.current_hash());
                self.emit(ScanEvent::ConfirmationRequired { similarity });
            }
            GuardDecision::Proceed => self.start_scan(),
        }
    }

    fn start_scan(&mut self) {
        self.timer.cancel();
        let snapshot = match self.session.begin_scan() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Scan not started");
                return;
            }
        };
        self.awaiting_confirmation = None;
        self.publish();

        let request = ScanRequest {
            project_id: self.project_id.clone(),
            content: snapshot.content.to_string(),
        };
        let client = Arc::clone(&self.client);
        let timeout = self.config.request_timeout();
        let (outcome_tx, outcome_rx) = oneshot::channel();

        info!(hash = %snapshot.hash.short(), chars = snapshot.content.chars().count(), "Starting originality scan");
        tokio::spawn(async move {
            let outcome = match timeout {
                Some(limit) => tokio::time::timeout(limit, client.scan(request))
                    .await
                    .unwrap_or_else(|_| {
                        Err(ScanError::generic(format!(
                            "Scan timed out after {}ms",
                            limit.as_millis()
                        )))
                    }),
                None => client.scan(request).await,
            };
            // Receiver is gone once the session has been torn down
            if outcome_tx.send(outcome).is_err() {
                debug!("Scan session torn down; discarding result");
            }
        });

        self.in_flight = Some(InFlightScan {
            snapshot,
            outcome: outcome_rx,
        });
        self.emit(ScanEvent::ScanStarted);
    }

    fn on_scan_finished(&mut self, snapshot: ScanSnapshot, outcome: Result<ScanResult, ScanError>) {
        match outcome {
            Ok(result) => {
                let result = Arc::new(result);
                match self.session.complete_scan(snapshot, Arc::clone(&result)) {
                    Ok(Completion::Current) => {
                        info!(
                            score = result.overall_score,
                            matches = result.matches.len(),
                            words = result.words_scanned,
                            "Scan complete"
                        );
                    }
                    Ok(Completion::Stale) => {
                        info!(score = result.overall_score, "Scan complete; content changed meanwhile");
                        if self.auto_scan {
                            self.react_to_content();
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Discarding scan result");
                        return;
                    }
                }
                self.publish();
                self.emit(ScanEvent::ScanCompleted(result));
            }
            Err(err) => {
                warn!(kind = %err.kind(), message = err.message(), "Scan failed");
                if let Err(e) = self.session.fail_scan() {
                    warn!(error = %e, "Unexpected scan failure state");
                }
                self.publish();

                let message = err.message().to_string();
                self.emit(match err.kind() {
                    ScanErrorKind::LimitReached => ScanEvent::UpgradeRequired { message },
                    ScanErrorKind::Maintenance => ScanEvent::Advisory { message },
                    ScanErrorKind::Generic => ScanEvent::ScanFailed { message },
                });
            }
        }
    }

    /// Apply a session transition and publish the new state
    fn transition<F>(&mut self, apply: F)
    where
        F: FnOnce(&mut ScanSession) -> Result<(), crate::error::SessionError>,
    {
        if let Err(e) = apply(&mut self.session) {
            warn!(error = %e, "Rejected scan transition");
        }
        self.publish();
    }

    fn publish(&mut self) {
        let status = self.session.status();
        if status != self.published_status {
            self.published_status = status;
            self.emit(ScanEvent::StatusChanged(status));
        }
        self.view.send_replace(SessionView {
            status,
            auto_scan_enabled: self.auto_scan,
            last_result: self.session.last_result().cloned(),
        });
    }

    fn emit(&self, event: ScanEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Resolves when the in-flight scan reports back; never resolves when idle
async fn wait_for_scan(
    slot: &mut Option<InFlightScan>,
) -> (ScanSnapshot, Result<ScanResult, ScanError>) {
    let Some(scan) = slot.as_mut() else {
        return pending().await;
    };
    let outcome = (&mut scan.outcome)
        .await
        .unwrap_or_else(|_| Err(ScanError::generic("Scan task ended without a result")));
    let snapshot = scan.snapshot.clone();
    *slot = None;
    (snapshot, outcome)
}
