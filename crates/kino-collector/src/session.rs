//! Analytics Session - async orchestrator for one player registration
//!
//! Coordinates:
//! - Licensing handshake and sample gating
//! - State machine dispatch, serialized behind a mutex
//! - The deferred seeked/pause confirmation timer
//! - Sample delivery through the transport
//! - Page unload

use crate::{
    adapter::PlaybackInfo,
    aggregator::SampleAggregator,
    config::CollectorConfig,
    lifecycle::{LifecycleSink, UnloadGuard},
    licensing::{Admission, GateState, LicenseRequest, LicensingGate},
    machine::{MachineProfile, Outcome, StateLog, StateMachine, TransitionRecord},
    sample::{Delivery, QueuedSample},
    transport::Transport,
    types::{CanonicalEvent, Event, EventPayload, PlayerKind, State, Timestamp},
    Error, Result,
};
use async_trait::async_trait;
use chrono::Utc;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Current wall-clock time in ms since the epoch
pub fn now_ms() -> Timestamp {
    Utc::now().timestamp_millis().max(0) as Timestamp
}

/// Mutable session state, guarded by one lock
struct Inner {
    machine: StateMachine<SampleAggregator>,
    gate: LicensingGate,
    /// Task confirming the deferred pause
    timer: Option<JoinHandle<()>>,
}

impl Inner {
    fn call_event(
        &mut self,
        kind: CanonicalEvent,
        payload: &EventPayload,
        ts: Timestamp,
    ) -> Outcome {
        let state = self.machine.state();
        let machine = &mut self.machine;
        match catch_unwind(AssertUnwindSafe(|| machine.call_event(kind, payload, ts))) {
            Ok(outcome) => outcome,
            Err(panic) => {
                error!(
                    event = %kind,
                    state = %state,
                    panic = panic_message(&*panic),
                    "Callback panicked, event dropped"
                );
                Outcome::Ignored { state }
            }
        }
    }

    fn fire_due_timers(&mut self, now: Timestamp) -> Option<Outcome> {
        let machine = &mut self.machine;
        match catch_unwind(AssertUnwindSafe(|| machine.fire_due_timers(now))) {
            Ok(outcome) => outcome,
            Err(panic) => {
                error!(panic = panic_message(&*panic), "Callback panicked in deferred event");
                None
            }
        }
    }

    /// Samples cleared by the licensing gate for sending now
    fn take_outgoing(&mut self) -> Vec<QueuedSample> {
        let mut outgoing = Vec::new();
        for queued in self.machine.callbacks_mut().drain_samples() {
            match self.gate.admit(queued) {
                Admission::Send(sample) => outgoing.push(sample),
                Admission::Queued => debug!("Sample held until license check completes"),
                Admission::Discarded => debug!("Sample discarded"),
            }
        }
        outgoing
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Parts of the session shared with the timer task
struct Shared {
    inner: Mutex<Inner>,
    transport: Arc<dyn Transport>,
    state_tx: watch::Sender<State>,
}

impl Shared {
    async fn deliver(&self, outgoing: Vec<QueuedSample>) {
        for queued in outgoing {
            let result = match queued.delivery {
                Delivery::Regular => self.transport.send_sample(&queued.sample).await,
                Delivery::Unload => self.transport.send_unload_sample(&queued.sample).await,
            };
            if let Err(e) = result {
                warn!(
                    error = %e,
                    code = e.error_code(),
                    sequence = queued.sample.sequence_number,
                    "Failed to send sample"
                );
            }
        }
    }

    async fn fire_timer(&self, due: Timestamp) {
        let outgoing = {
            let mut inner = self.inner.lock().await;
            inner.timer = None;
            if let Some(outcome) = inner.fire_due_timers(due) {
                debug!(?outcome, "Deferred event fired");
            }
            self.state_tx.send_replace(inner.machine.state());
            inner.take_outgoing()
        };
        self.deliver(outgoing).await;
    }
}

/// Replace the deferred-event timer with one matching the machine's deadline
fn reschedule_timer(shared: &Arc<Shared>, inner: &mut Inner, now: Timestamp) {
    if let Some(handle) = inner.timer.take() {
        handle.abort();
    }
    let Some(due) = inner.machine.pending_deadline() else {
        return;
    };

    let delay = Duration::from_millis(due.saturating_sub(now));
    let shared = Arc::clone(shared);
    inner.timer = Some(tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        shared.fire_timer(due).await;
    }));
}

/// Analytics session for a single player
pub struct AnalyticsSession {
    /// Unique session ID
    id: Uuid,
    /// Session configuration
    config: CollectorConfig,
    /// Machine, gate and timer
    shared: Arc<Shared>,
    /// Page-unload once flag, shared with the adapter hooks
    unload: Arc<UnloadGuard>,
}

impl AnalyticsSession {
    /// Create a session. Samples are held until [`start`](Self::start)
    /// resolves the license.
    pub fn new(
        config: CollectorConfig,
        profile: MachineProfile,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        Self::build(config, profile, transport, LicensingGate::new(), None)
    }

    /// Create a session that sends without a license check
    pub fn unlicensed(
        config: CollectorConfig,
        profile: MachineProfile,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        Self::build(config, profile, transport, LicensingGate::open(), None)
    }

    /// Session for a player engine, profile picked from its family
    pub fn for_player(
        config: CollectorConfig,
        kind: PlayerKind,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let profile = MachineProfile::for_player(kind);
        Self::build(config, profile, transport, LicensingGate::new(), Some(kind))
    }

    fn build(
        config: CollectorConfig,
        profile: MachineProfile,
        transport: Arc<dyn Transport>,
        gate: LicensingGate,
        player: Option<PlayerKind>,
    ) -> Result<Self> {
        config.validate()?;

        let profile = profile.with_config(&config);
        let log = match config.log_capacity() {
            Some(capacity) => StateLog::with_capacity(capacity),
            None => StateLog::unbounded(),
        };
        let mut aggregator = SampleAggregator::new(&config);
        if let Some(kind) = player {
            aggregator.set_player(kind.as_str());
        }
        let machine = StateMachine::new(profile, aggregator, now_ms()).with_log(log);
        let (state_tx, _) = watch::channel(machine.state());

        let id = Uuid::new_v4();
        info!(session_id = %id, profile = machine.profile().name, "Analytics session created");

        Ok(Self {
            id,
            config,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    machine,
                    gate,
                    timer: None,
                }),
                transport,
                state_tx,
            }),
            unload: Arc::new(UnloadGuard::new()),
        })
    }

    /// Restart the machine clock, e.g. when the player registers later than
    /// the session was built
    pub async fn reset_clock(&self, start: Timestamp) {
        let mut inner = self.shared.inner.lock().await;
        let profile = inner.machine.profile().clone();
        let log = inner.machine.log().clone();
        let aggregator = inner.machine.callbacks().clone();
        inner.machine = StateMachine::new(profile, aggregator, start).with_log(log);
    }

    /// Get session ID
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Unload flag to share with adapter hooks
    pub fn unload_guard(&self) -> Arc<UnloadGuard> {
        Arc::clone(&self.unload)
    }

    /// Get current state
    pub async fn state(&self) -> State {
        self.shared.inner.lock().await.machine.state()
    }

    /// Subscribe to state changes
    pub fn subscribe_state(&self) -> watch::Receiver<State> {
        self.shared.state_tx.subscribe()
    }

    pub async fn impression_id(&self) -> Uuid {
        self.shared.inner.lock().await.machine.callbacks().impression_id()
    }

    pub async fn gate_state(&self) -> GateState {
        self.shared.inner.lock().await.gate.state()
    }

    /// Transitions recorded in the debug log
    pub async fn transitions(&self) -> Vec<TransitionRecord> {
        self.shared.inner.lock().await.machine.log().to_vec()
    }

    /// Copy engine details into every following sample
    pub async fn apply_playback_info(&self, info: &PlaybackInfo) {
        self.shared
            .inner
            .lock()
            .await
            .machine
            .callbacks_mut()
            .apply_playback_info(info);
    }

    /// Run the license check and release or discard held samples
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn start(&self) -> GateState {
        let request = LicenseRequest::new(&self.config.key, &self.config.domain);
        let verdict = self.shared.transport.check_license(&request).await;

        let outgoing = {
            let mut inner = self.shared.inner.lock().await;
            let mut released = match verdict {
                Ok(response) => inner.gate.resolve(&response),
                Err(e) => {
                    warn!(error = %e, "License check failed");
                    inner.gate.fail(&e.to_string());
                    Vec::new()
                }
            };
            released.extend(inner.take_outgoing());
            info!(gate = ?inner.gate.state(), released = released.len(), "License check complete");
            released
        };

        self.shared.deliver(outgoing).await;
        self.gate_state().await
    }

    /// Dispatch an event stamped with the current wall-clock time
    pub async fn dispatch(&self, kind: CanonicalEvent, payload: EventPayload) -> Outcome {
        self.dispatch_at(kind, payload, now_ms()).await
    }

    /// Dispatch an event with an explicit timestamp
    #[instrument(skip(self, payload), fields(session_id = %self.id))]
    pub async fn dispatch_at(
        &self,
        kind: CanonicalEvent,
        payload: EventPayload,
        timestamp: Timestamp,
    ) -> Outcome {
        let (outcome, outgoing) = {
            let mut inner = self.shared.inner.lock().await;
            let outcome = inner.call_event(kind, &payload, timestamp);
            reschedule_timer(&self.shared, &mut inner, timestamp);
            self.shared.state_tx.send_replace(inner.machine.state());
            (outcome, inner.take_outgoing())
        };

        self.shared.deliver(outgoing).await;
        outcome
    }

    /// Dispatch by wire name. Unknown names are logged and dropped.
    pub async fn dispatch_named(
        &self,
        name: &str,
        payload: EventPayload,
        timestamp: Timestamp,
    ) -> Result<Outcome> {
        let kind: CanonicalEvent = name.parse().map_err(|e: Error| {
            warn!(error = %e, "Dropping unknown event");
            e
        })?;
        Ok(self.dispatch_at(kind, payload, timestamp).await)
    }

    /// Dispatch adapter output in order
    pub async fn ingest(&self, events: Vec<Event>) -> Vec<Outcome> {
        let mut outcomes = Vec::with_capacity(events.len());
        for event in events {
            outcomes.push(
                self.dispatch_at(event.kind, event.payload, event.timestamp)
                    .await,
            );
        }
        outcomes
    }

    /// Report the page unload at `timestamp`. Only the first call has an effect.
    pub async fn unload_at(&self, timestamp: Timestamp) -> Option<Outcome> {
        if !self.unload.fire() {
            debug!("Unload already handled");
            return None;
        }
        info!(session_id = %self.id, "Page unload");
        Some(
            self.dispatch_at(CanonicalEvent::Unload, EventPayload::default(), timestamp)
                .await,
        )
    }

    /// Stop the deferred-event timer
    pub async fn close(&self) {
        if let Some(handle) = self.shared.inner.lock().await.timer.take() {
            handle.abort();
        }
        info!(session_id = %self.id, "Analytics session closed");
    }
}

#[async_trait]
impl LifecycleSink for AnalyticsSession {
    async fn notify_unload(&self) {
        self.unload_at(now_ms()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::licensing::{LicenseResponse, LicenseStatus};
    use crate::sample::Sample;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct NullTransport {
        sent: StdMutex<Vec<Sample>>,
    }

    #[async_trait]
    impl Transport for NullTransport {
        async fn check_license(&self, _request: &LicenseRequest) -> Result<LicenseResponse> {
            Ok(LicenseResponse {
                status: LicenseStatus::Granted,
                message: None,
            })
        }

        async fn send_sample(&self, sample: &Sample) -> Result<()> {
            self.sent.lock().unwrap().push(sample.clone());
            Ok(())
        }
    }

    fn config() -> CollectorConfig {
        CollectorConfig {
            debug: true,
            ..CollectorConfig::new("key", "example.com")
        }
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let result = AnalyticsSession::new(
            CollectorConfig::default(),
            MachineProfile::full(),
            Arc::new(NullTransport::default()),
        );
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_state_subscription() {
        let session = AnalyticsSession::unlicensed(
            config(),
            MachineProfile::full(),
            Arc::new(NullTransport::default()),
        )
        .unwrap();
        session.reset_clock(0).await;
        let mut rx = session.subscribe_state();

        session
            .dispatch_at(CanonicalEvent::Ready, EventPayload::default(), 10)
            .await;
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), State::Ready);
    }

    #[tokio::test]
    async fn test_unknown_name_is_error() {
        let session = AnalyticsSession::unlicensed(
            config(),
            MachineProfile::full(),
            Arc::new(NullTransport::default()),
        )
        .unwrap();
        let err = session
            .dispatch_named("SPIN", EventPayload::default(), 10)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_EVENT");
        assert_eq!(session.state().await, State::Setup);
    }

    #[tokio::test]
    async fn test_debug_log_records_transitions() {
        let session = AnalyticsSession::unlicensed(
            config(),
            MachineProfile::html5(),
            Arc::new(NullTransport::default()),
        )
        .unwrap();
        session.reset_clock(0).await;
        session
            .dispatch_at(CanonicalEvent::Ready, EventPayload::default(), 5)
            .await;

        let transitions = session.transitions().await;
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].to, State::Ready);
    }
}
