//! Playback state machine
//!
//! Consumes canonical events in arrival order and turns them into state
//! durations. The machine is synchronous and deterministic: all timing comes
//! from event timestamps, and the one deferred decision (confirming PAUSE after
//! a paused seek) is held as a pending event that fires once time has moved
//! past its deadline.
//!
//! # Transition flow
//!
//! ```text
//!  call_event(kind, payload, ts)
//!      │
//!      ├── fire due deferred event (ts >= due)
//!      ├── table lookup ──────────── absent ──► Outcome::Ignored
//!      ├── before-event guard ────── veto ────► Outcome::Deferred / redirect
//!      ├── leave(old)   → duration callback
//!      ├── current = new
//!      ├── enter(new)
//!      └── after-event  → heartbeat / error hook / FINISH_* auto-transition
//! ```
//!
//! Self-transitions (`from == to`) are not exits: only the guard and the
//! after-event hooks run.

pub mod log;
pub mod profile;
pub mod replay;
pub mod table;

pub use log::{StateLog, TransitionRecord};
pub use profile::{
    GuardTiming, MachineProfile, HEARTBEAT_INTERVAL_MS, PAUSE_SEEK_WINDOW_MS,
    SEEKED_PAUSE_DELAY_MS,
};
pub use replay::{parse_event_log, replay, EventLog, ReplayReport};
pub use table::{Transition, TransitionTable};

use crate::callbacks::{dispatch_exit, StateCallbacks, StateExit};
use crate::types::{CanonicalEvent, EventPayload, State, Timestamp, Trigger};
use tracing::{debug, info, warn};

/// Result of feeding one event to the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The pair is absent from the table; nothing happened
    Ignored { state: State },
    /// The event was held back and will be confirmed at `due`
    Deferred { state: State, due: Timestamp },
    /// A transition fired; `to` is the state once auto-transitions settled
    Applied { from: State, to: State },
}

impl Outcome {
    pub fn is_ignored(&self) -> bool {
        matches!(self, Outcome::Ignored { .. })
    }
}

/// An event scheduled by the machine for later confirmation
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredEvent {
    /// Earliest time the event may fire
    pub due: Timestamp,
    /// Event to fire
    pub event: CanonicalEvent,
    /// Timestamp the event carries when it fires
    pub timestamp: Timestamp,
    pub payload: EventPayload,
    /// State the machine must still be in for the event to apply
    pub expected_state: State,
}

enum Guard {
    Proceed,
    Veto(Outcome),
}

/// Deterministic playback state machine
pub struct StateMachine<C: StateCallbacks> {
    profile: MachineProfile,
    callbacks: C,
    current: State,
    entered_at: Timestamp,
    last_timestamp: Timestamp,
    paused_at: Option<Timestamp>,
    seek_at: Option<Timestamp>,
    seeked_at: Option<Timestamp>,
    pending: Option<DeferredEvent>,
    log: StateLog,
}

impl<C: StateCallbacks> StateMachine<C> {
    /// Create a machine in SETUP, entered at `start`
    pub fn new(profile: MachineProfile, callbacks: C, start: Timestamp) -> Self {
        debug!(profile = profile.name, start, "State machine created");
        Self {
            profile,
            callbacks,
            current: State::Setup,
            entered_at: start,
            last_timestamp: start,
            paused_at: None,
            seek_at: None,
            seeked_at: None,
            pending: None,
            log: StateLog::disabled(),
        }
    }

    /// Record applied transitions into `log`
    pub fn with_log(mut self, log: StateLog) -> Self {
        self.log = log;
        self
    }

    pub fn state(&self) -> State {
        self.current
    }

    pub fn profile(&self) -> &MachineProfile {
        &self.profile
    }

    /// Timestamp at which the current slice started
    pub fn entered_at(&self) -> Timestamp {
        self.entered_at
    }

    pub fn callbacks(&self) -> &C {
        &self.callbacks
    }

    pub fn callbacks_mut(&mut self) -> &mut C {
        &mut self.callbacks
    }

    pub fn into_callbacks(self) -> C {
        self.callbacks
    }

    pub fn log(&self) -> &StateLog {
        &self.log
    }

    pub fn pending(&self) -> Option<&DeferredEvent> {
        self.pending.as_ref()
    }

    /// Deadline of the pending deferred event, if one is scheduled
    pub fn pending_deadline(&self) -> Option<Timestamp> {
        self.pending.as_ref().map(|p| p.due)
    }

    /// Feed one canonical event
    pub fn call_event(
        &mut self,
        kind: CanonicalEvent,
        payload: &EventPayload,
        timestamp: Timestamp,
    ) -> Outcome {
        self.fire_due_timers(timestamp);

        if timestamp < self.last_timestamp {
            warn!(
                event = %kind,
                timestamp,
                last = self.last_timestamp,
                "Event timestamp went backwards"
            );
        }
        self.last_timestamp = self.last_timestamp.max(timestamp);

        self.fire(Trigger::Event(kind), payload, timestamp)
    }

    /// Feed an event by wire name. Unknown names are logged and dropped.
    pub fn call_event_named(
        &mut self,
        name: &str,
        payload: &EventPayload,
        timestamp: Timestamp,
    ) -> Outcome {
        match name.parse::<CanonicalEvent>() {
            Ok(kind) => self.call_event(kind, payload, timestamp),
            Err(e) => {
                warn!(error = %e, "Dropping unknown event");
                Outcome::Ignored {
                    state: self.current,
                }
            }
        }
    }

    /// Fire the pending deferred event if `now` has reached its deadline
    pub fn fire_due_timers(&mut self, now: Timestamp) -> Option<Outcome> {
        match &self.pending {
            Some(pending) if pending.due <= now => self.fire_pending(),
            _ => None,
        }
    }

    /// Fire the pending deferred event regardless of its deadline
    pub fn fire_pending(&mut self) -> Option<Outcome> {
        let deferred = self.pending.take()?;

        if self.current != deferred.expected_state {
            debug!(
                event = %deferred.event,
                state = %self.current,
                expected = %deferred.expected_state,
                "Discarding stale deferred event"
            );
            return None;
        }

        debug!(event = %deferred.event, timestamp = deferred.timestamp, "Firing deferred event");
        Some(self.fire(
            Trigger::Event(deferred.event),
            &deferred.payload,
            deferred.timestamp,
        ))
    }

    /// Cancel the pending deferred event
    pub fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            debug!(event = %pending.event, due = pending.due, "Cancelled deferred event");
        }
    }

    fn fire(&mut self, trigger: Trigger, payload: &EventPayload, timestamp: Timestamp) -> Outcome {
        let from = self.current;
        let Some(to) = self.profile.table.target(from, trigger) else {
            debug!(event = %trigger, state = %from, "Ignored event");
            return Outcome::Ignored { state: from };
        };

        if let Guard::Veto(outcome) = self.before_event(trigger, from, timestamp, payload) {
            return outcome;
        }

        self.log.push(TransitionRecord {
            event: trigger,
            from,
            to,
            timestamp,
        });

        if from != to {
            self.leave(trigger, from, to, timestamp, payload);
            self.current = to;
            self.enter(trigger, from, to, timestamp, payload);
        }

        self.after_event(trigger, from, to, timestamp, payload);

        Outcome::Applied {
            from,
            to: self.current,
        }
    }

    fn before_event(
        &mut self,
        trigger: Trigger,
        from: State,
        timestamp: Timestamp,
        payload: &EventPayload,
    ) -> Guard {
        match trigger {
            Trigger::Event(CanonicalEvent::Seek) => {
                self.cancel_pending();

                if from == State::Pause {
                    if let Some(paused_at) = self.paused_at {
                        let since_pause = timestamp.saturating_sub(paused_at);
                        if since_pause < self.profile.timing.pause_seek_window_ms {
                            debug!(since_pause, "Seek right after pause, treating as play seek");
                            return Guard::Veto(self.fire(Trigger::PlaySeek, payload, timestamp));
                        }
                    }
                }
                Guard::Proceed
            }
            Trigger::Event(CanonicalEvent::Seeked) if from == State::PausedSeeking => {
                self.seeked_at = Some(timestamp);
                let due = timestamp + self.profile.timing.seeked_pause_delay_ms;
                self.pending = Some(DeferredEvent {
                    due,
                    event: CanonicalEvent::Pause,
                    timestamp,
                    payload: payload.clone(),
                    expected_state: State::PausedSeeking,
                });
                debug!(due, "Seeked while paused, deferring pause confirmation");
                Guard::Veto(Outcome::Deferred { state: from, due })
            }
            Trigger::Event(CanonicalEvent::Play) if from == State::PausedSeeking => {
                self.cancel_pending();
                Guard::Proceed
            }
            _ => Guard::Proceed,
        }
    }

    fn leave(
        &mut self,
        trigger: Trigger,
        from: State,
        to: State,
        timestamp: Timestamp,
        payload: &EventPayload,
    ) {
        let duration_ms = timestamp.saturating_sub(self.entered_at);

        if payload.current_time.is_some() && !to.is_seeking() {
            self.callbacks.set_video_time_end(payload);
        }

        if trigger == Trigger::PlaySeek && from == State::Pause {
            // Reported with the seek; seek_at is moved back to the pause.
        } else if matches!(from, State::EndPlaySeeking | State::PausedSeeking) {
            let exit = StateExit {
                duration_ms: self.seek_duration(timestamp),
                state: from,
                payload,
            };
            dispatch_exit(&mut self.callbacks, &exit);
        } else if trigger.is(CanonicalEvent::Unload) && from == State::Playing {
            let exit = StateExit {
                duration_ms,
                state: from,
                payload,
            };
            self.callbacks.playing_and_bye(&exit);
        } else {
            let exit = StateExit {
                duration_ms,
                state: from,
                payload,
            };
            dispatch_exit(&mut self.callbacks, &exit);
        }

        self.notify_event_shape(trigger, payload);

        if from == State::PausedSeeking {
            self.cancel_pending();
        }
    }

    fn enter(
        &mut self,
        trigger: Trigger,
        from: State,
        to: State,
        timestamp: Timestamp,
        payload: &EventPayload,
    ) {
        let left_at = std::mem::replace(&mut self.entered_at, timestamp);
        debug!(state = %to, event = %trigger, from = %from, "Entering state");

        if payload.current_time.is_some() && !to.is_seeking() {
            self.callbacks.set_video_time_start(payload);
        }

        if to.is_seeking() && !from.is_seeking() {
            // A folded pause is seek time: measure from when PAUSE was entered.
            self.seek_at = if trigger == Trigger::PlaySeek && from == State::Pause {
                Some(left_at)
            } else {
                Some(timestamp)
            };
        }

        match to {
            State::Casting if trigger.is(CanonicalEvent::StartCast) => {
                self.callbacks.start_casting(timestamp, payload);
            }
            State::SourceChanging => {
                self.paused_at = None;
                self.seek_at = None;
                self.seeked_at = None;
                self.cancel_pending();
            }
            _ => {}
        }
    }

    fn after_event(
        &mut self,
        trigger: Trigger,
        from: State,
        to: State,
        timestamp: Timestamp,
        payload: &EventPayload,
    ) {
        match trigger {
            Trigger::Event(CanonicalEvent::Pause) if from == State::Playing => {
                self.paused_at = Some(timestamp);
            }
            Trigger::Event(CanonicalEvent::Seeked) => {
                self.seeked_at = Some(timestamp);
            }
            Trigger::Event(CanonicalEvent::TimeChanged) => {
                self.heartbeat_if_due(timestamp, payload);
            }
            Trigger::Event(CanonicalEvent::Error) => {
                self.callbacks.error(payload);
            }
            _ => {}
        }

        if from == to {
            self.notify_event_shape(trigger, payload);
        }

        if self.current != to {
            return;
        }
        let finish = match to {
            State::QualityChange => Some(Trigger::FinishQualityChange),
            State::QualityChangePause => Some(Trigger::FinishQualityChangePause),
            State::QualityChangeRebuffering => Some(Trigger::FinishQualityChangeRebuffering),
            State::MutingReady | State::MutingPlay | State::MutingPause => {
                Some(Trigger::FinishMuting)
            }
            State::EndPlaySeeking if self.profile.auto_finish_play_seeking && from != to => {
                Some(Trigger::FinishPlaySeeking)
            }
            _ => None,
        };
        if let Some(finish) = finish {
            self.fire(finish, payload, timestamp);
        }
    }

    fn heartbeat_if_due(&mut self, timestamp: Timestamp, payload: &EventPayload) {
        let elapsed = timestamp.saturating_sub(self.entered_at);
        if elapsed <= self.profile.timing.heartbeat_interval_ms {
            return;
        }

        if payload.current_time.is_some() {
            self.callbacks.set_video_time_end(payload);
        }
        info!(state = %self.current, duration_ms = elapsed, "Sending heartbeat");
        let exit = StateExit {
            duration_ms: elapsed,
            state: self.current,
            payload,
        };
        self.callbacks.heartbeat(&exit);
        self.entered_at = timestamp;
        if payload.current_time.is_some() {
            self.callbacks.set_video_time_start(payload);
        }
    }

    fn notify_event_shape(&mut self, trigger: Trigger, payload: &EventPayload) {
        match trigger {
            Trigger::Event(CanonicalEvent::VideoChange) => self.callbacks.video_change(payload),
            Trigger::Event(CanonicalEvent::AudioChange) => self.callbacks.audio_change(payload),
            Trigger::Event(CanonicalEvent::Mute) => self.callbacks.mute(),
            Trigger::Event(CanonicalEvent::UnMute) => self.callbacks.un_mute(),
            _ => {}
        }
    }

    /// Seek duration: SEEK to SEEKED when the seek completed, otherwise up to now
    fn seek_duration(&self, now: Timestamp) -> u64 {
        match (self.seek_at, self.seeked_at) {
            (Some(seek), Some(seeked)) if seeked >= seek => seeked - seek,
            (Some(seek), _) => now.saturating_sub(seek),
            (None, _) => now.saturating_sub(self.entered_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::CallbackRecorder;
    use crate::types::CanonicalEvent as E;

    fn machine() -> StateMachine<CallbackRecorder> {
        StateMachine::new(MachineProfile::full(), CallbackRecorder::new(), 0)
            .with_log(StateLog::unbounded())
    }

    fn send(m: &mut StateMachine<CallbackRecorder>, kind: E, ts: Timestamp) -> Outcome {
        m.call_event(kind, &EventPayload::default(), ts)
    }

    /// SETUP → READY → STARTUP → PLAYING, with PLAYING entered at `ts`
    fn playing_at(ts: Timestamp) -> StateMachine<CallbackRecorder> {
        let mut m = machine();
        send(&mut m, E::Ready, 0);
        send(&mut m, E::Play, ts);
        send(&mut m, E::TimeChanged, ts);
        assert_eq!(m.state(), State::Playing);
        m.callbacks_mut().clear();
        m
    }

    #[test]
    fn test_startup_sequence() {
        let mut m = machine();
        send(&mut m, E::Ready, 100);
        send(&mut m, E::Play, 200);
        send(&mut m, E::TimeChanged, 900);

        assert_eq!(m.state(), State::Playing);
        assert_eq!(
            m.callbacks().durations(),
            vec![("setup", 100), ("ready", 100), ("startup", 700)]
        );
    }

    #[test]
    fn test_illegal_event_changes_nothing() {
        let mut m = machine();
        let outcome = send(&mut m, E::Seeked, 10);

        assert_eq!(outcome, Outcome::Ignored { state: State::Setup });
        assert_eq!(m.state(), State::Setup);
        assert!(m.callbacks().records().is_empty());
        assert!(m.log().is_empty());
    }

    #[test]
    fn test_unknown_event_name_is_dropped() {
        let mut m = machine();
        let outcome = m.call_event_named("SPIN", &EventPayload::default(), 10);
        assert!(outcome.is_ignored());
        assert_eq!(m.state(), State::Setup);
    }

    #[test]
    fn test_quality_change_returns_to_playing() {
        let mut m = playing_at(0);
        let outcome = send(&mut m, E::VideoChange, 5_000);

        assert_eq!(
            outcome,
            Outcome::Applied {
                from: State::Playing,
                to: State::Playing
            }
        );
        assert_eq!(m.state(), State::Playing);
        assert_eq!(
            m.callbacks().durations(),
            vec![("playing", 5_000), ("qualitychange", 0)]
        );
        assert_eq!(m.callbacks().count("video_change"), 1);
    }

    #[test]
    fn test_quality_change_while_rebuffering() {
        let mut m = playing_at(0);
        send(&mut m, E::StartBuffering, 1_000);
        send(&mut m, E::AudioChange, 1_500);

        assert_eq!(m.state(), State::Rebuffering);
        assert_eq!(m.callbacks().count("qualitychange_rebuffering"), 1);
        assert_eq!(m.callbacks().count("audio_change"), 1);
    }

    #[test]
    fn test_quality_change_while_paused() {
        let mut m = playing_at(0);
        send(&mut m, E::Pause, 1_000);
        send(&mut m, E::VideoChange, 2_000);

        assert_eq!(m.state(), State::Pause);
        assert_eq!(m.callbacks().count("qualitychange_pause"), 1);
    }

    #[test]
    fn test_muting_is_transient() {
        let mut m = machine();
        send(&mut m, E::Ready, 0);
        send(&mut m, E::Mute, 10);
        assert_eq!(m.state(), State::Ready);

        let mut m = playing_at(0);
        send(&mut m, E::UnMute, 10);
        assert_eq!(m.state(), State::Playing);
        assert_eq!(m.callbacks().count("muting_play"), 1);
        assert_eq!(m.callbacks().count("un_mute"), 1);
    }

    #[test]
    fn test_seek_shortly_after_pause_is_play_seek() {
        let mut m = playing_at(0);
        send(&mut m, E::Pause, 1_000);
        send(&mut m, E::Seek, 1_150);

        assert_eq!(m.state(), State::PlaySeeking);
        // The settling pause is folded into the seek.
        assert_eq!(m.callbacks().count("pause"), 0);
    }

    #[test]
    fn test_folded_pause_counts_as_seek_time() {
        let mut m = playing_at(0);
        send(&mut m, E::Pause, 1_000);
        send(&mut m, E::Seek, 1_150);
        send(&mut m, E::Seeked, 1_400);
        send(&mut m, E::TimeChanged, 1_500);

        assert_eq!(m.state(), State::Playing);
        let durations = m.callbacks().durations();
        assert_eq!(durations.first(), Some(&("playing", 1_000)));
        assert_eq!(durations.last(), Some(&("end_play_seeking", 400)));
        assert_eq!(m.callbacks().count("pause"), 0);
    }

    #[test]
    fn test_pause_seek_window_boundary() {
        let mut m = playing_at(0);
        send(&mut m, E::Pause, 1_000);
        send(&mut m, E::Seek, 1_199);
        assert_eq!(m.state(), State::PlaySeeking);

        let mut m = playing_at(0);
        send(&mut m, E::Pause, 1_000);
        send(&mut m, E::Seek, 1_201);
        assert_eq!(m.state(), State::PausedSeeking);
        assert_eq!(m.callbacks().durations(), vec![("playing", 1_000), ("pause", 201)]);
    }

    #[test]
    fn test_seeked_while_paused_is_deferred() {
        let mut m = playing_at(0);
        send(&mut m, E::Pause, 1_000);
        send(&mut m, E::Seek, 2_000);
        let outcome = send(&mut m, E::Seeked, 2_400);

        assert_eq!(
            outcome,
            Outcome::Deferred {
                state: State::PausedSeeking,
                due: 2_700
            }
        );
        assert_eq!(m.state(), State::PausedSeeking);
        assert_eq!(m.pending_deadline(), Some(2_700));

        assert!(m.fire_due_timers(2_699).is_none());
        assert_eq!(m.state(), State::PausedSeeking);

        m.fire_due_timers(2_700);
        assert_eq!(m.state(), State::Pause);
        assert_eq!(m.entered_at(), 2_400);
        assert_eq!(m.callbacks().durations().last(), Some(&("paused_seeking", 400)));
    }

    #[test]
    fn test_scrubbing_cancels_deferred_pause() {
        let mut m = playing_at(0);
        send(&mut m, E::Pause, 1_000);
        send(&mut m, E::Seek, 2_000);
        send(&mut m, E::Seeked, 2_100);
        send(&mut m, E::Seek, 2_200);

        assert!(m.pending().is_none());
        assert_eq!(m.state(), State::PausedSeeking);

        send(&mut m, E::Seeked, 2_500);
        send(&mut m, E::TimeChanged, 3_000);
        assert_eq!(m.state(), State::Pause);
        // Whole scrub measured from the first SEEK to the last SEEKED.
        assert_eq!(m.callbacks().durations().last(), Some(&("paused_seeking", 500)));
    }

    #[test]
    fn test_play_cancels_deferred_pause() {
        let mut m = playing_at(0);
        send(&mut m, E::Pause, 1_000);
        send(&mut m, E::Seek, 2_000);
        send(&mut m, E::Seeked, 2_100);
        send(&mut m, E::Play, 2_150);

        assert_eq!(m.state(), State::Playing);
        assert!(m.pending().is_none());
        assert!(m.fire_pending().is_none());
        assert_eq!(m.state(), State::Playing);
    }

    #[test]
    fn test_stale_deferred_event_is_discarded() {
        let mut m = playing_at(0);
        send(&mut m, E::Pause, 1_000);
        send(&mut m, E::Seek, 2_000);
        send(&mut m, E::Seeked, 2_100);
        // Force the machine elsewhere while keeping the timer armed.
        let pending = m.pending().cloned();
        send(&mut m, E::Error, 2_150);
        m.pending = pending;

        assert!(m.fire_pending().is_none());
        assert_eq!(m.state(), State::Error);
    }

    #[test]
    fn test_play_seek_through_end_play_seeking() {
        let mut m = playing_at(0);
        send(&mut m, E::Seek, 10_000);
        assert_eq!(m.state(), State::PlaySeeking);
        send(&mut m, E::Seeked, 10_250);
        assert_eq!(m.state(), State::EndPlaySeeking);
        send(&mut m, E::TimeChanged, 10_400);

        assert_eq!(m.state(), State::Playing);
        assert_eq!(
            m.callbacks().durations(),
            vec![
                ("playing", 10_000),
                ("play_seeking", 250),
                ("end_play_seeking", 250)
            ]
        );
    }

    #[test]
    fn test_html5_profile_finishes_play_seeking_on_seeked() {
        let mut m = StateMachine::new(MachineProfile::html5(), CallbackRecorder::new(), 0);
        send(&mut m, E::Ready, 0);
        send(&mut m, E::Play, 0);
        send(&mut m, E::TimeChanged, 0);
        send(&mut m, E::Seek, 1_000);
        send(&mut m, E::Seeked, 1_300);

        assert_eq!(m.state(), State::Playing);
        assert_eq!(m.callbacks().durations().last(), Some(&("end_play_seeking", 300)));
    }

    #[test]
    fn test_seeking_suppresses_video_time_bookkeeping() {
        let mut m = playing_at(0);
        m.call_event(E::Seek, &EventPayload::at(10.0), 1_000);
        m.call_event(E::Seek, &EventPayload::at(20.0), 1_100);

        // Only the exit from PLAYING towards PLAY_SEEKING is a candidate, and
        // the destination suppresses it.
        assert_eq!(m.callbacks().count("set_video_time_end"), 0);
        assert_eq!(m.callbacks().count("set_video_time_start"), 0);

        m.call_event(E::Seeked, &EventPayload::at(20.0), 1_200);
        m.call_event(E::TimeChanged, &EventPayload::at(20.1), 1_300);
        assert_eq!(m.callbacks().count("set_video_time_start"), 1);
        assert_eq!(m.callbacks().count("set_video_time_end"), 1);
    }

    #[test]
    fn test_heartbeat_chunks_long_playing_state() {
        let mut m = playing_at(0);
        let mut ts = 0;
        while ts <= 60_100 {
            m.call_event(E::TimeChanged, &EventPayload::at(ts as f64 / 1000.0), ts);
            ts += 100;
        }

        assert_eq!(m.state(), State::Playing);
        let heartbeats: Vec<_> = m
            .callbacks()
            .durations()
            .into_iter()
            .filter(|(name, _)| *name == "heartbeat")
            .collect();
        assert_eq!(heartbeats, vec![("heartbeat", 59_800)]);
        assert_eq!(m.entered_at(), 59_800);
    }

    #[test]
    fn test_error_from_every_state() {
        for state in State::ALL {
            let mut m = machine();
            m.current = state;
            let outcome = send(&mut m, E::Error, 1_000);

            assert_eq!(m.state(), State::Error, "from {}", state);
            assert_eq!(
                outcome,
                Outcome::Applied {
                    from: state,
                    to: State::Error
                }
            );
            assert_eq!(m.log().len(), 1);
            assert_eq!(m.callbacks().count("error"), 1);
        }
    }

    #[test]
    fn test_error_recovers_only_through_ready() {
        let mut m = playing_at(0);
        send(&mut m, E::Error, 100);
        assert!(send(&mut m, E::Play, 200).is_ignored());
        assert!(send(&mut m, E::TimeChanged, 300).is_ignored());
        send(&mut m, E::Ready, 400);
        assert_eq!(m.state(), State::Ready);
        assert_eq!(m.callbacks().durations().last(), Some(&("error_state", 300)));
    }

    #[test]
    fn test_unload_from_playing_says_goodbye() {
        let mut m = playing_at(0);
        send(&mut m, E::Unload, 4_000);

        assert_eq!(m.state(), State::End);
        assert_eq!(m.callbacks().durations(), vec![("playing_and_bye", 4_000)]);
    }

    #[test]
    fn test_cast_takeover() {
        let mut m = machine();
        send(&mut m, E::Ready, 0);
        send(&mut m, E::StartCast, 100);
        assert_eq!(m.state(), State::Casting);
        assert_eq!(m.callbacks().count("start_casting"), 1);

        for kind in [E::Play, E::Pause, E::Seek, E::Seeked, E::Mute, E::TimeChanged] {
            send(&mut m, kind, 200);
            assert_eq!(m.state(), State::Casting);
        }

        send(&mut m, E::EndCast, 5_100);
        assert_eq!(m.state(), State::Ready);
        assert_eq!(m.callbacks().durations().last(), Some(&("casting", 5_000)));
    }

    #[test]
    fn test_source_change_returns_to_ready() {
        let mut m = playing_at(0);
        send(&mut m, E::ManualSourceChange, 1_000);
        assert_eq!(m.state(), State::SourceChanging);
        send(&mut m, E::SourceLoaded, 1_500);
        assert_eq!(m.state(), State::Ready);
    }

    #[test]
    fn test_end_is_reenterable() {
        let mut m = playing_at(0);
        send(&mut m, E::End, 3_000);
        assert_eq!(m.state(), State::End);
        send(&mut m, E::Play, 4_000);
        assert_eq!(m.state(), State::Playing);
    }

    #[test]
    fn test_ad_break() {
        let mut m = playing_at(0);
        send(&mut m, E::StartAd, 1_000);
        assert_eq!(m.state(), State::Ad);
        send(&mut m, E::EndAd, 16_000);
        assert_eq!(m.state(), State::Playing);
        assert_eq!(m.callbacks().durations().last(), Some(&("ad", 15_000)));
    }
}
