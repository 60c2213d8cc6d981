//! State machine callbacks
//!
//! The state machine never owns sample fields. On every state exit it hands a
//! [`StateExit`] to a [`StateCallbacks`] implementation, picked through an
//! exhaustive `match` on [`State`], so adding a state without a handler is a
//! compile error rather than a silently missing callback.

use crate::types::{EventPayload, State, Timestamp};
use serde::Serialize;

/// A closed duration slice handed to the callbacks when a state is left
#[derive(Debug, Clone, Copy)]
pub struct StateExit<'a> {
    /// Time spent in the state (or the seek duration for seeking states)
    pub duration_ms: u64,
    /// The state being left
    pub state: State,
    /// Payload of the event that ended the slice
    pub payload: &'a EventPayload,
}

impl StateExit<'_> {
    /// Lower-cased state name reported in samples
    pub fn state_name(&self) -> &'static str {
        self.state.callback_name()
    }
}

/// Receiver of state machine notifications. Every method defaults to a no-op.
pub trait StateCallbacks {
    fn setup(&mut self, _exit: &StateExit<'_>) {}
    fn startup(&mut self, _exit: &StateExit<'_>) {}
    fn ready(&mut self, _exit: &StateExit<'_>) {}
    fn playing(&mut self, _exit: &StateExit<'_>) {}
    fn rebuffering(&mut self, _exit: &StateExit<'_>) {}
    fn pause(&mut self, _exit: &StateExit<'_>) {}
    fn qualitychange(&mut self, _exit: &StateExit<'_>) {}
    fn qualitychange_pause(&mut self, _exit: &StateExit<'_>) {}
    fn qualitychange_rebuffering(&mut self, _exit: &StateExit<'_>) {}
    fn paused_seeking(&mut self, _exit: &StateExit<'_>) {}
    fn play_seeking(&mut self, _exit: &StateExit<'_>) {}
    fn end_play_seeking(&mut self, _exit: &StateExit<'_>) {}
    fn ad(&mut self, _exit: &StateExit<'_>) {}
    fn muting_ready(&mut self, _exit: &StateExit<'_>) {}
    fn muting_play(&mut self, _exit: &StateExit<'_>) {}
    fn muting_pause(&mut self, _exit: &StateExit<'_>) {}
    fn casting(&mut self, _exit: &StateExit<'_>) {}
    fn source_changing(&mut self, _exit: &StateExit<'_>) {}
    /// Leaving the ERROR state
    fn error_state(&mut self, _exit: &StateExit<'_>) {}
    fn end(&mut self, _exit: &StateExit<'_>) {}

    /// Periodic slice closed while staying in the same state
    fn heartbeat(&mut self, _exit: &StateExit<'_>) {}
    /// PLAYING left because the page is going away
    fn playing_and_bye(&mut self, _exit: &StateExit<'_>) {}

    /// An ERROR event was accepted
    fn error(&mut self, _payload: &EventPayload) {}
    fn video_change(&mut self, _payload: &EventPayload) {}
    fn audio_change(&mut self, _payload: &EventPayload) {}
    fn mute(&mut self) {}
    fn un_mute(&mut self) {}
    fn set_video_time_start(&mut self, _payload: &EventPayload) {}
    fn set_video_time_end(&mut self, _payload: &EventPayload) {}
    fn start_casting(&mut self, _timestamp: Timestamp, _payload: &EventPayload) {}
}

/// Route a state exit to the handler for that state
pub fn dispatch_exit<C: StateCallbacks + ?Sized>(callbacks: &mut C, exit: &StateExit<'_>) {
    match exit.state {
        State::Setup => callbacks.setup(exit),
        State::Startup => callbacks.startup(exit),
        State::Ready => callbacks.ready(exit),
        State::Playing => callbacks.playing(exit),
        State::Rebuffering => callbacks.rebuffering(exit),
        State::Pause => callbacks.pause(exit),
        State::QualityChange => callbacks.qualitychange(exit),
        State::QualityChangePause => callbacks.qualitychange_pause(exit),
        State::QualityChangeRebuffering => callbacks.qualitychange_rebuffering(exit),
        State::PausedSeeking => callbacks.paused_seeking(exit),
        State::PlaySeeking => callbacks.play_seeking(exit),
        State::EndPlaySeeking => callbacks.end_play_seeking(exit),
        State::Ad => callbacks.ad(exit),
        State::MutingReady => callbacks.muting_ready(exit),
        State::MutingPlay => callbacks.muting_play(exit),
        State::MutingPause => callbacks.muting_pause(exit),
        State::Casting => callbacks.casting(exit),
        State::SourceChanging => callbacks.source_changing(exit),
        State::Error => callbacks.error_state(exit),
        State::End => callbacks.end(exit),
    }
}

/// Callbacks that discard everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallbacks;

impl StateCallbacks for NoopCallbacks {}

/// One observed callback invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallbackRecord {
    /// Callback name (`playing`, `heartbeat`, `video_change`, ...)
    pub name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<State>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Callbacks that record every invocation, in order
#[derive(Debug, Default, Clone)]
pub struct CallbackRecorder {
    records: Vec<CallbackRecord>,
}

impl CallbackRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[CallbackRecord] {
        &self.records
    }

    /// Number of invocations of the named callback
    pub fn count(&self, name: &str) -> usize {
        self.records.iter().filter(|r| r.name == name).count()
    }

    /// Duration-bearing invocations only
    pub fn durations(&self) -> Vec<(&'static str, u64)> {
        self.records
            .iter()
            .filter_map(|r| r.duration_ms.map(|d| (r.name, d)))
            .collect()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    fn slice(&mut self, name: &'static str, exit: &StateExit<'_>) {
        self.records.push(CallbackRecord {
            name,
            state: Some(exit.state),
            duration_ms: Some(exit.duration_ms),
        });
    }

    fn event(&mut self, name: &'static str) {
        self.records.push(CallbackRecord {
            name,
            state: None,
            duration_ms: None,
        });
    }
}

impl StateCallbacks for CallbackRecorder {
    fn setup(&mut self, exit: &StateExit<'_>) {
        self.slice("setup", exit);
    }
    fn startup(&mut self, exit: &StateExit<'_>) {
        self.slice("startup", exit);
    }
    fn ready(&mut self, exit: &StateExit<'_>) {
        self.slice("ready", exit);
    }
    fn playing(&mut self, exit: &StateExit<'_>) {
        self.slice("playing", exit);
    }
    fn rebuffering(&mut self, exit: &StateExit<'_>) {
        self.slice("rebuffering", exit);
    }
    fn pause(&mut self, exit: &StateExit<'_>) {
        self.slice("pause", exit);
    }
    fn qualitychange(&mut self, exit: &StateExit<'_>) {
        self.slice("qualitychange", exit);
    }
    fn qualitychange_pause(&mut self, exit: &StateExit<'_>) {
        self.slice("qualitychange_pause", exit);
    }
    fn qualitychange_rebuffering(&mut self, exit: &StateExit<'_>) {
        self.slice("qualitychange_rebuffering", exit);
    }
    fn paused_seeking(&mut self, exit: &StateExit<'_>) {
        self.slice("paused_seeking", exit);
    }
    fn play_seeking(&mut self, exit: &StateExit<'_>) {
        self.slice("play_seeking", exit);
    }
    fn end_play_seeking(&mut self, exit: &StateExit<'_>) {
        self.slice("end_play_seeking", exit);
    }
    fn ad(&mut self, exit: &StateExit<'_>) {
        self.slice("ad", exit);
    }
    fn muting_ready(&mut self, exit: &StateExit<'_>) {
        self.slice("muting_ready", exit);
    }
    fn muting_play(&mut self, exit: &StateExit<'_>) {
        self.slice("muting_play", exit);
    }
    fn muting_pause(&mut self, exit: &StateExit<'_>) {
        self.slice("muting_pause", exit);
    }
    fn casting(&mut self, exit: &StateExit<'_>) {
        self.slice("casting", exit);
    }
    fn source_changing(&mut self, exit: &StateExit<'_>) {
        self.slice("source_changing", exit);
    }
    fn error_state(&mut self, exit: &StateExit<'_>) {
        self.slice("error_state", exit);
    }
    fn end(&mut self, exit: &StateExit<'_>) {
        self.slice("end", exit);
    }
    fn heartbeat(&mut self, exit: &StateExit<'_>) {
        self.slice("heartbeat", exit);
    }
    fn playing_and_bye(&mut self, exit: &StateExit<'_>) {
        self.slice("playing_and_bye", exit);
    }
    fn error(&mut self, _payload: &EventPayload) {
        self.event("error");
    }
    fn video_change(&mut self, _payload: &EventPayload) {
        self.event("video_change");
    }
    fn audio_change(&mut self, _payload: &EventPayload) {
        self.event("audio_change");
    }
    fn mute(&mut self) {
        self.event("mute");
    }
    fn un_mute(&mut self) {
        self.event("un_mute");
    }
    fn set_video_time_start(&mut self, _payload: &EventPayload) {
        self.event("set_video_time_start");
    }
    fn set_video_time_end(&mut self, _payload: &EventPayload) {
        self.event("set_video_time_end");
    }
    fn start_casting(&mut self, _timestamp: Timestamp, _payload: &EventPayload) {
        self.event("start_casting");
    }
}
