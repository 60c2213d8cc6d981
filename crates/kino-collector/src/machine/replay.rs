//! Offline replay of recorded event logs
//!
//! Drives a fresh machine through a recorded sequence of canonical events and
//! reports the transitions and callbacks it produced. Because the machine only
//! reads time from event timestamps, replaying the same log always yields the
//! same report.

use super::{MachineProfile, StateLog, StateMachine, TransitionRecord};
use crate::callbacks::{CallbackRecord, CallbackRecorder};
use crate::error::{Error, Result};
use crate::types::{Event, State};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Everything a replay produced
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    /// Profile the log was replayed against
    pub profile: &'static str,
    /// Applied transitions, including auto-transitions and deferred events
    pub transitions: Vec<TransitionRecord>,
    /// Callback invocations in order
    pub callbacks: Vec<CallbackRecord>,
    /// State after the last event and any pending deferred event
    pub final_state: State,
    /// Events that were absent from the table
    pub ignored: usize,
}

/// Replay `events` against `profile`.
///
/// The machine starts at the first event's timestamp. A deferred event still
/// pending after the last input is fired, as if the clock had run on.
pub fn replay(profile: MachineProfile, events: &[Event]) -> ReplayReport {
    let start = events.first().map(|e| e.timestamp).unwrap_or(0);
    let name = profile.name;
    let mut machine = StateMachine::new(profile, CallbackRecorder::new(), start)
        .with_log(StateLog::unbounded());

    let mut ignored = 0;
    for event in events {
        if machine
            .call_event(event.kind, &event.payload, event.timestamp)
            .is_ignored()
        {
            ignored += 1;
        }
    }
    machine.fire_pending();

    debug!(
        profile = name,
        events = events.len(),
        transitions = machine.log().len(),
        ignored,
        "Replay finished"
    );

    ReplayReport {
        profile: name,
        transitions: machine.log().to_vec(),
        final_state: machine.state(),
        ignored,
        callbacks: machine.into_callbacks().records().to_vec(),
    }
}

/// A recorded event log, optionally naming the profile it was captured with
#[derive(Debug, Clone, PartialEq)]
pub struct EventLog {
    pub profile: Option<String>,
    pub events: Vec<Event>,
}

/// Accepted on-disk shapes: a bare array, or an object with an `events` array.
/// Other keys of the object (expected transitions, counters) are ignored.
#[derive(Deserialize)]
#[serde(untagged)]
enum LogFile {
    Bare(Vec<Event>),
    Recorded {
        #[serde(default)]
        profile: Option<String>,
        events: Vec<Event>,
    },
}

impl EventLog {
    /// Parse either log shape. Timestamps must not decrease.
    pub fn from_json(json: &str) -> Result<Self> {
        let log = match serde_json::from_str(json)? {
            LogFile::Bare(events) => Self {
                profile: None,
                events,
            },
            LogFile::Recorded { profile, events } => Self { profile, events },
        };

        if let Some(pair) = log
            .events
            .windows(2)
            .find(|w| w[1].timestamp < w[0].timestamp)
        {
            return Err(Error::InvalidReplay(format!(
                "timestamp {} of {} precedes {}",
                pair[1].timestamp, pair[1].kind, pair[0].timestamp
            )));
        }

        Ok(log)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

/// Parse the events of a log in either shape. Timestamps must not decrease.
pub fn parse_event_log(json: &str) -> Result<Vec<Event>> {
    EventLog::from_json(json).map(|log| log.events)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = r#"[
        {"event": "READY", "timestamp": 1000},
        {"event": "PLAY", "timestamp": 1500},
        {"event": "TIMECHANGED", "timestamp": 1800, "payload": {"currentTime": 0.1}},
        {"event": "PAUSE", "timestamp": 5000},
        {"event": "SEEK", "timestamp": 7000},
        {"event": "SEEKED", "timestamp": 7200}
    ]"#;

    #[test]
    fn test_replay_is_deterministic() {
        let events = parse_event_log(LOG).unwrap();
        let first = replay(MachineProfile::full(), &events);
        let second = replay(MachineProfile::full(), &events);

        assert_eq!(first.transitions, second.transitions);
        assert_eq!(first.callbacks, second.callbacks);
    }

    #[test]
    fn test_replay_settles_pending_pause() {
        let events = parse_event_log(LOG).unwrap();
        let report = replay(MachineProfile::full(), &events);

        assert_eq!(report.final_state, State::Pause);
        assert_eq!(report.ignored, 0);
        let last = report.transitions.last().unwrap();
        assert_eq!(last.from, State::PausedSeeking);
        assert_eq!(last.timestamp, 7200);
    }

    #[test]
    fn test_unordered_log_is_rejected() {
        let json = r#"[
            {"event": "READY", "timestamp": 10},
            {"event": "PLAY", "timestamp": 5}
        ]"#;
        let err = parse_event_log(json).unwrap_err();
        assert!(matches!(err, Error::InvalidReplay(_)));
    }

    #[test]
    fn test_unknown_event_name_fails_parsing() {
        let json = r#"[{"event": "JUMP", "timestamp": 10}]"#;
        assert!(parse_event_log(json).is_err());
    }

    #[test]
    fn test_recorded_log_object_is_accepted() {
        let json = r#"{
            "profile": "html5",
            "events": [
                {"event": "READY", "timestamp": 0},
                {"event": "PLAY", "timestamp": 40}
            ],
            "expected": [],
            "ignored": 0
        }"#;
        let log = EventLog::from_json(json).unwrap();
        assert_eq!(log.profile.as_deref(), Some("html5"));
        assert_eq!(log.events.len(), 2);
        assert_eq!(parse_event_log(json).unwrap(), log.events);
    }

    #[test]
    fn test_missing_log_file_is_io_error() {
        let err = EventLog::from_file("/nonexistent/kino/session.json").unwrap_err();
        assert_eq!(err.error_code(), "IO");
    }

    #[test]
    fn test_empty_log() {
        let report = replay(MachineProfile::html5(), &[]);
        assert_eq!(report.final_state, State::Setup);
        assert!(report.transitions.is_empty());
    }
}
