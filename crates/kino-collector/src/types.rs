//! Core types for Kino Collector

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

/// Milliseconds since the Unix epoch (or any monotonic origin)
pub type Timestamp = u64;

/// Engine-agnostic event vocabulary every adapter normalizes into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CanonicalEvent {
    Play,
    Pause,
    Seek,
    Seeked,
    #[serde(rename = "TIMECHANGED")]
    TimeChanged,
    StartBuffering,
    EndBuffering,
    VideoChange,
    AudioChange,
    Mute,
    UnMute,
    Error,
    Ready,
    SourceLoaded,
    SourceUnloaded,
    StartAd,
    EndAd,
    StartCast,
    EndCast,
    Unload,
    ManualSourceChange,
    End,
}

impl CanonicalEvent {
    /// Every canonical event, in declaration order
    pub const ALL: [CanonicalEvent; 22] = [
        CanonicalEvent::Play,
        CanonicalEvent::Pause,
        CanonicalEvent::Seek,
        CanonicalEvent::Seeked,
        CanonicalEvent::TimeChanged,
        CanonicalEvent::StartBuffering,
        CanonicalEvent::EndBuffering,
        CanonicalEvent::VideoChange,
        CanonicalEvent::AudioChange,
        CanonicalEvent::Mute,
        CanonicalEvent::UnMute,
        CanonicalEvent::Error,
        CanonicalEvent::Ready,
        CanonicalEvent::SourceLoaded,
        CanonicalEvent::SourceUnloaded,
        CanonicalEvent::StartAd,
        CanonicalEvent::EndAd,
        CanonicalEvent::StartCast,
        CanonicalEvent::EndCast,
        CanonicalEvent::Unload,
        CanonicalEvent::ManualSourceChange,
        CanonicalEvent::End,
    ];

    /// Wire name of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalEvent::Play => "PLAY",
            CanonicalEvent::Pause => "PAUSE",
            CanonicalEvent::Seek => "SEEK",
            CanonicalEvent::Seeked => "SEEKED",
            CanonicalEvent::TimeChanged => "TIMECHANGED",
            CanonicalEvent::StartBuffering => "START_BUFFERING",
            CanonicalEvent::EndBuffering => "END_BUFFERING",
            CanonicalEvent::VideoChange => "VIDEO_CHANGE",
            CanonicalEvent::AudioChange => "AUDIO_CHANGE",
            CanonicalEvent::Mute => "MUTE",
            CanonicalEvent::UnMute => "UN_MUTE",
            CanonicalEvent::Error => "ERROR",
            CanonicalEvent::Ready => "READY",
            CanonicalEvent::SourceLoaded => "SOURCE_LOADED",
            CanonicalEvent::SourceUnloaded => "SOURCE_UNLOADED",
            CanonicalEvent::StartAd => "START_AD",
            CanonicalEvent::EndAd => "END_AD",
            CanonicalEvent::StartCast => "START_CAST",
            CanonicalEvent::EndCast => "END_CAST",
            CanonicalEvent::Unload => "UNLOAD",
            CanonicalEvent::ManualSourceChange => "MANUAL_SOURCE_CHANGE",
            CanonicalEvent::End => "END",
        }
    }
}

impl std::fmt::Display for CanonicalEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanonicalEvent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CanonicalEvent::ALL
            .iter()
            .copied()
            .find(|event| event.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownEvent(s.to_string()))
    }
}

/// Playback states tracked by the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    #[serde(rename = "SETUP")]
    Setup,
    #[serde(rename = "STARTUP")]
    Startup,
    #[serde(rename = "READY")]
    Ready,
    #[serde(rename = "PLAYING")]
    Playing,
    #[serde(rename = "REBUFFERING")]
    Rebuffering,
    #[serde(rename = "PAUSE")]
    Pause,
    #[serde(rename = "QUALITYCHANGE")]
    QualityChange,
    #[serde(rename = "QUALITYCHANGE_PAUSE")]
    QualityChangePause,
    #[serde(rename = "QUALITYCHANGE_REBUFFERING")]
    QualityChangeRebuffering,
    #[serde(rename = "PAUSED_SEEKING")]
    PausedSeeking,
    #[serde(rename = "PLAY_SEEKING")]
    PlaySeeking,
    #[serde(rename = "END_PLAY_SEEKING")]
    EndPlaySeeking,
    #[serde(rename = "AD")]
    Ad,
    #[serde(rename = "MUTING_READY")]
    MutingReady,
    #[serde(rename = "MUTING_PLAY")]
    MutingPlay,
    #[serde(rename = "MUTING_PAUSE")]
    MutingPause,
    #[serde(rename = "CASTING")]
    Casting,
    #[serde(rename = "SOURCE_CHANGING")]
    SourceChanging,
    #[serde(rename = "ERROR")]
    Error,
    #[serde(rename = "END")]
    End,
}

impl State {
    /// Every state, in declaration order
    pub const ALL: [State; 20] = [
        State::Setup,
        State::Startup,
        State::Ready,
        State::Playing,
        State::Rebuffering,
        State::Pause,
        State::QualityChange,
        State::QualityChangePause,
        State::QualityChangeRebuffering,
        State::PausedSeeking,
        State::PlaySeeking,
        State::EndPlaySeeking,
        State::Ad,
        State::MutingReady,
        State::MutingPlay,
        State::MutingPause,
        State::Casting,
        State::SourceChanging,
        State::Error,
        State::End,
    ];

    /// Wire name of the state
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Setup => "SETUP",
            State::Startup => "STARTUP",
            State::Ready => "READY",
            State::Playing => "PLAYING",
            State::Rebuffering => "REBUFFERING",
            State::Pause => "PAUSE",
            State::QualityChange => "QUALITYCHANGE",
            State::QualityChangePause => "QUALITYCHANGE_PAUSE",
            State::QualityChangeRebuffering => "QUALITYCHANGE_REBUFFERING",
            State::PausedSeeking => "PAUSED_SEEKING",
            State::PlaySeeking => "PLAY_SEEKING",
            State::EndPlaySeeking => "END_PLAY_SEEKING",
            State::Ad => "AD",
            State::MutingReady => "MUTING_READY",
            State::MutingPlay => "MUTING_PLAY",
            State::MutingPause => "MUTING_PAUSE",
            State::Casting => "CASTING",
            State::SourceChanging => "SOURCE_CHANGING",
            State::Error => "ERROR",
            State::End => "END",
        }
    }

    /// Lower-cased name reported to the sample aggregator as the slice's state
    pub fn callback_name(&self) -> &'static str {
        match self {
            State::Setup => "setup",
            State::Startup => "startup",
            State::Ready => "ready",
            State::Playing => "playing",
            State::Rebuffering => "rebuffering",
            State::Pause => "pause",
            State::QualityChange => "qualitychange",
            State::QualityChangePause => "qualitychange_pause",
            State::QualityChangeRebuffering => "qualitychange_rebuffering",
            State::PausedSeeking => "paused_seeking",
            State::PlaySeeking => "play_seeking",
            State::EndPlaySeeking => "end_play_seeking",
            State::Ad => "ad",
            State::MutingReady => "muting_ready",
            State::MutingPlay => "muting_play",
            State::MutingPause => "muting_pause",
            State::Casting => "casting",
            State::SourceChanging => "source_changing",
            State::Error => "error",
            State::End => "end",
        }
    }

    /// Seeking family: video-time bookkeeping is suppressed while scrubbing
    pub fn is_seeking(&self) -> bool {
        matches!(
            self,
            State::PausedSeeking | State::PlaySeeking | State::EndPlaySeeking
        )
    }

    /// Transient states are always left immediately by an auto-transition
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            State::QualityChange
                | State::QualityChangePause
                | State::QualityChangeRebuffering
                | State::MutingReady
                | State::MutingPlay
                | State::MutingPause
        )
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for State {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        State::ALL
            .iter()
            .copied()
            .find(|state| state.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownState(s.to_string()))
    }
}

/// What drives a transition: a canonical event from an adapter, or a
/// pseudo-event the engine fires itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Event(CanonicalEvent),
    FinishQualityChange,
    FinishQualityChangePause,
    FinishQualityChangeRebuffering,
    FinishMuting,
    FinishPlaySeeking,
    PlaySeek,
}

impl Trigger {
    /// Engine-internal triggers, never accepted from adapters
    pub const INTERNAL: [Trigger; 6] = [
        Trigger::FinishQualityChange,
        Trigger::FinishQualityChangePause,
        Trigger::FinishQualityChangeRebuffering,
        Trigger::FinishMuting,
        Trigger::FinishPlaySeeking,
        Trigger::PlaySeek,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Event(event) => event.as_str(),
            Trigger::FinishQualityChange => "FINISH_QUALITYCHANGE",
            Trigger::FinishQualityChangePause => "FINISH_QUALITYCHANGE_PAUSE",
            Trigger::FinishQualityChangeRebuffering => "FINISH_QUALITYCHANGE_REBUFFERING",
            Trigger::FinishMuting => "FINISH_MUTING",
            Trigger::FinishPlaySeeking => "FINISH_PLAY_SEEKING",
            Trigger::PlaySeek => "PLAY_SEEK",
        }
    }

    /// The canonical event behind this trigger, if any
    pub fn event(&self) -> Option<CanonicalEvent> {
        match self {
            Trigger::Event(event) => Some(*event),
            _ => None,
        }
    }

    pub fn is(&self, event: CanonicalEvent) -> bool {
        *self == Trigger::Event(event)
    }
}

impl From<CanonicalEvent> for Trigger {
    fn from(event: CanonicalEvent) -> Self {
        Trigger::Event(event)
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Trigger {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(internal) = Trigger::INTERNAL
            .iter()
            .copied()
            .find(|trigger| trigger.as_str().eq_ignore_ascii_case(s))
        {
            return Ok(internal);
        }
        s.parse::<CanonicalEvent>().map(Trigger::Event)
    }
}

impl Serialize for Trigger {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Trigger {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Normalized event payload. Every field is optional; adapters fill what the
/// engine can report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    /// Playback position in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_time: Option<f64>,
    /// Total dropped frames reported by the engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dropped_frames: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Bitrate in bps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u64>,
    /// Error code (ERROR events)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    /// Error message (ERROR events)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Play issued to resume after an interruption
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resuming: Option<bool>,
}

impl EventPayload {
    /// Payload carrying only a playback position
    pub fn at(current_time: f64) -> Self {
        Self {
            current_time: Some(current_time),
            ..Default::default()
        }
    }

    /// Payload for an ERROR event
    pub fn error(code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Attach quality dimensions
    pub fn with_quality(mut self, quality: &QualityLevel) -> Self {
        self.bitrate = Some(quality.bitrate);
        self.width = quality.width;
        self.height = quality.height;
        self
    }

    pub fn with_dropped_frames(mut self, dropped_frames: u64) -> Self {
        self.dropped_frames = Some(dropped_frames);
        self
    }
}

/// A canonical event with its payload and arrival time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "event")]
    pub kind: CanonicalEvent,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub payload: EventPayload,
}

impl Event {
    pub fn new(kind: CanonicalEvent, timestamp: Timestamp) -> Self {
        Self {
            kind,
            timestamp,
            payload: EventPayload::default(),
        }
    }

    pub fn with_payload(mut self, payload: EventPayload) -> Self {
        self.payload = payload;
        self
    }
}

/// Supported player engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerKind {
    Bitmovin,
    Html5,
    HlsJs,
    Shaka,
    DashJs,
    VideoJs,
}

/// How an engine surfaces playback events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineFamily {
    /// The engine exposes its own event API (stalls, quality, ads, cast)
    PlayerApi,
    /// The engine drives a media element; buffering must be inferred
    MediaElement,
}

impl PlayerKind {
    pub const ALL: [PlayerKind; 6] = [
        PlayerKind::Bitmovin,
        PlayerKind::Html5,
        PlayerKind::HlsJs,
        PlayerKind::Shaka,
        PlayerKind::DashJs,
        PlayerKind::VideoJs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerKind::Bitmovin => "bitmovin",
            PlayerKind::Html5 => "html5",
            PlayerKind::HlsJs => "hlsjs",
            PlayerKind::Shaka => "shaka",
            PlayerKind::DashJs => "dashjs",
            PlayerKind::VideoJs => "videojs",
        }
    }

    pub fn family(&self) -> EngineFamily {
        match self {
            PlayerKind::Bitmovin => EngineFamily::PlayerApi,
            PlayerKind::Html5
            | PlayerKind::HlsJs
            | PlayerKind::Shaka
            | PlayerKind::DashJs
            | PlayerKind::VideoJs => EngineFamily::MediaElement,
        }
    }
}

impl std::fmt::Display for PlayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlayerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.to_lowercase().replace(['.', '-', '_'], "");
        PlayerKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| Error::InvalidConfig(format!("unknown player kind: {}", s)))
    }
}

/// A video or audio quality level as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualityLevel {
    /// Bitrate in bps
    pub bitrate: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl QualityLevel {
    pub fn video(bitrate: u64, width: u32, height: u32) -> Self {
        Self {
            bitrate,
            width: Some(width),
            height: Some(height),
        }
    }

    pub fn audio(bitrate: u64) -> Self {
        Self {
            bitrate,
            width: None,
            height: None,
        }
    }
}

/// Track a quality observation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_roundtrip_through_from_str() {
        for event in CanonicalEvent::ALL {
            assert_eq!(event.as_str().parse::<CanonicalEvent>().unwrap(), event);
        }
        assert!("SPIN".parse::<CanonicalEvent>().is_err());
    }

    #[test]
    fn test_event_serde_names() {
        let json = serde_json::to_string(&CanonicalEvent::TimeChanged).unwrap();
        assert_eq!(json, "\"TIMECHANGED\"");
        let json = serde_json::to_string(&CanonicalEvent::UnMute).unwrap();
        assert_eq!(json, "\"UN_MUTE\"");
        let parsed: CanonicalEvent = serde_json::from_str("\"MANUAL_SOURCE_CHANGE\"").unwrap();
        assert_eq!(parsed, CanonicalEvent::ManualSourceChange);
    }

    #[test]
    fn test_state_serde_matches_as_str() {
        for state in State::ALL {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state.as_str()));
        }
    }

    #[test]
    fn test_callback_name_is_lowercase_state_name() {
        for state in State::ALL {
            assert_eq!(state.callback_name(), state.as_str().to_lowercase());
        }
    }

    #[test]
    fn test_trigger_parses_internal_and_canonical() {
        assert_eq!(
            "FINISH_MUTING".parse::<Trigger>().unwrap(),
            Trigger::FinishMuting
        );
        assert_eq!(
            "seek".parse::<Trigger>().unwrap(),
            Trigger::Event(CanonicalEvent::Seek)
        );
        assert_eq!(Trigger::PlaySeek.to_string(), "PLAY_SEEK");
    }

    #[test]
    fn test_payload_skips_missing_fields() {
        let json = serde_json::to_string(&EventPayload::at(12.5)).unwrap();
        assert_eq!(json, r#"{"currentTime":12.5}"#);
    }

    #[test]
    fn test_event_deserializes_without_payload() {
        let event: Event = serde_json::from_str(r#"{"event":"PLAY","timestamp":10}"#).unwrap();
        assert_eq!(event.kind, CanonicalEvent::Play);
        assert_eq!(event.payload, EventPayload::default());
    }

    #[test]
    fn test_player_kind_parsing() {
        assert_eq!("hls.js".parse::<PlayerKind>().unwrap(), PlayerKind::HlsJs);
        assert_eq!("Video.js".parse::<PlayerKind>().unwrap(), PlayerKind::VideoJs);
        assert_eq!(PlayerKind::Shaka.family(), EngineFamily::MediaElement);
        assert_eq!(PlayerKind::Bitmovin.family(), EngineFamily::PlayerApi);
    }
}
