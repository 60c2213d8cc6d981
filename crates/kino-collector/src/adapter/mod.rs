//! Player adapters
//!
//! An adapter turns one engine's native callbacks into [`Event`]s from the
//! canonical vocabulary and answers introspection queries about the engine.
//! Two families are supported:
//!
//! - [`PlayerApiAdapter`]: engines with their own event API, including stall,
//!   quality, ad and cast events
//! - [`Html5Adapter`]: engines driving a media element, where buffering has to
//!   be inferred from a stalled playback position
//!
//! Adapters are synchronous. Timers are deadline driven: the host asks for
//! [`Adapter::next_deadline`] and calls [`Adapter::poll_timers`] once it passes.

mod html5;
mod player_api;

pub use html5::{Html5Adapter, MediaElement, MediaEvent, BUFFERING_TIMEOUT_MS};
pub use player_api::{PlayerApi, PlayerApiAdapter, PlayerEvent};

use crate::error::{Error, Result};
use crate::lifecycle::UnloadGuard;
use crate::machine::MachineProfile;
use crate::types::{
    CanonicalEvent, EngineFamily, Event, EventPayload, PlayerKind, QualityLevel, Timestamp,
    TrackKind,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Best-effort snapshot of the engine. Undeterminable fields stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_live: Option<bool>,
    /// Engine version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Rendering technology (`html5`, `native`, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_tech: Option<String>,
    /// Content duration in ms
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_duration: Option<u64>,
    /// `dash`, `hls` or `progressive`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_window_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_window_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_muted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autoplay: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mpd_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub m3u8_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prog_url: Option<String>,
    /// Bitrate of a progressive source, bps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prog_bitrate: Option<u64>,
}

impl PlaybackInfo {
    /// Fill the stream format and the matching URL field from a source URL
    pub fn with_source(mut self, source: &str) -> Self {
        let path = source.split(['?', '#']).next().unwrap_or(source).to_lowercase();
        if path.ends_with(".mpd") {
            self.stream_format = Some("dash".into());
            self.mpd_url = Some(source.to_string());
        } else if path.ends_with(".m3u8") {
            self.stream_format = Some("hls".into());
            self.m3u8_url = Some(source.to_string());
        } else {
            self.stream_format = Some("progressive".into());
            self.prog_url = Some(source.to_string());
        }
        self
    }
}

/// Translation of one engine's native events into canonical events
pub trait Adapter: Send {
    /// Native event type of the engine
    type Native;

    fn kind(&self) -> PlayerKind;

    /// Translate one native event observed at `now`
    fn translate(&mut self, native: Self::Native, now: Timestamp) -> Vec<Event>;

    /// Fire adapter timers that are due at `now`
    fn poll_timers(&mut self, _now: Timestamp) -> Vec<Event> {
        Vec::new()
    }

    /// Earliest pending timer deadline
    fn next_deadline(&self) -> Option<Timestamp> {
        None
    }

    fn current_playback_info(&self) -> PlaybackInfo;

    /// Page is going away. Yields UNLOAD the first time only.
    fn on_page_unload(&mut self, now: Timestamp) -> Option<Event>;
}

/// Edge detector for quality observations
#[derive(Debug, Clone, Default)]
pub struct QualityTracker {
    video: Option<u64>,
    audio: Option<u64>,
}

impl QualityTracker {
    /// Record an observation. Returns true when the bitrate differs from the
    /// last one reported for the track.
    pub fn observe(&mut self, track: TrackKind, level: &QualityLevel) -> bool {
        let last = match track {
            TrackKind::Video => &mut self.video,
            TrackKind::Audio => &mut self.audio,
        };
        if *last == Some(level.bitrate) {
            return false;
        }
        *last = Some(level.bitrate);
        true
    }

    pub fn reset(&mut self) {
        self.video = None;
        self.audio = None;
    }

    /// Canonical event for a change on `track`, or `None` if nothing changed
    pub fn change_event(
        &mut self,
        track: TrackKind,
        level: &QualityLevel,
        payload: EventPayload,
        now: Timestamp,
    ) -> Option<Event> {
        if !self.observe(track, level) {
            return None;
        }
        let kind = match track {
            TrackKind::Video => CanonicalEvent::VideoChange,
            TrackKind::Audio => CanonicalEvent::AudioChange,
        };
        debug!(track = ?track, bitrate = level.bitrate, "Quality changed");
        Some(Event::new(kind, now).with_payload(payload.with_quality(level)))
    }
}

/// Handle to the engine an adapter attaches to
#[derive(Clone)]
pub enum EngineHandle {
    PlayerApi(Arc<dyn PlayerApi>),
    MediaElement(Arc<dyn MediaElement>),
}

impl EngineHandle {
    fn family(&self) -> EngineFamily {
        match self {
            EngineHandle::PlayerApi(_) => EngineFamily::PlayerApi,
            EngineHandle::MediaElement(_) => EngineFamily::MediaElement,
        }
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EngineHandle").field(&self.family()).finish()
    }
}

/// Detects which engine is present on the page
pub trait EngineProbe {
    fn detect(&self) -> Option<PlayerKind>;
}

/// Adapter picked by the [`AdapterFactory`]
pub enum SelectedAdapter {
    PlayerApi(PlayerApiAdapter),
    Html5(Html5Adapter),
}

impl SelectedAdapter {
    pub fn kind(&self) -> PlayerKind {
        match self {
            SelectedAdapter::PlayerApi(a) => a.kind(),
            SelectedAdapter::Html5(a) => a.kind(),
        }
    }

    /// Machine profile for the selected engine family
    pub fn profile(&self) -> MachineProfile {
        MachineProfile::for_player(self.kind())
    }

    pub fn poll_timers(&mut self, now: Timestamp) -> Vec<Event> {
        match self {
            SelectedAdapter::PlayerApi(a) => a.poll_timers(now),
            SelectedAdapter::Html5(a) => a.poll_timers(now),
        }
    }

    pub fn next_deadline(&self) -> Option<Timestamp> {
        match self {
            SelectedAdapter::PlayerApi(a) => a.next_deadline(),
            SelectedAdapter::Html5(a) => a.next_deadline(),
        }
    }

    pub fn current_playback_info(&self) -> PlaybackInfo {
        match self {
            SelectedAdapter::PlayerApi(a) => a.current_playback_info(),
            SelectedAdapter::Html5(a) => a.current_playback_info(),
        }
    }

    pub fn on_page_unload(&mut self, now: Timestamp) -> Option<Event> {
        match self {
            SelectedAdapter::PlayerApi(a) => a.on_page_unload(now),
            SelectedAdapter::Html5(a) => a.on_page_unload(now),
        }
    }

    pub fn as_player_api_mut(&mut self) -> Option<&mut PlayerApiAdapter> {
        match self {
            SelectedAdapter::PlayerApi(a) => Some(a),
            SelectedAdapter::Html5(_) => None,
        }
    }

    pub fn as_html5_mut(&mut self) -> Option<&mut Html5Adapter> {
        match self {
            SelectedAdapter::Html5(a) => Some(a),
            SelectedAdapter::PlayerApi(_) => None,
        }
    }
}

/// Builds the adapter matching an engine
pub struct AdapterFactory;

impl AdapterFactory {
    /// Attach an adapter for `kind` to `engine`. The engine must expose the
    /// API the kind's family needs.
    pub fn create(kind: PlayerKind, engine: EngineHandle) -> Result<SelectedAdapter> {
        Self::create_with_guard(kind, engine, Arc::new(UnloadGuard::new()))
    }

    /// Like [`create`](Self::create), sharing an unload guard with other hooks
    pub fn create_with_guard(
        kind: PlayerKind,
        engine: EngineHandle,
        guard: Arc<UnloadGuard>,
    ) -> Result<SelectedAdapter> {
        let adapter = match (kind.family(), engine) {
            (EngineFamily::PlayerApi, EngineHandle::PlayerApi(api)) => {
                SelectedAdapter::PlayerApi(PlayerApiAdapter::new(kind, api, guard))
            }
            (EngineFamily::MediaElement, EngineHandle::MediaElement(element)) => {
                SelectedAdapter::Html5(Html5Adapter::new(kind, element, guard))
            }
            (family, engine) => {
                debug!(
                    expected = ?family,
                    got = ?engine,
                    "Engine handle does not match player kind"
                );
                return Err(Error::player_api_missing(kind.as_str()));
            }
        };
        info!(player = %kind, "Adapter attached");
        Ok(adapter)
    }

    /// Detect the engine with `probe`, then attach to it
    pub fn detect(probe: &dyn EngineProbe, engine: EngineHandle) -> Result<SelectedAdapter> {
        let kind = probe
            .detect()
            .ok_or_else(|| Error::player_api_missing("no supported player detected"))?;
        Self::create(kind, engine)
    }
}
