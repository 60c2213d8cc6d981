//! Adapter for engines driving a media element
//!
//! Media elements report no stall events, so buffering is inferred: while
//! playback is neither paused nor ended, a playback position that has not
//! advanced for [`BUFFERING_TIMEOUT_MS`] synthesizes START_BUFFERING. Progress
//! after a synthesized stall yields END_BUFFERING followed by TIMECHANGED.

use super::{Adapter, PlaybackInfo, QualityTracker};
use crate::lifecycle::UnloadGuard;
use crate::types::{
    CanonicalEvent as E, Event, EventPayload, PlayerKind, QualityLevel, Timestamp, TrackKind,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Time without progress after which playback counts as stalled
pub const BUFFERING_TIMEOUT_MS: u64 = 1000;

/// Introspection surface of a media element
pub trait MediaElement: Send + Sync {
    /// Playback position in seconds
    fn current_time(&self) -> f64;
    fn paused(&self) -> bool;

    fn ended(&self) -> bool {
        false
    }
    fn muted(&self) -> bool {
        false
    }
    /// Content duration in seconds; infinite for live streams
    fn duration(&self) -> Option<f64> {
        None
    }
    fn autoplay(&self) -> Option<bool> {
        None
    }
    fn current_src(&self) -> Option<String> {
        None
    }
    /// Size of the element on the page
    fn client_size(&self) -> Option<(u32, u32)> {
        None
    }
    /// Total dropped frames since load
    fn dropped_frames(&self) -> Option<u64> {
        None
    }
}

/// DOM media events plus quality observations from the engine on top
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaEvent {
    LoadedMetadata,
    Play,
    Pause,
    Seeking,
    Seeked,
    TimeUpdate,
    VolumeChange,
    Ended,
    Emptied,
    Error { code: i64, message: String },
    QualityObserved { track: TrackKind, quality: QualityLevel },
}

/// Pending buffering-inference timer
#[derive(Debug, Clone, Copy, PartialEq)]
struct StallTimer {
    deadline: Timestamp,
    /// Position when the timer was armed
    position: f64,
}

/// Translates [`MediaEvent`]s and infers buffering
pub struct Html5Adapter {
    kind: PlayerKind,
    element: Arc<dyn MediaElement>,
    quality: QualityTracker,
    unload: Arc<UnloadGuard>,
    stall_timer: Option<StallTimer>,
    buffering: bool,
    last_position: f64,
    muted: bool,
}

impl Html5Adapter {
    pub fn new(kind: PlayerKind, element: Arc<dyn MediaElement>, unload: Arc<UnloadGuard>) -> Self {
        let muted = element.muted();
        let last_position = element.current_time();
        Self {
            kind,
            element,
            quality: QualityTracker::default(),
            unload,
            stall_timer: None,
            buffering: false,
            last_position,
            muted,
        }
    }

    /// Playback is inferred to be stalled
    pub fn is_buffering(&self) -> bool {
        self.buffering
    }

    fn payload(&self) -> EventPayload {
        EventPayload {
            current_time: Some(self.element.current_time()),
            dropped_frames: self.element.dropped_frames(),
            ..Default::default()
        }
    }

    fn event(&self, kind: E, now: Timestamp) -> Event {
        Event::new(kind, now).with_payload(self.payload())
    }

    fn is_progressing(&self) -> bool {
        !self.element.paused() && !self.element.ended()
    }

    fn arm_stall_timer(&mut self, now: Timestamp) {
        if self.is_progressing() {
            self.stall_timer = Some(StallTimer {
                deadline: now + BUFFERING_TIMEOUT_MS,
                position: self.element.current_time(),
            });
        } else {
            self.stall_timer = None;
        }
    }

    fn cancel_stall_timer(&mut self) {
        self.stall_timer = None;
    }

    fn on_time_update(&mut self, now: Timestamp) -> Vec<Event> {
        let position = self.element.current_time();
        if position == self.last_position {
            return Vec::new();
        }
        self.last_position = position;

        let mut events = Vec::with_capacity(2);
        if self.buffering {
            self.buffering = false;
            debug!(position, "Playback resumed after inferred stall");
            events.push(self.event(E::EndBuffering, now));
        }
        events.push(self.event(E::TimeChanged, now));
        self.arm_stall_timer(now);
        events
    }

    fn on_volume_change(&mut self, now: Timestamp) -> Vec<Event> {
        let muted = self.element.muted();
        if muted == self.muted {
            return Vec::new();
        }
        self.muted = muted;
        let kind = if muted { E::Mute } else { E::UnMute };
        vec![self.event(kind, now)]
    }

    fn unload_event(&mut self, now: Timestamp) -> Option<Event> {
        if !self.unload.fire() {
            debug!("Unload already reported");
            return None;
        }
        self.cancel_stall_timer();
        Some(self.event(E::Unload, now))
    }
}

impl Adapter for Html5Adapter {
    type Native = MediaEvent;

    fn kind(&self) -> PlayerKind {
        self.kind
    }

    fn translate(&mut self, native: MediaEvent, now: Timestamp) -> Vec<Event> {
        match native {
            MediaEvent::LoadedMetadata => vec![self.event(E::Ready, now)],
            MediaEvent::Play => {
                self.arm_stall_timer(now);
                vec![self.event(E::Play, now)]
            }
            MediaEvent::Pause => {
                self.cancel_stall_timer();
                self.buffering = false;
                vec![self.event(E::Pause, now)]
            }
            MediaEvent::Seeking => {
                self.cancel_stall_timer();
                vec![self.event(E::Seek, now)]
            }
            MediaEvent::Seeked => {
                self.last_position = self.element.current_time();
                self.arm_stall_timer(now);
                vec![self.event(E::Seeked, now)]
            }
            MediaEvent::TimeUpdate => self.on_time_update(now),
            MediaEvent::VolumeChange => self.on_volume_change(now),
            MediaEvent::Ended => {
                self.cancel_stall_timer();
                self.buffering = false;
                vec![self.event(E::End, now)]
            }
            MediaEvent::Emptied => {
                self.cancel_stall_timer();
                self.buffering = false;
                self.quality.reset();
                vec![self.event(E::SourceUnloaded, now)]
            }
            MediaEvent::Error { code, message } => {
                self.cancel_stall_timer();
                let mut event = self.event(E::Error, now);
                event.payload.code = Some(code);
                event.payload.message = Some(message);
                vec![event]
            }
            MediaEvent::QualityObserved { track, quality } => {
                let payload = self.payload();
                self.quality
                    .change_event(track, &quality, payload, now)
                    .into_iter()
                    .collect()
            }
        }
    }

    fn poll_timers(&mut self, now: Timestamp) -> Vec<Event> {
        let Some(timer) = self.stall_timer else {
            return Vec::new();
        };
        if now < timer.deadline {
            return Vec::new();
        }
        self.stall_timer = None;

        if !self.is_progressing() || self.buffering {
            return Vec::new();
        }
        if self.element.current_time() != timer.position {
            // Progress without a timeupdate; keep watching.
            self.arm_stall_timer(now);
            return Vec::new();
        }

        self.buffering = true;
        debug!(position = timer.position, "No progress, inferring stall");
        vec![self.event(E::StartBuffering, now)]
    }

    fn next_deadline(&self) -> Option<Timestamp> {
        self.stall_timer.map(|t| t.deadline)
    }

    fn current_playback_info(&self) -> PlaybackInfo {
        let mut info = match self.element.current_src() {
            Some(src) => PlaybackInfo::default().with_source(&src),
            None => PlaybackInfo::default(),
        };
        info.player_tech = Some("html5".into());
        match self.element.duration() {
            Some(d) if d.is_infinite() => info.is_live = Some(true),
            Some(d) if d > 0.0 => {
                info.is_live = Some(false);
                info.video_duration = Some((d * 1000.0).round() as u64);
            }
            _ => {}
        }
        info.is_muted = Some(self.element.muted());
        info.autoplay = self.element.autoplay();
        if let Some((width, height)) = self.element.client_size() {
            info.video_window_width = Some(width);
            info.video_window_height = Some(height);
        }
        info
    }

    fn on_page_unload(&mut self, now: Timestamp) -> Option<Event> {
        self.unload_event(now)
    }
}
