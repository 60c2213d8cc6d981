//! Adapter for engines with their own event API

use super::{Adapter, PlaybackInfo, QualityTracker};
use crate::lifecycle::UnloadGuard;
use crate::types::{
    CanonicalEvent as E, Event, EventPayload, PlayerKind, QualityLevel, Timestamp, TrackKind,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Introspection surface of an SDK-style engine. Everything but the playback
/// position is optional.
pub trait PlayerApi: Send + Sync {
    /// Playback position in seconds
    fn current_time(&self) -> f64;

    fn version(&self) -> Option<String> {
        None
    }
    fn player_tech(&self) -> Option<String> {
        None
    }
    fn is_live(&self) -> Option<bool> {
        None
    }
    /// Content duration in seconds
    fn duration(&self) -> Option<f64> {
        None
    }
    fn is_muted(&self) -> Option<bool> {
        None
    }
    fn autoplay(&self) -> Option<bool> {
        None
    }
    /// Total dropped frames since load
    fn dropped_frames(&self) -> Option<u64> {
        None
    }
    fn source_url(&self) -> Option<String> {
        None
    }
    /// Size of the rendering surface
    fn window_size(&self) -> Option<(u32, u32)> {
        None
    }
    fn video_quality(&self) -> Option<QualityLevel> {
        None
    }
}

/// Native events of an SDK-style engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerEvent {
    Ready,
    SourceLoaded,
    SourceUnloaded,
    SourceChange,
    Play {
        #[serde(default)]
        resuming: bool,
    },
    Paused,
    Seek,
    Seeked,
    TimeChanged,
    StallStarted,
    StallEnded,
    VideoQualityChanged { quality: QualityLevel },
    AudioQualityChanged { quality: QualityLevel },
    Muted,
    Unmuted,
    Error { code: i64, message: String },
    AdStarted,
    AdFinished,
    CastStarted,
    CastStopped,
    PlaybackFinished,
    Destroy,
}

/// Translates [`PlayerEvent`]s; quality changes are edge-triggered
pub struct PlayerApiAdapter {
    kind: PlayerKind,
    api: Arc<dyn PlayerApi>,
    quality: QualityTracker,
    unload: Arc<UnloadGuard>,
}

impl PlayerApiAdapter {
    pub fn new(kind: PlayerKind, api: Arc<dyn PlayerApi>, unload: Arc<UnloadGuard>) -> Self {
        Self {
            kind,
            api,
            quality: QualityTracker::default(),
            unload,
        }
    }

    fn payload(&self) -> EventPayload {
        EventPayload {
            current_time: Some(self.api.current_time()),
            dropped_frames: self.api.dropped_frames(),
            ..Default::default()
        }
    }

    fn simple(&self, kind: E, now: Timestamp) -> Vec<Event> {
        vec![Event::new(kind, now).with_payload(self.payload())]
    }

    fn unload_event(&self, now: Timestamp) -> Option<Event> {
        if self.unload.fire() {
            Some(Event::new(E::Unload, now).with_payload(self.payload()))
        } else {
            debug!("Unload already reported");
            None
        }
    }
}

impl Adapter for PlayerApiAdapter {
    type Native = PlayerEvent;

    fn kind(&self) -> PlayerKind {
        self.kind
    }

    fn translate(&mut self, native: PlayerEvent, now: Timestamp) -> Vec<Event> {
        match native {
            PlayerEvent::Ready => self.simple(E::Ready, now),
            PlayerEvent::SourceLoaded => self.simple(E::SourceLoaded, now),
            PlayerEvent::SourceUnloaded => {
                self.quality.reset();
                self.simple(E::SourceUnloaded, now)
            }
            PlayerEvent::SourceChange => {
                self.quality.reset();
                self.simple(E::ManualSourceChange, now)
            }
            PlayerEvent::Play { resuming } => {
                let mut payload = self.payload();
                payload.resuming = resuming.then_some(true);
                vec![Event::new(E::Play, now).with_payload(payload)]
            }
            PlayerEvent::Paused => self.simple(E::Pause, now),
            PlayerEvent::Seek => self.simple(E::Seek, now),
            PlayerEvent::Seeked => self.simple(E::Seeked, now),
            PlayerEvent::TimeChanged => self.simple(E::TimeChanged, now),
            PlayerEvent::StallStarted => self.simple(E::StartBuffering, now),
            PlayerEvent::StallEnded => self.simple(E::EndBuffering, now),
            PlayerEvent::VideoQualityChanged { quality } => {
                let payload = self.payload();
                self.quality
                    .change_event(TrackKind::Video, &quality, payload, now)
                    .into_iter()
                    .collect()
            }
            PlayerEvent::AudioQualityChanged { quality } => {
                let payload = self.payload();
                self.quality
                    .change_event(TrackKind::Audio, &quality, payload, now)
                    .into_iter()
                    .collect()
            }
            PlayerEvent::Muted => self.simple(E::Mute, now),
            PlayerEvent::Unmuted => self.simple(E::UnMute, now),
            PlayerEvent::Error { code, message } => {
                let mut payload = self.payload();
                payload.code = Some(code);
                payload.message = Some(message);
                vec![Event::new(E::Error, now).with_payload(payload)]
            }
            PlayerEvent::AdStarted => self.simple(E::StartAd, now),
            PlayerEvent::AdFinished => self.simple(E::EndAd, now),
            PlayerEvent::CastStarted => self.simple(E::StartCast, now),
            PlayerEvent::CastStopped => self.simple(E::EndCast, now),
            PlayerEvent::PlaybackFinished => self.simple(E::End, now),
            PlayerEvent::Destroy => self.unload_event(now).into_iter().collect(),
        }
    }

    fn current_playback_info(&self) -> PlaybackInfo {
        let mut info = match self.api.source_url() {
            Some(url) => PlaybackInfo::default().with_source(&url),
            None => PlaybackInfo::default(),
        };
        info.is_live = self.api.is_live();
        info.version = self.api.version();
        info.player_tech = self.api.player_tech();
        info.video_duration = self
            .api
            .duration()
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| (d * 1000.0).round() as u64);
        info.is_muted = self.api.is_muted();
        info.autoplay = self.api.autoplay();
        if let Some((width, height)) = self.api.window_size() {
            info.video_window_width = Some(width);
            info.video_window_height = Some(height);
        }
        if info.prog_url.is_some() {
            info.prog_bitrate = self.api.video_quality().map(|q| q.bitrate);
        }
        info
    }

    fn on_page_unload(&mut self, now: Timestamp) -> Option<Event> {
        self.unload_event(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakePlayer {
        position: Mutex<f64>,
    }

    impl PlayerApi for FakePlayer {
        fn current_time(&self) -> f64 {
            *self.position.lock().unwrap()
        }
        fn version(&self) -> Option<String> {
            Some("8.1.0".into())
        }
        fn duration(&self) -> Option<f64> {
            Some(120.5)
        }
        fn source_url(&self) -> Option<String> {
            Some("https://cdn.example.com/vod/manifest.mpd".into())
        }
        fn dropped_frames(&self) -> Option<u64> {
            Some(3)
        }
    }

    fn adapter() -> (PlayerApiAdapter, Arc<FakePlayer>) {
        let player = Arc::new(FakePlayer::default());
        let adapter = PlayerApiAdapter::new(
            PlayerKind::Bitmovin,
            player.clone(),
            Arc::new(UnloadGuard::new()),
        );
        (adapter, player)
    }

    fn kinds(events: &[Event]) -> Vec<E> {
        events.iter().map(|e| e.kind).collect()
    }

    #[test]
    fn test_translates_native_events() {
        let (mut adapter, player) = adapter();
        *player.position.lock().unwrap() = 12.5;

        let events = adapter.translate(PlayerEvent::StallStarted, 100);
        assert_eq!(kinds(&events), vec![E::StartBuffering]);
        assert_eq!(events[0].timestamp, 100);
        assert_eq!(events[0].payload.current_time, Some(12.5));
        assert_eq!(events[0].payload.dropped_frames, Some(3));

        assert_eq!(
            kinds(&adapter.translate(PlayerEvent::SourceChange, 1)),
            vec![E::ManualSourceChange]
        );
        assert_eq!(kinds(&adapter.translate(PlayerEvent::CastStarted, 2)), vec![E::StartCast]);
        assert_eq!(kinds(&adapter.translate(PlayerEvent::PlaybackFinished, 3)), vec![E::End]);
    }

    #[test]
    fn test_error_payload() {
        let (mut adapter, _) = adapter();
        let events = adapter.translate(
            PlayerEvent::Error {
                code: 1_201,
                message: "source error".into(),
            },
            5,
        );
        assert_eq!(events[0].kind, E::Error);
        assert_eq!(events[0].payload.code, Some(1_201));
        assert_eq!(events[0].payload.message.as_deref(), Some("source error"));
    }

    #[test]
    fn test_quality_changes_are_edge_triggered() {
        let (mut adapter, _) = adapter();
        let hd = QualityLevel::video(4_000_000, 1920, 1080);

        let first = adapter.translate(PlayerEvent::VideoQualityChanged { quality: hd }, 10);
        let repeat = adapter.translate(PlayerEvent::VideoQualityChanged { quality: hd }, 20);

        assert_eq!(kinds(&first), vec![E::VideoChange]);
        assert_eq!(first[0].payload.bitrate, Some(4_000_000));
        assert_eq!(first[0].payload.height, Some(1080));
        assert!(repeat.is_empty());
    }

    #[test]
    fn test_destroy_and_page_unload_report_once() {
        let (mut adapter, _) = adapter();
        assert!(adapter.on_page_unload(10).is_some());
        assert!(adapter.translate(PlayerEvent::Destroy, 11).is_empty());
        assert!(adapter.on_page_unload(12).is_none());
    }

    #[test]
    fn test_playback_info() {
        let (adapter, _) = adapter();
        let info = adapter.current_playback_info();

        assert_eq!(info.version.as_deref(), Some("8.1.0"));
        assert_eq!(info.video_duration, Some(120_500));
        assert_eq!(info.stream_format.as_deref(), Some("dash"));
        assert_eq!(info.is_live, None);
    }

    #[test]
    fn test_native_event_json() {
        let event: PlayerEvent =
            serde_json::from_str(r#"{"type": "play", "resuming": true}"#).unwrap();
        assert_eq!(event, PlayerEvent::Play { resuming: true });
    }
}
