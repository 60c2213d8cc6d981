//! Analytics sample wire format
//!
//! A sample is one flat JSON object. Identity and environment fields persist
//! across the whole impression; per-slice fields (durations, error details,
//! dropped frames) are cleared after every send.

use crate::adapter::PlaybackInfo;
use crate::config::CollectorConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One analytics sample, serialized as flat camelCase JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    // Identity
    pub key: String,
    pub domain: String,
    pub impression_id: Uuid,
    pub sequence_number: u32,
    pub analytics_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cdn_provider: Option<String>,
    #[serde(flatten)]
    pub custom_data: BTreeMap<String, String>,

    // Player environment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_tech: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_live: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_window_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_window_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autoplay: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mpd_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub m3u8_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prog_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prog_bitrate: Option<u64>,
    pub is_muted: bool,
    pub is_casting: bool,

    // Current quality
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_bitrate: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_bitrate: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_playback_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_playback_height: Option<u32>,

    // Slice
    /// Lower-cased name of the state the slice was spent in
    pub state: String,
    /// Slice duration in ms
    pub duration: u64,
    /// Wall-clock send time, ms since the epoch
    pub time: i64,
    pub played: u64,
    pub paused: u64,
    pub buffered: u64,
    pub seeked: u64,
    pub ad: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_startup_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_startup_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startup_time: Option<u64>,
    /// Playback position at slice start, ms
    #[serde(rename = "videotimeStart")]
    pub video_time_start: u64,
    /// Playback position at slice end, ms
    #[serde(rename = "videotimeEnd")]
    pub video_time_end: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dropped_frames: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Sample {
    /// Sample template for a new impression
    pub fn for_config(config: &CollectorConfig) -> Self {
        Self {
            key: config.key.clone(),
            domain: config.domain.clone(),
            impression_id: Uuid::new_v4(),
            analytics_version: crate::VERSION.to_string(),
            player_key: config.player_key.clone(),
            user_id: config.user_id.clone(),
            video_id: config.video_id.clone(),
            cdn_provider: config.cdn_provider.clone(),
            custom_data: config.custom_data.clone(),
            ..Default::default()
        }
    }

    /// Copy every field the adapter could determine
    pub fn apply_playback_info(&mut self, info: &PlaybackInfo) {
        fn set<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                target.clone_from(value);
            }
        }

        set(&mut self.player_tech, &info.player_tech);
        set(&mut self.version, &info.version);
        set(&mut self.is_live, &info.is_live);
        set(&mut self.stream_format, &info.stream_format);
        set(&mut self.video_duration, &info.video_duration);
        set(&mut self.video_window_width, &info.video_window_width);
        set(&mut self.video_window_height, &info.video_window_height);
        set(&mut self.autoplay, &info.autoplay);
        set(&mut self.mpd_url, &info.mpd_url);
        set(&mut self.m3u8_url, &info.m3u8_url);
        set(&mut self.prog_url, &info.prog_url);
        set(&mut self.prog_bitrate, &info.prog_bitrate);
        if let Some(muted) = info.is_muted {
            self.is_muted = muted;
        }
    }

    /// Reset the fields that describe a single slice
    pub fn clear_slice(&mut self) {
        self.state.clear();
        self.duration = 0;
        self.played = 0;
        self.paused = 0;
        self.buffered = 0;
        self.seeked = 0;
        self.ad = 0;
        self.player_startup_time = None;
        self.video_startup_time = None;
        self.startup_time = None;
        self.dropped_frames = None;
        self.error_code = None;
        self.error_message = None;
    }
}

/// How a sample must be delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    /// Regular asynchronous POST
    Regular,
    /// Last sample of the page; the transport must get it out before unload
    Unload,
}

/// A sample waiting in the outbox
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedSample {
    pub sample: Sample,
    pub delivery: Delivery,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_field_names() {
        let mut config = CollectorConfig::new("key-1", "example.com");
        config
            .custom_data
            .insert("customData1".into(), "cohort-a".into());
        let mut sample = Sample::for_config(&config);
        sample.video_time_start = 1_000;
        sample.state = "playing".into();

        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["key"], "key-1");
        assert_eq!(json["customData1"], "cohort-a");
        assert_eq!(json["videotimeStart"], 1_000);
        assert_eq!(json["state"], "playing");
        assert!(json.get("impressionId").is_some());
        assert!(json.get("errorCode").is_none());
    }

    #[test]
    fn test_playback_info_keeps_known_fields() {
        let mut sample = Sample {
            stream_format: Some("hls".into()),
            ..Default::default()
        };
        let info = PlaybackInfo {
            is_live: Some(true),
            ..Default::default()
        };
        sample.apply_playback_info(&info);

        assert_eq!(sample.is_live, Some(true));
        assert_eq!(sample.stream_format.as_deref(), Some("hls"));
    }

    #[test]
    fn test_clear_slice_keeps_identity() {
        let mut sample = Sample::for_config(&CollectorConfig::new("k", "d"));
        let impression = sample.impression_id;
        sample.played = 10;
        sample.error_code = Some(3);
        sample.video_bitrate = Some(800_000);
        sample.clear_slice();

        assert_eq!(sample.played, 0);
        assert_eq!(sample.error_code, None);
        assert_eq!(sample.video_bitrate, Some(800_000));
        assert_eq!(sample.impression_id, impression);
    }
}
