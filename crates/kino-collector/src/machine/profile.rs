//! Per-family machine parameters
//!
//! One engine serves every player family. A profile supplies the family's
//! transition table, its guard timings, and the few behavioral switches that
//! differ between engines.

use super::table::{full_table, html5_table, TransitionTable};
use crate::config::CollectorConfig;
use crate::types::{EngineFamily, PlayerKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A SEEK this soon after entering PAUSE continues an active seek
pub const PAUSE_SEEK_WINDOW_MS: u64 = 200;

/// Delay before a SEEKED in PAUSED_SEEKING is confirmed as PAUSE
pub const SEEKED_PAUSE_DELAY_MS: u64 = 300;

/// Longest slice a durable state may accumulate before a heartbeat closes it
pub const HEARTBEAT_INTERVAL_MS: u64 = 59_700;

/// Guard timings used by the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardTiming {
    pub pause_seek_window_ms: u64,
    pub seeked_pause_delay_ms: u64,
    pub heartbeat_interval_ms: u64,
}

impl Default for GuardTiming {
    fn default() -> Self {
        Self {
            pause_seek_window_ms: PAUSE_SEEK_WINDOW_MS,
            seeked_pause_delay_ms: SEEKED_PAUSE_DELAY_MS,
            heartbeat_interval_ms: HEARTBEAT_INTERVAL_MS,
        }
    }
}

/// Transition table, timings and switches for one player family
#[derive(Debug, Clone)]
pub struct MachineProfile {
    /// Profile name, used in logs
    pub name: &'static str,
    /// Transition relation
    pub table: Arc<TransitionTable>,
    /// Guard timings
    pub timing: GuardTiming,
    /// Leave END_PLAY_SEEKING on its own instead of waiting for playback
    /// to report progress
    pub auto_finish_play_seeking: bool,
}

impl MachineProfile {
    /// Engines with their own event API: ads, casting, stall events
    pub fn full() -> Self {
        Self {
            name: "full",
            table: Arc::new(full_table()),
            timing: GuardTiming::default(),
            auto_finish_play_seeking: false,
        }
    }

    /// Media-element engines: no ads or casting, seek ends on SEEKED
    pub fn html5() -> Self {
        Self {
            name: "html5",
            table: Arc::new(html5_table()),
            timing: GuardTiming::default(),
            auto_finish_play_seeking: true,
        }
    }

    /// Profile matching a player engine
    pub fn for_player(kind: PlayerKind) -> Self {
        match kind.family() {
            EngineFamily::PlayerApi => Self::full(),
            EngineFamily::MediaElement => Self::html5(),
        }
    }

    /// Profile by name (`full` or `html5`)
    pub fn by_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "full" => Some(Self::full()),
            "html5" => Some(Self::html5()),
            _ => None,
        }
    }

    pub fn with_timing(mut self, timing: GuardTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Apply timing overrides from the collector configuration
    pub fn with_config(mut self, config: &CollectorConfig) -> Self {
        if let Some(window) = config.pause_seek_window_ms {
            self.timing.pause_seek_window_ms = window;
        }
        if let Some(delay) = config.seeked_pause_delay_ms {
            self.timing.seeked_pause_delay_ms = delay;
        }
        if let Some(interval) = config.heartbeat_interval_ms {
            self.timing.heartbeat_interval_ms = interval;
        }
        self
    }
}
