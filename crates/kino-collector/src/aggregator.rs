//! Sample aggregation
//!
//! [`SampleAggregator`] is the production [`StateCallbacks`] implementation.
//! It folds each closed state slice into the current [`Sample`], queues the
//! sample in an outbox and clears the per-slice fields. The session drains the
//! outbox and hands the samples to the transport.

use crate::adapter::PlaybackInfo;
use crate::callbacks::{StateCallbacks, StateExit};
use crate::config::CollectorConfig;
use crate::sample::{Delivery, QueuedSample, Sample};
use crate::types::{EventPayload, State, Timestamp};
use chrono::Utc;
use std::collections::VecDeque;
use tracing::{debug, info};
use uuid::Uuid;

/// Builds samples from state machine callbacks
#[derive(Debug, Clone)]
pub struct SampleAggregator {
    /// Sample being filled
    sample: Sample,
    /// Samples ready to send
    outbox: VecDeque<QueuedSample>,
    /// Next sequence number within the impression
    sequence: u32,
    /// Player startup time, added to the video startup time once known
    player_startup_time: u64,
    /// Last absolute dropped-frame count reported by the engine
    last_dropped_frames: Option<u64>,
}

impl SampleAggregator {
    pub fn new(config: &CollectorConfig) -> Self {
        Self::from_template(Sample::for_config(config))
    }

    /// Aggregate into samples derived from `template`
    pub fn from_template(template: Sample) -> Self {
        Self {
            sample: template,
            outbox: VecDeque::new(),
            sequence: 0,
            player_startup_time: 0,
            last_dropped_frames: None,
        }
    }

    /// Record the player engine name
    pub fn set_player(&mut self, player: impl Into<String>) {
        self.sample.player = Some(player.into());
    }

    pub fn apply_playback_info(&mut self, info: &PlaybackInfo) {
        self.sample.apply_playback_info(info);
    }

    /// Sample currently being filled
    pub fn current(&self) -> &Sample {
        &self.sample
    }

    pub fn impression_id(&self) -> Uuid {
        self.sample.impression_id
    }

    pub fn pending(&self) -> usize {
        self.outbox.len()
    }

    /// Take every queued sample, oldest first
    pub fn drain_samples(&mut self) -> Vec<QueuedSample> {
        self.outbox.drain(..).collect()
    }

    /// Start a new impression: fresh id, sequence back to zero
    pub fn new_impression(&mut self) {
        self.sample.impression_id = Uuid::new_v4();
        self.sequence = 0;
        self.player_startup_time = 0;
        self.last_dropped_frames = None;
        info!(impression_id = %self.sample.impression_id, "New impression");
    }

    fn begin_slice(&mut self, exit: &StateExit<'_>) {
        self.sample.state = exit.state_name().to_string();
        self.sample.duration = exit.duration_ms;
    }

    fn send(&mut self, delivery: Delivery) {
        self.sample.sequence_number = self.sequence;
        self.sequence += 1;
        self.sample.time = Utc::now().timestamp_millis();

        debug!(
            state = %self.sample.state,
            duration = self.sample.duration,
            sequence = self.sample.sequence_number,
            "Queued sample"
        );

        self.outbox.push_back(QueuedSample {
            sample: self.sample.clone(),
            delivery,
        });
        self.sample.clear_slice();
    }

    fn send_duration_only(&mut self, exit: &StateExit<'_>) {
        self.begin_slice(exit);
        self.send(Delivery::Regular);
    }
}

fn millis(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    }
}

impl StateCallbacks for SampleAggregator {
    fn setup(&mut self, exit: &StateExit<'_>) {
        self.player_startup_time = exit.duration_ms;
        self.sample.player_startup_time = Some(exit.duration_ms);
    }

    fn startup(&mut self, exit: &StateExit<'_>) {
        self.begin_slice(exit);
        self.sample.video_startup_time = Some(exit.duration_ms);
        self.sample.startup_time = Some(exit.duration_ms + self.player_startup_time);
        self.sample.player_startup_time = Some(self.player_startup_time);
        self.player_startup_time = 0;
        self.send(Delivery::Regular);
    }

    fn playing(&mut self, exit: &StateExit<'_>) {
        self.begin_slice(exit);
        self.sample.played = exit.duration_ms;
        self.send(Delivery::Regular);
    }

    fn rebuffering(&mut self, exit: &StateExit<'_>) {
        self.begin_slice(exit);
        self.sample.buffered = exit.duration_ms;
        self.send(Delivery::Regular);
    }

    fn pause(&mut self, exit: &StateExit<'_>) {
        self.begin_slice(exit);
        self.sample.paused = exit.duration_ms;
        self.send(Delivery::Regular);
    }

    fn qualitychange(&mut self, exit: &StateExit<'_>) {
        self.send_duration_only(exit);
    }

    fn qualitychange_pause(&mut self, exit: &StateExit<'_>) {
        self.send_duration_only(exit);
    }

    fn qualitychange_rebuffering(&mut self, exit: &StateExit<'_>) {
        self.send_duration_only(exit);
    }

    fn paused_seeking(&mut self, exit: &StateExit<'_>) {
        self.begin_slice(exit);
        self.sample.seeked = exit.duration_ms;
        self.send(Delivery::Regular);
    }

    fn end_play_seeking(&mut self, exit: &StateExit<'_>) {
        self.begin_slice(exit);
        self.sample.seeked = exit.duration_ms;
        self.send(Delivery::Regular);
    }

    fn ad(&mut self, exit: &StateExit<'_>) {
        self.begin_slice(exit);
        self.sample.ad = exit.duration_ms;
        self.send(Delivery::Regular);
    }

    fn muting_ready(&mut self, exit: &StateExit<'_>) {
        self.send_duration_only(exit);
    }

    fn muting_play(&mut self, exit: &StateExit<'_>) {
        self.send_duration_only(exit);
    }

    fn muting_pause(&mut self, exit: &StateExit<'_>) {
        self.send_duration_only(exit);
    }

    fn casting(&mut self, exit: &StateExit<'_>) {
        self.send_duration_only(exit);
        self.sample.is_casting = false;
    }

    fn source_changing(&mut self, _exit: &StateExit<'_>) {
        self.new_impression();
    }

    fn end(&mut self, exit: &StateExit<'_>) {
        self.send_duration_only(exit);
    }

    fn heartbeat(&mut self, exit: &StateExit<'_>) {
        self.begin_slice(exit);
        match exit.state {
            State::Playing => self.sample.played = exit.duration_ms,
            State::Pause => self.sample.paused = exit.duration_ms,
            State::Rebuffering => self.sample.buffered = exit.duration_ms,
            _ => {}
        }
        self.send(Delivery::Regular);
    }

    fn playing_and_bye(&mut self, exit: &StateExit<'_>) {
        self.begin_slice(exit);
        self.sample.played = exit.duration_ms;
        self.send(Delivery::Unload);
    }

    fn error(&mut self, payload: &EventPayload) {
        self.sample.state = State::Error.callback_name().to_string();
        self.sample.duration = 0;
        self.sample.error_code = payload.code;
        self.sample.error_message.clone_from(&payload.message);
        self.send(Delivery::Regular);
    }

    fn video_change(&mut self, payload: &EventPayload) {
        if payload.bitrate.is_some() {
            self.sample.video_bitrate = payload.bitrate;
        }
        if payload.width.is_some() {
            self.sample.video_playback_width = payload.width;
        }
        if payload.height.is_some() {
            self.sample.video_playback_height = payload.height;
        }
    }

    fn audio_change(&mut self, payload: &EventPayload) {
        if payload.bitrate.is_some() {
            self.sample.audio_bitrate = payload.bitrate;
        }
    }

    fn mute(&mut self) {
        self.sample.is_muted = true;
    }

    fn un_mute(&mut self) {
        self.sample.is_muted = false;
    }

    fn set_video_time_start(&mut self, payload: &EventPayload) {
        if let Some(current_time) = payload.current_time {
            self.sample.video_time_start = millis(current_time);
        }
    }

    fn set_video_time_end(&mut self, payload: &EventPayload) {
        if let Some(current_time) = payload.current_time {
            self.sample.video_time_end = millis(current_time);
        }
        if let Some(total) = payload.dropped_frames {
            let delta = self
                .last_dropped_frames
                .map(|last| total.saturating_sub(last))
                .unwrap_or(total);
            self.sample.dropped_frames = Some(delta);
            self.last_dropped_frames = Some(total);
        }
    }

    fn start_casting(&mut self, _timestamp: Timestamp, _payload: &EventPayload) {
        self.sample.is_casting = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::{MachineProfile, StateMachine};
    use crate::types::CanonicalEvent as E;

    fn aggregator() -> SampleAggregator {
        SampleAggregator::new(&CollectorConfig::new("key", "example.com"))
    }

    fn exit(state: State, duration_ms: u64, payload: &EventPayload) -> StateExit<'_> {
        StateExit {
            duration_ms,
            state,
            payload,
        }
    }

    #[test]
    fn test_startup_sample_carries_both_startup_times() {
        let payload = EventPayload::default();
        let mut agg = aggregator();
        agg.setup(&exit(State::Setup, 120, &payload));
        assert_eq!(agg.pending(), 0);

        agg.startup(&exit(State::Startup, 800, &payload));
        let samples = agg.drain_samples();
        assert_eq!(samples.len(), 1);

        let sample = &samples[0].sample;
        assert_eq!(sample.state, "startup");
        assert_eq!(sample.player_startup_time, Some(120));
        assert_eq!(sample.video_startup_time, Some(800));
        assert_eq!(sample.startup_time, Some(920));
        assert_eq!(agg.current().startup_time, None);
    }

    #[test]
    fn test_sequence_numbers_increase() {
        let payload = EventPayload::default();
        let mut agg = aggregator();
        agg.playing(&exit(State::Playing, 1_000, &payload));
        agg.pause(&exit(State::Pause, 500, &payload));
        agg.rebuffering(&exit(State::Rebuffering, 250, &payload));

        let samples = agg.drain_samples();
        let sequence: Vec<u32> = samples.iter().map(|s| s.sample.sequence_number).collect();
        assert_eq!(sequence, vec![0, 1, 2]);
        assert_eq!(samples[0].sample.played, 1_000);
        assert_eq!(samples[1].sample.paused, 500);
        assert_eq!(samples[1].sample.played, 0);
        assert_eq!(samples[2].sample.buffered, 250);
    }

    #[test]
    fn test_heartbeat_attributes_by_state() {
        let payload = EventPayload::default();
        let mut agg = aggregator();
        agg.heartbeat(&exit(State::Playing, 59_800, &payload));
        agg.heartbeat(&exit(State::Pause, 59_900, &payload));

        let samples = agg.drain_samples();
        assert_eq!(samples[0].sample.played, 59_800);
        assert_eq!(samples[1].sample.paused, 59_900);
        assert_eq!(samples[1].sample.state, "pause");
    }

    #[test]
    fn test_error_is_sent_then_cleared() {
        let mut agg = aggregator();
        agg.error(&EventPayload::error(3_011, "decode failed"));

        let samples = agg.drain_samples();
        assert_eq!(samples[0].sample.error_code, Some(3_011));
        assert_eq!(samples[0].sample.error_message.as_deref(), Some("decode failed"));
        assert_eq!(samples[0].sample.state, "error");
        assert_eq!(agg.current().error_code, None);
    }

    #[test]
    fn test_playing_and_bye_is_unload_delivery() {
        let payload = EventPayload::default();
        let mut agg = aggregator();
        agg.playing_and_bye(&exit(State::Playing, 4_000, &payload));

        let samples = agg.drain_samples();
        assert_eq!(samples[0].delivery, Delivery::Unload);
        assert_eq!(samples[0].sample.played, 4_000);
    }

    #[test]
    fn test_dropped_frames_are_deltas() {
        let mut agg = aggregator();
        agg.set_video_time_end(&EventPayload::at(1.0).with_dropped_frames(5));
        assert_eq!(agg.current().dropped_frames, Some(5));
        agg.set_video_time_end(&EventPayload::at(2.0).with_dropped_frames(12));
        assert_eq!(agg.current().dropped_frames, Some(7));
        assert_eq!(agg.current().video_time_end, 2_000);
    }

    #[test]
    fn test_source_change_starts_new_impression() {
        let payload = EventPayload::default();
        let mut agg = aggregator();
        let first = agg.impression_id();
        agg.playing(&exit(State::Playing, 10, &payload));
        agg.source_changing(&exit(State::SourceChanging, 10, &payload));
        agg.playing(&exit(State::Playing, 10, &payload));

        let samples = agg.drain_samples();
        assert_ne!(agg.impression_id(), first);
        assert_eq!(samples[1].sample.sequence_number, 0);
        assert_eq!(samples[1].sample.impression_id, agg.impression_id());
    }

    #[test]
    fn test_quality_fields_follow_changes() {
        let mut agg = aggregator();
        let quality = crate::types::QualityLevel::video(2_400_000, 1280, 720);
        agg.video_change(&EventPayload::default().with_quality(&quality));
        agg.audio_change(&EventPayload {
            bitrate: Some(128_000),
            ..Default::default()
        });

        assert_eq!(agg.current().video_bitrate, Some(2_400_000));
        assert_eq!(agg.current().video_playback_height, Some(720));
        assert_eq!(agg.current().audio_bitrate, Some(128_000));
    }

    #[test]
    fn test_driven_by_state_machine() {
        let mut machine = StateMachine::new(MachineProfile::full(), aggregator(), 0);
        machine.call_event(E::Ready, &EventPayload::default(), 300);
        machine.call_event(E::Play, &EventPayload::default(), 400);
        machine.call_event(E::TimeChanged, &EventPayload::at(0.0), 1_400);
        machine.call_event(E::Pause, &EventPayload::at(5.0), 6_400);

        let samples = machine.callbacks_mut().drain_samples();
        let states: Vec<&str> = samples.iter().map(|s| s.sample.state.as_str()).collect();
        assert_eq!(states, vec!["startup", "playing"]);
        assert_eq!(samples[0].sample.startup_time, Some(1_300));
        assert_eq!(samples[1].sample.played, 5_000);
        assert_eq!(samples[1].sample.video_time_end, 5_000);
    }
}
