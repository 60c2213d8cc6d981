//! Transition table
//!
//! The table is the authoritative relation of legal `(state, trigger) → state`
//! mappings. It is assembled once by a [`TableBuilder`] and never mutated
//! afterwards; player families derive their tables from [`base_table`] by
//! removing the edges their engines cannot produce.

use crate::types::{CanonicalEvent as E, State as S, Trigger};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// A single legal transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Transition {
    #[serde(rename = "event")]
    pub trigger: Trigger,
    pub from: S,
    pub to: S,
}

/// Immutable transition relation
#[derive(Debug, Clone)]
pub struct TransitionTable {
    edges: HashMap<(S, Trigger), S>,
}

impl TransitionTable {
    pub fn builder() -> TableBuilder {
        TableBuilder::default()
    }

    /// Destination for `trigger` in `from`, if the pair is legal
    pub fn target(&self, from: S, trigger: Trigger) -> Option<S> {
        self.edges.get(&(from, trigger)).copied()
    }

    pub fn is_legal(&self, from: S, trigger: Trigger) -> bool {
        self.edges.contains_key(&(from, trigger))
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// States that appear on either side of at least one edge, in declaration order
    pub fn states(&self) -> Vec<S> {
        let present: BTreeSet<usize> = self
            .edges
            .iter()
            .flat_map(|((from, _), to)| [state_index(*from), state_index(*to)])
            .collect();
        present.into_iter().map(|i| S::ALL[i]).collect()
    }

    /// All transitions, ordered by source state then trigger name
    pub fn transitions(&self) -> Vec<Transition> {
        let mut all: Vec<Transition> = self
            .edges
            .iter()
            .map(|((from, trigger), to)| Transition {
                trigger: *trigger,
                from: *from,
                to: *to,
            })
            .collect();
        all.sort_by(|a, b| {
            state_index(a.from)
                .cmp(&state_index(b.from))
                .then_with(|| a.trigger.as_str().cmp(b.trigger.as_str()))
        });
        all
    }
}

fn state_index(state: S) -> usize {
    S::ALL.iter().position(|s| *s == state).unwrap_or(usize::MAX)
}

/// Incremental construction of a [`TransitionTable`]
#[derive(Debug, Clone, Default)]
pub struct TableBuilder {
    edges: HashMap<(S, Trigger), S>,
}

impl TableBuilder {
    /// Add `trigger: from[..] → to`. A later edge for the same pair replaces the earlier one.
    pub fn on(mut self, trigger: impl Into<Trigger>, from: &[S], to: S) -> Self {
        let trigger = trigger.into();
        for state in from {
            self.edges.insert((*state, trigger), to);
        }
        self
    }

    /// Add `trigger: * → to` for every state
    pub fn on_any(self, trigger: impl Into<Trigger>, to: S) -> Self {
        self.on(trigger, &S::ALL, to)
    }

    /// Drop every edge driven by `trigger`
    pub fn without_trigger(mut self, trigger: impl Into<Trigger>) -> Self {
        let trigger = trigger.into();
        self.edges.retain(|(_, t), _| *t != trigger);
        self
    }

    /// Drop every edge leaving or entering `state`
    pub fn without_state(mut self, state: S) -> Self {
        self.edges.retain(|(from, _), to| *from != state && *to != state);
        self
    }

    pub fn build(self) -> TransitionTable {
        TransitionTable { edges: self.edges }
    }
}

/// Full transition relation shared by every player family
pub fn base_table() -> TableBuilder {
    TransitionTable::builder()
        // Setup and startup
        .on(E::TimeChanged, &[S::Setup], S::Setup)
        .on(E::Ready, &[S::Setup, S::Error, S::SourceChanging], S::Ready)
        .on(E::SourceLoaded, &[S::Setup, S::Error, S::SourceChanging], S::Ready)
        .on(E::Play, &[S::Ready], S::Startup)
        .on(E::Seek, &[S::Ready], S::Ready)
        .on(E::Seeked, &[S::Ready], S::Ready)
        .on(E::StartBuffering, &[S::Startup], S::Startup)
        .on(E::EndBuffering, &[S::Startup], S::Startup)
        .on(E::VideoChange, &[S::Startup], S::Startup)
        .on(E::AudioChange, &[S::Startup], S::Startup)
        .on(E::Seeked, &[S::Startup], S::Startup)
        .on(E::Pause, &[S::Startup], S::Ready)
        .on(E::TimeChanged, &[S::Startup], S::Playing)
        // Playing and rebuffering
        .on(E::TimeChanged, &[S::Playing], S::Playing)
        .on(E::EndBuffering, &[S::Playing], S::Playing)
        .on(E::StartBuffering, &[S::Playing], S::Rebuffering)
        .on(E::StartBuffering, &[S::Rebuffering], S::Rebuffering)
        .on(E::Play, &[S::Rebuffering], S::Playing)
        .on(E::TimeChanged, &[S::Rebuffering], S::Playing)
        .on(E::Pause, &[S::Playing, S::Rebuffering], S::Pause)
        .on(E::Play, &[S::Pause], S::Playing)
        // Quality changes
        .on(E::VideoChange, &[S::Playing, S::QualityChange], S::QualityChange)
        .on(E::AudioChange, &[S::Playing, S::QualityChange], S::QualityChange)
        .on(Trigger::FinishQualityChange, &[S::QualityChange], S::Playing)
        .on(E::VideoChange, &[S::Pause, S::QualityChangePause], S::QualityChangePause)
        .on(E::AudioChange, &[S::Pause, S::QualityChangePause], S::QualityChangePause)
        .on(Trigger::FinishQualityChangePause, &[S::QualityChangePause], S::Pause)
        .on(
            E::VideoChange,
            &[S::Rebuffering, S::QualityChangeRebuffering],
            S::QualityChangeRebuffering,
        )
        .on(
            E::AudioChange,
            &[S::Rebuffering, S::QualityChangeRebuffering],
            S::QualityChangeRebuffering,
        )
        .on(
            Trigger::FinishQualityChangeRebuffering,
            &[S::QualityChangeRebuffering],
            S::Rebuffering,
        )
        // Paused seeking
        .on(E::Seek, &[S::Pause, S::PausedSeeking], S::PausedSeeking)
        .on(E::AudioChange, &[S::PausedSeeking], S::PausedSeeking)
        .on(E::VideoChange, &[S::PausedSeeking], S::PausedSeeking)
        .on(E::StartBuffering, &[S::PausedSeeking], S::PausedSeeking)
        .on(E::EndBuffering, &[S::PausedSeeking], S::PausedSeeking)
        .on(E::Seeked, &[S::PausedSeeking], S::Pause)
        .on(E::Play, &[S::PausedSeeking], S::Playing)
        .on(E::Pause, &[S::PausedSeeking], S::Pause)
        // Seeking while playing
        .on(Trigger::PlaySeek, &[S::Pause], S::PlaySeeking)
        .on(E::Seek, &[S::Playing, S::PlaySeeking, S::EndPlaySeeking], S::PlaySeeking)
        .on(E::AudioChange, &[S::PlaySeeking], S::PlaySeeking)
        .on(E::VideoChange, &[S::PlaySeeking], S::PlaySeeking)
        .on(E::StartBuffering, &[S::PlaySeeking], S::PlaySeeking)
        .on(E::EndBuffering, &[S::PlaySeeking], S::PlaySeeking)
        .on(E::Seeked, &[S::PlaySeeking], S::EndPlaySeeking)
        .on(E::Play, &[S::EndPlaySeeking], S::Playing)
        .on(E::TimeChanged, &[S::EndPlaySeeking], S::Playing)
        .on(E::Pause, &[S::EndPlaySeeking], S::Pause)
        .on(E::StartBuffering, &[S::EndPlaySeeking], S::EndPlaySeeking)
        .on(E::EndBuffering, &[S::EndPlaySeeking], S::EndPlaySeeking)
        .on(E::Seeked, &[S::EndPlaySeeking], S::EndPlaySeeking)
        .on(Trigger::FinishPlaySeeking, &[S::EndPlaySeeking], S::Playing)
        // Playback finished
        .on(
            E::End,
            &[S::PlaySeeking, S::PausedSeeking, S::Playing, S::Pause, S::End],
            S::End,
        )
        .on(E::Seek, &[S::End], S::End)
        .on(E::Seeked, &[S::End], S::End)
        .on(E::TimeChanged, &[S::End], S::End)
        .on(E::StartBuffering, &[S::End], S::End)
        .on(E::EndBuffering, &[S::End], S::End)
        .on(E::Pause, &[S::End], S::End)
        .on(E::Play, &[S::End], S::Playing)
        // Ads
        .on(E::StartAd, &[S::Playing], S::Ad)
        .on(E::EndAd, &[S::Ad], S::Playing)
        // Muting
        .on(E::Mute, &[S::Ready, S::MutingReady], S::MutingReady)
        .on(E::UnMute, &[S::Ready, S::MutingReady], S::MutingReady)
        .on(Trigger::FinishMuting, &[S::MutingReady], S::Ready)
        .on(E::Mute, &[S::Playing, S::MutingPlay], S::MutingPlay)
        .on(E::UnMute, &[S::Playing, S::MutingPlay], S::MutingPlay)
        .on(Trigger::FinishMuting, &[S::MutingPlay], S::Playing)
        .on(E::Mute, &[S::Pause, S::MutingPause], S::MutingPause)
        .on(E::UnMute, &[S::Pause, S::MutingPause], S::MutingPause)
        .on(Trigger::FinishMuting, &[S::MutingPause], S::Pause)
        // Casting
        .on(E::StartCast, &[S::Ready, S::Pause], S::Casting)
        .on(E::Pause, &[S::Casting], S::Casting)
        .on(E::Play, &[S::Casting], S::Casting)
        .on(E::TimeChanged, &[S::Casting], S::Casting)
        .on(E::Mute, &[S::Casting], S::Casting)
        .on(E::Seek, &[S::Casting], S::Casting)
        .on(E::Seeked, &[S::Casting], S::Casting)
        .on(E::EndCast, &[S::Casting], S::Ready)
        // Universal edges
        .on_any(E::Error, S::Error)
        .on(E::Pause, &[S::Error], S::Error)
        .on_any(E::ManualSourceChange, S::SourceChanging)
        .on_any(E::SourceUnloaded, S::SourceChanging)
        .on_any(E::Unload, S::End)
}

/// Table for engines with their own event API (ads and casting included)
pub fn full_table() -> TransitionTable {
    base_table().build()
}

/// Table for media-element engines, which report neither ads nor casting
pub fn html5_table() -> TransitionTable {
    base_table()
        .without_state(S::Ad)
        .without_state(S::Casting)
        .without_trigger(E::StartAd)
        .without_trigger(E::EndAd)
        .without_trigger(E::StartCast)
        .without_trigger(E::EndCast)
        .build()
}
