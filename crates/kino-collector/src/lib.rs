//! Kino Collector - Video Analytics Library for Kino
//!
//! This crate observes a video player and turns its playback into analytics
//! samples:
//! - Adapters normalizing engine events into a canonical vocabulary
//! - A deterministic playback state machine deriving state durations
//! - Sample aggregation with heartbeat chunking of long states
//! - Licensing-gated sample transport
//! - Debug transition log and offline replay
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Kino Collector                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐                             │
//! │  │  PlayerApi   │  │    Html5     │   native engine events      │
//! │  │   Adapter    │  │   Adapter    │                             │
//! │  └──────┬───────┘  └──────┬───────┘                             │
//! │         └────────┬────────┘                                     │
//! │                  │ canonical events                             │
//! │           ┌──────┴──────┐        ┌──────────────┐               │
//! │           │   State     │───────▶│   Sample     │               │
//! │           │   Machine   │ exits  │  Aggregator  │               │
//! │           └──────┬──────┘        └──────┬───────┘               │
//! │                  │                      │ samples               │
//! │           ┌──────┴──────┐        ┌──────┴───────┐               │
//! │           │  Analytics  │───────▶│  Licensing   │──▶ Transport  │
//! │           │   Session   │        │    Gate      │               │
//! │           └─────────────┘        └──────────────┘               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod adapter;
pub mod aggregator;
pub mod callbacks;
pub mod config;
pub mod error;
pub mod licensing;
pub mod lifecycle;
pub mod machine;
pub mod sample;
pub mod session;
pub mod transport;
pub mod types;

pub use adapter::{
    Adapter, AdapterFactory, EngineHandle, EngineProbe, Html5Adapter, MediaElement, MediaEvent,
    PlaybackInfo, PlayerApi, PlayerApiAdapter, PlayerEvent, SelectedAdapter,
};
pub use aggregator::SampleAggregator;
pub use callbacks::{CallbackRecorder, NoopCallbacks, StateCallbacks, StateExit};
pub use config::CollectorConfig;
pub use error::{Error, Result};
pub use licensing::{GateState, LicenseRequest, LicenseResponse, LicenseStatus, LicensingGate};
pub use lifecycle::{LifecycleSink, UnloadGuard};
pub use machine::{
    parse_event_log, replay, EventLog, MachineProfile, Outcome, ReplayReport, StateLog,
    StateMachine, Transition, TransitionRecord, TransitionTable,
};
pub use sample::{Delivery, QueuedSample, Sample};
pub use session::AnalyticsSession;
pub use transport::{HttpTransport, Transport};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the collector library
pub fn init() {
    tracing::info!(version = VERSION, "Kino Collector initialized");
}
