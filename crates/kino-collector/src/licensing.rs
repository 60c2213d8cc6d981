//! Licensing handshake and the sample gate it controls
//!
//! Samples produced before the license check completes are held back. A grant
//! (or a `skip` answer) releases them; a denial discards them and every sample
//! after them for the rest of the session. At most [`MAX_QUEUED_SAMPLES`] are
//! held; a session that never runs the check keeps only the newest.

use crate::error::{Error, Result};
use crate::sample::QueuedSample;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{info, warn};

/// Samples held while the license check is pending; older ones are dropped
/// beyond this
pub const MAX_QUEUED_SAMPLES: usize = 100;

/// Backend verdict on a license key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    Granted,
    Denied,
    /// Licensing is not enforced for this key
    Skip,
}

/// Body of a license check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseRequest {
    pub key: String,
    pub domain: String,
    pub analytics_version: String,
}

impl LicenseRequest {
    pub fn new(key: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            domain: domain.into(),
            analytics_version: crate::VERSION.to_string(),
        }
    }
}

/// Backend answer to a license check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseResponse {
    pub status: LicenseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl LicenseResponse {
    /// `Err(LicenseDenied)` unless the key may send samples
    pub fn ensure_granted(&self) -> Result<()> {
        match self.status {
            LicenseStatus::Granted | LicenseStatus::Skip => Ok(()),
            LicenseStatus::Denied => Err(Error::LicenseDenied(
                self.message.clone().unwrap_or_else(|| "denied".to_string()),
            )),
        }
    }
}

/// Gate position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GateState {
    /// License check in flight; samples are queued
    Pending,
    /// Samples go straight to the transport
    Open,
    /// Samples are discarded for the rest of the session
    Closed,
}

/// What the gate did with a sample
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// Send now
    Send(QueuedSample),
    /// Held until the license check completes
    Queued,
    /// Dropped, license denied
    Discarded,
}

/// Holds samples back until the license is known
#[derive(Debug)]
pub struct LicensingGate {
    state: GateState,
    queue: VecDeque<QueuedSample>,
}

impl LicensingGate {
    pub fn new() -> Self {
        Self {
            state: GateState::Pending,
            queue: VecDeque::new(),
        }
    }

    /// Gate that never blocks, for sessions without licensing
    pub fn open() -> Self {
        Self {
            state: GateState::Open,
            queue: VecDeque::new(),
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn admit(&mut self, sample: QueuedSample) -> Admission {
        match self.state {
            GateState::Open => Admission::Send(sample),
            GateState::Pending => {
                if self.queue.len() == MAX_QUEUED_SAMPLES {
                    if let Some(dropped) = self.queue.pop_front() {
                        warn!(
                            sequence = dropped.sample.sequence_number,
                            "License check still pending, dropping oldest held sample"
                        );
                    }
                }
                self.queue.push_back(sample);
                Admission::Queued
            }
            GateState::Closed => Admission::Discarded,
        }
    }

    /// Apply the backend verdict. Returns the samples released for sending.
    /// Only the first verdict counts.
    pub fn resolve(&mut self, response: &LicenseResponse) -> Vec<QueuedSample> {
        if self.state != GateState::Pending {
            return Vec::new();
        }

        match response.status {
            LicenseStatus::Granted | LicenseStatus::Skip => {
                self.state = GateState::Open;
                info!(
                    status = ?response.status,
                    released = self.queue.len(),
                    "License accepted"
                );
                std::mem::take(&mut self.queue).into()
            }
            LicenseStatus::Denied => {
                self.close(response.message.as_deref().unwrap_or("denied"));
                Vec::new()
            }
        }
    }

    /// The license check could not be completed; treated as a denial
    pub fn fail(&mut self, reason: &str) {
        if self.state == GateState::Pending {
            self.close(reason);
        }
    }

    fn close(&mut self, reason: &str) {
        warn!(reason, discarded = self.queue.len(), "Analytics disabled, license not granted");
        self.state = GateState::Closed;
        self.queue.clear();
    }
}

impl Default for LicensingGate {
    fn default() -> Self {
        Self::new()
    }
}
