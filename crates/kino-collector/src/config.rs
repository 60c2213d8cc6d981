//! Collector configuration

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// Default analytics backend
pub const DEFAULT_BACKEND_URL: &str = "https://analytics-ingress.kino.dev";

/// Default capacity of the debug transition log
pub const DEFAULT_DEBUG_LOG_CAPACITY: usize = 256;

/// Collector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectorConfig {
    /// Analytics license key
    pub key: String,
    /// Domain the player is embedded on
    pub domain: String,
    /// Player license key, if the engine has one
    pub player_key: Option<String>,
    pub user_id: Option<String>,
    pub video_id: Option<String>,
    pub cdn_provider: Option<String>,
    /// Free-form fields copied into every sample (`customData1`..)
    pub custom_data: BTreeMap<String, String>,
    /// Base URL of the analytics backend
    pub backend_url: Url,
    /// Record transitions into the debug log
    pub debug: bool,
    /// Debug log capacity; 0 keeps every record
    pub debug_log_capacity: usize,
    /// Override of the pause/seek disambiguation window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pause_seek_window_ms: Option<u64>,
    /// Override of the seeked/pause confirmation delay
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seeked_pause_delay_ms: Option<u64>,
    /// Override of the heartbeat interval
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbeat_interval_ms: Option<u64>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            domain: String::new(),
            player_key: None,
            user_id: None,
            video_id: None,
            cdn_provider: None,
            custom_data: BTreeMap::new(),
            backend_url: default_backend_url(),
            debug: false,
            debug_log_capacity: DEFAULT_DEBUG_LOG_CAPACITY,
            pause_seek_window_ms: None,
            seeked_pause_delay_ms: None,
            heartbeat_interval_ms: None,
        }
    }
}

fn default_backend_url() -> Url {
    Url::parse(DEFAULT_BACKEND_URL).expect("default backend URL is valid")
}

impl CollectorConfig {
    /// Configuration for a license key and domain, everything else default
    pub fn new(key: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            domain: domain.into(),
            ..Default::default()
        }
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.key.trim().is_empty() {
            return Err(Error::InvalidConfig("license key is empty".into()));
        }
        if self.domain.trim().is_empty() {
            return Err(Error::InvalidConfig("domain is empty".into()));
        }
        if !matches!(self.backend_url.scheme(), "http" | "https") {
            return Err(Error::InvalidConfig(format!(
                "backend URL must be http(s): {}",
                self.backend_url
            )));
        }
        if self.heartbeat_interval_ms == Some(0) {
            return Err(Error::InvalidConfig(
                "heartbeat interval must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Endpoint receiving samples
    pub fn analytics_url(&self) -> Result<Url> {
        Ok(self.backend_url.join("analytics")?)
    }

    /// Endpoint answering license checks
    pub fn licensing_url(&self) -> Result<Url> {
        Ok(self.backend_url.join("licensing")?)
    }

    /// Debug log capacity, `None` when unbounded
    pub fn log_capacity(&self) -> Option<usize> {
        if !self.debug {
            Some(0)
        } else if self.debug_log_capacity == 0 {
            None
        } else {
            Some(self.debug_log_capacity)
        }
    }
}
