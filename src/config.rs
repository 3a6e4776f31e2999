//! Per-connection configuration
//!
//! Tunable parameters for one die link. Values can be loaded from JSON
//! (e.g. a host application's settings file) or built in code.

use core::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::die::telemetry::AccelScale;
use crate::error::{Error, Result};
use crate::protocol::Deadline;

/// Die link configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DieConfig {
    // --- Telemetry ---
    /// Full-scale range the die accelerometer is configured for
    pub accel_scale: AccelScale,

    // --- Timeouts (milliseconds, `None` = wait forever) ---
    /// Waiting for a reply message from the die
    pub reply_timeout_ms: Option<u32>,
    /// Waiting for the transport to confirm a write left the host
    pub transport_ack_timeout_ms: Option<u32>,
    /// Inactivity between bulk chunks
    pub bulk_timeout_ms: Option<u32>,
}

impl Default for DieConfig {
    fn default() -> Self {
        Self {
            accel_scale: AccelScale::G8,
            reply_timeout_ms: Some(5000),
            transport_ack_timeout_ms: Some(5000),
            bulk_timeout_ms: Some(5000),
        }
    }
}

impl DieConfig {
    /// Parse and validate a JSON document. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            warn!("Rejecting die config: {}", e);
            Error::Config("malformed JSON")
        })?;
        config.validate()?;
        Ok(config)
    }

    /// A zero timeout would fail every wait immediately.
    pub fn validate(&self) -> Result<()> {
        if self.reply_timeout_ms == Some(0) {
            return Err(Error::Config("reply_timeout_ms must be non-zero"));
        }
        if self.transport_ack_timeout_ms == Some(0) {
            return Err(Error::Config("transport_ack_timeout_ms must be non-zero"));
        }
        if self.bulk_timeout_ms == Some(0) {
            return Err(Error::Config("bulk_timeout_ms must be non-zero"));
        }
        Ok(())
    }

    /// Default deadline for reply waits, as handed to the link.
    pub fn reply_timeout(&self) -> Option<Duration> {
        self.reply_timeout_ms
            .map(|ms| Duration::from_millis(u64::from(ms)))
    }

    pub fn transport_ack_deadline(&self) -> Deadline {
        Deadline::from_config_ms(self.transport_ack_timeout_ms)
    }

    pub fn bulk_deadline(&self) -> Deadline {
        Deadline::from_config_ms(self.bulk_timeout_ms)
    }
}
