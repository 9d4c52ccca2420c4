//! Device configuration.

use serde::{Deserialize, Serialize};
use tinypay_otp_sync::ReconcileConfig;

use crate::error::{DeviceError, Result};

/// Which half of the pair this device is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceRole {
    #[default]
    Phone,
    Watch,
}

/// Configuration for a [`crate::PeerDevice`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub role: DeviceRole,
    /// Keep the root secret in the store after generating a chain. The
    /// root is stored in cleartext.
    pub persist_root: bool,
    /// Capacity of the change-notification channel.
    pub event_capacity: usize,
    /// Reconciliation configuration.
    pub reconcile: ReconcileConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            role: DeviceRole::Phone,
            persist_root: false,
            event_capacity: 64,
            reconcile: ReconcileConfig::default(),
        }
    }
}

impl DeviceConfig {
    /// Defaults for the given role.
    pub fn for_role(role: DeviceRole) -> Self {
        Self {
            role,
            ..Self::default()
        }
    }

    /// Read from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| DeviceError::Config(e.to_string()))?;
        if config.event_capacity == 0 {
            return Err(DeviceError::Config("event_capacity must be at least 1".into()));
        }
        Ok(config)
    }
}
