// ── Runtime configuration ──
//
// `EndpointConfiguration` is the persisted device blob the gate owns.
// `SessionConfig` describes *how* to talk to the device; it is built by the
// CLI and handed in, core never reads config files.

use std::time::Duration;

use lockwatch_api::{ReconnectConfig, TlsMode, TransportConfig};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Where the lock lives and which optional features the user turned on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfiguration {
    /// Absolute device URL, scheme required (e.g. `http://10.0.0.5:8000`).
    /// Empty means "not configured".
    pub base_address: String,
    pub camera_enabled: bool,
    pub motion_detection_enabled: bool,
}

impl Default for EndpointConfiguration {
    fn default() -> Self {
        Self {
            base_address: String::new(),
            camera_enabled: true,
            motion_detection_enabled: true,
        }
    }
}

impl EndpointConfiguration {
    pub fn is_configured(&self) -> bool {
        !self.base_address.is_empty()
    }

    /// Camera feed is offered only when enabled and there is somewhere to
    /// fetch it from.
    pub fn camera_available(&self) -> bool {
        self.camera_enabled && self.is_configured()
    }

    /// Field-level merge. Unset fields in `patch` keep their current value.
    pub fn merged(&self, patch: &ConfigPatch) -> Self {
        Self {
            base_address: patch
                .base_address
                .as_deref()
                .map_or_else(|| self.base_address.clone(), normalize_address),
            camera_enabled: patch.camera_enabled.unwrap_or(self.camera_enabled),
            motion_detection_enabled: patch
                .motion_detection_enabled
                .unwrap_or(self.motion_detection_enabled),
        }
    }
}

/// Check that `address` is empty or an absolute `http`/`https` URL.
pub fn validate_address(address: &str) -> Result<(), CoreError> {
    let address = address.trim();
    if address.is_empty() {
        return Ok(());
    }
    lockwatch_api::client::parse_base_address(address)?;
    Ok(())
}

/// Trailing slashes and surrounding whitespace carry no meaning.
fn normalize_address(address: &str) -> String {
    address.trim().trim_end_matches('/').to_owned()
}

/// Partial update for [`EndpointConfiguration`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigPatch {
    pub base_address: Option<String>,
    pub camera_enabled: Option<bool>,
    pub motion_detection_enabled: Option<bool>,
}

impl ConfigPatch {
    pub fn base_address(address: impl Into<String>) -> Self {
        Self {
            base_address: Some(address.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.base_address.is_none()
            && self.camera_enabled.is_none()
            && self.motion_detection_enabled.is_none()
    }
}

/// Connection tuning for a [`DeviceSession`](crate::DeviceSession).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Request timeout for device calls.
    pub timeout: Duration,
    /// Skip TLS verification (self-signed device certificates).
    pub insecure: bool,
    /// Enable the live event stream. Off for one-shot CLI commands.
    pub stream_enabled: bool,
    /// Backoff and keepalive settings for the event stream.
    pub reconnect: ReconnectConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            insecure: false,
            stream_enabled: true,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: if self.insecure {
                TlsMode::DangerAcceptInvalid
            } else {
                TlsMode::System
            },
            timeout: self.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_unconfigured_with_features_on() {
        let config = EndpointConfiguration::default();
        assert!(!config.is_configured());
        assert!(config.camera_enabled);
        assert!(config.motion_detection_enabled);
        assert!(!config.camera_available());
    }

    #[test]
    fn merge_only_touches_set_fields() {
        let base = EndpointConfiguration {
            base_address: "http://10.0.0.5:8000".into(),
            camera_enabled: true,
            motion_detection_enabled: true,
        };
        let merged = base.merged(&ConfigPatch {
            camera_enabled: Some(false),
            ..ConfigPatch::default()
        });
        assert_eq!(merged.base_address, "http://10.0.0.5:8000");
        assert!(!merged.camera_enabled);
        assert!(merged.motion_detection_enabled);
    }

    #[test]
    fn merge_normalizes_address() {
        let merged = EndpointConfiguration::default()
            .merged(&ConfigPatch::base_address("  http://10.0.0.5:8000/ "));
        assert_eq!(merged.base_address, "http://10.0.0.5:8000");
        assert!(merged.is_configured());
    }

    #[test]
    fn address_validation() {
        assert!(validate_address("").is_ok());
        assert!(validate_address("https://lock.example.com").is_ok());
        assert!(matches!(
            validate_address("ftp://10.0.0.5"),
            Err(CoreError::Config { .. })
        ));
        assert!(matches!(
            validate_address("10.0.0.5:8000"),
            Err(CoreError::Config { .. })
        ));
    }

    #[test]
    fn clearing_address_unconfigures() {
        let configured = EndpointConfiguration::default()
            .merged(&ConfigPatch::base_address("http://10.0.0.5:8000"));
        let cleared = configured.merged(&ConfigPatch::base_address(""));
        assert!(!cleared.is_configured());
    }
}
