// Wire types for the lock device API.
//
// Field names follow the device's camelCase JSON. These are also the domain
// types: the core re-exports them rather than converting.

use serde::{Deserialize, Serialize};

/// Last-known physical state of the lock.
///
/// Always replaced wholesale, never patched field by field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockState {
    pub is_locked: bool,
    /// ISO-8601 timestamp reported by the device (or stamped locally for
    /// optimistic updates).
    pub timestamp: String,
}

impl LockState {
    pub fn new(is_locked: bool, timestamp: impl Into<String>) -> Self {
        Self {
            is_locked,
            timestamp: timestamp.into(),
        }
    }

    pub fn label(&self) -> &'static str {
        if self.is_locked { "locked" } else { "unlocked" }
    }
}

/// Command verb accepted by `POST /lock/command`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockCommand {
    Lock,
    Unlock,
}

impl LockCommand {
    pub fn for_state(is_locked: bool) -> Self {
        if is_locked { Self::Lock } else { Self::Unlock }
    }
}

/// Body of `POST /lock/command`.
#[derive(Debug, Serialize)]
pub(crate) struct LockCommandRequest {
    pub command: LockCommand,
}

/// One entry of the device's activity history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogEntry {
    #[serde(default)]
    pub id: Option<String>,
    pub action: String,
    pub timestamp: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

/// A recorded motion clip stored on the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotionClip {
    pub filename: String,
    pub timestamp: String,
    #[serde(rename = "duration")]
    pub duration_seconds: f64,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

/// Motion notification pushed over the event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionEvent {
    pub timestamp: String,
    /// Filename of the clip recorded for this motion, if any.
    #[serde(default)]
    pub clip: Option<String>,
}

/// Response of the device's root health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}
