// ── Core error types ──
//
// User-facing errors from lockwatch-core. Consumers never see reqwest or
// tungstenite errors directly; the `From<lockwatch_api::Error>` impl folds
// transport-layer failures into the four outcomes a caller can act on.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Request/response ─────────────────────────────────────────────
    /// Non-2xx response or transport failure on a device call.
    #[error("Request to {url} failed: {reason}")]
    Network {
        url: String,
        reason: String,
        status: Option<u16>,
    },

    /// The device answered 2xx with a body that could not be decoded.
    #[error("Device sent an unreadable response: {message}")]
    InvalidResponse { message: String },

    // ── Event stream ─────────────────────────────────────────────────
    #[error("Event stream error: {reason}")]
    Stream { reason: String },

    #[error("Malformed stream message: {reason}")]
    MalformedMessage { reason: String },

    // ── Configuration ────────────────────────────────────────────────
    /// The settings store rejected a write. The in-memory configuration
    /// was still updated.
    #[error("Failed to save settings: {message}")]
    Persistence { message: String },

    #[error("No device endpoint is configured")]
    NotConfigured,

    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` for failed request/response calls.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<lockwatch_api::Error> for CoreError {
    fn from(err: lockwatch_api::Error) -> Self {
        match err {
            lockwatch_api::Error::Transport(ref e) => CoreError::Network {
                url: e
                    .url()
                    .map_or_else(|| "<unknown>".into(), ToString::to_string),
                reason: e.to_string(),
                status: e.status().map(|s| s.as_u16()),
            },
            lockwatch_api::Error::Status { status, url, body } => CoreError::Network {
                url,
                reason: if body.is_empty() {
                    format!("HTTP {status}")
                } else {
                    format!("HTTP {status}: {body}")
                },
                status: Some(status),
            },
            lockwatch_api::Error::Deserialization { message, body: _ } => {
                CoreError::InvalidResponse { message }
            }
            lockwatch_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid endpoint URL: {e}"),
            },
            lockwatch_api::Error::UnsupportedScheme { scheme } => CoreError::Config {
                message: format!("Unsupported endpoint scheme '{scheme}' (use http or https)"),
            },
            lockwatch_api::Error::ClientBuild(message) => CoreError::Internal(message),
            lockwatch_api::Error::WebSocketConnect(reason) | lockwatch_api::Error::Stream(reason) => {
                CoreError::Stream { reason }
            }
            lockwatch_api::Error::MalformedMessage { reason } => {
                CoreError::MalformedMessage { reason }
            }
        }
    }
}
