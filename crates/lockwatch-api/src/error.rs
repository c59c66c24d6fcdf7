use thiserror::Error;

/// Top-level error type for the `lockwatch-api` crate.
///
/// Covers every failure mode of both device surfaces: the request/response
/// HTTP API and the persistent event stream. `lockwatch-core` maps these
/// into its own taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The endpoint uses a scheme the device cannot speak.
    #[error("Unsupported URL scheme '{scheme}' (expected http or https)")]
    UnsupportedScheme { scheme: String },

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    // ── Device API ──────────────────────────────────────────────────
    /// The device answered with a non-2xx status.
    #[error("Device returned HTTP {status} for {url}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Event stream ────────────────────────────────────────────────
    /// WebSocket handshake failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// Transport fault on an established stream.
    #[error("WebSocket stream error: {0}")]
    Stream(String),

    /// A stream payload that is not JSON or lacks a recognized shape.
    #[error("Malformed stream message: {reason}")]
    MalformedMessage { reason: String },
}

impl Error {
    /// Returns `true` for failures of a request/response call: the
    /// request never completed, or the device answered non-2xx.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Status { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_are_network_errors() {
        let err = Error::Status {
            status: 500,
            url: "http://10.0.0.5:8000/activity".into(),
            body: String::new(),
        };
        assert!(err.is_network());
    }

    #[test]
    fn stream_errors_are_not_network() {
        assert!(!Error::WebSocketConnect("refused".into()).is_network());
        assert!(!Error::Stream("reset".into()).is_network());
    }

    #[test]
    fn malformed_message_is_not_network() {
        let err = Error::MalformedMessage {
            reason: "expected value".into(),
        };
        assert!(!err.is_network());
    }
}
