//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use lockwatch_config::ConfigError;
use lockwatch_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_CONFIGURED: i32 = 3;
    pub const UNAVAILABLE: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Request to {url} failed: {reason}")]
    #[diagnostic(
        code(lockwatch::request_failed),
        help(
            "Check that the lock is powered on and reachable from this machine.\n\
             Try: lockwatch health --endpoint <address>"
        )
    )]
    RequestFailed { url: String, reason: String },

    #[error("The device sent a response lockwatch could not read")]
    #[diagnostic(
        code(lockwatch::invalid_response),
        help("Details: {message}\nThe device firmware may be newer than this client.")
    )]
    InvalidResponse { message: String },

    #[error("Event stream failed: {reason}")]
    #[diagnostic(code(lockwatch::stream))]
    Stream { reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("No device endpoint is configured")]
    #[diagnostic(
        code(lockwatch::not_configured),
        help(
            "Set one with: lockwatch config set --base-address http://<lock-ip>:8000\n\
             Or pass --endpoint / set LOCKWATCH_ENDPOINT.\n\
             Settings file: {path}"
        )
    )]
    NotConfigured { path: String },

    #[error("The camera feed is not available")]
    #[diagnostic(
        code(lockwatch::camera_unavailable),
        help("Enable it with: lockwatch config set --camera true")
    )]
    CameraUnavailable,

    #[error("Settings were applied but could not be saved: {message}")]
    #[diagnostic(
        code(lockwatch::settings_not_saved),
        help("Check that the settings file and its directory are writable.")
    )]
    SettingsNotSaved { message: String },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(lockwatch::config_invalid))]
    ConfigInvalid { message: String },

    #[error(transparent)]
    #[diagnostic(code(lockwatch::config))]
    Config(#[from] ConfigError),

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(lockwatch::validation))]
    Validation { field: String, reason: String },

    // ── Internal ─────────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(code(lockwatch::io))]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(lockwatch::internal))]
    Internal(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::RequestFailed { .. } | Self::InvalidResponse { .. } | Self::Stream { .. } => {
                exit_code::CONNECTION
            }
            Self::NotConfigured { .. } => exit_code::NOT_CONFIGURED,
            Self::CameraUnavailable => exit_code::UNAVAILABLE,
            Self::Validation { .. } | Self::ConfigInvalid { .. } => exit_code::USAGE,
            Self::SettingsNotSaved { .. }
            | Self::Config(_)
            | Self::Io(_)
            | Self::Internal(_) => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError ─────────────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Network { url, reason, .. } => CliError::RequestFailed { url, reason },
            CoreError::InvalidResponse { message } => CliError::InvalidResponse { message },
            CoreError::Stream { reason } | CoreError::MalformedMessage { reason } => {
                CliError::Stream { reason }
            }
            CoreError::Persistence { message } => CliError::SettingsNotSaved { message },
            CoreError::NotConfigured => CliError::NotConfigured {
                path: String::new(),
            },
            CoreError::Config { message } => CliError::ConfigInvalid { message },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_errors_exit_with_connection_code() {
        let err: CliError = CoreError::Network {
            url: "http://10.0.0.5:8000/activity".into(),
            reason: "HTTP 500".into(),
            status: Some(500),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::CONNECTION);
        assert_eq!(
            err.to_string(),
            "Request to http://10.0.0.5:8000/activity failed: HTTP 500"
        );
    }

    #[test]
    fn persistence_reports_settings_applied() {
        let err: CliError = CoreError::Persistence {
            message: "read-only".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::GENERAL);
        assert!(err.to_string().contains("applied"));
    }
}
