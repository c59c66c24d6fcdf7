//! CLI-specific configuration: settings file plus `GlobalOpts` overrides.
//!
//! Resolves where settings live, which settings store the gate writes to,
//! and the session tuning for a command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;

use lockwatch_config::{Settings, TomlSettingsStore};
use lockwatch_core::{
    ConfigGate, ConfigPatch, DeviceSession, MemorySettingsStore, SessionConfig, SettingsStore,
};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;

/// Everything a command needs before it talks to the device.
pub struct Context {
    pub settings: Settings,
    pub path: PathBuf,
}

impl Context {
    pub fn load(global: &GlobalOpts) -> Result<Self, CliError> {
        let path = settings_file(global);
        let settings = lockwatch_config::load_settings_from(&path)?;
        tracing::debug!(path = %path.display(), "settings loaded");
        Ok(Self { settings, path })
    }

    /// `--output`, else the settings default, else table.
    pub fn output(&self, global: &GlobalOpts) -> Result<OutputFormat, CliError> {
        if let Some(format) = global.output {
            return Ok(format);
        }
        let configured = &self.settings.defaults.output;
        <OutputFormat as ValueEnum>::from_str(configured, true).map_err(|reason| {
            CliError::Validation {
                field: "defaults.output".into(),
                reason,
            }
        })
    }

    /// Gate over the settings file, or over an in-memory copy when
    /// `--endpoint` overrides the stored address. Overrides are never saved.
    pub fn gate(&self, global: &GlobalOpts) -> Arc<ConfigGate> {
        let Some(endpoint) = global.endpoint.as_deref() else {
            return self.file_gate();
        };

        let seeded = self
            .settings
            .device
            .merged(&ConfigPatch::base_address(endpoint));
        let store: Arc<dyn SettingsStore> = Arc::new(MemorySettingsStore::with(seeded));
        Arc::new(ConfigGate::load(store))
    }

    /// Gate that always persists to the settings file.
    pub fn file_gate(&self) -> Arc<ConfigGate> {
        let store: Arc<dyn SettingsStore> = Arc::new(TomlSettingsStore::new(self.path.clone()));
        Arc::new(ConfigGate::load(store))
    }

    pub fn session_config(&self, global: &GlobalOpts, stream: bool) -> SessionConfig {
        let mut config = self.settings.defaults.session_config();
        if let Some(timeout) = global.timeout {
            config.timeout = Duration::from_secs(timeout);
        }
        config.insecure |= global.insecure;
        config.stream_enabled = stream;
        config
    }

    /// Start a session, failing early when no usable endpoint is configured.
    pub async fn session(
        &self,
        global: &GlobalOpts,
        stream: bool,
    ) -> Result<DeviceSession, CliError> {
        let gate = self.gate(global);
        if !gate.is_configured() {
            return Err(CliError::NotConfigured {
                path: self.path.display().to_string(),
            });
        }
        lockwatch_core::validate_address(&gate.current().base_address)?;
        Ok(DeviceSession::start(gate, self.session_config(global, stream)).await)
    }
}

/// `--config`, else the platform settings path.
pub fn settings_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(lockwatch_config::settings_path)
}
