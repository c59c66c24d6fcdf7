//! Settings file for lockwatch.
//!
//! A single TOML file holds the device endpoint under `[device]` and CLI
//! defaults under `[defaults]`. Loading layers built-in defaults, the file,
//! and `LOCKWATCH_*` environment variables; saving rewrites only the
//! `[device]` table. [`TomlSettingsStore`] plugs the file into
//! `lockwatch_core::ConfigGate`.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use lockwatch_core::{
    EndpointConfiguration, ReconnectConfig, SessionConfig, SettingsError, SettingsStore,
};

/// Prefix for environment overrides. Nested keys are separated by `__`,
/// e.g. `LOCKWATCH_DEVICE__BASE_ADDRESS`.
pub const ENV_PREFIX: &str = "LOCKWATCH_";

const DEVICE_TABLE: &str = "device";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to serialize settings: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("failed to parse settings file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("settings loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML settings structs ───────────────────────────────────────────

/// Top-level contents of `settings.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    /// The device endpoint, owned by the configuration gate.
    #[serde(default)]
    pub device: EndpointConfiguration,

    /// CLI-wide defaults.
    #[serde(default)]
    pub defaults: Defaults,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    /// Output format: "table", "json", or "plain".
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default)]
    pub insecure: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Stream keepalive interval in seconds; 0 disables it.
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,

    /// Lines kept by the in-memory log buffer.
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            insecure: false,
            timeout: default_timeout(),
            ping_interval: default_ping_interval(),
            log_capacity: default_log_capacity(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    10
}
fn default_ping_interval() -> u64 {
    25
}
fn default_log_capacity() -> usize {
    50
}

impl Defaults {
    /// Session tuning derived from these defaults. The stream is enabled;
    /// one-shot callers switch it off.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            timeout: Duration::from_secs(self.timeout),
            insecure: self.insecure,
            stream_enabled: true,
            reconnect: ReconnectConfig {
                ping_interval: (self.ping_interval > 0)
                    .then(|| Duration::from_secs(self.ping_interval)),
                ..ReconnectConfig::default()
            },
        }
    }
}

// ── Settings file path ──────────────────────────────────────────────

/// Resolve the settings file path via XDG / platform conventions.
pub fn settings_path() -> PathBuf {
    ProjectDirs::from("dev", "lockwatch", "lockwatch").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("settings.toml");
            p
        },
        |dirs| dirs.config_dir().join("settings.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("lockwatch");
    p
}

// ── Loading ─────────────────────────────────────────────────────────

/// Load settings from `path` plus environment overrides.
///
/// A missing file is not an error; defaults apply.
pub fn load_settings_from(path: &Path) -> Result<Settings, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let settings: Settings = figment.extract()?;
    Ok(settings)
}

// ── Saving ──────────────────────────────────────────────────────────

/// Replace the `[device]` table in the file at `path`, keeping every other
/// table as written.
///
/// `device` is written exactly as given. Through [`TomlSettingsStore`] that
/// is the gate's merged view, so `LOCKWATCH_DEVICE__*` values present at
/// load time end up in the file on the next save.
pub fn save_device_to(path: &Path, device: &EndpointConfiguration) -> Result<(), ConfigError> {
    let mut document = match std::fs::read_to_string(path) {
        Ok(text) => toml::from_str::<toml::Table>(&text)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => toml::Table::new(),
        Err(e) => return Err(e.into()),
    };
    document.insert(DEVICE_TABLE.into(), toml::Value::try_from(device)?);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(&document)?)?;
    tracing::debug!(path = %path.display(), "device settings written");
    Ok(())
}

// ── SettingsStore adapter ───────────────────────────────────────────

/// [`SettingsStore`] backed by the settings file.
#[derive(Debug, Clone)]
pub struct TomlSettingsStore {
    path: PathBuf,
}

impl TomlSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SettingsStore for TomlSettingsStore {
    fn load(&self) -> Result<Option<EndpointConfiguration>, SettingsError> {
        Ok(Some(load_settings_from(&self.path)?.device))
    }

    fn save(&self, config: &EndpointConfiguration) -> Result<(), SettingsError> {
        Ok(save_device_to(&self.path, config)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use figment::Jail;
    use pretty_assertions::assert_eq;

    use super::*;

    // Loading reads `LOCKWATCH_*` variables, so every test that loads runs
    // inside a `Jail` to serialize environment access.

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|_jail| {
            let settings = load_settings_from(Path::new("settings.toml")).unwrap();
            assert_eq!(settings.device, EndpointConfiguration::default());
            assert_eq!(settings.defaults.timeout, 10);
            assert_eq!(settings.defaults.log_capacity, 50);
            Ok(())
        });
    }

    #[test]
    fn reads_device_table() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "settings.toml",
                "[device]\nbase_address = \"http://10.0.0.5:8000\"\ncamera_enabled = false\n",
            )?;

            let settings = load_settings_from(Path::new("settings.toml")).unwrap();
            assert_eq!(settings.device.base_address, "http://10.0.0.5:8000");
            assert!(!settings.device.camera_enabled);
            assert!(settings.device.motion_detection_enabled);
            Ok(())
        });
    }

    #[test]
    fn unreadable_file_is_an_error() {
        Jail::expect_with(|jail| {
            jail.create_file("settings.toml", "[device\nbase_address = ")?;

            assert!(matches!(
                load_settings_from(Path::new("settings.toml")),
                Err(ConfigError::Figment(_))
            ));
            Ok(())
        });
    }

    #[test]
    fn env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "settings.toml",
                "[device]\nbase_address = \"http://10.0.0.5:8000\"\n",
            )?;
            jail.set_env("LOCKWATCH_DEVICE__BASE_ADDRESS", "https://lock.example.com");
            jail.set_env("LOCKWATCH_DEFAULTS__TIMEOUT", "3");

            let settings = load_settings_from(Path::new("settings.toml")).unwrap();
            assert_eq!(settings.device.base_address, "https://lock.example.com");
            assert_eq!(settings.defaults.timeout, 3);
            Ok(())
        });
    }

    #[test]
    fn save_keeps_other_tables() {
        Jail::expect_with(|jail| {
            jail.create_file("settings.toml", "[defaults]\ntimeout = 4\n")?;
            let path = Path::new("settings.toml");

            let device = EndpointConfiguration {
                base_address: "http://10.0.0.5:8000".into(),
                camera_enabled: true,
                motion_detection_enabled: false,
            };
            save_device_to(path, &device).unwrap();

            let settings = load_settings_from(path).unwrap();
            assert_eq!(settings.device, device);
            assert_eq!(settings.defaults.timeout, 4);
            Ok(())
        });
    }

    #[test]
    fn save_writes_only_the_given_device() {
        Jail::expect_with(|jail| {
            jail.set_env("LOCKWATCH_DEVICE__BASE_ADDRESS", "https://lock.example.com");
            let path = Path::new("settings.toml");

            save_device_to(path, &EndpointConfiguration::default()).unwrap();

            let written = std::fs::read_to_string(path).unwrap();
            assert!(!written.contains("lock.example.com"));
            Ok(())
        });
    }

    #[test]
    fn save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("settings.toml");
        save_device_to(&path, &EndpointConfiguration::default()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn store_round_trips_through_file() {
        Jail::expect_with(|jail| {
            let store = TomlSettingsStore::new(jail.directory().join("settings.toml"));

            let device = EndpointConfiguration {
                base_address: "http://10.0.0.5:8000".into(),
                ..EndpointConfiguration::default()
            };
            store.save(&device).unwrap();
            assert_eq!(store.load().unwrap(), Some(device));
            Ok(())
        });
    }

    #[test]
    fn store_persists_env_overrides_on_save() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "settings.toml",
                "[device]\nbase_address = \"http://10.0.0.5:8000\"\n",
            )?;
            jail.set_env("LOCKWATCH_DEVICE__BASE_ADDRESS", "https://lock.example.com");
            let path = jail.directory().join("settings.toml");
            let store = TomlSettingsStore::new(&path);

            let mut device = store.load().unwrap().unwrap();
            assert_eq!(device.base_address, "https://lock.example.com");
            device.camera_enabled = false;
            store.save(&device).unwrap();

            let written = std::fs::read_to_string(&path).unwrap();
            assert!(written.contains("https://lock.example.com"));
            assert!(!written.contains("10.0.0.5"));
            Ok(())
        });
    }

    #[test]
    fn session_config_from_defaults() {
        let defaults = Defaults {
            timeout: 4,
            ping_interval: 0,
            ..Defaults::default()
        };
        let session = defaults.session_config();
        assert_eq!(session.timeout, Duration::from_secs(4));
        assert!(session.reconnect.ping_interval.is_none());
        assert_eq!(session.reconnect.max_retries, Some(5));
    }
}
