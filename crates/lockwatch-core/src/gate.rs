// ── Configuration gate ──
//
// Holds the device endpoint configuration, persists changes through an
// external settings store, and publishes every change on a watch channel so
// the composing layer can (de)activate the event stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use crate::config::{ConfigPatch, EndpointConfiguration};
use crate::error::CoreError;

/// Error type for settings store implementations.
pub type SettingsError = Box<dyn std::error::Error + Send + Sync>;

/// Key-value persistence for the endpoint configuration blob.
///
/// Implemented by `lockwatch-config` for the on-disk TOML file; the core
/// only ever sees this trait.
pub trait SettingsStore: Send + Sync {
    /// Load the stored configuration. `Ok(None)` means nothing is stored.
    fn load(&self) -> Result<Option<EndpointConfiguration>, SettingsError>;

    /// Persist the full configuration, replacing what was stored.
    fn save(&self, config: &EndpointConfiguration) -> Result<(), SettingsError>;
}

/// In-memory [`SettingsStore`] for tests and one-shot overrides.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    stored: Mutex<Option<EndpointConfiguration>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(config: EndpointConfiguration) -> Self {
        Self {
            stored: Mutex::new(Some(config)),
        }
    }

    /// What was last saved (or seeded).
    pub fn stored(&self) -> Option<EndpointConfiguration> {
        self.stored
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Option<EndpointConfiguration>, SettingsError> {
        Ok(self.stored())
    }

    fn save(&self, config: &EndpointConfiguration) -> Result<(), SettingsError> {
        *self.stored.lock().unwrap_or_else(PoisonError::into_inner) = Some(config.clone());
        Ok(())
    }
}

/// Owner of the [`EndpointConfiguration`].
///
/// Updates are local-first: the merged configuration is applied and
/// published even when the store write fails. The failure is returned to the
/// caller and the gate reports [`has_unsaved_changes`](Self::has_unsaved_changes)
/// until a later save succeeds.
pub struct ConfigGate {
    store: Arc<dyn SettingsStore>,
    config: watch::Sender<EndpointConfiguration>,
    unsaved: AtomicBool,
}

impl ConfigGate {
    /// Load the configuration once from `store`, falling back to defaults
    /// when nothing (or nothing readable) is stored.
    pub fn load(store: Arc<dyn SettingsStore>) -> Self {
        let initial = match store.load() {
            Ok(Some(config)) => config,
            Ok(None) => EndpointConfiguration::default(),
            Err(e) => {
                tracing::warn!(error = %e, "could not load device settings, using defaults");
                EndpointConfiguration::default()
            }
        };
        tracing::debug!(configured = initial.is_configured(), "device settings loaded");

        let (config, _) = watch::channel(initial);
        Self {
            store,
            config,
            unsaved: AtomicBool::new(false),
        }
    }

    pub fn current(&self) -> EndpointConfiguration {
        self.config.borrow().clone()
    }

    pub fn is_configured(&self) -> bool {
        self.config.borrow().is_configured()
    }

    pub fn camera_available(&self) -> bool {
        self.config.borrow().camera_available()
    }

    /// `true` when the in-memory configuration differs from what the store
    /// last accepted.
    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> watch::Receiver<EndpointConfiguration> {
        self.config.subscribe()
    }

    /// Merge `patch` into the current configuration and persist the result.
    ///
    /// Returns the merged configuration. On [`CoreError::Persistence`] the
    /// merged configuration is nonetheless current.
    pub fn update(&self, patch: &ConfigPatch) -> Result<EndpointConfiguration, CoreError> {
        let mut merged = EndpointConfiguration::default();
        self.config.send_modify(|current| {
            *current = current.merged(patch);
            merged = current.clone();
        });

        match self.store.save(&merged) {
            Ok(()) => {
                self.unsaved.store(false, Ordering::Release);
                tracing::info!(
                    configured = merged.is_configured(),
                    "device settings saved"
                );
                Ok(merged)
            }
            Err(e) => {
                self.unsaved.store(true, Ordering::Release);
                tracing::error!(error = %e, "failed to save device settings");
                Err(CoreError::Persistence {
                    message: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io;

    use pretty_assertions::assert_eq;

    use super::*;

    /// Store whose writes always fail.
    struct ReadOnlyStore;

    impl SettingsStore for ReadOnlyStore {
        fn load(&self) -> Result<Option<EndpointConfiguration>, SettingsError> {
            Ok(None)
        }

        fn save(&self, _config: &EndpointConfiguration) -> Result<(), SettingsError> {
            Err(Box::new(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "read-only filesystem",
            )))
        }
    }

    /// Store whose reads always fail.
    struct CorruptStore;

    impl SettingsStore for CorruptStore {
        fn load(&self) -> Result<Option<EndpointConfiguration>, SettingsError> {
            Err("unexpected character at line 1".into())
        }

        fn save(&self, _config: &EndpointConfiguration) -> Result<(), SettingsError> {
            Ok(())
        }
    }

    #[test]
    fn defaults_when_nothing_stored() {
        let gate = ConfigGate::load(Arc::new(MemorySettingsStore::new()));
        assert_eq!(gate.current(), EndpointConfiguration::default());
        assert!(!gate.is_configured());
    }

    #[test]
    fn defaults_when_store_unreadable() {
        let gate = ConfigGate::load(Arc::new(CorruptStore));
        assert_eq!(gate.current(), EndpointConfiguration::default());
    }

    #[test]
    fn loads_stored_config() {
        let stored = EndpointConfiguration {
            base_address: "http://10.0.0.5:8000".into(),
            camera_enabled: false,
            motion_detection_enabled: true,
        };
        let gate = ConfigGate::load(Arc::new(MemorySettingsStore::with(stored.clone())));
        assert_eq!(gate.current(), stored);
        assert!(gate.is_configured());
        assert!(!gate.camera_available());
    }

    #[test]
    fn update_merges_and_persists() {
        let store = Arc::new(MemorySettingsStore::new());
        let gate = ConfigGate::load(store.clone());

        gate.update(&ConfigPatch::base_address("http://10.0.0.5:8000"))
            .unwrap();
        let merged = gate
            .update(&ConfigPatch {
                motion_detection_enabled: Some(false),
                ..ConfigPatch::default()
            })
            .unwrap();

        assert_eq!(merged.base_address, "http://10.0.0.5:8000");
        assert!(!merged.motion_detection_enabled);
        assert_eq!(store.stored(), Some(merged));
        assert!(!gate.has_unsaved_changes());
    }

    #[test]
    fn failed_save_keeps_memory_update_and_flags_unsaved() {
        let gate = ConfigGate::load(Arc::new(ReadOnlyStore));

        let result = gate.update(&ConfigPatch::base_address("http://10.0.0.5:8000"));

        assert!(matches!(result, Err(CoreError::Persistence { .. })));
        assert!(gate.is_configured());
        assert!(gate.has_unsaved_changes());
    }

    #[tokio::test]
    async fn update_is_published() {
        let gate = ConfigGate::load(Arc::new(MemorySettingsStore::new()));
        let mut rx = gate.subscribe();

        gate.update(&ConfigPatch::base_address("https://lock.example.com"))
            .unwrap();

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().base_address, "https://lock.example.com");
    }
}
