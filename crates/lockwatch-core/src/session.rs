// ── Device session ──
//
// Composes the configuration gate, the command client, the connection
// manager, and the lock store into the one handle consumers hold.

use std::sync::{Arc, Weak};

use arc_swap::ArcSwapOption;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use lockwatch_api::{ActivityLogEntry, HealthStatus, LockClient, LockState, MotionClip};

use crate::config::{ConfigPatch, EndpointConfiguration, SessionConfig};
use crate::connection::{ConnectionManager, ConnectionState};
use crate::error::CoreError;
use crate::gate::ConfigGate;
use crate::store::{LockRecord, LockStore};
use crate::stream::Subscription;

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<SessionInner>`. Follows the gate's
/// configuration: whenever the base address changes the command client is
/// rebuilt and the event stream re-activated.
///
/// Dropping the last handle stops the watcher and the stream even without
/// [`shutdown`](Self::shutdown).
#[derive(Clone)]
pub struct DeviceSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    settings: SessionConfig,
    gate: Arc<ConfigGate>,
    store: Arc<LockStore>,
    connection: ConnectionManager,
    client: ArcSwapOption<LockClient>,
    /// Base address the client and stream were last built for.
    applied: Mutex<Option<String>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl DeviceSession {
    /// Build the session from the gate's current configuration, fetch the
    /// initial lock state when configured, and start following config
    /// changes.
    ///
    /// A failed initial fetch is logged, not returned: the stream or a later
    /// [`refresh_state`](Self::refresh_state) can still fill the state in.
    pub async fn start(gate: Arc<ConfigGate>, settings: SessionConfig) -> Self {
        let store = Arc::new(LockStore::new());
        let connection = ConnectionManager::new(Arc::clone(&store), settings.reconnect.clone())
            .with_tls(settings.transport().tls);

        let session = Self {
            inner: Arc::new(SessionInner {
                settings,
                gate,
                store,
                connection,
                client: ArcSwapOption::empty(),
                applied: Mutex::new(None),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        };

        let mut config_rx = session.inner.gate.subscribe();
        let initial = config_rx.borrow_and_update().clone();
        session.sync_with(&initial).await;

        if session.inner.client.load().is_some() {
            if let Err(e) = session.refresh_state().await {
                warn!(error = %e, "initial lock state fetch failed");
            }
        }

        let watcher = tokio::spawn(config_watch_task(
            Arc::downgrade(&session.inner),
            config_rx,
            session.inner.cancel.clone(),
        ));
        session.inner.task_handles.lock().await.push(watcher);

        session
    }

    /// Stop the config watcher and close the event stream.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }

        self.inner.connection.deactivate().await;
        info!("device session shut down");
    }

    // ── Configuration ────────────────────────────────────────────

    pub fn gate(&self) -> &Arc<ConfigGate> {
        &self.inner.gate
    }

    pub fn config(&self) -> EndpointConfiguration {
        self.inner.gate.current()
    }

    /// Merge `patch` through the gate and re-sync immediately.
    ///
    /// The session follows the merged configuration even when the gate
    /// reports [`CoreError::Persistence`].
    pub async fn update_config(
        &self,
        patch: &ConfigPatch,
    ) -> Result<EndpointConfiguration, CoreError> {
        let result = self.inner.gate.update(patch);
        let current = self.inner.gate.current();
        self.sync_with(&current).await;
        result
    }

    /// Rebuild the client and re-activate the stream even if the address is
    /// unchanged. Used after the stream gave up.
    pub async fn reconnect(&self) {
        *self.inner.applied.lock().await = None;
        let current = self.inner.gate.current();
        self.sync_with(&current).await;
    }

    async fn sync_with(&self, config: &EndpointConfiguration) {
        let mut applied = self.inner.applied.lock().await;
        if applied.as_deref() == Some(config.base_address.as_str()) {
            return;
        }
        debug!(address = %config.base_address, "applying endpoint configuration");
        applied.replace(config.base_address.clone());

        let client = if config.is_configured() {
            match LockClient::from_address(&config.base_address, &self.inner.settings.transport())
            {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    warn!(address = %config.base_address, error = %e, "cannot build device client");
                    None
                }
            }
        } else {
            None
        };
        self.inner.client.store(client);

        if let Err(e) = self
            .inner
            .connection
            .activate(&config.base_address, self.inner.settings.stream_enabled)
            .await
        {
            warn!(error = %e, "event stream not activated");
        }
    }

    fn client(&self) -> Result<Arc<LockClient>, CoreError> {
        self.inner.client.load_full().ok_or(CoreError::NotConfigured)
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Query the device and replace the current state with the answer.
    pub async fn refresh_state(&self) -> Result<LockState, CoreError> {
        let state = self.client()?.fetch_state().await?;
        self.inner.store.apply_query_result(state.clone());
        Ok(state)
    }

    /// Send a lock/unlock command. On success the store is updated
    /// optimistically until the device confirms over the stream.
    pub async fn set_locked(&self, is_locked: bool) -> Result<(), CoreError> {
        self.client()?.set_state(is_locked).await?;
        self.inner.store.apply_optimistic_command(is_locked);
        Ok(())
    }

    /// Fetch the activity log. The stored list is only replaced on success.
    pub async fn refresh_activity(&self) -> Result<Arc<Vec<ActivityLogEntry>>, CoreError> {
        let entries = self.client()?.fetch_activity_logs().await?;
        self.inner.store.replace_activity(entries);
        Ok(self.inner.store.activity_snapshot())
    }

    /// Fetch the motion clip list. The stored list is only replaced on success.
    pub async fn refresh_clips(&self) -> Result<Arc<Vec<MotionClip>>, CoreError> {
        let clips = self.client()?.fetch_motion_clips().await?;
        self.inner.store.replace_clips(clips);
        Ok(self.inner.store.clips_snapshot())
    }

    pub async fn health(&self) -> Result<HealthStatus, CoreError> {
        Ok(self.client()?.health().await?)
    }

    // ── Derived addresses ────────────────────────────────────────

    /// Live camera feed address, only when the camera is enabled and an
    /// endpoint is configured.
    pub fn camera_stream_address(&self) -> Option<String> {
        if !self.inner.gate.camera_available() {
            return None;
        }
        self.inner
            .client
            .load_full()
            .map(|client| client.camera_stream_address())
    }

    pub fn clip_address(&self, filename: &str) -> Option<String> {
        self.inner
            .client
            .load_full()
            .map(|client| client.clip_address(filename))
    }

    // ── Read model ───────────────────────────────────────────────

    pub fn store(&self) -> &Arc<LockStore> {
        &self.inner.store
    }

    pub fn lock_state(&self) -> Option<LockState> {
        self.inner.store.lock_state()
    }

    pub fn subscribe_lock(&self) -> Subscription<Option<Arc<LockRecord>>> {
        self.inner.store.subscribe_lock()
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.connection_state()
    }

    pub fn motion_detection_enabled(&self) -> bool {
        self.inner.gate.current().motion_detection_enabled
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Holds the session weakly so an abandoned session can still be dropped.
async fn config_watch_task(
    session: Weak<SessionInner>,
    mut config_rx: watch::Receiver<EndpointConfiguration>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = config_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let Some(inner) = session.upgrade() else { break };
                let config = config_rx.borrow_and_update().clone();
                DeviceSession { inner }.sync_with(&config).await;
            }
        }
    }
    debug!("config watcher exiting");
}
