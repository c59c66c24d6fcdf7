// ── Transport connection manager ──
//
// Owns at most one live device event stream. The transport loop in
// `lockwatch_api::websocket` reports progress over an mpsc channel; a pump
// task here turns those signals into the observable `ConnectionState` and
// feeds decoded events into the `LockStore`.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use lockwatch_api::TlsMode;
use lockwatch_api::websocket::{self, DeviceEvent, ReconnectConfig, StreamSignal};

use crate::error::CoreError;
use crate::store::LockStore;

const SIGNAL_CHANNEL_SIZE: usize = 256;

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        })
    }
}

// ── ConnectionManager ────────────────────────────────────────────

/// The live stream and the two tasks serving it.
struct ActiveStream {
    endpoint: Url,
    cancel: CancellationToken,
    stream_task: JoinHandle<()>,
    pump_task: JoinHandle<()>,
}

/// Single-connection owner of the device event stream.
///
/// `activate` and `deactivate` are serialized on an internal lock, and every
/// `activate` tears the previous stream down completely (socket closed,
/// pending reconnect cancelled, both tasks joined) before opening a new one.
pub struct ConnectionManager {
    store: Arc<LockStore>,
    reconnect: ReconnectConfig,
    tls: TlsMode,
    state: Arc<watch::Sender<ConnectionState>>,
    active: Mutex<Option<ActiveStream>>,
}

impl ConnectionManager {
    pub fn new(store: Arc<LockStore>, reconnect: ReconnectConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            store,
            reconnect,
            tls: TlsMode::System,
            state: Arc::new(state),
            active: Mutex::new(None),
        }
    }

    /// Certificate handling for `wss://` endpoints.
    #[must_use]
    pub fn with_tls(mut self, tls: TlsMode) -> Self {
        self.tls = tls;
        self
    }

    /// Open the event stream for `endpoint`.
    ///
    /// Returns `Ok(true)` when a stream was started and `Ok(false)` when
    /// `enabled` is false or `endpoint` is empty. Any previous stream is torn
    /// down in every case, including when `endpoint` is rejected.
    pub async fn activate(&self, endpoint: &str, enabled: bool) -> Result<bool, CoreError> {
        let mut active = self.active.lock().await;
        Self::teardown(active.take()).await;

        if !enabled || endpoint.trim().is_empty() {
            self.state.send_replace(ConnectionState::Disconnected);
            debug!(enabled, "event stream not activated");
            return Ok(false);
        }

        let url = match websocket::stream_url_for(endpoint) {
            Ok(url) => url,
            Err(e) => {
                self.state.send_replace(ConnectionState::Disconnected);
                warn!(endpoint, error = %e, "endpoint cannot carry an event stream");
                return Err(e.into());
            }
        };

        info!(url = %url, "activating event stream");
        self.state.send_replace(ConnectionState::Connecting);

        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_CHANNEL_SIZE);
        let cancel = CancellationToken::new();

        let stream_task = tokio::spawn(websocket::run_stream(
            url.clone(),
            self.tls.clone(),
            signal_tx,
            self.reconnect.clone(),
            cancel.clone(),
        ));
        let pump_task = tokio::spawn(signal_pump(
            signal_rx,
            Arc::clone(&self.state),
            Arc::clone(&self.store),
        ));

        *active = Some(ActiveStream {
            endpoint: url,
            cancel,
            stream_task,
            pump_task,
        });
        Ok(true)
    }

    /// Close the live stream and cancel any pending reconnect. Idempotent.
    pub async fn deactivate(&self) {
        let mut active = self.active.lock().await;
        if active.is_some() {
            info!("deactivating event stream");
        }
        Self::teardown(active.take()).await;
        self.state.send_replace(ConnectionState::Disconnected);
    }

    /// The stream URL currently served, if any.
    ///
    /// `None` once the stream has spent its retry budget, even though the
    /// endpoint stays recorded until the next `activate` or `deactivate`.
    pub async fn endpoint(&self) -> Option<Url> {
        self.active
            .lock()
            .await
            .as_ref()
            .filter(|stream| !stream.stream_task.is_finished())
            .map(|stream| stream.endpoint.clone())
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    async fn teardown(stream: Option<ActiveStream>) {
        let Some(stream) = stream else { return };
        debug!(url = %stream.endpoint, "tearing down event stream");
        stream.cancel.cancel();
        // The pump ends once the stream task drops its sender.
        let _ = stream.stream_task.await;
        let _ = stream.pump_task.await;
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(stream) = self.active.get_mut().take() {
            stream.cancel.cancel();
        }
    }
}

// ── Signal pump ──────────────────────────────────────────────────

async fn signal_pump(
    mut signals: mpsc::Receiver<StreamSignal>,
    state: Arc<watch::Sender<ConnectionState>>,
    store: Arc<LockStore>,
) {
    while let Some(signal) = signals.recv().await {
        match signal {
            StreamSignal::Connecting { .. } => {
                state.send_replace(ConnectionState::Connecting);
            }
            StreamSignal::Connected => {
                state.send_replace(ConnectionState::Connected);
            }
            StreamSignal::Disconnected | StreamSignal::RetryScheduled { .. } => {
                state.send_replace(ConnectionState::Disconnected);
            }
            StreamSignal::GaveUp { attempts } => {
                warn!(attempts, "event stream gave up; re-activate to retry");
                state.send_replace(ConnectionState::Disconnected);
            }
            StreamSignal::Event(DeviceEvent::LockState(lock)) => {
                store.apply_stream_event(lock);
            }
            StreamSignal::Event(DeviceEvent::MotionDetected(motion)) => {
                store.record_motion(motion);
            }
        }
    }
    debug!("signal pump exiting");
}
