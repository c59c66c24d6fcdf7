//! Lock event stream with auto-reconnect.
//!
//! Connects to the device's `/ws/lock` endpoint and reports everything that
//! happens on it as [`StreamSignal`]s over an [`mpsc`] channel: lifecycle
//! transitions (connecting, connected, disconnected, retry scheduled, gave
//! up) and decoded [`DeviceEvent`]s. The consumer owns all state; this module
//! holds none beyond the reconnect attempt counter.
//!
//! # Example
//!
//! ```rust,ignore
//! use lockwatch_api::websocket::{self, ReconnectConfig, StreamSignal};
//! use lockwatch_api::TlsMode;
//! use tokio::sync::mpsc;
//! use tokio_util::sync::CancellationToken;
//!
//! let url = websocket::stream_url_for("http://10.0.0.5:8000")?;
//! let (tx, mut rx) = mpsc::channel(64);
//! let cancel = CancellationToken::new();
//! tokio::spawn(websocket::run_stream(
//!     url,
//!     TlsMode::System,
//!     tx,
//!     ReconnectConfig::default(),
//!     cancel.clone(),
//! ));
//!
//! while let Some(signal) = rx.recv().await {
//!     println!("{signal:?}");
//! }
//! ```

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::client::parse_base_address;
use crate::error::Error;
use crate::models::{LockState, MotionEvent};
use crate::transport::TlsMode;

type DeviceSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Path of the lock event stream, relative to the device root.
pub const STREAM_PATH: &str = "/ws/lock";

const KEEPALIVE_PING: &str = "ping";
const KEEPALIVE_PONG: &str = "pong";

// ── Signals ──────────────────────────────────────────────────────────

/// A recognized event pushed by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    LockState(LockState),
    MotionDetected(MotionEvent),
}

/// Everything the stream task reports to its consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSignal {
    /// A connection attempt is starting. `attempt` is 0 for the first try
    /// after activation or after a successful open.
    Connecting { attempt: u32 },
    /// The handshake succeeded; the attempt counter is reset.
    Connected,
    /// A decoded device event.
    Event(DeviceEvent),
    /// The connection closed or could not be opened.
    Disconnected,
    /// A reconnect will be attempted after `delay`.
    RetryScheduled { attempt: u32, delay: Duration },
    /// The retry budget is spent; nothing further is scheduled.
    GaveUp { attempts: u32 },
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for stream reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Reconnects scheduled after consecutive failures before giving up.
    /// `None` means retry forever. Default: 5.
    pub max_retries: Option<u32>,

    /// Interval for the `ping` text keepalive while connected.
    /// `None` disables it. Default: 25s.
    ///
    /// A connection that delivers no frame at all for two intervals is
    /// treated as dead and reconnected.
    pub ping_interval: Option<Duration>,

    /// Bound on one connection attempt (TCP, TLS and upgrade). Default: 10s.
    pub connect_timeout: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: Some(5),
            ping_interval: Some(Duration::from_secs(25)),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ReconnectConfig {
    /// `delay = min(initial * 2^attempt, max)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1_u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }

    /// Whether a reconnect may be scheduled after failure number `attempt`
    /// (0-based, counted since the last successful open).
    pub fn allows_retry(&self, attempt: u32) -> bool {
        self.max_retries.is_none_or(|max| attempt < max)
    }

    /// Longest silence tolerated on an open connection.
    fn silence_limit(&self) -> Option<Duration> {
        self.ping_interval.map(|period| period.saturating_mul(2))
    }
}

// ── URL derivation ───────────────────────────────────────────────────

/// Derive the stream URL from the device base URL.
///
/// `http` becomes `ws`, `https` becomes `wss`, and [`STREAM_PATH`] is
/// appended to any existing path prefix.
pub fn stream_url(base: &Url) -> Result<Url, Error> {
    let scheme = match base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(Error::UnsupportedScheme {
                scheme: other.to_owned(),
            });
        }
    };

    let mut url = base.clone();
    url.set_scheme(scheme).map_err(|()| Error::UnsupportedScheme {
        scheme: base.scheme().to_owned(),
    })?;
    let path = format!("{}{STREAM_PATH}", base.path().trim_end_matches('/'));
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Parse a configured endpoint string and derive its stream URL.
pub fn stream_url_for(address: &str) -> Result<Url, Error> {
    stream_url(&parse_base_address(address)?)
}

// ── Background reconnection loop ─────────────────────────────────────

enum ReadEnd {
    Closed,
    Cancelled,
}

/// Main loop: connect → read → on close, backoff → reconnect.
///
/// Returns when `cancel` fires, when the retry budget is exhausted, or when
/// the signal receiver is dropped. Dropping the socket on return closes it.
pub async fn run_stream(
    url: Url,
    tls: TlsMode,
    signal_tx: mpsc::Sender<StreamSignal>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        if signal_tx
            .send(StreamSignal::Connecting { attempt })
            .await
            .is_err()
        {
            break;
        }

        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = open(&url, &tls, reconnect.connect_timeout) => result,
        };

        match opened {
            Ok(socket) => {
                attempt = 0;
                tracing::info!(url = %url, "Lock stream connected");
                if signal_tx.send(StreamSignal::Connected).await.is_err() {
                    break;
                }

                match read_until_closed(socket, &signal_tx, &reconnect, &cancel).await {
                    Ok(ReadEnd::Cancelled) => break,
                    Ok(ReadEnd::Closed) => tracing::info!("Lock stream closed"),
                    Err(e) => tracing::warn!(error = %e, "Lock stream error"),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "Lock stream connection failed");
            }
        }

        if cancel.is_cancelled() || signal_tx.send(StreamSignal::Disconnected).await.is_err() {
            break;
        }

        if !reconnect.allows_retry(attempt) {
            tracing::error!(
                attempts = attempt,
                "Lock stream reconnection limit reached, giving up"
            );
            let _ = signal_tx
                .send(StreamSignal::GaveUp { attempts: attempt })
                .await;
            break;
        }

        let delay = reconnect.delay_for(attempt);
        tracing::info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "Waiting before reconnect"
        );
        if signal_tx
            .send(StreamSignal::RetryScheduled { attempt, delay })
            .await
            .is_err()
        {
            break;
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }

        attempt += 1;
    }

    tracing::debug!("Lock stream loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

async fn open(url: &Url, tls: &TlsMode, limit: Duration) -> Result<DeviceSocket, Error> {
    tracing::info!(url = %url, "Connecting to lock stream");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;
    let connector = tls.stream_connector()?;

    let handshake =
        tokio_tungstenite::connect_async_tls_with_config(uri, None, false, connector);
    let (socket, _response) = tokio::time::timeout(limit, handshake)
        .await
        .map_err(|_| {
            Error::WebSocketConnect(format!("handshake did not finish within {limit:?}"))
        })?
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    Ok(socket)
}

/// Read frames until the connection drops or `cancel` fires.
///
/// On cancellation a close frame is sent before returning. With keepalive
/// enabled, a connection silent for two intervals is reported as an error.
async fn read_until_closed(
    socket: DeviceSocket,
    signal_tx: &mpsc::Sender<StreamSignal>,
    reconnect: &ReconnectConfig,
    cancel: &CancellationToken,
) -> Result<ReadEnd, Error> {
    let (mut write, mut read) = socket.split();
    let mut last_seen = Instant::now();
    let mut keepalive = reconnect
        .ping_interval
        .map(|period| tokio::time::interval_at(last_seen + period, period));
    let silence_limit = reconnect.silence_limit();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                return Ok(ReadEnd::Cancelled);
            }
            () = next_tick(&mut keepalive) => {
                let silent = last_seen.elapsed();
                if silence_limit.is_some_and(|limit| silent >= limit) {
                    return Err(Error::Stream(format!("no frames received for {silent:?}")));
                }
                tracing::trace!("Sending stream keepalive");
                write
                    .send(Message::Text(KEEPALIVE_PING.into()))
                    .await
                    .map_err(|e| Error::Stream(e.to_string()))?;
            }
            frame = read.next() => {
                if matches!(frame, Some(Ok(_))) {
                    last_seen = Instant::now();
                }
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(event) = decode_frame(text.as_str()) {
                            if signal_tx.send(StreamSignal::Event(event)).await.is_err() {
                                return Ok(ReadEnd::Cancelled);
                            }
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(
                                code = %cf.code,
                                reason = %cf.reason,
                                "Lock stream close frame received"
                            );
                        } else {
                            tracing::info!("Lock stream close frame received (no payload)");
                        }
                        return Ok(ReadEnd::Closed);
                    }
                    Some(Ok(Message::Ping(_))) => {
                        // tungstenite queues the pong reply itself
                        tracing::trace!("Lock stream ping");
                    }
                    Some(Ok(_)) => {
                        // Binary, Pong, Frame -- ignore
                    }
                    Some(Err(e)) => return Err(Error::Stream(e.to_string())),
                    None => {
                        tracing::info!("Lock stream ended");
                        return Ok(ReadEnd::Closed);
                    }
                }
            }
        }
    }
}

async fn next_tick(keepalive: &mut Option<Interval>) {
    match keepalive {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

// ── Message parsing ──────────────────────────────────────────────────

/// Shape of the JSON messages the device pushes, keyed by `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum WireMessage {
    #[serde(rename = "lock_state")]
    LockState(LockState),
    #[serde(rename = "motion_detected")]
    MotionDetected(MotionEvent),
    #[serde(other)]
    Unrecognized,
}

/// Parse one stream payload.
///
/// Returns `Ok(None)` for well-formed messages of a `type` this client does
/// not handle, and [`Error::MalformedMessage`] for anything else that fails.
pub fn parse_message(text: &str) -> Result<Option<DeviceEvent>, Error> {
    let message: WireMessage =
        serde_json::from_str(text).map_err(|e| Error::MalformedMessage {
            reason: e.to_string(),
        })?;

    Ok(match message {
        WireMessage::LockState(state) => Some(DeviceEvent::LockState(state)),
        WireMessage::MotionDetected(motion) => Some(DeviceEvent::MotionDetected(motion)),
        WireMessage::Unrecognized => None,
    })
}

/// Decode a text frame, logging and dropping anything unusable.
fn decode_frame(text: &str) -> Option<DeviceEvent> {
    if text == KEEPALIVE_PONG {
        tracing::trace!("Lock stream keepalive reply");
        return None;
    }

    match parse_message(text) {
        Ok(Some(event)) => {
            tracing::debug!(?event, "Lock stream event");
            Some(event)
        }
        Ok(None) => {
            tracing::debug!("Ignoring unrecognized lock stream message");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "Dropping malformed lock stream message");
            None
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
