#![allow(clippy::unwrap_used)]
// Integration tests for DeviceSession with the event stream enabled, against
// a local device that serves both HTTP and the WebSocket on one port.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use lockwatch_core::{
    ConfigGate, ConfigPatch, ConnectionState, DeviceSession, EndpointConfiguration, LockState,
    MemorySettingsStore, ReconnectConfig, SessionConfig, UpdateSource,
};

const STEP: Duration = Duration::from_secs(5);
const INITIAL_STATE: &str = r#"{"isLocked":false,"timestamp":"2026-01-05T08:00:00"}"#;

// ── Local device ────────────────────────────────────────────────────

type DeviceSocket = WebSocketStream<TcpStream>;

/// Answers `GET /lock/state` and `POST /lock/command`, and hands every
/// upgraded `/ws/lock` connection to the test.
struct LocalDevice {
    base: String,
    sockets: mpsc::UnboundedReceiver<DeviceSocket>,
    commands: Arc<Mutex<Vec<String>>>,
    server: JoinHandle<()>,
}

impl LocalDevice {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let (socket_tx, sockets) = mpsc::unbounded_channel();
        let commands = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&commands);
        let server = tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                tokio::spawn(serve(tcp, socket_tx.clone(), Arc::clone(&recorded)));
            }
        });

        Self {
            base,
            sockets,
            commands,
            server,
        }
    }

    async fn next_socket(&mut self) -> DeviceSocket {
        timeout(STEP, self.sockets.recv()).await.unwrap().unwrap()
    }

    fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

impl Drop for LocalDevice {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn serve(
    tcp: TcpStream,
    sockets: mpsc::UnboundedSender<DeviceSocket>,
    commands: Arc<Mutex<Vec<String>>>,
) {
    if is_stream_request(&tcp).await {
        if let Ok(ws) = tokio_tungstenite::accept_async(tcp).await {
            let _ = sockets.send(ws);
        }
        return;
    }

    let mut reader = BufReader::new(tcp);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await.unwrap();
    let mut length = 0;
    loop {
        let mut header = String::new();
        reader.read_line(&mut header).await.unwrap();
        if header.trim().is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                length = value.trim().parse().unwrap();
            }
        }
    }
    let mut body = vec![0; length];
    reader.read_exact(&mut body).await.unwrap();

    let (status, payload) = if request_line.starts_with("GET /lock/state ") {
        ("200 OK", INITIAL_STATE)
    } else if request_line.starts_with("POST /lock/command ") {
        commands
            .lock()
            .unwrap()
            .push(String::from_utf8(body).unwrap());
        ("200 OK", r#"{"success":true}"#)
    } else {
        ("404 Not Found", r#"{"detail":"Not Found"}"#)
    };
    let response = format!(
        "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{payload}",
        payload.len()
    );
    let _ = reader.get_mut().write_all(response.as_bytes()).await;
}

/// Peek at the request line without consuming it.
async fn is_stream_request(tcp: &TcpStream) -> bool {
    const PREFIX: &[u8] = b"GET /ws/lock";
    let mut head = [0_u8; 32];
    loop {
        let n = tcp.peek(&mut head).await.unwrap_or(0);
        if n == 0 {
            return false;
        }
        if n >= PREFIX.len() || head[..n].contains(&b'\n') {
            return head[..n].starts_with(PREFIX);
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn live() -> SessionConfig {
    SessionConfig {
        stream_enabled: true,
        reconnect: ReconnectConfig {
            initial_delay: Duration::from_millis(50),
            ..ReconnectConfig::default()
        },
        ..SessionConfig::default()
    }
}

async fn start(base: &str) -> DeviceSession {
    let config = EndpointConfiguration {
        base_address: base.to_owned(),
        ..EndpointConfiguration::default()
    };
    let gate = Arc::new(ConfigGate::load(Arc::new(MemorySettingsStore::with(config))));
    DeviceSession::start(gate, live()).await
}

async fn wait_for_state(rx: &mut watch::Receiver<ConnectionState>, want: ConnectionState) {
    timeout(STEP, rx.wait_for(|state| *state == want))
        .await
        .unwrap()
        .unwrap();
}

/// Read until the peer closes or the socket ends. Returns `true` if it did.
async fn closed_by_peer(ws: &mut DeviceSocket) -> bool {
    loop {
        match timeout(STEP, ws.next()).await {
            Err(_) => return false,
            Ok(None | Some(Err(_) | Ok(Message::Close(_)))) => return true,
            Ok(Some(Ok(_))) => {}
        }
    }
}

async fn push_lock_state(ws: &mut DeviceSocket, is_locked: bool, timestamp: &str) {
    let message = format!(
        r#"{{"type":"lock_state","isLocked":{is_locked},"timestamp":"{timestamp}"}}"#
    );
    ws.send(Message::Text(message.into())).await.unwrap();
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn address_change_moves_stream_to_new_device() {
    let mut first = LocalDevice::start().await;
    let mut second = LocalDevice::start().await;

    let session = start(&first.base).await;
    let mut state = session.connection_state();
    let mut old_socket = first.next_socket().await;
    wait_for_state(&mut state, ConnectionState::Connected).await;
    assert_eq!(
        session.lock_state(),
        Some(LockState::new(false, "2026-01-05T08:00:00"))
    );

    session
        .update_config(&ConfigPatch::base_address(&second.base))
        .await
        .unwrap();
    assert!(closed_by_peer(&mut old_socket).await);

    let mut new_socket = second.next_socket().await;
    wait_for_state(&mut state, ConnectionState::Connected).await;

    let mut lock = session.subscribe_lock();
    push_lock_state(&mut new_socket, true, "2026-01-05T09:00:00").await;
    let record = timeout(STEP, lock.changed()).await.unwrap().unwrap().unwrap();
    assert_eq!(record.state, LockState::new(true, "2026-01-05T09:00:00"));
    assert_eq!(record.source, UpdateSource::Stream);

    // The old device never sees the stream again.
    assert!(
        timeout(Duration::from_millis(300), first.sockets.recv())
            .await
            .is_err()
    );

    session.shutdown().await;
}

#[tokio::test]
async fn stream_confirmation_replaces_optimistic_command() {
    let mut device = LocalDevice::start().await;
    let session = start(&device.base).await;
    let mut state = session.connection_state();
    let mut ws = device.next_socket().await;
    wait_for_state(&mut state, ConnectionState::Connected).await;

    session.set_locked(true).await.unwrap();
    assert_eq!(device.commands(), [r#"{"command":"lock"}"#]);
    let optimistic = session.store().lock_record().unwrap();
    assert!(optimistic.state.is_locked);
    assert_eq!(optimistic.source, UpdateSource::Optimistic);

    // The device reports the bolt did not move.
    let mut lock = session.subscribe_lock();
    push_lock_state(&mut ws, false, "2026-01-05T08:00:05").await;
    let record = timeout(STEP, lock.changed()).await.unwrap().unwrap().unwrap();
    assert_eq!(record.state, LockState::new(false, "2026-01-05T08:00:05"));
    assert_eq!(record.source, UpdateSource::Stream);

    session.shutdown().await;
}

#[tokio::test]
async fn dropping_session_closes_stream() {
    let mut device = LocalDevice::start().await;
    let session = start(&device.base).await;
    let mut state = session.connection_state();
    let mut ws = device.next_socket().await;
    wait_for_state(&mut state, ConnectionState::Connected).await;

    drop(session);

    assert!(closed_by_peer(&mut ws).await);
    assert!(
        timeout(Duration::from_millis(300), device.sockets.recv())
            .await
            .is_err()
    );
}
