// lockwatch-api: Async Rust client for the smart-lock device API (HTTP + event stream)

pub mod client;
pub mod error;
pub mod models;
pub mod transport;
pub mod websocket;

pub use client::LockClient;
pub use error::Error;
pub use models::{ActivityLogEntry, HealthStatus, LockCommand, LockState, MotionClip, MotionEvent};
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{DeviceEvent, ReconnectConfig, StreamSignal};
