// lockwatch-core: Reactive lock-state layer between lockwatch-api and consumers (CLI).

pub mod config;
pub mod connection;
pub mod error;
pub mod gate;
pub mod log_buffer;
pub mod session;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ConfigPatch, EndpointConfiguration, SessionConfig, validate_address};
pub use connection::{ConnectionManager, ConnectionState};
pub use error::CoreError;
pub use gate::{ConfigGate, MemorySettingsStore, SettingsError, SettingsStore};
pub use log_buffer::{LogBuffer, LogBufferLayer, LogEntry};
pub use session::DeviceSession;
pub use store::{LockRecord, LockStore, UpdateSource};
pub use stream::Subscription;

// Wire types double as domain types.
pub use lockwatch_api::{
    ActivityLogEntry, HealthStatus, LockState, MotionClip, MotionEvent, ReconnectConfig,
};
