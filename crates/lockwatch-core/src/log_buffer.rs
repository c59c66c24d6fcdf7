// ── In-memory log capture ──
//
// A bounded ring of recent log lines, filled by a `tracing_subscriber`
// layer. Consumers hold an `Arc<LogBuffer>` for a debug console view.

use std::collections::VecDeque;
use std::fmt::{self, Write as _};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

pub const DEFAULT_CAPACITY: usize = 50;

/// One captured log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub target: String,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:>5} {}: {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.level,
            self.target,
            self.message
        )
    }
}

/// Bounded ring buffer of the most recent [`LogEntry`] values.
///
/// Oldest entries are evicted once `capacity` is reached. Every push bumps a
/// generation counter that subscribers can watch.
#[derive(Debug)]
pub struct LogBuffer {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
    generation: watch::Sender<u64>,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (generation, _) = watch::channel(0);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            generation,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&self, entry: LogEntry) {
        {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            if entries.len() == self.capacity {
                entries.pop_front();
            }
            entries.push_back(entry);
        }
        self.generation.send_modify(|generation| *generation += 1);
    }

    /// Snapshot, newest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.generation.send_modify(|generation| *generation += 1);
    }

    /// Notified after every push or clear.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }
}

// ── tracing layer ────────────────────────────────────────────────

/// `tracing_subscriber` layer that copies events into a [`LogBuffer`].
///
/// Compose it with the registry alongside the usual fmt layer:
///
/// ```ignore
/// tracing_subscriber::registry()
///     .with(filter)
///     .with(fmt::layer())
///     .with(LogBufferLayer::new(buffer.clone()))
///     .init();
/// ```
#[derive(Debug, Clone)]
pub struct LogBufferLayer {
    buffer: Arc<LogBuffer>,
    min_level: Level,
}

impl LogBufferLayer {
    /// Captures `INFO` and above.
    pub fn new(buffer: Arc<LogBuffer>) -> Self {
        Self {
            buffer,
            min_level: Level::INFO,
        }
    }

    /// Capture events at `level` and anything more severe.
    #[must_use]
    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }
}

impl<S: Subscriber> Layer<S> for LogBufferLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        // More verbose levels compare greater.
        if *metadata.level() > self.min_level {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        self.buffer.push(LogEntry {
            timestamp: Utc::now(),
            level: *metadata.level(),
            target: metadata.target().to_owned(),
            message: visitor.finish(),
        });
    }
}

/// Renders `message` followed by `key=value` for every other field.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.fields,
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }

    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{name}={value}");
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            value.clone_into(&mut self.message);
        } else {
            self.push_field(field.name(), format_args!("{value}"));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.push_field(field.name(), format_args!("{value:?}"));
        }
    }
}
