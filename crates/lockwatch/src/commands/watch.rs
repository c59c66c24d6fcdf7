//! Live watch: lock updates, motion, connection changes, and optionally the
//! captured log, until Ctrl-C or `--count` updates.

use std::sync::Arc;

use serde::Serialize;

use lockwatch_core::{
    ConnectionState, DeviceSession, LockRecord, LogBuffer, LogEntry, MotionEvent, UpdateSource,
};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

/// One NDJSON line in `--output json` mode.
#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum WatchLine<'a> {
    LockState {
        #[serde(rename = "isLocked")]
        is_locked: bool,
        timestamp: &'a str,
        source: &'static str,
    },
    Motion {
        timestamp: &'a str,
        clip: Option<&'a str>,
    },
    Connection {
        state: String,
    },
    Log {
        level: String,
        target: &'a str,
        message: &'a str,
    },
}

fn source_label(source: UpdateSource) -> &'static str {
    match source {
        UpdateSource::Stream => "stream",
        UpdateSource::Query => "query",
        UpdateSource::Optimistic => "optimistic",
    }
}

struct Printer {
    format: OutputFormat,
    color: bool,
    quiet: bool,
}

impl Printer {
    fn emit(&self, human: String, line: &WatchLine<'_>) -> Result<(), CliError> {
        let out = match self.format {
            OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(line, true)?,
            OutputFormat::Table | OutputFormat::Plain => human,
        };
        output::print_output(&out, self.quiet);
        Ok(())
    }

    fn lock(&self, record: &LockRecord) -> Result<(), CliError> {
        let source = source_label(record.source);
        self.emit(
            format!(
                "{}  {}  ({source})",
                record.state.timestamp,
                output::lock_label(&record.state, self.color)
            ),
            &WatchLine::LockState {
                is_locked: record.state.is_locked,
                timestamp: &record.state.timestamp,
                source,
            },
        )
    }

    fn motion(&self, event: &MotionEvent) -> Result<(), CliError> {
        let clip = event.clip.as_deref();
        self.emit(
            format!(
                "{}  MOTION{}",
                event.timestamp,
                clip.map(|c| format!("  clip {c}")).unwrap_or_default()
            ),
            &WatchLine::Motion {
                timestamp: &event.timestamp,
                clip,
            },
        )
    }

    fn connection(&self, state: ConnectionState) -> Result<(), CliError> {
        self.emit(
            format!("-- {state}"),
            &WatchLine::Connection {
                state: state.to_string(),
            },
        )
    }

    fn log(&self, entry: &LogEntry) -> Result<(), CliError> {
        self.emit(
            format!("   {entry}"),
            &WatchLine::Log {
                level: entry.level.to_string(),
                target: &entry.target,
                message: &entry.message,
            },
        )
    }
}

pub async fn handle(
    session: &DeviceSession,
    args: WatchArgs,
    global: &GlobalOpts,
    format: OutputFormat,
    logs: &Arc<LogBuffer>,
) -> Result<(), CliError> {
    let printer = Printer {
        format,
        color: output::should_color(global.color),
        quiet: global.quiet,
    };

    let mut lock = session.subscribe_lock();
    let mut motion = session.store().subscribe_motion();
    let mut connection = session.connection_state();
    let mut log_generation = logs.subscribe();
    let mut printed_generation = *log_generation.borrow_and_update();

    printer.connection(*connection.borrow_and_update())?;
    if let Some(record) = lock.current() {
        printer.lock(record)?;
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut updates = 0usize;

    loop {
        tokio::select! {
            biased;
            _ = &mut ctrl_c => break,

            changed = lock.changed() => {
                let Some(record) = changed else { break };
                if let Some(record) = record {
                    printer.lock(&record)?;
                    updates += 1;
                    if args.count.is_some_and(|limit| updates >= limit) {
                        break;
                    }
                }
            }

            changed = motion.changed() => {
                let Some(event) = changed else { break };
                if let Some(event) = event.filter(|_| session.motion_detection_enabled()) {
                    printer.motion(&event)?;
                }
            }

            changed = connection.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *connection.borrow_and_update();
                printer.connection(state)?;
            }

            changed = log_generation.changed(), if args.show_log => {
                if changed.is_err() {
                    continue;
                }
                let generation = *log_generation.borrow_and_update();
                let fresh = usize::try_from(generation - printed_generation).unwrap_or(usize::MAX);
                printed_generation = generation;
                // entries() is newest first; print oldest of the fresh ones first.
                for entry in logs.entries().iter().take(fresh).rev() {
                    printer.log(entry)?;
                }
            }
        }
    }

    Ok(())
}
