//! Command dispatch: bridges CLI args -> DeviceSession calls -> output formatting.

pub mod config_cmd;
pub mod device;
pub mod history;
pub mod lock;
pub mod watch;

use std::sync::Arc;

use lockwatch_core::{DeviceSession, LogBuffer};

use crate::cli::{Command, GlobalOpts, OutputFormat};
use crate::error::CliError;

/// Dispatch a device-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    session: &DeviceSession,
    global: &GlobalOpts,
    format: OutputFormat,
    logs: &Arc<LogBuffer>,
) -> Result<(), CliError> {
    match cmd {
        Command::Status => lock::status(session, global, format).await,
        Command::Lock => lock::set(session, global, true).await,
        Command::Unlock => lock::set(session, global, false).await,
        Command::Watch(args) => watch::handle(session, args, global, format, logs).await,
        Command::Activity => history::activity(session, global, format).await,
        Command::Clips => history::clips(session, global, format).await,
        Command::Camera => device::camera(session, global, format),
        Command::Health => device::health(session, global, format).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
