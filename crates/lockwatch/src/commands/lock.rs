//! Lock state command handlers.

use serde::Serialize;

use lockwatch_core::{DeviceSession, LockState};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusView<'a> {
    is_locked: bool,
    timestamp: &'a str,
    state: &'static str,
}

impl<'a> From<&'a LockState> for StatusView<'a> {
    fn from(state: &'a LockState) -> Self {
        Self {
            is_locked: state.is_locked,
            timestamp: &state.timestamp,
            state: state.label(),
        }
    }
}

pub async fn status(
    session: &DeviceSession,
    global: &GlobalOpts,
    format: OutputFormat,
) -> Result<(), CliError> {
    // The session fetched the state on start; fetch again only to surface
    // the error if that failed.
    let state = match session.lock_state() {
        Some(state) => state,
        None => session.refresh_state().await?,
    };

    let color = output::should_color(global.color);
    let out = output::render_single(
        format,
        &StatusView::from(&state),
        |_| format!("{}  (as of {})", output::lock_label(&state, color), state.timestamp),
        |view| view.state.to_owned(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn set(
    session: &DeviceSession,
    global: &GlobalOpts,
    is_locked: bool,
) -> Result<(), CliError> {
    session.set_locked(is_locked).await?;
    tracing::info!(locked = is_locked, "lock command accepted");
    if !global.quiet {
        eprintln!("{}", if is_locked { "Locked" } else { "Unlocked" });
    }
    Ok(())
}
