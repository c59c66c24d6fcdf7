//! Activity log and motion clip handlers.

use tabled::Tabled;

use lockwatch_core::{ActivityLogEntry, DeviceSession, MotionClip};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct ActivityRow {
    #[tabled(rename = "Time")]
    timestamp: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "User")]
    user: String,
    #[tabled(rename = "Details")]
    details: String,
}

impl From<&ActivityLogEntry> for ActivityRow {
    fn from(entry: &ActivityLogEntry) -> Self {
        Self {
            timestamp: entry.timestamp.clone(),
            action: entry.action.clone(),
            user: entry.user.clone().unwrap_or_default(),
            details: entry.details.clone().unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
struct ClipRow {
    #[tabled(rename = "Recorded")]
    timestamp: String,
    #[tabled(rename = "Clip")]
    filename: String,
    #[tabled(rename = "Length")]
    duration: String,
    #[tabled(rename = "URL")]
    url: String,
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn activity(
    session: &DeviceSession,
    global: &GlobalOpts,
    format: OutputFormat,
) -> Result<(), CliError> {
    let entries = session.refresh_activity().await?;
    let out = output::render_list(
        format,
        entries.as_slice(),
        |e| ActivityRow::from(e),
        |e| format!("{}\t{}", e.timestamp, e.action),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn clips(
    session: &DeviceSession,
    global: &GlobalOpts,
    format: OutputFormat,
) -> Result<(), CliError> {
    let clips = session.refresh_clips().await?;
    let out = output::render_list(
        format,
        clips.as_slice(),
        |clip: &MotionClip| ClipRow {
            timestamp: clip.timestamp.clone(),
            filename: clip.filename.clone(),
            duration: format!("{:.1}s", clip.duration_seconds),
            url: session.clip_address(&clip.filename).unwrap_or_default(),
        },
        |clip| clip.filename.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
