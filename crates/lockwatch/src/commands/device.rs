//! Camera and health handlers.

use std::fmt::Write as _;

use serde::Serialize;

use lockwatch_core::{DeviceSession, HealthStatus};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct CameraView {
    url: String,
}

pub fn camera(
    session: &DeviceSession,
    global: &GlobalOpts,
    format: OutputFormat,
) -> Result<(), CliError> {
    let url = session
        .camera_stream_address()
        .ok_or(CliError::CameraUnavailable)?;
    let out = output::render_single(
        format,
        &CameraView { url },
        |view| view.url.clone(),
        |view| view.url.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn health_detail(health: &HealthStatus) -> String {
    let mut out = format!("status:  {}", health.status);
    for (label, value) in [
        ("service", &health.service),
        ("version", &health.version),
        ("time", &health.timestamp),
    ] {
        if let Some(value) = value {
            let _ = write!(out, "\n{label}:{:>pad$}{value}", "", pad = 8 - label.len());
        }
    }
    out
}

pub async fn health(
    session: &DeviceSession,
    global: &GlobalOpts,
    format: OutputFormat,
) -> Result<(), CliError> {
    let health = session.health().await?;
    let out = output::render_single(format, &health, health_detail, |h| h.status.clone())?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_detail_aligns_fields() {
        let health = HealthStatus {
            status: "healthy".into(),
            service: Some("smart-lock".into()),
            version: None,
            timestamp: None,
        };
        assert_eq!(health_detail(&health), "status:  healthy\nservice: smart-lock");
    }
}
