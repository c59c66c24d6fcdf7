//! Config subcommand handlers.

use std::fmt::Write as _;

use serde::Serialize;

use lockwatch_config::{Defaults, Settings};
use lockwatch_core::{ConfigPatch, EndpointConfiguration};

use crate::cli::{ConfigArgs, ConfigCommand, ConfigSetArgs, GlobalOpts, OutputFormat};
use crate::config::{self, Context};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

#[derive(Serialize)]
struct SettingsView<'a> {
    path: String,
    configured: bool,
    device: &'a EndpointConfiguration,
    defaults: &'a Defaults,
}

/// Render settings the way they would appear in the file.
fn format_settings(settings: &Settings) -> String {
    let device = &settings.device;
    let defaults = &settings.defaults;
    let mut out = String::new();

    let _ = writeln!(out, "[device]");
    let _ = writeln!(out, "base_address = \"{}\"", device.base_address);
    let _ = writeln!(out, "camera_enabled = {}", device.camera_enabled);
    let _ = writeln!(
        out,
        "motion_detection_enabled = {}",
        device.motion_detection_enabled
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", defaults.output);
    let _ = writeln!(out, "insecure = {}", defaults.insecure);
    let _ = writeln!(out, "timeout = {}", defaults.timeout);
    let _ = writeln!(out, "ping_interval = {}", defaults.ping_interval);
    let _ = write!(out, "log_capacity = {}", defaults.log_capacity);

    out
}

fn patch_from(args: &ConfigSetArgs) -> Result<ConfigPatch, CliError> {
    if let Some(address) = args.base_address.as_deref() {
        lockwatch_core::validate_address(address)?;
    }
    Ok(ConfigPatch {
        base_address: args.base_address.clone(),
        camera_enabled: args.camera,
        motion_detection_enabled: args.motion_detection,
    })
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let ctx = Context::load(global)?;
            let format = ctx.output(global)?;
            let out = match format {
                OutputFormat::Table | OutputFormat::Plain => format_settings(&ctx.settings),
                OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(
                    &SettingsView {
                        path: ctx.path.display().to_string(),
                        configured: ctx.settings.device.is_configured(),
                        device: &ctx.settings.device,
                        defaults: &ctx.settings.defaults,
                    },
                    format == OutputFormat::JsonCompact,
                )?,
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Set(set) => {
            let patch = patch_from(&set)?;
            let ctx = Context::load(global)?;
            let applied = ctx.file_gate().update(&patch)?;
            tracing::info!(
                base_address = %applied.base_address,
                camera = applied.camera_enabled,
                motion = applied.motion_detection_enabled,
                "device settings updated"
            );
            if !global.quiet {
                eprintln!("Settings saved to {}", ctx.path.display());
            }
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", config::settings_file(global).display());
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn settings_render_as_toml_tables() {
        let mut settings = Settings::default();
        settings.device.base_address = "http://10.0.0.5:8000".into();
        let out = format_settings(&settings);
        assert!(out.starts_with("[device]\nbase_address = \"http://10.0.0.5:8000\""));
        assert!(out.contains("\n\n[defaults]\noutput = \"table\""));
        // Rendered text must parse back as the same settings.
        let parsed: Settings = toml::from_str(&out).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn patch_rejects_unsupported_scheme() {
        let args = ConfigSetArgs {
            base_address: Some("ftp://10.0.0.5".into()),
            camera: None,
            motion_detection: None,
        };
        let err = patch_from(&args).unwrap_err();
        assert!(matches!(err, CliError::ConfigInvalid { .. }));
    }

    #[test]
    fn empty_address_clears_endpoint() {
        let args = ConfigSetArgs {
            base_address: Some(String::new()),
            camera: Some(false),
            motion_detection: None,
        };
        let patch = patch_from(&args).unwrap();
        assert_eq!(patch.base_address.as_deref(), Some(""));
        assert_eq!(patch.camera_enabled, Some(false));
    }
}
