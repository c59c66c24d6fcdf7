mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use lockwatch_core::log_buffer::DEFAULT_CAPACITY;
use lockwatch_core::{LogBuffer, LogBufferLayer};

use crate::cli::{Cli, Command};
use crate::config::Context;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Captured log lines back `watch --show-log`
    let logs = Arc::new(LogBuffer::new(log_capacity(&cli.global)));
    init_tracing(cli.global.verbose, &logs);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli, logs).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// Buffer size from settings. A broken settings file is reported later by
/// the command itself, so fall back quietly here.
fn log_capacity(global: &cli::GlobalOpts) -> usize {
    lockwatch_config::load_settings_from(&config::settings_file(global))
        .map_or(DEFAULT_CAPACITY, |settings| settings.defaults.log_capacity)
}

fn init_tracing(verbosity: u8, logs: &Arc<LogBuffer>) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // Terminal output follows -v / RUST_LOG; the buffer always keeps INFO.
    let stderr = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)));

    tracing_subscriber::registry()
        .with(stderr)
        .with(LogBufferLayer::new(Arc::clone(logs)).with_filter(LevelFilter::INFO))
        .init();
}

async fn run(cli: Cli, logs: Arc<LogBuffer>) -> Result<(), CliError> {
    match cli.command {
        // Config commands never touch the device
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "lockwatch", &mut std::io::stdout());
            Ok(())
        }

        // Everything else runs against a device session
        cmd => {
            let ctx = Context::load(&cli.global)?;
            let format = ctx.output(&cli.global)?;
            let stream = matches!(cmd, Command::Watch(_));
            let session = ctx.session(&cli.global, stream).await?;

            tracing::debug!(command = ?cmd, "dispatching command");
            let result = commands::dispatch(cmd, &session, &cli.global, format, &logs).await;
            session.shutdown().await;
            result
        }
    }
}
