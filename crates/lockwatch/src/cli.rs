//! Clap derive structures for the `lockwatch` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// lockwatch -- watch and control a networked smart lock
#[derive(Debug, Parser)]
#[command(
    name = "lockwatch",
    version,
    about = "Monitor and control a smart lock from the command line",
    long_about = "Talks to a smart lock device over its local HTTP API and live\n\
        WebSocket event stream: query and change the lock state, follow\n\
        state changes as they happen, and browse activity and motion clips.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Device base address, e.g. http://192.168.1.40:8000 (overrides settings)
    #[arg(long, short = 'e', env = "LOCKWATCH_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// Settings file to use instead of the platform default
    #[arg(long, env = "LOCKWATCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format [default: from settings, else table]
    #[arg(long, short = 'o', env = "LOCKWATCH_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "LOCKWATCH_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds [default: from settings, else 10]
    #[arg(long, env = "LOCKWATCH_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the current lock state
    #[command(alias = "st")]
    Status,

    /// Lock the door
    Lock,

    /// Unlock the door
    Unlock,

    /// Follow lock state, motion, and connection changes live
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Show the device's activity log
    #[command(alias = "log")]
    Activity,

    /// List recorded motion clips
    Clips,

    /// Print the live camera feed address
    Camera,

    /// Check that the device is up
    Health,

    /// Manage the stored device settings
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Also print captured log lines as they arrive
    #[arg(long)]
    pub show_log: bool,

    /// Exit after this many lock state updates
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the resolved device settings
    Show,

    /// Change device settings; unset flags keep their current value
    Set(ConfigSetArgs),

    /// Print the settings file path
    Path,
}

#[derive(Debug, Args)]
#[group(required = true, multiple = true)]
pub struct ConfigSetArgs {
    /// Device base address; an empty string clears it
    #[arg(long)]
    pub base_address: Option<String>,

    /// Offer the live camera feed
    #[arg(long)]
    pub camera: Option<bool>,

    /// Report motion events while watching
    #[arg(long)]
    pub motion_detection: Option<bool>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
