//! Clap derive structures for the `duosync` CLI.
//!
//! Defines the command tree, global flags, and shared argument groups.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// duosync -- status and control for RGBW smart-light hubs
#[derive(Debug, Parser)]
#[command(
    name = "duosync",
    version,
    about = "Watch and control RGBW smart lights through their hub",
    long_about = "Reads device status from a smart-light hub over its push channel\n\
        (WebSocket) or HTTP polling, and sends on/off, color, brightness,\n\
        temperature and white commands.",
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
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "DUOSYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Hub base URL (overrides config)
    #[arg(long, short = 'u', env = "DUOSYNC_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short = 'o', env = "DUOSYNC_OUTPUT", global = true)]
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
    #[arg(long, short = 'k', global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides config)
    #[arg(long, env = "DUOSYNC_TIMEOUT", global = true)]
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
    /// Plain text, one device per line (scripting)
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
    /// Fetch and show the current status of every device
    #[command(alias = "st")]
    Status(StatusArgs),

    /// Follow live status until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Turn devices on
    On(TargetArgs),

    /// Turn devices off
    Off(TargetArgs),

    /// Set an RGB color (channels are clamped to 0-255)
    Color(ColorArgs),

    /// Set brightness in percent (clamped to 1-100)
    Brightness(BrightnessArgs),

    /// Set white color temperature in Kelvin (clamped to 3000-6500)
    #[command(alias = "temp")]
    Temperature(TemperatureArgs),

    /// Switch to the white channel
    White(WhiteArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Shared target arguments ──────────────────────────────────────────

#[derive(Debug, Args)]
pub struct TargetArgs {
    /// Device ids to address
    #[arg(required = true, num_args = 1..)]
    pub device_ids: Vec<String>,
}

// ── Status / Watch ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Only show these devices
    pub device_ids: Vec<String>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Stop after this long (e.g. "30s", "5m")
    #[arg(long, value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,

    /// Skip the push channel and poll from the start
    #[arg(long)]
    pub no_push: bool,
}

// ── Device commands ──────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ColorArgs {
    #[arg(long, short = 'r', default_value_t = 0.0, allow_negative_numbers = true)]
    pub red: f64,

    #[arg(long, short = 'g', default_value_t = 0.0, allow_negative_numbers = true)]
    pub green: f64,

    #[arg(long, short = 'b', default_value_t = 0.0, allow_negative_numbers = true)]
    pub blue: f64,

    #[command(flatten)]
    pub targets: TargetArgs,
}

#[derive(Debug, Args)]
pub struct BrightnessArgs {
    /// Brightness in percent
    #[arg(allow_negative_numbers = true)]
    pub value: f64,

    #[command(flatten)]
    pub targets: TargetArgs,
}

#[derive(Debug, Args)]
pub struct TemperatureArgs {
    /// Color temperature in Kelvin
    pub kelvin: f64,

    #[command(flatten)]
    pub targets: TargetArgs,
}

#[derive(Debug, Args)]
pub struct WhiteArgs {
    /// White channel level (0-100)
    #[arg(long, default_value_t = 100.0)]
    pub white: f64,

    /// Output gain (0-100)
    #[arg(long, default_value_t = 100.0)]
    pub gain: f64,

    #[command(flatten)]
    pub targets: TargetArgs,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Show the effective configuration
    Show,

    /// Write a config file with defaults
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
