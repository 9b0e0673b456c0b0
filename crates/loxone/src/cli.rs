//! Clap derive structures for the `loxone` CLI.
//!
//! Kept free of crate-internal imports: `build.rs` includes this file to
//! render man pages.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// loxone -- Miniserver profiles and offline session replays
#[derive(Debug, Parser)]
#[command(
    name = "loxone",
    version,
    about = "Inspect Loxone Miniserver profiles and replay recorded sessions",
    long_about = "Tools around the Loxone Miniserver session supervisor.\n\n\
        Profiles live in a TOML file under the platform config directory.\n\
        `replay` drives the real supervisor from a JSON-lines event script,\n\
        without touching the network.",
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
    /// Miniserver profile to use
    #[arg(long, short = 'p', env = "LOXONE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "LOXONE_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
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
    /// Inspect the configuration file and profiles
    #[command(alias = "cfg")]
    Config(ConfigArgs),

    /// Replay a recorded event script through the session supervisor
    Replay(ReplayArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the resolved configuration (passwords redacted)
    Show,

    /// Print the configuration file path
    Path,
}

// ── Replay ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// JSON-lines file, one server event per line
    pub script: PathBuf,

    /// Run a command against a control once the replay has finished,
    /// as NAME=COMMAND (e.g. "Kitchen=on", "Blind=fulldown")
    #[arg(long = "exec", short = 'e', value_name = "NAME=COMMAND")]
    pub exec: Vec<String>,

    /// Pause between reconnect attempts, in seconds
    #[arg(long, default_value = "0")]
    pub retry_delay: u64,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
