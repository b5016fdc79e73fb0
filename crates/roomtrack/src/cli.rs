//! Clap derive structures for the `roomtrack` CLI.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// roomtrack -- device directory and live presence from the terminal
#[derive(Debug, Parser)]
#[command(
    name = "roomtrack",
    version,
    about = "Manage tracked rooms and watch live presence",
    long_about = "Registers tracked devices against the roomtrack backend and\n\
        follows the live presence feed pushed over Socket.IO.",
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
    /// Config profile to use
    #[arg(long, short = 'p', env = "ROOMTRACK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Directory API base URL (overrides profile)
    #[arg(long, short = 'a', env = "ROOMTRACK_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Presence server URL (overrides profile)
    #[arg(long, env = "ROOMTRACK_SOCKET_URL", global = true)]
    pub socket_url: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "ROOMTRACK_OUTPUT",
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

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "ROOMTRACK_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "ROOMTRACK_TIMEOUT", global = true)]
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
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
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
    /// Manage registered rooms (tracked devices)
    #[command(alias = "r")]
    Rooms(RoomsArgs),

    /// Show the live presence feed
    #[command(alias = "p")]
    Presence(PresenceArgs),

    /// Join the directory with live presence
    Overview(OverviewArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Rooms ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RoomsArgs {
    #[command(subcommand)]
    pub command: RoomsCommand,
}

#[derive(Debug, Subcommand)]
pub enum RoomsCommand {
    /// List registered rooms
    #[command(alias = "ls")]
    List,

    /// Show one room by id
    Get {
        /// Record id
        id: String,
    },

    /// Register a new room
    Add {
        /// Display name
        #[arg(long, short = 'n')]
        name: String,

        /// Tracked device identifier
        #[arg(long, short = 'd')]
        device_id: String,
    },

    /// Edit an existing room; omitted fields keep their current value
    Edit {
        /// Record id
        id: String,

        /// New display name
        #[arg(long, short = 'n')]
        name: Option<String>,

        /// New device identifier
        #[arg(long, short = 'd')]
        device_id: Option<String>,
    },

    /// Delete a room
    #[command(alias = "delete")]
    Rm {
        /// Record id
        id: String,
    },
}

// ── Presence ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PresenceArgs {
    #[command(subcommand)]
    pub command: PresenceCommand,
}

#[derive(Debug, Subcommand)]
pub enum PresenceCommand {
    /// Wait for one snapshot, print it and disconnect
    Show {
        /// Group entries by location
        #[arg(long, short = 'g')]
        group_by_room: bool,

        /// Seconds to wait for the first snapshot
        #[arg(long, short = 'w', default_value = "10")]
        wait: u64,
    },

    /// Re-render on every snapshot until interrupted
    Watch {
        /// Group entries by location
        #[arg(long, short = 'g')]
        group_by_room: bool,
    },
}

// ── Overview ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct OverviewArgs {
    /// Seconds to wait for the first presence snapshot
    #[arg(long, short = 'w', default_value = "10")]
    pub wait: u64,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Show the effective configuration
    Show,

    /// Interactive setup wizard
    Init,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}
