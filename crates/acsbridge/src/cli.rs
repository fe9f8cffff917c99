//! Clap derive structures for the `acsbridge` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

use acsbridge_core::Category;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// acsbridge -- vendor-independent TR-069 settings over an ACS
#[derive(Debug, Parser)]
#[command(
    name = "acsbridge",
    version,
    about = "Read and change CPE settings through a TR-069 ACS",
    long_about = "Reads device parameter trees from a GenieACS northbound interface,\n\
        presents them as vendor-independent settings (wifi_5_ssid, lan_ip, ...),\n\
        and pushes edits back with retry and confirmation.",
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
    /// ACS profile to use
    #[arg(long, short = 'p', env = "ACSBRIDGE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// NBI base URL (overrides profile)
    #[arg(long, short = 'u', env = "ACSBRIDGE_NBI_URL", global = true)]
    pub nbi_url: Option<String>,

    /// NBI basic-auth username
    #[arg(long, env = "ACSBRIDGE_USERNAME", global = true)]
    pub username: Option<String>,

    /// NBI basic-auth password
    #[arg(long, env = "ACSBRIDGE_PASSWORD", global = true, hide_env = true)]
    pub password: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "ACSBRIDGE_OUTPUT",
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
    #[arg(long, short = 'k', env = "ACSBRIDGE_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "ACSBRIDGE_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
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

#[derive(Debug, Clone, ValueEnum)]
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
    /// Show the logical settings a device currently reports
    #[command(alias = "v")]
    Values(ValuesArgs),

    /// List every raw parameter in the device tree
    Params(ParamsArgs),

    /// List the logical keys this build knows about
    Catalog(CatalogArgs),

    /// Show which concrete paths a logical key maps to on a device
    Resolve(ResolveArgs),

    /// Change settings on a device and wait for confirmation
    Set(SetArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Read commands ────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ValuesArgs {
    /// ACS device ID (e.g. 202BC1-BM632w-000001)
    pub device: String,

    /// Only keys in this category (device, wan, lan, wifi, management)
    #[arg(long, short = 'c')]
    pub category: Option<Category>,
}

#[derive(Debug, Args)]
pub struct ParamsArgs {
    /// ACS device ID
    pub device: String,

    /// Only parameters the device reports as writable
    #[arg(long, short = 'w')]
    pub writable: bool,

    /// Only parameters under this second-level object (e.g. WiFi, LANDevice)
    #[arg(long, short = 'c')]
    pub category: Option<String>,
}

#[derive(Debug, Args)]
pub struct CatalogArgs {
    /// Only keys in this category
    #[arg(long, short = 'c')]
    pub category: Option<Category>,
}

#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// ACS device ID
    pub device: String,

    /// Logical key (e.g. wifi_5_ssid)
    pub key: String,
}

// ── Write commands ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SetArgs {
    /// ACS device ID
    pub device: String,

    /// One or more key=value assignments (e.g. wifi_5_ssid=Office)
    #[arg(required = true, value_name = "KEY=VALUE")]
    pub assignments: Vec<String>,

    /// Ask the ACS to wake the device with a connection request
    #[arg(long, overrides_with = "no_wake")]
    pub wake: bool,

    /// Queue the change for the device's next periodic inform
    #[arg(long, overrides_with = "wake")]
    pub no_wake: bool,

    /// Return once the ACS has accepted the task, without confirming
    #[arg(long)]
    pub no_wait: bool,
}

impl SetArgs {
    /// Explicit `--wake` / `--no-wake`, if either was given.
    pub fn wake_flag(&self) -> Option<bool> {
        match (self.wake, self.no_wake) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current resolved configuration
    Show,

    /// Print the config file location
    Path,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store a profile password in the system keyring
    SetPassword {
        /// Profile name (defaults to the active profile)
        #[arg(long)]
        profile: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
