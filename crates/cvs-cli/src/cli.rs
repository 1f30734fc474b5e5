//! Command-line argument parsing with clap.
//!
//! Every option can also come from the environment; the variable names are
//! the ones the tool has always read, so existing cron and function
//! deployments keep working.

use std::path::PathBuf;

use clap::builder::FalseyValueParser;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Keeps Cloud Volumes Service volumes large enough to absorb their growth.
#[derive(Parser, Debug, Clone)]
#[command(name = "cvs-capacity")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Options shared by all subcommands.
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by all subcommands.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// TOML configuration file.
    #[arg(long, env = "CVS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Project ID or project number.
    #[arg(long, env = "DEVSHELL_PROJECT_ID", global = true)]
    pub project: Option<String>,

    /// Key file path, base64 key content, or service-account principal.
    #[arg(long, env = "SERVICE_ACCOUNT_CREDENTIAL", hide_env_values = true, global = true)]
    pub credential: Option<String>,

    /// Free capacity to keep, in percent (0-99).
    #[arg(long, env = "CVS_CAPACITY_MARGIN", global = true)]
    pub margin: Option<u32>,

    /// Report what would be resized without resizing.
    ///
    /// Any value but `0`, `false`, `no`, `n`, `off` or `f` enables it.
    #[arg(
        long,
        env = "CVS_DRY_MODE",
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_parser = FalseyValueParser::new()
    )]
    pub dry_run: Option<bool>,

    /// Log the workspace crates at info level.
    #[arg(
        long,
        env = "CVS_DEBUGGING",
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_parser = FalseyValueParser::new()
    )]
    pub debug: Option<bool>,

    /// Output format.
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<Format>,

    /// OAuth access token of the ambient identity (defaults to the metadata server).
    #[arg(long, env = "CLOUDSDK_AUTH_ACCESS_TOKEN", hide_env_values = true, global = true)]
    pub access_token: Option<String>,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// One JSON object per line.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Evaluate every volume in the project and grow the ones running short.
    Resize(ResizeArgs),

    /// Handle one Cloud Monitoring incident for a single volume.
    ///
    /// Sizing uses the static margin; output is always JSON.
    Alert(AlertArgs),
}

/// Arguments for `resize`.
#[derive(Args, Debug, Clone, Default)]
pub struct ResizeArgs {
    /// Minutes until the next run; 0 selects static-margin sizing.
    #[arg(long, env = "CVS_CAPACITY_INTERVAL")]
    pub interval: Option<u32>,

    /// Region to scan, `-` for all regions.
    #[arg(long, env = "CVS_REGION")]
    pub region: Option<String>,
}

/// Arguments for `alert`.
#[derive(Args, Debug, Clone, Default)]
pub struct AlertArgs {
    /// Pub/Sub message data (base64 or raw JSON). Read from stdin if omitted or `-`.
    pub payload: Option<String>,
}
