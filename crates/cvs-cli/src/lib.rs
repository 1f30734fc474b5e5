//! # cvs-cli
//!
//! The `cvs-capacity` command-line tool.
//!
//! - `cvs-capacity resize`: evaluate every volume of a project (or one
//!   region) and grow the volumes that would fill before the next run
//! - `cvs-capacity alert`: handle one Cloud Monitoring incident for a single
//!   volume, sizing it with the static margin
//!
//! Reports go to stdout (a table or JSON lines); diagnostics go to stderr.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod alert;
pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod runner;

pub use cli::{AlertArgs, Cli, Commands, Format, GlobalArgs, ResizeArgs};
pub use config::{Endpoints, FileConfig, Settings};
pub use error::CliError;
pub use output::OutputFormat;
pub use runner::{RunSummary, run_alert, run_resize};
