//! CLI command definitions and dispatch for the `lpilot` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod credentials;
pub mod products;
pub mod run;
pub mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use uuid::Uuid;

/// Drive lead-to-quote browser workflows against target platforms.
#[derive(Parser)]
#[command(name = "lpilot", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Emit logs as JSON lines (for log shippers).
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a product for every lead in a file.
    Run {
        /// Path to a JSON file holding an array of leads.
        leads: PathBuf,

        /// Product key to execute (see `lpilot products`).
        #[arg(short, long)]
        product: String,

        /// Worker slots (overrides config.toml).
        #[arg(short, long)]
        workers: Option<usize>,

        /// Maximum retries per item after the first attempt.
        #[arg(long)]
        max_retries: Option<u32>,
    },

    /// List registered products.
    #[command(alias = "ls")]
    Products,

    /// Show recent runs, or the items of one run.
    Status {
        /// Run id to inspect; omit to list recent runs.
        run_id: Option<Uuid>,

        /// How many recent runs to list.
        #[arg(short, long, default_value_t = 10)]
        limit: u32,
    },

    /// Set a stored value.
    Set {
        #[command(subcommand)]
        resource: SetResource,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum SetResource {
    /// Store login credentials for a platform.
    Credentials {
        /// Platform identifier (e.g. "acme-insure").
        platform: String,

        /// Login name; prompted interactively when omitted.
        #[arg(long)]
        login: Option<String>,
    },
}
