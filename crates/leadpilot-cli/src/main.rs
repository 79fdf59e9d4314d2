//! LeadPilot CLI entry point.
//!
//! Binary name: `lpilot`
//!
//! Parses CLI arguments, initializes the database and engine wiring, then
//! dispatches to the appropriate command handler.

mod cli;
mod products;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands, SetResource};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,leadpilot=debug",
        _ => "trace",
    };
    if let Err(error) = leadpilot_observe::tracing_setup::init_tracing(filter, cli.log_json) {
        eprintln!("warning: tracing init failed: {error}");
    }

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "lpilot", &mut std::io::stdout());
        return Ok(());
    }

    // Initialize application state (DB, engine wiring, product registry)
    let state = AppState::init().await?;

    match cli.command {
        Commands::Run {
            leads,
            product,
            workers,
            max_retries,
        } => {
            cli::run::run_batch(&state, &leads, &product, workers, max_retries, cli.json).await?;
        }

        Commands::Products => {
            cli::products::list_products(&state, cli.json)?;
        }

        Commands::Status { run_id, limit } => {
            cli::status::status(&state, run_id, limit, cli.json).await?;
        }

        Commands::Set { resource } => match resource {
            SetResource::Credentials { platform, login } => {
                cli::credentials::set_credentials(&state, &platform, login, cli.json).await?;
            }
        },

        Commands::Completions { .. } => unreachable!("handled before state init"),
    }

    Ok(())
}
