//! `lpilot status` -- recent runs, or one run's items.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use uuid::Uuid;

use leadpilot_core::store::RunStore;
use leadpilot_types::run::{RunItemStatus, RunStatus};

use crate::state::AppState;

pub async fn status(
    state: &AppState,
    run_id: Option<Uuid>,
    limit: u32,
    json: bool,
) -> Result<()> {
    match run_id {
        Some(run_id) => show_run(state, run_id, json).await,
        None => list_runs(state, limit, json).await,
    }
}

async fn list_runs(state: &AppState, limit: u32, json: bool) -> Result<()> {
    let runs = state.runs.list_runs(limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!();
        println!(
            "  {} No runs yet. Start one with: {}",
            style("i").blue().bold(),
            style("lpilot run leads.json --product <key>").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Run").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Created").fg(Color::White),
        Cell::new("Completed").fg(Color::White),
    ]);

    for run in &runs {
        table.add_row(vec![
            Cell::new(run.id.to_string()).fg(Color::Cyan),
            run_status_cell(run.status),
            Cell::new(run.created_at.format("%Y-%m-%d %H:%M:%S").to_string()),
            Cell::new(
                run.completed_at
                    .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            )
            .fg(Color::DarkGrey),
        ]);
    }

    println!("{table}");
    Ok(())
}

async fn show_run(state: &AppState, run_id: Uuid, json: bool) -> Result<()> {
    let Some(run) = state.runs.run(&run_id).await? else {
        anyhow::bail!("no run with id {run_id}");
    };
    let items = state.runs.items(&run_id).await?;

    if json {
        let report = serde_json::json!({ "run": run, "items": items });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!(
        "  Run {}: {}",
        style(run.id.to_string()).cyan(),
        style(format!("{:?}", run.status)).bold()
    );
    println!();

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Item").fg(Color::White),
        Cell::new("Product").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Error").fg(Color::White),
    ]);

    for item in &items {
        let status_cell = match item.status {
            RunItemStatus::Done => Cell::new("● done").fg(Color::Green),
            RunItemStatus::Failed => Cell::new("✗ failed").fg(Color::Red),
            RunItemStatus::Cancelled => Cell::new("◌ cancelled").fg(Color::DarkGrey),
            RunItemStatus::Running => Cell::new("… running").fg(Color::Yellow),
            RunItemStatus::Queued => Cell::new("queued").fg(Color::Yellow),
        };
        table.add_row(vec![
            Cell::new(item.id.to_string()).fg(Color::DarkGrey),
            Cell::new(&item.product_key),
            status_cell,
            Cell::new(item.error.as_deref().unwrap_or("")),
        ]);
    }

    println!("{table}");
    println!();
    Ok(())
}

fn run_status_cell(status: RunStatus) -> Cell {
    match status {
        RunStatus::Completed => Cell::new("completed").fg(Color::Green),
        RunStatus::PartiallyFailed => Cell::new("partially failed").fg(Color::Yellow),
        RunStatus::Failed => Cell::new("failed").fg(Color::Red),
        RunStatus::Cancelled => Cell::new("cancelled").fg(Color::DarkGrey),
        RunStatus::Running => Cell::new("running").fg(Color::Yellow),
        RunStatus::Pending => Cell::new("pending").fg(Color::Yellow),
    }
}
