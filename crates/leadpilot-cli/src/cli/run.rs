//! `lpilot run` -- execute a product for every lead in a file.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use uuid::Uuid;

use leadpilot_core::store::RunStore;
use leadpilot_types::lead::Lead;
use leadpilot_types::queue::QueueItem;
use leadpilot_types::run::{Run, RunItem, RunItemStatus, RunStatus, derive_run_status};

use crate::state::AppState;

/// Load leads, persist a run, drain it through the worker pool, and render
/// the outcome.
pub async fn run_batch(
    state: &AppState,
    leads_path: &Path,
    product_key: &str,
    workers: Option<usize>,
    max_retries: Option<u32>,
    json: bool,
) -> Result<()> {
    if !state.registry.has(product_key) {
        bail!(
            "unknown product '{product_key}'; registered products: {}",
            state.registry.keys().join(", ")
        );
    }

    let content = tokio::fs::read_to_string(leads_path)
        .await
        .with_context(|| format!("reading {}", leads_path.display()))?;
    let leads: Vec<Lead> = serde_json::from_str(&content)
        .with_context(|| format!("parsing {} as a JSON array of leads", leads_path.display()))?;
    if leads.is_empty() {
        bail!("{} contains no leads", leads_path.display());
    }

    // Persist the run before any execution so a crash leaves a record.
    let run = Run {
        id: Uuid::now_v7(),
        status: RunStatus::Pending,
        created_at: Utc::now(),
        completed_at: None,
    };
    let max_retries = max_retries.unwrap_or(state.config.retry.max_attempts.saturating_sub(1));
    let mut records = Vec::with_capacity(leads.len());
    let mut queue_items = Vec::with_capacity(leads.len());
    for lead in leads {
        let item_id = Uuid::now_v7();
        records.push(RunItem {
            id: item_id,
            run_id: run.id,
            product_key: product_key.to_string(),
            lead_id: lead.id,
            status: RunItemStatus::Queued,
            artifacts_dir: None,
            created_at: Utc::now(),
            completed_at: None,
            error: None,
        });
        queue_items.push(QueueItem {
            id: item_id,
            run_id: run.id,
            product_key: product_key.to_string(),
            lead_id: lead.id,
            lead,
            max_retries,
        });
    }
    state.runs.create_run(&run, &records).await?;

    let workers = workers.unwrap_or(state.config.workers).max(1);
    let manager = state.queue_manager(workers);
    let total = queue_items.len();
    let lead_names: std::collections::HashMap<Uuid, String> = queue_items
        .iter()
        .map(|q| (q.id, q.lead.full_name()))
        .collect();
    manager.enqueue(queue_items);

    // Ctrl-C interrupts the drain instead of killing the process mid-write.
    {
        let manager = std::sync::Arc::clone(&manager);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling run");
                manager.cancel();
            }
        });
    }

    let progress = if json {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:30.cyan/dim}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("=> "),
        );
        bar
    };

    let drain = manager.process_all();
    tokio::pin!(drain);
    let mut ticker = tokio::time::interval(Duration::from_millis(120));
    let results = loop {
        tokio::select! {
            results = &mut drain => break results,
            _ = ticker.tick() => {
                let stats = manager.stats();
                progress.set_position((stats.completed + stats.failed) as u64);
                progress.set_message(format!(
                    "{} running, {} failed",
                    stats.workers.busy, stats.failed
                ));
            }
        }
    };
    progress.finish_and_clear();

    // Derive the aggregate status from the final item statuses.
    let items = state.runs.items(&run.id).await?;
    let statuses: Vec<RunItemStatus> = items.iter().map(|i| i.status).collect();
    let run_status = derive_run_status(&statuses);
    state.runs.update_run_status(&run.id, run_status).await?;

    if json {
        let report = serde_json::json!({
            "run_id": run.id,
            "status": run_status,
            "results": results,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let succeeded = results.values().filter(|r| r.success).count();
    let failed = results.len() - succeeded;

    println!();
    println!(
        "  {} Run {} finished: {} succeeded, {} failed",
        if failed == 0 {
            style("✓").green().bold()
        } else {
            style("!").yellow().bold()
        },
        style(run.id.to_string()).dim(),
        style(succeeded).green(),
        if failed > 0 {
            style(failed).red()
        } else {
            style(failed).dim()
        },
    );
    println!();

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Lead").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Quote").fg(Color::White),
        Cell::new("Details").fg(Color::White),
    ]);

    for item in &items {
        let result = results.get(&item.id);
        let lead_name = lead_names
            .get(&item.id)
            .cloned()
            .unwrap_or_else(|| item.lead_id.to_string());

        let status_cell = match item.status {
            RunItemStatus::Done => Cell::new("● done").fg(Color::Green),
            RunItemStatus::Failed => Cell::new("✗ failed").fg(Color::Red),
            RunItemStatus::Cancelled => Cell::new("◌ cancelled").fg(Color::DarkGrey),
            RunItemStatus::Queued | RunItemStatus::Running => {
                Cell::new(item.status.to_string()).fg(Color::Yellow)
            }
        };

        let quote = result
            .and_then(|r| r.quote.as_ref())
            .map(|q| format!("{:.2} {}", q.premium, q.currency))
            .unwrap_or_else(|| "-".to_string());

        let details = match item.status {
            RunItemStatus::Failed => item.error.clone().unwrap_or_default(),
            _ => item.artifacts_dir.clone().unwrap_or_default(),
        };

        table.add_row(vec![
            Cell::new(lead_name),
            status_cell,
            Cell::new(quote),
            Cell::new(details).fg(Color::DarkGrey),
        ]);
    }

    println!("{table}");
    println!();
    Ok(())
}
