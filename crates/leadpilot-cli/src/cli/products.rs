//! `lpilot products` -- list registered products.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use crate::state::AppState;

pub fn list_products(state: &AppState, json: bool) -> Result<()> {
    let products = state.registry.metadata_list();

    if json {
        println!("{}", serde_json::to_string_pretty(&products)?);
        return Ok(());
    }

    if products.is_empty() {
        println!();
        println!(
            "  {} No products registered.",
            style("i").blue().bold()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Key").fg(Color::White),
        Cell::new("Name").fg(Color::White),
        Cell::new("Platform").fg(Color::White),
        Cell::new("Version").fg(Color::White),
        Cell::new("Description").fg(Color::White),
    ]);

    for product in &products {
        table.add_row(vec![
            Cell::new(&product.key).fg(Color::Cyan),
            Cell::new(&product.name),
            Cell::new(&product.platform),
            Cell::new(&product.version).fg(Color::DarkGrey),
            Cell::new(product.description.as_deref().unwrap_or("")),
        ]);
    }

    println!("{table}");
    Ok(())
}
