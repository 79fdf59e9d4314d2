//! `lpilot set credentials` -- store platform login credentials.

use anyhow::Result;
use console::style;
use dialoguer::{Input, Password};

use leadpilot_core::store::CredentialsStore;
use leadpilot_types::credentials::PlatformCredentials;

use crate::state::AppState;

pub async fn set_credentials(
    state: &AppState,
    platform: &str,
    login: Option<String>,
    json: bool,
) -> Result<()> {
    let login = match login {
        Some(login) => login,
        None => Input::<String>::new()
            .with_prompt(format!("Login for {platform}"))
            .interact_text()?,
    };

    // Never accepted as a flag: it would land in shell history.
    let password = Password::new()
        .with_prompt(format!("Password for {platform}"))
        .with_confirmation("Repeat password", "Passwords do not match")
        .interact()?;

    state
        .credentials
        .store(PlatformCredentials::new(platform, login.clone(), password))
        .await?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "platform": platform, "login": login, "stored": true })
        );
        return Ok(());
    }

    println!();
    println!(
        "  {} Credentials stored for {}",
        style("✓").green().bold(),
        style(platform).cyan()
    );
    println!();
    Ok(())
}
