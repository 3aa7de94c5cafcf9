use anyhow::{Context, Result};

use stocksync::sync::{SyncCredentials, SyncMode};

use crate::app::App;
use crate::OutputFormat;

/// Fields accepted by `config set`
#[derive(Debug, Default)]
pub struct ConfigUpdate {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub branch: Option<String>,
    pub api_url: Option<String>,
    pub token: Option<String>,
    pub interval: Option<u64>,
    pub periodic: Option<bool>,
    pub enabled: Option<bool>,
}

pub fn show(app: &App, format: &OutputFormat) -> Result<()> {
    let credentials = app.credentials();
    let configured = app.config.is_configured(credentials.as_ref());
    let token = credentials.as_ref().map(|c| mask_token(&c.token));

    match format {
        OutputFormat::Json => {
            let mut value = serde_json::to_value(&app.config)?;
            if let Some(map) = value.as_object_mut() {
                map.insert("token".to_string(), serde_json::json!(token));
                map.insert("configured".to_string(), serde_json::json!(configured));
                map.insert(
                    "dataDir".to_string(),
                    serde_json::json!(app.data_dir.display().to_string()),
                );
            }
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Plain => {
            let config = &app.config;
            println!("Data dir:   {}", app.data_dir.display());
            println!("Enabled:    {}", config.enabled);
            println!("Repository: {}/{}", config.owner, config.repo);
            println!("Branch:     {}", config.branch);
            println!("API:        {}", config.api_base_url);
            println!("Token:      {}", token.as_deref().unwrap_or("(none)"));
            match config.sync_mode {
                SyncMode::Manual => println!("Mode:       manual"),
                SyncMode::Periodic => println!(
                    "Mode:       every {} minutes",
                    config
                        .sync_interval
                        .unwrap_or(stocksync::sync::config::DEFAULT_INTERVAL_MINUTES)
                ),
            }
            match config.last_sync {
                Some(at) => println!("Last sync:  {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
                None => println!("Last sync:  never"),
            }
            if !configured {
                println!("\nSync is not configured.");
            }
        }
    }
    Ok(())
}

pub fn set(app: &mut App, update: ConfigUpdate) -> Result<()> {
    let config = &mut app.config;
    if let Some(owner) = update.owner {
        config.owner = owner;
    }
    if let Some(repo) = update.repo {
        config.repo = repo;
    }
    if let Some(branch) = update.branch {
        config.branch = branch;
    }
    if let Some(api_url) = update.api_url {
        config.api_base_url = api_url.trim_end_matches('/').to_string();
    }
    if let Some(minutes) = update.interval {
        config.sync_interval = Some(minutes.max(1));
    }
    if let Some(periodic) = update.periodic {
        config.sync_mode = if periodic {
            SyncMode::Periodic
        } else {
            SyncMode::Manual
        };
    }
    if let Some(enabled) = update.enabled {
        config.enabled = enabled;
    }
    config.validate().context("Invalid sync config")?;

    if let Some(token) = update.token {
        if token.is_empty() {
            SyncCredentials::delete(&app.data_dir).context("Failed to remove token")?;
        } else {
            SyncCredentials::new(token)
                .store(&app.data_dir)
                .context("Failed to store token")?;
        }
    }

    app.save_config()?;
    println!("Saved.");
    Ok(())
}

/// Check the configured repository is reachable
pub async fn test(app: &App) -> Result<()> {
    let client = app.client()?;
    let reachable = client
        .test_connection()
        .await
        .context("Connection failed")?;

    if reachable {
        println!("Connected to {}/{}", app.config.owner, app.config.repo);
        Ok(())
    } else {
        anyhow::bail!(
            "Repository {}/{} not found",
            app.config.owner,
            app.config.repo
        )
    }
}

fn mask_token(token: &str) -> String {
    let visible: String = token.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    if token.chars().count() <= 8 {
        "****".to_string()
    } else {
        format!("****{}", visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("short"), "****");
        assert_eq!(mask_token("ghp_abcdefghijkl"), "****ijkl");
    }
}
