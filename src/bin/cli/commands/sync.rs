use anyhow::{Context, Result};

use stocksync::inventory::now_millis;
use stocksync::sync::config::{interval_from_minutes, DEFAULT_INTERVAL_MINUTES};
use stocksync::sync::{AutoSync, CategoryOutcome, SyncAction};

use crate::app::App;
use crate::render::terminal;
use crate::OutputFormat;

/// Run one pass, or force every category with `all`
pub async fn run(app: &mut App, all: bool, format: &OutputFormat, use_color: bool) -> Result<()> {
    let engine = app.engine()?;

    if all {
        let outcomes = engine
            .sync_all_categories()
            .await
            .context("Sync failed")?;
        print_outcomes(&outcomes, format, use_color)?;
    } else {
        let report = engine.smart_sync().await.context("Sync failed")?;
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            OutputFormat::Plain => {
                for line in terminal::render_report(&report, use_color) {
                    println!("{}", line);
                }
            }
        }
    }

    app.config.last_sync = Some(now_millis());
    app.save_config()?;
    Ok(())
}

fn print_outcomes(
    outcomes: &[CategoryOutcome],
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(outcomes)?),
        OutputFormat::Plain => {
            for outcome in outcomes {
                let label = terminal::action_label(outcome.action, use_color);
                match &outcome.error {
                    Some(error) => println!("  {:<16} {}  {}", outcome.category, label, error),
                    None => println!("  {:<16} {}", outcome.category, label),
                }
            }
            let errors = outcomes.iter().filter(|o| o.action == SyncAction::Error).count();
            println!("\n{} categories, {} errors", outcomes.len(), errors);
        }
    }
    Ok(())
}

/// Keep syncing on a timer until Ctrl-C
pub async fn watch(app: &App, interval_minutes: Option<u64>) -> Result<()> {
    let engine = app.engine()?;

    let interval = match interval_minutes {
        Some(minutes) => interval_from_minutes(minutes),
        None => app
            .config
            .auto_sync_interval()
            .unwrap_or_else(|| interval_from_minutes(DEFAULT_INTERVAL_MINUTES)),
    };

    let mut auto_sync = AutoSync::new(engine);
    auto_sync.start(interval);
    auto_sync.sync_now();

    println!(
        "Syncing every {} minutes. Press Ctrl-C to stop.",
        interval.as_secs() / 60
    );
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    auto_sync.stop();
    println!("Stopped.");
    Ok(())
}
