use std::path::Path;

use anyhow::{bail, Context, Result};

use stocksync::inventory::migrate_legacy;

use crate::app::App;
use crate::OutputFormat;

/// Import a legacy JSON export (an array of item records)
pub async fn run(app: &App, file: &Path, format: &OutputFormat) -> Result<()> {
    let data = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&data).context("Legacy export is not valid JSON")?;

    let records = match value {
        serde_json::Value::Array(records) => records,
        serde_json::Value::Object(mut map) => match map.remove("items") {
            Some(serde_json::Value::Array(records)) => records,
            _ => bail!("Expected an array of items in {}", file.display()),
        },
        _ => bail!("Expected an array of items in {}", file.display()),
    };

    let report = migrate_legacy(&app.data_dir, &records, &app.inventory, app.blobs.as_ref())
        .await
        .context("Migration failed")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Plain => {
            if report.skipped {
                println!("Data is already current, nothing to migrate.");
                return Ok(());
            }
            println!(
                "Migrated {} items, {} photos, {} categories",
                report.items, report.images, report.categories
            );
            if !report.errors.is_empty() {
                println!("\n{} records skipped:", report.errors.len());
                for failure in &report.errors {
                    println!("  {}: {}", failure.item, failure.error);
                }
            }
        }
    }
    Ok(())
}
