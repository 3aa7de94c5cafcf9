use std::path::Path;

use anyhow::{Context, Result};

use stocksync::inventory::default_attachment_id;
use stocksync::sync::{AttachmentAction, AttachmentOutcome};

use crate::app::App;
use crate::render::terminal;
use crate::OutputFormat;

/// Push the photo of one item, or pull it when missing locally
pub async fn sync(app: &App, query: &str, format: &OutputFormat, use_color: bool) -> Result<()> {
    let item = app.find_item(query).await?;
    let action = app
        .attachments()?
        .sync_attachment(&item)
        .await
        .context("Attachment sync failed")?;
    print_action(&item.name, action, format, use_color)
}

pub async fn pull(app: &App, query: &str, format: &OutputFormat, use_color: bool) -> Result<()> {
    let item = app.find_item(query).await?;
    let action = app
        .attachments()?
        .pull(&item)
        .await
        .context("Attachment pull failed")?;
    print_action(&item.name, action, format, use_color)
}

/// Attach a local image file to an item
pub async fn set(app: &App, query: &str, file: &Path, format: &OutputFormat) -> Result<()> {
    let item = app.find_item(query).await?;
    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;

    let blob_id = item
        .attachment
        .clone()
        .unwrap_or_else(|| default_attachment_id(&item.category, &item.id));
    app.blobs
        .put(&blob_id, &bytes)
        .await
        .context("Failed to store attachment")?;

    let updated = app
        .inventory
        .update_item(
            &item.id,
            stocksync::inventory::ItemPatch {
                attachment: Some(Some(blob_id)),
                ..Default::default()
            },
        )
        .await
        .context("Failed to update item")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&updated)?),
        OutputFormat::Plain => println!("Attached {} bytes to \"{}\"", bytes.len(), updated.name),
    }
    Ok(())
}

/// Sync every photo in a category
pub async fn sync_category(
    app: &App,
    query: &str,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let category = app.find_category(query)?;
    let outcomes = app
        .attachments()?
        .sync_category(&app.inventory, &category.id)
        .await
        .context("Attachment sync failed")?;
    print_outcomes(&outcomes, format, use_color)
}

fn print_action(
    name: &str,
    action: AttachmentAction,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "item": name, "action": action }))?
        ),
        OutputFormat::Plain => println!("{}: {}", name, terminal::attachment_label(action, use_color)),
    }
    Ok(())
}

fn print_outcomes(
    outcomes: &[AttachmentOutcome],
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(outcomes)?),
        OutputFormat::Plain => {
            if outcomes.is_empty() {
                println!("No items with photos.");
            }
            for outcome in outcomes {
                let label = terminal::attachment_label(outcome.action, use_color);
                match &outcome.error {
                    Some(error) => println!("  {}  {}  {}", outcome.path, label, error),
                    None => println!("  {}  {}", outcome.path, label),
                }
            }
        }
    }
    Ok(())
}
