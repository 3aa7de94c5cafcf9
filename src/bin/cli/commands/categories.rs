use anyhow::{Context, Result};

use crate::app::App;
use crate::OutputFormat;

pub async fn list(app: &App, format: &OutputFormat) -> Result<()> {
    let mut rows = Vec::new();
    for category in app.inventory.categories().list() {
        let stats = app
            .inventory
            .category_stats(&category.id)
            .await
            .context("Failed to read category")?;
        rows.push((category, stats));
    }

    match format {
        OutputFormat::Json => {
            let output: Vec<serde_json::Value> = rows
                .iter()
                .map(|(category, stats)| {
                    serde_json::json!({
                        "id": category.id,
                        "name": category.name,
                        "icon": category.icon,
                        "itemCount": stats.item_count,
                        "lastModified": stats.last_modified,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            if rows.is_empty() {
                println!("No categories.");
                return Ok(());
            }
            let width = rows.iter().map(|(c, _)| c.id.len()).max().unwrap_or(2).max(2);
            for (category, stats) in &rows {
                println!(
                    "{} {:<width$}  {:<20} {:>5} items",
                    category.icon,
                    category.id,
                    category.name,
                    stats.item_count,
                    width = width
                );
            }
        }
    }
    Ok(())
}

pub fn add(app: &App, name: &str, icon: Option<&str>, format: &OutputFormat) -> Result<()> {
    let category = app
        .inventory
        .categories()
        .add(name, icon)
        .context("Failed to add category")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&category)?),
        OutputFormat::Plain => println!("Added {} {} ({})", category.icon, category.name, category.id),
    }
    Ok(())
}

pub fn rename(
    app: &App,
    query: &str,
    name: Option<&str>,
    icon: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    let category = app.find_category(query)?;
    let updated = app
        .inventory
        .categories()
        .update(&category.id, name, icon)
        .context("Failed to update category")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&updated)?),
        OutputFormat::Plain => println!("Updated {} {} ({})", updated.icon, updated.name, updated.id),
    }
    Ok(())
}

pub async fn delete(app: &App, query: &str, format: &OutputFormat) -> Result<()> {
    let category = app.find_category(query)?;
    let deleted = app
        .inventory
        .delete_category(&category.id)
        .await
        .context("Failed to delete category")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&deleted)?),
        OutputFormat::Plain => println!("Deleted {} ({})", deleted.name, deleted.id),
    }
    Ok(())
}
