use anyhow::{Context, Result};

use stocksync::inventory::{Item, ItemPatch, NewItem};

use crate::app::App;
use crate::render::terminal::{self, Color};
use crate::OutputFormat;

pub async fn list(
    app: &App,
    category: Option<&str>,
    low_only: bool,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let categories = match category {
        Some(query) => vec![app.find_category(query)?],
        None => app.inventory.categories().list(),
    };

    let mut groups = Vec::new();
    for category in categories {
        let items = app
            .inventory
            .category_items(&category.id)
            .await
            .context("Failed to list items")?;
        let items: Vec<Item> = items
            .iter()
            .filter(|item| !low_only || item.is_low_stock())
            .cloned()
            .collect();
        groups.push((category, items));
    }

    match format {
        OutputFormat::Json => {
            let output: Vec<serde_json::Value> = groups
                .iter()
                .map(|(category, items)| {
                    serde_json::json!({
                        "category": category.id,
                        "name": category.name,
                        "items": items,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            // Empty categories only show up when asked for by name
            let single = groups.len() == 1;
            let mut total = 0;
            for (category, items) in &groups {
                if items.is_empty() && (low_only || !single) {
                    continue;
                }
                let header = format!("{} {} ({})", category.icon, category.name, items.len());
                println!("{}", terminal::paint(&header, Color::BOLD, use_color));
                if items.is_empty() {
                    println!("    (no items)");
                }
                for item in items {
                    println!("    {}", terminal::render_item_row(item, use_color));
                }
                println!();
                total += items.len();
            }
            println!("{} items", total);
        }
    }

    Ok(())
}

pub async fn add(app: &App, input: NewItem, format: &OutputFormat) -> Result<()> {
    let category = app.find_category(&input.category)?;
    let input = NewItem {
        category: category.id.clone(),
        ..input
    };
    let item = app
        .inventory
        .create_item(input)
        .await
        .context("Failed to create item")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&item)?),
        OutputFormat::Plain => println!(
            "Created \"{}\" in {} ({})",
            item.name, category.name, item.id
        ),
    }
    Ok(())
}

pub async fn update(
    app: &App,
    query: &str,
    mut patch: ItemPatch,
    format: &OutputFormat,
) -> Result<()> {
    let item = app.find_item(query).await?;
    if let Some(category) = patch.category.take() {
        patch.category = Some(app.find_category(&category)?.id);
    }

    let updated = app
        .inventory
        .update_item(&item.id, patch)
        .await
        .context("Failed to update item")?;
    print_item(&updated, "Updated", format)
}

pub async fn adjust(app: &App, query: &str, delta: f64, format: &OutputFormat) -> Result<()> {
    let item = app.find_item(query).await?;
    let updated = app
        .inventory
        .adjust_stock(&item.id, delta)
        .await
        .context("Failed to adjust stock")?;
    print_item(&updated, "Stock of", format)
}

pub async fn delete(app: &App, query: &str, format: &OutputFormat) -> Result<()> {
    let item = app.find_item(query).await?;
    let deleted = app
        .inventory
        .delete_item(&item.id)
        .await
        .context("Failed to delete item")?;
    print_item(&deleted, "Deleted", format)
}

pub async fn stats(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    let stats = app.inventory.all_stats().await.context("Failed to compute stats")?;
    let orphaned = app
        .inventory
        .orphaned_items()
        .await
        .context("Failed to read items")?;

    match format {
        OutputFormat::Json => {
            let mut value = serde_json::to_value(&stats)?;
            if let Some(map) = value.as_object_mut() {
                map.insert("orphaned".to_string(), serde_json::to_value(&orphaned)?);
            }
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Plain => {
            for (category, s) in &stats.categories {
                let low = if s.low_stock > 0 {
                    terminal::paint(&format!("{} low", s.low_stock), Color::YELLOW, use_color)
                } else {
                    String::new()
                };
                println!(
                    "{} {:<16} {:>5} items {:>12.2}  {}",
                    category.icon, category.name, s.item_count, s.total_value, low
                );
            }
            println!(
                "\n{} items, total value {:.2}, {} low on stock",
                stats.total_items, stats.total_value, stats.low_stock
            );
            if !orphaned.is_empty() {
                let note = format!("{} items belong to no configured category:", orphaned.len());
                println!("{}", terminal::paint(&note, Color::YELLOW, use_color));
                for item in &orphaned {
                    println!("    {} ({})", item.name, item.category);
                }
            }
        }
    }
    Ok(())
}

fn print_item(item: &Item, verb: &str, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(item)?),
        OutputFormat::Plain => println!(
            "{} \"{}\": {} {}",
            verb,
            item.name,
            terminal::format_number(item.stock),
            item.unit
        ),
    }
    Ok(())
}
