use stocksync::inventory::Item;
use stocksync::sync::{AttachmentAction, PassReport, SyncAction};

/// ANSI color codes
#[allow(dead_code)]
pub struct Color;

#[allow(dead_code)]
impl Color {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";
}

/// Wrap `text` in a color when colors are enabled
pub fn paint(text: &str, color: &str, use_color: bool) -> String {
    if use_color {
        format!("{}{}{}", color, text, Color::RESET)
    } else {
        text.to_string()
    }
}

pub fn action_label(action: SyncAction, use_color: bool) -> String {
    match action {
        SyncAction::Uploaded => paint("uploaded", Color::GREEN, use_color),
        SyncAction::Downloaded => paint("downloaded", Color::BLUE, use_color),
        SyncAction::None => paint("unchanged", Color::GRAY, use_color),
        SyncAction::Error => paint("error", Color::RED, use_color),
    }
}

pub fn attachment_label(action: AttachmentAction, use_color: bool) -> String {
    match action {
        AttachmentAction::Uploaded => paint("uploaded", Color::GREEN, use_color),
        AttachmentAction::Downloaded => paint("downloaded", Color::BLUE, use_color),
        AttachmentAction::Unavailable => paint("unavailable", Color::YELLOW, use_color),
        AttachmentAction::Error => paint("error", Color::RED, use_color),
    }
}

/// Render a pass report as plain lines
pub fn render_report(report: &PassReport, use_color: bool) -> Vec<String> {
    let mut lines = vec![format!(
        "index.json: {}",
        action_label(report.index, use_color)
    )];

    if report.categories.is_empty() {
        lines.push("No category changes.".to_string());
    }

    let width = report
        .categories
        .iter()
        .map(|c| c.category.len())
        .max()
        .unwrap_or(0);
    for outcome in &report.categories {
        let mut line = format!(
            "  {:<width$}  {}",
            outcome.category,
            action_label(outcome.action, use_color),
            width = width
        );
        if let Some(error) = &outcome.error {
            line.push_str(&format!("  {}", paint(error, Color::DIM, use_color)));
        }
        lines.push(line);
    }

    lines.push(format!(
        "{} uploaded, {} downloaded, {} errors in {}ms",
        report.uploaded(),
        report.downloaded(),
        report.errors(),
        report.duration_ms
    ));
    lines
}

/// One table row for an item
pub fn render_item_row(item: &Item, use_color: bool) -> String {
    let stock = format!("{} {}", format_number(item.stock), item.unit);
    let stock = if item.is_low_stock() {
        paint(&stock, Color::YELLOW, use_color)
    } else {
        stock
    };
    let sku = item.sku.as_deref().unwrap_or("-");
    let photo = if item.attachment.is_some() { " [photo]" } else { "" };
    format!(
        "{:<32} {:<12} {:>14} {:>10}{}",
        truncate(&item.name, 32),
        truncate(sku, 12),
        stock,
        format!("{:.2}", item.price),
        photo
    )
}

/// Drop a trailing `.0` from whole numbers
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}
