use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current time truncated to millisecond precision.
///
/// Every timestamp written by the inventory goes through here so that values
/// survive a round trip through the ISO-8601 wire format unchanged.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// An inventory record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Opaque unique id, immutable after creation
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    /// Id of the owning category
    pub category: String,
    pub stock: f64,
    pub unit: String,
    #[serde(default)]
    pub min: f64,
    #[serde(default)]
    pub max: f64,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub notes: String,
    /// Blob store id of the attached photo
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.min
    }

    pub fn stock_value(&self) -> f64 {
        self.price * self.stock
    }

    /// Refresh `updated_at`, never moving it backwards.
    pub fn touch(&mut self) {
        let now = now_millis();
        if now > self.updated_at {
            self.updated_at = now;
        }
    }
}

/// Blob store id used for an item's photo
pub fn default_attachment_id(category_id: &str, item_id: &str) -> String {
    format!("{}/{}", category_id, item_id)
}

/// Input for creating an item
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    pub category: String,
    pub stock: f64,
    pub unit: String,
    #[serde(default)]
    pub min: f64,
    #[serde(default)]
    pub max: f64,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub attachment: Option<String>,
}

/// Partial update of an item; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    pub name: Option<String>,
    pub sku: Option<Option<String>>,
    pub category: Option<String>,
    pub stock: Option<f64>,
    pub unit: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub price: Option<f64>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub attachment: Option<Option<String>>,
}

impl ItemPatch {
    pub fn apply(self, item: &mut Item) {
        if let Some(name) = self.name {
            item.name = name;
        }
        if let Some(sku) = self.sku {
            item.sku = sku.filter(|s| !s.is_empty());
        }
        if let Some(category) = self.category {
            item.category = category;
        }
        if let Some(stock) = self.stock {
            item.stock = stock;
        }
        if let Some(unit) = self.unit {
            item.unit = unit;
        }
        if let Some(min) = self.min {
            item.min = min;
        }
        if let Some(max) = self.max {
            item.max = max;
        }
        if let Some(price) = self.price {
            item.price = price;
        }
        if let Some(location) = self.location {
            item.location = location;
        }
        if let Some(notes) = self.notes {
            item.notes = notes;
        }
        if let Some(attachment) = self.attachment {
            item.attachment = attachment;
        }
    }
}

/// A named partition of the inventory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    /// Slug derived from the name at creation; kept across renames
    pub id: String,
    pub name: String,
    pub icon: String,
}

/// Derive a category id from a display name.
///
/// `"Beschläge & Co."` becomes `"beschlaege-co"`.
pub fn category_id_from_name(name: &str) -> String {
    let mut folded = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        match c {
            'ä' => folded.push_str("ae"),
            'ö' => folded.push_str("oe"),
            'ü' => folded.push_str("ue"),
            'ß' => folded.push_str("ss"),
            'æ' => folded.push_str("ae"),
            'œ' => folded.push_str("oe"),
            'à' | 'á' | 'â' | 'ã' | 'å' => folded.push('a'),
            'ç' => folded.push('c'),
            'è' | 'é' | 'ê' | 'ë' => folded.push('e'),
            'ì' | 'í' | 'î' | 'ï' => folded.push('i'),
            'ñ' => folded.push('n'),
            'ò' | 'ó' | 'ô' | 'õ' | 'ø' => folded.push('o'),
            'ù' | 'ú' | 'û' => folded.push('u'),
            'ý' | 'ÿ' => folded.push('y'),
            other => folded.push(other),
        }
    }

    let mut slug = String::with_capacity(folded.len());
    for c in folded.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }

    slug.trim_matches('-').to_string()
}

/// Aggregate numbers for one category
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub item_count: usize,
    pub total_value: f64,
    pub low_stock: usize,
    pub total_stock: f64,
    /// Newest `updated_at` among the items, `None` for an empty category
    pub last_modified: Option<DateTime<Utc>>,
}

impl CategoryStats {
    pub fn from_items(items: &[Item]) -> Self {
        Self {
            item_count: items.len(),
            total_value: items.iter().map(Item::stock_value).sum(),
            low_stock: items.iter().filter(|i| i.is_low_stock()).count(),
            total_stock: items.iter().map(|i| i.stock).sum(),
            last_modified: items.iter().map(|i| i.updated_at).max(),
        }
    }
}

/// Totals across all categories
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryStats {
    pub categories: Vec<(Category, CategoryStats)>,
    pub total_items: usize,
    pub total_value: f64,
    pub low_stock: usize,
}
