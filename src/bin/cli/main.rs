mod app;
mod commands;
mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use stocksync::inventory::{ItemPatch, NewItem};

#[derive(Parser)]
#[command(name = "stocksync", about = "Local-first inventory with repository sync", version)]
struct Cli {
    /// Use a specific data directory (default: platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Sync changed categories with the remote repository
    Sync {
        /// Sync every category instead of only the changed ones
        #[arg(long)]
        all: bool,
    },

    /// Sync periodically until interrupted
    Watch {
        /// Minutes between passes (defaults to the configured interval)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Item management
    #[command(subcommand)]
    Items(ItemsCommand),

    /// Category management
    #[command(subcommand)]
    Categories(CategoriesCommand),

    /// Item photo sync
    #[command(subcommand)]
    Attachment(AttachmentCommand),

    /// Show or change sync settings
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Import a legacy JSON export
    Migrate {
        /// Path to the exported item array
        file: PathBuf,
    },

    /// Stock and value totals per category
    Stats,
}

#[derive(Subcommand)]
enum ItemsCommand {
    /// List items, grouped by category
    List {
        /// Only this category (case-insensitive prefix match)
        #[arg(long)]
        category: Option<String>,
        /// Only items at or below their minimum stock
        #[arg(long)]
        low: bool,
    },

    /// Add an item
    Add {
        name: String,
        /// Category id or name
        #[arg(long)]
        category: String,
        #[arg(long, default_value = "0")]
        stock: f64,
        #[arg(long, default_value = "Stk")]
        unit: String,
        #[arg(long)]
        sku: Option<String>,
        #[arg(long, default_value = "0")]
        min: f64,
        #[arg(long, default_value = "0")]
        max: f64,
        #[arg(long, default_value = "0")]
        price: f64,
        #[arg(long, default_value = "")]
        location: String,
        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Change fields of an item
    Update {
        /// Item id, SKU or name
        item: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// New SKU (empty string clears it)
        #[arg(long)]
        sku: Option<String>,
        #[arg(long)]
        stock: Option<f64>,
        #[arg(long)]
        unit: Option<String>,
        #[arg(long)]
        min: Option<f64>,
        #[arg(long)]
        max: Option<f64>,
        #[arg(long)]
        price: Option<f64>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Add to or take from the stock of an item
    Adjust {
        item: String,
        /// Amount to add (negative to take)
        #[arg(allow_hyphen_values = true)]
        delta: f64,
    },

    /// Delete an item
    Delete { item: String },
}

#[derive(Subcommand)]
enum CategoriesCommand {
    /// List categories with item counts
    List,

    /// Add a category
    Add {
        name: String,
        #[arg(long)]
        icon: Option<String>,
    },

    /// Rename a category or change its icon
    Rename {
        category: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        icon: Option<String>,
    },

    /// Delete an empty category
    Delete { category: String },
}

#[derive(Subcommand)]
enum AttachmentCommand {
    /// Push the photo of an item (pulls it when missing locally)
    Sync { item: String },

    /// Download the photo of an item
    Pull { item: String },

    /// Attach an image file to an item
    Set { item: String, file: PathBuf },

    /// Sync all photos in a category
    Category { category: String },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show the current settings
    Show,

    /// Change settings
    Set {
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        repo: Option<String>,
        #[arg(long)]
        branch: Option<String>,
        /// Contents API base URL
        #[arg(long)]
        api_url: Option<String>,
        /// Access token (empty string removes it)
        #[arg(long)]
        token: Option<String>,
        /// Minutes between automatic passes
        #[arg(long)]
        interval: Option<u64>,
        /// Sync periodically instead of only on demand
        #[arg(long)]
        periodic: Option<bool>,
        #[arg(long)]
        enabled: Option<bool>,
    },

    /// Check that the repository is reachable
    Test,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let use_color = !cli.no_color && atty_check();
    let mut app = app::App::new(cli.data_dir.as_deref())?;

    match cli.command {
        Command::Sync { all } => {
            commands::sync::run(&mut app, all, &cli.format, use_color).await?;
        }
        Command::Watch { interval } => {
            commands::sync::watch(&app, interval).await?;
        }
        Command::Items(subcmd) => match subcmd {
            ItemsCommand::List { category, low } => {
                commands::items::list(&app, category.as_deref(), low, &cli.format, use_color)
                    .await?;
            }
            ItemsCommand::Add {
                name,
                category,
                stock,
                unit,
                sku,
                min,
                max,
                price,
                location,
                notes,
            } => {
                let input = NewItem {
                    name,
                    sku,
                    category,
                    stock,
                    unit,
                    min,
                    max,
                    price,
                    location,
                    notes,
                    attachment: None,
                };
                commands::items::add(&app, input, &cli.format).await?;
            }
            ItemsCommand::Update {
                item,
                name,
                category,
                sku,
                stock,
                unit,
                min,
                max,
                price,
                location,
                notes,
            } => {
                let patch = ItemPatch {
                    name,
                    sku: sku.map(|s| if s.is_empty() { None } else { Some(s) }),
                    category,
                    stock,
                    unit,
                    min,
                    max,
                    price,
                    location,
                    notes,
                    attachment: None,
                };
                commands::items::update(&app, &item, patch, &cli.format).await?;
            }
            ItemsCommand::Adjust { item, delta } => {
                commands::items::adjust(&app, &item, delta, &cli.format).await?;
            }
            ItemsCommand::Delete { item } => {
                commands::items::delete(&app, &item, &cli.format).await?;
            }
        },
        Command::Categories(subcmd) => match subcmd {
            CategoriesCommand::List => {
                commands::categories::list(&app, &cli.format).await?;
            }
            CategoriesCommand::Add { name, icon } => {
                commands::categories::add(&app, &name, icon.as_deref(), &cli.format)?;
            }
            CategoriesCommand::Rename {
                category,
                name,
                icon,
            } => {
                commands::categories::rename(
                    &app,
                    &category,
                    name.as_deref(),
                    icon.as_deref(),
                    &cli.format,
                )?;
            }
            CategoriesCommand::Delete { category } => {
                commands::categories::delete(&app, &category, &cli.format).await?;
            }
        },
        Command::Attachment(subcmd) => match subcmd {
            AttachmentCommand::Sync { item } => {
                commands::attachment::sync(&app, &item, &cli.format, use_color).await?;
            }
            AttachmentCommand::Pull { item } => {
                commands::attachment::pull(&app, &item, &cli.format, use_color).await?;
            }
            AttachmentCommand::Set { item, file } => {
                commands::attachment::set(&app, &item, &file, &cli.format).await?;
            }
            AttachmentCommand::Category { category } => {
                commands::attachment::sync_category(&app, &category, &cli.format, use_color)
                    .await?;
            }
        },
        Command::Config(subcmd) => match subcmd {
            ConfigCommand::Show => {
                commands::config::show(&app, &cli.format)?;
            }
            ConfigCommand::Set {
                owner,
                repo,
                branch,
                api_url,
                token,
                interval,
                periodic,
                enabled,
            } => {
                let update = commands::config::ConfigUpdate {
                    owner,
                    repo,
                    branch,
                    api_url,
                    token,
                    interval,
                    periodic,
                    enabled,
                };
                commands::config::set(&mut app, update)?;
            }
            ConfigCommand::Test => {
                commands::config::test(&app).await?;
            }
        },
        Command::Migrate { file } => {
            commands::migrate::run(&app, &file, &cli.format).await?;
        }
        Command::Stats => {
            commands::items::stats(&app, &cli.format, use_color).await?;
        }
    }

    Ok(())
}

/// Check if stdout is a terminal (for color support)
fn atty_check() -> bool {
    unsafe { libc_isatty(1) != 0 }
}

extern "C" {
    #[link_name = "isatty"]
    fn libc_isatty(fd: i32) -> i32;
}
