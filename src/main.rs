mod cache;
mod catalog;
mod config;
mod error;
mod icons;
mod launcher;
mod metadata;
mod toolbox;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use catalog::ToolKey;
use config::{config_path, load_config, ToolboxConfig, DEFAULT_CONFIG};
use error::ToolboxError;
use icons::PLACEHOLDER_GLYPH;
use toolbox::{CategoryView, Toolbox};

#[derive(Parser)]
#[command(name = "toolbox")]
#[command(about = "Categorized launcher for local tools", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level filter (e.g. debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Catalog root directory (overrides catalog.root from config)
    #[arg(long, global = true)]
    root: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List categories
    Categories,

    /// Show the tool grid of a category (first category by default)
    List {
        category: Option<String>,
        /// Print the view as JSON
        #[arg(long)]
        json: bool,
        /// Print icon cache statistics
        #[arg(long)]
        stats: bool,
    },

    /// Open a tool with the system default handler
    Open { category: String, file: String },

    /// Show or change the display name and description of a tool
    Edit {
        category: String,
        file: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },

    /// Forget the stored name and description of a tool
    Reset { category: String, file: String },

    /// Export the icon of a tool as PNG
    Icon {
        category: String,
        file: String,
        #[arg(long)]
        out: PathBuf,
    },

    /// Manage configuration (.toolbox/config.toml)
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Create default config.toml in .toolbox/ directory
    Init,
    /// Show path to the config file
    Path,
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<ToolboxError>()
            .map(ToolboxError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

fn init_logging(level: &str) {
    let json_logging = std::env::var("TOOLBOX_LOG_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("toolbox={}", level).into());

    if json_logging {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let toolbox_dir = cwd.join(".toolbox");

    if let Commands::Config { action } = cli.command {
        return handle_config(&toolbox_dir, action);
    }

    let config = effective_config(&cwd, &toolbox_dir, cli.root);
    let mut toolbox = Toolbox::load(config)?;

    match cli.command {
        Commands::Categories => handle_categories(&toolbox),
        Commands::List {
            category,
            json,
            stats,
        } => handle_list(&mut toolbox, category, json, stats),
        Commands::Open { category, file } => handle_open(&toolbox, ToolKey::new(category, file)),
        Commands::Edit {
            category,
            file,
            name,
            description,
        } => handle_edit(&mut toolbox, ToolKey::new(category, file), name, description),
        Commands::Reset { category, file } => handle_reset(&mut toolbox, ToolKey::new(category, file)),
        Commands::Icon {
            category,
            file,
            out,
        } => handle_icon(&mut toolbox, ToolKey::new(category, file), &out),
        Commands::Config { .. } => Ok(()),
    }
}

fn effective_config(cwd: &Path, toolbox_dir: &Path, root: Option<PathBuf>) -> ToolboxConfig {
    let mut config = load_config(toolbox_dir);
    if let Some(root) = root {
        config.catalog.root = root;
    }
    config.resolve_paths(cwd)
}

// === CLI handlers ===

fn handle_categories(toolbox: &Toolbox) -> anyhow::Result<()> {
    let categories = toolbox.categories();
    if categories.is_empty() {
        eprintln!("No categories in {}", toolbox.catalog_root().display());
    }
    for category in categories {
        println!("{}", category);
    }
    Ok(())
}

fn handle_list(
    toolbox: &mut Toolbox,
    category: Option<String>,
    json: bool,
    stats: bool,
) -> anyhow::Result<()> {
    let view = match category {
        Some(category) => {
            if !toolbox.categories().contains(&category) {
                return Err(ToolboxError::CategoryNotFound(category).into());
            }
            Some(toolbox.select_category(&category))
        }
        None => toolbox.initial_view(),
    };

    if json {
        let mut output = json!({ "view": view });
        if stats {
            output["cache"] = serde_json::to_value(toolbox.cache_stats())?;
            output["icons_supported"] = json!(toolbox.icons_supported());
            output["tool_info_entries"] = json!(toolbox.metadata().len());
        }
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    match &view {
        Some(view) => print_view(view),
        None => println!("No categories"),
    }

    if stats {
        let stats = toolbox.cache_stats();
        println!();
        if !toolbox.icons_supported() {
            println!("Icon extraction unavailable on this platform");
        }
        println!(
            "Tool info: {} entries in {}",
            toolbox.metadata().len(),
            toolbox.metadata().path().display()
        );
        println!(
            "Icon cache: {} entries ({} negative), {} hits, {} misses, hit rate {:.1}%",
            stats.entries,
            stats.negative_entries,
            stats.hits,
            stats.misses,
            stats.hit_rate * 100.0
        );
    }
    Ok(())
}

fn print_view(view: &CategoryView) {
    println!("[{}]", view.category);
    if let Some(message) = view.empty_message() {
        println!("  {}", message);
        return;
    }

    for tile in &view.tiles {
        let marker = tile.glyph().unwrap_or("*");
        print!(
            "  {:>2},{:<2} {} {} ({})",
            tile.row, tile.column, marker, tile.display_name, tile.file_name
        );
        if let Some(tooltip) = &tile.tooltip {
            print!(" - {}", tooltip);
        }
        println!();
    }
}

fn handle_open(toolbox: &Toolbox, key: ToolKey) -> anyhow::Result<()> {
    toolbox.open(&key)?;
    println!("Opened {}", key);
    Ok(())
}

fn handle_edit(
    toolbox: &mut Toolbox,
    key: ToolKey,
    name: Option<String>,
    description: Option<String>,
) -> anyhow::Result<()> {
    let form = toolbox.edit_form(&key)?;

    if name.is_none() && description.is_none() {
        println!("{}{}", form.key, if form.stored { "" } else { " (defaults)" });
        println!("name: {}", form.name);
        println!("description: {}", form.description);
        return Ok(());
    }

    let name = name.unwrap_or(form.name);
    let description = description.unwrap_or(form.description);
    toolbox.save_edit(&form.key, &name, &description)?;
    println!("Updated {}", form.key);
    Ok(())
}

fn handle_reset(toolbox: &mut Toolbox, key: ToolKey) -> anyhow::Result<()> {
    if toolbox.reset(&key)? {
        println!("Reset {}", key);
    } else {
        println!("Nothing stored for {}", key);
    }
    Ok(())
}

fn handle_icon(toolbox: &mut Toolbox, key: ToolKey, out: &Path) -> anyhow::Result<()> {
    match toolbox.tool_icon(&key)? {
        Some(bitmap) => {
            bitmap.save_png(out)?;
            println!("Wrote {}x{} icon to {}", bitmap.edge(), bitmap.edge(), out.display());
        }
        None => println!("No icon for {} (shown as {})", key, PLACEHOLDER_GLYPH),
    }
    Ok(())
}

fn handle_config(toolbox_dir: &Path, action: Option<ConfigAction>) -> anyhow::Result<()> {
    let config_path = config_path(toolbox_dir);

    match action {
        Some(ConfigAction::Path) => {
            println!("{}", config_path.display());
        }
        Some(ConfigAction::Init) => {
            std::fs::create_dir_all(toolbox_dir)?;
            if config_path.exists() {
                eprintln!("Config already exists: {}", config_path.display());
                return Ok(());
            }
            std::fs::write(&config_path, DEFAULT_CONFIG)?;
            println!("Created: {}", config_path.display());
        }
        None => {
            // Show effective config
            let config = load_config(toolbox_dir);
            println!("# Effective config ({})\n", config_path.display());
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
