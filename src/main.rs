use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use tubeshell::config::Config;
use tubeshell::events::Bounds;
use tubeshell::registry::{ItemContext, Registry};
use tubeshell::services::{HeadlessHost, Host, RequestFilter};
use tubeshell::settings::create_settings_store;
use tubeshell::tray::{build_tray_menu, PRODUCT_NAME};

#[derive(Parser, Debug)]
#[command(name = "tubeshell")]
#[command(about = "Settings registry and ad-request filter of a floating YouTube player")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "tubeshell.toml", global = true)]
    config: String,

    /// Keep settings in memory only
    #[arg(long, global = true)]
    dry_run: bool,

    /// Log level (overrides logging.level)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the shell and wait for Ctrl+C (default)
    Run,
    /// Print the current value of a setting
    Get { key: String },
    /// Store a JSON value for a setting
    Set { key: String, json: String },
    /// Print the default value of every setting
    Defaults,
    /// Delete all persisted settings
    Reset,
    /// Check whether the active filter list blocks a URL
    CheckUrl { url: String },
}

struct Shell {
    host: Arc<HeadlessHost>,
    filter: Arc<RequestFilter>,
    registry: Registry,
}

impl Shell {
    async fn new(config: &Config, dry_run: bool) -> Result<Self> {
        let store = create_settings_store(config, dry_run).await?;
        let host = Arc::new(HeadlessHost::new(config.filter.partitions.clone()));
        let filter = Arc::new(RequestFilter::new(
            host.clone(),
            config.filter.partitions.clone(),
            config.filter_list()?,
        ));
        let ctx = ItemContext::new(host.clone(), filter.clone(), config.ready_timeout());
        let registry = Registry::new(store, ctx, config.write_debounce());

        Ok(Self {
            host,
            filter,
            registry,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;
    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    init_tracing(level, &config.logging.format)?;

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run(&config, args.dry_run).await,
        Command::Get { key } => {
            let shell = Shell::new(&config, args.dry_run).await?;
            let item = shell.registry.require_item(&key)?;
            println!("{}", serde_json::to_string_pretty(&item.get().await)?);
            Ok(())
        }
        Command::Set { key, json } => {
            let shell = Shell::new(&config, args.dry_run).await?;
            let item = shell.registry.require_item(&key)?;
            let value: Value =
                serde_json::from_str(&json).with_context(|| format!("Invalid JSON: {}", json))?;
            item.set(value).await?;
            shell.registry.flush().await;
            info!("{} saved", key);
            Ok(())
        }
        Command::Defaults => {
            let shell = Shell::new(&config, args.dry_run).await?;
            println!("{}", serde_json::to_string_pretty(&shell.registry.defaults())?);
            Ok(())
        }
        Command::Reset => {
            let shell = Shell::new(&config, args.dry_run).await?;
            shell.registry.reset().await?;
            Ok(())
        }
        Command::CheckUrl { url } => {
            let list = config.filter_list()?;
            match list.first_match(&url) {
                Some(pattern) => println!("blocked by {}", pattern),
                None => println!("allowed ({} patterns in '{}')", list.len(), list.name()),
            }
            Ok(())
        }
    }
}

async fn run(config: &Config, dry_run: bool) -> Result<()> {
    info!("Starting {} v{}", PRODUCT_NAME, env!("CARGO_PKG_VERSION"));

    if dry_run {
        warn!("Dry run: settings are kept in memory only");
    }

    let shell = Shell::new(config, dry_run).await?;
    if let Some(path) = shell.registry.store().location() {
        info!("Settings file: {}", path.display());
    }

    let report = shell.registry.startup().await;
    info!(
        "{} item(s) initialized, {} waiting for the main window",
        report.initialized,
        report.deferred.len()
    );

    let bounds: Bounds = match shell.registry.get_item("windowBounds") {
        Some(item) => item.get_as().await.unwrap_or_default(),
        None => Bounds::default(),
    };
    shell.host.open_window(bounds);

    let applied = report.wait_deferred().await;
    info!(
        "{} deferred item(s) applied, request filter on {} session(s)",
        applied,
        shell.filter.scoped_sessions().len()
    );

    for entry in build_tray_menu(&shell.registry, shell.host.platform()).await {
        info!("tray: {}", entry);
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C"),
        Err(err) => error!("Failed to wait for Ctrl+C: {}", err),
    }

    info!("Shutting down...");

    let shutdown_timeout = tokio::time::Duration::from_secs(5);
    match tokio::time::timeout(shutdown_timeout, shell.registry.shutdown()).await {
        Ok(()) => info!("Settings saved"),
        Err(_) => warn!("Timed out while saving settings"),
    }

    shell.host.close_window();
    info!(
        "{} stopped, {} request(s) blocked",
        PRODUCT_NAME,
        shell.filter.blocked_count()
    );
    Ok(())
}

fn init_tracing(level: &str, format: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    let registry = tracing_subscriber::registry().with(filter);

    if format == "pretty" {
        registry.with(tracing_subscriber::fmt::layer().pretty()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().compact()).init();
    }

    Ok(())
}
