//! Blog Harvester CLI
//!
//! Long-running poller plus one-shot commands for local operation.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use harvester::{
    config::{apply_env_overrides, load_config},
    error::Result,
    pipeline::{CycleReport, Scheduler},
    services::LlmTranslator,
    storage::{ContentStore, LocalStorage},
    utils::http,
};

/// Blog Harvester - incremental idol blog crawler
#[derive(Parser, Debug)]
#[command(
    name = "harvester",
    version,
    about = "Incrementally harvests group blogs and translates new posts"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "harvester.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll forever, crawling or translating depending on the hour
    Run,

    /// Run exactly one cycle at the current time
    Cycle,

    /// Crawl now, regardless of the hour
    Crawl {
        /// Only crawl this group
        #[arg(long)]
        group: Option<String>,
    },

    /// Run one translation pass now, regardless of the hour
    Translate,

    /// Validate configuration
    Validate,

    /// Show per-group item, blob and translation counts
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn log_cycle(report: &CycleReport) {
    for crawl in &report.crawls {
        log::info!(
            "{}: {} new, {} total, {} pages",
            crawl.group_id,
            crawl.new_items,
            crawl.total_items,
            crawl.pages
        );
    }
    for (group_id, error) in &report.failed_groups {
        log::error!("{}: {}", group_id, error);
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = dotenvy::dotenv() {
        log::debug!("No .env loaded: {}", e);
    }

    let mut config = load_config(&cli.config);
    apply_env_overrides(&mut config)?;
    log::info!("Loaded configuration from {}", cli.config.display());

    if let Command::Validate = cli.command {
        log::info!("Validating configuration...");
        if let Err(e) = config.validate() {
            log::error!("Config validation failed: {}", e);
            return Err(e);
        }
        log::info!(
            "✓ Config OK ({} groups, translation via {})",
            config.groups.len(),
            config.translation.provider
        );
        return Ok(());
    }
    config.validate()?;

    let store = Arc::new(LocalStorage::from_config(&config));

    if let Command::Info = cli.command {
        log::info!("Storage root: {}", store.root().display());
        for group in &config.groups {
            let items = store.load_manifest(&group.id).await.len();
            let blobs = store.list_blobs(&group.id).await?;
            let mut translated = 0;
            for id in &blobs {
                if store.has_translation(&group.id, id).await? {
                    translated += 1;
                }
            }
            log::info!(
                "{}: {} items, {} blobs, {} translated",
                group.id,
                items,
                blobs.len(),
                translated
            );
        }
        return Ok(());
    }

    let client = http::create_async_client(&config.crawler)?;
    let translator = Arc::new(LlmTranslator::new(config.translation.clone())?);
    let scheduler = Scheduler::new(config, store, client).with_translator(translator);

    match cli.command {
        Command::Run => {
            log::info!(
                "Polling every {}s, press Ctrl-C to stop",
                scheduler.config().schedule.polling_interval_secs
            );
            tokio::select! {
                _ = scheduler.run_forever() => {}
                _ = tokio::signal::ctrl_c() => log::info!("Shutting down"),
            }
        }

        Command::Cycle => {
            let report = scheduler.run_cycle(Utc::now()).await;
            log_cycle(&report);
        }

        Command::Crawl { group } => {
            let report = scheduler.crawl_now(group.as_deref()).await?;
            log_cycle(&report);
        }

        Command::Translate => {
            let pass = scheduler.translate_now().await?;
            log::info!(
                "Translated {}, failed {}, already done {}",
                pass.translated,
                pass.failed,
                pass.already_done
            );
        }

        Command::Validate | Command::Info => {}
    }

    log::info!("Done!");

    Ok(())
}
