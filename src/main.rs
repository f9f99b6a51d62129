//! Referral Notifier - friend-request and unseen-message digests
//!
//! Merges per-user friend-request counts from Neo4j with unseen chat
//! counts from DynamoDB and mails one digest to each user.
//!
//! Exit codes:
//!   0 - Invocation completed (individual mail failures included)
//!   1 - Configuration error or a source could not be read

mod cli;
mod config;
mod controller;
mod dispatch;
mod error;
mod models;
mod notify;
mod reconcile;
mod report;
mod sources;

use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use config::Config;
use controller::Invocation;
use dispatch::Dispatcher;
use notify::SmtpNotifier;
use sources::{GraphSource, IndexedSource};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("Referral Notifier v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Invocation failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .referral-notifier.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(config::DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "{} already exists. Remove it first or edit it manually.",
            config::DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::DEFAULT_CONFIG_FILE))?;

    println!("Created {} with default settings.", config::DEFAULT_CONFIG_FILE);
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run one invocation and print its response.
async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;
    debug!("Effective config: {:?}", config);

    let notifier = SmtpNotifier::new(&config.mail)?;
    let dispatcher = Dispatcher::new(
        Arc::new(notifier),
        config.dispatch.pace(),
        config.dispatch.delivery_retries,
    )
    .with_progress(!args.quiet);

    let invocation = Invocation::new(
        Arc::new(GraphSource::new(config.graph.clone())),
        Arc::new(IndexedSource::new(config.store.clone())),
        dispatcher,
    )
    .dry_run(config.dispatch.dry_run);

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    let outcome = invocation.run(&cancel).await?;

    if let Some(ref path) = args.report {
        let content = match args.format {
            OutputFormat::Json => report::generate_json_report(&outcome.report)?,
            OutputFormat::Markdown => report::generate_markdown_report(&outcome.report),
        };
        report::write_report(&content, path)?;
        info!("Run report saved to {}", path.display());
    }

    println!("{}", serde_json::to_string(&outcome.response)?);
    Ok(())
}

/// Stop issuing notifications on Ctrl-C. Sends already made stand.
fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; no further notifications will be sent");
            cancel.cancel();
        }
    });
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", config::DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
