//! calcol-enrich - catalog enrichment service
//!
//! Serves the enrichment HTTP API by default. The `enrich`, `quota` and
//! `post` subcommands run a single operation and print JSON or text to
//! stdout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use calcol_common::config::resolve_config_path;
use calcol_common::logging::init_tracing;
use calcol_common::ConfigSource;
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info};

use calcol_enrich::config::EnrichConfig;
use calcol_enrich::db::{self, SqliteStorage};
use calcol_enrich::providers::Providers;
use calcol_enrich::services::post_formatter::format_post;
use calcol_enrich::types::{CalculatorInfo, EnrichmentRecord};
use calcol_enrich::{AppState, Orchestrator, QuotaGuard, Storage};

/// Command-line arguments for calcol-enrich
#[derive(Parser, Debug)]
#[command(name = "calcol-enrich")]
#[command(about = "Multi-source enrichment for vintage calculator catalog entries")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite catalog database (overrides `database-path`)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve {
        /// Port to listen on (overrides `server.port`)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Enrich one entry and print the outcome as JSON
    Enrich {
        /// Catalog entry id
        id: i64,
    },
    /// Print quota status for every provider
    Quota,
    /// Generate a social media post for one entry
    Post {
        /// Catalog entry id
        id: i64,
        /// twitter, x, facebook, instagram, linkedin, reddit, mastodon
        #[arg(short, long)]
        platform: String,
        /// Run enrichment first (nothing is persisted)
        #[arg(long)]
        enrich: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let source = match resolve_config_path(args.config.as_deref()) {
        Some(path) => ConfigSource::load(&path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ConfigSource::empty(),
    };
    let log_level = source
        .get_string("logging.level")
        .unwrap_or_else(|| "info".to_string());
    init_tracing(&log_level);

    let mut config = EnrichConfig::from_source(&source).context("Invalid configuration")?;
    if let Some(database) = args.database {
        config.database_path = database;
    }

    info!("Starting calcol-enrich v{} ({})", env!("CARGO_PKG_VERSION"), env!("GIT_HASH"));
    if let Some(origin) = source.origin() {
        info!("Config: {}", origin.display());
    }
    info!("Database: {}", config.database_path.display());

    let pool = db::init_database_pool(&config.database_path)
        .await
        .context("Failed to open catalog database")?;
    let storage: Arc<dyn Storage> = Arc::new(SqliteStorage::new(pool, config.base_url.clone()));
    let quota = Arc::new(QuotaGuard::new(&config.quota_limits()));
    let providers = Providers::from_config(&config).context("Failed to build providers")?;
    let orchestrator = Arc::new(
        Orchestrator::new(storage, providers, quota).with_added_by(config.added_by.clone()),
    );

    match args.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => {
            let port = port.unwrap_or(config.server.port);
            serve(&config.server.host, port, orchestrator).await
        }
        Command::Enrich { id } => {
            let outcome = orchestrator.enrich(id).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Command::Quota => {
            let status = orchestrator.quota().status_all();
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        Command::Post {
            id,
            platform,
            enrich,
        } => {
            let entry = orchestrator
                .storage()
                .get_entry(id)
                .await?
                .ok_or_else(|| anyhow!("Calculator {} not found", id))?;
            let record: Option<EnrichmentRecord> = if enrich {
                Some(orchestrator.preview(&entry).await)
            } else {
                None
            };
            let post = format_post(&platform, &CalculatorInfo::from(&entry), record.as_ref());
            println!("{}", post.content);
            Ok(())
        }
    }
}

async fn serve(host: &str, port: u16, orchestrator: Arc<Orchestrator>) -> Result<()> {
    let app = calcol_enrich::build_router(AppState::new(orchestrator));

    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Failed to bind to {}:{}", host, port))?;
    info!("Listening on http://{}:{}", host, port);
    info!("Health check: http://{}:{}/health", host, port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
