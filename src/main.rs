use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use geogate::authz::{create_authz_router, AuthzState, Policy};
use geogate::config::{Config, MaxMindCredentials};
use geogate::geoip::{GeoDatabase, MaxMindLoader};
use geogate::updater::{CycleOutcome, MaxMindSource, Scheduler, TickSource, Updater};

#[derive(Parser)]
#[command(name = "geogate")]
#[command(about = "GeoIP-based request authorization service", long_about = None)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve,
    /// Update local resources
    Update {
        #[command(subcommand)]
        target: UpdateTarget,
    },
}

#[derive(Subcommand)]
enum UpdateTarget {
    /// Download the GeoIP database if the provider has a newer one
    Database,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    let default_level = if config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
    info!("Loaded configuration from {}", cli.config.display());
    for warning in config.warnings() {
        warn!("{}", warning);
    }

    match cli.command {
        Commands::Serve => serve(config).await,
        Commands::Update {
            target: UpdateTarget::Database,
        } => update_database(config).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    let credentials = MaxMindCredentials::from_config(&config.geoip)?;

    let database = Arc::new(
        GeoDatabase::open(&config.geoip.db_path, Arc::new(MaxMindLoader))
            .context("Failed to open GeoIP DB")?,
    );

    let source = MaxMindSource::new(&config.geoip, credentials)?;
    let updater = Arc::new(Updater::new(Arc::new(source), Arc::clone(&database)));
    let scheduler = Scheduler::spawn(
        updater,
        TickSource::Every(config.geoip.update_interval()),
    );
    info!(
        "🔄 GeoIP updater running every {}h (edition {})",
        config.geoip.update_interval_hours, config.geoip.edition_id
    );

    let state = Arc::new(AuthzState {
        policy: Policy::from(&config.policy),
        classifier: database,
    });
    let router = create_authz_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen_addr))?;
    info!("🚀 Server listening on http://{}", config.server.listen_addr);
    info!(
        "   - Authorization endpoint at http://{}/authz",
        config.server.listen_addr
    );

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped, waiting for GeoIP updater");
    scheduler.shutdown().await;
    Ok(())
}

async fn update_database(config: Config) -> Result<()> {
    let credentials = MaxMindCredentials::from_config(&config.geoip)?;
    let database = Arc::new(GeoDatabase::unloaded(
        &config.geoip.db_path,
        Arc::new(MaxMindLoader),
    ));
    let source = MaxMindSource::new(&config.geoip, credentials)?;
    let updater = Updater::new(Arc::new(source), database);

    match updater
        .run_cycle()
        .await
        .context("GeoIP database update failed")?
    {
        CycleOutcome::Updated => info!(
            "GeoIP database updated at {}",
            config.geoip.db_path.display()
        ),
        CycleOutcome::UpToDate => info!("GeoIP database is up to date"),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
