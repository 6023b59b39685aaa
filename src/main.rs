use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use natours_api::config::AppConfig;
use natours_api::database::DatabaseManager;
use natours_api::lifecycle::{self, Shutdown, ShutdownReason};
use natours_api::{app, AppState};

#[derive(Parser, Debug)]
#[command(name = "natours", version, about = "Tour booking REST API")]
struct Cli {
    /// Environment file loaded before reading configuration
    #[arg(long, default_value = "config.env")]
    env_file: PathBuf,

    /// Listen port (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Keep all data in process memory instead of PostgreSQL
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load the env file if present, then .env, so cargo run picks up DATABASE, JWT_SECRET, etc.
    let _ = dotenvy::from_path(&cli.env_file);
    let _ = dotenvy::dotenv();

    let mut config = AppConfig::from_env().context("invalid configuration")?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    init_tracing(&config);
    lifecycle::install_panic_hook();
    tracing::info!(environment = ?config.environment, "Starting Natours API");

    let shutdown = Shutdown::new();
    shutdown.listen_for_signals();

    let (state, manager) = if cli.in_memory {
        tracing::warn!("Using the in-memory store; data is lost on exit");
        (AppState::in_memory(config.clone()), None)
    } else {
        let manager = DatabaseManager::connect_lazy(&config.database).context("database configuration")?;
        let migrations = manager.clone();
        shutdown.spawn_supervised("database-migrate", async move {
            migrations.migrate().await.context("database migration failed")?;
            Ok(())
        });
        (AppState::postgres(config.clone(), &manager), Some(manager))
    };

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("Natours API listening on http://{}", bind_addr);

    let drain = shutdown.clone();
    axum::serve(listener, app(state).into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            drain.wait().await;
        })
        .await
        .context("server error")?;

    if let Some(manager) = manager {
        manager.close().await;
    }
    tracing::info!("Server shutdown complete");

    if shutdown.reason() == Some(ShutdownReason::Fatal) {
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let default_filter = if config.is_development() {
        "natours_api=debug,tower_http=debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    if config.is_development() {
        tracing_subscriber::registry().with(filter).with(fmt::layer()).init();
    } else {
        tracing_subscriber::registry().with(filter).with(fmt::layer().json()).init();
    }
}
