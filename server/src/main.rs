use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use trivia_server::config::{generate_config_template, Cli, Config};
use trivia_server::db::{self, sessions::SqliteSessionStore};
use trivia_server::game::{bank::QuestionBank, registry::SessionRegistry, snapshot};
use trivia_server::{routes, state};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Handle --generate-config: print template and exit
    if cli.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Layered precedence: defaults < TOML < env < CLI
    let config = Config::load(&cli)?;

    // Initialize tracing/logging
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("trivia_server=info"))
    };
    if config.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter()).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(filter()).init();
    }

    tracing::info!("Trivia server v{} starting", env!("CARGO_PKG_VERSION"));

    // Initialize SQLite database and restore saved games
    let db = db::init_db(&config.data_dir)?;
    let store = Arc::new(SqliteSessionStore::new(db));
    let registry = Arc::new(SessionRegistry::restore(store)?);

    // Load the question bank snapshot
    let questions = Arc::new(QuestionBank::open(&config.data_dir)?);
    tracing::info!(count = questions.len(), "Question bank loaded");

    // Periodic snapshot of every game
    let _snapshot_task = snapshot::spawn_snapshot_task(registry.clone(), config.snapshot_interval_secs);
    tracing::info!(
        interval_secs = config.snapshot_interval_secs,
        "Game snapshot task started"
    );

    let app_state = state::AppState::new(registry.clone(), questions, &config);
    let app = routes::build_router(app_state);

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // Last snapshot so a clean stop loses nothing
    let saved = tokio::task::spawn_blocking(move || registry.snapshot_all()).await?;
    tracing::info!(saved, "Final game snapshot written, shutting down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
