use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bazaar::config::Config;
use bazaar::AppState;

#[derive(Parser, Debug)]
#[command(name = "bazaar")]
#[command(author, version, about = "A small storefront backend with OTP-verified accounts", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "bazaar.toml", env = "BAZAAR_CONFIG")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(&cli.config)?;

    // Initialize logging. RUST_LOG wins over both the CLI flag and the config file.
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Bazaar v{}", env!("CARGO_PKG_VERSION"));

    config.auth.ensure_secrets()?;

    // Initialize database
    let db = bazaar::db::init(&config.server.data_dir).await?;

    // Create the bootstrap admin if one is configured
    if let (Some(email), Some(password)) = (
        &config.auth.bootstrap_admin_email,
        &config.auth.bootstrap_admin_password,
    ) {
        bazaar::api::auth::ensure_admin_user(&db, email, password)
            .await
            .context("Failed to create bootstrap admin")?;
    }

    let metrics_handle = bazaar::api::metrics::init_metrics()?;
    let mailer = bazaar::notifications::mailer_from_config(&config.email);

    let state = Arc::new(
        AppState::new(config.clone(), db.clone(), mailer).with_metrics(metrics_handle),
    );

    let cleanup = bazaar::engine::spawn_cleanup_task(db.clone(), config.auth.clone());

    let app = bazaar::api::create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("API server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Some(handle) = cleanup {
        handle.abort();
    }
    db.close().await;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
