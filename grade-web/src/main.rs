//! grade-web - grade report web service
//!
//! Serves student grade reports and the teacher dashboard for one subject
//! (student mode) or for every subject (admin mode).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use grade_common::config::{load_env_file, AppConfig, ConfigOverrides};
use grade_common::db::{init_database, load_or_init_session_secret};
use grade_web::{build_router, AppState};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for grade-web
#[derive(Parser, Debug)]
#[command(name = "grade-web")]
#[command(about = "Grade report web service")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long, env = "GRADE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "GRADE_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "GRADE_PORT")]
    port: Option<u16>,

    /// SQLite database file
    #[arg(short, long, env = "GRADE_DATABASE")]
    database: Option<PathBuf>,

    /// Subject served in student mode
    #[arg(short, long, env = "APP_SUBJECT")]
    subject: Option<String>,

    /// Deployment mode: student or admin
    #[arg(short, long, env = "APP_MODE")]
    mode: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            subject: self.subject.clone(),
            mode: self.mode.clone(),
            database_path: self.database.clone(),
            host: self.host.clone(),
            port: self.port,
            ..ConfigOverrides::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Fill unset variables from .env before clap reads its `env` bindings
    let dotenv = load_env_file(None);

    let args = Args::parse();

    let overrides = args
        .overrides()
        .or(ConfigOverrides::from_env().context("Invalid environment configuration")?);
    let config = AppConfig::load(args.config.as_deref(), overrides)
        .context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let level = &config.logging.level;
            EnvFilter::new(format!(
                "grade_web={level},grade_common={level},tower_http={level}"
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting grade-web v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!(
        "{} in {:?} mode, subject {}",
        config.app_name,
        config.mode,
        config.subject.as_deref().unwrap_or("(per request)")
    );
    info!("Database path: {}", config.database_path.display());
    match &dotenv {
        Ok(Some(path)) => info!("Loaded environment from {}", path.display()),
        Ok(None) => {}
        Err(e) => warn!("Ignoring {}", e),
    }

    let pool = init_database(&config.database_path)
        .await
        .context("Failed to open database")?;

    let session_secret = match config.session_secret.clone() {
        Some(secret) => secret,
        None => load_or_init_session_secret(&pool)
            .await
            .context("Failed to load session secret")?,
    };

    let bind_address = config.bind_address();
    let state = AppState::new(config, pool, session_secret)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind to {bind_address}"))?;
    info!("grade-web listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

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
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
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
