//! Bridge API - backend service for The Bridge Project site

use bridge_api::api::handlers::AppState;
use bridge_api::api::router;
use bridge_api::config::Config;
use bridge_api::contact::ContactStore;
use bridge_api::csrf::CsrfProtect;
use bridge_api::metrics::Metrics;
use bridge_api::vitals::VitalsStore;
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Bridge API - CSRF-protected API service for The Bridge Project site
#[derive(Parser, Debug)]
#[command(name = "bridge_api")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Listen address (overrides config)
    #[arg(short, long, value_name = "ADDR")]
    listen: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let log_level = if cli.verbose {
        "bridge_api=trace,tower_http=trace"
    } else {
        "bridge_api=debug,tower_http=debug"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from file if specified, otherwise use default loading
    let mut config = if let Some(ref path) = cli.config {
        Config::from_file(path)?
    } else {
        Config::load()
    };

    // CLI overrides
    if let Some(ref addr) = cli.listen {
        config.listen_addr = addr.parse()?;
    }

    info!("Starting Bridge API server");
    info!("  Listen address: {}", config.listen_addr);
    info!("  CSRF token length: {} bytes", config.csrf.token_length);
    info!("  CSRF token max age: {}s", config.csrf.max_age_secs);
    info!("  CSRF sweep interval: {}s", config.csrf.sweep_interval_secs);
    info!("  Vitals capacity: {} reports", config.vitals_capacity);
    if !config.csrf.secure {
        warn!("  CSRF cookie Secure flag is DISABLED — enable it behind HTTPS");
    }

    // Construct the CSRF manager (validates config) and schedule the sweep
    let csrf = Arc::new(CsrfProtect::new(config.csrf.clone())?);
    csrf.start_sweeper();

    let state = Arc::new(AppState {
        csrf: Arc::clone(&csrf),
        vitals: VitalsStore::new(config.vitals_capacity),
        contacts: ContactStore::new(),
        metrics: Some(Metrics::new()),
    });

    let app = router(state);

    // Start server with graceful shutdown
    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!("Bridge API listening on http://{}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    csrf.stop();
    info!("Server shutdown complete");
    Ok(())
}

/// Handle shutdown signals (SIGINT, SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
