use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tambourine_server::{
    create_router, AppState, DictationPipeline, LocalConnectionFactory, ProviderCatalog,
    SessionManager, Settings,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tambourine-server")]
#[command(about = "Signaling and session server for the Tambourine dictation client")]
struct Args {
    /// Host to bind to (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Config file (default: config/tambourine.*, if present)
    #[arg(short, long)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if args.verbose {
        info!("Verbose logging enabled");
    }

    let mut settings = match Settings::load(args.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            warn!("Check your config file and TAMBOURINE_* environment variables.");
            return Err(e);
        }
    };
    if let Some(host) = args.host {
        settings.server.host = host;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }

    let providers = Arc::new(ProviderCatalog::from_config(&settings.providers)?);

    let sessions = SessionManager::new(
        Arc::new(LocalConnectionFactory::new(settings.ice_servers.clone())),
        Arc::new(DictationPipeline::new(Arc::clone(&providers))),
        settings.shutdown.timeout(),
    );

    let app = create_router(AppState::new(Arc::clone(&sessions), providers));

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("{}", "=".repeat(60));
    info!("Tambourine Server Ready!");
    info!("Server endpoint: http://{}", addr);
    info!("Offer endpoint: http://{}/api/offer", addr);
    info!("Sessions endpoint: http://{}/api/sessions", addr);
    info!("Press Ctrl+C to stop");
    info!("{}", "=".repeat(60));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Shutting down server...");
    sessions.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}
