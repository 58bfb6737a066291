use anyhow::{Context, Result};
use clap::Parser;
use repute_registry::{run_bootstrap, RegistryConfig, TracingEventSink};
use repute_service::create_app;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to the registry configuration file.
    #[clap(short, long, value_parser)]
    config: Option<PathBuf>,

    /// Override the configured listen address.
    #[clap(long)]
    listen: Option<SocketAddr>,

    /// Override the configured storage directory.
    #[clap(long)]
    store: Option<PathBuf>,

    /// Register the operator and apply seed ratings before serving.
    #[clap(long)]
    bootstrap: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => RegistryConfig::from_file(path)?,
        None => RegistryConfig::default(),
    };
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    if let Some(store) = args.store {
        config.storage_path = Some(store);
    }

    let log_level_str = config.log_level.as_deref().unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level_str))
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));
    fmt::Subscriber::builder().with_env_filter(filter).init();

    match &config.storage_path {
        Some(path) => info!("Storage Path: {:?}", path),
        None => info!("No storage path configured, registry is in-memory only"),
    }

    let registry = config
        .open_registry()
        .await?
        .with_event_sink(Arc::new(TracingEventSink));
    let registry = Arc::new(registry);

    if args.bootstrap {
        let report = run_bootstrap(&registry, &config)
            .await
            .context("Bootstrap failed")?;
        info!(
            users = report.total_users,
            seeds = report.seeded.len(),
            "Bootstrap finished"
        );
    }

    let app = create_app(registry);
    info!("Reputation registry service running on {}", config.listen_addr);

    axum::Server::bind(&config.listen_addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
            info!("Received shutdown signal (Ctrl+C).");
        })
        .await
        .context("HTTP server failed")?;

    info!("Reputation registry service stopped");
    Ok(())
}
