//! inatd — iNaturalist proxy daemon.
//!
//! Serves cached, rate-bounded passthrough of the iNaturalist API over
//! HTTP. One [`Fetcher`](inatproxy::Fetcher) is built here and shared by
//! every request handler.

use std::net::SocketAddr;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use inatproxy::server;
use inatproxy::server::config::{Config, Secrets};

/// inatd — caching iNaturalist proxy.
#[derive(Parser)]
#[command(name = "inatd")]
#[command(version = inatproxy::PKG_VERSION)]
#[command(about = "Caching, retrying iNaturalist API proxy")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Address to listen on (overrides the config file).
    #[arg(short, long, env = "INATD_ADDRESS")]
    address: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(address) = args.address {
        config.server.address = address;
    }
    let secrets = Secrets::load()?;

    let fetcher = config.fetcher_builder(&secrets).build()?;

    let addr: SocketAddr = config.server.address.parse().map_err(|e| {
        inatproxy::ProxyError::Configuration(format!("Invalid address: {e}"))
    })?;

    info!(
        version = inatproxy::version_string(),
        %addr,
        upstream = fetcher.base_url(),
        max_concurrent = fetcher.gate().limit(),
        authenticated = secrets.token().is_some(),
        "inatd starting"
    );

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, server::router(fetcher))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("inatd stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
