//! Vestige HTTP server.
//!
//! Boots a [`vestige_core::Engine`] over a SQLite-backed store and serves the
//! memory API over HTTP. Configuration comes from environment variables
//! (`VestigeConfig::from_env`) with CLI flags layered on top.

mod http;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use vestige_core::{Engine, VestigeConfig};

#[derive(Parser, Debug)]
#[command(name = "vestige-server", version, about = "Compounding personal memory engine")]
struct Args {
    /// Path to the SQLite database file. Defaults to the platform data directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Port to listen on.
    #[arg(long, default_value_t = 8787)]
    port: u16,

    /// Host/interface to bind to.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .json()
        .init();

    let args = Args::parse();

    let mut config = VestigeConfig::from_env();
    if let Some(data_dir) = args.data_dir {
        config.storage_path = Some(data_dir);
    }

    let engine = Engine::new(config)?;
    let app = http::router(Arc::new(engine));

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    info!(%addr, "starting vestige-server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
