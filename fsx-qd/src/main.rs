//! fsx-qd (Query Dashboard) - Aggregation query API for the scan index
//!
//! Serves the JSON series the dashboard charts are drawn from. Connection
//! settings resolve from flags, `FSX_SEARCH_*` environment variables, and the
//! TOML config file.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use fsx_common::config::SearchConfig;
use fsx_common::search::SearchClient;
use fsx_qd::{build_router, AppState};

#[derive(Parser, Debug)]
#[command(name = "fsx-qd")]
#[command(about = "Query API backend for the field-scan dashboard")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5780", env = "FSX_QD_PORT")]
    port: u16,

    /// Config file with a [search] table
    #[arg(long)]
    config: Option<PathBuf>,

    /// Index name, overriding config and environment
    #[arg(long)]
    index: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let mut config =
        SearchConfig::resolve(args.config.as_deref()).context("resolving search config")?;
    if let Some(index) = args.index {
        config.index = index;
    }
    info!(cluster = %config.base_url(), index = %config.index, "search cluster configured");

    let client = SearchClient::new(&config).context("building search client")?;
    let state = AppState::new(client, config.index);
    let app = build_router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("fsx-qd listening on http://{addr}");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
