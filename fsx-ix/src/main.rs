//! fsx-ix - Index administration CLI
//!
//! One-shot operations against the search cluster: upload pipeline output,
//! check the index, delete documents or the index, export to CSV. Connection
//! settings resolve from flags, `FSX_SEARCH_*` environment variables, and the
//! TOML config file.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use fsx_common::config::SearchConfig;
use fsx_common::search::{SearchClient, DEFAULT_BATCH_SIZE};

#[derive(Parser, Debug)]
#[command(name = "fsx-ix")]
#[command(about = "Administer the field-scan search index")]
#[command(version)]
struct Args {
    /// Config file with a [search] table
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Index name, overriding config and environment
    #[arg(long, global = true)]
    index: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bulk-upload JSON document files or directories of them
    Upload {
        /// JSON files (arrays of documents) or directories of .json files
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Documents per bulk request
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },
    /// Show index existence, document count, and sample documents
    Check,
    /// Delete every document, keeping the index
    DeleteDocs {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Delete an index entirely
    DeleteIndex {
        name: String,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Export every document to a CSV file
    Export {
        #[arg(long)]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
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
    info!(cluster = %config.base_url(), index = %config.index, "connecting");
    let client = SearchClient::new(&config).context("building search client")?;

    match args.command {
        Command::Upload { paths, batch_size } => {
            let failed = fsx_ix::upload(&client, &config.index, &paths, batch_size).await?;
            if failed > 0 {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Check => fsx_ix::check(&client, &config.index).await?,
        Command::DeleteDocs { yes } => {
            if !yes {
                bail!("refusing to delete documents without --yes");
            }
            fsx_ix::delete_docs(&client, &config.index).await?;
        }
        Command::DeleteIndex { name, yes } => {
            if !yes {
                bail!("refusing to delete index '{name}' without --yes");
            }
            fsx_ix::delete_index(&client, &name).await?;
        }
        Command::Export { out } => fsx_ix::export(&client, &config.index, &out).await?,
    }
    Ok(ExitCode::SUCCESS)
}
