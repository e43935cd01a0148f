//! zoomi-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite store, and serves the Zoomi API over HTTP under `/api`.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use zoomi_store_sqlite::SqliteStore;

#[derive(Parser)]
#[command(author, version, about = "Zoomi family API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let server_cfg = zoomi_server::load_config(&cli.config)
    .with_context(|| format!("failed to load config from {:?}", cli.config))?;

  let store = SqliteStore::open(&server_cfg.store_path)
    .await
    .with_context(|| {
      format!("failed to open store at {:?}", server_cfg.store_path)
    })?;

  let app = zoomi_server::app(store);
  let address = server_cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
