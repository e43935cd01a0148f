//! Zoomi HTTP server: configuration loading and application assembly.
//!
//! The binary in `main.rs` is a thin shell over [`load_config`] and [`app`].

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::Router;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use zoomi_store_sqlite::SqliteStore;

/// Prefix for environment overrides, e.g. `ZOOMI_PORT=9000`.
pub const ENV_PREFIX: &str = "ZOOMI";

/// Runtime server configuration, deserialised from `config.toml` and the
/// environment.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:       "127.0.0.1".to_string(),
      port:       8080,
      store_path: PathBuf::from("zoomi.db"),
    }
  }
}

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Load configuration from an optional TOML file at `path`, overlaid with
/// `ZOOMI_*` environment variables. Missing keys fall back to defaults.
pub fn load_config(path: &Path) -> Result<ServerConfig, config::ConfigError> {
  let mut cfg: ServerConfig = config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(config::Environment::with_prefix(ENV_PREFIX))
    .build()?
    .try_deserialize()?;
  cfg.store_path = expand_tilde(&cfg.store_path);
  Ok(cfg)
}

/// The full application: the API under `/api` with request tracing.
pub fn app(store: SqliteStore) -> Router {
  Router::new()
    .nest("/api", zoomi_api::api_router(Arc::new(store)))
    .layer(TraceLayer::new_for_http())
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
