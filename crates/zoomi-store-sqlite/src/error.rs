//! Error type for `zoomi-store-sqlite`.

use thiserror::Error;
use zoomi_core::{ErrorKind, store::StoreError};

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] zoomi_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  /// A stored column could not be decoded into its domain type.
  #[error("decode error: {0}")]
  Decode(String),
}

impl StoreError for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Error::Core(e) => e.kind(),
      Error::Database(_) | Error::Uuid(_) | Error::Decode(_) => {
        ErrorKind::TransientFailure
      }
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
