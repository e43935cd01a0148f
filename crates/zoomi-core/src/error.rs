//! Error types for `zoomi-core`.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,

  #[error("child not found: {0}")]
  ChildNotFound(Uuid),

  #[error("profile not found: {0}")]
  ProfileNotFound(Uuid),

  #[error("family not found: {0}")]
  FamilyNotFound(Uuid),

  #[error("profile {0} already exists or already belongs to a family")]
  ProfileExists(Uuid),

  #[error("invalid or expired code")]
  InvalidOrExpiredCode,

  #[error("failed to generate unique code after {0} attempts")]
  GenerationExhausted(u32),

  #[error("invalid input: {0}")]
  InvalidInput(String),
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Unauthorized => ErrorKind::Unauthorized,
      Self::ChildNotFound(_)
      | Self::ProfileNotFound(_)
      | Self::FamilyNotFound(_) => ErrorKind::NotFound,
      Self::ProfileExists(_) => ErrorKind::Conflict,
      Self::InvalidOrExpiredCode => ErrorKind::InvalidOrExpiredCode,
      Self::GenerationExhausted(_) => ErrorKind::GenerationExhausted,
      Self::InvalidInput(_) => ErrorKind::InvalidInput,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Wire discriminant ───────────────────────────────────────────────────────

/// Structured failure category carried on every error response, so callers
/// branch on a stable tag rather than on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  Unauthorized,
  NotFound,
  Conflict,
  InvalidOrExpiredCode,
  GenerationExhausted,
  InvalidInput,
  /// Network or datastore failure; the operation may succeed if retried.
  TransientFailure,
}

impl ErrorKind {
  /// Whether retrying the same request later can reasonably succeed.
  pub fn is_retryable(self) -> bool {
    matches!(self, Self::GenerationExhausted | Self::TransientFailure)
  }
}
