//! Client-side error type.

use thiserror::Error;
use zoomi_core::ErrorKind;

#[derive(Debug, Error)]
pub enum ClientError {
  /// The server answered with a classified failure.
  #[error("{message}")]
  Rejected { kind: ErrorKind, message: String },

  #[error("request failed: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("local storage error: {0}")]
  Storage(#[from] std::io::Error),

  #[error("local storage is corrupt: {0}")]
  StorageFormat(#[from] serde_json::Error),

  #[error("no parent is signed in on this device")]
  NotSignedIn,

  #[error("a parent is signed in on this device; sign out before linking a child")]
  ParentSignedIn,
}

impl ClientError {
  pub fn rejected(kind: ErrorKind, message: impl Into<String>) -> Self {
    Self::Rejected { kind, message: message.into() }
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Rejected { kind, .. } => *kind,
      Self::Transport(_) | Self::Storage(_) | Self::StorageFormat(_) => {
        ErrorKind::TransientFailure
      }
      Self::NotSignedIn | Self::ParentSignedIn => ErrorKind::Unauthorized,
    }
  }

  /// Text suitable for showing to the person at the device.
  pub fn user_message(&self) -> String {
    match self.kind() {
      ErrorKind::InvalidOrExpiredCode => {
        "That code is invalid or has expired. Ask a parent for a new one.".into()
      }
      ErrorKind::GenerationExhausted => {
        "The system is busy. Please try again in a moment.".into()
      }
      ErrorKind::TransientFailure => {
        "Could not reach Zoomi. Check your connection and try again.".into()
      }
      _ => self.to_string(),
    }
  }
}
