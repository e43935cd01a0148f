//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use thiserror::Error;
use zoomi_core::{ErrorKind, rpc::ErrorBody, store::StoreError};

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("missing or malformed caller identity")]
  Unauthenticated,

  /// A classified failure from the store or a handler check.
  #[error("{message}")]
  Rejected { kind: ErrorKind, message: String },
}

impl ApiError {
  pub fn rejected(kind: ErrorKind, message: impl Into<String>) -> Self {
    Self::Rejected { kind, message: message.into() }
  }

  /// Wrap a backend error, keeping its classification.
  pub fn store<E: StoreError>(e: E) -> Self {
    let kind = e.kind();
    if kind == ErrorKind::TransientFailure {
      tracing::error!(error = %e, "store failure");
    }
    Self::Rejected { kind, message: e.to_string() }
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      ApiError::Unauthenticated => ErrorKind::Unauthorized,
      ApiError::Rejected { kind, .. } => *kind,
    }
  }

  fn status(&self) -> StatusCode {
    match self {
      ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
      ApiError::Rejected { kind, .. } => match kind {
        ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::InvalidOrExpiredCode => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::GenerationExhausted | ErrorKind::TransientFailure => {
          StatusCode::SERVICE_UNAVAILABLE
        }
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let kind = self.kind();
    // Datastore internals stay in the server log.
    let error = match kind {
      ErrorKind::TransientFailure => "service temporarily unavailable".to_owned(),
      ErrorKind::GenerationExhausted => "system busy, try again shortly".to_owned(),
      _ => self.to_string(),
    };
    (status, Json(ErrorBody { error, kind })).into_response()
  }
}
