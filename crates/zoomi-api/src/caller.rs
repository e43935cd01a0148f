//! Caller identity extractor.
//!
//! Parent sign-in is handled by the external auth provider; by the time a
//! request reaches this API the provider's user id travels as
//! `Authorization: Bearer <uuid>`. That id is the parent's profile id.

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use uuid::Uuid;
use zoomi_core::{ErrorKind, child::Child, family::Profile, store::FamilyStore};

use crate::error::ApiError;

/// The authenticated parent making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub Uuid);

/// Parse the caller id from request headers.
pub fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, ApiError> {
  let value = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthenticated)?;

  let token = value
    .strip_prefix("Bearer ")
    .ok_or(ApiError::Unauthenticated)?;

  Uuid::parse_str(token.trim())
    .map(Caller)
    .map_err(|_| ApiError::Unauthenticated)
}

impl<St> FromRequestParts<St> for Caller
where
  St: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &St,
  ) -> Result<Self, Self::Rejection> {
    caller_from_headers(&parts.headers)
  }
}

fn unauthorized() -> ApiError { ApiError::rejected(ErrorKind::Unauthorized, "unauthorized") }

impl Caller {
  /// The caller's profile. Callers without a profile, or who have not
  /// finished onboarding, are unauthorized.
  pub async fn parent<S: FamilyStore>(&self, store: &S) -> Result<Profile, ApiError> {
    store
      .get_profile(self.0)
      .await
      .map_err(ApiError::store)?
      .filter(|p| p.family_id.is_some())
      .ok_or_else(unauthorized)
  }

  /// The family this caller may act on.
  pub async fn family<S: FamilyStore>(&self, store: &S) -> Result<Uuid, ApiError> {
    self.parent(store).await?.family_id.ok_or_else(unauthorized)
  }

  /// Load `child_id` and check it belongs to the caller's family.
  pub async fn owned_child<S: FamilyStore>(
    &self,
    store: &S,
    child_id: Uuid,
  ) -> Result<Child, ApiError> {
    let parent = self.parent(store).await?;
    let child = store
      .get_child(child_id)
      .await
      .map_err(ApiError::store)?
      .ok_or_else(|| {
        ApiError::rejected(ErrorKind::NotFound, format!("child not found: {child_id}"))
      })?;
    if !parent.belongs_to(child.family_id) {
      return Err(unauthorized());
    }
    Ok(child)
  }
}
