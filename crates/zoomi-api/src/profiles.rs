//! Handlers for `/profiles` and `/families`.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `POST`  | `/profiles` | Body: [`NewProfile`]; returns 201 + profile |
//! | `GET`   | `/profiles/me` | The caller's profile |
//! | `PATCH` | `/profiles/me` | Body: [`RenameProfileRequest`] |
//! | `POST`  | `/families` | Body: [`NewFamilyRequest`]; returns 201 + [`Onboarded`] |
//! | `GET`   | `/families/me` | The caller's family |

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use zoomi_core::{
  ErrorKind,
  family::{Family, NewProfile, Profile},
  rpc::{NewFamilyRequest, Onboarded, RenameProfileRequest},
  store::FamilyStore,
};

use crate::{caller::Caller, error::ApiError};

/// `POST /profiles`
///
/// Called by the auth provider's sign-up hook with the new user's id.
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewProfile>,
) -> Result<impl IntoResponse, ApiError>
where
  S: FamilyStore,
{
  let profile = store.create_profile(body).await.map_err(ApiError::store)?;
  tracing::info!(profile_id = %profile.id, "profile registered");
  Ok((StatusCode::CREATED, Json(profile)))
}

/// `GET /profiles/me`
pub async fn me<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
) -> Result<Json<Profile>, ApiError>
where
  S: FamilyStore,
{
  store
    .get_profile(caller.0)
    .await
    .map_err(ApiError::store)?
    .map(Json)
    .ok_or_else(|| {
      ApiError::rejected(ErrorKind::NotFound, format!("profile not found: {}", caller.0))
    })
}

/// `PATCH /profiles/me`
pub async fn rename_me<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Json(body): Json<RenameProfileRequest>,
) -> Result<Json<Profile>, ApiError>
where
  S: FamilyStore,
{
  let profile = store
    .rename_profile(caller.0, body.first_name, body.last_name)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(profile))
}

/// `POST /families`
pub async fn create_family<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Json(body): Json<NewFamilyRequest>,
) -> Result<impl IntoResponse, ApiError>
where
  S: FamilyStore,
{
  let (family, profile) = store
    .create_family_for(caller.0, body.name)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(family_id = %family.id, profile_id = %profile.id, "family created");
  Ok((StatusCode::CREATED, Json(Onboarded { family, profile })))
}

/// `GET /families/me`
pub async fn my_family<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
) -> Result<Json<Family>, ApiError>
where
  S: FamilyStore,
{
  let family_id = caller.family(store.as_ref()).await?;
  store
    .get_family(family_id)
    .await
    .map_err(ApiError::store)?
    .map(Json)
    .ok_or_else(|| {
      ApiError::rejected(ErrorKind::NotFound, format!("family not found: {family_id}"))
    })
}
