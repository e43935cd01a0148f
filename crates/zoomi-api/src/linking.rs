//! RPC endpoints of the device-linking protocol.
//!
//! | Method | Path | Caller |
//! |--------|------|--------|
//! | `POST` | `/rpc/generate_linking_code` | parent |
//! | `POST` | `/rpc/validate_and_link_child` | device |
//! | `POST` | `/rpc/get_linked_child` | device |
//! | `POST` | `/rpc/unlink_child` | parent |

use std::sync::Arc;

use axum::{Json, extract::State};
use zoomi_core::{
  ErrorKind,
  child::Child,
  linking::LinkingCode,
  rpc::{
    GenerateLinkingCodeRequest, LinkResponse, LinkedChildRequest, UnlinkRequest,
    ValidateAndLinkRequest,
  },
  store::{FamilyStore, StoreError},
};

use crate::{caller::Caller, error::ApiError};

/// `POST /rpc/generate_linking_code`
pub async fn generate<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Json(body): Json<GenerateLinkingCodeRequest>,
) -> Result<Json<LinkingCode>, ApiError>
where
  S: FamilyStore,
{
  let code = store
    .generate_linking_code(caller.0, body.child_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(code))
}

/// `POST /rpc/validate_and_link_child`
///
/// Unauthenticated: possession of a live code is the credential. A rejected
/// code is answered in-band; only backend failures become error statuses.
pub async fn validate<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<ValidateAndLinkRequest>,
) -> Result<Json<LinkResponse>, ApiError>
where
  S: FamilyStore,
{
  match store
    .validate_and_link_child(&body.linking_code, &body.device_id)
    .await
  {
    Ok(child) => Ok(Json(LinkResponse::linked(child))),
    Err(e) => match e.kind() {
      kind @ (ErrorKind::InvalidOrExpiredCode | ErrorKind::InvalidInput) => {
        tracing::warn!(kind = ?kind, "link attempt rejected");
        Ok(Json(LinkResponse::rejected(kind, e.to_string())))
      }
      _ => Err(ApiError::store(e)),
    },
  }
}

/// `POST /rpc/get_linked_child`
pub async fn linked_child<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<LinkedChildRequest>,
) -> Result<Json<Child>, ApiError>
where
  S: FamilyStore,
{
  store
    .get_linked_child(body.child_id, &body.device_id)
    .await
    .map_err(ApiError::store)?
    .map(Json)
    .ok_or_else(|| {
      ApiError::rejected(ErrorKind::NotFound, "no child linked to this device")
    })
}

/// `POST /rpc/unlink_child`
pub async fn unlink<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Json(body): Json<UnlinkRequest>,
) -> Result<Json<Child>, ApiError>
where
  S: FamilyStore,
{
  let child = store
    .unlink_device(caller.0, body.child_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(child))
}
