//! Handlers for `/children` endpoints.
//!
//! Every route acts on the caller's own family. A child of another family
//! answers 403, an unknown child 404.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use uuid::Uuid;
use zoomi_core::{
  child::Child,
  rpc::{NewChildRequest, SubscriptionRequest},
  store::FamilyStore,
};

use crate::{caller::Caller, error::ApiError};

/// `GET /children`, newest first.
pub async fn list<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
) -> Result<Json<Vec<Child>>, ApiError>
where
  S: FamilyStore,
{
  let family_id = caller.family(store.as_ref()).await?;
  let children = store
    .list_children(family_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(children))
}

/// `POST /children`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Json(body): Json<NewChildRequest>,
) -> Result<impl IntoResponse, ApiError>
where
  S: FamilyStore,
{
  let family_id = caller.family(store.as_ref()).await?;
  let child = store
    .create_child(family_id, body.name)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(child_id = %child.id, %family_id, "child created");
  Ok((StatusCode::CREATED, Json(child)))
}

/// `GET /children/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<Child>, ApiError>
where
  S: FamilyStore,
{
  caller.owned_child(store.as_ref(), id).await.map(Json)
}

/// `PUT /children/{id}/subscription`
pub async fn set_subscription<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<SubscriptionRequest>,
) -> Result<Json<Child>, ApiError>
where
  S: FamilyStore,
{
  caller.owned_child(store.as_ref(), id).await?;
  let child = store
    .set_subscription_status(id, body.status)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(child_id = %id, status = child.subscription_status.as_str(), "subscription updated");
  Ok(Json(child))
}

/// `DELETE /children/{id}`
pub async fn delete_one<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: FamilyStore,
{
  caller.owned_child(store.as_ref(), id).await?;
  store.delete_child(id).await.map_err(ApiError::store)?;
  tracing::info!(child_id = %id, "child removed");
  Ok(StatusCode::NO_CONTENT)
}
