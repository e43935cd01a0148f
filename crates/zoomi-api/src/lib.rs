//! JSON API for Zoomi.
//!
//! Exposes an axum [`Router`] backed by any [`zoomi_core::store::FamilyStore`].
//! TLS and transport concerns are the caller's responsibility; parent
//! identity arrives as a bearer profile id (see [`caller`]).
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", zoomi_api::api_router(store.clone()))
//! ```

pub mod caller;
pub mod children;
pub mod error;
pub mod linking;
pub mod profiles;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use zoomi_core::store::FamilyStore;

pub use caller::Caller;
pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: FamilyStore + 'static,
{
  Router::new()
    // Profiles & onboarding
    .route("/profiles", post(profiles::create::<S>))
    .route(
      "/profiles/me",
      get(profiles::me::<S>).patch(profiles::rename_me::<S>),
    )
    .route("/families", post(profiles::create_family::<S>))
    .route("/families/me", get(profiles::my_family::<S>))
    // Children
    .route(
      "/children",
      get(children::list::<S>).post(children::create::<S>),
    )
    .route(
      "/children/{id}",
      get(children::get_one::<S>).delete(children::delete_one::<S>),
    )
    .route(
      "/children/{id}/subscription",
      put(children::set_subscription::<S>),
    )
    // Linking RPC
    .route("/rpc/generate_linking_code", post(linking::generate::<S>))
    .route("/rpc/validate_and_link_child", post(linking::validate::<S>))
    .route("/rpc/get_linked_child", post(linking::linked_child::<S>))
    .route("/rpc/unlink_child", post(linking::unlink::<S>))
    .with_state(store)
}
