//! Parent authentication collaborator.
//!
//! Sign-in itself happens at the external auth provider. This side only
//! holds the provider-issued token and resolves it to a [`Profile`].

use std::future::Future;

use zoomi_core::{ErrorKind, family::Profile};

use crate::{
  client::ApiClient,
  error::ClientError,
  storage::{LocalStore, PARENT_TOKEN_KEY},
};

/// The parent side of "who is using this device".
pub trait ParentAuth: Send + Sync {
  /// The signed-in parent, or `None` when there is no usable parent session.
  fn current_profile(
    &self,
  ) -> impl Future<Output = Result<Option<Profile>, ClientError>> + Send + '_;

  /// Credential for parent-only API calls.
  fn access_token(&self) -> Result<Option<String>, ClientError>;

  fn sign_out(&self) -> Result<(), ClientError>;
}

/// [`ParentAuth`] backed by a token kept in local storage and checked
/// against `GET /profiles/me`.
#[derive(Debug, Clone)]
pub struct TokenAuth<L> {
  client: ApiClient,
  store:  L,
}

impl<L: LocalStore> TokenAuth<L> {
  pub fn new(client: ApiClient, store: L) -> Self { Self { client, store } }

  /// Accept a provider token, keeping it only if the server knows the
  /// profile behind it.
  pub async fn sign_in(&self, token: &str) -> Result<Profile, ClientError> {
    let token = token.trim();
    let profile = self.client.me(token).await?;
    self.store.set(PARENT_TOKEN_KEY, token)?;
    tracing::info!(profile_id = %profile.id, "parent signed in");
    Ok(profile)
  }
}

impl<L: LocalStore> ParentAuth for TokenAuth<L> {
  async fn current_profile(&self) -> Result<Option<Profile>, ClientError> {
    let Some(token) = self.store.get(PARENT_TOKEN_KEY)? else {
      return Ok(None);
    };
    match self.client.me(&token).await {
      Ok(profile) => Ok(Some(profile)),
      Err(e) if matches!(e.kind(), ErrorKind::Unauthorized | ErrorKind::NotFound) => {
        tracing::warn!("stored parent token was rejected");
        Ok(None)
      }
      Err(e) => Err(e),
    }
  }

  fn access_token(&self) -> Result<Option<String>, ClientError> {
    self.store.get(PARENT_TOKEN_KEY)
  }

  fn sign_out(&self) -> Result<(), ClientError> { self.store.remove(PARENT_TOKEN_KEY) }
}
