//! Client session manager: "who is using this device" across restarts.
//!
//! States move `Unresolved → ResolvingParent | ResolvingChild →
//! ParentActive | ChildActive | Unauthenticated`. The manager is an owned
//! value handed through the application's composition root; there is no
//! process-wide session.
//!
//! Every operation either completes or leaves both the in-memory state and
//! durable storage as they were.

use std::future::Future;

use uuid::Uuid;
use zoomi_core::{child::Child, family::Profile, linking::LinkingCode};

use crate::{
  auth::ParentAuth,
  error::ClientError,
  storage::{CHILD_ID_KEY, DEVICE_ID_KEY, LocalStore, ensure_device_id},
};

/// Remote half of the linking protocol as seen from a device.
pub trait LinkingBackend: Send + Sync {
  /// Consume `code` and bind `device_id` to the child holding it.
  fn validate_and_link<'a>(
    &'a self,
    code: &'a str,
    device_id: &'a str,
  ) -> impl Future<Output = Result<Child, ClientError>> + Send + 'a;

  /// Current record of `child_id`, or `None` once `device_id` is no longer
  /// the device bound to it.
  fn linked_child<'a>(
    &'a self,
    child_id: Uuid,
    device_id: &'a str,
  ) -> impl Future<Output = Result<Option<Child>, ClientError>> + Send + 'a;

  fn generate_linking_code<'a>(
    &'a self,
    token: &'a str,
    child_id: Uuid,
  ) -> impl Future<Output = Result<LinkingCode, ClientError>> + Send + 'a;

  fn unlink_child<'a>(
    &'a self,
    token: &'a str,
    child_id: Uuid,
  ) -> impl Future<Output = Result<Child, ClientError>> + Send + 'a;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
  #[default]
  Unresolved,
  ResolvingParent,
  ResolvingChild,
  ParentActive(Profile),
  ChildActive(Child),
  Unauthenticated,
}

impl SessionState {
  fn name(&self) -> &'static str {
    match self {
      Self::Unresolved => "unresolved",
      Self::ResolvingParent => "resolving_parent",
      Self::ResolvingChild => "resolving_child",
      Self::ParentActive(_) => "parent_active",
      Self::ChildActive(_) => "child_active",
      Self::Unauthenticated => "unauthenticated",
    }
  }
}

pub struct SessionManager<B, A, L> {
  backend: B,
  auth:    A,
  store:   L,
  state:   SessionState,
}

impl<B, A, L> SessionManager<B, A, L>
where
  B: LinkingBackend,
  A: ParentAuth,
  L: LocalStore,
{
  pub fn new(backend: B, auth: A, store: L) -> Self {
    Self { backend, auth, store, state: SessionState::Unresolved }
  }

  pub fn state(&self) -> &SessionState { &self.state }

  pub fn parent(&self) -> Option<&Profile> {
    match &self.state {
      SessionState::ParentActive(p) => Some(p),
      _ => None,
    }
  }

  pub fn child(&self) -> Option<&Child> {
    match &self.state {
      SessionState::ChildActive(c) => Some(c),
      _ => None,
    }
  }

  pub fn backend(&self) -> &B { &self.backend }

  pub fn auth(&self) -> &A { &self.auth }

  /// This install's stable device identifier.
  pub fn device_id(&self) -> Result<String, ClientError> { ensure_device_id(&self.store) }

  /// Token for parent-only calls; requires an active parent session.
  pub fn parent_token(&self) -> Result<String, ClientError> {
    if self.parent().is_none() {
      return Err(ClientError::NotSignedIn);
    }
    self.auth.access_token()?.ok_or(ClientError::NotSignedIn)
  }

  fn transition(&mut self, next: SessionState) {
    tracing::debug!(from = self.state.name(), to = next.name(), "session transition");
    self.state = next;
  }

  /// Cold-start resolution: a parent session first, then a stored child
  /// link re-fetched from the server.
  ///
  /// A definite miss on the child (unlinked, re-bound elsewhere, deleted)
  /// clears the stored id. Any failure restores the state held before the
  /// call (`Unresolved` on a cold start) with storage untouched, so a flaky
  /// network never signs anyone out.
  pub async fn resolve(&mut self) -> Result<&SessionState, ClientError> {
    let prior = self.state.clone();
    match self.resolve_once().await {
      Ok(next) => {
        self.transition(next);
        Ok(&self.state)
      }
      Err(e) => {
        tracing::warn!(error = %e, "session resolution failed");
        self.transition(prior);
        Err(e)
      }
    }
  }

  async fn resolve_once(&mut self) -> Result<SessionState, ClientError> {
    self.transition(SessionState::ResolvingParent);
    if let Some(profile) = self.auth.current_profile().await? {
      return Ok(SessionState::ParentActive(profile));
    }

    self.transition(SessionState::ResolvingChild);
    let Some(raw_id) = self.store.get(CHILD_ID_KEY)? else {
      return Ok(SessionState::Unauthenticated);
    };

    let linked = match (Uuid::parse_str(&raw_id), self.store.get(DEVICE_ID_KEY)?) {
      (Ok(child_id), Some(device_id)) => {
        self.backend.linked_child(child_id, &device_id).await?
      }
      _ => None,
    };

    match linked {
      Some(child) => Ok(SessionState::ChildActive(child)),
      None => {
        tracing::info!(child_id = %raw_id, "device is no longer linked; clearing child session");
        self.store.remove(CHILD_ID_KEY)?;
        Ok(SessionState::Unauthenticated)
      }
    }
  }

  /// Redeem a code typed on this device. Surrounding whitespace is ignored;
  /// the code is otherwise sent exactly as entered.
  pub async fn link_child_with_code(&mut self, code: &str) -> Result<Child, ClientError> {
    if self.parent().is_some() {
      return Err(ClientError::ParentSignedIn);
    }
    let device_id = self.device_id()?;
    let child = self.backend.validate_and_link(code.trim(), &device_id).await?;
    self.store.set(CHILD_ID_KEY, &child.id.to_string())?;
    tracing::info!(child_id = %child.id, "device linked");
    self.transition(SessionState::ChildActive(child.clone()));
    Ok(child)
  }

  /// Parent only: issue a code for one of the family's children.
  pub async fn generate_linking_code(
    &self,
    child_id: Uuid,
  ) -> Result<LinkingCode, ClientError> {
    let token = self.parent_token()?;
    self.backend.generate_linking_code(&token, child_id).await
  }

  /// Parent only: release the device bound to `child_id`.
  pub async fn unlink_child(&self, child_id: Uuid) -> Result<Child, ClientError> {
    let token = self.parent_token()?;
    let child = self.backend.unlink_child(&token, child_id).await?;
    tracing::info!(%child_id, "device unlinked");
    Ok(child)
  }

  /// Drop the active role's durable session data and end in
  /// `Unauthenticated`. With no active role, both kinds are cleared.
  pub fn clear_session(&mut self) -> Result<(), ClientError> {
    match &self.state {
      SessionState::ParentActive(_) => self.auth.sign_out()?,
      SessionState::ChildActive(_) => self.store.remove(CHILD_ID_KEY)?,
      _ => {
        self.auth.sign_out()?;
        self.store.remove(CHILD_ID_KEY)?;
      }
    }
    self.transition(SessionState::Unresolved);
    self.transition(SessionState::Unauthenticated);
    Ok(())
  }

  pub fn sign_out(&mut self) -> Result<(), ClientError> { self.clear_session() }
}

#[cfg(test)]
mod tests {
  use std::{
    collections::HashMap,
    sync::{
      Arc, Mutex,
      atomic::{AtomicBool, Ordering},
    },
  };

  use chrono::{Duration, Utc};
  use zoomi_core::{ErrorKind, child::SubscriptionStatus};

  use super::*;
  use crate::storage::MemoryStore;

  const TOKEN: &str = "parent-token";

  /// In-process stand-in for the server side of the protocol.
  #[derive(Clone, Default)]
  struct FakeBackend {
    children: Arc<Mutex<HashMap<Uuid, Child>>>,
    outage:   Arc<AtomicBool>,
  }

  impl FakeBackend {
    fn add_child(&self, name: &str) -> Uuid {
      let child = Child {
        id:                      Uuid::new_v4(),
        family_id:               Uuid::new_v4(),
        name:                    name.into(),
        linking_code:            None,
        linking_code_expires_at: None,
        device_id:               None,
        subscription_status:     SubscriptionStatus::Inactive,
        created_at:              Utc::now(),
      };
      let id = child.id;
      self.children.lock().unwrap().insert(id, child);
      id
    }

    fn issue(&self, child_id: Uuid, code: &str) {
      let mut children = self.children.lock().unwrap();
      let child = children.get_mut(&child_id).unwrap();
      child.linking_code = Some(code.into());
      child.linking_code_expires_at = Some(Utc::now() + Duration::minutes(10));
    }

    fn update(&self, child_id: Uuid, f: impl FnOnce(&mut Child)) {
      f(self.children.lock().unwrap().get_mut(&child_id).unwrap());
    }

    fn check(&self) -> Result<(), ClientError> {
      if self.outage.load(Ordering::SeqCst) {
        return Err(ClientError::rejected(ErrorKind::TransientFailure, "backend unavailable"));
      }
      Ok(())
    }
  }

  impl LinkingBackend for FakeBackend {
    async fn validate_and_link(&self, code: &str, device_id: &str) -> Result<Child, ClientError> {
      self.check()?;
      let mut children = self.children.lock().unwrap();
      let child = children
        .values_mut()
        .find(|c| c.linking_code.as_deref() == Some(code))
        .ok_or_else(|| {
          ClientError::rejected(ErrorKind::InvalidOrExpiredCode, "invalid or expired code")
        })?;
      child.linking_code = None;
      child.linking_code_expires_at = None;
      child.device_id = Some(device_id.into());
      Ok(child.clone())
    }

    async fn linked_child(
      &self,
      child_id: Uuid,
      device_id: &str,
    ) -> Result<Option<Child>, ClientError> {
      self.check()?;
      let children = self.children.lock().unwrap();
      Ok(
        children
          .get(&child_id)
          .filter(|c| c.device_id.as_deref() == Some(device_id))
          .cloned(),
      )
    }

    async fn generate_linking_code(
      &self,
      token: &str,
      child_id: Uuid,
    ) -> Result<LinkingCode, ClientError> {
      self.check()?;
      if token != TOKEN {
        return Err(ClientError::rejected(ErrorKind::Unauthorized, "unauthorized"));
      }
      self.issue(child_id, "123456");
      Ok(LinkingCode {
        code:       "123456".into(),
        expires_at: Utc::now() + Duration::minutes(10),
      })
    }

    async fn unlink_child(&self, token: &str, child_id: Uuid) -> Result<Child, ClientError> {
      self.check()?;
      if token != TOKEN {
        return Err(ClientError::rejected(ErrorKind::Unauthorized, "unauthorized"));
      }
      let mut children = self.children.lock().unwrap();
      let child = children.get_mut(&child_id).unwrap();
      child.device_id = None;
      Ok(child.clone())
    }
  }

  #[derive(Clone, Default)]
  struct FakeAuth {
    profile: Arc<Mutex<Option<Profile>>>,
  }

  impl FakeAuth {
    fn signed_in() -> Self {
      let profile = Profile {
        id:         Uuid::new_v4(),
        family_id:  Some(Uuid::new_v4()),
        first_name: "Ada".into(),
        last_name:  "Okafor".into(),
        email:      None,
        created_at: Utc::now(),
      };
      Self { profile: Arc::new(Mutex::new(Some(profile))) }
    }
  }

  impl ParentAuth for FakeAuth {
    async fn current_profile(&self) -> Result<Option<Profile>, ClientError> {
      Ok(self.profile.lock().unwrap().clone())
    }

    fn access_token(&self) -> Result<Option<String>, ClientError> {
      Ok(self.profile.lock().unwrap().as_ref().map(|_| TOKEN.to_owned()))
    }

    fn sign_out(&self) -> Result<(), ClientError> {
      *self.profile.lock().unwrap() = None;
      Ok(())
    }
  }

  type Manager = SessionManager<FakeBackend, FakeAuth, MemoryStore>;

  fn manager(backend: &FakeBackend, auth: FakeAuth, store: &MemoryStore) -> Manager {
    SessionManager::new(backend.clone(), auth, store.clone())
  }

  /// A device that has linked to a fresh child via code `482917`.
  async fn linked_device(backend: &FakeBackend, store: &MemoryStore) -> (Manager, Uuid) {
    let child_id = backend.add_child("Tomi");
    backend.issue(child_id, "482917");
    let mut session = manager(backend, FakeAuth::default(), store);
    session.resolve().await.unwrap();
    session.link_child_with_code("482917").await.unwrap();
    (session, child_id)
  }

  #[tokio::test]
  async fn cold_start_with_nothing_stored_is_unauthenticated() {
    let backend = FakeBackend::default();
    let store = MemoryStore::new();
    let mut session = manager(&backend, FakeAuth::default(), &store);
    assert_eq!(session.state(), &SessionState::Unresolved);
    assert_eq!(session.resolve().await.unwrap(), &SessionState::Unauthenticated);
  }

  #[tokio::test]
  async fn parent_session_takes_precedence() {
    let backend = FakeBackend::default();
    let store = MemoryStore::new();
    store.set(CHILD_ID_KEY, &Uuid::new_v4().to_string()).unwrap();

    let mut session = manager(&backend, FakeAuth::signed_in(), &store);
    session.resolve().await.unwrap();
    assert!(session.parent().is_some());
    assert!(store.get(CHILD_ID_KEY).unwrap().is_some());
  }

  #[tokio::test]
  async fn link_persists_child_and_trims_input() {
    let backend = FakeBackend::default();
    let store = MemoryStore::new();
    let child_id = backend.add_child("Tomi");
    backend.issue(child_id, "482917");

    let mut session = manager(&backend, FakeAuth::default(), &store);
    session.resolve().await.unwrap();
    let child = session.link_child_with_code("  482917\n").await.unwrap();

    assert_eq!(child.id, child_id);
    assert_eq!(child.device_id, Some(session.device_id().unwrap()));
    assert!(child.linking_code.is_none());
    assert_eq!(store.get(CHILD_ID_KEY).unwrap(), Some(child_id.to_string()));
    assert_eq!(session.child().map(|c| c.id), Some(child_id));
  }

  #[tokio::test]
  async fn restart_refetches_current_child_record() {
    let backend = FakeBackend::default();
    let store = MemoryStore::new();
    let (_, child_id) = linked_device(&backend, &store).await;

    backend.update(child_id, |c| c.subscription_status = SubscriptionStatus::Active);

    let mut restarted = manager(&backend, FakeAuth::default(), &store);
    restarted.resolve().await.unwrap();
    let child = restarted.child().unwrap();
    assert_eq!(child.id, child_id);
    assert_eq!(child.subscription_status, SubscriptionStatus::Active);
  }

  #[tokio::test]
  async fn failed_link_leaves_state_and_storage_untouched() {
    let backend = FakeBackend::default();
    let store = MemoryStore::new();
    let mut session = manager(&backend, FakeAuth::default(), &store);
    session.resolve().await.unwrap();
    session.device_id().unwrap();
    let before = store.snapshot();

    let err = session.link_child_with_code("000000").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOrExpiredCode);
    assert_eq!(session.state(), &SessionState::Unauthenticated);
    assert_eq!(store.snapshot(), before);
  }

  #[tokio::test]
  async fn consumed_code_cannot_link_a_second_device() {
    let backend = FakeBackend::default();
    let (_, _) = linked_device(&backend, &MemoryStore::new()).await;

    let other_store = MemoryStore::new();
    let mut other = manager(&backend, FakeAuth::default(), &other_store);
    other.resolve().await.unwrap();
    let err = other.link_child_with_code("482917").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOrExpiredCode);
    assert!(other_store.get(CHILD_ID_KEY).unwrap().is_none());
  }

  #[tokio::test]
  async fn transient_refresh_failure_keeps_the_link() {
    let backend = FakeBackend::default();
    let store = MemoryStore::new();
    let (_, child_id) = linked_device(&backend, &store).await;

    backend.outage.store(true, Ordering::SeqCst);
    let mut restarted = manager(&backend, FakeAuth::default(), &store);
    let err = restarted.resolve().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransientFailure);
    assert_eq!(restarted.state(), &SessionState::Unresolved);
    assert_eq!(store.get(CHILD_ID_KEY).unwrap(), Some(child_id.to_string()));

    backend.outage.store(false, Ordering::SeqCst);
    restarted.resolve().await.unwrap();
    assert_eq!(restarted.child().map(|c| c.id), Some(child_id));
  }

  #[tokio::test]
  async fn failed_refresh_keeps_an_active_child_session() {
    let backend = FakeBackend::default();
    let store = MemoryStore::new();
    let (mut session, child_id) = linked_device(&backend, &store).await;
    let before = session.state().clone();

    backend.outage.store(true, Ordering::SeqCst);
    let err = session.resolve().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransientFailure);
    assert_eq!(session.state(), &before);
    assert_eq!(session.child().map(|c| c.id), Some(child_id));
    assert_eq!(store.get(CHILD_ID_KEY).unwrap(), Some(child_id.to_string()));
  }

  #[tokio::test]
  async fn unlinked_device_resolves_to_unauthenticated() {
    let backend = FakeBackend::default();
    let store = MemoryStore::new();
    let (_, child_id) = linked_device(&backend, &store).await;

    let mut parent = manager(&backend, FakeAuth::signed_in(), &MemoryStore::new());
    parent.resolve().await.unwrap();
    let child = parent.unlink_child(child_id).await.unwrap();
    assert!(!child.is_linked());

    let mut restarted = manager(&backend, FakeAuth::default(), &store);
    assert_eq!(restarted.resolve().await.unwrap(), &SessionState::Unauthenticated);
    assert!(store.get(CHILD_ID_KEY).unwrap().is_none());
  }

  #[tokio::test]
  async fn rebinding_elsewhere_ends_the_first_devices_session() {
    let backend = FakeBackend::default();
    let first_store = MemoryStore::new();
    let (_, child_id) = linked_device(&backend, &first_store).await;

    backend.issue(child_id, "777001");
    let second_store = MemoryStore::new();
    let mut second = manager(&backend, FakeAuth::default(), &second_store);
    second.resolve().await.unwrap();
    second.link_child_with_code("777001").await.unwrap();

    let mut first = manager(&backend, FakeAuth::default(), &first_store);
    assert_eq!(first.resolve().await.unwrap(), &SessionState::Unauthenticated);
  }

  #[tokio::test]
  async fn clear_child_session_keeps_device_identity() {
    let backend = FakeBackend::default();
    let store = MemoryStore::new();
    let (mut session, _) = linked_device(&backend, &store).await;
    let device_id = session.device_id().unwrap();

    session.clear_session().unwrap();
    assert_eq!(session.state(), &SessionState::Unauthenticated);
    assert!(store.get(CHILD_ID_KEY).unwrap().is_none());
    assert_eq!(store.get(DEVICE_ID_KEY).unwrap(), Some(device_id));
  }

  #[tokio::test]
  async fn parent_sign_out() {
    let backend = FakeBackend::default();
    let auth = FakeAuth::signed_in();
    let mut session = manager(&backend, auth.clone(), &MemoryStore::new());
    session.resolve().await.unwrap();

    session.sign_out().unwrap();
    assert_eq!(session.state(), &SessionState::Unauthenticated);
    assert!(auth.profile.lock().unwrap().is_none());
    assert_eq!(session.resolve().await.unwrap(), &SessionState::Unauthenticated);
  }

  #[tokio::test]
  async fn parent_operations_require_a_parent() {
    let backend = FakeBackend::default();
    let child_id = backend.add_child("Tomi");

    let mut anonymous = manager(&backend, FakeAuth::default(), &MemoryStore::new());
    anonymous.resolve().await.unwrap();
    assert!(matches!(
      anonymous.generate_linking_code(child_id).await,
      Err(ClientError::NotSignedIn)
    ));

    let mut parent = manager(&backend, FakeAuth::signed_in(), &MemoryStore::new());
    parent.resolve().await.unwrap();
    let code = parent.generate_linking_code(child_id).await.unwrap();
    assert_eq!(code.code, "123456");
  }

  #[tokio::test]
  async fn linking_is_refused_while_a_parent_is_signed_in() {
    let backend = FakeBackend::default();
    let child_id = backend.add_child("Tomi");
    backend.issue(child_id, "482917");

    let mut session = manager(&backend, FakeAuth::signed_in(), &MemoryStore::new());
    session.resolve().await.unwrap();
    assert!(matches!(
      session.link_child_with_code("482917").await,
      Err(ClientError::ParentSignedIn)
    ));
  }
}
