//! The `FamilyStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `zoomi-store-sqlite`).
//! Higher layers (`zoomi-api`) depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  ErrorKind,
  child::{Child, SubscriptionStatus},
  family::{Family, NewProfile, Profile},
  linking::LinkingCode,
};

/// A backend error that knows which [`ErrorKind`] it belongs to.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn kind(&self) -> ErrorKind;
}

impl StoreError for crate::Error {
  fn kind(&self) -> ErrorKind { crate::Error::kind(self) }
}

/// Abstraction over the family/children datastore.
///
/// The two linking operations must be atomic at the datastore level: no
/// interleaving of concurrent calls may let one code be consumed twice, and
/// no failed call may leave a partial mutation behind.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait FamilyStore: Send + Sync {
  type Error: StoreError;

  // ── Profiles & families ───────────────────────────────────────────────

  /// Register a parent profile under the auth provider's user id.
  fn create_profile(
    &self,
    input: NewProfile,
  ) -> impl Future<Output = Result<Profile, Self::Error>> + Send + '_;

  fn get_profile(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Profile>, Self::Error>> + Send + '_;

  /// Update the only mutable profile fields.
  fn rename_profile(
    &self,
    id: Uuid,
    first_name: String,
    last_name: String,
  ) -> impl Future<Output = Result<Profile, Self::Error>> + Send + '_;

  /// Complete onboarding: create a family and attach `profile_id` to it in
  /// one step. Fails if the profile already belongs to a family.
  fn create_family_for(
    &self,
    profile_id: Uuid,
    name: Option<String>,
  ) -> impl Future<Output = Result<(Family, Profile), Self::Error>> + Send + '_;

  fn get_family(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Family>, Self::Error>> + Send + '_;

  // ── Children ──────────────────────────────────────────────────────────

  fn create_child(
    &self,
    family_id: Uuid,
    name: String,
  ) -> impl Future<Output = Result<Child, Self::Error>> + Send + '_;

  fn get_child(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Child>, Self::Error>> + Send + '_;

  /// All children of a family, newest first.
  fn list_children(
    &self,
    family_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Child>, Self::Error>> + Send + '_;

  fn set_subscription_status(
    &self,
    child_id: Uuid,
    status: SubscriptionStatus,
  ) -> impl Future<Output = Result<Child, Self::Error>> + Send + '_;

  /// Returns `false` if the child did not exist.
  fn delete_child(
    &self,
    child_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Linking protocol ──────────────────────────────────────────────────

  /// Issue a fresh code for `child_id` on behalf of the parent `caller`,
  /// superseding any outstanding code for that child.
  ///
  /// Fails with `Unauthorized` unless `caller` belongs to the child's family,
  /// `ChildNotFound` if the child does not exist, and `GenerationExhausted`
  /// if no unique code was found within the retry budget. Failures mutate
  /// nothing.
  fn generate_linking_code(
    &self,
    caller: Uuid,
    child_id: Uuid,
  ) -> impl Future<Output = Result<LinkingCode, Self::Error>> + Send + '_;

  /// Consume `code` and bind `device_id` to the child that holds it, as one
  /// indivisible conditional write. A code at or past its expiry, an unknown
  /// code and an already-consumed code all fail with `InvalidOrExpiredCode`.
  fn validate_and_link_child<'a>(
    &'a self,
    code: &'a str,
    device_id: &'a str,
  ) -> impl Future<Output = Result<Child, Self::Error>> + Send + 'a;

  /// Clear the device binding of `child_id`. Parent of the same family only.
  fn unlink_device(
    &self,
    caller: Uuid,
    child_id: Uuid,
  ) -> impl Future<Output = Result<Child, Self::Error>> + Send + '_;

  /// Fetch `child_id` only while `device_id` is the device bound to it.
  fn get_linked_child<'a>(
    &'a self,
    child_id: Uuid,
    device_id: &'a str,
  ) -> impl Future<Output = Result<Option<Child>, Self::Error>> + Send + 'a;
}
