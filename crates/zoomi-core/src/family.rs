//! Families and parent profiles.
//!
//! A family is the tenant boundary: every child and every parent profile
//! belongs to exactly one. A profile's family is absent until onboarding
//! completes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tenant grouping parent profiles and child records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Family {
  pub id:         Uuid,
  pub name:       Option<String>,
  pub created_at: DateTime<Utc>,
}

/// A parent identity, keyed by the external auth provider's user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
  pub id:         Uuid,
  pub family_id:  Option<Uuid>,
  pub first_name: String,
  pub last_name:  String,
  pub email:      Option<String>,
  pub created_at: DateTime<Utc>,
}

impl Profile {
  pub fn full_name(&self) -> String {
    match (self.first_name.is_empty(), self.last_name.is_empty()) {
      (false, false) => format!("{} {}", self.first_name, self.last_name),
      (false, true) => self.first_name.clone(),
      (true, _) => self.last_name.clone(),
    }
  }

  /// Whether this profile may act on records owned by `family_id`.
  pub fn belongs_to(&self, family_id: Uuid) -> bool {
    self.family_id == Some(family_id)
  }
}

/// Input to [`crate::store::FamilyStore::create_profile`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProfile {
  /// The user id assigned by the external auth provider.
  pub id:         Uuid,
  pub first_name: String,
  pub last_name:  String,
  pub email:      Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn profile(first: &str, last: &str) -> Profile {
    Profile {
      id:         Uuid::new_v4(),
      family_id:  None,
      first_name: first.into(),
      last_name:  last.into(),
      email:      None,
      created_at: Utc::now(),
    }
  }

  #[test]
  fn full_name_joins_present_parts() {
    assert_eq!(profile("Dana", "Levi").full_name(), "Dana Levi");
    assert_eq!(profile("Dana", "").full_name(), "Dana");
    assert_eq!(profile("", "Levi").full_name(), "Levi");
  }

  #[test]
  fn profile_without_family_belongs_nowhere() {
    let p = profile("Dana", "Levi");
    assert!(!p.belongs_to(Uuid::new_v4()));
  }
}
