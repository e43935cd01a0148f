//! Child records.
//!
//! A child carries the linking state: an outstanding code with its expiry,
//! and the identifier of the device currently bound to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Subscription flag toggled from the parent's settings.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
  #[default]
  Inactive,
  Active,
}

impl SubscriptionStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Inactive => "inactive",
      Self::Active => "active",
    }
  }
}

impl std::str::FromStr for SubscriptionStatus {
  type Err = crate::Error;

  fn from_str(s: &str) -> crate::Result<Self> {
    match s {
      "inactive" => Ok(Self::Inactive),
      "active" => Ok(Self::Active),
      other => Err(crate::Error::InvalidInput(format!(
        "unknown subscription status: {other:?}"
      ))),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Child {
  pub id:                      Uuid,
  pub family_id:               Uuid,
  pub name:                    String,
  /// Present only while a link request is outstanding.
  pub linking_code:            Option<String>,
  /// The code is valid iff `now < linking_code_expires_at`.
  pub linking_code_expires_at: Option<DateTime<Utc>>,
  /// The device currently bound to this child; presence means "linked".
  pub device_id:               Option<String>,
  pub subscription_status:     SubscriptionStatus,
  pub created_at:              DateTime<Utc>,
}

impl Child {
  pub fn is_linked(&self) -> bool { self.device_id.is_some() }

  /// True iff a code is present and has not reached its expiry at `now`.
  pub fn has_outstanding_code(&self, now: DateTime<Utc>) -> bool {
    match (&self.linking_code, self.linking_code_expires_at) {
      (Some(_), Some(expires_at)) => now < expires_at,
      _ => false,
    }
  }
}
