//! Request and response bodies shared by the HTTP API and its clients.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  ErrorKind,
  child::{Child, SubscriptionStatus},
  family::{Family, Profile},
};

/// Body of `POST /rpc/generate_linking_code`. The response is a
/// [`LinkingCode`](crate::linking::LinkingCode).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateLinkingCodeRequest {
  pub child_id: Uuid,
}

/// Body of `POST /rpc/validate_and_link_child`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateAndLinkRequest {
  pub linking_code: String,
  pub device_id:    String,
}

/// Response of `POST /rpc/validate_and_link_child`.
///
/// A rejected code is an expected outcome, not a transport failure, so it is
/// reported in-band with `success: false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkResponse {
  pub success: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub child:   Option<Child>,
  /// Human-readable reason, for display only.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error:   Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub kind:    Option<ErrorKind>,
}

impl LinkResponse {
  pub fn linked(child: Child) -> Self {
    Self { success: true, child: Some(child), error: None, kind: None }
  }

  pub fn rejected(kind: ErrorKind, error: impl Into<String>) -> Self {
    Self {
      success: false,
      child:   None,
      error:   Some(error.into()),
      kind:    Some(kind),
    }
  }
}

/// Body of `POST /rpc/get_linked_child`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedChildRequest {
  pub child_id:  Uuid,
  pub device_id: String,
}

/// Body of `POST /rpc/unlink_child`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnlinkRequest {
  pub child_id: Uuid,
}

/// Body of `PATCH /profiles/me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameProfileRequest {
  pub first_name: String,
  pub last_name:  String,
}

/// Body of `POST /families`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewFamilyRequest {
  #[serde(default)]
  pub name: Option<String>,
}

/// Response of `POST /families`: the new family and the caller's profile,
/// now attached to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Onboarded {
  pub family:  Family,
  pub profile: Profile,
}

/// Body of `POST /children`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChildRequest {
  pub name: String,
}

/// Body of `PUT /children/{id}/subscription`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SubscriptionRequest {
  pub status: SubscriptionStatus,
}

/// JSON body of every non-2xx API response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
  pub error: String,
  pub kind:  ErrorKind,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejected_link_response_omits_child() {
    let body = LinkResponse::rejected(
      ErrorKind::InvalidOrExpiredCode,
      "invalid or expired code",
    );
    let json = serde_json::to_value(&body).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["kind"], "invalid_or_expired_code");
    assert!(json.get("child").is_none());
  }

  #[test]
  fn link_response_tolerates_missing_optionals() {
    let body: LinkResponse =
      serde_json::from_str(r#"{"success":false,"error":"nope"}"#).unwrap();
    assert!(!body.success);
    assert!(body.kind.is_none());
  }
}
