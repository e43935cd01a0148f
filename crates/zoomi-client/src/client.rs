//! Async HTTP client wrapping the Zoomi JSON API.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use uuid::Uuid;
use zoomi_core::{
  ErrorKind,
  child::{Child, SubscriptionStatus},
  family::{Family, NewProfile, Profile},
  linking::LinkingCode,
  rpc::{
    ErrorBody, GenerateLinkingCodeRequest, LinkResponse, LinkedChildRequest,
    NewChildRequest, NewFamilyRequest, Onboarded, RenameProfileRequest,
    SubscriptionRequest, UnlinkRequest, ValidateAndLinkRequest,
  },
};

use crate::{error::ClientError, session::LinkingBackend};

/// Connection settings for the Zoomi API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
}

/// Async HTTP client for the Zoomi API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based. Parent
/// operations take the provider token of the signed-in parent.
#[derive(Debug, Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self, ClientError> {
    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn auth(req: RequestBuilder, token: &str) -> RequestBuilder { req.bearer_auth(token) }

  // ── Profiles & onboarding ─────────────────────────────────────────────────

  /// `POST /api/profiles`
  pub async fn register_profile(&self, input: &NewProfile) -> Result<Profile, ClientError> {
    let resp = self.client.post(self.url("/profiles")).json(input).send().await?;
    decode(resp).await
  }

  /// `GET /api/profiles/me`
  pub async fn me(&self, token: &str) -> Result<Profile, ClientError> {
    let resp = Self::auth(self.client.get(self.url("/profiles/me")), token)
      .send()
      .await?;
    decode(resp).await
  }

  /// `PATCH /api/profiles/me`
  pub async fn rename_me(
    &self,
    token: &str,
    first_name: &str,
    last_name: &str,
  ) -> Result<Profile, ClientError> {
    let body = RenameProfileRequest {
      first_name: first_name.to_owned(),
      last_name:  last_name.to_owned(),
    };
    let resp = Self::auth(self.client.patch(self.url("/profiles/me")), token)
      .json(&body)
      .send()
      .await?;
    decode(resp).await
  }

  /// `POST /api/families`
  pub async fn create_family(
    &self,
    token: &str,
    name: Option<String>,
  ) -> Result<Onboarded, ClientError> {
    let resp = Self::auth(self.client.post(self.url("/families")), token)
      .json(&NewFamilyRequest { name })
      .send()
      .await?;
    decode(resp).await
  }

  /// `GET /api/families/me`
  pub async fn my_family(&self, token: &str) -> Result<Family, ClientError> {
    let resp = Self::auth(self.client.get(self.url("/families/me")), token)
      .send()
      .await?;
    decode(resp).await
  }

  // ── Children ──────────────────────────────────────────────────────────────

  /// `GET /api/children`
  pub async fn list_children(&self, token: &str) -> Result<Vec<Child>, ClientError> {
    let resp = Self::auth(self.client.get(self.url("/children")), token)
      .send()
      .await?;
    decode(resp).await
  }

  /// `POST /api/children`
  pub async fn create_child(&self, token: &str, name: &str) -> Result<Child, ClientError> {
    let resp = Self::auth(self.client.post(self.url("/children")), token)
      .json(&NewChildRequest { name: name.to_owned() })
      .send()
      .await?;
    decode(resp).await
  }

  /// `GET /api/children/{id}`
  pub async fn get_child(&self, token: &str, id: Uuid) -> Result<Child, ClientError> {
    let resp = Self::auth(self.client.get(self.url(&format!("/children/{id}"))), token)
      .send()
      .await?;
    decode(resp).await
  }

  /// `PUT /api/children/{id}/subscription`
  pub async fn set_subscription(
    &self,
    token: &str,
    id: Uuid,
    status: SubscriptionStatus,
  ) -> Result<Child, ClientError> {
    let resp = Self::auth(
      self.client.put(self.url(&format!("/children/{id}/subscription"))),
      token,
    )
    .json(&SubscriptionRequest { status })
    .send()
    .await?;
    decode(resp).await
  }

  /// `DELETE /api/children/{id}`
  pub async fn delete_child(&self, token: &str, id: Uuid) -> Result<(), ClientError> {
    let resp =
      Self::auth(self.client.delete(self.url(&format!("/children/{id}"))), token)
        .send()
        .await?;
    if resp.status().is_success() {
      return Ok(());
    }
    Err(rejection(resp).await)
  }
}

// ── Linking RPC ───────────────────────────────────────────────────────────────

impl LinkingBackend for ApiClient {
  /// `POST /api/rpc/validate_and_link_child`
  async fn validate_and_link(
    &self,
    code: &str,
    device_id: &str,
  ) -> Result<Child, ClientError> {
    let body = ValidateAndLinkRequest {
      linking_code: code.to_owned(),
      device_id:    device_id.to_owned(),
    };
    let resp = self
      .client
      .post(self.url("/rpc/validate_and_link_child"))
      .json(&body)
      .send()
      .await?;
    let link: LinkResponse = decode(resp).await?;
    match (link.success, link.child) {
      (true, Some(child)) => Ok(child),
      (_, _) => Err(ClientError::rejected(
        link.kind.unwrap_or(ErrorKind::InvalidOrExpiredCode),
        link.error.unwrap_or_else(|| "invalid or expired code".to_owned()),
      )),
    }
  }

  /// `POST /api/rpc/get_linked_child`. Only an API `not_found` answer means
  /// this device is no longer bound; a bare 404 from something else in the
  /// path (wrong base URL, proxy) is an error.
  async fn linked_child(
    &self,
    child_id: Uuid,
    device_id: &str,
  ) -> Result<Option<Child>, ClientError> {
    let body = LinkedChildRequest { child_id, device_id: device_id.to_owned() };
    let resp = self
      .client
      .post(self.url("/rpc/get_linked_child"))
      .json(&body)
      .send()
      .await?;
    if resp.status() != StatusCode::NOT_FOUND {
      return decode(resp).await.map(Some);
    }
    match resp.json::<ErrorBody>().await {
      Ok(body) if body.kind == ErrorKind::NotFound => Ok(None),
      Ok(body) => Err(ClientError::rejected(body.kind, body.error)),
      Err(_) => Err(ClientError::rejected(
        ErrorKind::TransientFailure,
        format!("unexpected 404 from {}", self.config.base_url),
      )),
    }
  }

  /// `POST /api/rpc/generate_linking_code`
  async fn generate_linking_code(
    &self,
    token: &str,
    child_id: Uuid,
  ) -> Result<LinkingCode, ClientError> {
    let resp = Self::auth(self.client.post(self.url("/rpc/generate_linking_code")), token)
      .json(&GenerateLinkingCodeRequest { child_id })
      .send()
      .await?;
    decode(resp).await
  }

  /// `POST /api/rpc/unlink_child`
  async fn unlink_child(&self, token: &str, child_id: Uuid) -> Result<Child, ClientError> {
    let resp = Self::auth(self.client.post(self.url("/rpc/unlink_child")), token)
      .json(&UnlinkRequest { child_id })
      .send()
      .await?;
    decode(resp).await
  }
}

// ── Response handling ─────────────────────────────────────────────────────────

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
  if resp.status().is_success() {
    return Ok(resp.json().await?);
  }
  Err(rejection(resp).await)
}

/// Turn a non-success response into a structured error, falling back to the
/// status code when the body is not an [`ErrorBody`].
async fn rejection(resp: Response) -> ClientError {
  let status = resp.status();
  match resp.json::<ErrorBody>().await {
    Ok(body) => ClientError::rejected(body.kind, body.error),
    Err(_) => ClientError::rejected(kind_for_status(status), format!("HTTP {status}")),
  }
}

fn kind_for_status(status: StatusCode) -> ErrorKind {
  match status {
    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorKind::Unauthorized,
    StatusCode::NOT_FOUND => ErrorKind::NotFound,
    StatusCode::CONFLICT => ErrorKind::Conflict,
    StatusCode::BAD_REQUEST => ErrorKind::InvalidInput,
    StatusCode::UNPROCESSABLE_ENTITY => ErrorKind::InvalidOrExpiredCode,
    _ => ErrorKind::TransientFailure,
  }
}
