//! Client side of Zoomi: HTTP API client, durable per-device storage,
//! parent auth and the session manager that decides who is using a device.

pub mod auth;
pub mod client;
pub mod error;
pub mod session;
pub mod storage;

pub use client::{ApiClient, ApiConfig};
pub use error::ClientError;
pub use session::{LinkingBackend, SessionManager, SessionState};
