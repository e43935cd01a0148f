//! SQLite backend for the Zoomi family store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. The linking protocol's atomicity rests
//! on SQLite itself: validation is a single conditional `UPDATE … RETURNING`,
//! and generation runs inside one `BEGIN IMMEDIATE` transaction.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
