//! Core types and trait definitions for Zoomi family accounts and the
//! child-device linking protocol.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod child;
pub mod clock;
pub mod error;
pub mod family;
pub mod linking;
pub mod rpc;
pub mod store;

pub use error::{Error, ErrorKind, Result};
