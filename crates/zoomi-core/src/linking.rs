//! Linking codes: the short-lived, human-typed credential that binds a
//! child-facing device to a child record.
//!
//! Codes are fixed-width numeric strings. The width balances typability on a
//! child's device against guess resistance inside the expiry window.

use std::{
  collections::VecDeque,
  sync::{Arc, Mutex},
};

use chrono::{DateTime, Duration, Utc};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};

/// Number of decimal digits in a linking code.
pub const CODE_LENGTH: usize = 6;

/// How long an issued code stays valid.
pub const CODE_TTL_SECS: i64 = 10 * 60;

/// Candidates tried before generation gives up with
/// [`crate::Error::GenerationExhausted`].
pub const MAX_GENERATION_ATTEMPTS: u32 = 10;

const CODE_SPACE: u32 = 10u32.pow(CODE_LENGTH as u32);

pub fn code_ttl() -> Duration { Duration::seconds(CODE_TTL_SECS) }

/// Whether `code` has the shape of an issued code. Advisory only: the server
/// matches presented codes byte-for-byte and never normalises them.
pub fn is_well_formed(code: &str) -> bool {
  code.len() == CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}

// ─── Issued code ─────────────────────────────────────────────────────────────

/// A code handed to the parent for display, with its absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkingCode {
  pub code:       String,
  pub expires_at: DateTime<Utc>,
}

impl LinkingCode {
  /// Time left before expiry, clamped at zero.
  pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
    (self.expires_at - now).max(Duration::zero())
  }
}

// ─── Generation ──────────────────────────────────────────────────────────────

/// Source of candidate codes. The store calls this once per attempt and
/// handles collisions itself.
pub trait CodeGenerator: Send + Sync {
  fn generate(&self) -> String;
}

/// Uniform codes from the operating system's CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
  fn generate(&self) -> String {
    // Rejection sampling: values at or above `zone` would skew the low codes.
    let zone = u32::MAX - (u32::MAX % CODE_SPACE);
    loop {
      let v = OsRng.next_u32();
      if v < zone {
        return format!("{:0width$}", v % CODE_SPACE, width = CODE_LENGTH);
      }
    }
  }
}

/// Replays a fixed list of codes, repeating the last one once exhausted.
/// Lets tests force collisions deterministically.
#[derive(Debug, Clone)]
pub struct ScriptedCodeGenerator {
  codes: Arc<Mutex<VecDeque<String>>>,
}

impl ScriptedCodeGenerator {
  pub fn new<I, S>(codes: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let codes = codes.into_iter().map(Into::into).collect();
    Self { codes: Arc::new(Mutex::new(codes)) }
  }
}

impl CodeGenerator for ScriptedCodeGenerator {
  fn generate(&self) -> String {
    let mut codes = self.codes.lock().unwrap_or_else(|p| p.into_inner());
    if codes.len() > 1 {
      codes.pop_front().unwrap_or_default()
    } else {
      codes.front().cloned().unwrap_or_else(|| "0".repeat(CODE_LENGTH))
    }
  }
}
