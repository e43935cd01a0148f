//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings with microsecond
//! precision (`2025-01-01T12:00:00.000000Z`). Fixed width makes string order
//! equal time order, which the expiry comparisons in SQL rely on. UUIDs are
//! stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use zoomi_core::{
  child::{Child, SubscriptionStatus},
  family::{Family, Profile},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// Drop precision the column cannot hold, so values handed back to callers
/// equal what a later read returns.
pub fn storable(dt: DateTime<Utc>) -> DateTime<Utc> { dt.trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

// ─── SubscriptionStatus ──────────────────────────────────────────────────────

pub fn encode_status(s: SubscriptionStatus) -> &'static str { s.as_str() }

pub fn decode_status(s: &str) -> Result<SubscriptionStatus> {
  s.parse().map_err(|_| Error::Decode(format!("unknown subscription status: {s:?}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawChild::from_row`].
pub const CHILD_COLUMNS: &str = "child_id, family_id, name, linking_code, \
  linking_code_expires_at, device_id, subscription_status, created_at";

/// Raw strings read directly from a `children` row.
pub struct RawChild {
  pub child_id:                String,
  pub family_id:               String,
  pub name:                    String,
  pub linking_code:            Option<String>,
  pub linking_code_expires_at: Option<String>,
  pub device_id:               Option<String>,
  pub subscription_status:     String,
  pub created_at:              String,
}

impl RawChild {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      child_id:                row.get(0)?,
      family_id:               row.get(1)?,
      name:                    row.get(2)?,
      linking_code:            row.get(3)?,
      linking_code_expires_at: row.get(4)?,
      device_id:               row.get(5)?,
      subscription_status:     row.get(6)?,
      created_at:              row.get(7)?,
    })
  }

  pub fn into_child(self) -> Result<Child> {
    Ok(Child {
      id:                      decode_uuid(&self.child_id)?,
      family_id:               decode_uuid(&self.family_id)?,
      name:                    self.name,
      linking_code:            self.linking_code,
      linking_code_expires_at: self
        .linking_code_expires_at
        .as_deref()
        .map(decode_dt)
        .transpose()?,
      device_id:               self.device_id,
      subscription_status:     decode_status(&self.subscription_status)?,
      created_at:              decode_dt(&self.created_at)?,
    })
  }
}

/// Column list matching [`RawProfile::from_row`].
pub const PROFILE_COLUMNS: &str =
  "profile_id, family_id, first_name, last_name, email, created_at";

/// Raw strings read directly from a `profiles` row.
pub struct RawProfile {
  pub profile_id: String,
  pub family_id:  Option<String>,
  pub first_name: String,
  pub last_name:  String,
  pub email:      Option<String>,
  pub created_at: String,
}

impl RawProfile {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      profile_id: row.get(0)?,
      family_id:  row.get(1)?,
      first_name: row.get(2)?,
      last_name:  row.get(3)?,
      email:      row.get(4)?,
      created_at: row.get(5)?,
    })
  }

  pub fn into_profile(self) -> Result<Profile> {
    Ok(Profile {
      id:         decode_uuid(&self.profile_id)?,
      family_id:  self.family_id.as_deref().map(decode_uuid).transpose()?,
      first_name: self.first_name,
      last_name:  self.last_name,
      email:      self.email,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `families` row.
pub struct RawFamily {
  pub family_id:  String,
  pub name:       Option<String>,
  pub created_at: String,
}

impl RawFamily {
  pub fn into_family(self) -> Result<Family> {
    Ok(Family {
      id:         decode_uuid(&self.family_id)?,
      name:       self.name,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;

  #[test]
  fn encoded_timestamps_sort_chronologically() {
    let base = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
    let later = base + Duration::microseconds(1);
    let much_later = base + Duration::minutes(10);

    assert_eq!(encode_dt(base), "2025-01-01T12:00:00.000000Z");
    assert!(encode_dt(base) < encode_dt(later));
    assert!(encode_dt(later) < encode_dt(much_later));
  }

  #[test]
  fn storable_timestamps_roundtrip_exactly() {
    let now = storable(Utc::now());
    assert_eq!(decode_dt(&encode_dt(now)).unwrap(), now);
  }
}
