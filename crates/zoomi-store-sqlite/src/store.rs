//! [`SqliteStore`], the SQLite implementation of [`FamilyStore`].

use std::{path::Path, sync::Arc};

use rusqlite::{OptionalExtension as _, TransactionBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use zoomi_core::{
  child::{Child, SubscriptionStatus},
  clock::{Clock, SystemClock},
  family::{Family, NewProfile, Profile},
  linking::{
    CodeGenerator, LinkingCode, MAX_GENERATION_ATTEMPTS, RandomCodeGenerator,
    code_ttl,
  },
  store::FamilyStore,
};

use crate::{
  Result,
  encode::{
    CHILD_COLUMNS, PROFILE_COLUMNS, RawChild, RawFamily, RawProfile,
    encode_dt, encode_status, encode_uuid, storable,
  },
  schema::SCHEMA,
};

/// Result of a closure run on the database thread: the outer layer carries
/// SQLite failures, the inner one protocol rejections.
type Outcome<T> = std::result::Result<T, zoomi_core::Error>;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Zoomi family store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:  tokio_rusqlite::Connection,
  clock: Arc<dyn Clock>,
  codes: Arc<dyn CodeGenerator>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store, mainly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(Self {
      conn,
      clock: Arc::new(SystemClock),
      codes: Arc::new(RandomCodeGenerator),
    })
  }

  /// Replace the clock used for expiry decisions.
  pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
    self.clock = Arc::new(clock);
    self
  }

  /// Replace the source of candidate linking codes.
  pub fn with_code_generator(
    mut self,
    codes: impl CodeGenerator + 'static,
  ) -> Self {
    self.codes = Arc::new(codes);
    self
  }

  fn now(&self) -> chrono::DateTime<chrono::Utc> { storable(self.clock.now()) }
}

/// Check that `caller` is a parent in the family owning `child_id`.
///
/// A caller without a profile or without a family is unauthorized before the
/// child is even looked up.
fn authorize_parent(
  conn: &rusqlite::Connection,
  caller: Uuid,
  child_id: Uuid,
) -> rusqlite::Result<Outcome<()>> {
  let caller_family: Option<Option<String>> = conn
    .query_row(
      "SELECT family_id FROM profiles WHERE profile_id = ?1",
      rusqlite::params![encode_uuid(caller)],
      |r| r.get(0),
    )
    .optional()?;
  let Some(Some(caller_family)) = caller_family else {
    return Ok(Err(zoomi_core::Error::Unauthorized));
  };

  let child_family: Option<String> = conn
    .query_row(
      "SELECT family_id FROM children WHERE child_id = ?1",
      rusqlite::params![encode_uuid(child_id)],
      |r| r.get(0),
    )
    .optional()?;
  match child_family {
    None => Ok(Err(zoomi_core::Error::ChildNotFound(child_id))),
    Some(family) if family != caller_family => {
      Ok(Err(zoomi_core::Error::Unauthorized))
    }
    Some(_) => Ok(Ok(())),
  }
}

fn require_non_empty(field: &str, value: &str) -> Outcome<()> {
  if value.trim().is_empty() {
    Err(zoomi_core::Error::InvalidInput(format!("{field} must not be empty")))
  } else {
    Ok(())
  }
}

// ─── FamilyStore impl ────────────────────────────────────────────────────────

impl FamilyStore for SqliteStore {
  type Error = crate::Error;

  // ── Profiles & families ───────────────────────────────────────────────────

  async fn create_profile(&self, input: NewProfile) -> Result<Profile> {
    let profile = Profile {
      id:         input.id,
      family_id:  None,
      first_name: input.first_name.trim().to_owned(),
      last_name:  input.last_name.trim().to_owned(),
      email:      input.email,
      created_at: self.now(),
    };

    let id_str = encode_uuid(profile.id);
    let first  = profile.first_name.clone();
    let last   = profile.last_name.clone();
    let email  = profile.email.clone();
    let at_str = encode_dt(profile.created_at);

    let inserted: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO profiles (profile_id, first_name, last_name, email, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT (profile_id) DO NOTHING",
          rusqlite::params![id_str, first, last, email, at_str],
        )?)
      })
      .await?;

    if inserted == 0 {
      return Err(zoomi_core::Error::ProfileExists(profile.id).into());
    }
    Ok(profile)
  }

  async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawProfile> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE profile_id = ?1"),
            rusqlite::params![id_str],
            RawProfile::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawProfile::into_profile).transpose()
  }

  async fn rename_profile(
    &self,
    id:         Uuid,
    first_name: String,
    last_name:  String,
  ) -> Result<Profile> {
    let id_str = encode_uuid(id);
    let first  = first_name.trim().to_owned();
    let last   = last_name.trim().to_owned();

    let raw: Option<RawProfile> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "UPDATE profiles SET first_name = ?2, last_name = ?3
               WHERE profile_id = ?1
               RETURNING {PROFILE_COLUMNS}"
            ),
            rusqlite::params![id_str, first, last],
            RawProfile::from_row,
          )
          .optional()?)
      })
      .await?;

    raw
      .ok_or(zoomi_core::Error::ProfileNotFound(id))?
      .into_profile()
  }

  async fn create_family_for(
    &self,
    profile_id: Uuid,
    name:       Option<String>,
  ) -> Result<(Family, Profile)> {
    let family = Family {
      id:         Uuid::new_v4(),
      name:       name.map(|n| n.trim().to_owned()).filter(|n| !n.is_empty()),
      created_at: self.now(),
    };

    let family_id_str  = encode_uuid(family.id);
    let family_name    = family.name.clone();
    let at_str         = encode_dt(family.created_at);
    let profile_id_str = encode_uuid(profile_id);

    let outcome: Outcome<RawProfile> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing: Option<Option<String>> = tx
          .query_row(
            "SELECT family_id FROM profiles WHERE profile_id = ?1",
            rusqlite::params![profile_id_str],
            |r| r.get(0),
          )
          .optional()?;
        match existing {
          None => return Ok(Err(zoomi_core::Error::ProfileNotFound(profile_id))),
          Some(Some(_)) => return Ok(Err(zoomi_core::Error::ProfileExists(profile_id))),
          Some(None) => {}
        }

        tx.execute(
          "INSERT INTO families (family_id, name, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![family_id_str, family_name, at_str],
        )?;
        let raw = tx.query_row(
          &format!(
            "UPDATE profiles SET family_id = ?2 WHERE profile_id = ?1
             RETURNING {PROFILE_COLUMNS}"
          ),
          rusqlite::params![profile_id_str, family_id_str],
          RawProfile::from_row,
        )?;
        tx.commit()?;
        Ok(Ok(raw))
      })
      .await?;

    let profile = outcome?.into_profile()?;
    info!(family_id = %family.id, profile_id = %profile.id, "family created");
    Ok((family, profile))
  }

  async fn get_family(&self, id: Uuid) -> Result<Option<Family>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawFamily> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT family_id, name, created_at FROM families WHERE family_id = ?1",
            rusqlite::params![id_str],
            |row| {
              Ok(RawFamily {
                family_id:  row.get(0)?,
                name:       row.get(1)?,
                created_at: row.get(2)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawFamily::into_family).transpose()
  }

  // ── Children ──────────────────────────────────────────────────────────────

  async fn create_child(&self, family_id: Uuid, name: String) -> Result<Child> {
    require_non_empty("child name", &name)?;

    let child = Child {
      id:                      Uuid::new_v4(),
      family_id,
      name:                    name.trim().to_owned(),
      linking_code:            None,
      linking_code_expires_at: None,
      device_id:               None,
      subscription_status:     SubscriptionStatus::default(),
      created_at:              self.now(),
    };

    let id_str     = encode_uuid(child.id);
    let family_str = encode_uuid(family_id);
    let name_str   = child.name.clone();
    let status_str = encode_status(child.subscription_status);
    let at_str     = encode_dt(child.created_at);

    let outcome: Outcome<()> = self
      .conn
      .call(move |conn| {
        let family_exists = conn
          .query_row(
            "SELECT 1 FROM families WHERE family_id = ?1",
            rusqlite::params![family_str],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !family_exists {
          return Ok(Err(zoomi_core::Error::FamilyNotFound(family_id)));
        }

        conn.execute(
          "INSERT INTO children (child_id, family_id, name, subscription_status, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, family_str, name_str, status_str, at_str],
        )?;
        Ok(Ok(()))
      })
      .await?;

    outcome?;
    Ok(child)
  }

  async fn get_child(&self, id: Uuid) -> Result<Option<Child>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawChild> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {CHILD_COLUMNS} FROM children WHERE child_id = ?1"),
            rusqlite::params![id_str],
            RawChild::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawChild::into_child).transpose()
  }

  async fn list_children(&self, family_id: Uuid) -> Result<Vec<Child>> {
    let family_str = encode_uuid(family_id);

    let raws: Vec<RawChild> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CHILD_COLUMNS} FROM children
           WHERE family_id = ?1
           ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![family_str], RawChild::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawChild::into_child).collect()
  }

  async fn set_subscription_status(
    &self,
    child_id: Uuid,
    status:   SubscriptionStatus,
  ) -> Result<Child> {
    let id_str     = encode_uuid(child_id);
    let status_str = encode_status(status);

    let raw: Option<RawChild> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "UPDATE children SET subscription_status = ?2 WHERE child_id = ?1
               RETURNING {CHILD_COLUMNS}"
            ),
            rusqlite::params![id_str, status_str],
            RawChild::from_row,
          )
          .optional()?)
      })
      .await?;

    raw
      .ok_or(zoomi_core::Error::ChildNotFound(child_id))?
      .into_child()
  }

  async fn delete_child(&self, child_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(child_id);

    let deleted: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM children WHERE child_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    Ok(deleted > 0)
  }

  // ── Linking protocol ──────────────────────────────────────────────────────

  async fn generate_linking_code(
    &self,
    caller:   Uuid,
    child_id: Uuid,
  ) -> Result<LinkingCode> {
    let now        = self.now();
    let expires_at = now + code_ttl();
    let now_str    = encode_dt(now);
    let exp_str    = encode_dt(expires_at);
    let child_str  = encode_uuid(child_id);
    let codes      = Arc::clone(&self.codes);

    let outcome: Outcome<String> = self
      .conn
      .call(move |conn| {
        // IMMEDIATE takes the write lock up front, so the collision check and
        // the write below see the same snapshot.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Err(e) = authorize_parent(&tx, caller, child_id)? {
          return Ok(Err(e));
        }

        for attempt in 1..=MAX_GENERATION_ATTEMPTS {
          let candidate = codes.generate();

          let holder: Option<(String, String)> = tx
            .query_row(
              "SELECT child_id, linking_code_expires_at FROM children
               WHERE linking_code = ?1",
              rusqlite::params![candidate],
              |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;

          if let Some((holder_id, holder_expiry)) = holder {
            // Reissuing the child's own value would keep the old code alive.
            if holder_id == child_str || holder_expiry > now_str {
              debug!(attempt, "linking code collision");
              continue;
            }
            // The other child's code is dead; reclaim its value.
            tx.execute(
              "UPDATE children
               SET linking_code = NULL, linking_code_expires_at = NULL
               WHERE child_id = ?1",
              rusqlite::params![holder_id],
            )?;
          }

          tx.execute(
            "UPDATE children
             SET linking_code = ?2, linking_code_expires_at = ?3
             WHERE child_id = ?1",
            rusqlite::params![child_str, candidate, exp_str],
          )?;
          tx.commit()?;
          return Ok(Ok(candidate));
        }

        Ok(Err(zoomi_core::Error::GenerationExhausted(MAX_GENERATION_ATTEMPTS)))
      })
      .await?;

    let code = outcome?;
    info!(%child_id, %caller, %expires_at, "linking code issued");
    Ok(LinkingCode { code, expires_at })
  }

  async fn validate_and_link_child(
    &self,
    code:      &str,
    device_id: &str,
  ) -> Result<Child> {
    require_non_empty("device id", device_id)?;

    let code_str   = code.to_owned();
    let device_str = device_id.to_owned();
    let now_str    = encode_dt(self.now());

    // One conditional write: match, consume and bind in a single statement so
    // two concurrent presentations of the same code cannot both succeed.
    let raw: Option<RawChild> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "UPDATE children
               SET device_id = ?2, linking_code = NULL, linking_code_expires_at = NULL
               WHERE linking_code = ?1 AND linking_code_expires_at > ?3
               RETURNING {CHILD_COLUMNS}"
            ),
            rusqlite::params![code_str, device_str, now_str],
            RawChild::from_row,
          )
          .optional()?)
      })
      .await?;

    let child = raw
      .ok_or(zoomi_core::Error::InvalidOrExpiredCode)?
      .into_child()?;
    info!(child_id = %child.id, "device linked");
    Ok(child)
  }

  async fn unlink_device(&self, caller: Uuid, child_id: Uuid) -> Result<Child> {
    let child_str = encode_uuid(child_id);

    let outcome: Outcome<RawChild> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Err(e) = authorize_parent(&tx, caller, child_id)? {
          return Ok(Err(e));
        }

        let raw = tx.query_row(
          &format!(
            "UPDATE children SET device_id = NULL WHERE child_id = ?1
             RETURNING {CHILD_COLUMNS}"
          ),
          rusqlite::params![child_str],
          RawChild::from_row,
        )?;
        tx.commit()?;
        Ok(Ok(raw))
      })
      .await?;

    let child = outcome?.into_child()?;
    info!(%child_id, %caller, "device unlinked");
    Ok(child)
  }

  async fn get_linked_child(
    &self,
    child_id:  Uuid,
    device_id: &str,
  ) -> Result<Option<Child>> {
    let id_str     = encode_uuid(child_id);
    let device_str = device_id.to_owned();

    let raw: Option<RawChild> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {CHILD_COLUMNS} FROM children
               WHERE child_id = ?1 AND device_id = ?2"
            ),
            rusqlite::params![id_str, device_str],
            RawChild::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawChild::into_child).transpose()
  }
}
