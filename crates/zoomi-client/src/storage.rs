//! Durable key-value storage for per-device session data.
//!
//! Keys in use: [`CHILD_ID_KEY`] (the linked child; absence means no child
//! session), [`DEVICE_ID_KEY`] (stable per-install identifier) and
//! [`PARENT_TOKEN_KEY`] (owned by [`crate::auth::TokenAuth`]).

use std::{
  collections::BTreeMap,
  fs,
  io::{self, Write as _},
  path::{Path, PathBuf},
  sync::{Arc, Mutex, PoisonError},
};

use uuid::Uuid;

use crate::error::ClientError;

pub const CHILD_ID_KEY: &str = "child_id";
pub const DEVICE_ID_KEY: &str = "device_id";
pub const PARENT_TOKEN_KEY: &str = "parent_token";

/// Sequential string key-value storage that survives restarts.
pub trait LocalStore: Send + Sync {
  fn get(&self, key: &str) -> Result<Option<String>, ClientError>;
  fn set(&self, key: &str, value: &str) -> Result<(), ClientError>;
  fn remove(&self, key: &str) -> Result<(), ClientError>;
}

impl<T: LocalStore + ?Sized> LocalStore for Arc<T> {
  fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
    (**self).get(key)
  }

  fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
    (**self).set(key, value)
  }

  fn remove(&self, key: &str) -> Result<(), ClientError> { (**self).remove(key) }
}

/// Return this install's device identifier, creating and persisting one on
/// first use.
pub fn ensure_device_id(store: &impl LocalStore) -> Result<String, ClientError> {
  if let Some(id) = store.get(DEVICE_ID_KEY)? {
    return Ok(id);
  }
  let id = Uuid::new_v4().to_string();
  store.set(DEVICE_ID_KEY, &id)?;
  tracing::debug!(device_id = %id, "generated device id");
  Ok(id)
}

// ─── File-backed ─────────────────────────────────────────────────────────────

/// A JSON object on disk. Every write replaces the file atomically through a
/// temporary file in the same directory.
#[derive(Debug)]
pub struct FileStore {
  path:    PathBuf,
  entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
  /// Open the store at `path`; a missing file is an empty store.
  pub fn open(path: impl Into<PathBuf>) -> Result<Self, ClientError> {
    let path = path.into();
    let entries = match fs::read_to_string(&path) {
      Ok(raw) => serde_json::from_str(&raw)?,
      Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
      Err(e) => return Err(e.into()),
    };
    Ok(Self { path, entries: Mutex::new(entries) })
  }

  pub fn path(&self) -> &Path { &self.path }

  fn write(&self, entries: &BTreeMap<String, String>) -> Result<(), ClientError> {
    let dir = match self.path.parent() {
      Some(p) if !p.as_os_str().is_empty() => p,
      _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, entries)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(&self.path).map_err(|e| e.error)?;
    Ok(())
  }

  /// Apply `f` to a copy of the entries and commit it only once it is on
  /// disk, so a failed write leaves memory and file in agreement.
  fn update(
    &self,
    f: impl FnOnce(&mut BTreeMap<String, String>),
  ) -> Result<(), ClientError> {
    let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    let mut next = entries.clone();
    f(&mut next);
    if next == *entries {
      return Ok(());
    }
    self.write(&next)?;
    *entries = next;
    Ok(())
  }
}

impl LocalStore for FileStore {
  fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
    let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    Ok(entries.get(key).cloned())
  }

  fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
    self.update(|m| {
      m.insert(key.to_owned(), value.to_owned());
    })
  }

  fn remove(&self, key: &str) -> Result<(), ClientError> {
    self.update(|m| {
      m.remove(key);
    })
  }
}

// ─── In-memory ───────────────────────────────────────────────────────────────

/// Non-durable store for tests and ephemeral sessions. Clones share entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
  entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  /// Copy of all entries.
  pub fn snapshot(&self) -> BTreeMap<String, String> {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }
}

impl LocalStore for MemoryStore {
  fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
    Ok(self.snapshot().get(key).cloned())
  }

  fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
    self
      .entries
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(key.to_owned(), value.to_owned());
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), ClientError> {
    self
      .entries
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(key);
    Ok(())
  }
}
