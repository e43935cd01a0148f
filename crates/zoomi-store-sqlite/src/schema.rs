//! SQL schema for the Zoomi SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS families (
    family_id   TEXT PRIMARY KEY,
    name        TEXT,
    created_at  TEXT NOT NULL
);

-- profile_id is the external auth provider's user id.
CREATE TABLE IF NOT EXISTS profiles (
    profile_id  TEXT PRIMARY KEY,
    family_id   TEXT REFERENCES families(family_id),   -- NULL until onboarded
    first_name  TEXT NOT NULL,
    last_name   TEXT NOT NULL,
    email       TEXT,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS children (
    child_id                TEXT PRIMARY KEY,
    family_id               TEXT NOT NULL REFERENCES families(family_id) ON DELETE CASCADE,
    name                    TEXT NOT NULL,
    linking_code            TEXT,
    linking_code_expires_at TEXT,     -- fixed-width RFC 3339 UTC
    device_id               TEXT,
    subscription_status     TEXT NOT NULL DEFAULT 'inactive',
    created_at              TEXT NOT NULL,
    CHECK ((linking_code IS NULL) = (linking_code_expires_at IS NULL))
);

-- A code value is held by at most one child. Expired holders are reclaimed
-- by the generator before reuse.
CREATE UNIQUE INDEX IF NOT EXISTS children_linking_code_idx
    ON children(linking_code) WHERE linking_code IS NOT NULL;

CREATE INDEX IF NOT EXISTS children_family_idx   ON children(family_id);
CREATE INDEX IF NOT EXISTS profiles_family_idx   ON profiles(family_id);

PRAGMA user_version = 1;
";
