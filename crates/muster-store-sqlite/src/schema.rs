//! SQL schema for the Muster SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated
//! on `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS identities (
    identity_id   TEXT PRIMARY KEY,
    email         TEXT NOT NULL COLLATE NOCASE UNIQUE,  -- stored lowercase
    password_hash TEXT NOT NULL,         -- argon2 PHC string
    role          TEXT NOT NULL,         -- 'admin' | 'member'
    is_active     INTEGER NOT NULL DEFAULT 1,
    person_id     TEXT REFERENCES people(person_id),
    last_login_at TEXT
);

-- Records are soft-deleted only: is_active flips, rows never go away,
-- so email and code uniqueness survive deletion.
CREATE TABLE IF NOT EXISTS people (
    person_id   TEXT PRIMARY KEY,
    code        TEXT NOT NULL UNIQUE,    -- 'PER-0001', counter-assigned
    first_name  TEXT NOT NULL,
    last_name   TEXT NOT NULL,
    email       TEXT NOT NULL COLLATE NOCASE UNIQUE,  -- stored lowercase
    age         INTEGER NOT NULL,
    class_group TEXT NOT NULL,
    subjects    TEXT NOT NULL,           -- JSON array, non-empty
    salary      REAL,
    department  TEXT,
    is_active   INTEGER NOT NULL DEFAULT 1,
    created_by  TEXT NOT NULL REFERENCES identities(identity_id),
    created_at  TEXT NOT NULL,           -- RFC 3339 UTC
    updated_at  TEXT NOT NULL
);

-- The attendance register is strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS attendance (
    attendance_id TEXT PRIMARY KEY,
    person_id     TEXT NOT NULL REFERENCES people(person_id),
    date          TEXT NOT NULL,         -- ISO 8601 calendar date
    status        TEXT NOT NULL,         -- 'present' | 'absent' | 'late'
    remarks       TEXT,
    recorded_at   TEXT NOT NULL
);

-- Monotonic counters. Person codes come from an atomic
-- increment-and-read inside the insert transaction, so concurrent
-- creates cannot allocate the same code.
CREATE TABLE IF NOT EXISTS counters (
    name  TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);
INSERT OR IGNORE INTO counters (name, value) VALUES ('person_code', 0);

CREATE INDEX IF NOT EXISTS people_class_idx      ON people(class_group);
CREATE INDEX IF NOT EXISTS people_department_idx ON people(department);
CREATE INDEX IF NOT EXISTS people_active_idx     ON people(is_active);
CREATE INDEX IF NOT EXISTS attendance_person_idx ON attendance(person_id);

PRAGMA user_version = 1;
";
