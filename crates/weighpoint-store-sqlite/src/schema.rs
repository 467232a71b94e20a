//! SQL schema for the Weighpoint SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS subjects (
    subject_id       TEXT PRIMARY KEY,
    name             TEXT NOT NULL,
    current_net_g    REAL NOT NULL DEFAULT 0.0,
    tare_g           REAL NOT NULL DEFAULT 0.0,
    density_g_per_ml REAL,
    unit             TEXT NOT NULL DEFAULT 'g',
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);

-- The usage log is strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS usage_log (
    entry_id    TEXT PRIMARY KEY,
    subject_id  TEXT NOT NULL REFERENCES subjects(subject_id),
    prev_g      REAL NOT NULL,
    new_g       REAL NOT NULL,
    delta_g     REAL NOT NULL,
    delta_ml    REAL,
    source      TEXT NOT NULL,  -- 'measurement' | 'manual-use' | 'manual-discard'
    note        TEXT,
    recorded_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS measurement_jobs (
    job_id       TEXT PRIMARY KEY,
    subject_id   TEXT NOT NULL REFERENCES subjects(subject_id),
    state        TEXT NOT NULL,  -- 'pending' | 'claimed' | 'done'
    claimant     TEXT,
    created_at   TEXT NOT NULL,
    claimed_at   TEXT,
    result_g     REAL,
    completed_at TEXT
);

-- Backstop for the single-claim protocol: at most one job per subject may
-- be outstanding (pending or claimed) at any time.
CREATE UNIQUE INDEX IF NOT EXISTS jobs_outstanding_idx
    ON measurement_jobs(subject_id) WHERE state != 'done';

CREATE INDEX IF NOT EXISTS usage_log_subject_idx ON usage_log(subject_id, recorded_at);
CREATE INDEX IF NOT EXISTS jobs_state_idx        ON measurement_jobs(state, created_at);

PRAGMA user_version = 1;
";
