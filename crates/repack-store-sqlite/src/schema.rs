//! SQL schema for the RePack SQLite store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! schema revision for later migrations.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per reporting site.
CREATE TABLE IF NOT EXISTS supporters (
    supporter_id     TEXT PRIMARY KEY,
    host             TEXT NOT NULL UNIQUE,
    site_url         TEXT NOT NULL,
    site_lang        TEXT NOT NULL,
    repack_start     INTEGER NOT NULL,  -- unix seconds
    repack_counter   TEXT NOT NULL,
    repack_ratio     TEXT NOT NULL,
    repack_coupon    TEXT,
    repack_last_sent INTEGER NOT NULL,  -- unix seconds
    status           TEXT NOT NULL DEFAULT 'pending',
    image_id         TEXT,              -- media_assets.asset_id
    created_at       TEXT NOT NULL,     -- RFC 3339, backdated
    modified_at      TEXT NOT NULL
);

-- Weekly snapshots; the last write in a period wins.
CREATE TABLE IF NOT EXISTS supporter_history (
    supporter_id     TEXT NOT NULL REFERENCES supporters(supporter_id),
    period           TEXT NOT NULL,     -- 'YYYY-Www'
    repack_start     INTEGER NOT NULL,
    repack_last_sent INTEGER NOT NULL,
    repack_counter   TEXT NOT NULL,
    repack_ratio     TEXT NOT NULL,
    PRIMARY KEY (supporter_id, period)
);

CREATE TABLE IF NOT EXISTS media_assets (
    asset_id     TEXT PRIMARY KEY,
    supporter_id TEXT NOT NULL REFERENCES supporters(supporter_id),
    title        TEXT NOT NULL,
    caption      TEXT NOT NULL,
    alt_text     TEXT NOT NULL,
    description  TEXT NOT NULL,
    media_type   TEXT NOT NULL,
    content_hash TEXT NOT NULL,         -- hex SHA-256 of bytes
    bytes        BLOB NOT NULL,
    created_at   TEXT NOT NULL
);

-- Global telemetry counters.
CREATE TABLE IF NOT EXISTS counters (
    metric TEXT NOT NULL,
    period TEXT NOT NULL,               -- 'YYYY-MM'
    value  TEXT NOT NULL,
    count  INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (metric, period, value)
);

CREATE INDEX IF NOT EXISTS supporters_status_idx ON supporters(status);
CREATE INDEX IF NOT EXISTS media_supporter_idx   ON media_assets(supporter_id);

PRAGMA user_version = 1;
";
