//! SQL schema for the bucket archive.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Sealed buckets, plus open buckets checkpointed at shutdown. A checkpoint
-- row is replaced by the sealed row once its period closes.
CREATE TABLE IF NOT EXISTS buckets (
    station_id   TEXT    NOT NULL,
    metric       TEXT    NOT NULL,
    granularity  TEXT    NOT NULL,   -- 'minute' | 'hour' | ... | 'year'
    bucket_start INTEGER NOT NULL,   -- unix seconds, floor-aligned
    bucket_end   INTEGER NOT NULL,   -- unix seconds, exclusive
    count        INTEGER NOT NULL,
    sum          REAL    NOT NULL,
    min          REAL    NOT NULL,
    max          REAL    NOT NULL,
    last         REAL    NOT NULL,
    last_at      TEXT    NOT NULL,   -- RFC 3339 UTC
    sealed       INTEGER NOT NULL,   -- 0 = open checkpoint, 1 = sealed
    PRIMARY KEY (station_id, metric, granularity, bucket_start)
);

CREATE INDEX IF NOT EXISTS buckets_end_idx ON buckets(granularity, bucket_end);

PRAGMA user_version = 1;
";
