//! Schema, applied idempotently on open.

pub(crate) const SCHEMA_VERSION: i64 = 1;

pub(crate) const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS identities (
    person_id   TEXT PRIMARY KEY NOT NULL,
    first_name  TEXT NOT NULL DEFAULT '',
    last_name   TEXT NOT NULL DEFAULT '',
    city        TEXT NOT NULL DEFAULT '',
    state       TEXT NOT NULL DEFAULT '',
    pincode     TEXT NOT NULL DEFAULT '',
    face_id     TEXT,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS attendance_events (
    person_id   TEXT NOT NULL,
    timestamp   TEXT NOT NULL,
    action      TEXT NOT NULL CHECK (action IN ('LOGIN', 'LOGOUT')),
    PRIMARY KEY (person_id, timestamp)
);

CREATE INDEX IF NOT EXISTS attendance_events_by_time
    ON attendance_events (timestamp);
";
