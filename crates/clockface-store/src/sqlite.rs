use crate::schema::{SCHEMA, SCHEMA_VERSION};
use chrono::NaiveDate;
use clockface_core::store::{EventStore, IdentityStore, StoreError};
use clockface_core::types::{format_day, format_timestamp, parse_timestamp};
use clockface_core::{Action, AttendanceEvent, Identity, Profile};
use rusqlite::{params, ErrorCode, OptionalExtension, TransactionBehavior};
use std::path::Path;

/// Raw `attendance_events` row: (person_id, timestamp, action).
type EventRow = (String, String, String);

/// Raw `identities` row in column order.
type IdentityRow = (String, String, String, String, String, String, Option<String>, String);

/// Result of a conditional write, decided on the database thread.
enum WriteResult {
    Written,
    Exists,
    Conflict(usize),
}

/// SQLite-backed [`IdentityStore`] and [`EventStore`].
#[derive(Clone)]
pub struct SqliteStore {
    conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and apply the schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(StoreError::backend)?;
            }
        }

        let conn = tokio_rusqlite::Connection::open(&path)
            .await
            .map_err(StoreError::backend)?;
        conn.call(|conn| {
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            tracing::debug!(journal_mode = %mode, "sqlite journal mode");
            Ok(())
        })
        .await
        .map_err(StoreError::backend)?;

        let store = Self { conn };
        store.migrate().await?;
        tracing::info!(path = %path.display(), "attendance store opened");
        Ok(store)
    }

    /// In-memory database, used by tests and dry runs.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(StoreError::backend)?;
        let store = Self { conn };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        self.conn
            .call(|conn| {
                conn.execute_batch(SCHEMA)?;
                conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
                Ok(())
            })
            .await
            .map_err(StoreError::backend)
    }

    /// Number of identities and events, for status reporting.
    pub async fn counts(&self) -> Result<(u64, u64), StoreError> {
        self.conn
            .call(|conn| {
                let identities: i64 =
                    conn.query_row("SELECT COUNT(*) FROM identities", [], |row| row.get(0))?;
                let events: i64 =
                    conn.query_row("SELECT COUNT(*) FROM attendance_events", [], |row| row.get(0))?;
                Ok((identities as u64, events as u64))
            })
            .await
            .map_err(StoreError::backend)
    }

    async fn query_events(
        &self,
        sql: &'static str,
        args: Vec<String>,
    ) -> Result<Vec<AttendanceEvent>, StoreError> {
        let rows: Vec<EventRow> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(sql)?;
                let rows = stmt
                    .query_map(rusqlite::params_from_iter(args.iter()), |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                    })?
                    .collect::<Result<Vec<EventRow>, rusqlite::Error>>()?;
                Ok(rows)
            })
            .await
            .map_err(StoreError::backend)?;

        rows.into_iter().map(event_from_row).collect()
    }
}

fn event_from_row((person_id, timestamp, action): EventRow) -> Result<AttendanceEvent, StoreError> {
    let ts = parse_timestamp(&timestamp)
        .map_err(|e| StoreError::Corrupt(format!("{person_id} timestamp {timestamp:?}: {e}")))?;
    let action: Action = action
        .parse()
        .map_err(|e| StoreError::Corrupt(format!("{person_id} at {timestamp}: {e}")))?;
    Ok(AttendanceEvent { person_id, timestamp: ts, action })
}

fn identity_from_row(row: IdentityRow) -> Result<Identity, StoreError> {
    let (person_id, first_name, last_name, city, state, pincode, face_id, created_at) = row;
    let created_at = parse_timestamp(&created_at)
        .map_err(|e| StoreError::Corrupt(format!("{person_id} created_at {created_at:?}: {e}")))?;
    Ok(Identity {
        person_id,
        profile: Profile { first_name, last_name, city, state, pincode },
        face_id,
        created_at,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

impl IdentityStore for SqliteStore {
    async fn get_identity(&self, person_id: &str) -> Result<Option<Identity>, StoreError> {
        let person_id = person_id.to_string();
        let row: Option<IdentityRow> = self
            .conn
            .call(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT person_id, first_name, last_name, city, state, pincode, face_id, created_at
                         FROM identities WHERE person_id = ?1",
                        params![person_id],
                        |row| {
                            Ok((
                                row.get(0)?,
                                row.get(1)?,
                                row.get(2)?,
                                row.get(3)?,
                                row.get(4)?,
                                row.get(5)?,
                                row.get(6)?,
                                row.get(7)?,
                            ))
                        },
                    )
                    .optional()?;
                Ok(row)
            })
            .await
            .map_err(StoreError::backend)?;

        row.map(identity_from_row).transpose()
    }

    async fn insert_identity(&self, identity: &Identity) -> Result<(), StoreError> {
        let identity = identity.clone();
        let person_id = identity.person_id.clone();
        let result = self
            .conn
            .call(move |conn| {
                let p = &identity.profile;
                let inserted = conn.execute(
                    "INSERT INTO identities
                         (person_id, first_name, last_name, city, state, pincode, face_id, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        identity.person_id,
                        p.first_name,
                        p.last_name,
                        p.city,
                        p.state,
                        p.pincode,
                        identity.face_id,
                        format_timestamp(&identity.created_at),
                    ],
                );
                match inserted {
                    Ok(_) => Ok(WriteResult::Written),
                    Err(e) if is_constraint_violation(&e) => Ok(WriteResult::Exists),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(StoreError::backend)?;

        match result {
            WriteResult::Written => Ok(()),
            WriteResult::Exists | WriteResult::Conflict(_) => Err(StoreError::AlreadyExists(person_id)),
        }
    }

    async fn set_face_id(&self, person_id: &str, face_id: &str) -> Result<(), StoreError> {
        let id = person_id.to_string();
        let face_id = face_id.to_string();
        let changed = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "UPDATE identities SET face_id = ?2 WHERE person_id = ?1",
                    params![id, face_id],
                )?;
                Ok(n)
            })
            .await
            .map_err(StoreError::backend)?;

        if changed == 0 {
            return Err(StoreError::NotFound(person_id.to_string()));
        }
        Ok(())
    }

    async fn remove_identity(&self, person_id: &str) -> Result<bool, StoreError> {
        let id = person_id.to_string();
        let removed = self
            .conn
            .call(move |conn| {
                let n = conn.execute("DELETE FROM identities WHERE person_id = ?1", params![id])?;
                Ok(n)
            })
            .await
            .map_err(StoreError::backend)?;
        Ok(removed > 0)
    }
}

impl EventStore for SqliteStore {
    async fn events_on(&self, person_id: &str, day: NaiveDate) -> Result<Vec<AttendanceEvent>, StoreError> {
        self.query_events(
            "SELECT person_id, timestamp, action FROM attendance_events
             WHERE person_id = ?1 AND substr(timestamp, 1, 10) = ?2
             ORDER BY timestamp ASC",
            vec![person_id.to_string(), format_day(&day)],
        )
        .await
    }

    async fn append_event(&self, event: &AttendanceEvent, expected_prior: usize) -> Result<(), StoreError> {
        let person_id = event.person_id.clone();
        let day = format_day(&event.day());
        let timestamp = format_timestamp(&event.timestamp);
        let action = event.action.as_str();

        let result = self
            .conn
            .call(move |conn| {
                // IMMEDIATE takes the write lock before the count, so a second
                // process cannot slip an event in between count and insert.
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let found: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM attendance_events
                     WHERE person_id = ?1 AND substr(timestamp, 1, 10) = ?2",
                    params![person_id, day],
                    |row| row.get(0),
                )?;
                let found = found as usize;
                if found != expected_prior {
                    return Ok(WriteResult::Conflict(found));
                }

                let inserted = tx.execute(
                    "INSERT INTO attendance_events (person_id, timestamp, action) VALUES (?1, ?2, ?3)",
                    params![person_id, timestamp, action],
                );
                match inserted {
                    Ok(_) => {
                        tx.commit()?;
                        Ok(WriteResult::Written)
                    }
                    Err(e) if is_constraint_violation(&e) => Ok(WriteResult::Exists),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(StoreError::backend)?;

        match result {
            WriteResult::Written => Ok(()),
            WriteResult::Conflict(found) => Err(StoreError::Conflict {
                person_id: event.person_id.clone(),
                expected: expected_prior,
                found,
            }),
            WriteResult::Exists => Err(StoreError::Conflict {
                person_id: event.person_id.clone(),
                expected: expected_prior,
                found: expected_prior + 1,
            }),
        }
    }

    async fn all_events(&self) -> Result<Vec<AttendanceEvent>, StoreError> {
        self.query_events(
            "SELECT person_id, timestamp, action FROM attendance_events
             ORDER BY timestamp DESC, person_id ASC",
            Vec::new(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn at(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    fn event(person_id: &str, ts: &str, action: Action) -> AttendanceEvent {
        AttendanceEvent { person_id: person_id.into(), timestamp: at(ts), action }
    }

    fn identity(person_id: &str, first_name: &str) -> Identity {
        Identity {
            person_id: person_id.into(),
            profile: Profile {
                first_name: first_name.into(),
                last_name: "Rao".into(),
                city: "Pune".into(),
                state: "MH".into(),
                pincode: "411001".into(),
            },
            face_id: None,
            created_at: at("2024-03-01 10:00:00"),
        }
    }

    #[tokio::test]
    async fn test_identity_insert_and_get() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.insert_identity(&identity("E100", "Asha")).await.unwrap();

        let found = store.get_identity("E100").await.unwrap().unwrap();
        assert_eq!(found.profile.first_name, "Asha");
        assert_eq!(found.profile.pincode, "411001");
        assert!(found.face_id.is_none());
        assert!(store.get_identity("E999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_identity_insert_never_overwrites() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.insert_identity(&identity("E100", "Asha")).await.unwrap();

        let err = store.insert_identity(&identity("E100", "Impostor")).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(id) if id == "E100"));
        let found = store.get_identity("E100").await.unwrap().unwrap();
        assert_eq!(found.profile.first_name, "Asha");
    }

    #[tokio::test]
    async fn test_face_id_and_removal() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.insert_identity(&identity("E100", "Asha")).await.unwrap();
        store.set_face_id("E100", "face-1").await.unwrap();
        let found = store.get_identity("E100").await.unwrap().unwrap();
        assert_eq!(found.face_id.as_deref(), Some("face-1"));

        assert!(matches!(
            store.set_face_id("E404", "face-2").await.unwrap_err(),
            StoreError::NotFound(_)
        ));

        assert!(store.remove_identity("E100").await.unwrap());
        assert!(!store.remove_identity("E100").await.unwrap());
    }

    #[tokio::test]
    async fn test_events_on_day_only() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.append_event(&event("E100", "2024-03-09 09:00:00", Action::Login), 0).await.unwrap();
        store.append_event(&event("E100", "2024-03-10 09:00:00", Action::Login), 0).await.unwrap();
        store.append_event(&event("E100", "2024-03-10 18:00:00", Action::Logout), 1).await.unwrap();
        store.append_event(&event("E200", "2024-03-10 09:30:00", Action::Login), 0).await.unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let today = store.events_on("E100", day).await.unwrap();
        assert_eq!(today.len(), 2);
        assert_eq!(today[0].action, Action::Login);
        assert_eq!(today[1].action, Action::Logout);

        assert_eq!(store.all_events().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_append_conflicts_on_stale_count() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.append_event(&event("E100", "2024-03-10 09:00:00", Action::Login), 0).await.unwrap();

        // A second writer that also saw an empty day must not add another LOGIN.
        let err = store
            .append_event(&event("E100", "2024-03-10 09:00:01", Action::Login), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { expected: 0, found: 1, .. }));

        let day = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert_eq!(store.events_on("E100", day).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_append_conflicts_on_duplicate_timestamp() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.append_event(&event("E100", "2024-03-10 09:00:00", Action::Login), 0).await.unwrap();
        let err = store
            .append_event(&event("E100", "2024-03-10 09:00:00", Action::Logout), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_all_events_newest_first() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.append_event(&event("E100", "2024-03-10 09:00:00", Action::Login), 0).await.unwrap();
        store.append_event(&event("E200", "2024-03-10 08:00:00", Action::Login), 0).await.unwrap();
        store.append_event(&event("E100", "2024-03-10 18:00:00", Action::Logout), 1).await.unwrap();

        let all = store.all_events().await.unwrap();
        let stamps: Vec<String> = all.iter().map(|e| format_timestamp(&e.timestamp)).collect();
        assert_eq!(
            stamps,
            vec!["2024-03-10 18:00:00", "2024-03-10 09:00:00", "2024-03-10 08:00:00"]
        );
        assert_eq!(store.counts().await.unwrap(), (0, 3));
    }
}
