//! clockface-store — SQLite persistence for identities and attendance events.
//!
//! All database access runs on the `tokio-rusqlite` background thread.
//! Attendance appends are conditional on the expected count of the day's
//! events, so two writers racing on one person cannot both succeed.

mod schema;
pub mod sqlite;

pub use sqlite::SqliteStore;
