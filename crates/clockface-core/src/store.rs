//! Storage contracts for identities and attendance events.

use crate::types::{AttendanceEvent, Identity};
use chrono::NaiveDate;
use std::future::Future;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage backend: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("identity already exists: {0}")]
    AlreadyExists(String),
    #[error("identity not found: {0}")]
    NotFound(String),
    #[error("{person_id} changed concurrently: expected {expected} events today, found {found}")]
    Conflict {
        person_id: String,
        expected: usize,
        found: usize,
    },
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn backend<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        StoreError::Backend(err.into())
    }
}

/// Point lookup and write of identities keyed by person id.
pub trait IdentityStore: Send + Sync {
    fn get_identity(
        &self,
        person_id: &str,
    ) -> impl Future<Output = Result<Option<Identity>, StoreError>> + Send;

    /// Insert a new identity. Fails with [`StoreError::AlreadyExists`] if the
    /// person id is taken; never overwrites.
    fn insert_identity(
        &self,
        identity: &Identity,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Record the face template reference for an existing identity.
    fn set_face_id(
        &self,
        person_id: &str,
        face_id: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Delete an identity. Returns whether a row was removed.
    fn remove_identity(
        &self,
        person_id: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

/// Append-only attendance log partitioned by person id.
pub trait EventStore: Send + Sync {
    /// A person's events dated `day`, oldest first.
    fn events_on(
        &self,
        person_id: &str,
        day: NaiveDate,
    ) -> impl Future<Output = Result<Vec<AttendanceEvent>, StoreError>> + Send;

    /// Append `event` only if the person still has exactly `expected_prior`
    /// events on the event's day. Otherwise fails with [`StoreError::Conflict`]
    /// and writes nothing.
    fn append_event(
        &self,
        event: &AttendanceEvent,
        expected_prior: usize,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Every event, newest first.
    fn all_events(&self) -> impl Future<Output = Result<Vec<AttendanceEvent>, StoreError>> + Send;
}
