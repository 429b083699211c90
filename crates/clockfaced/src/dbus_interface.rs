use crate::engine::{AttendanceDesk, DeskError};
use clockface_core::types::format_timestamp;
use clockface_core::{AttendanceEvent, Profile, SystemClock};
use clockface_remote::HttpBiometricClient;
use clockface_store::SqliteStore;
use serde::Serialize;
use std::sync::Arc;
use zbus::interface;

pub const BUS_NAME: &str = "org.clockface.Clockface1";
pub const OBJECT_PATH: &str = "/org/clockface/Clockface1";

/// Message returned to callers for any transport or storage failure.
const RETRY_MESSAGE: &str = "Attendance service is temporarily unavailable. Please try again.";

/// Message for a stored day that breaks the attendance rules. Retrying cannot fix it.
const INTEGRITY_MESSAGE: &str =
    "Your attendance record for today needs correcting. Please contact HR.";

pub type Desk = AttendanceDesk<HttpBiometricClient, SqliteStore, SystemClock>;

/// D-Bus interface for the Clockface attendance daemon.
///
/// Bus name: org.clockface.Clockface1
/// Object path: /org/clockface/Clockface1
pub struct ClockfaceService {
    pub desk: Arc<Desk>,
    pub collection: String,
}

/// One row of `ListRecords`.
#[derive(Serialize)]
struct RecordRow<'a> {
    person_id: &'a str,
    timestamp: String,
    action: &'static str,
}

impl<'a> From<&'a AttendanceEvent> for RecordRow<'a> {
    fn from(event: &'a AttendanceEvent) -> Self {
        Self {
            person_id: &event.person_id,
            timestamp: format_timestamp(&event.timestamp),
            action: event.action.as_str(),
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> zbus::fdo::Result<String> {
    serde_json::to_string(value).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
}

/// Details stay in the daemon log; callers only learn whether a retry can help.
fn unavailable(err: DeskError) -> zbus::fdo::Error {
    tracing::debug!(error = %err, "reporting failure to caller");
    let message = match err {
        DeskError::Integrity(_) => INTEGRITY_MESSAGE,
        DeskError::Biometric(_) | DeskError::Store(_) => RETRY_MESSAGE,
    };
    zbus::fdo::Error::Failed(message.into())
}

#[interface(name = "org.clockface.Clockface1")]
impl ClockfaceService {
    /// Register a person: profile JSON plus a JPEG photo.
    async fn enroll(
        &self,
        person_id: &str,
        profile_json: &str,
        image: Vec<u8>,
    ) -> zbus::fdo::Result<String> {
        tracing::info!(person_id, bytes = image.len(), "enroll requested");
        let profile: Profile = serde_json::from_str(profile_json)
            .map_err(|e| zbus::fdo::Error::InvalidArgs(format!("profile: {e}")))?;

        let outcome = self
            .desk
            .enroll(person_id, profile, &image)
            .await
            .map_err(unavailable)?;
        to_json(&outcome)
    }

    /// Mark attendance for the face in a JPEG photo.
    async fn scan(&self, image: Vec<u8>) -> zbus::fdo::Result<String> {
        if image.is_empty() {
            return Err(zbus::fdo::Error::InvalidArgs("image is empty".into()));
        }
        let outcome = self.desk.scan(&image).await.map_err(unavailable)?;
        to_json(&outcome)
    }

    /// Every attendance event, newest first.
    async fn list_records(&self) -> zbus::fdo::Result<String> {
        let events = self.desk.records().await.map_err(unavailable)?;
        let rows: Vec<RecordRow<'_>> = events.iter().map(RecordRow::from).collect();
        to_json(&rows)
    }

    /// The enrolled identity for `person_id`, or `null`.
    async fn get_profile(&self, person_id: &str) -> zbus::fdo::Result<String> {
        let identity = self.desk.identity(person_id).await.map_err(unavailable)?;
        to_json(&identity)
    }

    /// Return daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let (identities, events) = self
            .desk
            .store()
            .counts()
            .await
            .map_err(|e| unavailable(e.into()))?;
        let policy = self.desk.policy();
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "collection": self.collection,
            "identities": identities,
            "events": events,
            "match_threshold": policy.match_threshold,
            "face_cover_min_confidence": policy.face_cover_min_confidence,
            "min_sharpness": policy.min_sharpness,
            "screen_face_cover": policy.check_face_cover,
            "screen_quality": policy.check_quality,
        })
        .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clockface_core::types::parse_timestamp;
    use clockface_core::Action;

    #[test]
    fn test_record_row_shape() {
        let event = AttendanceEvent {
            person_id: "E100".into(),
            timestamp: parse_timestamp("2024-03-10 09:00:00").unwrap(),
            action: Action::Login,
        };
        let json = serde_json::to_value(RecordRow::from(&event)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "person_id": "E100",
                "timestamp": "2024-03-10 09:00:00",
                "action": "LOGIN",
            })
        );
    }

    #[test]
    fn test_failures_hide_details() {
        let err = unavailable(DeskError::Store(clockface_core::StoreError::backend("disk full")));
        match err {
            zbus::fdo::Error::Failed(msg) => {
                assert_eq!(msg, RETRY_MESSAGE);
                assert!(!msg.contains("disk"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_corrupt_day_is_not_reported_as_retryable() {
        let err = unavailable(DeskError::Integrity(clockface_core::PolicyError::OutOfOrder {
            person_id: "E100".into(),
            actions: "LOGOUT".into(),
        }));
        match err {
            zbus::fdo::Error::Failed(msg) => {
                assert_eq!(msg, INTEGRITY_MESSAGE);
                assert!(msg.contains("contact HR"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
