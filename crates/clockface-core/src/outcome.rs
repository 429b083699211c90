//! Business outcomes of the scan and enroll workflows.
//!
//! Outcomes are values, including rejections. Transport failures are
//! reported separately as errors and never take one of these shapes.

use crate::types::{AttendanceEvent, Identity, Profile};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Expected, user-facing reason a request did not change any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    FaceCovered,
    NoFace,
    LowQualityOrSpoof,
    NotRecognized,
    DuplicateId,
    InvalidId,
    DuplicateScan,
}

impl Rejection {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::FaceCovered => "face_covered",
            Rejection::NoFace => "no_face",
            Rejection::LowQualityOrSpoof => "low_quality_or_spoof",
            Rejection::NotRecognized => "not_recognized",
            Rejection::DuplicateId => "duplicate_id",
            Rejection::InvalidId => "invalid_id",
            Rejection::DuplicateScan => "duplicate_scan",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Rejection::FaceCovered => "Please remove your face covering to mark attendance.",
            Rejection::NoFace => "No face detected. Please face the camera clearly.",
            Rejection::LowQualityOrSpoof => {
                "Spoof detected or low quality. Please use a live camera."
            }
            Rejection::NotRecognized => "Identity not recognized. Please contact HR.",
            Rejection::DuplicateId => "Person id is already registered.",
            Rejection::InvalidId => "Person id must not be empty.",
            Rejection::DuplicateScan => "Scan already recorded. Please wait a moment.",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Name and location shown on the terminal after a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayProfile {
    pub name: String,
    pub city: String,
    pub state: String,
}

impl DisplayProfile {
    /// Build from an identity lookup. A recognized face with no profile row
    /// still gets a greeting.
    pub fn from_identity(identity: Option<&Identity>) -> Self {
        let fallback = Profile::default();
        let profile = identity.map(|i| &i.profile).unwrap_or(&fallback);
        Self {
            name: profile.display_name().to_string(),
            city: profile.city.clone(),
            state: profile.state.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScanOutcome {
    /// A LOGIN or LOGOUT event was written.
    Recorded {
        event: AttendanceEvent,
        profile: DisplayProfile,
        similarity: f32,
        message: String,
    },
    /// The person already logged in and out today; nothing was written.
    AlreadyComplete {
        person_id: String,
        profile: DisplayProfile,
        similarity: f32,
        message: String,
    },
    Rejected { reason: Rejection, message: String },
}

impl ScanOutcome {
    pub fn recorded(event: AttendanceEvent, profile: DisplayProfile, similarity: f32) -> Self {
        let place = if profile.city.is_empty() {
            String::new()
        } else {
            format!(" from {}", profile.city)
        };
        let message = format!("{} successful: Hello {}{place}!", event.action, profile.name);
        ScanOutcome::Recorded { event, profile, similarity, message }
    }

    pub fn already_complete(person_id: &str, profile: DisplayProfile, similarity: f32) -> Self {
        let message = format!(
            "Hello {}, you have already finished your shift today.",
            profile.name
        );
        ScanOutcome::AlreadyComplete {
            person_id: person_id.to_string(),
            profile,
            similarity,
            message,
        }
    }

    pub fn rejected(reason: Rejection) -> Self {
        ScanOutcome::Rejected { reason, message: reason.message().to_string() }
    }

    pub fn message(&self) -> &str {
        match self {
            ScanOutcome::Recorded { message, .. }
            | ScanOutcome::AlreadyComplete { message, .. }
            | ScanOutcome::Rejected { message, .. } => message,
        }
    }

    /// The written event, if any.
    pub fn event(&self) -> Option<&AttendanceEvent> {
        match self {
            ScanOutcome::Recorded { event, .. } => Some(event),
            _ => None,
        }
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            ScanOutcome::Rejected { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EnrollOutcome {
    Enrolled {
        person_id: String,
        face_id: String,
        message: String,
    },
    Rejected { reason: Rejection, message: String },
}

impl EnrollOutcome {
    pub fn enrolled(person_id: &str, face_id: &str, profile: &Profile) -> Self {
        EnrollOutcome::Enrolled {
            person_id: person_id.to_string(),
            face_id: face_id.to_string(),
            message: format!("Success! {} is now registered.", profile.display_name()),
        }
    }

    pub fn rejected(reason: Rejection) -> Self {
        let message = match reason {
            Rejection::NoFace => {
                "Face not detected clearly. Please ensure your face is visible and well-lit."
            }
            other => other.message(),
        };
        EnrollOutcome::Rejected { reason, message: message.to_string() }
    }

    pub fn message(&self) -> &str {
        match self {
            EnrollOutcome::Enrolled { message, .. } | EnrollOutcome::Rejected { message, .. } => {
                message
            }
        }
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            EnrollOutcome::Rejected { reason, .. } => Some(*reason),
            EnrollOutcome::Enrolled { .. } => None,
        }
    }
}
