//! Contract for the external face recognition service.
//!
//! The service is the only source of identity truth: detection, matching,
//! quality scoring and protective-equipment detection all happen remotely.
//! Response types keep the service's PascalCase field names so they can be
//! decoded straight off the wire.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Transport or service failure. Never used for business outcomes such as
/// "no match" or "no face"; those come back as empty result lists.
#[derive(Error, Debug)]
pub enum BiometricError {
    #[error("{op}: request timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },
    #[error("{op}: transport error: {message}")]
    Transport { op: &'static str, message: String },
    #[error("{op}: service returned {status}: {body}")]
    Service {
        op: &'static str,
        status: u16,
        body: String,
    },
    #[error("{op}: malformed response: {message}")]
    Decode { op: &'static str, message: String },
}

impl BiometricError {
    /// Name of the service operation that failed.
    pub fn op(&self) -> &'static str {
        match self {
            BiometricError::Timeout { op, .. }
            | BiometricError::Transport { op, .. }
            | BiometricError::Service { op, .. }
            | BiometricError::Decode { op, .. } => op,
        }
    }
}

/// `{ "Value": bool, "Confidence": f32 }` attribute.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BoolAttribute {
    pub value: bool,
    #[serde(default)]
    pub confidence: f32,
}

/// One item of protective equipment found on a body part.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EquipmentDetection {
    /// `FACE_COVER`, `HAND_COVER` or `HEAD_COVER`.
    #[serde(rename = "Type")]
    pub kind: String,
    pub confidence: f32,
    #[serde(default)]
    pub covers_body_part: BoolAttribute,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BodyPart {
    /// `FACE`, `HEAD`, `LEFT_HAND` or `RIGHT_HAND`.
    pub name: String,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub equipment_detections: Vec<EquipmentDetection>,
}

/// A person found by protective-equipment detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EquipmentPerson {
    #[serde(default)]
    pub body_parts: Vec<BodyPart>,
    #[serde(default)]
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FaceQuality {
    pub brightness: f32,
    pub sharpness: f32,
}

/// A detected face with its image quality judgment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FaceDetail {
    #[serde(default)]
    pub confidence: f32,
    pub quality: FaceQuality,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MatchedFace {
    pub face_id: String,
    /// The person id the template was enrolled under.
    pub external_image_id: Option<String>,
    #[serde(default)]
    pub confidence: f32,
}

/// One identification candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FaceMatch {
    /// Similarity percentage, 0–100.
    pub similarity: f32,
    pub face: MatchedFace,
}

impl FaceMatch {
    pub fn person_id(&self) -> Option<&str> {
        self.face.external_image_id.as_deref()
    }
}

/// A face template created by enrollment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IndexedFace {
    pub face_id: String,
    pub external_image_id: Option<String>,
    #[serde(default)]
    pub confidence: f32,
}

/// The external recognition service, scoped to one face collection.
///
/// Every operation may fail with a [`BiometricError`]. An image with no
/// usable face is not an error: `assess_face_quality` returns no faces,
/// `identify` returns no matches and `enroll` returns no records.
pub trait BiometricService: Send + Sync {
    /// Detect protective equipment, asking the service to drop detections
    /// below `min_confidence` percent.
    fn detect_protective_equipment(
        &self,
        image: &[u8],
        min_confidence: f32,
    ) -> impl Future<Output = Result<Vec<EquipmentPerson>, BiometricError>> + Send;

    /// Detect faces and report their quality.
    fn assess_face_quality(
        &self,
        image: &[u8],
    ) -> impl Future<Output = Result<Vec<FaceDetail>, BiometricError>> + Send;

    /// Search the collection for the face in `image`, returning candidates at
    /// or above `threshold` percent similarity, best first.
    fn identify(
        &self,
        image: &[u8],
        threshold: f32,
    ) -> impl Future<Output = Result<Vec<FaceMatch>, BiometricError>> + Send;

    /// Index the single most prominent face in `image` under `person_id`.
    fn enroll(
        &self,
        image: &[u8],
        person_id: &str,
    ) -> impl Future<Output = Result<Vec<IndexedFace>, BiometricError>> + Send;

    /// Delete the face template created by a failed enrollment.
    fn rollback_enrollment(
        &self,
        face_id: &str,
    ) -> impl Future<Output = Result<(), BiometricError>> + Send;
}
