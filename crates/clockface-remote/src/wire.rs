//! Response envelopes returned by the gateway.

use clockface_core::biometric::{EquipmentPerson, FaceDetail, FaceMatch, IndexedFace};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct DetectProtectiveEquipmentResponse {
    #[serde(default)]
    pub persons: Vec<EquipmentPerson>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct DetectFacesResponse {
    #[serde(default)]
    pub face_details: Vec<FaceDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct SearchFacesByImageResponse {
    #[serde(default)]
    pub face_matches: Vec<FaceMatch>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct FaceRecord {
    pub face: IndexedFace,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct IndexFacesResponse {
    #[serde(default)]
    pub face_records: Vec<FaceRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct DeleteFacesRequest<'a> {
    pub face_ids: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct DeleteFacesResponse {
    #[serde(default)]
    pub deleted_faces: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ppe_response() {
        let raw = r#"{
            "ProtectiveEquipmentModelVersion": "1.0",
            "Persons": [{
                "Id": 0,
                "Confidence": 99.1,
                "BodyParts": [{
                    "Name": "FACE",
                    "Confidence": 99.5,
                    "EquipmentDetections": [{
                        "Type": "FACE_COVER",
                        "Confidence": 98.7,
                        "CoversBodyPart": { "Value": true, "Confidence": 99.0 }
                    }]
                }]
            }]
        }"#;
        let resp: DetectProtectiveEquipmentResponse = serde_json::from_str(raw).unwrap();
        let detection = &resp.persons[0].body_parts[0].equipment_detections[0];
        assert_eq!(detection.kind, "FACE_COVER");
        assert!(detection.covers_body_part.value);
    }

    #[test]
    fn test_decode_detect_faces_without_faces() {
        let resp: DetectFacesResponse = serde_json::from_str(r#"{ "FaceDetails": [] }"#).unwrap();
        assert!(resp.face_details.is_empty());
        let resp: DetectFacesResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.face_details.is_empty());
    }

    #[test]
    fn test_decode_detect_faces_quality() {
        let raw = r#"{ "FaceDetails": [{
            "Confidence": 99.9,
            "Quality": { "Brightness": 81.2, "Sharpness": 53.3 },
            "BoundingBox": { "Width": 0.4, "Height": 0.5, "Left": 0.3, "Top": 0.2 }
        }] }"#;
        let resp: DetectFacesResponse = serde_json::from_str(raw).unwrap();
        assert!((resp.face_details[0].quality.sharpness - 53.3).abs() < 1e-4);
    }

    #[test]
    fn test_decode_index_faces() {
        let raw = r#"{
            "FaceModelVersion": "7.0",
            "FaceRecords": [{
                "Face": { "FaceId": "8f6c", "ExternalImageId": "E100", "Confidence": 99.98, "ImageId": "x" },
                "FaceDetail": { "Confidence": 99.98 }
            }],
            "UnindexedFaces": []
        }"#;
        let resp: IndexFacesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.face_records[0].face.face_id, "8f6c");
        assert_eq!(resp.face_records[0].face.external_image_id.as_deref(), Some("E100"));
    }

    #[test]
    fn test_encode_delete_request() {
        let body = serde_json::to_string(&DeleteFacesRequest { face_ids: ["8f6c"] }).unwrap();
        assert_eq!(body, r#"{"FaceIds":["8f6c"]}"#);
    }
}
