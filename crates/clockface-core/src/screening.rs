//! Screening rules applied to the recognition service's judgments.
//!
//! A scan passes face-cover screening, then quality screening, then
//! identification. Each rule maps a structured service response to either
//! a pass or a [`Rejection`].

use crate::biometric::{EquipmentPerson, FaceDetail, FaceMatch};
use crate::outcome::Rejection;

const FACE_BODY_PART: &str = "FACE";
const FACE_COVER: &str = "FACE_COVER";

/// Thresholds and switches for the verification pipeline.
#[derive(Debug, Clone)]
pub struct ScreeningPolicy {
    /// Minimum confidence (percent) for a face cover to reject the scan.
    pub face_cover_min_confidence: f32,
    /// Minimum sharpness (0–100) for the first detected face.
    pub min_sharpness: f32,
    /// Minimum similarity (percent) for an identification match.
    pub match_threshold: f32,
    pub check_face_cover: bool,
    pub check_quality: bool,
}

impl Default for ScreeningPolicy {
    fn default() -> Self {
        Self {
            face_cover_min_confidence: 80.0,
            min_sharpness: 60.0,
            match_threshold: 90.0,
            check_face_cover: true,
            check_quality: true,
        }
    }
}

impl ScreeningPolicy {
    /// Reject if any person has a face cover over their face at or above
    /// the confidence floor.
    pub fn judge_equipment(&self, persons: &[EquipmentPerson]) -> Result<(), Rejection> {
        let covered = persons
            .iter()
            .flat_map(|p| p.body_parts.iter())
            .filter(|part| part.name == FACE_BODY_PART)
            .flat_map(|part| part.equipment_detections.iter())
            .any(|d| {
                d.kind == FACE_COVER
                    && d.covers_body_part.value
                    && d.confidence >= self.face_cover_min_confidence
            });

        if covered {
            Err(Rejection::FaceCovered)
        } else {
            Ok(())
        }
    }

    /// Reject if no face was found or the first face is too blurry.
    ///
    /// Blur is the coarse spoof signal: a photo of a photo or a screen
    /// rarely reaches the sharpness floor.
    pub fn judge_quality(&self, faces: &[FaceDetail]) -> Result<(), Rejection> {
        let face = faces.first().ok_or(Rejection::NoFace)?;
        if face.quality.sharpness < self.min_sharpness {
            return Err(Rejection::LowQualityOrSpoof);
        }
        Ok(())
    }

    /// Pick the best candidate at or above the match threshold that carries
    /// a person id.
    pub fn best_match<'a>(&self, matches: &'a [FaceMatch]) -> Result<&'a FaceMatch, Rejection> {
        matches
            .iter()
            .filter(|m| m.similarity >= self.match_threshold && m.person_id().is_some())
            .max_by(|a, b| {
                a.similarity
                    .partial_cmp(&b.similarity)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .ok_or(Rejection::NotRecognized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biometric::{BodyPart, BoolAttribute, EquipmentDetection, FaceQuality, MatchedFace};

    fn person_with(part: &str, kind: &str, confidence: f32, covers: bool) -> EquipmentPerson {
        EquipmentPerson {
            confidence: 99.0,
            body_parts: vec![BodyPart {
                name: part.into(),
                confidence: 99.0,
                equipment_detections: vec![EquipmentDetection {
                    kind: kind.into(),
                    confidence,
                    covers_body_part: BoolAttribute { value: covers, confidence: 99.0 },
                }],
            }],
        }
    }

    fn face(sharpness: f32) -> FaceDetail {
        FaceDetail { confidence: 99.0, quality: FaceQuality { brightness: 70.0, sharpness } }
    }

    fn candidate(id: Option<&str>, similarity: f32) -> FaceMatch {
        FaceMatch {
            similarity,
            face: MatchedFace {
                face_id: format!("face-{similarity}"),
                external_image_id: id.map(String::from),
                confidence: 99.0,
            },
        }
    }

    #[test]
    fn test_mask_over_face_rejects() {
        let policy = ScreeningPolicy::default();
        let persons = vec![person_with("FACE", "FACE_COVER", 95.0, true)];
        assert_eq!(policy.judge_equipment(&persons), Err(Rejection::FaceCovered));
    }

    #[test]
    fn test_mask_below_floor_passes() {
        let policy = ScreeningPolicy::default();
        let persons = vec![person_with("FACE", "FACE_COVER", 79.9, true)];
        assert_eq!(policy.judge_equipment(&persons), Ok(()));
    }

    #[test]
    fn test_mask_not_covering_passes() {
        // Mask pulled down under the chin.
        let policy = ScreeningPolicy::default();
        let persons = vec![person_with("FACE", "FACE_COVER", 99.0, false)];
        assert_eq!(policy.judge_equipment(&persons), Ok(()));
    }

    #[test]
    fn test_other_equipment_ignored() {
        let policy = ScreeningPolicy::default();
        let persons = vec![
            person_with("HEAD", "HEAD_COVER", 99.0, true),
            person_with("LEFT_HAND", "FACE_COVER", 99.0, true),
        ];
        assert_eq!(policy.judge_equipment(&persons), Ok(()));
    }

    #[test]
    fn test_no_face_rejects() {
        let policy = ScreeningPolicy::default();
        assert_eq!(policy.judge_quality(&[]), Err(Rejection::NoFace));
    }

    #[test]
    fn test_blurry_face_rejects() {
        let policy = ScreeningPolicy::default();
        assert_eq!(policy.judge_quality(&[face(59.9)]), Err(Rejection::LowQualityOrSpoof));
        assert_eq!(policy.judge_quality(&[face(60.0)]), Ok(()));
    }

    #[test]
    fn test_only_first_face_is_judged() {
        let policy = ScreeningPolicy::default();
        assert_eq!(policy.judge_quality(&[face(20.0), face(95.0)]), Err(Rejection::LowQualityOrSpoof));
    }

    #[test]
    fn test_best_match_above_threshold() {
        let policy = ScreeningPolicy::default();
        let matches = vec![candidate(Some("E1"), 91.0), candidate(Some("E2"), 97.5)];
        let best = policy.best_match(&matches).unwrap();
        assert_eq!(best.person_id(), Some("E2"));
    }

    #[test]
    fn test_matches_below_threshold_are_not_recognized() {
        let policy = ScreeningPolicy::default();
        let matches = vec![candidate(Some("E1"), 89.9)];
        assert_eq!(policy.best_match(&matches).unwrap_err(), Rejection::NotRecognized);
        assert_eq!(policy.best_match(&[]).unwrap_err(), Rejection::NotRecognized);
    }

    #[test]
    fn test_match_without_person_id_is_skipped() {
        let policy = ScreeningPolicy::default();
        let matches = vec![candidate(None, 99.0), candidate(Some("E1"), 92.0)];
        assert_eq!(policy.best_match(&matches).unwrap().person_id(), Some("E1"));
    }
}
