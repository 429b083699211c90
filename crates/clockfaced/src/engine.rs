//! The attendance desk: screening, identification and the day-state policy,
//! sequenced against injected service clients.
//!
//! Business rejections come back as `Ok` outcomes. Anything returned as
//! `Err(DeskError)` is a transport or integrity failure and has written
//! nothing that breaks the per-day invariant.

use crate::locks::IdentityLocks;
use clockface_core::biometric::{BiometricError, BiometricService};
use clockface_core::policy::{self, Decision, PolicyError};
use clockface_core::store::{EventStore, IdentityStore, StoreError};
use clockface_core::{
    AttendanceEvent, Clock, DisplayProfile, EnrollOutcome, Identity, Profile, Rejection,
    ScanOutcome, ScreeningPolicy,
};
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DeskError {
    #[error("recognition service: {0}")]
    Biometric(#[from] BiometricError),
    #[error("attendance store: {0}")]
    Store(#[from] StoreError),
    #[error("attendance log integrity: {0}")]
    Integrity(#[from] PolicyError),
}

/// Result of a pipeline stage: continue with `T`, or stop with a rejection.
type Stage<T> = Result<T, Rejection>;

/// A recognized person and the match similarity.
struct Identified {
    person_id: String,
    similarity: f32,
}

/// Runs the scan and enroll workflows.
pub struct AttendanceDesk<B, S, C> {
    biometric: B,
    store: S,
    clock: C,
    policy: ScreeningPolicy,
    locks: IdentityLocks,
}

impl<B, S, C> AttendanceDesk<B, S, C>
where
    B: BiometricService,
    S: IdentityStore + EventStore,
    C: Clock,
{
    pub fn new(biometric: B, store: S, clock: C, policy: ScreeningPolicy) -> Self {
        Self {
            biometric,
            store,
            clock,
            policy,
            locks: IdentityLocks::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> &ScreeningPolicy {
        &self.policy
    }

    /// Mark attendance for whoever is in `image`.
    pub async fn scan(&self, image: &[u8]) -> Result<ScanOutcome, DeskError> {
        let scan_id = Uuid::new_v4();
        let span = tracing::info_span!("scan", %scan_id, bytes = image.len());
        async {
            let mut person_id: Option<String> = None;
            let result = self.run_scan(image, &mut person_id).await;
            match &result {
                Ok(outcome) => tracing::info!(
                    person_id = person_id.as_deref().unwrap_or("-"),
                    message = outcome.message(),
                    "scan finished"
                ),
                Err(err) => tracing::error!(
                    op = "scan",
                    person_id = person_id.as_deref().unwrap_or("-"),
                    error = %err,
                    "scan failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_scan(
        &self,
        image: &[u8],
        person_id: &mut Option<String>,
    ) -> Result<ScanOutcome, DeskError> {
        if let Err(reason) = self.screen(image).await? {
            tracing::info!(reason = %reason, "scan rejected by screening");
            return Ok(ScanOutcome::rejected(reason));
        }

        let identified = match self.identify(image).await? {
            Ok(identified) => identified,
            Err(reason) => {
                tracing::info!(reason = %reason, "scan rejected by identification");
                return Ok(ScanOutcome::rejected(reason));
            }
        };
        *person_id = Some(identified.person_id.clone());

        self.record(&identified).await
    }

    /// Face-cover then quality screening. Either stage may be switched off.
    async fn screen(&self, image: &[u8]) -> Result<Stage<()>, DeskError> {
        if self.policy.check_face_cover {
            let persons = self
                .biometric
                .detect_protective_equipment(image, self.policy.face_cover_min_confidence)
                .await?;
            if let Err(reason) = self.policy.judge_equipment(&persons) {
                return Ok(Err(reason));
            }
        }

        if self.policy.check_quality {
            let faces = self.biometric.assess_face_quality(image).await?;
            tracing::debug!(
                faces = faces.len(),
                sharpness = faces.first().map(|f| f.quality.sharpness),
                "quality assessed"
            );
            if let Err(reason) = self.policy.judge_quality(&faces) {
                return Ok(Err(reason));
            }
        }

        Ok(Ok(()))
    }

    async fn identify(&self, image: &[u8]) -> Result<Stage<Identified>, DeskError> {
        let matches = self
            .biometric
            .identify(image, self.policy.match_threshold)
            .await?;

        Ok(self.policy.best_match(&matches).map(|best| {
            let person_id = best.person_id().unwrap_or_default().to_string();
            tracing::debug!(person_id = %person_id, similarity = best.similarity, "face matched");
            Identified {
                person_id,
                similarity: best.similarity,
            }
        }))
    }

    /// Read today's window, decide and write, all under the person's lock.
    async fn record(&self, who: &Identified) -> Result<ScanOutcome, DeskError> {
        let person_id = who.person_id.as_str();
        let _guard = self.locks.lock(person_id).await;

        let now = self.clock.now();
        let today = self.store.events_on(person_id, now.date()).await?;
        let identity = self.store.get_identity(person_id).await?;
        let profile = DisplayProfile::from_identity(identity.as_ref());
        if identity.is_none() {
            tracing::warn!(person_id, "recognized face has no profile");
        }

        match policy::decide(person_id, &today, now)? {
            Decision::Record {
                event,
                expected_prior,
            } => {
                self.store.append_event(&event, expected_prior).await?;
                tracing::info!(
                    person_id,
                    action = %event.action,
                    timestamp = %event.timestamp,
                    similarity = who.similarity,
                    "attendance recorded"
                );
                Ok(ScanOutcome::recorded(event, profile, who.similarity))
            }
            Decision::AlreadyComplete => Ok(ScanOutcome::already_complete(
                person_id,
                profile,
                who.similarity,
            )),
            Decision::TooSoon => Ok(ScanOutcome::rejected(Rejection::DuplicateScan)),
        }
    }

    /// Register a profile and a face template as one unit.
    ///
    /// The profile is written first; if the template cannot be created the
    /// profile is removed again.
    pub async fn enroll(
        &self,
        person_id: &str,
        profile: Profile,
        image: &[u8],
    ) -> Result<EnrollOutcome, DeskError> {
        let person_id = person_id.trim();
        if person_id.is_empty() {
            return Ok(EnrollOutcome::rejected(Rejection::InvalidId));
        }

        let span = tracing::info_span!("enroll", person_id, bytes = image.len());
        async {
            let result = self.run_enroll(person_id, profile, image).await;
            match &result {
                Ok(outcome) => tracing::info!(message = outcome.message(), "enroll finished"),
                Err(err) => tracing::error!(op = "enroll", person_id, error = %err, "enroll failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_enroll(
        &self,
        person_id: &str,
        profile: Profile,
        image: &[u8],
    ) -> Result<EnrollOutcome, DeskError> {
        let _guard = self.locks.lock(person_id).await;

        if self.store.get_identity(person_id).await?.is_some() {
            return Ok(EnrollOutcome::rejected(Rejection::DuplicateId));
        }

        let identity = Identity {
            person_id: person_id.to_string(),
            profile,
            face_id: None,
            created_at: self.clock.now(),
        };
        match self.store.insert_identity(&identity).await {
            Ok(()) => {}
            Err(StoreError::AlreadyExists(_)) => {
                return Ok(EnrollOutcome::rejected(Rejection::DuplicateId))
            }
            Err(err) => return Err(err.into()),
        }

        let faces = match self.biometric.enroll(image, person_id).await {
            Ok(faces) => faces,
            Err(err) => {
                self.undo_profile(person_id).await;
                return Err(err.into());
            }
        };

        let Some(face) = faces.first() else {
            self.undo_profile(person_id).await;
            return Ok(EnrollOutcome::rejected(Rejection::NoFace));
        };

        if let Err(err) = self.store.set_face_id(person_id, &face.face_id).await {
            self.undo_face(person_id, &face.face_id).await;
            self.undo_profile(person_id).await;
            return Err(err.into());
        }

        Ok(EnrollOutcome::enrolled(
            person_id,
            &face.face_id,
            &identity.profile,
        ))
    }

    async fn undo_profile(&self, person_id: &str) {
        match self.store.remove_identity(person_id).await {
            Ok(_) => tracing::info!(person_id, "enrollment rolled back: profile removed"),
            Err(err) => tracing::error!(
                op = "enroll_rollback",
                person_id,
                error = %err,
                "could not remove profile after failed enrollment"
            ),
        }
    }

    async fn undo_face(&self, person_id: &str, face_id: &str) {
        match self.biometric.rollback_enrollment(face_id).await {
            Ok(()) => tracing::info!(person_id, face_id, "enrollment rolled back: face removed"),
            Err(err) => tracing::error!(
                op = "enroll_rollback",
                person_id,
                face_id,
                error = %err,
                "could not remove face template after failed enrollment"
            ),
        }
    }

    /// Every attendance event, newest first.
    pub async fn records(&self) -> Result<Vec<AttendanceEvent>, DeskError> {
        Ok(self.store.all_events().await?)
    }

    pub async fn identity(&self, person_id: &str) -> Result<Option<Identity>, DeskError> {
        Ok(self.store.get_identity(person_id.trim()).await?)
    }
}
