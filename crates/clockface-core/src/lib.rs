//! clockface-core — Attendance decision engine and service contracts.
//!
//! Face detection, matching and quality scoring live behind the
//! [`BiometricService`] boundary. This crate owns the day-state policy,
//! the screening rules applied to the service's judgments, and the
//! storage contracts the daemon is wired against.

pub mod biometric;
pub mod clock;
pub mod outcome;
pub mod policy;
pub mod screening;
pub mod store;
pub mod types;

pub use biometric::{BiometricError, BiometricService};
pub use clock::{Clock, SystemClock};
pub use outcome::{DisplayProfile, EnrollOutcome, Rejection, ScanOutcome};
pub use policy::{DayState, Decision, PolicyError};
pub use screening::ScreeningPolicy;
pub use store::{EventStore, IdentityStore, StoreError};
pub use types::{Action, AttendanceEvent, Identity, Profile};
