//! clockface-remote — HTTP client for the face recognition gateway.
//!
//! The gateway fronts a managed recognition service and speaks its JSON
//! shapes (`FaceMatches`, `FaceDetails`, `Persons`, `FaceRecords`). Images
//! are posted as raw bytes; parameters travel in the query string.

pub mod client;
mod wire;

pub use client::{HttpBiometricClient, RemoteConfig};
