//! # VetTrack Core
//!
//! Core logic for the VetTrack veterinary patient-tracking system.
//!
//! This crate contains:
//! - The status registry and the protection policy resolver
//! - The status change protection dialog and its driver task
//! - Patient records with a status timeline, stored as sharded JSON files
//!
//! **No API concerns**: HTTP servers and terminal rendering belong in the `vetrack-run` and
//! `vetrack-cli` binaries.

pub mod config;
pub mod constants;
pub mod dialog;
pub mod error;
pub mod ids;
pub mod patient;
pub mod protection;
pub mod status;
pub mod workflow;

pub use config::CoreConfig;
pub use dialog::{
    DialogAction, DialogDriver, DialogError, DialogHandle, DialogSnapshot, DialogState,
    OpenOutcome, ProtectionDialog, StatusChangeRequest,
};
pub use error::{TrackerError, TrackerResult};
pub use ids::{PatientId, TrackingToken};
pub use patient::{Patient, PatientService, StatusCommitter, TimelineEntry};
pub use protection::ProtectionPolicyResolver;
pub use status::{
    configured_registry, FileStatusRegistry, ProtectionLevel, StaticStatusRegistry,
    StatusDefinition, StatusRegistry,
};
pub use workflow::{ChangeOutcome, PendingChange, StatusChangeWorkflow};
