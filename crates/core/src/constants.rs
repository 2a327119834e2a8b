//! Constants used throughout the VetTrack core crate.
//!
//! Path names, filenames and workflow defaults live here so the binaries and the core agree.

/// Default directory for clinic data when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "vetrack_data";

/// Directory name for patient records storage.
pub const PATIENTS_DIR_NAME: &str = "patients";

/// Filename for patient JSON files.
pub const PATIENT_JSON_FILENAME: &str = "patient.json";

/// Seconds a `Delay`-protected status change counts down before Apply is offered.
pub const DEFAULT_DELAY_SECONDS: u32 = 5;

/// Upper bound accepted for a configured countdown.
pub const MAX_DELAY_SECONDS: u32 = 60;

/// Base URL used to build owner tracking links when none is configured.
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000";

/// Path segment of the public tracking endpoint.
pub const TRACKING_PATH: &str = "track";
