//! Patient records and their status timeline.
//!
//! Each patient is a single JSON document stored in a sharded directory:
//!
//! ```text
//! patients/
//!   <s1>/
//!     <s2>/
//!       <id>/
//!         patient.json
//! ```
//!
//! where `s1` and `s2` are the first four hex characters of the patient id. Every status change
//! appends to the record's timeline, which is what an owner sees through the public tracking
//! link.
//!
//! ## Pure Data Operations
//!
//! This module contains **only** data operations. The protection workflow reaches it through
//! [`StatusCommitter`], and only from a confirmed request.

use crate::config::CoreConfig;
use crate::constants::PATIENT_JSON_FILENAME;
use crate::ids::{PatientId, TrackingToken};
use crate::status::StatusRegistry;
use crate::{TrackerError, TrackerResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One entry in a patient's status history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub status: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: PatientId,
    pub name: String,
    pub species: String,
    pub owner_name: String,
    pub status: String,
    pub tracking_token: TrackingToken,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub timeline: Vec<TimelineEntry>,
}

/// Persists a confirmed status change.
///
/// The protection workflow never calls this directly; callers invoke it from the `on_confirm`
/// callback they hand to the dialog.
pub trait StatusCommitter: Send + Sync {
    fn commit(&self, patient_id: &PatientId, new_status: &str) -> TrackerResult<Patient>;
}

/// File-backed patient store.
#[derive(Clone)]
pub struct PatientService {
    cfg: Arc<CoreConfig>,
    registry: Arc<dyn StatusRegistry>,
}

impl PatientService {
    pub fn new(cfg: Arc<CoreConfig>, registry: Arc<dyn StatusRegistry>) -> Self {
        Self { cfg, registry }
    }

    /// Registers a new patient.
    ///
    /// When `initial_status` is `None` the first status in the registry is used.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError` if:
    /// - any of the name fields is blank,
    /// - the initial status is not in the registry, or the registry is empty,
    /// - the record cannot be written.
    pub fn create(
        &self,
        name: &str,
        species: &str,
        owner_name: &str,
        initial_status: Option<&str>,
    ) -> TrackerResult<Patient> {
        let name = required("name", name)?;
        let species = required("species", species)?;
        let owner_name = required("owner_name", owner_name)?;

        let statuses = self.registry.statuses()?;
        let status = match initial_status {
            Some(requested) => statuses
                .iter()
                .find(|s| s.name == requested)
                .ok_or_else(|| TrackerError::UnknownStatus(requested.to_string()))?,
            None => statuses.first().ok_or_else(|| {
                TrackerError::InvalidInput("status registry has no statuses".into())
            })?,
        };

        let now = Utc::now();
        let patient = Patient {
            id: PatientId::generate(),
            name,
            species,
            owner_name,
            status: status.name.clone(),
            tracking_token: TrackingToken::generate(),
            created_at: now,
            updated_at: now,
            timeline: vec![TimelineEntry {
                status: status.name.clone(),
                recorded_at: now,
            }],
        };

        let patient_dir = patient.id.sharded_dir(&self.cfg.patients_dir());
        fs::create_dir_all(&patient_dir).map_err(TrackerError::PatientDirCreation)?;
        write_patient(&patient_dir, &patient)?;

        tracing::info!(patient_id = %patient.id, status = %patient.status, "registered patient");
        Ok(patient)
    }

    pub fn get(&self, id: &PatientId) -> TrackerResult<Patient> {
        let path = self.patient_file(id);
        let contents = fs::read_to_string(&path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => TrackerError::PatientNotFound(id.to_string()),
            _ => TrackerError::FileRead(err),
        })?;
        serde_json::from_str(&contents).map_err(TrackerError::Deserialization)
    }

    /// Lists every readable patient, oldest first.
    ///
    /// Records that cannot be parsed are logged and skipped.
    pub fn list(&self) -> Vec<Patient> {
        let mut patients: Vec<Patient> = patient_files(&self.cfg.patients_dir())
            .iter()
            .filter_map(|path| read_patient_file(path))
            .collect();

        patients.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        patients
    }

    /// Finds the patient an owner's tracking link points at.
    ///
    /// Stops at the first match. Tokens are compared in constant time.
    pub fn find_by_tracking_token(&self, token: &TrackingToken) -> Option<Patient> {
        patient_files(&self.cfg.patients_dir())
            .iter()
            .filter_map(|path| read_patient_file(path))
            .find(|patient| patient.tracking_token.matches(token))
    }

    fn patient_file(&self, id: &PatientId) -> PathBuf {
        id.sharded_dir(&self.cfg.patients_dir())
            .join(PATIENT_JSON_FILENAME)
    }
}

impl StatusCommitter for PatientService {
    /// Records `new_status` on the patient and appends it to the timeline.
    ///
    /// Re-committing the current status is a no-op. Statuses missing from the registry are
    /// rejected; if the registry itself cannot be read the change is allowed, matching the
    /// fail-open protection policy.
    fn commit(&self, patient_id: &PatientId, new_status: &str) -> TrackerResult<Patient> {
        match self.registry.find(new_status) {
            Ok(Some(_)) => {}
            Ok(None) => return Err(TrackerError::UnknownStatus(new_status.to_string())),
            Err(err) => {
                tracing::warn!(
                    status = new_status,
                    error = %err,
                    "status registry unavailable, committing unchecked"
                );
            }
        }

        let mut patient = self.get(patient_id)?;
        if patient.status == new_status {
            tracing::debug!(patient_id = %patient_id, status = new_status, "status unchanged");
            return Ok(patient);
        }

        let now = Utc::now();
        let previous = std::mem::replace(&mut patient.status, new_status.to_string());
        patient.updated_at = now;
        patient.timeline.push(TimelineEntry {
            status: new_status.to_string(),
            recorded_at: now,
        });

        let patient_dir = patient_id.sharded_dir(&self.cfg.patients_dir());
        write_patient(&patient_dir, &patient)?;

        tracing::info!(
            patient_id = %patient_id,
            from = %previous,
            to = new_status,
            "patient status updated"
        );
        Ok(patient)
    }
}

fn required(field: &str, value: &str) -> TrackerResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(TrackerError::InvalidInput(format!("{field} is required")));
    }
    Ok(value.to_string())
}

/// Writes via a temporary file and rename so readers never see a partial record.
fn write_patient(patient_dir: &Path, patient: &Patient) -> TrackerResult<()> {
    let json = serde_json::to_string_pretty(patient).map_err(TrackerError::Serialization)?;
    let tmp_path = patient_dir.join(format!("{PATIENT_JSON_FILENAME}.tmp"));
    fs::write(&tmp_path, json).map_err(TrackerError::FileWrite)?;
    fs::rename(&tmp_path, patient_dir.join(PATIENT_JSON_FILENAME)).map_err(TrackerError::FileWrite)
}

/// Walks `<root>/<s1>/<s2>/<id>/patient.json`, ignoring anything that does not fit the layout.
/// Reads one record, logging and skipping it if it is unreadable.
fn read_patient_file(path: &Path) -> Option<Patient> {
    let parsed = fs::read_to_string(path)
        .map_err(TrackerError::FileRead)
        .and_then(|contents| {
            serde_json::from_str::<Patient>(&contents).map_err(TrackerError::Deserialization)
        });
    match parsed {
        Ok(patient) => Some(patient),
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "skipping unreadable patient record"
            );
            None
        }
    }
}

fn patient_files(root: &Path) -> Vec<PathBuf> {
    fn subdirs(path: &Path) -> Vec<PathBuf> {
        match fs::read_dir(path) {
            Ok(entries) => entries
                .flatten()
                .map(|entry| entry.path())
                .filter(|p| p.is_dir())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    let mut files = Vec::new();
    for s1 in subdirs(root) {
        for s2 in subdirs(&s1) {
            for id_dir in subdirs(&s2) {
                let file = id_dir.join(PATIENT_JSON_FILENAME);
                if file.is_file() {
                    files.push(file);
                }
            }
        }
    }
    files
}
