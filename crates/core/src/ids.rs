//! Patient identifiers, sharded paths and public tracking tokens.
//!
//! Patient records are stored under sharded directories derived from a canonical UUID:
//! **32 lowercase hexadecimal characters**, no hyphens. For an id `u` the record lives at
//! `parent_dir/<u[0..2]>/<u[2..4]>/<u>/`, which keeps directory fan-out small.
//!
//! Tracking tokens are the secret part of an owner's public link. They are deliberately
//! unrelated to the patient id so a link cannot be guessed from a record path.

use crate::{TrackerError, TrackerResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Canonical patient identifier.
///
/// Once constructed the contained value is guaranteed canonical, so path derivation never
/// needs to re-validate.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PatientId(String);

impl PatientId {
    /// Allocates a fresh identifier for a new patient.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Validates an externally supplied identifier.
    ///
    /// Hyphenated or uppercase forms are rejected rather than normalised.
    pub fn parse(input: &str) -> TrackerResult<Self> {
        if Self::is_canonical(input) {
            return Ok(Self(input.to_string()));
        }
        Err(TrackerError::InvalidInput(format!(
            "patient id must be 32 lowercase hex characters without hyphens, got: '{input}'"
        )))
    }

    fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory holding this patient's record under `parent_dir`.
    pub fn sharded_dir(&self, parent_dir: &Path) -> PathBuf {
        parent_dir
            .join(&self.0[0..2])
            .join(&self.0[2..4])
            .join(&self.0)
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PatientId {
    type Error = TrackerError;

    fn try_from(value: String) -> TrackerResult<Self> {
        Self::parse(&value)
    }
}

impl From<PatientId> for String {
    fn from(value: PatientId) -> Self {
        value.0
    }
}

/// Secret token embedded in an owner's tracking link.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TrackingToken(String);

impl TrackingToken {
    const MIN_LEN: usize = 16;
    const MAX_LEN: usize = 64;

    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Validates a token taken from a URL path.
    pub fn parse(input: &str) -> TrackerResult<Self> {
        let len_ok = (Self::MIN_LEN..=Self::MAX_LEN).contains(&input.len());
        if len_ok && input.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Ok(Self(input.to_string()));
        }
        Err(TrackerError::InvalidInput(
            "tracking token must be 16-64 ASCII letters or digits".into(),
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compares two tokens without exiting early on the first differing byte.
    pub fn matches(&self, other: &TrackingToken) -> bool {
        let (a, b) = (self.0.as_bytes(), other.0.as_bytes());
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
    }
}

impl fmt::Display for TrackingToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TrackingToken {
    type Error = TrackerError;

    fn try_from(value: String) -> TrackerResult<Self> {
        Self::parse(&value)
    }
}

impl From<TrackingToken> for String {
    fn from(value: TrackingToken) -> Self {
        value.0
    }
}
