//! Core runtime configuration.
//!
//! This module defines configuration that is resolved once at process startup and then passed
//! into core services. Binaries read environment variables; the core never does, so handlers and
//! tests see a consistent view regardless of what the process environment does later.

use crate::constants::{
    DEFAULT_DATA_DIR, DEFAULT_DELAY_SECONDS, DEFAULT_PUBLIC_BASE_URL, MAX_DELAY_SECONDS,
    PATIENTS_DIR_NAME, TRACKING_PATH,
};
use crate::ids::TrackingToken;
use crate::{TrackerError, TrackerResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    status_file: Option<PathBuf>,
    delay_seconds: u32,
    public_base_url: String,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::InvalidInput`] if `delay_seconds` is outside `1..=60` or the
    /// public base URL is blank.
    pub fn new(
        data_dir: PathBuf,
        status_file: Option<PathBuf>,
        delay_seconds: u32,
        public_base_url: String,
    ) -> TrackerResult<Self> {
        if !(1..=MAX_DELAY_SECONDS).contains(&delay_seconds) {
            return Err(TrackerError::InvalidInput(format!(
                "delay_seconds must be between 1 and {MAX_DELAY_SECONDS}, got {delay_seconds}"
            )));
        }

        let public_base_url = public_base_url.trim().trim_end_matches('/').to_string();
        if public_base_url.is_empty() {
            return Err(TrackerError::InvalidInput(
                "public_base_url cannot be empty".into(),
            ));
        }

        Ok(Self {
            data_dir,
            status_file,
            delay_seconds,
            public_base_url,
        })
    }

    /// Build a config from raw environment values without reading the environment itself.
    ///
    /// Blank values count as unset.
    pub fn from_env_values(
        data_dir: Option<String>,
        status_file: Option<String>,
        delay_seconds: Option<String>,
        public_base_url: Option<String>,
    ) -> TrackerResult<Self> {
        let non_blank = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let data_dir = non_blank(data_dir).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
        let status_file = non_blank(status_file).map(PathBuf::from);

        Self::new(
            PathBuf::from(data_dir),
            status_file,
            delay_seconds_from_env_value(delay_seconds)?,
            public_base_url_from_env_value(public_base_url),
        )
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn patients_dir(&self) -> PathBuf {
        self.data_dir.join(PATIENTS_DIR_NAME)
    }

    pub fn status_file(&self) -> Option<&Path> {
        self.status_file.as_deref()
    }

    pub fn delay_seconds(&self) -> u32 {
        self.delay_seconds
    }

    pub fn public_base_url(&self) -> &str {
        &self.public_base_url
    }

    /// Public link an owner can open to follow a patient's timeline.
    pub fn tracking_url(&self, token: &TrackingToken) -> String {
        format!("{}/{TRACKING_PATH}/{token}", self.public_base_url)
    }
}

/// Parse the countdown length from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_DELAY_SECONDS`].
pub fn delay_seconds_from_env_value(value: Option<String>) -> TrackerResult<u32> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(DEFAULT_DELAY_SECONDS),
        Some(v) => v.parse::<u32>().map_err(|_| {
            TrackerError::InvalidInput(format!(
                "VETRACK_DELAY_SECONDS must be a whole number of seconds, got '{v}'"
            ))
        }),
    }
}

/// Parse the public base URL from an optional string value, falling back to the default.
pub fn public_base_url_from_env_value(value: Option<String>) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string())
}
