//! Status definitions and the registries that supply them.
//!
//! The registry is the source of truth for which statuses exist and which protection level
//! gates each of them. The workflow only ever reads from it.
//!
//! Two sources are provided:
//! - [`StaticStatusRegistry`]: an in-memory list, including the clinic's built-in defaults
//! - [`FileStatusRegistry`]: a YAML file re-read on every lookup, so edits take effect without
//!   a restart
//!
//! The YAML form is strict: unknown keys are rejected and the failing path is reported.
//!
//! ```yaml
//! statuses:
//!   - name: In Surgery
//!     protection_level: delay
//!     description: Patient is in theatre
//! ```

use crate::{TrackerError, TrackerResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Confirmation ritual required before a patient can be moved to a status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionLevel {
    /// Change applies immediately.
    #[default]
    None,
    /// A single confirm/cancel prompt.
    Confirmation,
    /// A countdown must elapse before Apply is offered.
    Delay,
    /// Two successive prompts, the second starker than the first.
    DoubleConfirm,
}

impl ProtectionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtectionLevel::None => "none",
            ProtectionLevel::Confirmation => "confirmation",
            ProtectionLevel::Delay => "delay",
            ProtectionLevel::DoubleConfirm => "double_confirm",
        }
    }
}

impl fmt::Display for ProtectionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status staff can assign to a patient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatusDefinition {
    pub name: String,
    #[serde(default)]
    pub protection_level: ProtectionLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl StatusDefinition {
    pub fn new(name: impl Into<String>, protection_level: ProtectionLevel) -> Self {
        Self {
            name: name.into(),
            protection_level,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Read-only source of status definitions.
pub trait StatusRegistry: Send + Sync {
    /// Current snapshot of every known status, in display order.
    fn statuses(&self) -> TrackerResult<Vec<StatusDefinition>>;

    /// Looks up a status by exact name.
    fn find(&self, name: &str) -> TrackerResult<Option<StatusDefinition>> {
        Ok(self.statuses()?.into_iter().find(|s| s.name == name))
    }
}

/// In-memory registry.
#[derive(Clone, Debug, Default)]
pub struct StaticStatusRegistry {
    statuses: Vec<StatusDefinition>,
}

impl StaticStatusRegistry {
    pub fn new(statuses: Vec<StatusDefinition>) -> TrackerResult<Self> {
        ensure_unique(&statuses)?;
        Ok(Self { statuses })
    }

    /// The statuses a clinic starts with when no registry file is configured.
    pub fn clinic_default() -> Self {
        Self {
            statuses: vec![
                StatusDefinition::new("Admitted", ProtectionLevel::None)
                    .with_description("Checked in and waiting to be seen"),
                StatusDefinition::new("Under Observation", ProtectionLevel::None),
                StatusDefinition::new("In Surgery", ProtectionLevel::Delay)
                    .with_description("Patient is in theatre"),
                StatusDefinition::new("Emergency Care", ProtectionLevel::DoubleConfirm),
                StatusDefinition::new("Recovering", ProtectionLevel::None),
                StatusDefinition::new("Ready for Pickup", ProtectionLevel::Confirmation),
                StatusDefinition::new("Discharged", ProtectionLevel::Confirmation),
            ],
        }
    }
}

impl StatusRegistry for StaticStatusRegistry {
    fn statuses(&self) -> TrackerResult<Vec<StatusDefinition>> {
        Ok(self.statuses.clone())
    }
}

/// Registry backed by a YAML file that is re-read on every call.
#[derive(Clone, Debug)]
pub struct FileStatusRegistry {
    path: PathBuf,
}

impl FileStatusRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse registry YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::RegistrySchema`] naming the failing field path when the text
    /// does not match the schema, or [`TrackerError::DuplicateStatus`] when two statuses share
    /// a name.
    pub fn parse(yaml_text: &str) -> TrackerResult<Vec<StatusDefinition>> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);

        let wire = match serde_path_to_error::deserialize::<_, RegistryWire>(deserializer) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() || path == "." {
                    "<root>".to_string()
                } else {
                    path
                };
                return Err(TrackerError::RegistrySchema {
                    path,
                    message: source.to_string(),
                });
            }
        };

        ensure_unique(&wire.statuses)?;
        Ok(wire.statuses)
    }
}

impl StatusRegistry for FileStatusRegistry {
    fn statuses(&self) -> TrackerResult<Vec<StatusDefinition>> {
        let text =
            std::fs::read_to_string(&self.path).map_err(|source| TrackerError::RegistryRead {
                path: self.path.clone(),
                source,
            })?;
        Self::parse(&text)
    }
}

/// Registry to use for a configured status file, or the clinic defaults when there is none.
pub fn configured_registry(status_file: Option<&Path>) -> Arc<dyn StatusRegistry> {
    match status_file {
        Some(path) => Arc::new(FileStatusRegistry::new(path)),
        None => Arc::new(StaticStatusRegistry::clinic_default()),
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryWire {
    statuses: Vec<StatusDefinition>,
}

fn ensure_unique(statuses: &[StatusDefinition]) -> TrackerResult<()> {
    let mut seen = HashSet::new();
    for status in statuses {
        if status.name.trim().is_empty() {
            return Err(TrackerError::InvalidInput(
                "status name cannot be empty".into(),
            ));
        }
        if !seen.insert(status.name.as_str()) {
            return Err(TrackerError::DuplicateStatus(status.name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"statuses:
  - name: Admitted
  - name: In Surgery
    protection_level: delay
    description: Patient is in theatre
  - name: Emergency Care
    protection_level: double_confirm
"#;

    #[test]
    fn parses_levels_and_defaults_to_none() {
        let statuses = FileStatusRegistry::parse(SAMPLE).expect("parse registry");
        assert_eq!(statuses.len(), 3);
        assert_eq!(statuses[0].protection_level, ProtectionLevel::None);
        assert_eq!(statuses[1].protection_level, ProtectionLevel::Delay);
        assert_eq!(
            statuses[1].description.as_deref(),
            Some("Patient is in theatre")
        );
        assert_eq!(statuses[2].protection_level, ProtectionLevel::DoubleConfirm);
    }

    #[test]
    fn rejects_unknown_keys_with_path() {
        let input = r#"statuses:
  - name: Admitted
    colour: green
"#;
        let err = FileStatusRegistry::parse(input).expect_err("should reject unknown key");
        match err {
            TrackerError::RegistrySchema { path, message } => {
                assert!(path.starts_with("statuses[0]"), "path was {path}");
                assert!(message.contains("colour"));
            }
            other => panic!("expected RegistrySchema error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_protection_level() {
        let input = r#"statuses:
  - name: Admitted
    protection_level: triple
"#;
        let err = FileStatusRegistry::parse(input).expect_err("should reject level");
        assert!(matches!(err, TrackerError::RegistrySchema { .. }));
    }

    #[test]
    fn rejects_duplicate_names() {
        let input = r#"statuses:
  - name: Admitted
  - name: Admitted
    protection_level: confirmation
"#;
        let err = FileStatusRegistry::parse(input).expect_err("should reject duplicate");
        assert!(matches!(err, TrackerError::DuplicateStatus(name) if name == "Admitted"));
    }

    #[test]
    fn file_registry_reads_live_snapshot() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(SAMPLE.as_bytes()).expect("write registry");

        let registry = FileStatusRegistry::new(file.path());
        let found = registry
            .find("In Surgery")
            .expect("lookup")
            .expect("status present");
        assert_eq!(found.protection_level, ProtectionLevel::Delay);
        assert!(registry.find("in surgery").expect("lookup").is_none());

        std::fs::write(
            file.path(),
            "statuses:\n  - name: In Surgery\n    protection_level: confirmation\n",
        )
        .expect("rewrite registry");
        let found = registry
            .find("In Surgery")
            .expect("lookup")
            .expect("status present");
        assert_eq!(found.protection_level, ProtectionLevel::Confirmation);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let registry = FileStatusRegistry::new(dir.path().join("missing.yaml"));
        assert!(matches!(
            registry.statuses(),
            Err(TrackerError::RegistryRead { .. })
        ));
    }

    #[test]
    fn configured_registry_falls_back_to_defaults() {
        let registry = configured_registry(None);
        let found = registry
            .find("Emergency Care")
            .expect("lookup")
            .expect("default status");
        assert_eq!(found.protection_level, ProtectionLevel::DoubleConfirm);
    }

    #[test]
    fn clinic_default_covers_every_level() {
        let statuses = StaticStatusRegistry::clinic_default()
            .statuses()
            .expect("static registry");
        for level in [
            ProtectionLevel::None,
            ProtectionLevel::Confirmation,
            ProtectionLevel::Delay,
            ProtectionLevel::DoubleConfirm,
        ] {
            assert!(statuses.iter().any(|s| s.protection_level == level));
        }
    }
}
