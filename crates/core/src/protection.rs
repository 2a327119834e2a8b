//! Protection policy resolution.
//!
//! Maps a status name to the [`ProtectionLevel`] that gates it. Resolution fails open: an
//! unreachable or malformed registry yields [`ProtectionLevel::None`] so staff are never left
//! unable to update a patient.

use crate::status::{ProtectionLevel, StatusRegistry};
use std::sync::Arc;

#[derive(Clone)]
pub struct ProtectionPolicyResolver {
    registry: Arc<dyn StatusRegistry>,
}

impl ProtectionPolicyResolver {
    pub fn new(registry: Arc<dyn StatusRegistry>) -> Self {
        Self { registry }
    }

    /// Resolves the protection level for `status_name` by exact match.
    ///
    /// Unknown statuses and registry failures both resolve to [`ProtectionLevel::None`].
    /// Failures are logged, never returned.
    pub fn resolve(&self, status_name: &str) -> ProtectionLevel {
        match self.registry.find(status_name) {
            Ok(Some(status)) => status.protection_level,
            Ok(None) => {
                tracing::debug!(status = status_name, "status not in registry, no protection");
                ProtectionLevel::None
            }
            Err(err) => {
                tracing::warn!(
                    status = status_name,
                    error = %err,
                    "protection policy resolution failed, proceeding unprotected"
                );
                ProtectionLevel::None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{FileStatusRegistry, StaticStatusRegistry, StatusDefinition};
    use crate::{TrackerError, TrackerResult};

    struct UnreachableRegistry;

    impl StatusRegistry for UnreachableRegistry {
        fn statuses(&self) -> TrackerResult<Vec<StatusDefinition>> {
            Err(TrackerError::InvalidInput("registry offline".into()))
        }
    }

    fn default_resolver() -> ProtectionPolicyResolver {
        ProtectionPolicyResolver::new(Arc::new(StaticStatusRegistry::clinic_default()))
    }

    #[test]
    fn resolves_configured_levels() {
        let resolver = default_resolver();
        assert_eq!(resolver.resolve("Admitted"), ProtectionLevel::None);
        assert_eq!(resolver.resolve("In Surgery"), ProtectionLevel::Delay);
        assert_eq!(
            resolver.resolve("Emergency Care"),
            ProtectionLevel::DoubleConfirm
        );
        assert_eq!(
            resolver.resolve("Discharged"),
            ProtectionLevel::Confirmation
        );
    }

    #[test]
    fn unknown_status_is_unprotected() {
        let resolver = default_resolver();
        assert_eq!(resolver.resolve("Boarding"), ProtectionLevel::None);
        assert_eq!(resolver.resolve("in surgery"), ProtectionLevel::None);
    }

    #[test]
    fn registry_failure_fails_open() {
        let resolver = ProtectionPolicyResolver::new(Arc::new(UnreachableRegistry));
        assert_eq!(resolver.resolve("In Surgery"), ProtectionLevel::None);
    }

    #[test]
    fn malformed_registry_file_fails_open() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("statuses.yaml");
        std::fs::write(&path, "statuses: not-a-list\n").expect("write registry");

        let resolver = ProtectionPolicyResolver::new(Arc::new(FileStatusRegistry::new(path)));
        assert_eq!(resolver.resolve("In Surgery"), ProtectionLevel::None);
    }
}
