//! Permit registry.
//!
//! Durable set of monitored permits and their divisions. Every mutation is
//! written to disk before it returns; if the write fails the in-memory copy
//! is rolled back so the two never diverge.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::common::error::{RegistryError, RegistryResult};
use crate::common::persist::{self, Loaded};
use crate::common::types::{MonitoredPermit, PermitEntry, PollTarget};

/// Permits seeded on first run, before any document exists.
pub fn default_permits() -> BTreeMap<String, PermitEntry> {
    let mut permits = BTreeMap::new();
    permits.insert(
        "250014".to_string(),
        PermitEntry::new("Green River")
            .with_division("371", "Dearlodge")
            .with_division("380", "Gates of Lodore"),
    );
    permits.insert(
        "621743".to_string(),
        PermitEntry::new("Rio Chama River").with_division("1", "Rio Chama"),
    );
    permits
}

/// Monitored permits, keyed by permit ID.
#[derive(Debug)]
pub struct PermitRegistry {
    path: PathBuf,
    permits: BTreeMap<String, PermitEntry>,
}

impl PermitRegistry {
    /// Load the registry from `path`, seeding the defaults if the document
    /// does not exist yet.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match persist::load_json::<BTreeMap<String, PermitEntry>>(&path) {
            Loaded::Found(permits) => {
                info!("Loaded {} monitored permit(s) from {}", permits.len(), path.display());
                Self { path, permits }
            }
            Loaded::Missing => {
                let registry = Self {
                    path,
                    permits: default_permits(),
                };
                info!(
                    "No permit registry at {}; initializing with {} default permit(s)",
                    registry.path.display(),
                    registry.permits.len()
                );
                if let Err(e) = persist::save_json(&registry.path, &registry.permits).await {
                    warn!("Failed to write initial permit registry: {}", e);
                }
                registry
            }
            Loaded::Corrupt(reason) => {
                error!(
                    "Permit registry at {} is unreadable ({}); starting with no permits",
                    path.display(),
                    reason
                );
                Self {
                    path,
                    permits: BTreeMap::new(),
                }
            }
        }
    }

    pub fn contains(&self, permit_id: &str) -> bool {
        self.permits.contains_key(permit_id)
    }

    pub fn get(&self, permit_id: &str) -> Option<&PermitEntry> {
        self.permits.get(permit_id)
    }

    /// Whether `target` still corresponds to a registered permit/division.
    pub fn contains_target(&self, target: &PollTarget) -> bool {
        let Some(entry) = self.permits.get(&target.permit_id) else {
            return false;
        };
        match target.division_id() {
            Some(division_id) => entry.divisions.contains_key(division_id),
            None => entry.divisions.is_empty(),
        }
    }

    /// All permits, ordered by permit ID.
    pub fn list(&self) -> Vec<MonitoredPermit> {
        self.permits
            .iter()
            .map(|(id, entry)| MonitoredPermit {
                id: id.clone(),
                entry: entry.clone(),
            })
            .collect()
    }

    pub async fn add_permit(&mut self, permit_id: &str, entry: PermitEntry) -> RegistryResult<()> {
        if self.permits.contains_key(permit_id) {
            return Err(RegistryError::AlreadyMonitored {
                permit_id: permit_id.to_string(),
            });
        }
        self.commit(|permits| {
            permits.insert(permit_id.to_string(), entry);
        })
        .await
    }

    pub async fn remove_permit(&mut self, permit_id: &str) -> RegistryResult<PermitEntry> {
        if !self.permits.contains_key(permit_id) {
            return Err(RegistryError::NotMonitored {
                permit_id: permit_id.to_string(),
            });
        }
        self.commit(|permits| permits.remove(permit_id))
            .await
            .map(|removed| removed.unwrap_or_default())
    }

    pub async fn add_division(
        &mut self,
        permit_id: &str,
        division_id: &str,
        name: &str,
    ) -> RegistryResult<()> {
        let entry = self.entry(permit_id)?;
        if entry.divisions.contains_key(division_id) {
            return Err(RegistryError::DivisionAlreadyMonitored {
                permit_id: permit_id.to_string(),
                division_id: division_id.to_string(),
            });
        }
        self.commit(|permits| {
            if let Some(entry) = permits.get_mut(permit_id) {
                entry.divisions.insert(division_id.to_string(), name.to_string());
            }
        })
        .await
    }

    /// Remove a division, returning its display name.
    pub async fn remove_division(&mut self, permit_id: &str, division_id: &str) -> RegistryResult<String> {
        let entry = self.entry(permit_id)?;
        if !entry.divisions.contains_key(division_id) {
            return Err(RegistryError::UnknownDivision {
                permit_id: permit_id.to_string(),
                division_id: division_id.to_string(),
            });
        }
        self.commit(|permits| {
            permits
                .get_mut(permit_id)
                .and_then(|entry| entry.divisions.remove(division_id))
                .unwrap_or_default()
        })
        .await
    }

    fn entry(&self, permit_id: &str) -> RegistryResult<&PermitEntry> {
        self.permits
            .get(permit_id)
            .ok_or_else(|| RegistryError::UnknownPermit {
                permit_id: permit_id.to_string(),
            })
    }

    /// Apply `change`, persist, and roll back if the write fails.
    async fn commit<T>(
        &mut self,
        change: impl FnOnce(&mut BTreeMap<String, PermitEntry>) -> T,
    ) -> RegistryResult<T> {
        let snapshot = self.permits.clone();
        let output = change(&mut self.permits);

        if let Err(e) = persist::save_json(&self.path, &self.permits).await {
            error!("Failed to save permit registry to {}: {}", self.path.display(), e);
            self.permits = snapshot;
            return Err(RegistryError::Persistence(e));
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use tokio_test::{assert_err, assert_ok};

    async fn new_registry() -> (tempfile::TempDir, PermitRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let registry = PermitRegistry::load(dir.path().join("permits.json")).await;
        (dir, registry)
    }

    #[tokio::test]
    async fn test_first_run_seeds_defaults_and_writes_document() {
        let (dir, registry) = new_registry().await;

        assert!(registry.contains("250014"));
        assert!(registry.contains("621743"));
        assert_eq!(registry.get("250014").unwrap().divisions.len(), 2);

        let on_disk = fs::read_to_string(dir.path().join("permits.json")).unwrap();
        assert!(on_disk.contains("Gates of Lodore"));
    }

    #[tokio::test]
    async fn test_migration_is_not_rerun() {
        let (dir, mut registry) = new_registry().await;
        assert_ok!(registry.remove_permit("250014").await);

        let reloaded = PermitRegistry::load(dir.path().join("permits.json")).await;
        assert!(!reloaded.contains("250014"));
        assert_eq!(reloaded.list().len(), 1);
    }

    #[tokio::test]
    async fn test_add_permit_persists() {
        let (dir, mut registry) = new_registry().await;

        assert_ok!(registry.add_permit("445856", PermitEntry::new("Desolation Gray")).await);

        let reloaded = PermitRegistry::load(dir.path().join("permits.json")).await;
        assert_eq!(reloaded.get("445856").unwrap().name, "Desolation Gray");
    }

    #[tokio::test]
    async fn test_add_existing_permit_fails() {
        let (_dir, mut registry) = new_registry().await;

        let err = assert_err!(registry.add_permit("250014", PermitEntry::new("Again")).await);
        assert!(matches!(err, RegistryError::AlreadyMonitored { .. }));
        assert_eq!(registry.get("250014").unwrap().name, "Green River");
    }

    #[tokio::test]
    async fn test_remove_unknown_permit_fails() {
        let (_dir, mut registry) = new_registry().await;

        let err = assert_err!(registry.remove_permit("123").await);
        assert_eq!(err.to_string(), "Permit 123 is not being monitored");
    }

    #[tokio::test]
    async fn test_division_operations() {
        let (_dir, mut registry) = new_registry().await;

        assert_ok!(registry.add_division("250014", "372", "Split Mountain").await);
        assert!(matches!(
            registry.add_division("250014", "372", "Split Mountain").await,
            Err(RegistryError::DivisionAlreadyMonitored { .. })
        ));
        assert!(matches!(
            registry.add_division("777", "1", "Nowhere").await,
            Err(RegistryError::UnknownPermit { .. })
        ));

        let name = assert_ok!(registry.remove_division("250014", "372").await);
        assert_eq!(name, "Split Mountain");
        assert!(matches!(
            registry.remove_division("250014", "372").await,
            Err(RegistryError::UnknownDivision { .. })
        ));
        assert!(matches!(
            registry.remove_division("777", "1").await,
            Err(RegistryError::UnknownPermit { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_id() {
        let (_dir, mut registry) = new_registry().await;
        assert_ok!(registry.add_permit("100000", PermitEntry::new("First")).await);

        let ids: Vec<_> = registry.list().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["100000", "250014", "621743"]);
    }

    #[tokio::test]
    async fn test_contains_target() {
        let (_dir, mut registry) = new_registry().await;
        assert_ok!(registry.add_permit("445856", PermitEntry::new("Desolation Gray")).await);

        let targets: Vec<_> = registry.list().iter().flat_map(|p| p.targets()).collect();
        assert!(targets.iter().all(|t| registry.contains_target(t)));

        let gone = targets[0].clone();
        assert_ok!(registry.remove_permit(&gone.permit_id).await);
        assert!(!registry.contains_target(&gone));
    }

    #[tokio::test]
    async fn test_failed_write_rolls_back() {
        let (dir, mut registry) = new_registry().await;
        let path = dir.path().join("permits.json");
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();
        fs::write(path.join("occupied"), "x").unwrap();

        let err = assert_err!(registry.add_permit("445856", PermitEntry::new("Desolation Gray")).await);
        assert!(matches!(err, RegistryError::Persistence(_)));
        assert!(!registry.contains("445856"));
    }

    #[tokio::test]
    async fn test_corrupt_document_is_not_overwritten_by_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("permits.json");
        fs::write(&path, "{oops").unwrap();

        let registry = PermitRegistry::load(&path).await;

        assert!(registry.list().is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{oops");
    }
}
