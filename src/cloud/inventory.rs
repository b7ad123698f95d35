//! File-backed live resource inventory.

use super::{CloudApi, LiveResourceKind};
use crate::error::{Result, TfProbeError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A snapshot of live resource names, read from YAML or JSON.
///
/// ```yaml
/// db_parameter_groups:
///   - app-server1
///   - app-server2
/// key_pairs: [deployer]
/// ```
///
/// A kind missing from the file is an error when queried, not an empty
/// list, so an incomplete inventory never makes every name look invalid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryFile {
    path: PathBuf,
    names: Entries,
}

type Entries = BTreeMap<LiveResourceKind, Vec<String>>;

impl InventoryFile {
    /// Load an inventory file. `.json` files are read as JSON, anything
    /// else as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or malformed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(crate::err!(FileNotFound {
                path: path.to_path_buf(),
            }));
        }
        let content = std::fs::read_to_string(path).map_err(|e| TfProbeError::io(path, e, file!(), line!()))?;
        let is_json = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let parsed: std::result::Result<Entries, String> = if is_json {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str(&content).map_err(|e| e.to_string())
        };
        let names = parsed.map_err(|message| {
            crate::err!(ConfigValue {
                key: "deep_check.inventory_file".to_string(),
                message: format!("{}: {message}", path.display()),
            })
        })?;
        let inventory = Self {
            path: path.to_path_buf(),
            names,
        };
        tracing::info!(path = %path.display(), kinds = inventory.names.len(), "Loaded inventory file");
        Ok(inventory)
    }

    /// Build an inventory in memory.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = (LiveResourceKind, Vec<String>)>) -> Self {
        Self {
            path: PathBuf::new(),
            names: entries.into_iter().collect(),
        }
    }
}

#[async_trait]
impl CloudApi for InventoryFile {
    async fn list_names(&self, kind: LiveResourceKind) -> Result<Vec<String>> {
        self.names.get(&kind).cloned().ok_or_else(|| {
            TfProbeError::cloud_api(
                kind,
                format!("inventory {} has no entry for {kind}", self.path.display()),
                None,
                file!(),
                line!(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inventory.yaml");
        std::fs::write(&path, "db_parameter_groups:\n  - app-server1\n  - app-server2\nkey_pairs: []\n").unwrap();

        let inventory = InventoryFile::load(&path).unwrap();
        assert_eq!(
            inventory.list_names(LiveResourceKind::DbParameterGroups).await.unwrap(),
            vec!["app-server1", "app-server2"]
        );
        assert!(inventory.list_names(LiveResourceKind::KeyPairs).await.unwrap().is_empty());

        let err = inventory.list_names(LiveResourceKind::DbSubnetGroups).await.unwrap_err();
        assert!(err.is_external());
    }

    #[tokio::test]
    async fn test_load_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inventory.json");
        std::fs::write(&path, r#"{"db_subnet_groups": ["main"]}"#).unwrap();
        let inventory = InventoryFile::load(&path).unwrap();
        assert_eq!(inventory.list_names(LiveResourceKind::DbSubnetGroups).await.unwrap(), vec!["main"]);
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inventory.yaml");
        std::fs::write(&path, "buckets: [a]\n").unwrap();
        assert!(matches!(InventoryFile::load(&path), Err(TfProbeError::ConfigValue { .. })));
    }

    #[test]
    fn test_missing_file() {
        let err = InventoryFile::load(Path::new("/nonexistent/inventory.yaml")).unwrap_err();
        assert!(matches!(err, TfProbeError::FileNotFound { .. }));
    }
}
