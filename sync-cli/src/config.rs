//! Configuration management for devsync.
//!
//! Contexts (named cluster endpoints) live in `contexts.json` in the data
//! directory. Every mutation is written back immediately.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File holding the context store.
pub const CONTEXTS_FILE: &str = "contexts.json";

/// File holding the state of the running session.
pub const SESSION_FILE: &str = "session.json";

/// File holding orchestrator tuning.
pub const SETTINGS_FILE: &str = "devsync.toml";

/// Errors from context store operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    /// The context in use cannot be deleted.
    #[error("'{0}' is the current context and can not be deleted")]
    IsCurrent(String),

    /// No context with that name.
    #[error("'{name}' is not a context. Valid options are: [{}]", valid.join(", "))]
    NotFound {
        /// Requested name.
        name: String,
        /// Names that do exist.
        valid: Vec<String>,
    },
}

/// A cluster endpoint the CLI can talk to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextData {
    /// API endpoint of the cluster.
    pub endpoint: String,
    /// Namespace used by default.
    #[serde(default)]
    pub namespace: String,
}

/// Named contexts plus the one in use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextStore {
    /// Name of the context in use (empty if none).
    #[serde(default)]
    pub current_context: String,
    /// All known contexts by name.
    #[serde(default)]
    pub contexts: BTreeMap<String, ContextData>,
}

impl ContextStore {
    /// Path of the store inside `data_dir`.
    pub fn path(data_dir: &Path) -> PathBuf {
        data_dir.join(CONTEXTS_FILE)
    }

    /// Load the store, or an empty one if it does not exist yet.
    pub async fn load(data_dir: &Path) -> Result<Self> {
        let path = Self::path(data_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&contents).context("Invalid context store")
    }

    /// Save the store.
    pub async fn save(&self, data_dir: &Path) -> Result<()> {
        let path = Self::path(data_dir);
        let contents = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, contents)
            .await
            .context("Failed to save context store")?;
        set_file_permissions_0600(&path).await?;
        Ok(())
    }

    /// Remove a context.
    ///
    /// The current context is always refused, even if it is not in the map.
    pub fn delete(&mut self, name: &str) -> Result<ContextData, ContextError> {
        if name == self.current_context {
            return Err(ContextError::IsCurrent(name.to_string()));
        }
        self.contexts
            .remove(name)
            .ok_or_else(|| self.not_found(name))
    }

    /// Make `name` the current context.
    pub fn use_context(&mut self, name: &str) -> Result<&ContextData, ContextError> {
        if !self.contexts.contains_key(name) {
            return Err(self.not_found(name));
        }
        self.current_context = name.to_string();
        self.contexts.get(name).ok_or_else(|| self.not_found(name))
    }

    /// The context in use, if any.
    pub fn current(&self) -> Option<(&str, &ContextData)> {
        self.contexts
            .get_key_value(self.current_context.as_str())
            .map(|(name, data)| (name.as_str(), data))
    }

    fn not_found(&self, name: &str) -> ContextError {
        ContextError::NotFound {
            name: name.to_string(),
            valid: self.contexts.keys().cloned().collect(),
        }
    }
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
async fn set_file_permissions_0600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .context("Failed to set file permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// Set directory permissions to 0700 (owner only) on Unix.
/// No-op on non-Unix platforms.
pub async fn set_dir_permissions_0700(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
            .await
            .context("Failed to set directory permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn data(endpoint: &str) -> ContextData {
        ContextData {
            endpoint: endpoint.to_string(),
            namespace: "dev".to_string(),
        }
    }

    fn store() -> ContextStore {
        let mut store = ContextStore::default();
        store.contexts.insert(
            "https://cloud.example.com".into(),
            data("https://cloud.example.com"),
        );
        store.contexts.insert("minikube".into(), data("https://192.168.49.2:8443"));
        store.contexts.insert("staging".into(), data("https://staging.example.com"));
        store.current_context = "minikube".to_string();
        store
    }

    // ===========================================
    // Delete Tests
    // ===========================================

    #[test]
    fn delete_removes_context() {
        let mut store = store();

        let removed = store.delete("staging").unwrap();

        assert_eq!(removed.endpoint, "https://staging.example.com");
        assert!(!store.contexts.contains_key("staging"));
    }

    #[test]
    fn delete_refuses_current() {
        let mut store = store();

        let err = store.delete("minikube").unwrap_err();

        assert_eq!(err, ContextError::IsCurrent("minikube".into()));
        assert!(store.contexts.contains_key("minikube"));
    }

    #[test]
    fn delete_refuses_current_even_if_missing() {
        let mut store = ContextStore {
            current_context: "gone".to_string(),
            ..ContextStore::default()
        };

        assert!(matches!(
            store.delete("gone"),
            Err(ContextError::IsCurrent(_))
        ));
    }

    #[test]
    fn delete_missing_lists_all_other_keys() {
        let mut store = store();

        let err = store.delete("prod").unwrap_err();

        assert_eq!(
            err.to_string(),
            "'prod' is not a context. Valid options are: \
             [https://cloud.example.com, minikube, staging]"
        );
    }

    #[test]
    fn delete_missing_from_empty_store() {
        let mut store = ContextStore::default();
        let err = store.delete("prod").unwrap_err();
        assert_eq!(
            err.to_string(),
            "'prod' is not a context. Valid options are: []"
        );
    }

    // ===========================================
    // Use Tests
    // ===========================================

    #[test]
    fn use_context_switches_current() {
        let mut store = store();

        store.use_context("staging").unwrap();

        assert_eq!(store.current().map(|(name, _)| name), Some("staging"));
        assert!(store.delete("minikube").is_ok());
    }

    #[test]
    fn use_missing_context_keeps_current() {
        let mut store = store();

        assert!(matches!(
            store.use_context("prod"),
            Err(ContextError::NotFound { .. })
        ));
        assert_eq!(store.current_context, "minikube");
    }

    // ===========================================
    // Persistence Tests
    // ===========================================

    #[tokio::test]
    async fn load_without_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = ContextStore::load(dir.path()).await.unwrap();
        assert_eq!(store, ContextStore::default());
    }

    #[tokio::test]
    async fn delete_is_persisted() {
        let dir = tempdir().unwrap();
        let mut store = store();
        store.save(dir.path()).await.unwrap();

        let mut loaded = ContextStore::load(dir.path()).await.unwrap();
        loaded.delete("staging").unwrap();
        loaded.save(dir.path()).await.unwrap();

        let reloaded = ContextStore::load(dir.path()).await.unwrap();
        assert_eq!(reloaded.contexts.len(), 2);
        assert_eq!(reloaded.current_context, "minikube");
    }

    #[tokio::test]
    async fn load_invalid_json_fails() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join(CONTEXTS_FILE), "not json")
            .await
            .unwrap();

        assert!(ContextStore::load(dir.path()).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn context_store_file_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        store().save(dir.path()).await.unwrap();

        let perms = tokio::fs::metadata(ContextStore::path(dir.path()))
            .await
            .unwrap()
            .permissions();
        assert_eq!(perms.mode() & 0o777, 0o600, "file should be 0600");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn data_dir_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let data_dir = dir.path().join("test-data");
        tokio::fs::create_dir_all(&data_dir).await.unwrap();
        set_dir_permissions_0700(&data_dir).await.unwrap();

        let perms = tokio::fs::metadata(&data_dir).await.unwrap().permissions();
        assert_eq!(perms.mode() & 0o777, 0o700, "dir should be 0700");
    }
}
