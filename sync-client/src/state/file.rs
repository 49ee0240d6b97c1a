//! JSON state file.

use super::{StateError, StateRecord, StateSink};
use async_trait::async_trait;
use devsync_core::SessionPhase;
use devsync_types::SessionId;
use std::path::{Path, PathBuf};

/// Writes the latest [`StateRecord`] to a JSON file.
///
/// Each update replaces the file atomically (write to a sibling, then
/// rename), so readers never observe a partial record.
#[derive(Debug, Clone)]
pub struct FileStateSink {
    path: PathBuf,
    session_id: SessionId,
}

impl FileStateSink {
    /// Create a sink writing to `path`.
    pub fn new(path: impl Into<PathBuf>, session_id: SessionId) -> Self {
        Self {
            path: path.into(),
            session_id,
        }
    }

    /// Path of the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the record currently stored at `path`.
    pub async fn load(path: &Path) -> Result<StateRecord, StateError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StateError::Read {
                path: path.to_path_buf(),
                source: e,
            })?;
        serde_json::from_str(&contents).map_err(|e| StateError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    async fn write(&self, record: &StateRecord) -> Result<(), StateError> {
        let contents = serde_json::to_string_pretty(record)?;
        let tmp = self.path.with_extension("json.tmp");
        let write_err = |e| StateError::Write {
            path: self.path.clone(),
            source: e,
        };

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        tokio::fs::write(&tmp, contents).await.map_err(write_err)?;
        set_file_permissions_0600(&tmp).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(write_err)?;
        Ok(())
    }
}

#[async_trait]
impl StateSink for FileStateSink {
    async fn update(&self, phase: SessionPhase) -> Result<(), StateError> {
        let record = StateRecord::now(self.session_id, phase);
        self.write(&record).await?;
        tracing::debug!(path = %self.path.display(), %phase, "Session state written");
        Ok(())
    }
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
async fn set_file_permissions_0600(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
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

    #[tokio::test]
    async fn update_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        let id = SessionId::new();
        let sink = FileStateSink::new(&path, id);

        sink.update(SessionPhase::Scanning).await.unwrap();
        sink.update(SessionPhase::Monitoring).await.unwrap();

        let record = FileStateSink::load(&path).await.unwrap();
        assert_eq!(record.session_id, id);
        assert_eq!(record.phase, SessionPhase::Monitoring);
        assert!(record.updated_at > 0);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn update_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        let sink = FileStateSink::new(&path, SessionId::new());

        sink.update(SessionPhase::Starting).await.unwrap();

        assert!(path.exists());
    }

    #[tokio::test]
    async fn load_missing_file_is_read_error() {
        let dir = tempdir().unwrap();
        let err = FileStateSink::load(&dir.path().join("missing.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, StateError::Read { .. }));
    }

    #[tokio::test]
    async fn load_garbage_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let err = FileStateSink::load(&path).await.unwrap_err();
        assert!(matches!(err, StateError::Parse { .. }));
        assert!(err.to_string().contains("session.json"));
    }

    #[tokio::test]
    async fn phase_is_stored_camel_case() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        let sink = FileStateSink::new(&path, SessionId::new());

        sink.update(SessionPhase::Synchronizing).await.unwrap();

        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["phase"], "synchronizing");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn state_file_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        let sink = FileStateSink::new(&path, SessionId::new());

        sink.update(SessionPhase::Starting).await.unwrap();

        let perms = tokio::fs::metadata(&path).await.unwrap().permissions();
        assert_eq!(perms.mode() & 0o777, 0o600, "file should be 0600");
    }
}
