use async_trait::async_trait;
use chrono::{DateTime, Utc};
use codeloom_core::{CodeloomError, CodeloomResult, QueueState};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tracing::{debug, info};

/// Artifact format version; bumped on incompatible envelope changes.
const BACKUP_FORMAT_VERSION: u32 = 1;

/// Write-once handle to a stored queue snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    /// Caller-chosen backup name, unique within a store.
    pub name: String,
    /// Hex sha-256 over the canonical state serialization.
    pub checksum: String,
    /// When the backup was written.
    pub created_at: DateTime<Utc>,
    /// Where the artifact lives (informational; restore goes by name).
    pub path: PathBuf,
}

/// The serialized artifact: self-describing enough to detect corruption.
///
/// Deliberately excludes the creation timestamp so that identical states
/// produce byte-identical artifacts.
#[derive(Serialize, Deserialize)]
struct BackupEnvelope {
    version: u32,
    checksum: String,
    state: QueueState,
}

/// Storage-agnostic persistence seam for queue snapshots.
///
/// Implementations never mutate queue state; they only read and write
/// snapshots.
#[async_trait]
pub trait BackupStore: Send + Sync {
    /// Serialize a state snapshot under the given name.
    async fn create_backup(&self, name: &str, state: &QueueState)
        -> CodeloomResult<BackupRecord>;
    /// Deserialize and validate a previously stored snapshot.
    async fn restore_from_backup(&self, name: &str) -> CodeloomResult<QueueState>;
    /// Names of stored backups, sorted ascending.
    async fn list_backups(&self) -> CodeloomResult<Vec<String>>;
}

/// JSON-on-disk backup store.
///
/// Each backup is one `<name>.json` file holding a versioned envelope with
/// an embedded sha-256 checksum. Writes go through a temp file and a rename
/// so a failed write leaves no partial artifact.
pub struct FileBackupStore {
    dir: PathBuf,
}

impl FileBackupStore {
    /// Create a store rooted at the given directory (created on first write).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn backup_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    fn validate_name(name: &str) -> CodeloomResult<()> {
        if name.is_empty()
            || name
                .chars()
                .any(|c| !(c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'))
        {
            return Err(CodeloomError::Config(format!(
                "backup name '{name}' must be non-empty and [A-Za-z0-9._-]"
            )));
        }
        Ok(())
    }
}

/// Hex sha-256 over the canonical JSON serialization of a state.
fn state_checksum(state: &QueueState) -> CodeloomResult<String> {
    let bytes = serde_json::to_vec(state)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

#[async_trait]
impl BackupStore for FileBackupStore {
    async fn create_backup(
        &self,
        name: &str,
        state: &QueueState,
    ) -> CodeloomResult<BackupRecord> {
        Self::validate_name(name)?;
        state.validate()?;

        let checksum = state_checksum(state)?;
        let envelope = BackupEnvelope {
            version: BACKUP_FORMAT_VERSION,
            checksum: checksum.clone(),
            state: state.clone(),
        };
        let json = serde_json::to_string_pretty(&envelope)?;

        let path = self.backup_path(name);
        let tmp = self.dir.join(format!("{name}.json.tmp"));

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CodeloomError::BackupWrite(e.to_string()))?;
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| CodeloomError::BackupWrite(e.to_string()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| CodeloomError::BackupWrite(e.to_string()))?;

        info!(name, items = state.items.len(), "backup written");

        Ok(BackupRecord {
            name: name.to_string(),
            checksum,
            created_at: Utc::now(),
            path,
        })
    }

    async fn restore_from_backup(&self, name: &str) -> CodeloomResult<QueueState> {
        let path = self.backup_path(name);
        if !path.exists() {
            return Err(CodeloomError::BackupNotFound(name.to_string()));
        }
        let data = tokio::fs::read_to_string(&path).await?;

        let envelope: BackupEnvelope = serde_json::from_str(&data)
            .map_err(|e| CodeloomError::BackupCorrupt(format!("{name}: {e}")))?;

        if envelope.version != BACKUP_FORMAT_VERSION {
            return Err(CodeloomError::BackupCorrupt(format!(
                "{name}: unsupported format version {}",
                envelope.version
            )));
        }

        let checksum = state_checksum(&envelope.state)?;
        if checksum != envelope.checksum {
            return Err(CodeloomError::BackupCorrupt(format!(
                "{name}: checksum mismatch"
            )));
        }

        envelope
            .state
            .validate()
            .map_err(|e| CodeloomError::BackupCorrupt(format!("{name}: {e}")))?;

        debug!(name, items = envelope.state.items.len(), "backup restored");
        Ok(envelope.state)
    }

    async fn list_backups(&self) -> CodeloomResult<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(file_name) = entry.file_name().to_str() {
                if let Some(stem) = file_name.strip_suffix(".json") {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_name_validation() {
        assert!(FileBackupStore::validate_name("nightly-2026_08.1").is_ok());
        assert!(FileBackupStore::validate_name("").is_err());
        assert!(FileBackupStore::validate_name("../escape").is_err());
        assert!(FileBackupStore::validate_name("a/b").is_err());
    }

    #[test]
    fn test_checksum_is_stable() {
        let state = QueueState::empty();
        let a = state_checksum(&state).unwrap();
        let b = state_checksum(&state).unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_restore_missing_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBackupStore::new(dir.path());
        let err = store.restore_from_backup("nope").await.unwrap_err();
        assert!(matches!(err, CodeloomError::BackupNotFound(_)));
    }

    #[tokio::test]
    async fn test_list_empty_dir() {
        let store = FileBackupStore::new("/tmp/codeloom_nonexistent_backup_dir");
        assert!(store.list_backups().await.unwrap().is_empty());
    }
}
