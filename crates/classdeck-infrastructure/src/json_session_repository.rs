//! File-backed session persistence.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};

use classdeck_core::error::ClassdeckError;
use classdeck_core::session::{PersistedSession, SessionRepository};

/// Persists the session record to a single JSON file.
///
/// Layout:
/// ```text
/// base_dir/
/// └── session.json
/// ```
/// Absence of the file is equivalent to an empty session. Writes go through
/// a sibling temp file and a rename, so a crash mid-write never leaves a
/// truncated record behind.
pub struct JsonFileSessionRepository {
    file_path: PathBuf,
}

impl JsonFileSessionRepository {
    /// Creates a repository storing its record under the given directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir).context("Failed to create session storage directory")?;
        Ok(Self {
            file_path: base_dir.join("session.json"),
        })
    }

    /// Creates a repository at the default location (~/.classdeck).
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined or the
    /// directory cannot be created.
    pub fn default_location() -> Result<Self> {
        let home_dir = dirs::home_dir().context("Failed to get home directory")?;
        Self::new(home_dir.join(".classdeck"))
    }

    fn read_record(path: &Path) -> Result<Option<PersistedSession>, ClassdeckError> {
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(path)?;
        let record: PersistedSession = serde_json::from_str(&json)?;
        Ok(Some(record))
    }

    fn write_record(path: &Path, record: &PersistedSession) -> Result<(), ClassdeckError> {
        let json = serde_json::to_string_pretty(record)?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, path)?;
        tracing::debug!(path = %path.display(), "session record written");
        Ok(())
    }

    fn remove_record(path: &Path) -> Result<(), ClassdeckError> {
        if path.exists() {
            fs::remove_file(path)?;
            tracing::debug!(path = %path.display(), "session record purged");
        }
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for JsonFileSessionRepository {
    async fn load(&self) -> Result<Option<PersistedSession>, ClassdeckError> {
        let path = self.file_path.clone();
        tokio::task::spawn_blocking(move || Self::read_record(&path))
            .await
            .map_err(|e| ClassdeckError::internal(format!("Failed to join task: {}", e)))?
    }

    async fn save(&self, session: &PersistedSession) -> Result<(), ClassdeckError> {
        let path = self.file_path.clone();
        let record = session.clone();
        tokio::task::spawn_blocking(move || Self::write_record(&path, &record))
            .await
            .map_err(|e| ClassdeckError::internal(format!("Failed to join task: {}", e)))?
    }

    async fn clear(&self) -> Result<(), ClassdeckError> {
        let path = self.file_path.clone();
        tokio::task::spawn_blocking(move || Self::remove_record(&path))
            .await
            .map_err(|e| ClassdeckError::internal(format!("Failed to join task: {}", e)))?
    }
}
