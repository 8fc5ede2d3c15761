//! In-memory session persistence.

use async_trait::async_trait;
use tokio::sync::Mutex;

use classdeck_core::error::Result;
use classdeck_core::session::{PersistedSession, SessionRepository};

/// Session repository that keeps the record in memory only.
///
/// Used by tests and by ephemeral profiles where nothing should outlive the
/// process. Rehydration from a fresh instance always finds an empty session.
#[derive(Default)]
pub struct InMemorySessionRepository {
    record: Mutex<Option<PersistedSession>>,
}

impl InMemorySessionRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository pre-seeded with a record, as if a previous
    /// process run had persisted it.
    pub fn seeded(record: PersistedSession) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn load(&self) -> Result<Option<PersistedSession>> {
        Ok(self.record.lock().await.clone())
    }

    async fn save(&self, session: &PersistedSession) -> Result<()> {
        *self.record.lock().await = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.record.lock().await = None;
        Ok(())
    }
}
