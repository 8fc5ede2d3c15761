//! Session repository trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::session::model::PersistedSession;

/// Repository for the durable session record.
///
/// There is exactly one namespaced record; `load` returning `None` is
/// equivalent to an empty session. Implementations live in the
/// infrastructure crate.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Loads the persisted session record, if one exists.
    async fn load(&self) -> Result<Option<PersistedSession>>;

    /// Writes the persisted session record, replacing any previous one.
    async fn save(&self, session: &PersistedSession) -> Result<()>;

    /// Removes the persisted session record. A no-op if none exists.
    async fn clear(&self) -> Result<()>;
}
