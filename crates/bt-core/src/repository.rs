//! The storage port the engine reads and writes entries through.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

use crate::entry::{EntryPatch, NewEntry, TimeEntry};
use crate::types::{EntryId, UserId};

/// Errors reported by a repository implementation.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// No entry with this ID exists.
    #[error("entry not found: {id}")]
    NotFound { id: EntryId },
    /// A patch guarded by `require_active` found the entry idle.
    #[error("entry not running: {id}")]
    NotRunning { id: EntryId },
    /// The underlying store failed.
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Durable store of time entries.
///
/// Point writes are assumed strongly consistent, but there are no
/// multi-record transactions. Single-timer exclusivity is enforced by the
/// engine, not here.
#[async_trait]
pub trait EntryRepository: Send + Sync {
    /// Live query over a user's entries.
    ///
    /// The receiver always holds the latest snapshot and is updated after
    /// every write touching the user. Subscribing again restarts the query.
    async fn subscribe(
        &self,
        user_id: &UserId,
    ) -> Result<watch::Receiver<Vec<TimeEntry>>, RepositoryError>;

    /// Creates an entry and returns its assigned ID.
    async fn create(&self, entry: NewEntry) -> Result<EntryId, RepositoryError>;

    /// Partially updates an entry. Always stamps `updated_at`.
    ///
    /// A patch with `require_active` set must be checked and applied in one
    /// step, failing with [`RepositoryError::NotRunning`] when the entry is
    /// idle.
    async fn patch(&self, id: &EntryId, patch: EntryPatch) -> Result<(), RepositoryError>;

    async fn remove(&self, id: &EntryId) -> Result<(), RepositoryError>;

    /// Current snapshot of a user's entries.
    async fn entries(&self, user_id: &UserId) -> Result<Vec<TimeEntry>, RepositoryError> {
        let receiver = self.subscribe(user_id).await?;
        let snapshot = receiver.borrow().clone();
        Ok(snapshot)
    }
}
