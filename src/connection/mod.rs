//! Contracts between the migration engine and a target store.
//!
//! The engine never talks to a driver directly: it receives a [`GraphStore`]
//! from a [`Connector`], reads the applied history through [`HistoryReader`]
//! and applies every changeset inside its own [`StoreTransaction`].

pub mod uri;

pub use uri::StoreUri;

use crate::configuration::ConnectionParams;
use crate::core::{Result, StoreResult};
use crate::model::PersistedChangeset;
use async_trait::async_trait;
use std::sync::Arc;

/// Opens a live handle to the target store.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Failures are connectivity errors and are fatal to the run.
    async fn connect(&self, params: &ConnectionParams) -> Result<Arc<dyn GraphStore>>;
}

/// Reads the migration history of a store.
#[async_trait]
pub trait HistoryReader: Send + Sync {
    /// Persisted changesets in application order.
    async fn read_history(&self) -> StoreResult<Vec<PersistedChangeset>>;
}

/// A live target store.
#[async_trait]
pub trait GraphStore: HistoryReader {
    /// Opens a unit of work. Nothing it does is visible until it commits.
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;
}

/// One atomic unit of work against the store.
///
/// Dropping a transaction without committing discards its changes.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn execute(&mut self, statement: &str) -> StoreResult<()>;

    /// Evaluates a guard statement to a boolean without mutating the store.
    async fn evaluate(&mut self, guard: &str) -> StoreResult<bool>;

    /// Inserts a history record, or refreshes the existing record with the same id.
    async fn record(&mut self, changeset: PersistedChangeset) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
