use super::catalog::Catalog;
use super::persistence::SnapshotFile;
use super::sql::SqlAdapter;
use super::table::Table;
use crate::connection::{GraphStore, HistoryReader, StoreTransaction};
use crate::core::StoreResult;
use crate::model::PersistedChangeset;
use crate::transaction::{Transaction, TransactionId};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Reference store: a SQL catalog kept in memory, optionally snapshotted to disk.
///
/// Clones share the same catalog. Transactions are serialised: one holds the
/// catalog lock from `begin` until it commits, rolls back or is dropped.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    catalog: Arc<Mutex<Catalog>>,
    snapshot: Option<SnapshotFile>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a file-backed store, loading the existing snapshot if there is one.
    pub async fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let snapshot = SnapshotFile::new(path);
        let catalog = snapshot.load().await?.unwrap_or_default();
        log::info!(
            "Opened store {} ({} tables, {} history records)",
            snapshot.path().display(),
            catalog.table_count(),
            catalog.history().len()
        );
        Ok(Self {
            catalog: Arc::new(Mutex::new(catalog)),
            snapshot: Some(snapshot),
        })
    }

    pub fn is_persistent(&self) -> bool {
        self.snapshot.is_some()
    }

    pub async fn table_names(&self) -> Vec<String> {
        self.catalog.lock().await.table_names()
    }

    pub async fn table(&self, name: &str) -> Option<Table> {
        self.catalog.lock().await.table(name).ok().cloned()
    }

    /// `None` when the table does not exist.
    pub async fn row_count(&self, table: &str) -> Option<usize> {
        self.catalog
            .lock()
            .await
            .table(table)
            .ok()
            .map(Table::row_count)
    }

    pub async fn history(&self) -> Vec<PersistedChangeset> {
        self.catalog.lock().await.history().to_vec()
    }

    /// Every statement committed so far, in order.
    pub async fn executed_statements(&self) -> Vec<String> {
        self.catalog.lock().await.executed_statements().to_vec()
    }
}

#[async_trait]
impl HistoryReader for MemoryStore {
    async fn read_history(&self) -> StoreResult<Vec<PersistedChangeset>> {
        Ok(self.history().await)
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let guard = self.catalog.clone().lock_owned().await;
        let working = guard.clone();
        let txn = Transaction::begin();
        log::debug!("{} started", txn.id());

        Ok(Box::new(MemoryTransaction {
            txn,
            guard,
            working,
            snapshot: self.snapshot.clone(),
            adapter: SqlAdapter::new(),
        }))
    }
}

/// Works on a private copy of the catalog and publishes it on commit.
pub struct MemoryTransaction {
    txn: Transaction,
    guard: OwnedMutexGuard<Catalog>,
    working: Catalog,
    snapshot: Option<SnapshotFile>,
    adapter: SqlAdapter,
}

impl MemoryTransaction {
    pub fn id(&self) -> TransactionId {
        self.txn.id()
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn execute(&mut self, statement: &str) -> StoreResult<()> {
        log::debug!("{} executing: {}", self.txn.id(), statement.trim());
        let adapter = &self.adapter;
        let working = &mut self.working;
        self.txn.track(|| adapter.execute(working, statement))?;
        Ok(())
    }

    async fn evaluate(&mut self, guard: &str) -> StoreResult<bool> {
        self.txn.ensure_active()?;
        let result = self.adapter.evaluate(&self.working, guard)?;
        log::debug!("{} guard {} -> {}", self.txn.id(), guard.trim(), result);
        Ok(result)
    }

    async fn record(&mut self, changeset: PersistedChangeset) -> StoreResult<()> {
        let working = &mut self.working;
        self.txn.track(|| {
            working.record(changeset);
            Ok(())
        })
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let mut this = self;
        this.txn.ensure_active()?;
        let working = std::mem::take(&mut this.working);
        if let Some(snapshot) = &this.snapshot {
            snapshot.save(&working).await?;
        }
        this.txn.commit()?;
        *this.guard = working;
        log::debug!(
            "{} committed after {} statements in {:?}",
            this.txn.id(),
            this.txn.statement_count(),
            this.txn.duration()
        );
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        let mut this = self;
        this.txn.rollback()?;
        log::debug!("{} rolled back", this.txn.id());
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if !self.txn.state().is_terminal() {
            log::debug!("{} dropped while {}, discarding changes", self.txn.id(), self.txn.state());
        }
    }
}
