// ============================================================================
// Transaction State Management
// ============================================================================
//
// Every changeset is applied inside its own transaction.
// Lifecycle: Active -> Committed | Aborted, with Failed in between once a
// statement has errored (only rollback is accepted from there).
//
// ============================================================================

use crate::core::{StoreError, StoreResult};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global transaction ID counter
static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl TransactionId {
    pub fn new() -> Self {
        TransactionId(NEXT_TXN_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn_{}", self.0)
    }
}

/// State transitions:
/// ```text
/// Active ──commit──────────────> Committed
///   │ │
///   │ └──statement error──> Failed ──rollback──> Aborted
///   │
///   └──rollback──────────────────────────────> Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    /// A statement failed; the work done so far can only be discarded.
    Failed,
    Committed,
    Aborted,
}

impl TransactionState {
    pub fn is_active(&self) -> bool {
        matches!(self, TransactionState::Active)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionState::Committed | TransactionState::Aborted)
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionState::Active => write!(f, "ACTIVE"),
            TransactionState::Failed => write!(f, "FAILED"),
            TransactionState::Committed => write!(f, "COMMITTED"),
            TransactionState::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// Bookkeeping shared by store transactions: identity, state and counters.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    state: TransactionState,
    statement_count: usize,
    start_time: std::time::Instant,
}

impl Transaction {
    pub fn begin() -> Self {
        Self {
            id: TransactionId::new(),
            state: TransactionState::Active,
            statement_count: 0,
            start_time: std::time::Instant::now(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn statement_count(&self) -> usize {
        self.statement_count
    }

    pub fn duration(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Fails unless the transaction still accepts work.
    pub fn ensure_active(&self) -> StoreResult<()> {
        if !self.state.is_active() {
            return Err(StoreError::ExecutionError(format!(
                "Transaction {} is {}; only rollback is possible",
                self.id, self.state
            )));
        }
        Ok(())
    }

    /// Runs `work` as one statement, moving to `Failed` if it errors.
    pub fn track<T>(&mut self, work: impl FnOnce() -> StoreResult<T>) -> StoreResult<T> {
        self.ensure_active()?;
        match work() {
            Ok(value) => {
                self.statement_count += 1;
                Ok(value)
            }
            Err(err) => {
                self.state = TransactionState::Failed;
                Err(err)
            }
        }
    }

    pub fn commit(&mut self) -> StoreResult<()> {
        if !self.state.is_active() {
            return Err(StoreError::ExecutionError(format!(
                "Cannot commit: transaction {} is {}",
                self.id, self.state
            )));
        }
        self.state = TransactionState::Committed;
        Ok(())
    }

    pub fn rollback(&mut self) -> StoreResult<()> {
        if self.state.is_terminal() {
            return Err(StoreError::ExecutionError(format!(
                "Cannot rollback: transaction {} is already {}",
                self.id, self.state
            )));
        }
        self.state = TransactionState::Aborted;
        Ok(())
    }
}
