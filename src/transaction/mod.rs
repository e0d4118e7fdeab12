// ============================================================================
// Transaction Management Module
// ============================================================================
//
// Identity and lifecycle of the units of work opened by a store. Isolation
// itself is the store's job (see storage::memory).
//
// ============================================================================

pub mod state;

pub use state::{Transaction, TransactionId, TransactionState};
