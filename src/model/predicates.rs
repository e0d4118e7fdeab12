//! Composable predicates over a changeset's declared fields.

use super::{Changeset, PersistedChangeset};
use crate::configuration::ExecutionContexts;

/// A changeset without contexts always matches; otherwise it must share at
/// least one label with the active contexts. No active contexts means no
/// filtering at all.
pub fn matches_contexts(active: &ExecutionContexts, changeset: &Changeset) -> bool {
    if active.is_unconditional() || changeset.contexts().is_empty() {
        return true;
    }
    changeset
        .contexts()
        .iter()
        .any(|context| active.contains(context))
}

pub fn run_on_change(changeset: &Changeset) -> bool {
    changeset.is_run_on_change()
}

pub fn run_always(changeset: &Changeset) -> bool {
    changeset.is_run_always()
}

/// The declared content differs from what was recorded at application time.
pub fn checksum_changed(changeset: &Changeset, persisted: &PersistedChangeset) -> bool {
    changeset.checksum() != persisted.checksum
}

/// Re-execution is legitimate: the changeset is flagged `run_on_change` and its content moved.
pub fn reapplicable(changeset: &Changeset, persisted: &PersistedChangeset) -> bool {
    run_on_change(changeset) && checksum_changed(changeset, persisted)
}
