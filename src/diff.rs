use crate::configuration::ExecutionContexts;
use crate::model::{predicates, Changeset, PersistedChangeset};
use std::collections::HashMap;

/// Computes which declared changesets must run now.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangelogDiffMaker;

impl ChangelogDiffMaker {
    pub fn new() -> Self {
        Self
    }

    /// Single linear pass over the declared changesets. The result is always a
    /// subsequence of `declared` in declaration order.
    ///
    /// A changeset is selected when it matches the active contexts and either
    /// was never applied, is `run_always`, or is `run_on_change` with content
    /// that moved since it was applied.
    pub fn compute_changesets_to_insert<'a>(
        &self,
        contexts: &ExecutionContexts,
        declared: &'a [Changeset],
        persisted: &[PersistedChangeset],
    ) -> Vec<&'a Changeset> {
        let persisted_by_id: HashMap<&str, &PersistedChangeset> = persisted
            .iter()
            .map(|record| (record.id.as_str(), record))
            .collect();

        declared
            .iter()
            .filter(|changeset| predicates::matches_contexts(contexts, changeset))
            .filter(|changeset| match persisted_by_id.get(changeset.id()) {
                None => true,
                Some(record) => {
                    predicates::run_always(changeset) || predicates::reapplicable(changeset, record)
                }
            })
            .collect()
    }
}
