use crate::configuration::UndeclaredHistoryPolicy;
use crate::model::{predicates, Changeset, PersistedChangeset};
use std::collections::HashMap;
use tracing::warn;

/// Cross-checks the declared changelog against the history read from the store.
#[derive(Debug, Clone, Copy, Default)]
pub struct PersistedChangesetValidator {
    undeclared: UndeclaredHistoryPolicy,
}

impl PersistedChangesetValidator {
    pub fn new(undeclared: UndeclaredHistoryPolicy) -> Self {
        Self { undeclared }
    }

    /// Returns every violation found; an empty list means the history is consistent.
    ///
    /// An applied changeset whose content changed is only legitimate when it is
    /// flagged `run_on_change`.
    pub fn validate(&self, declared: &[Changeset], persisted: &[PersistedChangeset]) -> Vec<String> {
        let declared_by_id: HashMap<&str, &Changeset> = declared
            .iter()
            .map(|changeset| (changeset.id(), changeset))
            .collect();

        let mut errors = Vec::new();
        for record in persisted {
            match declared_by_id.get(record.id.as_str()) {
                Some(changeset) => {
                    if predicates::checksum_changed(changeset, record)
                        && !predicates::run_on_change(changeset)
                    {
                        errors.push(format!(
                            "Changeset '{}' (author: {}) has conflicted checksums: declared {}, persisted {}. \
                             The changelog was modified after being applied",
                            changeset.id(),
                            changeset.author(),
                            changeset.checksum(),
                            record.checksum
                        ));
                    }
                }
                None => match self.undeclared {
                    UndeclaredHistoryPolicy::Ignore => {}
                    UndeclaredHistoryPolicy::Warn => {
                        warn!(changeset = %record.id, "persisted changeset is no longer declared");
                    }
                    UndeclaredHistoryPolicy::Error => errors.push(format!(
                        "Persisted changeset '{}' (applied {}) is no longer declared",
                        record.id,
                        record.applied_at.to_rfc3339()
                    )),
                },
            }
        }
        errors
    }
}
