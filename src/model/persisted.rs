use super::changeset::Changeset;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Historical record of a changeset applied (or marked as applied) to a store.
///
/// Owned by the target store's history. The engine only appends new records
/// and, for re-applied changesets, refreshes an existing record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedChangeset {
    pub id: String,
    pub author: String,
    pub checksum: String,
    pub applied_at: DateTime<Utc>,
    /// `false` when the changeset was only marked as executed by a
    /// `MARK_AS_EXECUTED` precondition policy.
    pub executed: bool,
    #[serde(default)]
    pub contexts: Vec<String>,
}

impl PersistedChangeset {
    pub fn new(id: impl Into<String>, checksum: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            author: String::new(),
            checksum: checksum.into(),
            applied_at: Utc::now(),
            executed: true,
            contexts: Vec::new(),
        }
    }

    /// Record for a changeset whose statements ran.
    pub fn executed(changeset: &Changeset) -> Self {
        Self::from_changeset(changeset, true)
    }

    /// Record for a changeset whose statements were skipped by its precondition policy.
    pub fn marked(changeset: &Changeset) -> Self {
        Self::from_changeset(changeset, false)
    }

    fn from_changeset(changeset: &Changeset, executed: bool) -> Self {
        Self {
            id: changeset.id().to_string(),
            author: changeset.author().to_string(),
            checksum: changeset.checksum().to_string(),
            applied_at: Utc::now(),
            executed,
            contexts: changeset.contexts().iter().cloned().collect(),
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_applied_at(mut self, applied_at: DateTime<Utc>) -> Self {
        self.applied_at = applied_at;
        self
    }

    pub fn with_executed(mut self, executed: bool) -> Self {
        self.executed = executed;
        self
    }
}
