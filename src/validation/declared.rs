use crate::model::Changeset;
use std::collections::HashSet;

/// Structural checks on the declared changelog, performed before any connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredChangesetValidator;

impl DeclaredChangesetValidator {
    pub fn new() -> Self {
        Self
    }

    /// Returns every violation found; an empty list means the changelog is valid.
    pub fn validate(&self, changesets: &[Changeset]) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.validate_identities(changesets));
        errors.extend(self.validate_unique_ids(changesets));
        for changeset in changesets {
            errors.extend(self.validate_statements(changeset));
            errors.extend(self.validate_precondition(changeset));
        }
        errors
    }

    fn validate_identities(&self, changesets: &[Changeset]) -> Vec<String> {
        let mut errors = Vec::new();
        for (position, changeset) in changesets.iter().enumerate() {
            if changeset.id().trim().is_empty() {
                errors.push(format!(
                    "Changeset at position {} has a blank ID",
                    position + 1
                ));
            }
            if changeset.author().trim().is_empty() {
                errors.push(format!(
                    "Changeset '{}' has a blank author",
                    changeset.id()
                ));
            }
        }
        errors
    }

    fn validate_unique_ids(&self, changesets: &[Changeset]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut reported = HashSet::new();
        let mut errors = Vec::new();
        for changeset in changesets {
            let id = changeset.id();
            if !seen.insert(id) && reported.insert(id) {
                errors.push(format!(
                    "Changeset IDs must be unique. Duplicated ID: '{}'",
                    id
                ));
            }
        }
        errors
    }

    fn validate_statements(&self, changeset: &Changeset) -> Vec<String> {
        let statements = changeset.statements();
        if statements.iter().all(|statement| statement.trim().is_empty()) {
            return vec![format!(
                "Changeset '{}' must declare at least one non-empty statement",
                changeset.id()
            )];
        }

        statements
            .iter()
            .enumerate()
            .filter(|(_, statement)| statement.trim().is_empty())
            .map(|(position, _)| {
                format!(
                    "Changeset '{}' has an empty statement at position {}",
                    changeset.id(),
                    position + 1
                )
            })
            .collect()
    }

    fn validate_precondition(&self, changeset: &Changeset) -> Vec<String> {
        let Some(precondition) = changeset.precondition() else {
            return Vec::new();
        };

        let mut errors = Vec::new();
        if precondition.query().is_blank() {
            errors.push(format!(
                "Precondition of changeset '{}' must declare a non-empty guard query",
                changeset.id()
            ));
        }
        if precondition.policy().is_none() {
            errors.push(format!(
                "Precondition of changeset '{}' must declare a policy (CONTINUE, MARK_AS_EXECUTED or HALT)",
                changeset.id()
            ));
        }
        errors
    }
}
