//! Reconcile and apply: the one entry point of the migration engine.

use crate::configuration::Configuration;
use crate::connection::{Connector, GraphStore, HistoryReader};
use crate::core::{MigrationError, Result};
use crate::diff::ChangelogDiffMaker;
use crate::model::{Changeset, PersistedChangeset};
use crate::parser::ChangelogParser;
use crate::precondition::{PreconditionExecutor, PreconditionPrinter};
use crate::validation::{DeclaredChangesetValidator, PersistedChangesetValidator};
use crate::writer::{ChangesetOutcome, ChangesetReport};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{event, info_span, Instrument, Level};
use uuid::Uuid;

/// Outcome of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Changesets declared by the changelog.
    pub declared: usize,
    /// Changesets selected by the diff.
    pub selected: usize,
    pub outcomes: Vec<ChangesetReport>,
    pub dry_run_output: Option<PathBuf>,
}

impl RunReport {
    /// Identifiers executed or marked as executed, in order.
    pub fn applied(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.state.is_applied())
            .map(|outcome| outcome.id.as_str())
            .collect()
    }

    pub fn count(&self, state: ChangesetOutcome) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.state == state).count()
    }
}

/// Declared changelog against the store's history, without writing anything.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub declared: usize,
    pub persisted: Vec<PersistedChangeset>,
    /// What the next run would select, in order.
    pub pending: Vec<Changeset>,
}

/// Validated inputs of a run, read before the first write.
struct Reconciliation {
    declared: Vec<Changeset>,
    store: Arc<dyn GraphStore>,
    persisted: Vec<PersistedChangeset>,
}

pub struct MigrationRunner<P, C> {
    parser: P,
    connector: C,
    diff_maker: ChangelogDiffMaker,
    precondition_executor: PreconditionExecutor,
    precondition_printer: PreconditionPrinter,
    declared_validator: DeclaredChangesetValidator,
}

impl<P: ChangelogParser, C: Connector> MigrationRunner<P, C> {
    pub fn new(parser: P, connector: C) -> Self {
        Self {
            parser,
            connector,
            diff_maker: ChangelogDiffMaker::new(),
            precondition_executor: PreconditionExecutor::new(),
            precondition_printer: PreconditionPrinter::new(),
            declared_validator: DeclaredChangesetValidator::new(),
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Parses and validates the declared changelog. Never touches a store.
    pub async fn parse_changesets(&self, location: &str) -> Result<Vec<Changeset>> {
        let declared = self.parser.parse(location).await?;
        let errors = self.declared_validator.validate(&declared);
        if !errors.is_empty() {
            return Err(MigrationError::InvalidChangelog(errors));
        }
        Ok(declared)
    }

    /// Applies (or previews) the changesets the store is missing.
    ///
    /// Every validation error is raised before the first write. A failing
    /// changeset stops the run; the ones committed before it stay committed.
    pub async fn run_migrations(&self, configuration: &Configuration) -> Result<RunReport> {
        let span = info_span!(
            "migration.run",
            run_id = %Uuid::new_v4(),
            changelog = %configuration.master_changelog(),
            dry_run = configuration.run_mode().is_dry_run()
        );

        async {
            let result = self.reconcile_and_apply(configuration).await;
            match &result {
                Ok(report) => event!(
                    Level::INFO,
                    declared = report.declared,
                    selected = report.selected,
                    applied = report.applied().len(),
                    "migration finished"
                ),
                Err(err) if err.is_defect() => {
                    event!(Level::ERROR, category = %err.category(), error = %err, "migration failed")
                }
                Err(err) => event!(Level::WARN, error = %err, "migration halted"),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// What the next run would select.
    pub async fn status(&self, configuration: &Configuration) -> Result<StatusReport> {
        let reconciliation = self.reconcile(configuration).await?;
        let pending = self
            .diff_maker
            .compute_changesets_to_insert(
                configuration.execution_contexts(),
                &reconciliation.declared,
                &reconciliation.persisted,
            )
            .into_iter()
            .cloned()
            .collect();

        Ok(StatusReport {
            declared: reconciliation.declared.len(),
            persisted: reconciliation.persisted,
            pending,
        })
    }

    async fn reconcile_and_apply(&self, configuration: &Configuration) -> Result<RunReport> {
        let reconciliation = self.reconcile(configuration).await?;
        let selected = self.diff_maker.compute_changesets_to_insert(
            configuration.execution_contexts(),
            &reconciliation.declared,
            &reconciliation.persisted,
        );
        event!(
            Level::INFO,
            declared = reconciliation.declared.len(),
            persisted = reconciliation.persisted.len(),
            selected = selected.len(),
            contexts = %configuration.execution_contexts(),
            "changelog diff computed"
        );

        let writer = configuration.resolve_writer(self.precondition_executor, self.precondition_printer);
        let written = writer.write(reconciliation.store.as_ref(), &selected).await?;

        Ok(RunReport {
            declared: reconciliation.declared.len(),
            selected: selected.len(),
            outcomes: written.outcomes,
            dry_run_output: written.output,
        })
    }

    /// Parse, validate, connect, read and validate the history, in that order.
    async fn reconcile(&self, configuration: &Configuration) -> Result<Reconciliation> {
        let declared = self.parse_changesets(configuration.master_changelog()).await?;

        let store = self.connector.connect(configuration.connection()).await?;
        let persisted = store
            .read_history()
            .await
            .map_err(MigrationError::HistoryRead)?;

        let errors = PersistedChangesetValidator::new(configuration.undeclared_history())
            .validate(&declared, &persisted);
        if !errors.is_empty() {
            return Err(MigrationError::HistoryConsistency(errors));
        }

        Ok(Reconciliation {
            declared,
            store,
            persisted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::JsonChangelogParser;
    use crate::storage::MemoryConnector;
    use tempfile::TempDir;

    async fn changelog(dir: &TempDir, json: &str) -> String {
        let path = dir.path().join("changelog.json");
        tokio::fs::write(&path, json).await.unwrap();
        path.to_string_lossy().into_owned()
    }

    fn configuration(changelog: &str) -> Configuration {
        Configuration::builder()
            .with_master_changelog_location(changelog)
            .with_uri("memory://runner")
            .with_run_mode()
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_second_run_applies_nothing() {
        let dir = TempDir::new().unwrap();
        let location = changelog(
            &dir,
            r#"{"changesets": [
                {"id": "users", "author": "alice", "queries": ["CREATE TABLE users (id INTEGER)"]},
                {"id": "seed", "author": "alice", "queries": ["INSERT INTO users VALUES (1)"]}
            ]}"#,
        )
        .await;
        let runner = MigrationRunner::new(JsonChangelogParser::new(), MemoryConnector::new());
        let configuration = configuration(&location);

        let first = runner.run_migrations(&configuration).await.unwrap();
        assert_eq!(first.declared, 2);
        assert_eq!(first.applied(), vec!["users", "seed"]);

        let second = runner.run_migrations(&configuration).await.unwrap();
        assert_eq!(second.selected, 0);
        assert!(second.applied().is_empty());
        assert_eq!(runner.connector().store("runner").await.row_count("users").await, Some(1));
    }

    #[tokio::test]
    async fn test_status_lists_pending_changesets() {
        let dir = TempDir::new().unwrap();
        let location = changelog(
            &dir,
            r#"{"changesets": [{"id": "users", "author": "alice", "queries": ["CREATE TABLE users (id INTEGER)"]}]}"#,
        )
        .await;
        let runner = MigrationRunner::new(JsonChangelogParser::new(), MemoryConnector::new());
        let configuration = configuration(&location);

        let before = runner.status(&configuration).await.unwrap();
        assert_eq!(before.pending.len(), 1);
        assert!(before.persisted.is_empty());

        runner.run_migrations(&configuration).await.unwrap();
        let after = runner.status(&configuration).await.unwrap();
        assert!(after.pending.is_empty());
        assert_eq!(after.persisted.len(), 1);
    }
}
