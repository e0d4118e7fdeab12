use super::run::{discard, execution_failed, record_in};
use super::{ChangesetOutcome, WriteReport};
use crate::connection::{GraphStore, StoreTransaction};
use crate::core::{MigrationError, Result};
use crate::model::Changeset;
use crate::precondition::{ChangesetState, PreconditionExecutor, PreconditionPrinter, PreconditionResult};
use crate::storage::persistence::atomic_write;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{event, Level};

const MARKED_ANNOTATION: &str = "-- marked as executed (precondition not met): statements not run";

/// Renders the changesets a run would apply into a SQL script instead of applying them.
///
/// The whole preview runs in one store transaction that is always rolled
/// back: executed changesets run their statements and every applied changeset
/// is recorded there, so each guard sees what a run would have left behind
/// and the script lists exactly what a run would do.
#[derive(Debug, Clone)]
pub struct DryRunWriter {
    output: PathBuf,
    executor: PreconditionExecutor,
    printer: PreconditionPrinter,
}

impl DryRunWriter {
    pub fn new(output: impl Into<PathBuf>, executor: PreconditionExecutor, printer: PreconditionPrinter) -> Self {
        Self {
            output: output.into(),
            executor,
            printer,
        }
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub async fn write(&self, store: &dyn GraphStore, changesets: &[&Changeset]) -> Result<WriteReport> {
        let mut script = vec![
            "-- rustmigrate dry run".to_string(),
            format!("-- generated at {}", Utc::now().to_rfc3339()),
            format!("-- {} changeset(s) selected", changesets.len()),
        ];
        let mut report = WriteReport {
            output: Some(self.output.clone()),
            ..WriteReport::default()
        };
        let mut stopped = None;

        if let Some(first) = changesets.first() {
            let mut transaction = store
                .begin()
                .await
                .map_err(|source| execution_failed(first, source))?;
            for changeset in changesets {
                match self.simulate(transaction.as_mut(), changeset).await {
                    Ok((state, result)) => {
                        if let Err(err) = self.render(&mut script, &mut report, changeset, state, result.as_ref()) {
                            stopped = Some(err);
                            break;
                        }
                    }
                    Err(err) => {
                        script.push(String::new());
                        script.extend(comment(&format!("would fail: {}", err)));
                        stopped = Some(err);
                        break;
                    }
                }
            }
            discard(transaction, first).await;
        }

        let mut contents = script.join("\n");
        contents.push('\n');
        atomic_write(&self.output, contents.as_bytes()).await?;
        event!(
            Level::INFO,
            output = %self.output.display(),
            rendered = report.applied().len(),
            "dry-run script written"
        );

        match stopped {
            Some(err) => {
                if err.is_defect() {
                    event!(Level::ERROR, error = %err, "dry run stopped");
                } else {
                    event!(Level::WARN, error = %err, "dry run stopped by precondition");
                }
                Err(err)
            }
            None => Ok(report),
        }
    }

    /// Resolves the changeset's state and applies it to the preview transaction,
    /// so later guards see what a run would have left behind.
    async fn simulate(
        &self,
        transaction: &mut dyn StoreTransaction,
        changeset: &Changeset,
    ) -> Result<(ChangesetState, Option<PreconditionResult>)> {
        let (state, result) = self.executor.resolve_state(transaction, changeset).await?;
        if state.is_recorded() {
            record_in(transaction, changeset, state)
                .await
                .map_err(|source| execution_failed(changeset, source))?;
        }
        Ok((state, result))
    }

    /// Appends the changeset to the script. A halt is rendered, then returned as the error.
    fn render(
        &self,
        script: &mut Vec<String>,
        report: &mut WriteReport,
        changeset: &Changeset,
        state: ChangesetState,
        result: Option<&PreconditionResult>,
    ) -> Result<()> {
        script.push(String::new());
        match state {
            ChangesetState::Executing | ChangesetState::Marked => {
                let marked = state == ChangesetState::Marked;
                script.push(format!("-- {}", changeset));
                if !changeset.contexts().is_empty() {
                    let contexts: Vec<&str> = changeset.contexts().iter().map(String::as_str).collect();
                    script.push(format!("-- contexts: {}", contexts.join(",")));
                }
                script.extend(self.printer.print(changeset.precondition()));
                if marked {
                    script.push(MARKED_ANNOTATION.to_string());
                }
                for statement in changeset.statements() {
                    let statement = format!("{};", statement.trim().trim_end_matches(';'));
                    if marked {
                        script.extend(comment(&statement));
                    } else {
                        script.push(statement);
                    }
                }
                report.push(
                    changeset,
                    if marked { ChangesetOutcome::Marked } else { ChangesetOutcome::Executed },
                );
                Ok(())
            }
            ChangesetState::Skipped => {
                script.extend(comment(&self.printer.explain(changeset, state, result)));
                report.push(changeset, ChangesetOutcome::Skipped);
                Ok(())
            }
            ChangesetState::Halted => {
                script.extend(comment(&self.printer.explain(changeset, state, result)));
                Err(MigrationError::Halted {
                    changeset: changeset.id().to_string(),
                    reason: self.printer.halt_reason(changeset),
                })
            }
        }
    }
}

/// `-- ` on every line, so nothing in a comment block can run.
fn comment(text: &str) -> impl Iterator<Item = String> + '_ {
    text.lines().map(|line| format!("-- {}", line))
}
