use super::{ChangesetOutcome, WriteReport};
use crate::connection::{GraphStore, StoreTransaction};
use crate::core::{MigrationError, Result, StoreError, StoreResult};
use crate::model::{Changeset, PersistedChangeset};
use crate::precondition::{ChangesetState, PreconditionExecutor, PreconditionPrinter};
use tracing::{event, Level};

/// Applies changesets to the store, one transaction per changeset.
///
/// A failing changeset rolls back only its own transaction: everything
/// committed before it stays committed.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunWriter {
    executor: PreconditionExecutor,
    printer: PreconditionPrinter,
}

impl RunWriter {
    pub fn new(executor: PreconditionExecutor, printer: PreconditionPrinter) -> Self {
        Self { executor, printer }
    }

    pub async fn write(&self, store: &dyn GraphStore, changesets: &[&Changeset]) -> Result<WriteReport> {
        let mut report = WriteReport::default();
        for changeset in changesets {
            let outcome = self.apply(store, changeset).await?;
            report.push(changeset, outcome);
        }

        event!(
            Level::INFO,
            applied = report.applied().len(),
            processed = report.outcomes.len(),
            "changelog applied"
        );
        Ok(report)
    }

    async fn apply(&self, store: &dyn GraphStore, changeset: &Changeset) -> Result<ChangesetOutcome> {
        event!(Level::DEBUG, changeset = %changeset.id(), "PENDING");
        let mut transaction = store
            .begin()
            .await
            .map_err(|source| execution_failed(changeset, source))?;

        if changeset.precondition().is_some() {
            event!(Level::DEBUG, changeset = %changeset.id(), "EVALUATING");
        }
        let (state, result) = match self.executor.resolve_state(transaction.as_mut(), changeset).await {
            Ok(resolved) => resolved,
            Err(err) => {
                discard(transaction, changeset).await;
                event!(Level::ERROR, changeset = %changeset.id(), error = %err, "precondition evaluation failed");
                return Err(err);
            }
        };
        event!(Level::DEBUG, changeset = %changeset.id(), state = %state, "precondition resolved");

        match state {
            ChangesetState::Executing | ChangesetState::Marked => {
                let written = match record_in(transaction.as_mut(), changeset, state).await {
                    Ok(()) => transaction.commit().await,
                    Err(err) => {
                        discard(transaction, changeset).await;
                        Err(err)
                    }
                };
                if let Err(source) = written {
                    event!(Level::ERROR, changeset = %changeset.id(), error = %source, "changeset failed");
                    return Err(execution_failed(changeset, source));
                }

                if state == ChangesetState::Marked {
                    event!(Level::INFO, "{}", self.printer.explain(changeset, state, result.as_ref()));
                    Ok(ChangesetOutcome::Marked)
                } else {
                    event!(Level::INFO, changeset = %changeset.id(), author = %changeset.author(), "changeset executed");
                    Ok(ChangesetOutcome::Executed)
                }
            }
            ChangesetState::Skipped => {
                discard(transaction, changeset).await;
                event!(Level::INFO, "{}", self.printer.explain(changeset, state, result.as_ref()));
                Ok(ChangesetOutcome::Skipped)
            }
            ChangesetState::Halted => {
                discard(transaction, changeset).await;
                event!(Level::WARN, "{}", self.printer.explain(changeset, state, result.as_ref()));
                Err(MigrationError::Halted {
                    changeset: changeset.id().to_string(),
                    reason: self.printer.halt_reason(changeset),
                })
            }
        }
    }
}

/// Runs the statements (unless marked) and writes the history record in the same unit of work.
pub(super) async fn record_in(
    transaction: &mut dyn StoreTransaction,
    changeset: &Changeset,
    state: ChangesetState,
) -> StoreResult<()> {
    let record = if state == ChangesetState::Marked {
        PersistedChangeset::marked(changeset)
    } else {
        for statement in changeset.statements() {
            transaction.execute(statement).await?;
        }
        PersistedChangeset::executed(changeset)
    };
    transaction.record(record).await
}

/// Rolls back, keeping the original failure as the one reported.
pub(super) async fn discard(transaction: Box<dyn StoreTransaction>, changeset: &Changeset) {
    if let Err(err) = transaction.rollback().await {
        event!(Level::WARN, changeset = %changeset.id(), error = %err, "rollback failed");
    }
}

pub(super) fn execution_failed(changeset: &Changeset, source: StoreError) -> MigrationError {
    MigrationError::Execution {
        changeset: changeset.id().to_string(),
        source,
    }
}
