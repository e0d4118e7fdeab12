use crate::connection::StoreTransaction;
use crate::core::{MigrationError, Result, StoreResult};
use crate::model::{Changeset, PreconditionPolicy, PreconditionQuery};
use async_recursion::async_recursion;
use std::fmt;

/// Terminal state of a changeset selected by the diff.
///
/// ```text
/// PENDING ──(no precondition)──────────────────> EXECUTING
///    │
///    └──> EVALUATING ──guard holds──────────────> EXECUTING
///              │
///              └──guard fails──> policy: CONTINUE ─────────> SKIPPED
///                                        MARK_AS_EXECUTED ─> MARKED
///                                        HALT ─────────────> HALTED
/// ```
///
/// `PENDING` and `EVALUATING` are transient: a changeset never leaves the
/// executor in either of them, so only the terminal states are modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangesetState {
    Executing,
    Marked,
    Skipped,
    Halted,
}

impl ChangesetState {
    /// State reached from `EVALUATING` (or directly from `PENDING` when there is no precondition).
    pub fn resolve(result: Option<&PreconditionResult>) -> Self {
        match result {
            None => ChangesetState::Executing,
            Some(result) if result.met => ChangesetState::Executing,
            Some(result) => match result.policy {
                PreconditionPolicy::Continue => ChangesetState::Skipped,
                PreconditionPolicy::MarkAsExecuted => ChangesetState::Marked,
                PreconditionPolicy::Halt => ChangesetState::Halted,
            },
        }
    }

    /// The changeset ends up in the store's history.
    pub fn is_recorded(&self) -> bool {
        matches!(self, ChangesetState::Executing | ChangesetState::Marked)
    }
}

impl fmt::Display for ChangesetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangesetState::Executing => write!(f, "EXECUTING"),
            ChangesetState::Marked => write!(f, "MARKED"),
            ChangesetState::Skipped => write!(f, "SKIPPED"),
            ChangesetState::Halted => write!(f, "HALTED"),
        }
    }
}

/// Outcome of evaluating a changeset's guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreconditionResult {
    pub policy: PreconditionPolicy,
    pub met: bool,
}

/// Evaluates preconditions against the live store.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreconditionExecutor;

impl PreconditionExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Evaluates the guard of `changeset` inside `transaction`.
    ///
    /// Returns `None` when the changeset has no precondition.
    pub async fn execute_precondition(
        &self,
        transaction: &mut dyn StoreTransaction,
        changeset: &Changeset,
    ) -> Result<Option<PreconditionResult>> {
        let Some(precondition) = changeset.precondition() else {
            return Ok(None);
        };
        let Some(policy) = precondition.policy() else {
            return Err(MigrationError::InvalidChangelog(vec![format!(
                "Precondition of changeset '{}' must declare a policy",
                changeset.id()
            )]));
        };

        let met = evaluate_query(transaction, precondition.query())
            .await
            .map_err(|source| MigrationError::PreconditionEvaluation {
                changeset: changeset.id().to_string(),
                source,
            })?;

        Ok(Some(PreconditionResult { policy, met }))
    }

    /// Drives a changeset from `PENDING` to its terminal state.
    pub async fn resolve_state(
        &self,
        transaction: &mut dyn StoreTransaction,
        changeset: &Changeset,
    ) -> Result<(ChangesetState, Option<PreconditionResult>)> {
        let result = self.execute_precondition(transaction, changeset).await?;
        Ok((ChangesetState::resolve(result.as_ref()), result))
    }
}

/// `AND` / `OR` short-circuit from left to right.
#[async_recursion]
async fn evaluate_query(
    transaction: &mut dyn StoreTransaction,
    query: &PreconditionQuery,
) -> StoreResult<bool> {
    match query {
        PreconditionQuery::Simple(guard) => transaction.evaluate(guard).await,
        PreconditionQuery::And(queries) => {
            for query in queries {
                if !evaluate_query(transaction, query).await? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        PreconditionQuery::Or(queries) => {
            for query in queries {
                if evaluate_query(transaction, query).await? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}
