//! Applies, or previews, the changesets selected by the diff.
//!
//! Both strategies share one contract ([`ChangelogWriter::write`]) and are
//! picked once by [`Configuration::resolve_writer`](crate::configuration::Configuration::resolve_writer).

pub mod dry_run;
pub mod run;

pub use dry_run::DryRunWriter;
pub use run::RunWriter;

use crate::connection::GraphStore;
use crate::core::Result;
use crate::model::Changeset;
use crate::precondition::ChangesetState;
use std::fmt;
use std::path::PathBuf;

/// What happened to a changeset that did not stop the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangesetOutcome {
    Executed,
    Marked,
    Skipped,
}

impl ChangesetOutcome {
    /// `None` for `HALTED`, which never produces an outcome.
    pub fn from_state(state: ChangesetState) -> Option<Self> {
        match state {
            ChangesetState::Executing => Some(ChangesetOutcome::Executed),
            ChangesetState::Marked => Some(ChangesetOutcome::Marked),
            ChangesetState::Skipped => Some(ChangesetOutcome::Skipped),
            ChangesetState::Halted => None,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, ChangesetOutcome::Executed | ChangesetOutcome::Marked)
    }
}

impl fmt::Display for ChangesetOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            ChangesetOutcome::Executed => "executed",
            ChangesetOutcome::Marked => "marked",
            ChangesetOutcome::Skipped => "skipped",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangesetReport {
    pub id: String,
    pub author: String,
    pub state: ChangesetOutcome,
}

/// Per-changeset outcomes of one write, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub outcomes: Vec<ChangesetReport>,
    /// Script written by a dry run.
    pub output: Option<PathBuf>,
}

impl WriteReport {
    pub(crate) fn push(&mut self, changeset: &Changeset, state: ChangesetOutcome) {
        self.outcomes.push(ChangesetReport {
            id: changeset.id().to_string(),
            author: changeset.author().to_string(),
            state,
        });
    }

    /// Identifiers that were executed or marked as executed.
    pub fn applied(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.state.is_applied())
            .map(|outcome| outcome.id.as_str())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub enum ChangelogWriter {
    Run(RunWriter),
    DryRun(DryRunWriter),
}

impl ChangelogWriter {
    /// Processes `changesets` strictly in order. Stops at the first halt or failure.
    pub async fn write(&self, store: &dyn GraphStore, changesets: &[&Changeset]) -> Result<WriteReport> {
        match self {
            ChangelogWriter::Run(writer) => writer.write(store, changesets).await,
            ChangelogWriter::DryRun(writer) => writer.write(store, changesets).await,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        matches!(self, ChangelogWriter::DryRun(_))
    }
}
