//! Immutable, validated run configuration.
//!
//! A [`Configuration`] can only be obtained from [`ConfigurationBuilder::build`],
//! which either returns a fully valid value or every violation at once.

pub mod builder;
pub mod validators;

pub use builder::ConfigurationBuilder;

use crate::precondition::{PreconditionExecutor, PreconditionPrinter};
use crate::writer::{ChangelogWriter, DryRunWriter, RunWriter};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Active execution-context labels. Empty means no context filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionContexts {
    labels: BTreeSet<String>,
}

impl ExecutionContexts {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels
                .into_iter()
                .map(Into::into)
                .map(|label: String| label.trim().to_string())
                .filter(|label| !label.is_empty())
                .collect(),
        }
    }

    pub fn is_unconditional(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

impl fmt::Display for ExecutionContexts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.labels.is_empty() {
            return write!(f, "<all>");
        }
        write!(f, "{}", self.labels.iter().cloned().collect::<Vec<_>>().join(","))
    }
}

/// How the target store is reached. Credentials are either both set or both unset.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    uri: String,
    username: Option<String>,
    password: Option<String>,
}

impl ConnectionParams {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            username: None,
            password: None,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Username and password, when both are set.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(username), Some(password)) => Some((username, password)),
            _ => None,
        }
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Whether changesets are applied or only rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    Run,
    DryRun { output_directory: PathBuf },
}

impl RunMode {
    pub fn is_dry_run(&self) -> bool {
        matches!(self, RunMode::DryRun { .. })
    }
}

/// Treatment of history records whose identifier is no longer declared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UndeclaredHistoryPolicy {
    Ignore,
    #[default]
    Warn,
    Error,
}

impl FromStr for UndeclaredHistoryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(UndeclaredHistoryPolicy::Ignore),
            "warn" => Ok(UndeclaredHistoryPolicy::Warn),
            "error" => Ok(UndeclaredHistoryPolicy::Error),
            other => Err(format!(
                "Unknown undeclared-history policy '{}' (expected ignore, warn or error)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Configuration {
    master_changelog: String,
    connection: ConnectionParams,
    execution_contexts: ExecutionContexts,
    run_mode: RunMode,
    undeclared_history: UndeclaredHistoryPolicy,
}

impl Configuration {
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::new()
    }

    pub fn master_changelog(&self) -> &str {
        &self.master_changelog
    }

    pub fn connection(&self) -> &ConnectionParams {
        &self.connection
    }

    pub fn execution_contexts(&self) -> &ExecutionContexts {
        &self.execution_contexts
    }

    pub fn run_mode(&self) -> &RunMode {
        &self.run_mode
    }

    pub fn undeclared_history(&self) -> UndeclaredHistoryPolicy {
        self.undeclared_history
    }

    /// Dry-run script location, when running in dry-run mode.
    pub fn dry_run_output(&self) -> Option<PathBuf> {
        match &self.run_mode {
            RunMode::Run => None,
            RunMode::DryRun { output_directory } => Some(dry_run_file(output_directory)),
        }
    }

    /// Picks the writer strategy matching the run mode.
    pub fn resolve_writer(
        &self,
        precondition_executor: PreconditionExecutor,
        precondition_printer: PreconditionPrinter,
    ) -> ChangelogWriter {
        match &self.run_mode {
            RunMode::Run => ChangelogWriter::Run(RunWriter::new(
                precondition_executor,
                precondition_printer,
            )),
            RunMode::DryRun { output_directory } => ChangelogWriter::DryRun(DryRunWriter::new(
                dry_run_file(output_directory),
                precondition_executor,
                precondition_printer,
            )),
        }
    }
}

pub const DRY_RUN_FILE_NAME: &str = "output.sql";

fn dry_run_file(output_directory: &Path) -> PathBuf {
    output_directory.join(DRY_RUN_FILE_NAME)
}
