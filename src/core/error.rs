use thiserror::Error;

/// Errors raised by a target store (the reference in-memory store or any
/// other backend plugged in through `connection`).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Unsupported statement: {0}")]
    UnsupportedStatement(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

/// Coarse classification of a [`MigrationError`].
///
/// Configuration, declared-changelog and history-consistency errors are all
/// detected before the first write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    DeclaredChangelog,
    HistoryConsistency,
    Execution,
    Halted,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::DeclaredChangelog => write!(f, "declared changelog"),
            ErrorCategory::HistoryConsistency => write!(f, "history consistency"),
            ErrorCategory::Execution => write!(f, "execution"),
            ErrorCategory::Halted => write!(f, "halted"),
        }
    }
}

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Invalid configuration:{}", format_errors(.0))]
    Configuration(Vec<String>),

    #[error("Changelog could not be parsed: {0}")]
    ChangelogParse(String),

    #[error("Invalid declared changelog:{}", format_errors(.0))]
    InvalidChangelog(Vec<String>),

    #[error("Changelog history is inconsistent:{}", format_errors(.0))]
    HistoryConsistency(Vec<String>),

    #[error("Could not connect to '{uri}': {reason}")]
    Connection { uri: String, reason: String },

    #[error("Could not read changelog history: {0}")]
    HistoryRead(#[source] StoreError),

    #[error("Changeset '{changeset}' failed: {source}")]
    Execution {
        changeset: String,
        #[source]
        source: StoreError,
    },

    #[error("Precondition of changeset '{changeset}' could not be evaluated: {source}")]
    PreconditionEvaluation {
        changeset: String,
        #[source]
        source: StoreError,
    },

    #[error("Migration halted at changeset '{changeset}': {reason}")]
    Halted { changeset: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MigrationError>;

impl MigrationError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            MigrationError::Configuration(_) => ErrorCategory::Configuration,
            MigrationError::ChangelogParse(_) | MigrationError::InvalidChangelog(_) => {
                ErrorCategory::DeclaredChangelog
            }
            MigrationError::HistoryConsistency(_) => ErrorCategory::HistoryConsistency,
            MigrationError::Connection { .. }
            | MigrationError::HistoryRead(_)
            | MigrationError::Execution { .. }
            | MigrationError::PreconditionEvaluation { .. }
            | MigrationError::Io(_) => ErrorCategory::Execution,
            MigrationError::Halted { .. } => ErrorCategory::Halted,
        }
    }

    /// A halt requested by the changelog itself is an expected outcome, not a defect.
    pub fn is_defect(&self) -> bool {
        !matches!(self, MigrationError::Halted { .. })
    }

    /// Individual violations for aggregated errors, or the single message otherwise.
    pub fn violations(&self) -> Vec<String> {
        match self {
            MigrationError::Configuration(errors)
            | MigrationError::InvalidChangelog(errors)
            | MigrationError::HistoryConsistency(errors) => errors.clone(),
            other => vec![other.to_string()],
        }
    }
}

fn format_errors(errors: &[String]) -> String {
    let separator = "\n\t - ";
    format!("{}{}", separator, errors.join(separator))
}
