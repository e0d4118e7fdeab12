// ============================================================================
// rustmigrate Library
// ============================================================================

pub mod configuration;
pub mod connection;
pub mod core;
pub mod diff;
pub mod model;
pub mod parser;
pub mod precondition;
pub mod runner;
pub mod storage;
pub mod transaction;
pub mod validation;
pub mod writer;

// Re-export main types for convenience
pub use configuration::{
    Configuration, ConfigurationBuilder, ConnectionParams, ExecutionContexts, RunMode,
    UndeclaredHistoryPolicy,
};
pub use core::{ErrorCategory, MigrationError, Result, StoreError};
pub use model::{Changeset, PersistedChangeset, Precondition, PreconditionPolicy, PreconditionQuery};
pub use parser::{ChangelogParser, JsonChangelogParser};
pub use runner::{MigrationRunner, RunReport, StatusReport};
pub use storage::{MemoryConnector, MemoryStore};
pub use writer::{ChangesetOutcome, ChangesetReport};

// ============================================================================
// High-level API
// ============================================================================

/// JSON changelogs applied to memory stores.
///
/// This is the recommended way to embed the engine. Use
/// [`MigrationRunner`] directly to plug in another changelog format or store.
///
/// # Examples
///
/// ```
/// use rustmigrate::{Configuration, Migrator};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let dir = tempfile::TempDir::new()?;
/// let changelog = dir.path().join("changelog.json");
/// std::fs::write(&changelog, r#"{"changesets": [
///     {"id": "users", "author": "alice", "queries": ["CREATE TABLE users (id INTEGER)"]}
/// ]}"#)?;
///
/// let configuration = Configuration::builder()
///     .with_master_changelog_location(changelog.to_string_lossy())
///     .with_uri("memory://app")
///     .with_run_mode()
///     .build()?;
///
/// let migrator = Migrator::new();
/// let report = migrator.migrate(&configuration).await?;
/// assert_eq!(report.applied(), vec!["users"]);
/// # Ok(())
/// # }
/// ```
pub struct Migrator {
    runner: MigrationRunner<JsonChangelogParser, MemoryConnector>,
}

impl Migrator {
    pub fn new() -> Self {
        Self::with_connector(MemoryConnector::new())
    }

    /// Uses a pre-configured connector, e.g. one requiring credentials or holding registered stores.
    pub fn with_connector(connector: MemoryConnector) -> Self {
        Self {
            runner: MigrationRunner::new(JsonChangelogParser::new(), connector),
        }
    }

    /// Reconciles the store with the changelog and applies what is missing.
    pub async fn migrate(&self, configuration: &Configuration) -> Result<RunReport> {
        self.runner.run_migrations(configuration).await
    }

    pub async fn status(&self, configuration: &Configuration) -> Result<StatusReport> {
        self.runner.status(configuration).await
    }

    /// Parses and validates a changelog without connecting to any store.
    pub async fn validate(&self, changelog: &str) -> Result<Vec<Changeset>> {
        self.runner.parse_changesets(changelog).await
    }

    pub fn connector(&self) -> &MemoryConnector {
        self.runner.connector()
    }
}

impl Default for Migrator {
    fn default() -> Self {
        Self::new()
    }
}
