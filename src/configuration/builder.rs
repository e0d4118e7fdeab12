use super::validators::{
    validate_credentials, validate_execution_contexts, validate_execution_mode,
    validate_mandatory_options,
};
use super::{Configuration, ConnectionParams, ExecutionContexts, RunMode, UndeclaredHistoryPolicy};
use crate::core::{MigrationError, Result};
use std::path::PathBuf;

/// Collects configuration options; [`ConfigurationBuilder::build`] validates them all at once.
///
/// # Examples
///
/// ```
/// use rustmigrate::configuration::ConfigurationBuilder;
///
/// let configuration = ConfigurationBuilder::new()
///     .with_master_changelog_location("changelog.json")
///     .with_uri("memory://app")
///     .with_execution_contexts(["prod"])
///     .with_run_mode()
///     .build()
///     .unwrap();
///
/// assert_eq!(configuration.master_changelog(), "changelog.json");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigurationBuilder {
    master_changelog: Option<String>,
    uri: Option<String>,
    username: Option<String>,
    password: Option<String>,
    execution_contexts: Vec<String>,
    run_mode: Option<RunMode>,
    undeclared_history: UndeclaredHistoryPolicy,
}

impl ConfigurationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Location of the master changelog file.
    pub fn with_master_changelog_location(mut self, master_changelog: impl Into<String>) -> Self {
        self.master_changelog = Some(master_changelog.into());
        self
    }

    /// Connection URI of the target store, e.g. `memory://app` or `file:///var/lib/app.store`.
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// `None` leaves the username unset.
    pub fn with_username(mut self, username: Option<impl Into<String>>) -> Self {
        self.username = username.map(Into::into);
        self
    }

    /// `None` leaves the password unset.
    pub fn with_password(mut self, password: Option<impl Into<String>>) -> Self {
        self.password = password.map(Into::into);
        self
    }

    /// Active execution contexts. Labels accumulate across calls; none means no filtering.
    pub fn with_execution_contexts<I, S>(mut self, contexts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.execution_contexts
            .extend(contexts.into_iter().map(Into::into));
        self
    }

    pub fn with_run_mode(mut self) -> Self {
        self.run_mode = Some(RunMode::Run);
        self
    }

    /// Render the migration to `<output_directory>/output.sql` instead of applying it.
    pub fn with_dry_run_mode(mut self, output_directory: impl Into<PathBuf>) -> Self {
        self.run_mode = Some(RunMode::DryRun {
            output_directory: output_directory.into(),
        });
        self
    }

    pub fn with_undeclared_history_policy(mut self, policy: UndeclaredHistoryPolicy) -> Self {
        self.undeclared_history = policy;
        self
    }

    /// Validates every option and returns either a complete configuration or
    /// all violations in a single [`MigrationError::Configuration`].
    pub fn build(self) -> Result<Configuration> {
        let mut errors = Vec::new();
        errors.extend(validate_mandatory_options(
            self.master_changelog.as_deref(),
            self.uri.as_deref(),
        ));
        errors.extend(validate_credentials(
            self.username.as_deref(),
            self.password.as_deref(),
        ));
        errors.extend(validate_execution_mode(self.run_mode.as_ref()));
        errors.extend(validate_execution_contexts(
            self.execution_contexts
                .iter()
                .map(|label| label.trim())
                .filter(|label| !label.is_empty()),
        ));

        if !errors.is_empty() {
            return Err(MigrationError::Configuration(errors));
        }

        let (Some(master_changelog), Some(uri), Some(run_mode)) =
            (self.master_changelog, self.uri, self.run_mode)
        else {
            return Err(MigrationError::Configuration(vec![
                "Incomplete configuration".to_string(),
            ]));
        };

        let mut connection = ConnectionParams::new(uri.trim());
        if let (Some(username), Some(password)) = (self.username, self.password) {
            connection = connection.with_credentials(username, password);
        }

        Ok(Configuration {
            master_changelog,
            connection,
            execution_contexts: ExecutionContexts::new(self.execution_contexts),
            run_mode,
            undeclared_history: self.undeclared_history,
        })
    }
}
