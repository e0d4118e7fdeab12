use super::precondition::Precondition;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;

/// A declared migration step.
///
/// Changesets are built once from the parsed changelog and are read-only
/// afterwards. The checksum always reflects the current statements: every
/// builder method touching statements recomputes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Changeset {
    id: String,
    author: String,
    statements: Vec<String>,
    checksum: String,
    contexts: BTreeSet<String>,
    run_on_change: bool,
    run_always: bool,
    precondition: Option<Precondition>,
}

impl Changeset {
    pub fn new(id: impl Into<String>, author: impl Into<String>) -> Self {
        let mut changeset = Self {
            id: id.into(),
            author: author.into(),
            statements: Vec::new(),
            checksum: String::new(),
            contexts: BTreeSet::new(),
            run_on_change: false,
            run_always: false,
            precondition: None,
        };
        changeset.checksum = checksum_of(&changeset.statements);
        changeset
    }

    /// Appends a statement to the changeset.
    pub fn with_statement(mut self, statement: impl Into<String>) -> Self {
        self.statements.push(statement.into());
        self.checksum = checksum_of(&self.statements);
        self
    }

    /// Appends several statements, keeping their order.
    pub fn with_statements<I, S>(mut self, statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.statements
            .extend(statements.into_iter().map(Into::into));
        self.checksum = checksum_of(&self.statements);
        self
    }

    pub fn with_contexts<I, S>(mut self, contexts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.contexts.extend(contexts.into_iter().map(Into::into));
        self
    }

    pub fn run_on_change(mut self, run_on_change: bool) -> Self {
        self.run_on_change = run_on_change;
        self
    }

    pub fn run_always(mut self, run_always: bool) -> Self {
        self.run_always = run_always;
        self
    }

    pub fn with_precondition(mut self, precondition: Precondition) -> Self {
        self.precondition = Some(precondition);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn contexts(&self) -> &BTreeSet<String> {
        &self.contexts
    }

    pub fn is_run_on_change(&self) -> bool {
        self.run_on_change
    }

    pub fn is_run_always(&self) -> bool {
        self.run_always
    }

    pub fn precondition(&self) -> Option<&Precondition> {
        self.precondition.as_ref()
    }
}

impl fmt::Display for Changeset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "changeset[id: {}, author: {}]", self.id, self.author)
    }
}

/// SHA-256 over the trimmed statements, each followed by a NUL separator so
/// that `["ab", "c"]` and `["a", "bc"]` hash differently.
///
/// Returns checksum in format: `sha256:<hex>`
pub fn checksum_of(statements: &[String]) -> String {
    let mut hasher = Sha256::new();
    for statement in statements {
        hasher.update(statement.trim().as_bytes());
        hasher.update([0u8]);
    }
    format!("sha256:{:x}", hasher.finalize())
}
