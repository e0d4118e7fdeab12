use std::fmt;
use std::str::FromStr;

/// What to do with a changeset whose guard does not hold.
///
/// Adding a variant forces every `match` over the policy to be revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreconditionPolicy {
    /// Leave the changeset out of this run; it stays pending.
    Continue,
    /// Record the changeset as applied without running its statements.
    MarkAsExecuted,
    /// Stop the whole run.
    Halt,
}

impl fmt::Display for PreconditionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreconditionPolicy::Continue => write!(f, "CONTINUE"),
            PreconditionPolicy::MarkAsExecuted => write!(f, "MARK_AS_EXECUTED"),
            PreconditionPolicy::Halt => write!(f, "HALT"),
        }
    }
}

impl FromStr for PreconditionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "CONTINUE" => Ok(PreconditionPolicy::Continue),
            "MARK_AS_EXECUTED" => Ok(PreconditionPolicy::MarkAsExecuted),
            "HALT" => Ok(PreconditionPolicy::Halt),
            _ => Err(format!(
                "Unknown precondition policy '{}' (expected CONTINUE, MARK_AS_EXECUTED or HALT)",
                s
            )),
        }
    }
}

/// Guard statement(s) of a precondition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreconditionQuery {
    Simple(String),
    And(Vec<PreconditionQuery>),
    Or(Vec<PreconditionQuery>),
}

impl PreconditionQuery {
    pub fn simple(query: impl Into<String>) -> Self {
        PreconditionQuery::Simple(query.into())
    }

    /// True when a leaf is blank or a compound query has no operands.
    pub fn is_blank(&self) -> bool {
        match self {
            PreconditionQuery::Simple(query) => query.trim().is_empty(),
            PreconditionQuery::And(queries) | PreconditionQuery::Or(queries) => {
                queries.is_empty() || queries.iter().any(PreconditionQuery::is_blank)
            }
        }
    }
}

impl fmt::Display for PreconditionQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreconditionQuery::Simple(query) => write!(f, "{}", query.trim()),
            PreconditionQuery::And(queries) => write_joined(f, queries, "AND"),
            PreconditionQuery::Or(queries) => write_joined(f, queries, "OR"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, queries: &[PreconditionQuery], operator: &str) -> fmt::Result {
    for (i, query) in queries.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", operator)?;
        }
        write!(f, "({})", query)?;
    }
    Ok(())
}

/// Guard of a changeset plus the policy applied when the guard fails.
///
/// The policy is optional only so that a changelog declaring a precondition
/// without one can be reported by validation instead of failing at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Precondition {
    policy: Option<PreconditionPolicy>,
    query: PreconditionQuery,
}

impl Precondition {
    pub fn new(policy: PreconditionPolicy, query: PreconditionQuery) -> Self {
        Self {
            policy: Some(policy),
            query,
        }
    }

    pub fn without_policy(query: PreconditionQuery) -> Self {
        Self {
            policy: None,
            query,
        }
    }

    pub fn policy(&self) -> Option<PreconditionPolicy> {
        self.policy
    }

    pub fn query(&self) -> &PreconditionQuery {
        &self.query
    }
}
