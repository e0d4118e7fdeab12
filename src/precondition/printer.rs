use super::executor::{ChangesetState, PreconditionResult};
use crate::model::{Changeset, Precondition, PreconditionPolicy};

/// Renders preconditions and their outcome for logs and dry-run scripts.
/// Performs no state transition itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreconditionPrinter;

impl PreconditionPrinter {
    pub fn new() -> Self {
        Self
    }

    /// SQL comment lines describing a precondition, empty when there is none.
    pub fn print(&self, precondition: Option<&Precondition>) -> Vec<String> {
        let Some(precondition) = precondition else {
            return Vec::new();
        };
        let policy = precondition
            .policy()
            .map(|policy| policy.to_string())
            .unwrap_or_else(|| "<unset>".to_string());

        let mut lines = vec![format!("-- precondition[if-not-met: {}]", policy)];
        lines.extend(
            precondition
                .query()
                .to_string()
                .lines()
                .map(|line| format!("--\t{}", line)),
        );
        lines
    }

    /// One-line explanation of why a changeset did not simply execute.
    pub fn explain(
        &self,
        changeset: &Changeset,
        state: ChangesetState,
        result: Option<&PreconditionResult>,
    ) -> String {
        let guard = changeset
            .precondition()
            .map(|precondition| precondition.query().to_string())
            .unwrap_or_default();
        let policy = result
            .map(|result| result.policy.to_string())
            .unwrap_or_default();

        match state {
            ChangesetState::Skipped => format!(
                "{} skipped: precondition not met ({}), policy {} keeps it pending for a future run",
                changeset, guard, policy
            ),
            ChangesetState::Marked => format!(
                "{} marked as executed: precondition not met ({}), policy {} records it without running its statements",
                changeset, guard, policy
            ),
            ChangesetState::Halted => format!(
                "{} halted the migration: precondition not met ({}), policy {}",
                changeset, guard, policy
            ),
            ChangesetState::Executing if result.is_some() => {
                format!("{} precondition met ({})", changeset, guard)
            }
            ChangesetState::Executing => format!("{} has no precondition", changeset),
        }
    }

    /// Reason carried by the halt error, without the changeset prefix.
    pub fn halt_reason(&self, changeset: &Changeset) -> String {
        match changeset.precondition() {
            Some(precondition) => format!(
                "precondition not met ({}), policy {}",
                precondition.query(),
                PreconditionPolicy::Halt
            ),
            None => "halted without a precondition".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PreconditionQuery;

    fn changeset(policy: PreconditionPolicy) -> Changeset {
        Changeset::new("seed-roles", "alice")
            .with_statement("INSERT INTO roles VALUES (1)")
            .with_precondition(Precondition::new(
                policy,
                PreconditionQuery::Or(vec![
                    PreconditionQuery::simple("SELECT COUNT(*) FROM roles"),
                    PreconditionQuery::simple("SELECT false"),
                ]),
            ))
    }

    #[test]
    fn test_print_precondition() {
        let changeset = changeset(PreconditionPolicy::MarkAsExecuted);
        let lines = PreconditionPrinter::new().print(changeset.precondition());

        assert_eq!(
            lines,
            vec![
                "-- precondition[if-not-met: MARK_AS_EXECUTED]".to_string(),
                "--\t(SELECT COUNT(*) FROM roles) OR (SELECT false)".to_string(),
            ]
        );
        assert!(PreconditionPrinter::new().print(None).is_empty());
    }

    #[test]
    fn test_print_comments_every_line_of_a_multiline_guard() {
        let precondition = Precondition::new(
            PreconditionPolicy::Continue,
            PreconditionQuery::simple("SELECT COUNT(*)\nFROM roles"),
        );

        let lines = PreconditionPrinter::new().print(Some(&precondition));

        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|line| line.starts_with("--")));
    }

    #[test]
    fn test_explain_outcomes() {
        let printer = PreconditionPrinter::new();
        let changeset = changeset(PreconditionPolicy::Halt);
        let failed = PreconditionResult {
            policy: PreconditionPolicy::Halt,
            met: false,
        };

        let halted = printer.explain(&changeset, ChangesetState::Halted, Some(&failed));
        assert!(halted.starts_with("changeset[id: seed-roles, author: alice] halted"));
        assert!(halted.contains("policy HALT"));

        assert_eq!(
            printer.halt_reason(&changeset),
            "precondition not met ((SELECT COUNT(*) FROM roles) OR (SELECT false)), policy HALT"
        );

        let skipped = printer.explain(&changeset, ChangesetState::Skipped, Some(&failed));
        assert!(skipped.contains("skipped"));

        let met = PreconditionResult {
            policy: PreconditionPolicy::Halt,
            met: true,
        };
        assert!(printer
            .explain(&changeset, ChangesetState::Executing, Some(&met))
            .contains("precondition met"));
    }
}
