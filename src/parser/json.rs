use super::ChangelogParser;
use crate::core::{MigrationError, Result};
use crate::model::{Changeset, Precondition, PreconditionPolicy, PreconditionQuery};
use async_recursion::async_recursion;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;

// ============================================================================
// Document format
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChangelogDocument {
    #[serde(default)]
    imports: Vec<String>,
    #[serde(default)]
    changesets: Vec<ChangesetDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChangesetDocument {
    #[serde(default)]
    id: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    queries: Vec<String>,
    #[serde(default)]
    contexts: ContextsDocument,
    #[serde(default)]
    run_on_change: bool,
    #[serde(default)]
    run_always: bool,
    precondition: Option<PreconditionDocument>,
}

/// `["prod", "staging"]` or `"prod, staging"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContextsDocument {
    List(Vec<String>),
    Delimited(String),
}

impl Default for ContextsDocument {
    fn default() -> Self {
        ContextsDocument::List(Vec::new())
    }
}

impl ContextsDocument {
    fn into_labels(self) -> Vec<String> {
        let labels = match self {
            ContextsDocument::List(labels) => labels,
            ContextsDocument::Delimited(labels) => labels.split(',').map(str::to_string).collect(),
        };
        labels
            .into_iter()
            .map(|label| label.trim().to_string())
            .filter(|label| !label.is_empty())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PreconditionDocument {
    policy: Option<String>,
    query: QueryDocument,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QueryDocument {
    Simple(String),
    Compound(CompoundDocument),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum CompoundDocument {
    And(Vec<QueryDocument>),
    Or(Vec<QueryDocument>),
}

impl From<QueryDocument> for PreconditionQuery {
    fn from(document: QueryDocument) -> Self {
        match document {
            QueryDocument::Simple(query) => PreconditionQuery::Simple(query),
            QueryDocument::Compound(CompoundDocument::And(queries)) => {
                PreconditionQuery::And(queries.into_iter().map(Into::into).collect())
            }
            QueryDocument::Compound(CompoundDocument::Or(queries)) => {
                PreconditionQuery::Or(queries.into_iter().map(Into::into).collect())
            }
        }
    }
}

impl ChangesetDocument {
    fn into_changeset(self, source: &Path) -> Result<Changeset> {
        let precondition = match self.precondition {
            None => None,
            Some(document) => {
                let query = PreconditionQuery::from(document.query);
                match document.policy {
                    None => Some(Precondition::without_policy(query)),
                    Some(policy) => {
                        let policy = policy.parse::<PreconditionPolicy>().map_err(|reason| {
                            MigrationError::ChangelogParse(format!(
                                "{}: changeset '{}': {}",
                                source.display(),
                                self.id,
                                reason
                            ))
                        })?;
                        Some(Precondition::new(policy, query))
                    }
                }
            }
        };

        let mut changeset = Changeset::new(self.id, self.author)
            .with_statements(self.queries)
            .with_contexts(self.contexts.into_labels())
            .run_on_change(self.run_on_change)
            .run_always(self.run_always);
        if let Some(precondition) = precondition {
            changeset = changeset.with_precondition(precondition);
        }
        Ok(changeset)
    }
}

// ============================================================================
// Parser
// ============================================================================

/// Reads JSON changelogs.
///
/// ```json
/// {
///   "imports": ["schema/users.json"],
///   "changesets": [
///     {
///       "id": "seed-admin",
///       "author": "alice",
///       "contexts": "dev,test",
///       "queries": ["INSERT INTO users VALUES (1, 'admin')"],
///       "precondition": { "policy": "MARK_AS_EXECUTED", "query": "SELECT true" }
///     }
///   ]
/// }
/// ```
///
/// Imports resolve relative to the importing file and are expanded, depth
/// first, before the importing file's own changesets.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonChangelogParser;

impl JsonChangelogParser {
    pub fn new() -> Self {
        Self
    }

    /// Parses a standalone document. Imports are rejected since there is no file to resolve them from.
    pub fn parse_str(&self, json: &str) -> Result<Vec<Changeset>> {
        let source = Path::new("<inline>");
        let document = parse_document(json, source)?;
        if !document.imports.is_empty() {
            return Err(MigrationError::ChangelogParse(
                "imports are only supported in changelog files".to_string(),
            ));
        }
        document
            .changesets
            .into_iter()
            .map(|changeset| changeset.into_changeset(source))
            .collect()
    }
}

#[async_trait]
impl ChangelogParser for JsonChangelogParser {
    async fn parse(&self, location: &str) -> Result<Vec<Changeset>> {
        let mut changesets = Vec::new();
        let mut import_chain = Vec::new();
        load(Path::new(location), &mut import_chain, &mut changesets).await?;
        log::debug!("Parsed {} changesets from {}", changesets.len(), location);
        Ok(changesets)
    }
}

#[async_recursion]
async fn load(path: &Path, import_chain: &mut Vec<PathBuf>, changesets: &mut Vec<Changeset>) -> Result<()> {
    let canonical = fs::canonicalize(path).await.map_err(|e| {
        MigrationError::ChangelogParse(format!("Cannot read changelog '{}': {}", path.display(), e))
    })?;
    if import_chain.contains(&canonical) {
        let cycle: Vec<String> = import_chain
            .iter()
            .chain(std::iter::once(&canonical))
            .map(|file| file.display().to_string())
            .collect();
        return Err(MigrationError::ChangelogParse(format!(
            "Import cycle: {}",
            cycle.join(" -> ")
        )));
    }

    let text = fs::read_to_string(&canonical).await.map_err(|e| {
        MigrationError::ChangelogParse(format!("Cannot read changelog '{}': {}", path.display(), e))
    })?;
    let document = parse_document(&text, path)?;

    import_chain.push(canonical.clone());
    let base = canonical.parent().map(Path::to_path_buf).unwrap_or_default();
    for import in &document.imports {
        load(&base.join(import), import_chain, changesets).await?;
    }
    import_chain.pop();

    for changeset in document.changesets {
        changesets.push(changeset.into_changeset(path)?);
    }
    Ok(())
}

fn parse_document(text: &str, source: &Path) -> Result<ChangelogDocument> {
    serde_json::from_str(text)
        .map_err(|e| MigrationError::ChangelogParse(format!("{}: {}", source.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ids(changesets: &[Changeset]) -> Vec<&str> {
        changesets.iter().map(Changeset::id).collect()
    }

    #[test]
    fn test_parse_full_changeset() {
        let changesets = JsonChangelogParser::new()
            .parse_str(
                r#"{
                    "changesets": [{
                        "id": "seed",
                        "author": "alice",
                        "queries": ["CREATE TABLE t (id INTEGER)", "INSERT INTO t VALUES (1)"],
                        "contexts": "dev, test",
                        "run_on_change": true,
                        "precondition": {
                            "policy": "mark_as_executed",
                            "query": {"or": ["SELECT false", {"and": ["SELECT 1", "SELECT true"]}]}
                        }
                    }]
                }"#,
            )
            .unwrap();

        let seed = &changesets[0];
        assert_eq!(seed.statements().len(), 2);
        assert_eq!(
            seed.contexts().iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["dev", "test"]
        );
        assert!(seed.is_run_on_change());
        assert!(!seed.is_run_always());
        let precondition = seed.precondition().unwrap();
        assert_eq!(precondition.policy(), Some(PreconditionPolicy::MarkAsExecuted));
        assert_eq!(
            precondition.query().to_string(),
            "(SELECT false) OR ((SELECT 1) AND (SELECT true))"
        );
    }

    #[test]
    fn test_missing_policy_is_kept_for_validation() {
        let changesets = JsonChangelogParser::new()
            .parse_str(r#"{"changesets": [{"id": "a", "author": "b", "queries": ["SELECT 1"], "precondition": {"query": "SELECT 1"}}]}"#)
            .unwrap();
        assert_eq!(changesets[0].precondition().unwrap().policy(), None);
    }

    #[test]
    fn test_malformed_documents_are_parse_errors() {
        let parser = JsonChangelogParser::new();
        for json in [
            "not json",
            r#"{"changesets": [{"id": "a", "author": "b", "queries": [], "precondition": {"policy": "retry", "query": "SELECT 1"}}]}"#,
            r#"{"changesets": [{"id": "a", "autor": "b"}]}"#,
            r#"{"imports": ["other.json"]}"#,
        ] {
            assert!(
                matches!(parser.parse_str(json), Err(MigrationError::ChangelogParse(_))),
                "{}",
                json
            );
        }
    }

    #[tokio::test]
    async fn test_imports_expand_before_own_changesets() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("schema")).unwrap();
        std::fs::write(
            dir.path().join("schema/users.json"),
            r#"{"imports": ["roles.json"], "changesets": [{"id": "users", "author": "a", "queries": ["CREATE TABLE users (id INTEGER)"]}]}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("schema/roles.json"),
            r#"{"changesets": [{"id": "roles", "author": "a", "queries": ["CREATE TABLE roles (id INTEGER)"]}]}"#,
        )
        .unwrap();
        let master = dir.path().join("master.json");
        std::fs::write(
            &master,
            r#"{"imports": ["schema/users.json"], "changesets": [{"id": "seed", "author": "a", "queries": ["INSERT INTO users VALUES (1)"]}]}"#,
        )
        .unwrap();

        let changesets = JsonChangelogParser::new()
            .parse(master.to_str().unwrap())
            .await
            .unwrap();

        assert_eq!(ids(&changesets), vec!["roles", "users", "seed"]);
    }

    #[tokio::test]
    async fn test_import_cycle_is_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.json"), r#"{"imports": ["b.json"]}"#).unwrap();
        std::fs::write(dir.path().join("b.json"), r#"{"imports": ["a.json"]}"#).unwrap();

        let err = JsonChangelogParser::new()
            .parse(dir.path().join("a.json").to_str().unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, MigrationError::ChangelogParse(ref message) if message.contains("Import cycle")));
    }

    #[tokio::test]
    async fn test_missing_file_is_a_parse_error() {
        let err = JsonChangelogParser::new()
            .parse("/definitely/not/here.json")
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::ChangelogParse(_)));
    }
}
