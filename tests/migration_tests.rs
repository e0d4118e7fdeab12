/// End-to-end migration runs against the memory store.
///
/// Run with: cargo test --test migration_tests

use async_trait::async_trait;
use rustmigrate::connection::{Connector, GraphStore};
use rustmigrate::{
    ChangesetOutcome, Configuration, ConnectionParams, ErrorCategory, MemoryConnector,
    MemoryStore, MigrationError, Migrator, PersistedChangeset, UndeclaredHistoryPolicy,
};
use rustmigrate::{JsonChangelogParser, MigrationRunner};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

fn write_changelog(dir: &Path, json: &str) -> String {
    let path = dir.join("changelog.json");
    std::fs::write(&path, json).unwrap();
    path.to_string_lossy().into_owned()
}

fn run_configuration(changelog: &str, uri: &str) -> Configuration {
    Configuration::builder()
        .with_master_changelog_location(changelog)
        .with_uri(uri)
        .with_run_mode()
        .build()
        .unwrap()
}

async fn seed_history(store: &MemoryStore, record: PersistedChangeset) {
    let mut tx = store.begin().await.unwrap();
    tx.record(record).await.unwrap();
    tx.commit().await.unwrap();
}

fn ids(history: &[PersistedChangeset]) -> Vec<&str> {
    history.iter().map(|record| record.id.as_str()).collect()
}

/// Wraps the memory connector and counts connection attempts.
#[derive(Default)]
struct CountingConnector {
    inner: MemoryConnector,
    connections: AtomicUsize,
}

#[async_trait]
impl Connector for CountingConnector {
    async fn connect(&self, params: &ConnectionParams) -> rustmigrate::Result<Arc<dyn GraphStore>> {
        self.connections.fetch_add(1, Ordering::SeqCst);
        self.inner.connect(params).await
    }
}

#[tokio::test]
async fn test_duplicate_identifiers_fail_before_connecting() {
    let dir = TempDir::new().unwrap();
    let changelog = write_changelog(
        dir.path(),
        r#"{"changesets": [
            {"id": "users", "author": "alice", "queries": ["CREATE TABLE users (id INTEGER)"]},
            {"id": "users", "author": "bob", "queries": ["CREATE TABLE people (id INTEGER)"]}
        ]}"#,
    );
    let runner = MigrationRunner::new(JsonChangelogParser::new(), CountingConnector::default());

    let err = runner
        .run_migrations(&run_configuration(&changelog, "memory://dup"))
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::DeclaredChangelog);
    assert!(err.violations().iter().any(|violation| violation.contains("users")));
    assert_eq!(runner.connector().connections.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_edited_changeset_is_a_checksum_mismatch() {
    let dir = TempDir::new().unwrap();
    let changelog = write_changelog(
        dir.path(),
        r#"{"changesets": [{"id": "users", "author": "alice", "queries": ["CREATE TABLE users (id INTEGER, name TEXT)"]}]}"#,
    );
    let connector = MemoryConnector::new();
    let store = connector.store("edited").await;
    seed_history(&store, PersistedChangeset::new("users", "stale-checksum")).await;

    let err = Migrator::with_connector(connector)
        .migrate(&run_configuration(&changelog, "memory://edited"))
        .await
        .unwrap_err();

    assert!(matches!(err, MigrationError::HistoryConsistency(_)));
    assert!(err.violations()[0].contains("users"));
    assert!(store.table_names().await.is_empty());
}

#[tokio::test]
async fn test_run_on_change_is_reapplied_and_history_refreshed() {
    let dir = TempDir::new().unwrap();
    let migrator = Migrator::new();
    let changelog = write_changelog(
        dir.path(),
        r#"{"changesets": [
            {"id": "users", "author": "alice", "queries": ["CREATE TABLE users (id INTEGER)"]},
            {"id": "seed", "author": "alice", "run_on_change": true, "queries": ["INSERT INTO users VALUES (1)"]}
        ]}"#,
    );
    let configuration = run_configuration(&changelog, "memory://on-change");
    migrator.migrate(&configuration).await.unwrap();
    let store = migrator.connector().store("on-change").await;
    let first = store.history().await[1].clone();

    write_changelog(
        dir.path(),
        r#"{"changesets": [
            {"id": "users", "author": "alice", "queries": ["CREATE TABLE users (id INTEGER)"]},
            {"id": "seed", "author": "alice", "run_on_change": true, "queries": ["INSERT INTO users VALUES (2)"]}
        ]}"#,
    );
    let declared = migrator.validate(&changelog).await.unwrap();
    let report = migrator.migrate(&configuration).await.unwrap();

    assert_eq!(report.applied(), vec!["seed"]);
    let history = store.history().await;
    assert_eq!(ids(&history), vec!["users", "seed"]);
    assert_eq!(history[1].checksum, declared[1].checksum());
    assert_ne!(history[1].checksum, first.checksum);
    assert!(history[1].applied_at >= first.applied_at);
    assert_eq!(store.row_count("users").await, Some(2));
}

#[tokio::test]
async fn test_dry_run_previews_exactly_what_a_run_applies() {
    let dir = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let changelog = write_changelog(
        dir.path(),
        r#"{"changesets": [
            {"id": "users", "author": "alice", "queries": ["CREATE TABLE users (id INTEGER)"]},
            {"id": "legacy", "author": "bob", "contexts": "dev", "queries": ["CREATE TABLE legacy (id INTEGER)"]},
            {"id": "archive", "author": "alice",
             "precondition": {"policy": "MARK_AS_EXECUTED", "query": "SELECT false"},
             "queries": ["CREATE TABLE archive (id INTEGER)"]},
            {"id": "audit", "author": "alice",
             "precondition": {"policy": "CONTINUE", "query": "SELECT 0"},
             "queries": ["CREATE TABLE audit (id INTEGER)"]},
            {"id": "seed", "author": "alice", "queries": ["INSERT INTO users VALUES (1)"]}
        ]}"#,
    );
    let migrator = Migrator::new();
    let store = migrator.connector().store("preview").await;
    let dry_run = Configuration::builder()
        .with_master_changelog_location(changelog.as_str())
        .with_uri("memory://preview")
        .with_execution_contexts(["prod"])
        .with_dry_run_mode(output.path())
        .build()
        .unwrap();

    let preview = migrator.migrate(&dry_run).await.unwrap();

    assert!(store.history().await.is_empty());
    assert!(store.table_names().await.is_empty());
    let script_path = preview.dry_run_output.clone().unwrap();
    assert_eq!(script_path, output.path().join("output.sql"));
    let script = std::fs::read_to_string(&script_path).unwrap();
    assert!(script.contains("-- changeset[id: users, author: alice]"));
    assert!(script.contains("CREATE TABLE users (id INTEGER);"));
    assert!(script.contains("-- CREATE TABLE archive (id INTEGER);"));
    assert!(!script.contains("legacy"));
    let users = script.find("changeset[id: users").unwrap();
    let seed = script.find("changeset[id: seed").unwrap();
    assert!(users < seed);

    let run = Configuration::builder()
        .with_master_changelog_location(changelog.as_str())
        .with_uri("memory://preview")
        .with_execution_contexts(["prod"])
        .with_run_mode()
        .build()
        .unwrap();
    let applied = migrator.migrate(&run).await.unwrap();

    assert_eq!(preview.outcomes, applied.outcomes);
    assert_eq!(applied.applied(), vec!["users", "archive", "seed"]);
    assert_eq!(applied.count(ChangesetOutcome::Skipped), 1);
    assert_eq!(ids(&store.history().await), vec!["users", "archive", "seed"]);
}

#[tokio::test]
async fn test_dry_run_guards_depend_on_earlier_changesets() {
    let dir = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let changelog = write_changelog(
        dir.path(),
        r#"{"changesets": [
            {"id": "A", "author": "alice", "queries": ["CREATE TABLE t (id INTEGER)", "INSERT INTO t VALUES (1)"]},
            {"id": "B", "author": "alice",
             "precondition": {"policy": "CONTINUE", "query": "SELECT COUNT(*) FROM t"},
             "queries": ["CREATE TABLE b (id INTEGER)"]},
            {"id": "C", "author": "alice", "queries": ["INSERT INTO roles VALUES (1)"]},
            {"id": "D", "author": "alice",
             "precondition": {"policy": "MARK_AS_EXECUTED", "query": "SELECT * FROM roles"},
             "queries": ["CREATE TABLE d (id INTEGER)"]}
        ]}"#,
    );
    let migrator = Migrator::new();
    let store = migrator.connector().store("dependent").await;
    let mut tx = store.begin().await.unwrap();
    tx.execute("CREATE TABLE roles (id INTEGER)").await.unwrap();
    tx.commit().await.unwrap();

    let dry_run = Configuration::builder()
        .with_master_changelog_location(changelog.as_str())
        .with_uri("memory://dependent")
        .with_dry_run_mode(output.path())
        .build()
        .unwrap();
    let preview = migrator.migrate(&dry_run).await.unwrap();

    assert!(store.history().await.is_empty());
    assert_eq!(store.table_names().await, vec!["roles".to_string()]);
    assert_eq!(store.row_count("roles").await, Some(0));

    let applied = migrator
        .migrate(&run_configuration(&changelog, "memory://dependent"))
        .await
        .unwrap();

    assert_eq!(preview.outcomes, applied.outcomes);
    assert_eq!(applied.applied(), vec!["A", "B", "C", "D"]);
    assert_eq!(applied.count(ChangesetOutcome::Executed), 4);
}

#[tokio::test]
async fn test_marked_changeset_is_recorded_but_never_executed() {
    let dir = TempDir::new().unwrap();
    let changelog = write_changelog(
        dir.path(),
        r#"{"changesets": [{
            "id": "X", "author": "alice",
            "precondition": {"policy": "MARK_AS_EXECUTED", "query": "SELECT false"},
            "queries": ["CREATE TABLE marked_only (id INTEGER)"]
        }]}"#,
    );
    let migrator = Migrator::new();

    let report = migrator
        .migrate(&run_configuration(&changelog, "memory://marked"))
        .await
        .unwrap();

    assert_eq!(report.count(ChangesetOutcome::Marked), 1);
    let store = migrator.connector().store("marked").await;
    let history = store.history().await;
    assert_eq!(ids(&history), vec!["X"]);
    assert!(!history[0].executed);
    assert!(store.table("marked_only").await.is_none());
    assert!(
        store
            .executed_statements()
            .await
            .iter()
            .all(|statement| !statement.contains("marked_only"))
    );

    let again = migrator
        .migrate(&run_configuration(&changelog, "memory://marked"))
        .await
        .unwrap();
    assert_eq!(again.selected, 0);
}

#[tokio::test]
async fn test_halt_stops_the_run_before_later_changesets() {
    let dir = TempDir::new().unwrap();
    let changelog = write_changelog(
        dir.path(),
        r#"{"changesets": [
            {"id": "users", "author": "alice", "queries": ["CREATE TABLE users (id INTEGER)"]},
            {"id": "Y", "author": "alice",
             "precondition": {"policy": "HALT", "query": "SELECT * FROM users"},
             "queries": ["INSERT INTO users VALUES (1)"]},
            {"id": "Z", "author": "alice", "queries": ["CREATE TABLE z (id INTEGER)"]}
        ]}"#,
    );
    let migrator = Migrator::new();

    let err = migrator
        .migrate(&run_configuration(&changelog, "memory://halt"))
        .await
        .unwrap_err();

    assert!(matches!(err, MigrationError::Halted { ref changeset, .. } if changeset == "Y"));
    assert_eq!(err.category(), ErrorCategory::Halted);
    assert!(!err.is_defect());
    let store = migrator.connector().store("halt").await;
    assert_eq!(ids(&store.history().await), vec!["users"]);
    assert!(store.table("z").await.is_none());
    assert_eq!(store.row_count("users").await, Some(0));
}

#[tokio::test]
async fn test_failing_changeset_keeps_earlier_commits() {
    let dir = TempDir::new().unwrap();
    let changelog = write_changelog(
        dir.path(),
        r#"{"changesets": [
            {"id": "users", "author": "alice", "queries": ["CREATE TABLE users (id INTEGER)"]},
            {"id": "seed", "author": "alice", "queries": ["INSERT INTO users VALUES (1)"]},
            {"id": "W", "author": "alice", "queries": [
                "INSERT INTO users VALUES (2)",
                "INSERT INTO missing VALUES (1)"
            ]},
            {"id": "after", "author": "alice", "queries": ["CREATE TABLE after (id INTEGER)"]}
        ]}"#,
    );
    let migrator = Migrator::new();

    let err = migrator
        .migrate(&run_configuration(&changelog, "memory://failing"))
        .await
        .unwrap_err();

    assert!(matches!(err, MigrationError::Execution { ref changeset, .. } if changeset == "W"));
    assert!(err.is_defect());
    let store = migrator.connector().store("failing").await;
    assert_eq!(ids(&store.history().await), vec!["users", "seed"]);
    assert_eq!(store.row_count("users").await, Some(1));
    assert!(store.table("after").await.is_none());
}

#[tokio::test]
async fn test_contexts_select_matching_and_unconditional_changesets() {
    let dir = TempDir::new().unwrap();
    let changelog = write_changelog(
        dir.path(),
        r#"{"changesets": [
            {"id": "A", "author": "alice", "contexts": ["prod"], "queries": ["CREATE TABLE a (id INTEGER)"]},
            {"id": "B", "author": "alice", "queries": ["CREATE TABLE b (id INTEGER)"]},
            {"id": "C", "author": "alice", "contexts": ["dev"], "queries": ["CREATE TABLE c (id INTEGER)"]}
        ]}"#,
    );
    let configuration = Configuration::builder()
        .with_master_changelog_location(changelog)
        .with_uri("memory://contexts")
        .with_execution_contexts(["prod"])
        .with_run_mode()
        .build()
        .unwrap();

    let report = Migrator::new().migrate(&configuration).await.unwrap();

    assert_eq!(report.declared, 3);
    assert_eq!(report.applied(), vec!["A", "B"]);
}

#[tokio::test]
async fn test_run_always_changeset_runs_every_time() {
    let dir = TempDir::new().unwrap();
    let changelog = write_changelog(
        dir.path(),
        r#"{"changesets": [
            {"id": "events", "author": "alice", "queries": ["CREATE TABLE events (id INTEGER)"]},
            {"id": "tick", "author": "alice", "run_always": true, "queries": ["INSERT INTO events VALUES (1)"]}
        ]}"#,
    );
    let migrator = Migrator::new();
    let configuration = run_configuration(&changelog, "memory://always");

    migrator.migrate(&configuration).await.unwrap();
    let second = migrator.migrate(&configuration).await.unwrap();

    assert_eq!(second.applied(), vec!["tick"]);
    let store = migrator.connector().store("always").await;
    assert_eq!(store.row_count("events").await, Some(2));
    assert_eq!(ids(&store.history().await), vec!["events", "tick"]);
}

#[tokio::test]
async fn test_undeclared_history_policy() {
    let dir = TempDir::new().unwrap();
    let changelog = write_changelog(
        dir.path(),
        r#"{"changesets": [{"id": "users", "author": "alice", "queries": ["CREATE TABLE users (id INTEGER)"]}]}"#,
    );
    let connector = MemoryConnector::new();
    seed_history(
        &connector.store("pruned").await,
        PersistedChangeset::new("long-gone", "abc"),
    )
    .await;
    let migrator = Migrator::with_connector(connector);

    let strict = Configuration::builder()
        .with_master_changelog_location(changelog.as_str())
        .with_uri("memory://pruned")
        .with_undeclared_history_policy(UndeclaredHistoryPolicy::Error)
        .with_run_mode()
        .build()
        .unwrap();
    let err = migrator.migrate(&strict).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::HistoryConsistency);
    assert!(err.violations()[0].contains("long-gone"));

    let tolerant = run_configuration(&changelog, "memory://pruned");
    let report = migrator.migrate(&tolerant).await.unwrap();
    assert_eq!(report.applied(), vec!["users"]);
}

#[tokio::test]
async fn test_file_store_keeps_history_across_processes() {
    let dir = TempDir::new().unwrap();
    let changelog = write_changelog(
        dir.path(),
        r#"{"changesets": [
            {"id": "users", "author": "alice", "queries": ["CREATE TABLE users (id INTEGER)"]},
            {"id": "seed", "author": "alice", "queries": ["INSERT INTO users VALUES (1)"]}
        ]}"#,
    );
    let uri = format!("file://{}", dir.path().join("store.db").display());
    let configuration = run_configuration(&changelog, &uri);

    let first = Migrator::new().migrate(&configuration).await.unwrap();
    assert_eq!(first.applied(), vec!["users", "seed"]);

    // A fresh connector has no cached store and must load the snapshot.
    let second = Migrator::new().migrate(&configuration).await.unwrap();
    assert_eq!(second.selected, 0);

    let store = MemoryStore::open(dir.path().join("store.db")).await.unwrap();
    assert_eq!(store.row_count("users").await, Some(1));
    assert_eq!(ids(&store.history().await), vec!["users", "seed"]);
}

#[tokio::test]
async fn test_wrong_credentials_are_a_connection_error() {
    let dir = TempDir::new().unwrap();
    let changelog = write_changelog(
        dir.path(),
        r#"{"changesets": [{"id": "users", "author": "alice", "queries": ["CREATE TABLE users (id INTEGER)"]}]}"#,
    );
    let migrator = Migrator::with_connector(MemoryConnector::new().with_credentials("admin", "secret"));
    let configuration = Configuration::builder()
        .with_master_changelog_location(changelog)
        .with_uri("memory://secured")
        .with_username(Some("admin"))
        .with_password(Some("wrong"))
        .with_run_mode()
        .build()
        .unwrap();

    let err = migrator.migrate(&configuration).await.unwrap_err();

    assert!(matches!(err, MigrationError::Connection { .. }));
    assert_eq!(err.category(), ErrorCategory::Execution);
}
