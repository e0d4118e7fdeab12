/// Configuration building and validation through the public API.
///
/// Run with: cargo test --test configuration_tests

use rustmigrate::{Configuration, ErrorCategory, MigrationError, RunMode, UndeclaredHistoryPolicy};
use tempfile::TempDir;

#[test]
fn test_every_violation_is_reported_at_once() {
    let err = Configuration::builder()
        .with_username(Some("admin"))
        .with_password(None::<String>)
        .with_execution_contexts(["prod", "not valid"])
        .build()
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Configuration);
    let violations = err.violations();
    assert_eq!(violations.len(), 5, "{:?}", violations);
    assert!(violations.iter().any(|v| v.contains("masterChangelog")));
    assert!(violations.iter().any(|v| v.contains("'uri'")));
    assert!(violations.iter().any(|v| v.contains("password is missing")));
    assert!(violations.iter().any(|v| v.contains("execution mode")));
    assert!(violations.iter().any(|v| v.contains("not valid")));
}

#[test]
fn test_dry_run_directory_must_exist() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope");

    let err = Configuration::builder()
        .with_master_changelog_location("changelog.json")
        .with_uri("memory://app")
        .with_dry_run_mode(&missing)
        .build()
        .unwrap_err();

    assert!(matches!(err, MigrationError::Configuration(ref errors) if errors.len() == 1));
    assert!(!missing.exists());
}

#[test]
fn test_valid_configuration_is_immutable_value() {
    let dir = TempDir::new().unwrap();

    let configuration = Configuration::builder()
        .with_master_changelog_location("changelog.json")
        .with_uri("file:///var/lib/app/store.db")
        .with_username(Some("admin"))
        .with_password(Some("secret"))
        .with_execution_contexts(["prod", "eu-west"])
        .with_undeclared_history_policy(UndeclaredHistoryPolicy::Ignore)
        .with_dry_run_mode(dir.path())
        .build()
        .unwrap();

    assert_eq!(configuration.master_changelog(), "changelog.json");
    assert_eq!(configuration.connection().credentials(), Some(("admin", "secret")));
    assert!(configuration.execution_contexts().contains("eu-west"));
    assert!(!configuration.execution_contexts().is_unconditional());
    assert_eq!(configuration.undeclared_history(), UndeclaredHistoryPolicy::Ignore);
    assert!(matches!(configuration.run_mode(), RunMode::DryRun { .. }));
    assert_eq!(configuration.dry_run_output(), Some(dir.path().join("output.sql")));
    assert!(!format!("{:?}", configuration).contains("secret"));
}

#[test]
fn test_malformed_uri_is_rejected_but_unknown_scheme_is_left_to_the_connector() {
    let malformed = Configuration::builder()
        .with_master_changelog_location("changelog.json")
        .with_uri("localhost:7687")
        .with_run_mode()
        .build();
    assert!(malformed.is_err());

    let unknown_scheme = Configuration::builder()
        .with_master_changelog_location("changelog.json")
        .with_uri("bolt://localhost:7687")
        .with_run_mode()
        .build();
    assert!(unknown_scheme.is_ok());
}
