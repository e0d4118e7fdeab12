//! Option validators used by [`super::ConfigurationBuilder`]. Each returns the
//! list of violations it found; an empty list means the options are valid.

use super::RunMode;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref URI_SHAPE: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://\S+$").unwrap();
    static ref CONTEXT_LABEL: Regex = Regex::new(r"^[A-Za-z0-9_.\-]+$").unwrap();
}

pub fn validate_mandatory_options(master_changelog: Option<&str>, uri: Option<&str>) -> Vec<String> {
    let mut errors = Vec::new();

    match master_changelog {
        Some(location) if !location.trim().is_empty() => {}
        _ => errors.push("'masterChangelog' should not be null".to_string()),
    }

    match uri {
        Some(uri) if !uri.trim().is_empty() => {
            if !URI_SHAPE.is_match(uri.trim()) {
                errors.push(format!(
                    "Invalid connection URI '{}': expected <scheme>://<location>",
                    uri
                ));
            }
        }
        _ => errors.push("'uri' should not be null".to_string()),
    }

    errors
}

pub fn validate_credentials(username: Option<&str>, password: Option<&str>) -> Vec<String> {
    match (username, password) {
        (Some(_), None) => vec!["Username is set but password is missing".to_string()],
        (None, Some(_)) => vec!["Password is set but username is missing".to_string()],
        (Some(username), Some(_)) if username.trim().is_empty() => {
            vec!["Username should not be blank".to_string()]
        }
        _ => Vec::new(),
    }
}

pub fn validate_execution_mode(run_mode: Option<&RunMode>) -> Vec<String> {
    match run_mode {
        None => vec!["No execution mode has been defined. Please set one.".to_string()],
        Some(RunMode::Run) => Vec::new(),
        Some(RunMode::DryRun { output_directory }) => {
            if !output_directory.exists() {
                vec![format!(
                    "Output directory path '{}' does not exist",
                    output_directory.display()
                )]
            } else if !output_directory.is_dir() {
                vec![format!(
                    "Output directory path '{}' is not a directory",
                    output_directory.display()
                )]
            } else {
                Vec::new()
            }
        }
    }
}

pub fn validate_execution_contexts<'a>(labels: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    labels
        .into_iter()
        .filter(|label| !CONTEXT_LABEL.is_match(label))
        .map(|label| format!("Invalid execution context '{}'", label))
        .collect()
}
