//! Tests for configuration loading
//!
//! Tests cover:
//! - Environment variable overrides
//! - TOML file loading and column rule overrides
//! - Missing and malformed config files
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that set environment variables are marked with #[serial].

use grade_common::columns::ColumnAlias;
use grade_common::config::{load_env_file, load_toml_config, AppConfig, AppMode, ConfigOverrides};
use grade_common::stats::PercentilePolicy;
use serial_test::serial;
use std::env;
use std::io::Write;
use tempfile::NamedTempFile;

const ENV_VARS: &[&str] = &[
    "APP_NAME",
    "APP_SUBJECT",
    "APP_MODE",
    "TEACHER_WHITELIST",
    "KNOWN_SUBJECTS",
    "PERCENTILE_POLICY",
    "SESSION_SECRET",
    "GRADE_DATABASE",
    "GRADE_HOST",
    "GRADE_PORT",
    "GOOGLE_CLIENT_ID",
    "GOOGLE_CLIENT_SECRET",
    "GOOGLE_REDIRECT_URL",
];

fn clear_env() {
    for var in ENV_VARS {
        env::remove_var(var);
    }
}

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Should create temp file");
    file.write_all(content.as_bytes()).expect("Should write config");
    file
}

#[test]
#[serial]
fn test_overrides_from_env() {
    clear_env();
    env::set_var("APP_SUBJECT", "antenna");
    env::set_var("APP_MODE", "student");
    env::set_var("TEACHER_WHITELIST", "A@School.edu, b@school.edu");
    env::set_var("PERCENTILE_POLICY", "uncapped");
    env::set_var("GRADE_PORT", "8080");
    env::set_var("GOOGLE_CLIENT_ID", "client-xyz");

    let overrides = ConfigOverrides::from_env().expect("Should read environment");
    clear_env();

    assert_eq!(overrides.subject.as_deref(), Some("antenna"));
    assert_eq!(overrides.port, Some(8080));

    let config = AppConfig::resolve(Default::default(), overrides).expect("Should resolve");
    assert_eq!(config.subject.as_deref(), Some("antenna"));
    assert_eq!(config.percentile_policy, PercentilePolicy::Uncapped);
    assert_eq!(config.port, 8080);
    assert_eq!(config.oauth.client_id, "client-xyz");
    assert!(config.is_teacher("a@school.edu"));
    assert!(config.is_teacher("B@SCHOOL.EDU"));
}

#[test]
#[serial]
fn test_blank_env_values_are_ignored() {
    clear_env();
    env::set_var("APP_SUBJECT", "   ");

    let overrides = ConfigOverrides::from_env().expect("Should read environment");
    clear_env();

    assert!(overrides.subject.is_none());
}

#[test]
#[serial]
fn test_invalid_port_in_env() {
    clear_env();
    env::set_var("GRADE_PORT", "not-a-port");

    let result = ConfigOverrides::from_env();
    clear_env();

    assert!(result.is_err());
}

#[test]
#[serial]
fn test_env_file_fills_unset_variables() {
    clear_env();
    env::set_var("GRADE_PORT", "7200");
    let file = write_config("APP_SUBJECT=antenna\nGRADE_PORT=7100\n");

    let loaded = load_env_file(Some(file.path())).expect("Should read .env file");
    let overrides = ConfigOverrides::from_env();
    clear_env();

    assert_eq!(loaded.as_deref(), Some(file.path()));
    let overrides = overrides.expect("Should read environment");
    assert_eq!(overrides.subject.as_deref(), Some("antenna"));
    // The process environment wins over the file
    assert_eq!(overrides.port, Some(7200));
}

#[test]
fn test_missing_env_file_is_not_an_error() {
    let dir = tempfile::tempdir().expect("Should create temp dir");
    let loaded = load_env_file(Some(&dir.path().join(".env"))).expect("Missing file is fine");
    assert!(loaded.is_none());
}

#[test]
fn test_toml_file_with_column_overrides() {
    let file = write_config(
        r#"
subject = "circuit"
app_name = "Circuit Grades"
teacher_whitelist = ["prof@school.edu"]
percentile_policy = "uncapped"
full_marks = 120.0
port = 6000

[[columns]]
header = "Roll"
alias = "student_id"

[[columns]]
header = "Bonus"

[oauth]
client_id = "from-file"

[logging]
level = "debug"
"#,
    );

    let toml = load_toml_config(file.path()).expect("Should parse config");
    let config = AppConfig::resolve(toml, ConfigOverrides::default()).expect("Should resolve");

    assert_eq!(config.app_name, "Circuit Grades");
    assert_eq!(config.mode, AppMode::Student);
    assert_eq!(config.full_marks, 120.0);
    assert_eq!(config.port, 6000);
    assert_eq!(config.oauth.client_id, "from-file");
    assert_eq!(config.logging.level, "debug");
    assert!(config.is_teacher("prof@school.edu"));

    // File rules extend the default table
    assert_eq!(config.columns.alias_of("roll"), Some(ColumnAlias::StudentId));
    assert_eq!(config.columns.alias_of("ID"), Some(ColumnAlias::StudentId));
    assert!(config.columns.is_excluded("BONUS"));
}

#[test]
fn test_load_with_explicit_file_and_overrides() {
    let file = write_config("subject = \"circuit\"\nport = 6000\n");

    let overrides = ConfigOverrides {
        port: Some(7000),
        ..ConfigOverrides::default()
    };
    let config = AppConfig::load(Some(file.path()), overrides).expect("Should load");

    assert_eq!(config.subject.as_deref(), Some("circuit"));
    assert_eq!(config.port, 7000);
    assert_eq!(config.bind_address(), "127.0.0.1:7000");
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().expect("Should create temp dir");
    let path = dir.path().join("absent.toml");

    assert!(load_toml_config(&path).is_err());
}

#[test]
fn test_malformed_file_is_an_error() {
    let file = write_config("subject = [unclosed");

    assert!(load_toml_config(file.path()).is_err());
}
