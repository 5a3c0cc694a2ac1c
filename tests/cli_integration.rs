//! CLI integration tests.
//!
//! These tests verify argument parsing, configuration loading, and the
//! store administration commands end to end against a real document.

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;

use chrono::{Duration, Utc};
use tempfile::{NamedTempFile, TempDir};

use session_keeper::admin;
use session_keeper::cli::{parse_args_from, Args, Command};
use session_keeper::config::Config;
use session_keeper::{Identity, SessionRecord, SessionStore, Token};

fn args(args: &[&str]) -> Vec<OsString> {
    std::iter::once("session-keeper")
        .chain(args.iter().copied())
        .map(OsString::from)
        .collect()
}

// ============================================================================
// CLI Argument Tests
// ============================================================================

#[test]
fn test_cli_defaults() {
    let result = parse_args_from(args(&[])).unwrap();

    assert!(result.command.is_none());
    assert!(result.config.is_none());
    assert!(result.store.is_none());
    assert!(result.log_level.is_none());
}

#[test]
fn test_cli_full_options() {
    let result = parse_args_from(args(&[
        "-s",
        "/tmp/keeper.json",
        "-l",
        "debug",
        "forget",
        "12345678901",
    ]))
    .unwrap();

    assert_eq!(result.store, Some(PathBuf::from("/tmp/keeper.json")));
    assert_eq!(result.log_level, Some("debug".to_string()));
    assert_eq!(
        result.command,
        Some(Command::Forget(Identity::new("12345678901")))
    );
}

#[test]
fn test_cli_missing_identity() {
    assert!(parse_args_from(args(&["show"])).is_err());
}

// ============================================================================
// Configuration Loading Tests
// ============================================================================

#[test]
fn test_config_from_json_file() {
    let json = r#"{
        "store": { "path": "/srv/keeper/sessions.json" },
        "logging": { "level": "debug" }
    }"#;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.store.path, PathBuf::from("/srv/keeper/sessions.json"));
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_config_priority_cli_over_file() {
    let json = r#"{ "store": { "path": "from-file.json" }, "logging": { "level": "warn" } }"#;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let args = Args {
        config: Some(file.path().to_path_buf()),
        store: Some(PathBuf::from("from-cli.json")),
        log_level: Some("trace".to_string()),
        ..Args::default()
    };

    let config = Config::load(&args).unwrap();

    assert_eq!(config.store.path, PathBuf::from("from-cli.json"));
    assert_eq!(config.logging.level, "trace");
}

#[test]
fn test_config_missing_file() {
    let args = Args {
        config: Some(PathBuf::from("/definitely/not/here.json")),
        ..Args::default()
    };

    assert!(Config::load(&args).is_err());
}

#[test]
fn test_config_partial_deserialization() {
    let json = r#"{"logging": {"level": "error"}}"#;
    let config: Config = serde_json::from_str(json).unwrap();

    assert_eq!(config.logging.level, "error");
    assert_eq!(config.store.path, PathBuf::from("sessions.json")); // Default
}

// ============================================================================
// Administration Command Tests
// ============================================================================

#[test]
fn test_prune_then_list_after_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sessions.json");
    let now = Utc::now();

    {
        let store = SessionStore::open(&path).unwrap();
        store
            .upsert(SessionRecord::new(
                Identity::new("alice"),
                Token::new(now + Duration::hours(1)),
            ))
            .unwrap();
        store
            .upsert(SessionRecord::new(
                Identity::new("bob"),
                Token::new(now - Duration::hours(1)),
            ))
            .unwrap();

        let mut out = Vec::new();
        admin::execute(&Command::Prune, &store, now, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "removed 1 expired session(s)\n");
    }

    let store = SessionStore::open(&path).unwrap();
    let mut out = Vec::new();
    admin::execute(&Command::List, &store, now, &mut out).unwrap();
    let report = String::from_utf8(out).unwrap();

    assert_eq!(report.lines().count(), 1);
    assert!(report.starts_with("alice\t"));
    assert!(report.trim_end().ends_with("valid"));
}
