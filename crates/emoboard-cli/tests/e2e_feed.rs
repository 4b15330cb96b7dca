//! E2E tests for the `eb` feed commands.
//!
//! Each test runs the binary against its own SQLite board in a temp
//! directory, with the user config directory pointed at the same place so a
//! developer's real configuration never leaks in.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

/// `eb` rooted in `dir` with no backend configured.
fn eb_bare(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("eb"));
    cmd.current_dir(dir);
    cmd.env("XDG_CONFIG_HOME", dir.join("xdg"));
    cmd.env("EMOBOARD_LOG", "error");
    for var in [
        "EMOBOARD_URL",
        "EMOBOARD_KEY",
        "VITE_SUPABASE_URL",
        "VITE_SUPABASE_ANON_KEY",
        "FORMAT",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

/// `eb` pointed at `dir/board.db`.
fn eb(dir: &Path) -> Command {
    let mut cmd = eb_bare(dir);
    cmd.env("EMOBOARD_URL", format!("sqlite://{}", dir.join("board.db").display()));
    cmd.env("EMOBOARD_KEY", "test-key");
    cmd
}

/// Post via the CLI and return the created record.
fn add(dir: &Path, text: &str, emotion: &str) -> Value {
    let output = eb(dir)
        .args(["add", text, "--emotion", emotion, "--format", "json"])
        .output()
        .expect("add should not crash");
    assert!(
        output.status.success(),
        "add failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("add --format json should produce valid JSON")
}

fn list_json(dir: &Path) -> Vec<Value> {
    let output = eb(dir)
        .args(["list", "--format", "json"])
        .output()
        .expect("list should not crash");
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    json.as_array().expect("list output is an array").clone()
}

// ---------------------------------------------------------------------------
// Add / list / show
// ---------------------------------------------------------------------------

#[test]
fn added_posts_list_newest_first() {
    let dir = TempDir::new().expect("tempdir");
    let first = add(dir.path(), "slow morning", "emptiness");
    let second = add(dir.path(), "good news", "joy");

    assert_eq!(first["emotion"], "emptiness");
    assert_eq!(second["label"], "Joy");
    for field in ["id", "text", "x", "y", "timestamp", "created"] {
        assert!(!second[field].is_null(), "missing field {field}");
    }
    let x = second["x"].as_f64().expect("x is a number");
    assert!((0.0..=100.0).contains(&x));

    let items = list_json(dir.path());
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["id"], second["id"]);
    assert_eq!(items[1]["id"], first["id"]);
}

#[test]
fn list_filters_by_emotion_and_limit() {
    let dir = TempDir::new().expect("tempdir");
    add(dir.path(), "a", "hope");
    add(dir.path(), "b", "anger");
    add(dir.path(), "c", "hope");

    let output = eb(dir.path())
        .args(["list", "--emotion", "hope", "--format", "json"])
        .output()
        .expect("list");
    let json: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    let texts: Vec<_> = json
        .as_array()
        .expect("array")
        .iter()
        .map(|item| item["text"].as_str().expect("text").to_string())
        .collect();
    assert_eq!(texts, vec!["c", "a"]);

    eb(dir.path())
        .args(["list", "-n", "1", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("id  emotion  created  text"))
        .stdout(predicate::str::contains("  c\n"))
        .stdout(predicate::str::contains("  a\n").not());
}

#[test]
fn empty_board_lists_nothing() {
    let dir = TempDir::new().expect("tempdir");
    assert!(list_json(dir.path()).is_empty());
    eb(dir.path())
        .args(["list", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn show_prints_tooltip_fields() {
    let dir = TempDir::new().expect("tempdir");
    let created = add(dir.path(), "finally rain", "hope");
    let id = created["id"].as_str().expect("id");

    let output = eb(dir.path())
        .args(["show", id, "--format", "json"])
        .output()
        .expect("show");
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(json["id"], id);
    assert_eq!(json["label"], "Hope");
    assert_eq!(json["text"], "finally rain");
    assert!(json["color"].as_str().is_some_and(|c| c.starts_with('#')));
}

#[test]
fn show_unknown_id_is_not_found() {
    let dir = TempDir::new().expect("tempdir");
    eb(dir.path())
        .args(["show", "nope", "--format", "text"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E4001]"))
        .stderr(predicate::str::contains("nope"));
}

// ---------------------------------------------------------------------------
// Validation and configuration errors
// ---------------------------------------------------------------------------

#[test]
fn over_long_text_is_rejected_before_writing() {
    let dir = TempDir::new().expect("tempdir");
    let long = "x".repeat(101);
    eb(dir.path())
        .args(["add", &long, "--format", "text"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E2002]"));
    assert!(list_json(dir.path()).is_empty());
}

#[test]
fn hundred_characters_is_accepted() {
    let dir = TempDir::new().expect("tempdir");
    let exact = "é".repeat(100);
    let created = add(dir.path(), &exact, "sadness");
    assert_eq!(created["text"], exact.as_str());
}

#[test]
fn blank_text_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    eb(dir.path())
        .args(["add", "   ", "--format", "json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error_code\": \"E2001\""));
}

#[test]
fn missing_backend_configuration_fails_fast() {
    let dir = TempDir::new().expect("tempdir");
    eb_bare(dir.path())
        .args(["list", "--format", "text"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E1001]"))
        .stderr(predicate::str::contains("suggestion:"));
}

#[test]
fn flags_override_environment() {
    let dir = TempDir::new().expect("tempdir");
    eb_bare(dir.path())
        .args(["--endpoint", "memory:", "--key", "k", "legend", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total\": 0"));
}

#[test]
fn project_config_file_is_read() {
    let dir = TempDir::new().expect("tempdir");
    let config_dir = dir.path().join(".emoboard");
    std::fs::create_dir_all(&config_dir).expect("mkdir");
    std::fs::write(
        config_dir.join("config.toml"),
        format!(
            "endpoint = \"sqlite://{}\"\naccess_key = \"from-file\"\n",
            dir.path().join("file.db").display()
        ),
    )
    .expect("write config");

    eb_bare(dir.path())
        .args(["add", "configured", "--format", "json"])
        .assert()
        .success();
    assert!(dir.path().join("file.db").exists());
}

// ---------------------------------------------------------------------------
// Legend / watch / sim / completions
// ---------------------------------------------------------------------------

#[test]
fn legend_counts_each_category() {
    let dir = TempDir::new().expect("tempdir");
    add(dir.path(), "one", "joy");
    add(dir.path(), "two", "joy");
    add(dir.path(), "three", "anxiety");

    let output = eb(dir.path())
        .args(["legend", "--format", "json"])
        .output()
        .expect("legend");
    let json: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(json["total"], 3);
    let rows = json["rows"].as_array().expect("rows");
    assert_eq!(rows.len(), 6);
    let joy = rows.iter().find(|r| r["category"] == "joy").expect("joy row");
    assert_eq!(joy["count"], 2);

    eb(dir.path())
        .args(["legend", "--format", "pretty"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Total: 3 emotions"));
}

#[test]
fn watch_exits_after_timeout() {
    let dir = TempDir::new().expect("tempdir");
    add(dir.path(), "before", "hope");
    eb(dir.path())
        .args(["watch", "--timeout", "1", "--format", "text"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Watching a board of 1 posts"));
}

#[test]
fn sim_campaign_passes() {
    let dir = TempDir::new().expect("tempdir");
    let output = eb_bare(dir.path())
        .args(["sim", "--seeds", "0..3", "--format", "json"])
        .output()
        .expect("sim");
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(json["seeds_run"], 3);
    assert_eq!(json["all_passed"], true);
}

#[test]
fn sim_replay_prints_clients() {
    let dir = TempDir::new().expect("tempdir");
    eb_bare(dir.path())
        .args(["sim", "--replay", "7", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("replay seed=7"))
        .stdout(predicate::str::contains("client id=0"));
}

#[test]
fn completions_generate_for_bash() {
    let dir = TempDir::new().expect("tempdir");
    eb_bare(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("eb"));
}
