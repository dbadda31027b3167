//! CLI integration tests for the offline redline commands.

#![allow(deprecated)] // Command::cargo_bin deprecation only affects custom build dirs

use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use predicates::prelude::*;
use redline::auth::validate_token;
use redline::config::FileConfig;
use redline::identity::Directory;

fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("redline").expect("failed to find binary");
    cmd.env("NO_COLOR", "1");
    cmd.env_remove("REDLINE_TOKEN");
    cmd.env_remove("REDLINE_SERVER");
    cmd
}

fn value_of<'a>(stdout: &'a str, key: &str) -> &'a str {
    stdout
        .lines()
        .find_map(|l| l.strip_prefix(&format!("{key} = \"")))
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or_else(|| panic!("{key} missing from output:\n{stdout}"))
}

#[test]
fn test_help_lists_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("serve")
                .and(predicate::str::contains("propose"))
                .and(predicate::str::contains("review"))
                .and(predicate::str::contains("history")),
        );
}

#[test]
fn test_admin_token_round_trips_through_config() {
    let output = cmd()
        .args(["admin", "token", "--user", "mia"])
        .assert()
        .success()
        .stdout(predicate::str::contains("redline_"))
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8(output).expect("utf8");

    let raw = stdout
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("redline_"))
        .expect("raw token line")
        .to_string();
    let lookup = value_of(&stdout, "token_lookup");
    let hash = value_of(&stdout, "token_hash");

    let temp = TempDir::new().expect("temp dir");
    let config = temp.child("redline.toml");
    config
        .write_str(&format!(
            "[[users]]\nid = \"mia\"\ndisplay_name = \"Mia\"\ntoken_lookup = \"{lookup}\"\ntoken_hash = \"{hash}\"\n"
        ))
        .expect("write config");

    let file = FileConfig::load(config.path()).expect("load config");
    let directory = Directory::from_entries(&file.users);
    assert_eq!(validate_token(&directory, &raw), Ok("mia".to_string()));
}

#[test]
fn test_admin_token_requires_user() {
    cmd()
        .args(["admin", "token", "--user", "  "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--user cannot be empty"));
}

#[test]
fn test_serve_rejects_invalid_config() {
    let temp = TempDir::new().expect("temp dir");
    let config = temp.child("bad.toml");
    config
        .write_str("[[projects]]\nname = \"Orphan\"\nowner_id = \"ghost\"\n")
        .expect("write config");

    cmd()
        .args(["serve", "--config"])
        .arg(config.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown owner"));
}

#[test]
fn test_review_needs_a_verdict() {
    cmd()
        .args(["review", "some-change", "--token", "t"])
        .assert()
        .failure();

    cmd()
        .args(["review", "some-change", "--token", "t", "--approve", "--reject"])
        .assert()
        .failure();
}

#[test]
fn test_client_commands_need_a_token() {
    cmd()
        .args(["changes", "some-project"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--token"));
}

#[test]
fn test_propose_reports_unreachable_server() {
    let temp = TempDir::new().expect("temp dir");
    let content = temp.child("draft.txt");
    content.write_str("new text").expect("write draft");

    cmd()
        .args([
            "propose",
            "--server",
            "http://127.0.0.1:9",
            "--token",
            "redline_00000000_000000000000000000000000",
            "some-project",
        ])
        .arg(content.path())
        .assert()
        .failure();
}
