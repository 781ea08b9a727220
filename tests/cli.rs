//! CLI integration tests for the fems operator commands.
//!
//! Each test uses an isolated temp directory for the config and database,
//! so tests can run in parallel safely.

#![allow(deprecated)] // Command::cargo_bin deprecation only affects custom build dirs

use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use fems::store::{SqliteStore, Store};
use predicates::prelude::*;
use serde_json::Value;

struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let data_dir = temp_dir.path().join("data");
        temp_dir
            .child("fems.toml")
            .write_str(&format!(
                "data_dir = {:?}\ntime_zone = \"Asia/Jakarta\"\n",
                data_dir.to_string_lossy()
            ))
            .expect("failed to write config");
        Self { temp_dir }
    }

    fn config_path(&self) -> String {
        self.temp_dir
            .path()
            .join("fems.toml")
            .to_string_lossy()
            .to_string()
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("fems").expect("failed to find binary");
        cmd.env("NO_COLOR", "1")
            .env_remove("FEMS_DATA_DIR")
            .env_remove("FEMS_TIME_ZONE")
            .args(["--config", &self.config_path()]);
        cmd
    }

    fn init(&self) -> assert_cmd::assert::Assert {
        self.cmd()
            .args([
                "init",
                "--admin-name",
                "Faculty Admin",
                "--admin-email",
                "admin@fems.test",
                "--password",
                "rahasia123",
            ])
            .assert()
    }

    fn store(&self) -> SqliteStore {
        SqliteStore::new(self.temp_dir.path().join("data").join("fems.db"))
            .expect("failed to open store")
    }

    fn json(&self, args: &[&str]) -> Value {
        let output = self.cmd().args(args).output().expect("failed to run command");
        assert!(
            output.status.success(),
            "command failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).expect("failed to parse JSON")
    }
}

#[test]
fn test_init_creates_database_and_admin() {
    let ctx = TestContext::new();

    ctx.init()
        .success()
        .stdout(predicate::str::contains("Administrator id:"));

    let store = ctx.store();
    let admins = store
        .list_users_by_role(fems::types::Role::Admin)
        .expect("list admins");
    assert_eq!(admins.len(), 1);
    assert_eq!(admins[0].email.as_deref(), Some("admin@fems.test"));
    assert!(admins[0].password_hash.is_some());
}

#[test]
fn test_init_twice_fails() {
    let ctx = TestContext::new();
    ctx.init().success();

    ctx.init()
        .failure()
        .stderr(predicate::str::contains("Already initialized"));
}

#[test]
fn test_init_rejects_short_password() {
    let ctx = TestContext::new();

    ctx.cmd()
        .args([
            "init",
            "--admin-name",
            "Faculty Admin",
            "--admin-email",
            "admin@fems.test",
            "--password",
            "short",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least 8 characters"));
}

#[test]
fn test_commands_require_init() {
    let ctx = TestContext::new();

    ctx.cmd()
        .args(["rooms", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Run 'fems init' first"));
}

#[test]
fn test_config_calendar_and_group() {
    let ctx = TestContext::new();
    ctx.init().success();

    let calendar = ctx.json(&["config", "calendar", "primary"]);
    assert_eq!(calendar["data"]["calendarId"], "primary");

    let group = ctx.json(&[
        "config",
        "group",
        "staff@fems.test",
        "--name",
        "Faculty Staff",
    ]);
    assert_eq!(group["data"]["groupEmail"], "staff@fems.test");

    let store = ctx.store();
    assert_eq!(
        store.get_group_shareable().unwrap().unwrap().group_name.as_deref(),
        Some("Faculty Staff")
    );
}

#[test]
fn test_invalid_group_email_is_rejected() {
    let ctx = TestContext::new();
    ctx.init().success();

    ctx.cmd()
        .args(["config", "group", "not-an-email"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("VALIDATION_ERROR"));
}

#[test]
fn test_rooms_add_list_and_search() {
    let ctx = TestContext::new();
    ctx.init().success();

    let created = ctx.json(&["rooms", "add", "Boardroom", "--location", "Building A"]);
    assert!(created["data"]["id"].is_string());

    ctx.cmd()
        .args(["rooms", "add", "Boardroom"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ROOM_EXISTS"));

    let rooms = ctx.json(&["rooms", "list"]);
    assert_eq!(rooms["data"].as_array().unwrap().len(), 1);
    assert_eq!(rooms["data"][0]["location"], "Building A");

    let free = ctx.json(&[
        "rooms",
        "available",
        "--start",
        "2026-03-02T10:00:00Z",
        "--end",
        "2026-03-02T11:00:00Z",
    ]);
    assert_eq!(free["data"][0]["name"], "Boardroom");
}

#[test]
fn test_sync_retry_requires_token() {
    let ctx = TestContext::new();
    ctx.init().success();

    ctx.cmd()
        .env_remove("FEMS_GOOGLE_TOKEN")
        .args(["sync", "retry"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("FEMS_GOOGLE_TOKEN is not set"));
}

#[test]
fn test_sync_retry_with_nothing_to_do() {
    let ctx = TestContext::new();
    ctx.init().success();

    ctx.cmd()
        .env("FEMS_GOOGLE_TOKEN", "unused")
        .args(["sync", "retry", "--limit", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Retried 0 agenda(s)"));

    ctx.cmd()
        .env("FEMS_GOOGLE_TOKEN", "unused")
        .args(["group", "retry"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Retried 0 invite(s)"));
}
