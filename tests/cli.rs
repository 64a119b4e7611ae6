// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod common;

use std::time::Duration;

use tempfile::TempDir;

use crate::common::{free_addr, lily};

#[test]
fn help_lists_the_commands() {
    let repo = TempDir::new().unwrap();
    let output = lily(&repo).arg("--help").assert().success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).into_owned();
    for cmd in ["daemon", "job", "index", "gap", "migrate", "log"] {
        assert!(stdout.contains(cmd), "{cmd} missing from help");
    }
}

#[test]
fn default_config_is_valid_toml() {
    let repo = TempDir::new().unwrap();
    let output = lily(&repo).args(["config", "default"]).assert().success();
    let config: toml::Table =
        toml::from_str(std::str::from_utf8(&output.get_output().stdout).unwrap()).unwrap();
    assert!(config.contains_key("api"));
    assert!(config.contains_key("node"));
}

#[test]
fn init_writes_the_repository_config_once() {
    let repo = TempDir::new().unwrap();
    lily(&repo).arg("init").assert().success();
    assert!(repo.path().join("config.toml").is_file());

    // The written config is picked up from the repository.
    lily(&repo).args(["config", "dump"]).assert().success();

    lily(&repo).arg("init").assert().code(1);
    lily(&repo).args(["init", "--force"]).assert().success();
}

#[test]
fn invalid_config_is_a_user_error() {
    let repo = TempDir::new().unwrap();
    let path = repo.path().join("broken.toml");
    std::fs::write(&path, "[node\nretries = ").unwrap();
    lily(&repo)
        .arg("--config")
        .arg(&path)
        .args(["config", "dump"])
        .assert()
        .code(1);

    lily(&repo)
        .arg("--config")
        .arg(repo.path().join("missing.toml"))
        .args(["config", "dump"])
        .assert()
        .code(1);
}

#[test]
fn bad_flags_are_user_errors() {
    let repo = TempDir::new().unwrap();
    lily(&repo).arg("frobnicate").assert().code(1);
    lily(&repo)
        .args(["job", "run", "walk", "--from", "ten", "--to", "20"])
        .assert()
        .code(1);
    lily(&repo)
        .args(["job", "run", "--window", "soon", "watch"])
        .assert()
        .code(1);
}

#[test]
fn unreachable_daemon_is_an_internal_error() {
    let repo = TempDir::new().unwrap();
    lily(&repo)
        .arg("--api")
        .arg(format!("http://{}", free_addr()))
        .args(["job", "list"])
        .assert()
        .code(2);
}

#[test]
fn daemon_serves_until_shutdown() {
    let repo = TempDir::new().unwrap();
    let listen = free_addr();
    let api = format!("http://{listen}");
    let api = api.as_str();
    let mut daemon = std::process::Command::new(env!("CARGO_BIN_EXE_lily"))
        .env("LILY_REPO", repo.path())
        .env_remove("LILY_CONFIG")
        .args(["daemon", "--listen", listen.to_string().as_str()])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .unwrap();

    let mut listed = false;
    for _ in 0..100 {
        let status = lily(&repo)
            .args(["--api", api, "job", "list", "--json"])
            .output()
            .unwrap();
        if status.status.success() {
            assert_eq!(String::from_utf8_lossy(&status.stdout).trim(), "[]");
            listed = true;
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    if !listed {
        let _ = daemon.kill();
        panic!("daemon did not come up on {listen}");
    }

    // Unknown job ids are the caller's mistake.
    lily(&repo)
        .args(["--api", api, "job", "stop", "42"])
        .assert()
        .code(1);
    lily(&repo)
        .args(["--api", api, "log", "set-level", "lily", "debug"])
        .assert()
        .success();

    lily(&repo)
        .args(["--api", api, "shutdown"])
        .assert()
        .success();
    let status = daemon.wait().unwrap();
    assert!(status.success());
}
