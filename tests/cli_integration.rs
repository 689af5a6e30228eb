//! Integration tests for the `mw` binary.
//!
//! These tests run the compiled CLI against hosts laid out in temporary
//! directories. Global configuration lookup is pointed at the temporary
//! directory so the developer's own config never leaks in.

#![cfg(unix)]

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

/// Get a command for running mw, isolated from user configuration.
fn mw(temp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("mw").unwrap();
    cmd.env("HOME", temp.path())
        .env("XDG_CONFIG_HOME", temp.path())
        .env_remove("MODWEAVE_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

/// A host with one linked module and one precompiled module.
fn workspace() -> TempDir {
    let temp = TempDir::new().unwrap();
    temp.child("host/modweave-host.json")
        .write_str(
            r#"{
                "name": "portal",
                "modules": [
                    { "path": "../mods/ui", "names": ["ui"] },
                    { "path": "../mods/charts", "names": ["charts"] }
                ]
            }"#,
        )
        .unwrap();
    temp.child("host/package.json")
        .write_str(r#"{ "name": "portal", "dependencies": { "rxjs": "7.0.0" } }"#)
        .unwrap();
    temp.child("mods/ui/modweave-module.json")
        .write_str(r#"{ "modules": [{ "name": "ui", "srcPath": "src", "isEntry": true }] }"#)
        .unwrap();
    temp.child("mods/ui/src/index.ts").write_str("export {};").unwrap();
    temp.child("mods/ui/package.json")
        .write_str(r#"{ "dependencies": { "rxjs": "7.8.0" } }"#)
        .unwrap();
    temp.child("mods/charts/modweave-module.json")
        .write_str(r#"{ "modules": [{ "name": "charts", "precompiled": true }] }"#)
        .unwrap();
    temp
}

#[test]
fn version_flag_works() {
    let temp = TempDir::new().unwrap();
    mw(&temp)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mw"));
}

#[test]
fn help_lists_commands() {
    let temp = TempDir::new().unwrap();
    mw(&temp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("install"))
        .stdout(predicate::str::contains("graph"))
        .stdout(predicate::str::contains("clean"));
}

#[test]
fn graph_prints_traversal_order() {
    let temp = workspace();
    mw(&temp)
        .args(["graph", "--cwd"])
        .arg(temp.child("host").path())
        .assert()
        .success()
        .stdout("portal\n  ui [entry]\n  charts [precompiled]\n");
}

#[test]
fn graph_json_lists_modules() {
    let temp = workspace();
    let output = mw(&temp)
        .args(["graph", "--json", "--host"])
        .arg(temp.child("host").path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["host"]["name"], "portal");
    assert_eq!(json["modules"][0]["name"], "ui");
    assert_eq!(json["modules"][0]["isEntry"], true);
    assert_eq!(json["modules"][1]["precompiled"], true);
}

#[test]
fn install_and_clean_round_trip() {
    let temp = workspace();
    let host = temp.child("host");

    mw(&temp)
        .args(["install", "--skip-install", "--cwd"])
        .arg(host.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Staged 2 module(s)"));

    host.child(".modweave/dependencies/ui").assert(predicate::path::exists());
    host.child(".modweave/precompiled/charts").assert(predicate::path::exists());
    host.child(".modweave/package.json")
        .assert(predicate::str::contains("\"rxjs\": \"7.8.0\""));
    host.child(".gitignore").assert(predicate::str::contains("/.modweave"));
    host.child("env/environment.json").assert(predicate::path::exists());

    mw(&temp)
        .args(["clean", "--cwd"])
        .arg(host.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed"));
    host.child(".modweave").assert(predicate::path::missing());
    temp.child("mods/ui/src/index.ts").assert(predicate::path::exists());
}

#[test]
fn quiet_install_prints_nothing() {
    let temp = workspace();
    mw(&temp)
        .args(["i", "--skip-install", "-q", "--cwd"])
        .arg(temp.child("host").path())
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn project_config_changes_staging_dir() {
    let temp = workspace();
    let host = temp.child("host");
    host.child("modweave.toml")
        .write_str("staging_dir = \".stage\"\nskip_install = true\n")
        .unwrap();

    mw(&temp)
        .args(["install", "--cwd"])
        .arg(host.path())
        .assert()
        .success();

    host.child(".stage/modules.json").assert(predicate::path::exists());
    host.child(".modweave").assert(predicate::path::missing());
}

#[test]
fn invalid_project_config_is_reported() {
    let temp = workspace();
    let host = temp.child("host");
    host.child("modweave.toml")
        .write_str("merge_policy = \"sometimes\"\n")
        .unwrap();

    mw(&temp)
        .args(["graph", "--cwd"])
        .arg(host.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: Failed to load configuration"));
}

#[test]
fn missing_module_fails_with_path() {
    let temp = workspace();
    std::fs::remove_dir_all(temp.child("mods/charts").path()).unwrap();

    mw(&temp)
        .args(["install", "--skip-install", "--cwd"])
        .arg(temp.child("host").path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("module 'charts' could not be found"));

    let host = temp.child("host");
    host.child(".modweave").assert(predicate::path::missing());
    host.child(".modweave/package.json").assert(predicate::path::missing());
    host.child(".gitignore").assert(predicate::path::missing());
    host.child("env").assert(predicate::path::missing());
}

#[test]
fn missing_host_descriptor_fails() {
    let temp = TempDir::new().unwrap();
    mw(&temp)
        .args(["graph", "--cwd"])
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn completion_generates_script() {
    let temp = TempDir::new().unwrap();
    mw(&temp)
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mw"));
}
