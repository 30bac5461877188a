//! Integration tests for basic CLI behavior.
//!
//! Every test points the binary at an empty config home so a developer's
//! own `~/.config/tapline` never leaks in.

#![allow(deprecated)] // cargo_bin deprecation; replacement not yet stable

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Helper: get a Command for the `tapline` binary with an isolated config home.
fn tapline(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tapline").expect("binary 'tapline' should be built");
    cmd.env("XDG_CONFIG_HOME", home.path())
        .env("HOME", home.path())
        .env_remove("RUST_LOG");
    cmd
}

fn write_plugin(dir: &Path, name: &str, body: &str) {
    std::fs::write(dir.join(format!("{name}.toml")), body).unwrap();
}

// ─── Top-level flags ─────────────────────────────────────────────────────────

#[test]
fn help_flag_shows_usage() {
    let home = tempfile::tempdir().unwrap();
    tapline(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: tapline"))
        .stdout(predicate::str::contains("plugins"))
        .stdout(predicate::str::contains("resolve"))
        .stdout(predicate::str::contains("stream"));
}

#[test]
fn version_flag_shows_semver() {
    let home = tempfile::tempdir().unwrap();
    tapline(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^tapline \d+\.\d+\.\d+\n$").unwrap());
}

#[test]
fn no_args_shows_error_and_usage() {
    let home = tempfile::tempdir().unwrap();
    tapline(&home)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage: tapline"));
}

#[test]
fn stream_help_lists_options() {
    let home = tempfile::tempdir().unwrap();
    tapline(&home)
        .args(["stream", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--output"))
        .stdout(predicate::str::contains("--no-buffer"))
        .stdout(predicate::str::contains("--timeout"));
}

// ─── plugins ─────────────────────────────────────────────────────────────────

#[test]
fn plugins_lists_builtins_sorted() {
    let home = tempfile::tempdir().unwrap();
    tapline(&home)
        .arg("plugins")
        .assert()
        .success()
        .stdout("dash (fallback)\nhls (fallback)\nhttp (fallback)\n");
}

#[test]
fn plugins_includes_plugin_dir() {
    let home = tempfile::tempdir().unwrap();
    let dir = tempfile::tempdir().unwrap();
    write_plugin(
        dir.path(),
        "site_a",
        "[plugin]\nkind = \"http\"\n[[plugin.matchers]]\npattern = '^https?://site-a\\.example/'\n",
    );

    tapline(&home)
        .arg("--plugin-dir")
        .arg(dir.path())
        .arg("plugins")
        .assert()
        .success()
        .stdout(predicate::str::contains("site_a\n"));
}

// ─── resolve ─────────────────────────────────────────────────────────────────

#[test]
fn resolve_direct_media_url_uses_http() {
    let home = tempfile::tempdir().unwrap();
    tapline(&home)
        .args(["resolve", "https://cdn.example/clip.mp4"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("http\n"));
}

#[test]
fn resolve_prefers_site_plugin_and_prints_captures() {
    let home = tempfile::tempdir().unwrap();
    let dir = tempfile::tempdir().unwrap();
    write_plugin(
        dir.path(),
        "site_a",
        "[plugin]\nkind = \"http\"\n[[plugin.matchers]]\nname = \"video\"\npattern = '^https?://site-a\\.example/v/(?P<id>\\d+)'\n",
    );

    tapline(&home)
        .args(["resolve", "https://site-a.example/v/42.mp4"])
        .arg("--plugin-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::starts_with("site_a\n"))
        .stdout(predicate::str::contains("matcher: video"))
        .stdout(predicate::str::contains("id = 42"));
}

#[test]
fn resolve_unknown_url_fails() {
    let home = tempfile::tempdir().unwrap();
    tapline(&home)
        .args(["resolve", "ftp://nothing.example/file"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No plugin can handle URL"));
}

#[test]
fn config_can_disable_builtins() {
    let home = tempfile::tempdir().unwrap();
    let config = home.path().join("custom.toml");
    std::fs::write(&config, "builtin_plugins = false\n").unwrap();

    tapline(&home)
        .arg("--config")
        .arg(&config)
        .args(["resolve", "https://cdn.example/clip.mp4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No plugin can handle URL"));
}

#[test]
fn invalid_config_is_reported() {
    let home = tempfile::tempdir().unwrap();
    let config = home.path().join("custom.toml");
    std::fs::write(&config, "buffered = \"sometimes\"\n").unwrap();

    tapline(&home)
        .arg("--config")
        .arg(&config)
        .arg("plugins")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid TOML"));
}

// ─── stream ──────────────────────────────────────────────────────────────────

#[test]
fn stream_unknown_url_fails() {
    let home = tempfile::tempdir().unwrap();
    tapline(&home)
        .args(["stream", "ftp://nothing.example/file"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No plugin can handle URL"));
}

#[test]
fn stream_of_playlist_reports_open_failure() {
    let home = tempfile::tempdir().unwrap();
    tapline(&home)
        .args(["stream", "--no-buffer", "https://cdn.example/master.m3u8"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open stream"));
}
