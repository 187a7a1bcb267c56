//! CLI smoke tests over the binary surface.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn lumen() -> Command {
    Command::cargo_bin("lumen").expect("lumen binary should build")
}

#[test]
fn test_help_lists_subcommands() {
    lumen()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run").and(predicate::str::contains("show-config")));
}

#[test]
fn test_show_config_prints_default_toml() {
    lumen()
        .arg("show-config")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("[[passes]]")
                .and(predicate::str::contains("first-paint-latency"))
                .and(predicate::str::contains("[[categories]]")),
        );
}

#[test]
fn test_run_requires_endpoint() {
    lumen()
        .args(["run", "--url", "https://example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--endpoint"));
}

#[test]
fn test_run_with_unreachable_endpoint_is_a_hard_failure() {
    // Port 9 on localhost: nothing listens there, so connect fails before
    // any pass starts and no result object is printed.
    lumen()
        .args([
            "run",
            "--endpoint",
            "ws://127.0.0.1:9/devtools/page/NOPE",
            "--url",
            "https://example.com",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not reach the browser session"));
}

#[test]
fn test_run_rejects_malformed_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "url = [this is not toml").unwrap();
    lumen()
        .args([
            "run",
            "--endpoint",
            "ws://127.0.0.1:9/devtools/page/NOPE",
            "--config",
        ])
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load run config"));
}
