use std::path::Path;
use std::process::Command;

use conflux_test_fixtures::{FixtureType, TestFixtures};
use pretty_assertions::assert_eq;

/// Run the conflux binary against `root`; returns (success, stdout, stderr)
fn run_conflux(root: &Path, args: &[&str]) -> (bool, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_conflux"))
        .args(args)
        .env("CONFLUX_ROOT", root)
        .env_remove("CONFLUX_SYMBOLS")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run conflux");
    (
        output.status.success(),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

#[test]
fn test_check_json_summary() {
    let fixtures = TestFixtures::with(FixtureType::LibAndSub);
    let (ok, stdout, stderr) =
        run_conflux(fixtures.root(), &["check", "--json", "--source-imports", "lib"]);
    assert!(ok, "stderr: {}", stderr);

    let summary: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(summary["initial"][0]["path"], "lib");
    assert_eq!(summary["initial"][0]["exports"], serde_json::json!(["Answer", "Double"]));
    assert_eq!(summary["packages"][0]["path"], "lib/sub");
    assert_eq!(summary["packages"][1]["imports"], serde_json::json!(["lib/sub"]));
}

#[test]
fn test_order_lists_dependencies_first() {
    let fixtures = TestFixtures::with(FixtureType::LibAndSub);
    let (ok, stdout, stderr) = run_conflux(fixtures.root(), &["order", "--source-imports", "lib"]);
    assert!(ok, "stderr: {}", stderr);
    assert_eq!(stdout.lines().collect::<Vec<_>>(), vec!["lib/sub", "lib"]);
}

#[test]
fn test_type_errors_fail_with_diagnostics() {
    let fixtures = TestFixtures::with(FixtureType::TypeError);
    let (ok, _, stderr) = run_conflux(fixtures.root(), &["check", "--source-imports", "app"]);
    assert!(!ok);
    assert!(stderr.contains("mismatched types int and string"), "{}", stderr);
    assert!(stderr.contains("couldn't load packages due to errors: bad"), "{}", stderr);
}

#[test]
fn test_export_then_check_against_symbols() {
    let fixtures = TestFixtures::with(FixtureType::LibAndSub);
    let out = tempfile::tempdir().unwrap();
    let out_arg = out.path().to_string_lossy().to_string();
    let (ok, stdout, stderr) = run_conflux(
        fixtures.root(),
        &["export", "--source-imports", "-o", &out_arg, "lib"],
    );
    assert!(ok, "stderr: {}", stderr);
    assert!(stdout.starts_with("exported 2 packages"));

    let app = TestFixtures::new();
    app.write_package(
        "app",
        &[("app.cfx", "package app\n\nimport \"lib\"\n\nconst X = lib.Answer\n")],
    );
    let (ok, stdout, stderr) = run_conflux(app.root(), &["check", "-s", &out_arg, "app"]);
    assert!(ok, "stderr: {}", stderr);
    assert_eq!(stdout.trim(), "ok app (1 files)");
}

#[test]
fn test_imports_cannot_leave_the_source_root() {
    let fixtures = TestFixtures::new();
    fixtures.write_package("src/app", &[("app.cfx", "package app\n\nimport \"../outside\"\n")]);
    fixtures.write_package("outside", &[("o.cfx", "package o\n")]);

    let (ok, _, stderr) = run_conflux(
        &fixtures.root().join("src"),
        &["check", "--source-imports", "app"],
    );
    assert!(!ok);
    assert!(stderr.contains("invalid import path \"../outside\""), "{}", stderr);
}
