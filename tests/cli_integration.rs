//! CLI integration tests for Bulkhead.
//!
//! These tests lay a small multi-package project out in a temporary
//! directory and drive the binary through generate, check and inspection.

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Three packages: `Private` keeps most of its classes to itself, `Public`
/// depends on it and leaks one of them, `Consumer` uses it without
/// declaring the dependency.
const SYMBOLS: &str = r#"{
  "symbols": [
    {"name": "Private", "kind": "module", "package": "Private"},
    {"name": "Private::PrivateClass", "kind": "class"},
    {"name": "Private::PrivateClassForTests", "kind": "class"},
    {"name": "Private::PrivateClassNotReferenced", "kind": "class"},
    {"name": "Private::Hidden", "kind": "class"},
    {"name": "Private::Sanctioned", "kind": "constant", "alias_of": "Private::Hidden"},

    {"name": "Public", "kind": "module", "package": "Public"},
    {"name": "Public::RefersToPrivateTypes", "kind": "class"},
    {"name": "Public::RefersToPrivateTypes#method", "kind": "method",
     "params": [{"name": "a", "type": "Private::PrivateClass"}]},
    {"name": "Public::UsesSanctionedAlias", "kind": "class"},
    {"name": "Public::UsesSanctionedAlias#hidden", "kind": "method", "returns": "Private::Sanctioned"},

    {"name": "Consumer", "kind": "module", "package": "Consumer"},
    {"name": "Consumer::Uses", "kind": "class"},
    {"name": "Consumer::Uses#run", "kind": "method", "returns": "Private::Sanctioned"}
  ]
}"#;

const PRIVATE_MANIFEST: &str = r#"[package]
name = "Private"
export = ["Private::Sanctioned"]
export_for_test = ["Private::PrivateClassForTests"]
"#;

const PUBLIC_MANIFEST: &str = r#"[package]
name = "Public"
export = ["Public"]
dependencies = ["Private"]
"#;

const CONSUMER_MANIFEST: &str = r#"[package]
name = "Consumer"
export = ["Consumer::Uses"]
"#;

const CONFIG: &str = r#"[input]
symbols = "symbols.json"
"#;

/// Get the bulkhead binary command, isolated from the user's global config.
fn bulkhead(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("bulkhead").unwrap();
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env_remove("BULKHEAD_SYMBOLS");
    cmd
}

/// Write the three-package project into a fresh temporary directory.
fn project() -> TempDir {
    project_with_config(CONFIG)
}

fn project_with_config(config: &str) -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();

    fs::write(root.join("symbols.json"), SYMBOLS).unwrap();
    fs::write(root.join("Bulkhead.toml"), config).unwrap();
    for (dir, manifest) in [
        ("packs/private", PRIVATE_MANIFEST),
        ("packs/public", PUBLIC_MANIFEST),
        ("packs/consumer", CONSUMER_MANIFEST),
    ] {
        fs::create_dir_all(root.join(dir)).unwrap();
        fs::write(root.join(dir).join("__package.toml"), manifest).unwrap();
    }

    tmp
}

// ============================================================================
// bulkhead generate
// ============================================================================

#[test]
fn test_generate_writes_every_tier() {
    let tmp = project();

    bulkhead(tmp.path())
        .args(["generate", "--no-color"])
        .assert()
        .success();

    let out = tmp.path().join("interfaces");
    for file in [
        "Private.rbi",
        "Private.test.rbi",
        "Public.rbi",
        "Public.test.rbi",
        "Consumer.rbi",
        "Consumer.test.rbi",
    ] {
        assert!(out.join(file).is_file(), "missing {}", file);
    }

    let public = fs::read_to_string(out.join("Public.rbi")).unwrap();
    assert!(public.starts_with("# typed: strict\n"));
    assert!(public.contains("class Public::RefersToPrivateTypes"));
    assert!(public.contains("Private::PrivateClass"));
    assert!(!public.contains("PrivateClassNotReferenced"));

    let private_tests = fs::read_to_string(out.join("Private.test.rbi")).unwrap();
    assert!(private_tests.contains("class Private::PrivateClassForTests"));
}

#[test]
fn test_generate_reports_violations_without_failing() {
    let tmp = project();

    bulkhead(tmp.path())
        .args(["generate", "--no-color"])
        .assert()
        .success()
        .stderr(predicate::str::contains("is private to `Private`"))
        .stderr(predicate::str::contains("Consumer"));
}

#[test]
fn test_generate_is_reproducible() {
    let tmp = project();
    let public = tmp.path().join("interfaces/Public.rbi");

    bulkhead(tmp.path()).arg("generate").assert().success();
    let first = fs::read_to_string(&public).unwrap();

    bulkhead(tmp.path())
        .args(["generate", "-j", "4"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Created").not());
    assert_eq!(fs::read_to_string(&public).unwrap(), first);
}

#[test]
fn test_generate_json_format() {
    let tmp = project();

    bulkhead(tmp.path())
        .args(["generate", "--format", "json", "--out", "api"])
        .assert()
        .success();

    let content = fs::read_to_string(tmp.path().join("api/Public.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(value["package"], "Public");
    assert_eq!(value["tier"], "public");
    assert!(value["digest"].as_str().unwrap().len() == 64);
}

#[test]
fn test_generate_json_report() {
    let tmp = project();

    let output = bulkhead(tmp.path())
        .args(["generate", "--json", "--no-test-tier"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let interfaces = report["interfaces"].as_array().unwrap();
    assert_eq!(interfaces.len(), 3);
    assert_eq!(interfaces[0]["package"], "Consumer");
    assert_eq!(report["files"].as_array().unwrap().len(), 3);
}

#[test]
fn test_generate_fails_on_configured_deny() {
    let tmp = project_with_config(
        r#"[input]
symbols = "symbols.json"

[check]
deny = ["leaked-private-symbol"]
"#,
    );

    bulkhead(tmp.path())
        .args(["generate", "--no-color"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "error: `Private::PrivateClass` is private to `Private`",
        ))
        .stderr(predicate::str::contains("denied violation"));

    // Artifacts are still written
    assert!(tmp.path().join("interfaces/Public.rbi").is_file());
}

#[test]
fn test_generate_removes_withheld_interfaces() {
    let tmp = project();
    bulkhead(tmp.path()).arg("generate").assert().success();
    assert!(tmp.path().join("interfaces/Private.rbi").is_file());

    let cyclic = SYMBOLS.replace(
        r#""alias_of": "Private::Hidden"}"#,
        r#""alias_of": "Private::Loop"},
    {"name": "Private::Loop", "kind": "constant", "alias_of": "Private::Sanctioned"}"#,
    );
    fs::write(tmp.path().join("symbols.json"), cyclic).unwrap();

    bulkhead(tmp.path())
        .args(["generate", "--no-color"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Removed"))
        .stderr(predicate::str::contains("withheld interface"));

    assert!(!tmp.path().join("interfaces/Private.rbi").exists());
}

// ============================================================================
// bulkhead check
// ============================================================================

#[test]
fn test_check_passes_after_generate() {
    let tmp = project();

    bulkhead(tmp.path()).arg("generate").assert().success();
    bulkhead(tmp.path())
        .arg("check")
        .assert()
        .success()
        .stderr(predicate::str::contains("interfaces checked"));
}

#[test]
fn test_check_detects_missing_artifacts() {
    let tmp = project();

    bulkhead(tmp.path())
        .args(["check", "--no-color"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing"))
        .stderr(predicate::str::contains("out-of-date artifacts"));
}

#[test]
fn test_check_detects_stale_artifacts() {
    let tmp = project();

    bulkhead(tmp.path()).arg("generate").assert().success();
    fs::write(tmp.path().join("interfaces/Public.rbi"), "# typed: strict\n").unwrap();

    bulkhead(tmp.path())
        .args(["check", "--no-color"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Stale"))
        .stderr(predicate::str::contains("1 out-of-date artifact"))
        .stderr(predicate::str::contains("bulkhead generate"));
}

#[test]
fn test_check_deny_flag() {
    let tmp = project();

    bulkhead(tmp.path())
        .args(["check", "--no-artifacts"])
        .assert()
        .success();

    bulkhead(tmp.path())
        .args(["check", "--no-artifacts", "--deny", "missing-dependency"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("check failed: 1 denied violation"));
}

#[test]
fn test_check_rejects_unknown_deny_kind() {
    let tmp = project();

    bulkhead(tmp.path())
        .args(["check", "--no-artifacts", "--deny", "leaky"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown violation kind `leaky`"));
}

// ============================================================================
// bulkhead closure / packages
// ============================================================================

#[test]
fn test_closure_lists_members() {
    let tmp = project();

    bulkhead(tmp.path())
        .args(["closure", "Public"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Public::RefersToPrivateTypes"))
        .stdout(predicate::str::contains("Private::PrivateClass"))
        .stdout(predicate::str::contains("PrivateClassNotReferenced").not());
}

#[test]
fn test_closure_explain() {
    let tmp = project();

    bulkhead(tmp.path())
        .args(["closure", "Public", "--explain", "Private::PrivateClass"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Public (export of Public)"))
        .stdout(predicate::str::contains("Private::PrivateClass (signature)"));

    bulkhead(tmp.path())
        .args(["closure", "Public", "--explain", "Private::PrivateClassNotReferenced"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not part of the public interface"));
}

#[test]
fn test_closure_stub_matches_generated_file() {
    let tmp = project();

    bulkhead(tmp.path()).arg("generate").assert().success();
    let written = fs::read_to_string(tmp.path().join("interfaces/Private.test.rbi")).unwrap();

    bulkhead(tmp.path())
        .args(["closure", "Private", "--test", "--stub"])
        .assert()
        .success()
        .stdout(predicate::eq(written));
}

#[test]
fn test_closure_unknown_package() {
    let tmp = project();

    bulkhead(tmp.path())
        .args(["closure", "Nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("package `Nope` not found"));
}

#[test]
fn test_packages_listing() {
    let tmp = project();

    bulkhead(tmp.path())
        .arg("packages")
        .assert()
        .success()
        .stdout(predicate::str::contains("Public (packs/public/__package.toml)"))
        .stdout(predicate::str::contains("  → Private"))
        .stdout(predicate::str::contains("export_for_test Private::PrivateClassForTests"));
}

#[test]
fn test_packages_json() {
    let tmp = project();

    let output = bulkhead(tmp.path())
        .args(["packages", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let packages: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<_> = packages
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Consumer", "Private", "Public"]);
}

// ============================================================================
// errors
// ============================================================================

#[test]
fn test_foreign_export_is_fatal() {
    let tmp = project();
    fs::write(
        tmp.path().join("packs/consumer/__package.toml"),
        "[package]\nname = \"Consumer\"\nexport = [\"Private::Hidden\"]\n",
    )
    .unwrap();

    bulkhead(tmp.path())
        .arg("generate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("which is owned by"));

    assert!(!tmp.path().join("interfaces").exists());
}

#[test]
fn test_missing_symbol_table_config() {
    let tmp = project_with_config("");

    bulkhead(tmp.path())
        .arg("generate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no symbol table configured"));

    bulkhead(tmp.path())
        .args(["generate", "--symbols", "symbols.json"])
        .assert()
        .success();
}

#[test]
fn test_completions() {
    let tmp = TempDir::new().unwrap();

    bulkhead(tmp.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bulkhead"));
}
