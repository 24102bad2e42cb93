use indoc::indoc;
use predicates::prelude::*;

mod common;

use common::TestContext;

#[test]
fn install_writes_an_executable_shim() {
    let context = TestContext::new();
    context.write_config("repos: []\n");

    context
        .command()
        .arg("install")
        .assert()
        .success()
        .stdout(predicate::str::contains(".git/hooks/pre-commit"));

    let hook = context.repo.path().join(".git/hooks/pre-commit");
    let script = std::fs::read_to_string(&hook).unwrap();
    assert!(script.starts_with("#!/bin/sh"));
    assert!(script.contains("hook-impl --hook-type=pre-commit"));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&hook).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    // Installing again is idempotent: same shim, no `.legacy` copy.
    context.command().arg("install").assert().success();
    assert!(
        !context
            .repo
            .path()
            .join(".git/hooks/pre-commit.legacy")
            .exists()
    );
}

#[test]
fn install_preserves_foreign_hooks_as_legacy() {
    let context = TestContext::new();
    context.write_config("repos: []\n");

    let hooks_dir = context.repo.path().join(".git/hooks");
    std::fs::create_dir_all(&hooks_dir).unwrap();
    std::fs::write(hooks_dir.join("pre-commit"), "#!/bin/sh\necho custom\n").unwrap();

    context.command().arg("install").assert().success();

    let legacy = std::fs::read_to_string(hooks_dir.join("pre-commit.legacy")).unwrap();
    assert!(legacy.contains("echo custom"));

    // Uninstall restores the original hook.
    context.command().arg("uninstall").assert().success();
    let restored = std::fs::read_to_string(hooks_dir.join("pre-commit")).unwrap();
    assert!(restored.contains("echo custom"));
}

#[test]
fn uninstall_removes_the_shim() {
    let context = TestContext::new();
    context.write_config("repos: []\n");

    context.command().arg("install").assert().success();
    context.command().arg("uninstall").assert().success();
    assert!(!context.repo.path().join(".git/hooks/pre-commit").exists());
}

#[test]
fn validate_config_accepts_valid_and_rejects_invalid() {
    let context = TestContext::new();
    context.write_config(indoc! {r"
        repos:
          - repo: local
            hooks:
              - id: x
                name: x
                entry: 'true'
                language: system
    "});

    context
        .command()
        .arg("validate-config")
        .arg(".pre-commit-config.yaml")
        .assert()
        .success();

    context.write_file("bad.yaml", "repos: {not: a list}\n");
    context
        .command()
        .arg("validate-config")
        .arg("bad.yaml")
        .assert()
        .code(1);
}

#[test]
fn sample_config_output_is_a_valid_config() {
    let context = TestContext::new();
    let assert = context.command().arg("sample-config").assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(stdout.contains("repos:"));

    context.write_file("sample.yaml", &stdout);
    context
        .command()
        .arg("validate-config")
        .arg("sample.yaml")
        .assert()
        .success();
}

#[test]
fn migrate_config_rewrites_legacy_lists_once() {
    let context = TestContext::new();
    context.write_config(indoc! {r"
        - repo: local
          hooks:
            - id: x
              name: x
              entry: 'true'
              language: system
    "});

    context
        .command()
        .arg("migrate-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Migrated"));

    let migrated = context.read_file(".pre-commit-config.yaml");
    assert!(migrated.starts_with("repos:\n"));

    context
        .command()
        .arg("migrate-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("no migration needed"));
}

#[test]
fn doctor_reports_a_healthy_environment() {
    let context = TestContext::new();
    context.write_config("repos: []\n");

    context
        .command()
        .arg("doctor")
        .assert()
        .success()
        .stdout(predicate::str::contains("git: ok"))
        .stdout(predicate::str::contains("config: ok"));
}

#[test]
fn doctor_exits_2_on_unloadable_config() {
    let context = TestContext::new();
    context.write_config("repos: {not: a list}\n");

    context.command().arg("doctor").assert().code(2);
}

#[test]
fn clean_removes_the_cache_root() {
    let context = TestContext::new();
    context.write_config("repos: []\n");

    // Populate the cache.
    context.command().arg("run").assert().success();
    assert!(context.home.path().join("README").exists());

    context.command().arg("clean").assert().success();
    assert!(!context.home.path().join("README").exists());
}
