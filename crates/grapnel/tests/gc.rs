use indoc::indoc;
use predicates::prelude::*;

mod common;

use common::TestContext;

#[test]
fn gc_on_an_empty_cache_is_a_no_op() {
    let context = TestContext::new();
    context
        .command()
        .arg("gc")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 repo(s) removed."));
}

#[test]
fn gc_keeps_repos_referenced_by_live_configs() {
    let (hooks_repo, sha) = common::hook_repo(indoc! {r"
        - id: greet
          name: greet
          entry: echo greeting
          language: system
    "});

    let context = TestContext::new();
    context.write_config(&format!(
        indoc! {r"
            repos:
              - repo: {}
                rev: {}
                hooks:
                  - id: greet
        "},
        hooks_repo.path().display(),
        sha,
    ));
    context.write_file("a.py", "x = 1\n");
    context.git(&["add", "."]);
    context.git(&["commit", "-m", "init"]);

    // Populate the cache (clone + config mark).
    context
        .command()
        .arg("run")
        .arg("--all-files")
        .assert()
        .success();

    // The config still exists: its repo is reachable and survives.
    context
        .command()
        .arg("gc")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 repo(s) removed."));

    // The clone is still usable afterwards.
    context
        .command()
        .arg("run")
        .arg("--all-files")
        .assert()
        .success();
}

#[test]
fn gc_removes_repos_after_their_config_is_deleted() {
    let (hooks_repo, sha) = common::hook_repo(indoc! {r"
        - id: greet
          name: greet
          entry: echo greeting
          language: system
    "});

    let context = TestContext::new();
    context.write_config(&format!(
        indoc! {r"
            repos:
              - repo: {}
                rev: {}
                hooks:
                  - id: greet
        "},
        hooks_repo.path().display(),
        sha,
    ));
    context.write_file("a.py", "x = 1\n");
    context.git(&["add", "."]);
    context.git(&["commit", "-m", "init"]);

    context
        .command()
        .arg("run")
        .arg("--all-files")
        .assert()
        .success();

    // Deleting the config makes its repo unreachable.
    std::fs::remove_file(context.repo.path().join(".pre-commit-config.yaml")).unwrap();

    context
        .command()
        .arg("gc")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 repo(s) removed."));

    // The cached clone directory is gone too.
    let leftover = std::fs::read_dir(context.home.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|entry| {
            entry.file_name().to_string_lossy().starts_with("repo")
                && entry.path().is_dir()
        })
        .count();
    assert_eq!(leftover, 0);

    // A second sweep removes nothing further.
    context
        .command()
        .arg("gc")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 repo(s) removed."));
}
