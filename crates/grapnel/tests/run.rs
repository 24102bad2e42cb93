use indoc::indoc;
use predicates::prelude::*;

mod common;

use common::TestContext;

#[test]
fn empty_repos_list_succeeds_with_no_results() {
    let context = TestContext::new();
    context.write_config("repos: []\n");
    context.write_file("a.py", "x = 1\n");
    context.git(&["add", "."]);

    context.command().arg("run").assert().success();
}

#[test]
fn passing_hook_runs_on_matched_files() {
    let context = TestContext::new();
    context.write_config(indoc! {r"
        repos:
          - repo: local
            hooks:
              - id: fake
                name: fake
                entry: 'true'
                language: system
                files: '\.py$'
    "});
    context.write_file("a.py", "x = 1\n");
    context.write_file("b.txt", "text\n");
    context.git(&["add", "."]);

    context
        .command()
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("fake"))
        .stdout(predicate::str::contains("Passed"));
}

#[test]
fn failing_hook_sets_exit_code() {
    let context = TestContext::new();
    context.write_config(indoc! {r"
        repos:
          - repo: local
            hooks:
              - id: fake
                name: fake
                entry: 'false'
                language: system
                files: '\.py$'
    "});
    context.write_file("a.py", "x = 1\n");
    context.git(&["add", "."]);

    context
        .command()
        .arg("run")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Failed"));
}

#[test]
fn fail_language_blocks_and_names_files() {
    let context = TestContext::new();
    context.write_config(indoc! {r"
        repos:
          - repo: local
            hooks:
              - id: block
                name: block
                entry: files must not be added
                language: fail
                files: '.*'
    "});
    context.write_file("a.py", "x = 1\n");
    context.git(&["add", "."]);

    context
        .command()
        .arg("run")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("files must not be added"))
        .stdout(predicate::str::contains("a.py"));
}

#[test]
fn no_matching_files_skips_the_hook() {
    let context = TestContext::new();
    context.write_config(indoc! {r"
        repos:
          - repo: local
            hooks:
              - id: fake
                name: fake
                entry: 'false'
                language: system
                files: '\.rs$'
    "});
    context.write_file("a.py", "x = 1\n");
    context.git(&["add", "."]);

    // The failing entry never runs: no files matched and always_run is off.
    context
        .command()
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("no files to check"));
}

#[test]
fn skip_env_var_skips_named_hooks() {
    let context = TestContext::new();
    context.write_config(indoc! {r"
        repos:
          - repo: local
            hooks:
              - id: fake
                name: fake
                entry: 'false'
                language: system
    "});
    context.write_file("a.py", "x = 1\n");
    context.git(&["add", "."]);

    context
        .command()
        .arg("run")
        .env("SKIP", "fake")
        .assert()
        .success()
        .stdout(predicate::str::contains("Skipped"));
}

#[test]
fn unstaged_changes_are_preserved_across_a_run() {
    let context = TestContext::new();
    context.write_config(indoc! {r"
        repos:
          - repo: local
            hooks:
              - id: fake
                name: fake
                entry: 'true'
                language: system
    "});
    context.write_file("a.py", "committed\n");
    context.git(&["add", "."]);
    context.git(&["commit", "-m", "init"]);

    context.write_file("a.py", "staged\n");
    context.git(&["add", "a.py"]);
    context.write_file("a.py", "unstaged edit\n");

    context.command().arg("run").assert().success();

    // The hook saw staged content; the unstaged edit is back afterwards.
    assert_eq!(context.read_file("a.py"), "unstaged edit\n");
    // And the staged content is still staged.
    let output = std::process::Command::new("git")
        .current_dir(context.repo.path())
        .args(["show", ":a.py"])
        .output()
        .unwrap();
    assert_eq!(String::from_utf8(output.stdout).unwrap(), "staged\n");
}

#[test]
fn conflicting_hook_changes_are_rolled_back() {
    let context = TestContext::new();
    context.write_config(indoc! {r#"
        repos:
          - repo: local
            hooks:
              - id: clobber
                name: clobber
                entry: sh -c 'printf "clobber\n" > a.py'
                language: system
                always_run: true
                pass_filenames: false
    "#});
    context.write_file("a.py", "line one\n");
    context.git(&["add", "."]);
    context.git(&["commit", "-m", "init"]);

    context.write_file("a.py", "line one\nstaged two\n");
    context.git(&["add", "a.py"]);
    context.write_file("a.py", "line one\nunstaged two\n");

    // The hook's rewrite conflicts with the stashed delta: the run fails and
    // the hook's changes are rolled back in favor of the user's edit.
    context.command().arg("run").assert().code(1);
    assert_eq!(context.read_file("a.py"), "line one\nunstaged two\n");
}

#[test]
fn all_files_flag_overrides_staged_selection() {
    let context = TestContext::new();
    context.write_config(indoc! {r"
        repos:
          - repo: local
            hooks:
              - id: fake
                name: fake
                entry: 'false'
                language: system
                files: '\.py$'
    "});
    context.write_file("a.py", "x = 1\n");
    context.git(&["add", "."]);
    context.git(&["commit", "-m", "init"]);

    // Nothing staged: the per-stage selection is empty and the hook skips...
    context.command().arg("run").assert().success();
    // ...but --all-files runs it over the committed tree.
    context
        .command()
        .arg("run")
        .arg("--all-files")
        .assert()
        .code(1);
}

#[test]
fn hook_timeout_reports_failure() {
    let context = TestContext::new();
    context.write_config(indoc! {r"
        repos:
          - repo: local
            hooks:
              - id: slow
                name: slow
                entry: sleep 30
                language: system
                always_run: true
                pass_filenames: false
    "});
    context.write_file("a.py", "x = 1\n");
    context.git(&["add", "."]);

    context
        .command()
        .arg("run")
        .arg("--hook-timeout")
        .arg("1")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Timed out"));
}

#[test]
fn remote_repo_hooks_resolve_from_the_cache() {
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
        .success()
        .stdout(predicate::str::contains("greet"))
        .stdout(predicate::str::contains("Passed"));

    // A second run reuses the cached clone.
    context
        .command()
        .arg("run")
        .arg("--all-files")
        .assert()
        .success();
}

#[test]
fn unknown_hook_id_in_remote_repo_is_an_error() {
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
                  - id: nonexistent
        "},
        hooks_repo.path().display(),
        sha,
    ));
    context.write_file("a.py", "x = 1\n");
    context.git(&["add", "."]);

    context
        .command()
        .arg("run")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("nonexistent"));
}

#[test]
fn meta_identity_prints_its_input() {
    let context = TestContext::new();
    context.write_config(indoc! {r"
        repos:
          - repo: meta
            hooks:
              - id: identity
    "});
    context.git(&["add", "."]);

    context
        .command()
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains(".pre-commit-config.yaml"));
}

#[test]
fn meta_check_hooks_apply_flags_dead_hooks() {
    let context = TestContext::new();
    context.write_config(indoc! {r"
        repos:
          - repo: meta
            hooks:
              - id: check-hooks-apply
          - repo: local
            hooks:
              - id: never-matches
                name: never-matches
                entry: 'true'
                language: system
                files: '\.nonexistent$'
    "});
    context.write_file("a.py", "x = 1\n");
    context.git(&["add", "."]);
    context.git(&["commit", "-m", "init"]);

    context
        .command()
        .arg("run")
        .arg("check-hooks-apply")
        .arg("--all-files")
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "never-matches does not apply to this repository",
        ));
}

#[test]
fn hook_id_argument_filters_hooks() {
    let context = TestContext::new();
    context.write_config(indoc! {r"
        repos:
          - repo: local
            hooks:
              - id: good
                name: good
                entry: 'true'
                language: system
              - id: bad
                name: bad
                entry: 'false'
                language: system
    "});
    context.write_file("a.py", "x = 1\n");
    context.git(&["add", "."]);

    // Only the selected hook runs; the failing one is never invoked.
    context.command().arg("run").arg("good").assert().success();

    context
        .command()
        .arg("run")
        .arg("missing")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("missing"));
}
