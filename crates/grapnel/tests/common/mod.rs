#![allow(dead_code)]

use std::path::Path;

/// A scratch git repository plus an isolated cache root for driving the
/// `grapnel` binary.
pub struct TestContext {
    pub repo: assert_fs::TempDir,
    pub home: assert_fs::TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        let repo = assert_fs::TempDir::new().unwrap();
        let home = assert_fs::TempDir::new().unwrap();
        init_repo(repo.path());
        Self { repo, home }
    }

    pub fn write_config(&self, content: &str) {
        std::fs::write(self.repo.path().join(".pre-commit-config.yaml"), content).unwrap();
    }

    pub fn write_file(&self, name: &str, content: &str) {
        std::fs::write(self.repo.path().join(name), content).unwrap();
    }

    pub fn read_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.repo.path().join(name)).unwrap()
    }

    pub fn git(&self, args: &[&str]) {
        git_in(self.repo.path(), args);
    }

    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::Command::cargo_bin("grapnel").unwrap();
        cmd.current_dir(self.repo.path())
            .env("GRAPNEL_HOME", self.home.path())
            .env("GIT_CONFIG_GLOBAL", "/dev/null")
            .env("GIT_CONFIG_SYSTEM", "/dev/null")
            .env_remove("SKIP")
            .env_remove("PRE_COMMIT_HOME");
        cmd
    }
}

pub fn git_in(dir: &Path, args: &[&str]) {
    let status = std::process::Command::new("git")
        .current_dir(dir)
        .env("GIT_CONFIG_GLOBAL", "/dev/null")
        .env("GIT_CONFIG_SYSTEM", "/dev/null")
        .args(args)
        .status()
        .expect("failed to run git");
    assert!(status.success(), "git {args:?} failed in {dir:?}");
}

pub fn init_repo(dir: &Path) {
    git_in(dir, &["init", "--initial-branch=main"]);
    git_in(dir, &["config", "user.name", "test"]);
    git_in(dir, &["config", "user.email", "test@example.com"]);
    git_in(dir, &["config", "commit.gpgsign", "false"]);
}

/// Create a hook-source repository with the given manifest, committed, and
/// return `(path, head_sha)`.
pub fn hook_repo(manifest: &str) -> (assert_fs::TempDir, String) {
    let dir = assert_fs::TempDir::new().unwrap();
    init_repo(dir.path());
    std::fs::write(dir.path().join(".pre-commit-hooks.yaml"), manifest).unwrap();
    git_in(dir.path(), &["add", "."]);
    git_in(dir.path(), &["commit", "-m", "init"]);

    let output = std::process::Command::new("git")
        .current_dir(dir.path())
        .args(["rev-parse", "HEAD"])
        .output()
        .unwrap();
    let sha = String::from_utf8(output.stdout).unwrap().trim().to_string();
    (dir, sha)
}
