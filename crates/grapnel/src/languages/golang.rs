use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use grapnel_consts::env_vars::EnvVars;

use crate::hook::Hook;
use crate::languages::{EnvChange, Invocation, LanguageImpl, path_with, resolve_command};
use crate::process::Cmd;

/// Go hooks `go install` the hook repository's packages (and any
/// `additional_dependencies` module specs) into a per-hook `GOBIN`.
#[derive(Debug, Copy, Clone)]
pub(crate) struct Golang;

fn bin_dir(env_dir: &Path) -> PathBuf {
    env_dir.join("bin")
}

impl LanguageImpl for Golang {
    async fn install(&self, hook: &Hook, env_dir: &Path) -> Result<()> {
        let go = which::which("go").context("`go` not found on PATH")?;
        fs_err::tokio::create_dir_all(&bin_dir(env_dir)).await?;

        if let Some(repo_path) = hook.repo_path() {
            debug!(env = %env_dir.display(), "Installing go packages from repo");
            Cmd::new(&go, "go install")
                .current_dir(repo_path)
                .arg("install")
                .arg("./...")
                .env(EnvVars::GOBIN, bin_dir(env_dir))
                .env(EnvVars::GOFLAGS, "-mod=mod")
                .remove_git_envs()
                .check(true)
                .output()
                .await
                .context("Failed to install go packages")?;
        }

        for dep in &hook.additional_dependencies {
            // Module specs may carry a version: `golang.org/x/tools/cmd/goimports@latest`
            let spec = if dep.contains('@') {
                dep.clone()
            } else {
                format!("{dep}@latest")
            };
            Cmd::new(&go, "go install")
                .arg("install")
                .arg(&spec)
                .env(EnvVars::GOBIN, bin_dir(env_dir))
                .remove_git_envs()
                .check(true)
                .output()
                .await
                .with_context(|| format!("Failed to install `{spec}`"))?;
        }

        Ok(())
    }

    async fn check_health(&self, env_dir: &Path) -> Result<()> {
        if !bin_dir(env_dir).is_dir() {
            anyhow::bail!("GOBIN missing in `{}`", env_dir.display());
        }
        Ok(())
    }

    fn build_command(&self, hook: &Hook, env_dir: Option<&Path>) -> Result<Invocation> {
        let env_dir = env_dir.expect("golang hooks have an environment");
        let entry = hook.entry.split()?;
        let new_path = path_with(&bin_dir(env_dir))?;
        Ok(Invocation::Command(resolve_command(
            entry,
            Some(new_path.as_os_str()),
        )))
    }

    fn build_env(&self, _hook: &Hook, env_dir: Option<&Path>) -> Result<Vec<EnvChange>> {
        let env_dir = env_dir.expect("golang hooks have an environment");
        Ok(vec![(EnvVars::PATH, Some(path_with(&bin_dir(env_dir))?))])
    }
}
