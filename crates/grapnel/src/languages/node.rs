use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use grapnel_consts::env_vars::EnvVars;

use crate::hook::Hook;
use crate::languages::{EnvChange, Invocation, LanguageImpl, path_with, resolve_command};
use crate::process::Cmd;

/// Node hooks install the hook repository and its dependencies into a
/// per-hook npm prefix using the user's `node`/`npm`.
#[derive(Debug, Copy, Clone)]
pub(crate) struct Node;

fn bin_dir(env_dir: &Path) -> PathBuf {
    if cfg!(windows) {
        env_dir.to_path_buf()
    } else {
        env_dir.join("bin")
    }
}

fn node_modules(env_dir: &Path) -> PathBuf {
    if cfg!(windows) {
        env_dir.join("node_modules")
    } else {
        env_dir.join("lib").join("node_modules")
    }
}

impl LanguageImpl for Node {
    async fn install(&self, hook: &Hook, env_dir: &Path) -> Result<()> {
        let npm = which::which("npm").context("`npm` not found on PATH")?;
        fs_err::tokio::create_dir_all(env_dir).await?;

        let mut to_install: Vec<String> = Vec::new();
        if let Some(repo_path) = hook.repo_path() {
            to_install.push(repo_path.to_string_lossy().to_string());
        }
        to_install.extend(hook.additional_dependencies.iter().cloned());

        if to_install.is_empty() {
            return Ok(());
        }

        debug!(env = %env_dir.display(), "Installing node packages");
        Cmd::new(&npm, "npm install")
            .arg("install")
            .arg("-g")
            .arg("--no-audit")
            .arg("--no-fund")
            .args(&to_install)
            .env(EnvVars::NPM_CONFIG_PREFIX, env_dir)
            .remove_git_envs()
            .check(true)
            .output()
            .await
            .context("Failed to install node packages")?;

        Ok(())
    }

    async fn check_health(&self, env_dir: &Path) -> Result<()> {
        if !node_modules(env_dir).is_dir() {
            anyhow::bail!("node_modules missing in `{}`", env_dir.display());
        }
        which::which("node").context("`node` not found on PATH")?;
        Ok(())
    }

    fn build_command(&self, hook: &Hook, env_dir: Option<&Path>) -> Result<Invocation> {
        let env_dir = env_dir.expect("node hooks have an environment");
        let entry = hook.entry.split()?;
        let new_path = path_with(&bin_dir(env_dir))?;
        Ok(Invocation::Command(resolve_command(
            entry,
            Some(new_path.as_os_str()),
        )))
    }

    fn build_env(&self, _hook: &Hook, env_dir: Option<&Path>) -> Result<Vec<EnvChange>> {
        let env_dir = env_dir.expect("node hooks have an environment");
        Ok(vec![
            (
                EnvVars::NPM_CONFIG_PREFIX,
                Some(env_dir.as_os_str().to_owned()),
            ),
            (
                EnvVars::NODE_PATH,
                Some(node_modules(env_dir).into_os_string()),
            ),
            (EnvVars::PATH, Some(path_with(&bin_dir(env_dir))?)),
        ])
    }
}
