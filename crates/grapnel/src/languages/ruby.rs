use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use grapnel_consts::env_vars::EnvVars;

use crate::hook::Hook;
use crate::languages::{EnvChange, Invocation, LanguageImpl, path_with, resolve_command};
use crate::process::Cmd;

/// Ruby hooks install gems (the hook repository's gemspec plus
/// `additional_dependencies`) into a per-hook `GEM_HOME`.
#[derive(Debug, Copy, Clone)]
pub(crate) struct Ruby;

fn gems_dir(env_dir: &Path) -> PathBuf {
    env_dir.join("gems")
}

fn bin_dir(env_dir: &Path) -> PathBuf {
    gems_dir(env_dir).join("bin")
}

async fn build_repo_gem(repo_path: &Path) -> Result<Option<PathBuf>> {
    let Some(gemspec) = fs_err::read_dir(repo_path)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .find(|path| path.extension().is_some_and(|ext| ext == "gemspec"))
    else {
        return Ok(None);
    };

    let gem = which::which("gem").context("`gem` not found on PATH")?;
    Cmd::new(&gem, "gem build")
        .current_dir(repo_path)
        .arg("build")
        .arg("--norc")
        .arg(&gemspec)
        .remove_git_envs()
        .check(true)
        .output()
        .await
        .context("Failed to build hook repository gem")?;

    let built = fs_err::read_dir(repo_path)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .find(|path| path.extension().is_some_and(|ext| ext == "gem"));
    Ok(built)
}

impl LanguageImpl for Ruby {
    async fn install(&self, hook: &Hook, env_dir: &Path) -> Result<()> {
        let gem = which::which("gem").context("`gem` not found on PATH")?;
        fs_err::tokio::create_dir_all(&gems_dir(env_dir)).await?;

        let mut to_install: Vec<String> = Vec::new();
        if let Some(repo_path) = hook.repo_path() {
            if let Some(built) = build_repo_gem(repo_path).await? {
                to_install.push(built.to_string_lossy().to_string());
            }
        }
        to_install.extend(hook.additional_dependencies.iter().cloned());

        if to_install.is_empty() {
            return Ok(());
        }

        debug!(env = %env_dir.display(), "Installing gems");
        Cmd::new(&gem, "gem install")
            .arg("install")
            .arg("--norc")
            .arg("--no-document")
            .arg("--no-format-executable")
            .arg("--install-dir")
            .arg(gems_dir(env_dir))
            .arg("--bindir")
            .arg(bin_dir(env_dir))
            .args(&to_install)
            .env(EnvVars::GEM_HOME, gems_dir(env_dir))
            .env(EnvVars::BUNDLE_IGNORE_CONFIG, "1")
            .remove_git_envs()
            .check(true)
            .output()
            .await
            .context("Failed to install gems")?;

        Ok(())
    }

    async fn check_health(&self, env_dir: &Path) -> Result<()> {
        if !gems_dir(env_dir).is_dir() {
            anyhow::bail!("gem home missing in `{}`", env_dir.display());
        }
        which::which("ruby").context("`ruby` not found on PATH")?;
        Ok(())
    }

    fn build_command(&self, hook: &Hook, env_dir: Option<&Path>) -> Result<Invocation> {
        let env_dir = env_dir.expect("ruby hooks have an environment");
        let entry = hook.entry.split()?;
        let new_path = path_with(&bin_dir(env_dir))?;
        Ok(Invocation::Command(resolve_command(
            entry,
            Some(new_path.as_os_str()),
        )))
    }

    fn build_env(&self, _hook: &Hook, env_dir: Option<&Path>) -> Result<Vec<EnvChange>> {
        let env_dir = env_dir.expect("ruby hooks have an environment");
        Ok(vec![
            (EnvVars::GEM_HOME, Some(gems_dir(env_dir).into_os_string())),
            (EnvVars::GEM_PATH, Some(std::ffi::OsString::new())),
            (EnvVars::BUNDLE_IGNORE_CONFIG, Some("1".into())),
            (EnvVars::PATH, Some(path_with(&bin_dir(env_dir))?)),
        ])
    }
}
