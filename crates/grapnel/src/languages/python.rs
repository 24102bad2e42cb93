use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, trace};

use grapnel_consts::env_vars::EnvVars;

use crate::hook::Hook;
use crate::languages::{EnvChange, Invocation, LanguageImpl, path_with, resolve_command};
use crate::process::Cmd;

/// Python hooks run from a virtualenv created with the user's interpreter;
/// the hook repository and its `additional_dependencies` are pip-installed
/// into it.
#[derive(Debug, Copy, Clone)]
pub(crate) struct Python;

pub(crate) fn bin_dir(env_dir: &Path) -> PathBuf {
    if cfg!(windows) {
        env_dir.join("Scripts")
    } else {
        env_dir.join("bin")
    }
}

fn python_exe(env_dir: &Path) -> PathBuf {
    bin_dir(env_dir).join(if cfg!(windows) { "python.exe" } else { "python" })
}

/// Find the base interpreter for the requested version token.
///
/// Accepts `default`, a bare version like `3.12`, an executable name like
/// `python3.12`, or a path to an interpreter.
fn find_python(version: &str) -> Result<PathBuf> {
    let candidates: Vec<String> = if version.is_empty() || version == "default" {
        vec!["python3".to_string(), "python".to_string()]
    } else if version.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        vec![format!("python{version}")]
    } else {
        vec![version.to_string()]
    };

    for candidate in &candidates {
        let path = Path::new(candidate);
        if path.is_absolute() && path.is_file() {
            return Ok(path.to_path_buf());
        }
        if let Ok(found) = which::which(candidate) {
            return Ok(found);
        }
    }
    anyhow::bail!(
        "No suitable Python interpreter found for `{version}` (tried {})",
        candidates.join(", ")
    )
}

impl LanguageImpl for Python {
    async fn install(&self, hook: &Hook, env_dir: &Path) -> Result<()> {
        let python = find_python(&hook.language_version)?;
        debug!(python = %python.display(), env = %env_dir.display(), "Creating virtualenv");

        Cmd::new(&python, "python -m venv")
            .arg("-m")
            .arg("venv")
            .arg(env_dir)
            .check(true)
            .output()
            .await
            .context("Failed to create virtualenv")?;

        let env_python = python_exe(env_dir);
        let mut to_install: Vec<String> = Vec::new();
        if let Some(repo_path) = hook.repo_path() {
            to_install.push(repo_path.to_string_lossy().to_string());
        }
        to_install.extend(hook.additional_dependencies.iter().cloned());

        if to_install.is_empty() {
            trace!("No dependencies to install");
            return Ok(());
        }

        Cmd::new(&env_python, "pip install")
            .arg("-m")
            .arg("pip")
            .arg("install")
            .arg("--quiet")
            .arg("--disable-pip-version-check")
            .args(&to_install)
            .env(EnvVars::VIRTUAL_ENV, env_dir)
            .env_remove(EnvVars::PYTHONHOME)
            .remove_git_envs()
            .check(true)
            .output()
            .await
            .context("Failed to install dependencies")?;

        Ok(())
    }

    async fn check_health(&self, env_dir: &Path) -> Result<()> {
        let python = python_exe(env_dir);
        if !python.is_file() {
            anyhow::bail!("Interpreter missing at `{}`", python.display());
        }
        // The venv links back to the base interpreter; if that moved or was
        // upgraded the env cannot be trusted.
        Cmd::new(&python, "python --version")
            .arg("--version")
            .check(true)
            .output()
            .await
            .context("Interpreter does not respond")?;
        Ok(())
    }

    fn build_command(&self, hook: &Hook, env_dir: Option<&Path>) -> Result<Invocation> {
        let env_dir = env_dir.expect("python hooks have an environment");
        let entry = hook.entry.split()?;
        let new_path = path_with(&bin_dir(env_dir))?;
        Ok(Invocation::Command(resolve_command(
            entry,
            Some(new_path.as_os_str()),
        )))
    }

    fn build_env(&self, _hook: &Hook, env_dir: Option<&Path>) -> Result<Vec<EnvChange>> {
        let env_dir = env_dir.expect("python hooks have an environment");
        Ok(vec![
            (EnvVars::VIRTUAL_ENV, Some(env_dir.as_os_str().to_owned())),
            (EnvVars::PATH, Some(path_with(&bin_dir(env_dir))?)),
            (EnvVars::PYTHONHOME, None),
        ])
    }
}
