use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::hook::Hook;
use crate::languages::{EnvChange, Invocation, LanguageImpl, path_with, resolve_command};
use crate::process::Cmd;

/// Rust hooks `cargo install` the hook repository (and any `cli:`-prefixed
/// `additional_dependencies`) into a per-hook install root.
#[derive(Debug, Copy, Clone)]
pub(crate) struct Rust;

fn bin_dir(env_dir: &Path) -> PathBuf {
    env_dir.join("bin")
}

impl LanguageImpl for Rust {
    async fn install(&self, hook: &Hook, env_dir: &Path) -> Result<()> {
        let cargo = which::which("cargo").context("`cargo` not found on PATH")?;
        fs_err::tokio::create_dir_all(env_dir).await?;

        if let Some(repo_path) = hook.repo_path() {
            debug!(env = %env_dir.display(), "Installing hook repository crate");
            Cmd::new(&cargo, "cargo install")
                .arg("install")
                .arg("--quiet")
                .arg("--bins")
                .arg("--root")
                .arg(env_dir)
                .arg("--path")
                .arg(repo_path)
                .remove_git_envs()
                .check(true)
                .output()
                .await
                .context("Failed to install hook repository crate")?;
        }

        for dep in &hook.additional_dependencies {
            // `cli:name` or `cli:name:version` installs a binary crate from
            // the registry; bare names are library dependencies which have no
            // meaning outside the repository build.
            let Some(spec) = dep.strip_prefix("cli:") else {
                anyhow::bail!(
                    "Unsupported rust dependency `{dep}`: only `cli:<crate>[:<version>]` is supported"
                );
            };
            let (name, version) = match spec.split_once(':') {
                Some((name, version)) => (name, Some(version)),
                None => (spec, None),
            };

            let mut cmd = Cmd::new(&cargo, "cargo install");
            cmd.arg("install")
                .arg("--quiet")
                .arg("--root")
                .arg(env_dir)
                .arg(name);
            if let Some(version) = version {
                cmd.arg("--version").arg(version);
            }
            cmd.remove_git_envs()
                .check(true)
                .output()
                .await
                .with_context(|| format!("Failed to install `{name}`"))?;
        }

        Ok(())
    }

    async fn check_health(&self, env_dir: &Path) -> Result<()> {
        if !bin_dir(env_dir).is_dir() {
            anyhow::bail!("install root missing in `{}`", env_dir.display());
        }
        Ok(())
    }

    fn build_command(&self, hook: &Hook, env_dir: Option<&Path>) -> Result<Invocation> {
        let env_dir = env_dir.expect("rust hooks have an environment");
        let entry = hook.entry.split()?;
        let new_path = path_with(&bin_dir(env_dir))?;
        Ok(Invocation::Command(resolve_command(
            entry,
            Some(new_path.as_os_str()),
        )))
    }

    fn build_env(&self, _hook: &Hook, env_dir: Option<&Path>) -> Result<Vec<EnvChange>> {
        let env_dir = env_dir.expect("rust hooks have an environment");
        Ok(vec![(
            grapnel_consts::env_vars::EnvVars::PATH,
            Some(path_with(&bin_dir(env_dir))?),
        )])
    }
}
