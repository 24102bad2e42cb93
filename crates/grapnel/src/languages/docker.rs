use std::path::Path;

use anyhow::{Context, Result};

use crate::hook::Hook;
use crate::languages::{EnvChange, Invocation, LanguageImpl};

/// Wrap the hook's argv in a container invocation. No environment is
/// installed; the `entry` names the image followed by the command to run
/// inside it. The working tree is bind-mounted at `/src`.
#[derive(Debug, Copy, Clone)]
pub(crate) struct Docker;

fn docker_run_prefix() -> Result<Vec<String>> {
    let docker = which::which("docker").context("`docker` not found on PATH")?;

    let mut argv = vec![
        docker.to_string_lossy().to_string(),
        "run".to_string(),
        "--rm".to_string(),
    ];

    // Run as the invoking user so files created by the hook stay writable.
    #[cfg(unix)]
    {
        let uid = unsafe { libc::getuid() };
        let gid = unsafe { libc::getgid() };
        argv.push("-u".to_string());
        argv.push(format!("{uid}:{gid}"));
    }

    // Hooks run with the repository root as their working directory.
    let mount = std::env::current_dir().context("Failed to get working directory")?;
    argv.push("-v".to_string());
    argv.push(format!("{}:/src:rw,Z", mount.display()));
    argv.push("--workdir".to_string());
    argv.push("/src".to_string());

    Ok(argv)
}

impl LanguageImpl for Docker {
    async fn install(&self, _hook: &Hook, _env_dir: &Path) -> Result<()> {
        Ok(())
    }

    async fn check_health(&self, _env_dir: &Path) -> Result<()> {
        Ok(())
    }

    fn build_command(&self, hook: &Hook, _env_dir: Option<&Path>) -> Result<Invocation> {
        let entry = hook.entry.split()?;
        let mut argv = docker_run_prefix()?;
        argv.extend(entry);
        Ok(Invocation::Command(argv))
    }

    fn build_env(&self, _hook: &Hook, _env_dir: Option<&Path>) -> Result<Vec<EnvChange>> {
        Ok(vec![])
    }
}
