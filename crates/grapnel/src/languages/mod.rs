use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, trace, warn};

use grapnel_consts::env_vars::EnvVars;

use crate::config::Language;
use crate::fs::CWD;
use crate::hook::Hook;
use crate::identify::parse_shebang;

mod docker;
mod fail;
mod golang;
mod node;
mod pygrep;
mod python;
mod ruby;
mod rust;
mod script;
mod system;

pub(crate) use fail::render as fail_render;
pub(crate) use pygrep::run as pygrep_run;

static DOCKER: docker::Docker = docker::Docker;
static DOCKER_IMAGE: docker::Docker = docker::Docker;
static FAIL: fail::Fail = fail::Fail;
static GOLANG: golang::Golang = golang::Golang;
static NODE: node::Node = node::Node;
static PYGREP: pygrep::Pygrep = pygrep::Pygrep;
static PYTHON: python::Python = python::Python;
static RUBY: ruby::Ruby = ruby::Ruby;
static RUST: rust::Rust = rust::Rust;
static SCRIPT: script::Script = script::Script;
static SYSTEM: system::System = system::System;

/// How the executor should invoke a hook.
pub(crate) enum Invocation {
    /// An argv prefix to which file arguments are appended.
    Command(Vec<String>),
    /// Print the entry and the matched files, then fail. Used to
    /// intentionally block matched files; no process is spawned.
    FailMessage,
    /// In-process regex grep over the matched files; no process is spawned.
    PyGrep,
}

/// An environment variable change required to activate a hook environment:
/// `Some` sets the variable, `None` removes it from the child environment.
pub(crate) type EnvChange = (&'static str, Option<OsString>);

/// The capability set every language adapter satisfies.
///
/// `install` materializes an environment for `(language, version,
/// additional_dependencies)` into the given directory and must be idempotent.
/// `check_health` decides whether a cached environment is usable without a
/// rebuild. `build_command` and `build_env` describe how to execute a hook
/// against an environment.
pub(crate) trait LanguageImpl {
    async fn install(&self, hook: &Hook, env_dir: &Path) -> Result<()>;

    async fn check_health(&self, env_dir: &Path) -> Result<()>;

    fn build_command(&self, hook: &Hook, env_dir: Option<&Path>) -> Result<Invocation>;

    fn build_env(&self, hook: &Hook, env_dir: Option<&Path>) -> Result<Vec<EnvChange>>;
}

/// Languages grapnel can run hooks in.
pub(crate) fn supported(language: Language) -> bool {
    matches!(
        language,
        Language::Docker
            | Language::DockerImage
            | Language::Fail
            | Language::Golang
            | Language::Node
            | Language::Pygrep
            | Language::Python
            | Language::Python2
            | Language::Ruby
            | Language::Rust
            | Language::Script
            | Language::System
    )
}

/// Whether the language materializes an on-disk environment.
pub(crate) fn supports_install_env(language: Language) -> bool {
    matches!(
        language,
        Language::Golang
            | Language::Node
            | Language::Python
            | Language::Python2
            | Language::Ruby
            | Language::Rust
    )
}

/// Whether the language can install `additional_dependencies`.
pub(crate) fn supports_dependencies(language: Language) -> bool {
    supports_install_env(language)
}

/// The version token used when a hook and the config are both silent.
pub(crate) fn default_version_token(_language: Language) -> &'static str {
    "default"
}

macro_rules! dispatch {
    ($language:expr, $method:ident ( $($arg:expr),* )) => {
        match $language {
            Language::Docker => DOCKER.$method($($arg),*),
            Language::DockerImage => DOCKER_IMAGE.$method($($arg),*),
            Language::Fail => FAIL.$method($($arg),*),
            Language::Golang => GOLANG.$method($($arg),*),
            Language::Node => NODE.$method($($arg),*),
            Language::Pygrep => PYGREP.$method($($arg),*),
            Language::Python | Language::Python2 => PYTHON.$method($($arg),*),
            Language::Ruby => RUBY.$method($($arg),*),
            Language::Rust => RUST.$method($($arg),*),
            Language::Script => SCRIPT.$method($($arg),*),
            Language::System => SYSTEM.$method($($arg),*),
            other => anyhow::bail!("Language `{other}` is not supported"),
        }
    };
}

macro_rules! dispatch_async {
    ($language:expr, $method:ident ( $($arg:expr),* )) => {
        match $language {
            Language::Docker => DOCKER.$method($($arg),*).await,
            Language::DockerImage => DOCKER_IMAGE.$method($($arg),*).await,
            Language::Fail => FAIL.$method($($arg),*).await,
            Language::Golang => GOLANG.$method($($arg),*).await,
            Language::Node => NODE.$method($($arg),*).await,
            Language::Pygrep => PYGREP.$method($($arg),*).await,
            Language::Python | Language::Python2 => PYTHON.$method($($arg),*).await,
            Language::Ruby => RUBY.$method($($arg),*).await,
            Language::Rust => RUST.$method($($arg),*).await,
            Language::Script => SCRIPT.$method($($arg),*).await,
            Language::System => SYSTEM.$method($($arg),*).await,
            other => anyhow::bail!("Language `{other}` is not supported"),
        }
    };
}

pub(crate) async fn install(hook: &Hook, env_dir: &Path) -> Result<()> {
    dispatch_async!(hook.language, install(hook, env_dir))
}

pub(crate) async fn check_health(language: Language, env_dir: &Path) -> Result<()> {
    dispatch_async!(language, check_health(env_dir))
}

pub(crate) fn build_command(hook: &Hook, env_dir: Option<&Path>) -> Result<Invocation> {
    dispatch!(hook.language, build_command(hook, env_dir))
}

pub(crate) fn build_env(hook: &Hook, env_dir: Option<&Path>) -> Result<Vec<EnvChange>> {
    dispatch!(hook.language, build_env(hook, env_dir))
}

pub(crate) const ENV_MARKER: &str = ".grapnel-env.json";

/// Metadata written into an environment directory after a successful install.
/// Its absence marks a partial install, which is rebuilt on next use.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct EnvInfo {
    pub language: Language,
    pub version: String,
    pub dependencies: Vec<String>,
}

impl EnvInfo {
    fn for_hook(hook: &Hook) -> Self {
        let mut dependencies = hook.additional_dependencies.clone();
        dependencies.sort_unstable();
        Self {
            language: hook.language,
            version: hook.language_version.clone(),
            dependencies,
        }
    }

    pub(crate) async fn write(hook: &Hook, env_dir: &Path) -> Result<()> {
        let info = Self::for_hook(hook);
        let content = serde_json::to_string_pretty(&info)?;
        fs_err::tokio::write(env_dir.join(ENV_MARKER), content).await?;
        Ok(())
    }

    pub(crate) async fn read(env_dir: &Path) -> Result<Self> {
        let content = fs_err::tokio::read_to_string(env_dir.join(ENV_MARKER)).await?;
        Ok(serde_json::from_str(&content)?)
    }

    pub(crate) fn matches(&self, hook: &Hook) -> bool {
        let expected = Self::for_hook(hook);
        self.language == expected.language
            && self.version == expected.version
            && self.dependencies == expected.dependencies
    }
}

/// The directory name of a hook's environment within its repo cache
/// directory: the language and version token, plus a digest of the
/// dependency set when one is present.
pub(crate) fn environment_name(hook: &Hook) -> Option<String> {
    if !supports_install_env(hook.language) {
        return None;
    }

    let base = format!("{}-{}", hook.language.as_str(), hook.language_version);
    if hook.additional_dependencies.is_empty() {
        return Some(base);
    }

    let mut deps = hook.additional_dependencies.clone();
    deps.sort_unstable();
    let mut hasher = Sha256::new();
    for dep in &deps {
        hasher.update(dep.as_bytes());
        hasher.update(b"\0");
    }
    let digest = hex::encode(&hasher.finalize()[..4]);
    Some(format!("{base}-{digest}"))
}

/// Ensure the hook's environment exists and is healthy, returning its path.
///
/// Returns `Ok(None)` for languages that don't install environments. An
/// unhealthy cached environment is rebuilt exactly once; a second failure
/// surfaces as an install error.
pub(crate) async fn ensure_environment(
    hook: &Hook,
    local_envs_dir: &Path,
) -> Result<Option<PathBuf>> {
    let Some(name) = environment_name(hook) else {
        return Ok(None);
    };

    let env_root = match hook.repo_path() {
        Some(path) => path.to_path_buf(),
        None => local_envs_dir.to_path_buf(),
    };
    let env_dir = env_root.join(name);

    if env_dir.is_dir() {
        match environment_healthy(hook, &env_dir).await {
            Ok(()) => {
                trace!(hook = %hook, env = %env_dir.display(), "Reusing healthy environment");
                return Ok(Some(env_dir));
            }
            Err(err) => {
                warn!(%err, env = %env_dir.display(), "Environment unhealthy, rebuilding");
                fs_err::tokio::remove_dir_all(&env_dir).await?;
            }
        }
    }

    fs_err::tokio::create_dir_all(&env_root).await?;
    debug!(hook = %hook, env = %env_dir.display(), "Installing environment");
    install(hook, &env_dir)
        .await
        .with_context(|| format!("Failed to install environment for hook `{hook}`"))?;
    EnvInfo::write(hook, &env_dir).await?;

    Ok(Some(env_dir))
}

/// A cached environment is healthy when its marker matches the hook's
/// requirements and the adapter's own probe passes.
async fn environment_healthy(hook: &Hook, env_dir: &Path) -> Result<()> {
    let info = EnvInfo::read(env_dir)
        .await
        .context("Missing or unreadable environment metadata")?;
    if !info.matches(hook) {
        anyhow::bail!(
            "Environment was built for {}-{}, hook wants {}-{}",
            info.language,
            info.version,
            hook.language,
            hook.language_version,
        );
    }
    check_health(hook.language, env_dir).await
}

/// Resolve the actual process invocation, honoring shebangs and PATH lookups.
pub(crate) fn resolve_command(mut cmds: Vec<String>, paths: Option<&std::ffi::OsStr>) -> Vec<String> {
    let env_path = if paths.is_none() {
        EnvVars::var_os(EnvVars::PATH)
    } else {
        None
    };
    let paths = paths.or(env_path.as_deref());

    let candidate = &cmds[0];
    let resolved = match which::which_in(candidate, paths, &*CWD) {
        Ok(p) => p,
        Err(_) => PathBuf::from(candidate),
    };
    trace!("Resolved command: {}", resolved.display());

    if let Ok(mut shebang_argv) = parse_shebang(&resolved) {
        trace!("Found shebang: {shebang_argv:?}");
        if let Ok(p) = which::which_in(&shebang_argv[0], paths, &*CWD) {
            shebang_argv[0] = p.to_string_lossy().to_string();
        }
        shebang_argv.push(resolved.to_string_lossy().to_string());
        shebang_argv.extend_from_slice(&cmds[1..]);
        shebang_argv
    } else {
        cmds[0] = resolved.to_string_lossy().to_string();
        cmds
    }
}

/// Prepend a directory to `$PATH` for a child process.
pub(crate) fn path_with(bin_dir: &Path) -> Result<OsString> {
    grapnel_consts::env_vars::prepend_paths(&[bin_dir]).context("Failed to join PATH")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HookOptions, ManifestHook};
    use crate::hook::{HookBuilder, Repo};
    use std::sync::Arc;

    fn hook_with(language: Language, deps: &[&str]) -> Hook {
        let definition = ManifestHook {
            id: "x".to_string(),
            name: "x".to_string(),
            entry: "true".to_string(),
            language,
            options: HookOptions {
                additional_dependencies: if deps.is_empty() {
                    None
                } else {
                    Some(deps.iter().map(ToString::to_string).collect())
                },
                ..Default::default()
            },
        };
        HookBuilder::from_local(Arc::new(Repo::Local { hooks: vec![] }), definition, 0)
            .build()
            .unwrap()
    }

    #[test]
    fn environment_name_includes_language_and_version() {
        let hook = hook_with(Language::Python, &[]);
        assert_eq!(environment_name(&hook).as_deref(), Some("python-default"));

        // No environment for non-installing languages.
        let hook = hook_with(Language::System, &[]);
        assert_eq!(environment_name(&hook), None);
    }

    #[test]
    fn environment_name_digest_is_order_independent() {
        let a = hook_with(Language::Python, &["flake8", "black"]);
        let b = hook_with(Language::Python, &["black", "flake8"]);
        let c = hook_with(Language::Python, &["black"]);

        assert_eq!(environment_name(&a), environment_name(&b));
        assert_ne!(environment_name(&a), environment_name(&c));
    }

    #[test]
    fn env_info_round_trip_matches() {
        let hook = hook_with(Language::Python, &["black"]);
        let info = EnvInfo::for_hook(&hook);
        assert!(info.matches(&hook));

        let other = hook_with(Language::Python, &["black", "flake8"]);
        assert!(!info.matches(&other));
    }
}
