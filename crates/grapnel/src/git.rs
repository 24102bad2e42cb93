use std::path::{Path, PathBuf};
use std::str::Utf8Error;
use std::sync::LazyLock;

use path_clean::PathClean;
use tracing::{debug, instrument, warn};

use grapnel_consts::env_vars::EnvVars;

use crate::process;
use crate::process::{Cmd, StatusError};

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)]
    Command(#[from] process::Error),

    #[error("Failed to find git: {0}")]
    GitNotFound(#[from] which::Error),

    #[error("Not in a git repository")]
    NotARepo,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Utf8(#[from] Utf8Error),
}

pub(crate) static GIT: LazyLock<Result<PathBuf, which::Error>> =
    LazyLock::new(|| which::which("git"));

pub(crate) static GIT_ROOT: LazyLock<Result<PathBuf, Error>> = LazyLock::new(|| {
    get_root().inspect(|root| {
        debug!("Git root: {}", root.display());
    })
});

/// `GIT_` environment variables to strip before running git or hook processes.
///
/// Git hooks run with `GIT_DIR`, `GIT_INDEX_FILE` and friends exported; keeping
/// them would redirect nested git operations (and hook subprocesses) to the
/// wrong repository or index.
pub(crate) static GIT_ENV_TO_REMOVE: LazyLock<Vec<(String, String)>> = LazyLock::new(|| {
    let keep = &[
        "GIT_EXEC_PATH",
        "GIT_SSH",
        "GIT_SSH_COMMAND",
        "GIT_SSL_CAINFO",
    ];

    std::env::vars()
        .filter(|(k, _)| {
            k.starts_with("GIT_")
                && !k.starts_with("GIT_CONFIG_KEY_")
                && !k.starts_with("GIT_CONFIG_VALUE_")
                && !keep.contains(&k.as_str())
        })
        .collect()
});

pub(crate) fn git_cmd(summary: &str) -> Result<Cmd, Error> {
    let mut cmd = Cmd::new(GIT.as_ref().map_err(|&e| Error::GitNotFound(e))?, summary);
    cmd.arg("-c").arg("core.useBuiltinFSMonitor=false");

    Ok(cmd)
}

fn zsplit(s: &[u8]) -> Result<Vec<PathBuf>, Utf8Error> {
    s.split(|&b| b == b'\0')
        .filter(|slice| !slice.is_empty())
        .map(|slice| str::from_utf8(slice).map(PathBuf::from))
        .collect()
}

/// Get the path of the top-level directory of the working tree.
#[instrument(level = "trace")]
pub(crate) fn get_root() -> Result<PathBuf, Error> {
    let git = GIT.as_ref().map_err(|&e| Error::GitNotFound(e))?;
    let output = std::process::Command::new(git)
        .arg("rev-parse")
        .arg("--show-toplevel")
        .output()?;
    if !output.status.success() {
        return Err(Error::NotARepo);
    }

    Ok(PathBuf::from(
        String::from_utf8_lossy(&output.stdout).trim_ascii(),
    ))
}

/// Files with an index entry differing from HEAD (added, copied or modified).
pub(crate) async fn staged_files(root: &Path) -> Result<Vec<PathBuf>, Error> {
    let output = git_cmd("get staged files")?
        .current_dir(root)
        .arg("diff")
        .arg("--cached")
        .arg("--name-only")
        .arg("--diff-filter=ACM")
        .arg("--no-ext-diff") // Disable external diff drivers
        .arg("-z") // Use NUL as line terminator
        .check(true)
        .output()
        .await?;
    Ok(zsplit(&output.stdout)?)
}

/// All tracked files: the index contents. Works in an empty repository.
pub(crate) async fn all_files(root: &Path) -> Result<Vec<PathBuf>, Error> {
    let output = git_cmd("git ls-files")?
        .current_dir(root)
        .arg("ls-files")
        .arg("-z")
        .check(true)
        .output()
        .await?;
    Ok(zsplit(&output.stdout)?)
}

/// Files changed between two refs (added, copied or modified).
pub(crate) async fn changed_files(
    old: &str,
    new: &str,
    root: &Path,
) -> Result<Vec<PathBuf>, Error> {
    let build_cmd = |range: String| -> Result<Cmd, Error> {
        let mut cmd = git_cmd("get changed files")?;
        cmd.current_dir(root)
            .arg("diff")
            .arg("--name-only")
            .arg("--diff-filter=ACM")
            .arg("--no-ext-diff")
            .arg("-z");
        cmd.arg(range);
        Ok(cmd)
    };

    // Try three-dot syntax first (merge-base diff), which works for commits
    let output = build_cmd(format!("{old}...{new}"))?
        .check(false)
        .output()
        .await?;

    if output.status.success() {
        return Ok(zsplit(&output.stdout)?);
    }

    // Fall back to two-dot syntax, which works with both commits and trees
    let output = build_cmd(format!("{old}..{new}"))?
        .check(true)
        .output()
        .await?;
    Ok(zsplit(&output.stdout)?)
}

/// Files a push would update on the remote.
///
/// When the remote ref is all-zeros (new branch) or unknown locally, every
/// tracked file is a candidate.
pub(crate) async fn push_files(
    local_ref: &str,
    remote_ref: &str,
    root: &Path,
) -> Result<Vec<PathBuf>, Error> {
    let zeros = remote_ref.chars().all(|c| c == '0');
    if zeros || !rev_exists(remote_ref, root).await? {
        return all_files(root).await;
    }
    changed_files(remote_ref, local_ref, root).await
}

/// Files changed by the given commit; for a root commit, its tree contents.
pub(crate) async fn commit_files(rev: &str, root: &Path) -> Result<Vec<PathBuf>, Error> {
    if rev_exists(&format!("{rev}^"), root).await? {
        return changed_files(&format!("{rev}^"), rev, root).await;
    }

    let output = git_cmd("git ls-tree")?
        .current_dir(root)
        .arg("ls-tree")
        .arg("-r")
        .arg("--name-only")
        .arg("-z")
        .arg(rev)
        .check(true)
        .output()
        .await?;
    Ok(zsplit(&output.stdout)?)
}

/// Whether the working tree differs from the index.
pub(crate) async fn has_unstaged_changes(root: &Path) -> Result<bool, Error> {
    let status = git_cmd("git diff --quiet")?
        .current_dir(root)
        .arg("diff")
        .arg("--quiet")
        .arg("--no-ext-diff")
        .check(false)
        .status()
        .await?;
    Ok(status.code() == Some(1))
}

/// Whether the single path has unstaged modifications.
pub(crate) async fn has_unstaged_changes_for(root: &Path, path: &Path) -> Result<bool, Error> {
    let status = git_cmd("git diff --quiet")?
        .current_dir(root)
        .arg("diff")
        .arg("--quiet")
        .arg("--no-ext-diff")
        .arg("--")
        .arg(path)
        .check(false)
        .status()
        .await?;
    Ok(status.code() == Some(1))
}

/// Tracked paths whose working-tree content differs from the index.
pub(crate) async fn unstaged_files(root: &Path) -> Result<Vec<PathBuf>, Error> {
    let output = git_cmd("get unstaged files")?
        .current_dir(root)
        .arg("diff")
        .arg("--name-only")
        .arg("--no-ext-diff")
        .arg("--ignore-submodules")
        .arg("-z")
        .check(true)
        .output()
        .await?;
    Ok(zsplit(&output.stdout)?)
}

/// The staged bytes of a path (`:path` in git revision syntax).
pub(crate) async fn staged_content(root: &Path, path: &Path) -> Result<Vec<u8>, Error> {
    let output = git_cmd("git show :path")?
        .current_dir(root)
        .arg("show")
        .arg(format!(":{}", path.display()))
        .check(true)
        .output()
        .await?;
    Ok(output.stdout)
}

/// Whether any path is in the "updated but unmerged" state.
pub(crate) async fn has_unmerged(root: &Path) -> Result<bool, Error> {
    let output = git_cmd("check unmerged paths")?
        .current_dir(root)
        .arg("ls-files")
        .arg("--unmerged")
        .check(true)
        .output()
        .await?;
    Ok(!output.stdout.trim_ascii().is_empty())
}

/// The full unstaged delta as a binary patch.
pub(crate) async fn binary_diff(root: &Path) -> Result<Vec<u8>, Error> {
    let output = git_cmd("git diff --binary")?
        .current_dir(root)
        .arg("diff")
        .arg("--binary")
        .arg("--no-color")
        .arg("--no-ext-diff")
        .arg("--no-textconv")
        .arg("--ignore-submodules")
        .check(true)
        .output()
        .await?;
    Ok(output.stdout)
}

/// Restore a single path's working-tree content from the index, leaving the
/// index itself untouched.
pub(crate) async fn checkout_path(root: &Path, path: &Path) -> Result<(), Error> {
    git_cmd("git checkout")?
        .current_dir(root)
        .arg("checkout")
        .arg("--")
        .arg(path)
        .check(true)
        .output()
        .await?;
    Ok(())
}

/// Force the whole working tree back to the index contents.
pub(crate) async fn checkout_index(root: &Path) -> Result<(), Error> {
    git_cmd("git checkout-index")?
        .current_dir(root)
        .arg("checkout-index")
        .arg("-a")
        .arg("-f")
        .check(true)
        .output()
        .await?;
    Ok(())
}

/// Probe whether a patch would apply cleanly.
///
/// Exit 0 means yes, exit 1 means no, anything else is an error.
pub(crate) async fn apply_check(root: &Path, patch: &Path) -> Result<bool, Error> {
    let output = git_cmd("git apply --check")?
        .current_dir(root)
        .arg("apply")
        .arg("--check")
        .arg("--whitespace=nowarn")
        .arg(patch)
        .check(false)
        .output()
        .await?;
    match output.status.code() {
        Some(0) => Ok(true),
        Some(1) => Ok(false),
        _ => Err(Error::Command(process::Error::Status {
            summary: "git apply --check".to_string(),
            error: StatusError {
                status: output.status,
                output: Some(output),
            },
        })),
    }
}

pub(crate) async fn apply(root: &Path, patch: &Path) -> Result<(), Error> {
    git_cmd("git apply")?
        .current_dir(root)
        .arg("apply")
        .arg("--whitespace=nowarn")
        .arg(patch)
        .check(true)
        .output()
        .await?;
    Ok(())
}

/// Check if a git revision exists.
pub(crate) async fn rev_exists(rev: &str, root: &Path) -> Result<bool, Error> {
    let output = git_cmd("git cat-file -e")?
        .current_dir(root)
        .arg("cat-file")
        .arg("-e")
        .arg(format!("{rev}^{{commit}}"))
        .check(false)
        .output()
        .await?;
    Ok(output.status.success())
}

pub(crate) async fn has_hooks_path_set(root: &Path) -> Result<bool, Error> {
    let output = git_cmd("get git hooks path")?
        .current_dir(root)
        .arg("config")
        .arg("--get")
        .arg("core.hooksPath")
        .check(false)
        .output()
        .await?;
    if output.status.success() {
        Ok(!output.stdout.trim_ascii().is_empty())
    } else {
        Ok(false)
    }
}

/// The hooks directory of the repository at `root`.
pub(crate) async fn hooks_dir(root: &Path) -> Result<PathBuf, Error> {
    let output = git_cmd("get hooks path")?
        .current_dir(root)
        .arg("rev-parse")
        .arg("--git-path")
        .arg("hooks")
        .check(true)
        .output()
        .await?;
    let path = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim_ascii());
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(root.join(path))
    }
}

/// Write a hook script into `.git/hooks/<name>` with mode 0700.
pub(crate) async fn install_hook(root: &Path, name: &str, script: &str) -> Result<(), Error> {
    let hooks = hooks_dir(root).await?;
    fs_err::tokio::create_dir_all(&hooks).await?;
    let target = hooks.join(name);
    fs_err::tokio::write(&target, script).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs_err::tokio::set_permissions(&target, std::fs::Permissions::from_mode(0o700)).await?;
    }
    Ok(())
}

pub(crate) async fn uninstall_hook(root: &Path, name: &str) -> Result<(), Error> {
    let target = hooks_dir(root).await?.join(name);
    fs_err::tokio::remove_file(&target).await?;
    Ok(())
}

pub(crate) async fn has_hook(root: &Path, name: &str) -> Result<bool, Error> {
    let target = hooks_dir(root).await?.join(name);
    Ok(target.try_exists()?)
}

pub(crate) async fn init_repo(url: &str, path: &Path) -> Result<(), Error> {
    let url = if Path::new(url).is_dir() {
        // If the URL is a local path, convert it to an absolute path
        std::path::absolute(url)?
            .clean()
            .to_string_lossy()
            .to_string()
    } else {
        url.to_string()
    };

    git_cmd("init git repo")?
        .arg("init")
        .arg("--template=")
        .arg(path)
        .remove_git_envs()
        .check(true)
        .output()
        .await?;

    git_cmd("add git remote")?
        .current_dir(path)
        .arg("remote")
        .arg("add")
        .arg("origin")
        .arg(&url)
        .remove_git_envs()
        .check(true)
        .output()
        .await?;

    Ok(())
}

async fn shallow_fetch(rev: &str, path: &Path) -> Result<(), Error> {
    git_cmd("git fetch")?
        .current_dir(path)
        .arg("-c")
        .arg("protocol.version=2")
        .arg("fetch")
        .arg("origin")
        .arg(rev)
        .arg("--depth=1")
        .env(EnvVars::GIT_TERMINAL_PROMPT, "0")
        .remove_git_envs()
        .check(true)
        .output()
        .await?;

    git_cmd("git checkout")?
        .current_dir(path)
        .arg("checkout")
        .arg("FETCH_HEAD")
        .env(EnvVars::GRAPNEL_INTERNAL__SKIP_POST_CHECKOUT, "1")
        .remove_git_envs()
        .check(true)
        .output()
        .await?;

    Ok(())
}

async fn full_fetch(rev: &str, path: &Path) -> Result<(), Error> {
    git_cmd("git fetch --tags")?
        .current_dir(path)
        .arg("fetch")
        .arg("origin")
        .arg("--tags")
        .env(EnvVars::GIT_TERMINAL_PROMPT, "0")
        .remove_git_envs()
        .check(true)
        .output()
        .await?;

    git_cmd("git checkout")?
        .current_dir(path)
        .arg("checkout")
        .arg(rev)
        .env(EnvVars::GRAPNEL_INTERNAL__SKIP_POST_CHECKOUT, "1")
        .remove_git_envs()
        .check(true)
        .output()
        .await?;

    Ok(())
}

/// Clone a repository at the given rev into `path`.
///
/// `rev` may be a tag, branch or commit sha. A shallow fetch of the rev is
/// attempted first; some servers refuse to serve arbitrary shas shallowly, in
/// which case a full fetch is performed.
pub(crate) async fn clone_repo(url: &str, rev: &str, path: &Path) -> Result<(), Error> {
    init_repo(url, path).await?;

    if let Err(err) = shallow_fetch(rev, path).await {
        warn!(?err, "Failed to shallow fetch, falling back to full fetch");
        full_fetch(rev, path).await
    } else {
        Ok(())
    }
}
