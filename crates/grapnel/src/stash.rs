use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use fs_err::os::unix::fs::OpenOptionsExt;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::git;

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)]
    Git(#[from] git::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to stash unstaged changes")]
    CaptureFailed(#[source] Box<Error>),

    #[error(
        "Your unstaged changes conflicted with hook auto-fixes; \
         hook changes were rolled back and your changes restored"
    )]
    Conflict,
}

/// The unstaged working-tree delta set aside while hooks run: a binary patch
/// on disk plus the ordered set of tracked paths it touches.
#[derive(Debug)]
pub(crate) struct Stash {
    patch_path: PathBuf,
    paths: Vec<PathBuf>,
}

impl Stash {
    pub(crate) fn patch_path(&self) -> &Path {
        &self.patch_path
    }
}

/// How a completed run's working tree was put back together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Restore {
    /// The stash was reapplied; hook modifications (if any) were kept.
    Reapplied,
    /// Hook modifications conflicted with the stash and were rolled back.
    RolledBack,
}

fn patch_file_name() -> String {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let rand = hex::encode(rand::random::<[u8; 4]>());
    format!("patch{ts}-{rand}")
}

/// Save the unstaged delta and force the working tree to staged content.
///
/// Returns `None` when there is nothing to stash. On a mid-capture failure
/// the patch is immediately reapplied so the user's work is not lost, and
/// the original error is surfaced.
pub(crate) async fn capture(root: &Path, cache_dir: &Path) -> Result<Option<Stash>, Error> {
    let paths = git::unstaged_files(root).await?;
    if paths.is_empty() {
        return Ok(None);
    }

    let patch = git::binary_diff(root).await?;
    if patch.is_empty() {
        return Ok(None);
    }

    let patch_path = cache_dir.join(patch_file_name());
    write_patch(&patch_path, &patch)?;
    debug!(
        patch = %patch_path.display(),
        files = paths.len(),
        "Stashed unstaged changes"
    );

    let stash = Stash { patch_path, paths };

    if let Err(err) = force_staged_content(root, &stash).await {
        // Put the user's tree back before surfacing the failure.
        if let Err(reapply_err) = git::apply(root, &stash.patch_path).await {
            warn!(%reapply_err, "Failed to restore stash after capture failure");
        }
        discard(&stash);
        return Err(Error::CaptureFailed(Box::new(err)));
    }

    Ok(Some(stash))
}

fn write_patch(path: &Path, contents: &[u8]) -> Result<(), Error> {
    use std::io::Write;

    let mut options = fs_err::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    Ok(())
}

/// Reset every stashed path's working tree content to its staged bytes.
///
/// Checkout restores from the index without touching the index itself, so
/// staged-but-uncommitted edits survive. A path the checkout cannot handle
/// is rewritten from its index blob directly.
async fn force_staged_content(root: &Path, stash: &Stash) -> Result<(), Error> {
    for path in &stash.paths {
        if git::checkout_path(root, path).await.is_ok() {
            continue;
        }
        let staged = git::staged_content(root, path).await?;
        fs_err::tokio::write(root.join(path), staged).await?;
    }
    Ok(())
}

/// Whether the patch would apply cleanly to the current working tree.
pub(crate) async fn can_reapply(root: &Path, stash: &Stash) -> Result<bool, Error> {
    Ok(git::apply_check(root, &stash.patch_path).await?)
}

/// Reapply the stash and remove the patch file.
pub(crate) async fn reapply(root: &Path, stash: &Stash) -> Result<(), Error> {
    git::apply(root, &stash.patch_path).await?;
    discard(stash);
    Ok(())
}

/// Remove the patch file unconditionally.
pub(crate) fn discard(stash: &Stash) {
    if let Err(err) = fs_err::remove_file(&stash.patch_path) {
        warn!(%err, "Failed to remove stash patch file");
    }
}

fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Whether any hook modified a stashed path: the working-tree bytes of each
/// tracked path are compared against its staged bytes. A path a hook deleted
/// counts as modified.
async fn hooks_modified_stashed_paths(root: &Path, stash: &Stash) -> Result<bool, Error> {
    for path in &stash.paths {
        let worktree = match fs_err::tokio::read(root.join(path)).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(true),
            Err(err) => return Err(err.into()),
        };
        let staged = git::staged_content(root, path).await?;
        if sha256(&worktree) != sha256(&staged) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Put the working tree back together after hooks ran.
///
/// When no stashed path was touched by hooks the stash reapplies directly.
/// When hooks changed stashed paths but the patch still applies, both edits
/// are kept. Otherwise the hook changes are erased (`checkout-index -a -f`),
/// the stash is reapplied, and the conflict is reported so the commit is
/// blocked.
pub(crate) async fn restore(root: &Path, stash: &Stash) -> Result<Restore, Error> {
    if !hooks_modified_stashed_paths(root, stash).await? {
        reapply(root, stash).await?;
        return Ok(Restore::Reapplied);
    }

    if can_reapply(root, stash).await? {
        reapply(root, stash).await?;
        return Ok(Restore::Reapplied);
    }

    debug!("Stash conflicts with hook modifications, rolling back hook changes");
    git::checkout_index(root).await?;
    reapply(root, stash).await?;
    Ok(Restore::RolledBack)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn git(root: &Path, args: &[&str]) {
        let status = std::process::Command::new("git")
            .current_dir(root)
            .env("GIT_CONFIG_GLOBAL", "/dev/null")
            .env("GIT_CONFIG_SYSTEM", "/dev/null")
            .args(args)
            .status()
            .expect("failed to run git");
        assert!(status.success(), "git {args:?} failed");
    }

    fn init_repo(root: &Path) {
        git(root, &["init", "--initial-branch=main"]);
        git(root, &["config", "user.name", "test"]);
        git(root, &["config", "user.email", "test@example.com"]);
        git(root, &["config", "commit.gpgsign", "false"]);
    }

    #[tokio::test]
    async fn capture_restores_unstaged_content_after_run() {
        let dir = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let root = dir.path();
        init_repo(root);

        fs_err::write(root.join("a.py"), "committed\n").unwrap();
        git(root, &["add", "a.py"]);
        git(root, &["commit", "-m", "init"]);

        // Stage one version, then keep editing.
        fs_err::write(root.join("a.py"), "staged\n").unwrap();
        git(root, &["add", "a.py"]);
        fs_err::write(root.join("a.py"), "unstaged edit\n").unwrap();

        let stash = capture(root, cache.path())
            .await
            .unwrap()
            .expect("dirty tree must stash");
        assert!(stash.patch_path().is_file());
        assert_eq!(stash.paths, vec![PathBuf::from("a.py")]);

        // Hooks see staged content.
        assert_eq!(
            fs_err::read_to_string(root.join("a.py")).unwrap(),
            "staged\n"
        );

        // No hook modified anything: the unstaged edit comes back verbatim.
        let outcome = restore(root, &stash).await.unwrap();
        assert_eq!(outcome, Restore::Reapplied);
        assert_eq!(
            fs_err::read_to_string(root.join("a.py")).unwrap(),
            "unstaged edit\n"
        );
        assert!(!stash.patch_path().exists());
    }

    #[tokio::test]
    async fn clean_tree_does_not_stash() {
        let dir = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let root = dir.path();
        init_repo(root);

        fs_err::write(root.join("a.py"), "content\n").unwrap();
        git(root, &["add", "a.py"]);
        git(root, &["commit", "-m", "init"]);

        assert!(capture(root, cache.path()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn conflicting_hook_edit_is_rolled_back() {
        let dir = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let root = dir.path();
        init_repo(root);

        fs_err::write(root.join("a.py"), "line one\n").unwrap();
        git(root, &["add", "a.py"]);
        git(root, &["commit", "-m", "init"]);

        fs_err::write(root.join("a.py"), "line one\nstaged two\n").unwrap();
        git(root, &["add", "a.py"]);
        fs_err::write(root.join("a.py"), "line one\nunstaged two\n").unwrap();

        let stash = capture(root, cache.path()).await.unwrap().unwrap();

        // A hook rewrites the file in a way the stash patch cannot merge with.
        fs_err::write(root.join("a.py"), "completely different\n").unwrap();

        let outcome = restore(root, &stash).await.unwrap();
        assert_eq!(outcome, Restore::RolledBack);
        // Hook changes gone, user's unstaged edit preserved.
        assert_eq!(
            fs_err::read_to_string(root.join("a.py")).unwrap(),
            "line one\nunstaged two\n"
        );
    }

    #[tokio::test]
    async fn hook_edit_on_unstashed_path_keeps_both() {
        let dir = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let root = dir.path();
        init_repo(root);

        fs_err::write(root.join("a.py"), "a\n").unwrap();
        fs_err::write(root.join("b.py"), "b\n").unwrap();
        git(root, &["add", "."]);
        git(root, &["commit", "-m", "init"]);

        fs_err::write(root.join("a.py"), "a staged\n").unwrap();
        git(root, &["add", "a.py"]);
        fs_err::write(root.join("a.py"), "a unstaged\n").unwrap();

        let stash = capture(root, cache.path()).await.unwrap().unwrap();

        // A hook rewrites an unrelated file; that change survives restore.
        fs_err::write(root.join("b.py"), "b fixed by hook\n").unwrap();

        let outcome = restore(root, &stash).await.unwrap();
        assert_eq!(outcome, Restore::Reapplied);
        assert_eq!(
            fs_err::read_to_string(root.join("a.py")).unwrap(),
            "a unstaged\n"
        );
        assert_eq!(
            fs_err::read_to_string(root.join("b.py")).unwrap(),
            "b fixed by hook\n"
        );
    }
}
