use std::io::Write;
use std::path::{Path, PathBuf};

use etcetera::BaseStrategy;
use tracing::{debug, warn};

use grapnel_consts::INDEX_FILE;
use grapnel_consts::env_vars::EnvVars;

use crate::cli::reporter::PrepareReporter;
use crate::config::RemoteRepo;
use crate::fs::LockedFile;
use crate::git::clone_repo;
use crate::index::Index;

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("Home directory not found")]
    HomeNotFound,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to clone `{repo}`")]
    CloneFailed {
        repo: String,
        #[source]
        error: crate::git::Error,
    },

    #[error(transparent)]
    Index(#[from] crate::index::Error),
}

/// Expand a path starting with `~` to the user's home directory.
fn expand_tilde(path: PathBuf) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = std::env::home_dir() {
            return home.join(stripped);
        }
    }
    path
}

/// The on-disk cache of cloned hook repositories and installed language
/// environments, plus the SQLite index describing both.
#[derive(Debug)]
pub(crate) struct Store {
    path: PathBuf,
}

impl Store {
    pub(crate) fn from_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a store from environment variables or default paths.
    ///
    /// Precedence: `GRAPNEL_HOME` (or `PRE_COMMIT_HOME`), else the XDG cache
    /// directory, else a cache directory under `$TMPDIR`.
    pub(crate) fn from_settings() -> Result<Self, Error> {
        let path = if let Some(path) = EnvVars::var_os(EnvVars::GRAPNEL_HOME) {
            Some(expand_tilde(PathBuf::from(path)))
        } else if let Ok(strategy) = etcetera::choose_base_strategy() {
            Some(strategy.cache_dir().join("pre-commit"))
        } else {
            EnvVars::var_os(EnvVars::TMPDIR)
                .map(|tmp| PathBuf::from(tmp).join(".cache").join("pre-commit"))
        };

        let Some(path) = path else {
            return Err(Error::HomeNotFound);
        };
        let store = Store::from_path(path).init()?;

        Ok(store)
    }

    pub(crate) fn path(&self) -> &Path {
        self.path.as_ref()
    }

    /// Initialize the store directory.
    pub(crate) fn init(self) -> Result<Self, Error> {
        fs_err::create_dir_all(&self.path)?;

        match fs_err::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.path.join("README"))
        {
            Ok(mut f) => f.write_all(
                b"This directory is maintained by the grapnel project.\nLearn more: https://github.com/grapnel-dev/grapnel\n",
            )?,
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => (),
            Err(err) => return Err(err.into()),
        }
        Ok(self)
    }

    /// Open the cache index, creating it if missing.
    pub(crate) fn index(&self) -> Result<Index, Error> {
        Ok(Index::open(&self.path.join(INDEX_FILE))?)
    }

    pub(crate) fn index_path(&self) -> PathBuf {
        self.path.join(INDEX_FILE)
    }

    /// Acquire the store-wide advisory lock.
    ///
    /// Held only during structural writes: clone, environment install, GC.
    /// Readers rely on the index plus atomic directory renames instead.
    pub(crate) async fn lock_async(&self) -> Result<LockedFile, std::io::Error> {
        LockedFile::acquire(self.path.join(".lock"), "store").await
    }

    /// Return the cached clone of a remote repo, cloning it first if needed.
    ///
    /// The clone happens in a staging directory which is atomically renamed
    /// into place, so a concurrent lock-free reader never observes a partial
    /// clone. The directory name is `repo` plus a random token; the mapping
    /// is recorded in the index, lookups never reconstruct the name.
    pub(crate) async fn clone_or_get(
        &self,
        repo: &RemoteRepo,
        reporter: Option<&PrepareReporter>,
    ) -> Result<PathBuf, Error> {
        let mut index = self.index()?;
        if let Some(path) = index.repo_path(&repo.repo, &repo.rev)? {
            if path.is_dir() {
                debug!(%repo, path = %path.display(), "Repo already cloned");
                return Ok(path);
            }
            // Directory vanished behind the index (e.g. manual deletion).
            index.delete_repo(&repo.repo, &repo.rev)?;
        }

        let progress = reporter.map(|r| (r, r.on_clone_start(&repo.to_string())));

        let staging = tempfile::Builder::new()
            .prefix(".stage-")
            .tempdir_in(&self.path)?;
        debug!(%repo, target = %staging.path().display(), "Cloning repo");
        clone_repo(&repo.repo, &repo.rev, staging.path())
            .await
            .map_err(|error| Error::CloneFailed {
                repo: repo.to_string(),
                error,
            })?;

        let token = hex::encode(rand::random::<[u8; 8]>());
        let target = self.path.join(format!("repo{token}"));
        fs_err::tokio::rename(staging.keep(), &target).await?;

        if let Err(err) = index.insert_repo(&repo.repo, &repo.rev, &target) {
            warn!(%err, "Failed to record repo in cache index");
        }

        if let Some((reporter, progress)) = progress {
            reporter.on_clone_complete(progress);
        }

        Ok(target)
    }

    /// Record the given config file as in-use for GC reachability.
    ///
    /// Index write failures are not fatal to a run.
    pub(crate) fn mark_config_used(&self, config: &Path) {
        let absolute = std::path::absolute(config).unwrap_or_else(|_| config.to_path_buf());
        match self.index() {
            Ok(mut index) => {
                if let Err(err) = index.mark_config_used(&absolute) {
                    warn!(%err, "Failed to record config in cache index");
                }
            }
            Err(err) => warn!(%err, "Failed to open cache index"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_init_creates_readme_once() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("cache");
        let store = Store::from_path(&root).init().unwrap();
        assert!(root.join("README").is_file());

        // A second init leaves the existing README alone.
        let store = Store::from_path(store.path()).init().unwrap();
        assert!(store.path().join("README").is_file());
    }

    #[test]
    fn mark_config_used_is_best_effort() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::from_path(dir.path().join("cache")).init().unwrap();
        store.mark_config_used(Path::new("/nonexistent/.pre-commit-config.yaml"));
        let index = store.index().unwrap();
        assert_eq!(index.all_configs().len(), 1);
    }
}
