use std::fmt::Write as _;

use anyhow::Result;
use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::cli::ExitStatus;
use crate::config::{Repo, load_config};
use crate::printer::Printer;
use crate::store::Store;

/// Remove cached repositories unreachable from any config still on disk.
///
/// Reachability: every `(repo, rev)` referenced by a config file recorded in
/// the index and still present on disk is live; everything else is removed,
/// directory and index row both. Configs that no longer exist are pruned
/// from the index first.
pub(crate) async fn gc(store: &Store, printer: Printer) -> Result<ExitStatus> {
    if !store.path().is_dir() || !store.index_path().is_file() {
        writeln!(printer.stdout(), "0 repo(s) removed.")?;
        return Ok(ExitStatus::Success);
    }

    let _lock = store.lock_async().await?;
    let mut index = store.index()?;

    let (live_configs, dead_configs): (Vec<_>, Vec<_>) = index
        .all_configs()
        .into_iter()
        .partition(|path| path.is_file());
    for config_path in dead_configs {
        debug!(path = %config_path.display(), "Pruning vanished config");
        index.delete_config(&config_path)?;
    }

    let mut live = FxHashSet::default();
    for config_path in live_configs {
        let Ok(config) = load_config(&config_path) else {
            // An unparseable config keeps nothing alive, but is not fatal.
            warn!(path = %config_path.display(), "Skipping unparseable config");
            continue;
        };
        for repo in &config.repos {
            if let Repo::Remote(remote) = repo {
                live.insert((remote.repo.clone(), remote.rev.clone()));
            }
        }
    }

    let mut removed = 0usize;
    for (url, rev, path) in index.all_repos()? {
        if live.contains(&(url.clone(), rev.clone())) {
            continue;
        }
        debug!(%url, %rev, path = %path.display(), "Removing unused repo");
        if path.is_dir() {
            if let Err(err) = fs_err::remove_dir_all(&path) {
                warn!(%err, path = %path.display(), "Failed to remove repo directory");
                continue;
            }
        }
        index.delete_repo(&url, &rev)?;
        removed += 1;
    }

    writeln!(printer.stdout(), "{removed} repo(s) removed.")?;

    Ok(ExitStatus::Success)
}
