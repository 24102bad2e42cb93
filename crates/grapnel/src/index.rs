use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, trace};

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("Failed to open cache index at `{0}`")]
    Open(PathBuf, #[source] rusqlite::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// The relational record of what is in the cache: one row per cached
/// `(repo, ref)` clone, and one row per config file observed in use.
pub(crate) struct Index {
    conn: Connection,
}

impl Index {
    /// Open (or create) the index at the given path.
    ///
    /// Schema creation is idempotent; opening an existing database with the
    /// tables already present is a no-op.
    pub(crate) fn open(path: &Path) -> Result<Self, Error> {
        let conn =
            Connection::open(path).map_err(|e| Error::Open(path.to_path_buf(), e))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS repos (
                repo_url TEXT NOT NULL,
                rev TEXT NOT NULL,
                path TEXT NOT NULL,
                PRIMARY KEY (repo_url, rev)
            );
            CREATE TABLE IF NOT EXISTS configs (
                path TEXT NOT NULL,
                PRIMARY KEY (path)
            );",
        )?;
        trace!(path = %path.display(), "Opened cache index");
        Ok(Self { conn })
    }

    /// Look up the clone directory for a `(repo, ref)` pair.
    pub(crate) fn repo_path(&self, repo: &str, rev: &str) -> Result<Option<PathBuf>, Error> {
        let path: Option<String> = self
            .conn
            .query_row(
                "SELECT path FROM repos WHERE repo_url = ?1 AND rev = ?2",
                params![repo, rev],
                |row| row.get(0),
            )
            .optional()?;
        Ok(path.map(PathBuf::from))
    }

    /// Record the clone directory for a `(repo, ref)` pair.
    pub(crate) fn insert_repo(&mut self, repo: &str, rev: &str, path: &Path) -> Result<(), Error> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO repos (repo_url, rev, path) VALUES (?1, ?2, ?3)",
            params![repo, rev, path.to_string_lossy()],
        )?;
        tx.commit()?;
        debug!(repo, rev, path = %path.display(), "Recorded repo in index");
        Ok(())
    }

    pub(crate) fn delete_repo(&mut self, repo: &str, rev: &str) -> Result<(), Error> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM repos WHERE repo_url = ?1 AND rev = ?2",
            params![repo, rev],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub(crate) fn all_repos(&self) -> Result<Vec<(String, String, PathBuf)>, Error> {
        let mut stmt = self.conn.prepare("SELECT repo_url, rev, path FROM repos")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    PathBuf::from(row.get::<_, String>(2)?),
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Record a config file as "in use" for GC reachability.
    pub(crate) fn mark_config_used(&mut self, path: &Path) -> Result<(), Error> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO configs (path) VALUES (?1)",
            params![path.to_string_lossy()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// All config files ever observed in use.
    ///
    /// An older index without the `configs` table reads as empty rather than
    /// failing.
    pub(crate) fn all_configs(&self) -> Vec<PathBuf> {
        let Ok(mut stmt) = self.conn.prepare("SELECT path FROM configs") else {
            return vec![];
        };
        let Ok(rows) = stmt.query_map([], |row| row.get::<_, String>(0)) else {
            return vec![];
        };
        rows.filter_map(Result::ok).map(PathBuf::from).collect()
    }

    pub(crate) fn delete_config(&mut self, path: &Path) -> Result<(), Error> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM configs WHERE path = ?1",
            params![path.to_string_lossy()],
        )?;
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("db.db");
        drop(Index::open(&db).unwrap());
        drop(Index::open(&db).unwrap());
    }

    #[test]
    fn repo_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = Index::open(&dir.path().join("db.db")).unwrap();

        let repo = "https://example.com/hooks";
        assert_eq!(index.repo_path(repo, "v1.0").unwrap(), None);

        index
            .insert_repo(repo, "v1.0", Path::new("/cache/repoabc"))
            .unwrap();
        assert_eq!(
            index.repo_path(repo, "v1.0").unwrap(),
            Some(PathBuf::from("/cache/repoabc"))
        );
        // Same URL at a different rev is a distinct row.
        assert_eq!(index.repo_path(repo, "v2.0").unwrap(), None);

        index
            .insert_repo(repo, "v2.0", Path::new("/cache/repodef"))
            .unwrap();
        assert_eq!(index.all_repos().unwrap().len(), 2);

        index.delete_repo(repo, "v1.0").unwrap();
        assert_eq!(index.repo_path(repo, "v1.0").unwrap(), None);
        assert_eq!(index.all_repos().unwrap().len(), 1);
    }

    #[test]
    fn config_marking_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = Index::open(&dir.path().join("db.db")).unwrap();

        let config = Path::new("/repo/.pre-commit-config.yaml");
        index.mark_config_used(config).unwrap();
        index.mark_config_used(config).unwrap();
        assert_eq!(index.all_configs(), vec![config.to_path_buf()]);

        index.delete_config(config).unwrap();
        assert!(index.all_configs().is_empty());
    }

    #[test]
    fn missing_configs_table_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("db.db");

        // Simulate an index written by an older version: only `repos`.
        let conn = Connection::open(&db).unwrap();
        conn.execute_batch(
            "CREATE TABLE repos (repo_url TEXT, rev TEXT, path TEXT, PRIMARY KEY (repo_url, rev));",
        )
        .unwrap();
        drop(conn);

        // Reopening through `Index` adds the missing table; reads are empty,
        // not errors, either way.
        let index = Index::open(&db).unwrap();
        assert!(index.all_configs().is_empty());
    }
}
