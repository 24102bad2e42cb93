use std::path::{Path, PathBuf};

use anyhow::Result;
use itertools::{Either, Itertools};
use path_clean::PathClean;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use rustc_hash::FxHashSet;
use tracing::{debug, error, instrument};

use crate::config::{Config, FilePattern, Stage};
use crate::hook::Hook;
use crate::identify::{TagSet, tags_from_path};
use crate::{fs, git, warn_user};

/// Filter filenames by include/exclude patterns.
pub(crate) struct FilenameFilter<'a> {
    include: Option<&'a FilePattern>,
    exclude: Option<&'a FilePattern>,
}

impl<'a> FilenameFilter<'a> {
    pub(crate) fn new(include: Option<&'a FilePattern>, exclude: Option<&'a FilePattern>) -> Self {
        Self { include, exclude }
    }

    pub(crate) fn filter(&self, filename: &Path) -> bool {
        let Some(filename) = filename.to_str() else {
            return false;
        };
        if let Some(pattern) = &self.include {
            if !pattern.is_empty() && !pattern.is_match(filename) {
                return false;
            }
        }
        if let Some(pattern) = &self.exclude {
            if !pattern.is_empty() && pattern.is_match(filename) {
                return false;
            }
        }
        true
    }
}

/// Filter files by type tags.
pub(crate) struct FileTagFilter<'a> {
    all: &'a [String],
    any: &'a [String],
    exclude: &'a [String],
}

impl<'a> FileTagFilter<'a> {
    fn for_hook(hook: &'a Hook) -> Self {
        Self {
            all: &hook.types,
            any: &hook.types_or,
            exclude: &hook.exclude_types,
        }
    }

    pub(crate) fn filter(&self, file_types: &TagSet) -> bool {
        if !self.all.is_empty() && !self.all.iter().all(|t| file_types.contains(t)) {
            return false;
        }
        if !self.any.is_empty() && !self.any.iter().any(|t| file_types.contains(t)) {
            return false;
        }
        if self.exclude.iter().any(|t| file_types.contains(t)) {
            return false;
        }
        true
    }
}

/// The candidate file list for a run, with the config-wide include/exclude
/// already applied. Hooks narrow it further via [`FileFilter::for_hook`].
pub(crate) struct FileFilter<'a> {
    filenames: Vec<&'a Path>,
}

impl<'a> FileFilter<'a> {
    pub(crate) fn new<I>(filenames: I, config: &Config) -> Self
    where
        I: Iterator<Item = &'a PathBuf>,
    {
        let filter = FilenameFilter::new(config.files.as_ref(), config.exclude.as_ref());
        let filenames = filenames
            .map(PathBuf::as_path)
            .filter(|filename| filter.filter(filename))
            .collect();
        Self { filenames }
    }

    pub(crate) fn len(&self) -> usize {
        self.filenames.len()
    }

    /// The files a hook should see: its `files`/`exclude` patterns, then its
    /// type predicates.
    #[instrument(level = "trace", skip_all, fields(hook = %hook.id))]
    pub(crate) fn for_hook(&self, hook: &Hook) -> Vec<&'a Path> {
        let name_filter = FilenameFilter::new(hook.files.as_ref(), hook.exclude.as_ref());
        let tag_filter = FileTagFilter::for_hook(hook);

        self.filenames
            .par_iter()
            .filter(|filename| name_filter.filter(filename))
            .filter(|filename| match tags_from_path(filename) {
                Ok(tags) => tag_filter.filter(&tags),
                Err(err) => {
                    error!(filename = %filename.display(), %err, "Failed to classify file");
                    false
                }
            })
            .copied()
            .collect()
    }
}

/// How the candidate file list for a run is selected.
#[derive(Debug, Default)]
pub(crate) struct CollectOptions {
    pub stage: Stage,
    pub from_ref: Option<String>,
    pub to_ref: Option<String>,
    pub all_files: bool,
    pub files: Vec<String>,
    pub commit_msg_filename: Option<String>,
}

fn adjust_relative_path(path: &str, new_cwd: &Path) -> Result<PathBuf, std::io::Error> {
    let absolute = std::path::absolute(path)?.clean();
    fs::relative_to(absolute, new_cwd)
}

/// Produce the candidate file list for the given stage and flags.
///
/// Returns paths relative to the working tree root. The explicit flags are
/// mutually exclusive and take precedence over the per-stage selection.
#[instrument(level = "trace", skip_all)]
pub(crate) async fn collect_files(root: &Path, opts: CollectOptions) -> Result<Vec<PathBuf>> {
    let mut filenames = collect_files_inner(root, opts).await?;

    filenames = filenames.into_iter().map(fs::normalize_path).collect();
    // Deterministic order for reporting and tests.
    filenames.sort_unstable();

    Ok(filenames)
}

async fn collect_files_inner(root: &Path, opts: CollectOptions) -> Result<Vec<PathBuf>> {
    let CollectOptions {
        stage,
        from_ref,
        to_ref,
        all_files,
        files,
        commit_msg_filename,
    } = opts;

    // Explicit flag overrides first.
    if all_files {
        let files = git::all_files(root).await?;
        debug!("All files in the repository: {}", files.len());
        return Ok(files);
    }

    if !files.is_empty() {
        let (exists, missing): (FxHashSet<_>, Vec<_>) =
            files.into_iter().partition_map(|filename| {
                if std::fs::exists(&filename).unwrap_or(false) {
                    Either::Left(filename)
                } else {
                    Either::Right(filename)
                }
            });
        if !missing.is_empty() {
            warn_user!(
                "These files do not exist and will be ignored: `{}`",
                missing.join(", ")
            );
        }

        let exists = exists
            .into_iter()
            .map(|filename| adjust_relative_path(&filename, root))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("Files passed as arguments: {}", exists.len());
        return Ok(exists);
    }

    if let (Some(from_ref), Some(to_ref)) = (&from_ref, &to_ref) {
        let files = if stage == Stage::PrePush {
            git::push_files(to_ref, from_ref, root).await?
        } else {
            git::changed_files(from_ref, to_ref, root).await?
        };
        debug!("Files changed between {from_ref} and {to_ref}: {}", files.len());
        return Ok(files);
    }

    let files = match stage {
        Stage::PreCommit | Stage::PreMergeCommit => git::staged_files(root).await?,
        Stage::PrePush => git::all_files(root).await?,
        Stage::CommitMsg | Stage::PrepareCommitMsg => {
            // Hooks receive the message path via PRE_COMMIT_COMMIT_MSG_FILENAME.
            let _ = commit_msg_filename;
            vec![]
        }
        Stage::PostCommit => git::commit_files("HEAD", root).await?,
        Stage::PostMerge => git::changed_files("HEAD~1", "HEAD", root).await?,
        Stage::PostCheckout | Stage::PostRewrite | Stage::PreRebase => {
            git::all_files(root).await?
        }
        Stage::Manual => {
            warn_user!("No files given for manual stage, falling back to staged files");
            git::staged_files(root).await?
        }
    };
    debug!(stage = %stage, "Selected files: {}", files.len());

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HookOptions, Language, ManifestHook};
    use crate::hook::{HookBuilder, Repo};
    use std::sync::Arc;

    fn hook_with_options(options: HookOptions) -> Hook {
        let definition = ManifestHook {
            id: "x".to_string(),
            name: "x".to_string(),
            entry: "true".to_string(),
            language: Language::System,
            options,
        };
        HookBuilder::from_local(Arc::new(Repo::Local { hooks: vec![] }), definition, 0)
            .build()
            .unwrap()
    }

    fn empty_config() -> Config {
        serde_yaml::from_str("repos: []").unwrap()
    }

    #[test]
    fn filename_filter_include_exclude() {
        let include = FilePattern::new(r"\.py$").unwrap();
        let exclude = FilePattern::new(r"^vendor/").unwrap();
        let filter = FilenameFilter::new(Some(&include), Some(&exclude));

        assert!(filter.filter(Path::new("a.py")));
        assert!(!filter.filter(Path::new("a.txt")));
        assert!(!filter.filter(Path::new("vendor/b.py")));
    }

    #[test]
    fn for_hook_applies_patterns_and_types() {
        let dir = tempfile::tempdir().unwrap();
        let py = dir.path().join("a.py");
        let txt = dir.path().join("b.txt");
        let vendored = dir.path().join("vendored.py");
        for file in [&py, &txt, &vendored] {
            fs_err::write(file, "x = 1\n").unwrap();
        }

        let filenames = vec![py.clone(), txt, vendored];
        let filter = FileFilter::new(filenames.iter(), &empty_config());
        assert_eq!(filter.len(), 3);

        let hook = hook_with_options(HookOptions {
            files: Some(FilePattern::new(r"\.py$").unwrap()),
            exclude: Some(FilePattern::new("vendored").unwrap()),
            types: Some(vec!["python".to_string()]),
            ..Default::default()
        });
        let selected = filter.for_hook(&hook);
        assert_eq!(selected, vec![py.as_path()]);
    }

    #[test]
    fn types_and_or_exclude_semantics() {
        let dir = tempfile::tempdir().unwrap();
        let py = dir.path().join("a.py");
        let rs = dir.path().join("b.rs");
        let png = dir.path().join("c.png");
        for file in [&py, &rs] {
            fs_err::write(file, "text\n").unwrap();
        }
        fs_err::write(&png, [0u8, 159, 146, 150]).unwrap();

        let filenames = vec![py.clone(), rs.clone(), png.clone()];
        let filter = FileFilter::new(filenames.iter(), &empty_config());

        // types_or: any of the named types.
        let hook = hook_with_options(HookOptions {
            types_or: Some(vec!["python".to_string(), "rust".to_string()]),
            ..Default::default()
        });
        let mut selected = filter.for_hook(&hook);
        selected.sort_unstable();
        assert_eq!(selected, vec![py.as_path(), rs.as_path()]);

        // exclude_types drops any match.
        let hook = hook_with_options(HookOptions {
            exclude_types: Some(vec!["binary".to_string()]),
            ..Default::default()
        });
        let selected = filter.for_hook(&hook);
        assert!(!selected.contains(&png.as_path()));

        // types: all must hold.
        let hook = hook_with_options(HookOptions {
            types: Some(vec!["file".to_string(), "python".to_string()]),
            ..Default::default()
        });
        assert_eq!(filter.for_hook(&hook), vec![py.as_path()]);
    }

    #[test]
    fn config_wide_patterns_narrow_the_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let keep = dir.path().join("keep.py");
        let skip = dir.path().join("skip.py");
        for file in [&keep, &skip] {
            fs_err::write(file, "x\n").unwrap();
        }

        let config: Config = serde_yaml::from_str("repos: []\nexclude: skip").unwrap();
        let filenames = vec![keep.clone(), skip];
        let filter = FileFilter::new(filenames.iter(), &config);
        assert_eq!(filter.len(), 1);
    }
}
