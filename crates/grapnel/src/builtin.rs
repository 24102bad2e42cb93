use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;
use itertools::Itertools;

use crate::config::{Language, read_config};
use crate::files::FileFilter;
use crate::hook::{Hook, hooks_from_config};
use crate::store::Store;
use crate::{files, git};

/// Run one of the `meta` repo's built-in diagnostic hooks.
///
/// They run in-process: their "files" are the config files matched by the
/// hook's pattern.
pub(crate) async fn run(hook: &Hook, filenames: &[&Path], store: &Store) -> Result<(i32, Vec<u8>)> {
    match hook.id.as_str() {
        "identity" => Ok(identity(filenames)),
        "check-hooks-apply" => check_hooks_apply(filenames, store).await,
        "check-useless-excludes" => check_useless_excludes(filenames, store).await,
        other => anyhow::bail!("Unknown meta hook `{other}`"),
    }
}

/// Print all filenames passed to the hook. Useful for debugging file
/// selection.
fn identity(filenames: &[&Path]) -> (i32, Vec<u8>) {
    let out = filenames
        .iter()
        .map(|filename| filename.display().to_string())
        .join("\n");
    (0, out.into_bytes())
}

/// Ensure every configured hook applies to at least one file in the
/// repository.
async fn check_hooks_apply(filenames: &[&Path], store: &Store) -> Result<(i32, Vec<u8>)> {
    let root = git::GIT_ROOT.as_ref()?;
    let input = files::collect_files(root, files::CollectOptions {
        all_files: true,
        ..Default::default()
    })
    .await?;

    let mut code = 0;
    let mut output = String::new();

    for filename in filenames {
        let config = read_config(filename)?;
        let hooks = hooks_from_config(&config, store, None).await?;
        let filter = FileFilter::new(input.iter(), &config);

        for hook in hooks {
            if hook.always_run || hook.language == Language::Fail {
                continue;
            }
            if filter.for_hook(&hook).is_empty() {
                code = 1;
                let _ = writeln!(output, "{} does not apply to this repository", hook.id);
            }
        }
    }

    Ok((code, output.into_bytes()))
}

/// Ensure every `exclude` pattern actually excludes something.
async fn check_useless_excludes(filenames: &[&Path], store: &Store) -> Result<(i32, Vec<u8>)> {
    let root = git::GIT_ROOT.as_ref()?;
    let input = files::collect_files(root, files::CollectOptions {
        all_files: true,
        ..Default::default()
    })
    .await?;

    let mut code = 0;
    let mut output = String::new();

    for filename in filenames {
        let config = read_config(filename)?;

        if let Some(exclude) = &config.exclude {
            if !excludes_any(&input, exclude.as_str()) {
                code = 1;
                let _ = writeln!(
                    output,
                    "The global exclude pattern `{exclude}` does not match any files"
                );
            }
        }

        let hooks = hooks_from_config(&config, store, None).await?;
        for hook in hooks {
            let Some(exclude) = &hook.exclude else {
                continue;
            };
            if !excludes_any(&input, exclude.as_str()) {
                code = 1;
                let _ = writeln!(
                    output,
                    "The exclude pattern `{exclude}` for `{}` does not match any files",
                    hook.id
                );
            }
        }
    }

    Ok((code, output.into_bytes()))
}

fn excludes_any(files: &[std::path::PathBuf], exclude: &str) -> bool {
    if exclude.is_empty() || exclude == "^$" {
        return true;
    }
    let Ok(pattern) = fancy_regex::Regex::new(exclude) else {
        return true;
    };
    files.iter().any(|file| {
        file.to_str()
            .is_some_and(|file| pattern.is_match(file).unwrap_or(false))
    })
}
