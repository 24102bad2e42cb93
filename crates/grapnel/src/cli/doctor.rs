use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Result;
use owo_colors::OwoColorize;

use crate::cli::ExitStatus;
use crate::config::{config_file_in, read_config};
use crate::fs::Simplified;
use crate::git::{GIT, get_root};
use crate::printer::Printer;
use crate::store::Store;

/// Check that grapnel and its surroundings are usable: git is present, the
/// configuration loads, the cache root is writable and its index opens.
///
/// A configuration that fails to load exits with status 2 so callers can
/// distinguish "environment broken" from "hooks failed".
pub(crate) fn doctor(
    store: &Store,
    config: Option<PathBuf>,
    printer: Printer,
) -> Result<ExitStatus> {
    let mut stdout = printer.stdout();
    let ok = "ok".green().to_string();

    match GIT.as_ref() {
        Ok(git) => writeln!(stdout, "git: {ok} ({})", git.user_display())?,
        Err(err) => {
            writeln!(stdout, "git: {} ({err})", "missing".red())?;
            return Ok(ExitStatus::Failure);
        }
    }

    let root = match get_root() {
        Ok(root) => {
            writeln!(stdout, "repository: {ok} ({})", root.user_display())?;
            Some(root)
        }
        Err(_) => {
            writeln!(stdout, "repository: {}", "not in a git repository".yellow())?;
            None
        }
    };

    if let Some(root) = root {
        let config_path = match config {
            Some(path) => path,
            None => config_file_in(&root)?,
        };
        match read_config(&config_path) {
            Ok(config) => writeln!(
                stdout,
                "config: {ok} ({}, {} repo(s))",
                config_path.user_display(),
                config.repos.len()
            )?,
            Err(err) => {
                writeln!(
                    stdout,
                    "config: {} ({}: {err})",
                    "invalid".red(),
                    config_path.user_display()
                )?;
                return Ok(ExitStatus::Error);
            }
        }
    }

    let probe = store.path().join(".doctor-probe");
    match fs_err::write(&probe, b"probe") {
        Ok(()) => {
            let _ = fs_err::remove_file(&probe);
            writeln!(stdout, "cache: {ok} ({})", store.path().user_display())?;
        }
        Err(err) => {
            writeln!(stdout, "cache: {} ({err})", "not writable".red())?;
            return Ok(ExitStatus::Failure);
        }
    }

    match store.index() {
        Ok(index) => {
            let repos = index.all_repos().map(|repos| repos.len()).unwrap_or(0);
            writeln!(stdout, "index: {ok} ({repos} cached repo(s))")?;
        }
        Err(err) => {
            writeln!(stdout, "index: {} ({err})", "unusable".red())?;
            return Ok(ExitStatus::Failure);
        }
    }

    Ok(ExitStatus::Success)
}
