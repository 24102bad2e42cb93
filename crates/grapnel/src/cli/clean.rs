use std::fmt::Write as _;

use anyhow::Result;

use crate::cli::ExitStatus;
use crate::fs::Simplified;
use crate::printer::Printer;
use crate::store::Store;

/// Remove the cache directory entirely, along with the legacy
/// `~/.pre-commit` location if present.
pub(crate) fn clean(store: &Store, printer: Printer) -> Result<ExitStatus> {
    let mut targets = vec![store.path().to_path_buf()];
    if let Some(home) = std::env::home_dir() {
        targets.push(home.join(".pre-commit"));
    }

    for target in targets {
        if !target.is_dir() {
            continue;
        }
        fs_err::remove_dir_all(&target)?;
        writeln!(printer.stdout(), "Cleaned `{}`", target.user_display())?;
    }

    Ok(ExitStatus::Success)
}
