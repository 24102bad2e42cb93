use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::LazyLock;

use fs_err::os::unix::fs::OpenOptionsExt;

use anyhow::Result;

use crate::cli::ExitStatus;
use crate::config::{config_file_in, is_old_style};
use crate::fs::Simplified;
use crate::git::GIT_ROOT;
use crate::printer::Printer;

/// Rewrite a legacy top-level-list config to the `repos:` mapping form.
///
/// The rewrite is textual: the original list body is kept verbatim, indented
/// under a new `repos:` key, so comments and formatting survive. Running it
/// again is a no-op.
pub(crate) fn migrate_config(config: Option<PathBuf>, printer: Printer) -> Result<ExitStatus> {
    let config_path = match config {
        Some(path) => path,
        None => {
            let root = LazyLock::force(&GIT_ROOT).as_ref()?.clone();
            config_file_in(&root)?
        }
    };

    let content = fs_err::read_to_string(&config_path)?;
    if !is_old_style(&content) {
        writeln!(printer.stdout(), "no migration needed")?;
        return Ok(ExitStatus::Success);
    }

    let mut migrated = String::from("repos:\n");
    for line in content.lines() {
        if line.is_empty() {
            migrated.push('\n');
        } else {
            migrated.push_str("  ");
            migrated.push_str(line);
            migrated.push('\n');
        }
    }

    write_config(&config_path, &migrated)?;
    writeln!(
        printer.stdout(),
        "Migrated `{}` to the current format",
        config_path.user_display()
    )?;

    Ok(ExitStatus::Success)
}

fn write_config(path: &std::path::Path, content: &str) -> Result<()> {
    use std::io::Write as _;

    let mut options = fs_err::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config;

    #[test]
    fn migration_preserves_content_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".pre-commit-config.yaml");
        let original = indoc::indoc! {r"
            - repo: local
              hooks:
                - id: x
                  name: x
                  entry: 'true'
                  language: system
        "};
        fs_err::write(&path, original).unwrap();

        migrate_config(Some(path.clone()), crate::printer::Printer::Silent).unwrap();
        let migrated = fs_err::read_to_string(&path).unwrap();
        assert!(migrated.starts_with("repos:\n"));
        assert!(!is_old_style(&migrated));

        // Still parses, still one repo.
        let config = load_config(&path).unwrap();
        assert_eq!(config.repos.len(), 1);

        // A second migration leaves the file untouched.
        migrate_config(Some(path.clone()), crate::printer::Printer::Silent).unwrap();
        assert_eq!(fs_err::read_to_string(&path).unwrap(), migrated);
    }
}
