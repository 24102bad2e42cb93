use std::fmt::Write as _;
use std::path::Path;

use fs_err::os::unix::fs::OpenOptionsExt;

use anyhow::Result;

use crate::cli::ExitStatus;
use crate::fs::Simplified;
use crate::printer::Printer;

const SAMPLE: &str = indoc::indoc! {r"
    # See https://pre-commit.com for more information
    # See https://pre-commit.com/hooks.html for more hooks
    repos:
      - repo: https://github.com/pre-commit/pre-commit-hooks
        rev: v5.0.0
        hooks:
          - id: trailing-whitespace
          - id: end-of-file-fixer
          - id: check-yaml
          - id: check-added-large-files
"};

/// Print (or write) a starter configuration.
pub(crate) fn sample_config(file: Option<&Path>, printer: Printer) -> Result<ExitStatus> {
    if let Some(path) = file {
        write_sample(path)?;
        writeln!(printer.stdout(), "Written to `{}`", path.user_display())?;
    } else {
        write!(printer.stdout(), "{SAMPLE}")?;
    }
    Ok(ExitStatus::Success)
}

fn write_sample(path: &Path) -> Result<()> {
    use std::io::Write as _;

    let mut options = fs_err::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(SAMPLE.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #[test]
    fn sample_parses() {
        let config: crate::config::Config = serde_yaml::from_str(super::SAMPLE).unwrap();
        assert_eq!(config.repos.len(), 1);
    }
}
