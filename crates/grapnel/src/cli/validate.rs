use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Result;
use owo_colors::OwoColorize;

use crate::cli::ExitStatus;
use crate::config::read_config;
use crate::fs::Simplified;
use crate::printer::Printer;

/// Parse and validate one or more configuration files.
pub(crate) fn validate_configs(configs: Vec<PathBuf>, printer: Printer) -> Result<ExitStatus> {
    let mut status = ExitStatus::Success;

    for path in configs {
        match read_config(&path) {
            Ok(_) => {}
            Err(err) => {
                let mut stderr = printer.stderr();
                writeln!(
                    stderr,
                    "{}: `{}` is not valid: {err}",
                    "error".red().bold(),
                    path.user_display()
                )?;
                let mut source = std::error::Error::source(&err);
                while let Some(cause) = source {
                    writeln!(stderr, "  {}: {cause}", "caused by".red().bold())?;
                    source = cause.source();
                }
                status = ExitStatus::Failure;
            }
        }
    }

    Ok(status)
}
