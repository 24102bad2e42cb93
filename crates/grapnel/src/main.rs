use std::process::ExitCode;
use std::str::FromStr;

use anstream::{ColorChoice, eprintln};
use anyhow::{Context, Result};
use clap::Parser;
use owo_colors::OwoColorize;
use tracing::debug;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use grapnel_consts::env_vars::EnvVars;

use crate::cleanup::cleanup;
use crate::cli::{Cli, Command, ExitStatus};
use crate::printer::Printer;
use crate::store::Store;

mod builtin;
mod cleanup;
mod cli;
mod config;
mod files;
mod fs;
mod git;
mod hook;
mod identify;
mod index;
mod languages;
mod printer;
mod process;
mod run;
mod stash;
mod store;
mod version;
mod warnings;

fn setup_logging(verbosity: u8) -> Result<()> {
    let directive = match verbosity {
        0 | 1 => LevelFilter::OFF.into(),
        2 => Directive::from_str("grapnel=debug")?,
        3 => Directive::from_str("grapnel=trace")?,
        _ => Directive::from_str("trace")?,
    };

    let filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env()
        .context("Invalid RUST_LOG directive")?;
    // The anstream writer strips ANSI on its own when stderr is not a
    // terminal (or NO_COLOR is set).
    let format = tracing_subscriber::fmt::format()
        .with_target(false)
        .with_ansi(true);
    let layer = tracing_subscriber::fmt::layer()
        .event_format(format)
        .with_writer(anstream::stderr)
        .with_filter(filter);

    tracing_subscriber::registry().with(layer).init();

    Ok(())
}

async fn run(cli: Cli) -> Result<ExitStatus> {
    ColorChoice::write_global(cli.globals.color.into());
    setup_logging(cli.globals.verbose)?;

    let printer = if cli.globals.quiet == 1 {
        Printer::Quiet
    } else if cli.globals.quiet > 1 {
        Printer::Silent
    } else if cli.globals.verbose > 0 {
        Printer::Verbose
    } else if cli.globals.no_progress {
        Printer::NoProgress
    } else {
        Printer::Default
    };

    if cli.globals.quiet > 0 {
        warnings::disable();
    } else {
        warnings::enable();
    }

    debug!("grapnel {}", version::version());

    // If `GIT_DIR` is set, grapnel may be running from a git hook. Git exports
    // `GIT_DIR` but *not* `GIT_WORK_TREE`; without the latter git treats the
    // current directory as the working tree, which breaks once we `cd`.
    if EnvVars::is_set(EnvVars::GIT_DIR) && !EnvVars::is_set(EnvVars::GIT_WORK_TREE) {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;
        debug!("Setting {} to `{}`", EnvVars::GIT_WORK_TREE, cwd.display());
        unsafe { std::env::set_var(EnvVars::GIT_WORK_TREE, cwd) }
    }

    if let Some(dir) = cli.globals.cd.as_ref() {
        debug!("Changing current directory to `{}`", dir.display());
        std::env::set_current_dir(dir)?;
    }

    let store = Store::from_settings()?;

    let command = cli
        .command
        .unwrap_or_else(|| Command::Run(Box::new(cli.run_args)));
    match command {
        Command::Run(args) => {
            cli::run(
                &store,
                cli.globals.config,
                *args,
                cli.globals.verbose > 0,
                printer,
            )
            .await
        }
        Command::Install(args) => cli::install(&store, cli.globals.config, args, printer).await,
        Command::InstallHooks => cli::install_hooks(&store, cli.globals.config, printer).await,
        Command::Uninstall(args) => cli::uninstall(args, printer).await,
        Command::HookImpl(args) => cli::hook_impl(&store, cli.globals.config, args, printer).await,
        Command::Clean => cli::clean(&store, printer),
        Command::Gc => cli::gc(&store, printer).await,
        Command::MigrateConfig => cli::migrate_config(cli.globals.config, printer),
        Command::SampleConfig(args) => cli::sample_config(args.file.as_deref(), printer),
        Command::ValidateConfig(args) => cli::validate_configs(args.configs, printer),
        Command::Doctor => cli::doctor(&store, cli.globals.config, printer),
    }
}

fn main() -> ExitCode {
    ctrlc::set_handler(move || {
        cleanup();

        #[allow(clippy::exit)]
        std::process::exit(if cfg!(windows) { 0xC000_013A_u32 as i32 } else { 130 });
    })
    .expect("Error setting Ctrl-C handler");

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => err.exit(),
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to create tokio runtime");
    let result = runtime.block_on(Box::pin(run(cli)));
    runtime.shutdown_background();

    match result {
        Ok(code) => code.into(),
        Err(err) => {
            let mut causes = err.chain();
            eprintln!("{}: {}", "error".red().bold(), causes.next().unwrap());
            for err in causes {
                eprintln!("  {}: {}", "caused by".red().bold(), err);
            }
            ExitStatus::Failure.into()
        }
    }
}
