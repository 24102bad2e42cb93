use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};

use crate::config::{HookType, Stage};

mod clean;
mod doctor;
mod gc;
mod hook_impl;
mod install;
mod migrate;
pub(crate) mod reporter;
pub(crate) mod run;
mod sample_config;
mod validate;

pub(crate) use clean::clean;
pub(crate) use doctor::doctor;
pub(crate) use gc::gc;
pub(crate) use hook_impl::hook_impl;
pub(crate) use install::{install, install_hooks, uninstall};
pub(crate) use migrate::migrate_config;
pub(crate) use run::run;
pub(crate) use sample_config::sample_config;
pub(crate) use validate::validate_configs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExitStatus {
    /// All hooks passed or were skipped.
    Success,
    /// A hook failed, a fatal error occurred, or a stash conflict was rolled
    /// back.
    Failure,
    /// The invocation itself was unusable (e.g. the config failed to load in
    /// `doctor`).
    Error,
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        match status {
            ExitStatus::Success => Self::from(0),
            ExitStatus::Failure => Self::from(1),
            ExitStatus::Error => Self::from(2),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub(crate) enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl From<ColorChoice> for anstream::ColorChoice {
    fn from(value: ColorChoice) -> Self {
        match value {
            ColorChoice::Auto => Self::Auto,
            ColorChoice::Always => Self::Always,
            ColorChoice::Never => Self::Never,
        }
    }
}

#[derive(Debug, clap::Args)]
pub(crate) struct GlobalArgs {
    /// Path to an alternate configuration file.
    #[arg(global = true, short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Use verbose output; repeat for more detail.
    #[arg(global = true, short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Use quiet output; repeat to silence everything.
    #[arg(global = true, short, long, action = ArgAction::Count, conflicts_with = "verbose")]
    pub quiet: u8,

    /// Whether to use color in output.
    ///
    /// `NO_COLOR` and a non-tty stdout are respected in `auto` mode.
    #[arg(global = true, long, value_enum, default_value_t)]
    pub color: ColorChoice,

    /// Hide progress spinners.
    #[arg(global = true, long)]
    pub no_progress: bool,

    /// Change to this directory before doing anything.
    #[arg(global = true, long, value_name = "DIR")]
    pub cd: Option<PathBuf>,
}

/// Arguments only meaningful when invoked from an installed git hook via
/// `hook-impl`; hidden from regular help.
#[derive(Debug, Default, Clone, clap::Args)]
pub(crate) struct RunExtraArgs {
    #[arg(long, hide = true)]
    pub commit_msg_filename: Option<String>,
    #[arg(long, hide = true)]
    pub prepare_commit_message_source: Option<String>,
    #[arg(long, hide = true)]
    pub commit_object_name: Option<String>,
    #[arg(long, hide = true)]
    pub local_branch: Option<String>,
    #[arg(long, hide = true)]
    pub remote_branch: Option<String>,
    #[arg(long, hide = true)]
    pub remote_name: Option<String>,
    #[arg(long, hide = true)]
    pub remote_url: Option<String>,
    #[arg(long, hide = true)]
    pub checkout_type: Option<String>,
    #[arg(long, hide = true)]
    pub is_squash_merge: bool,
    #[arg(long, hide = true)]
    pub rewrite_command: Option<String>,
    #[arg(long, hide = true)]
    pub pre_rebase_upstream: Option<String>,
    #[arg(long, hide = true)]
    pub pre_rebase_branch: Option<String>,
}

#[derive(Debug, clap::Args)]
pub(crate) struct RunArgs {
    /// Run only the hook with this id or alias.
    #[arg(value_name = "HOOK")]
    pub hook_id: Option<String>,

    /// Run on all files tracked by git.
    #[arg(short, long, conflicts_with_all = ["files", "from_ref", "to_ref"])]
    pub all_files: bool,

    /// Run on the given files instead of the per-stage selection.
    #[arg(long, num_args = 1..)]
    pub files: Vec<String>,

    /// The original ref in a `<from_ref>...<to_ref>` diff selection.
    #[arg(long, alias = "source", short = 's', requires = "to_ref", conflicts_with = "files")]
    pub from_ref: Option<String>,

    /// The destination ref in a `<from_ref>...<to_ref>` diff selection.
    #[arg(long, alias = "origin", short = 'o', requires = "from_ref", conflicts_with = "files")]
    pub to_ref: Option<String>,

    /// The stage to run hooks for.
    #[arg(long, value_enum, default_value_t)]
    pub hook_stage: Stage,

    /// Number of hooks to run concurrently.
    #[arg(short, long, default_value_t = 1, value_name = "N")]
    pub jobs: usize,

    /// Per-hook wall-clock timeout in seconds.
    #[arg(long, default_value_t = 60, value_name = "SECONDS")]
    pub hook_timeout: u64,

    /// Stop after the first failing hook.
    #[arg(long)]
    pub fail_fast: bool,

    #[command(flatten)]
    pub extra: RunExtraArgs,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            hook_id: None,
            all_files: false,
            files: Vec::new(),
            from_ref: None,
            to_ref: None,
            hook_stage: Stage::default(),
            jobs: 1,
            hook_timeout: 60,
            fail_fast: false,
            extra: RunExtraArgs::default(),
        }
    }
}

#[derive(Debug, clap::Args)]
pub(crate) struct InstallArgs {
    /// The hook types to install shims for.
    #[arg(short = 't', long = "hook-type", value_enum, value_name = "TYPE")]
    pub hook_types: Vec<HookType>,

    /// Replace any existing non-grapnel hook scripts instead of keeping
    /// `.legacy` copies.
    #[arg(short = 'f', long)]
    pub overwrite: bool,

    /// Also install hook environments for all configured hooks.
    #[arg(long)]
    pub install_hooks: bool,

    /// Make the installed shim a no-op if the config file is missing.
    #[arg(long)]
    pub allow_missing_config: bool,
}

#[derive(Debug, clap::Args)]
pub(crate) struct UninstallArgs {
    /// The hook types to uninstall.
    #[arg(short = 't', long = "hook-type", value_enum, value_name = "TYPE")]
    pub hook_types: Vec<HookType>,
}

#[derive(Debug, clap::Args)]
pub(crate) struct HookImplArgs {
    #[arg(long, value_enum)]
    pub hook_type: HookType,

    #[arg(long)]
    pub hook_dir: Option<PathBuf>,

    #[arg(long)]
    pub skip_on_missing_config: bool,

    /// The arguments git passed to the hook.
    #[arg(last = true)]
    pub args: Vec<String>,
}

#[derive(Debug, clap::Args)]
pub(crate) struct ValidateConfigArgs {
    /// The config files to validate.
    #[arg(value_name = "CONFIG", default_value = grapnel_consts::CONFIG_FILE)]
    pub configs: Vec<PathBuf>,
}

#[derive(Debug, clap::Args)]
pub(crate) struct SampleConfigArgs {
    /// Write the sample config to this file instead of stdout.
    #[arg(short = 'f', long, value_name = "FILE")]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Run hooks against the current repository.
    Run(Box<RunArgs>),
    /// Install the grapnel shim into `.git/hooks`.
    Install(InstallArgs),
    /// Install hook environments for all hooks in the config.
    InstallHooks,
    /// Remove installed hook shims.
    Uninstall(UninstallArgs),
    /// The entry point used by installed hook shims.
    #[command(hide = true)]
    HookImpl(HookImplArgs),
    /// Remove the entire cache directory.
    Clean,
    /// Remove cached repositories no longer referenced by any config.
    Gc,
    /// Rewrite a legacy list-style config to the current format.
    MigrateConfig,
    /// Print a sample configuration.
    SampleConfig(SampleConfigArgs),
    /// Validate configuration files.
    ValidateConfig(ValidateConfigArgs),
    /// Check that grapnel and its surroundings are usable.
    Doctor,
}

#[derive(Debug, Parser)]
#[command(
    name = "grapnel",
    author,
    version,
    about = "A fast cross-language git hook runner"
)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub run_args: RunArgs,

    #[command(flatten)]
    pub globals: GlobalArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_default_run() {
        let cli = Cli::try_parse_from(["grapnel"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.run_args.jobs, 1);
        assert_eq!(cli.run_args.hook_timeout, 60);
    }

    #[test]
    fn file_selection_flags_are_mutually_exclusive() {
        assert!(Cli::try_parse_from(["grapnel", "run", "--all-files", "--files", "a.py"]).is_err());
        assert!(
            Cli::try_parse_from([
                "grapnel",
                "run",
                "--files",
                "a.py",
                "--from-ref",
                "HEAD~1",
                "--to-ref",
                "HEAD"
            ])
            .is_err()
        );
        assert!(Cli::try_parse_from(["grapnel", "run", "--from-ref", "HEAD~1"]).is_err());
        assert!(
            Cli::try_parse_from(["grapnel", "run", "--from-ref", "HEAD~1", "--to-ref", "HEAD"])
                .is_ok()
        );
    }

    #[test]
    fn hook_impl_forwards_git_args() {
        let cli = Cli::try_parse_from([
            "grapnel",
            "hook-impl",
            "--hook-type",
            "pre-push",
            "--",
            "origin",
            "git@example.com:x.git",
        ])
        .unwrap();
        let Some(Command::HookImpl(args)) = cli.command else {
            panic!("expected hook-impl");
        };
        assert_eq!(args.args, vec!["origin", "git@example.com:x.git"]);
    }
}
