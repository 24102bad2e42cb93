use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use owo_colors::OwoColorize;
use rustc_hash::{FxHashMap, FxHashSet};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use unicode_width::UnicodeWidthStr;

use grapnel_consts::env_vars::EnvVars;

use crate::cli::reporter::PrepareReporter;
use crate::cli::{ExitStatus, RunArgs, RunExtraArgs};
use crate::config::{Config, Stage, config_file_in, read_config};
use crate::files::{CollectOptions, FileFilter, collect_files};
use crate::git::GIT_ROOT;
use crate::hook::{Hook, hooks_from_config};
use crate::printer::Printer;
use crate::run::{HookOutput, RunContext, run_hook};
use crate::store::Store;
use crate::{builtin, cleanup, git, languages, stash};

pub(crate) async fn run(
    store: &Store,
    config: Option<PathBuf>,
    args: RunArgs,
    verbose: bool,
    printer: Printer,
) -> Result<ExitStatus> {
    let stage = args.hook_stage;

    // Prevent recursive post-checkout hooks: cloning hook repos checks out
    // their worktrees too.
    if stage == Stage::PostCheckout
        && EnvVars::is_set(EnvVars::GRAPNEL_INTERNAL__SKIP_POST_CHECKOUT)
    {
        return Ok(ExitStatus::Success);
    }

    // Ensure we are in a git repository.
    let root = LazyLock::force(&GIT_ROOT).as_ref()?.clone();

    let config_path = match config {
        Some(path) => path,
        None => config_file_in(&root)?,
    };
    let config = read_config(&config_path)?;

    let should_stash = stage == Stage::PreCommit
        && !args.all_files
        && args.files.is_empty()
        && args.from_ref.is_none();

    if should_stash {
        if git::has_unmerged(&root).await? {
            anyhow::bail!("You have unmerged paths; resolve them before running hooks");
        }
        if git::has_unstaged_changes_for(&root, &config_path).await? {
            anyhow::bail!(
                "Your configuration file is unstaged; `git add {}` to fix this",
                config_path.display()
            );
        }
    }

    store.mark_config_used(&config_path);

    let reporter = PrepareReporter::new(printer);
    let lock = store.lock_async().await?;

    let hooks = hooks_from_config(&config, store, Some(&reporter))
        .await
        .context("Failed to resolve hooks")?;

    let mut selected: Vec<Hook> = hooks
        .into_iter()
        .filter(|hook| hook.stages.contains(stage))
        .collect();
    if let Some(id) = &args.hook_id {
        selected.retain(|hook| hook.id == *id || hook.alias.as_deref() == Some(id.as_str()));
        if selected.is_empty() {
            anyhow::bail!("No hook with id `{id}` in stage `{stage}`");
        }
    }

    if selected.is_empty() {
        debug!(%stage, "No hooks to run for stage");
        return Ok(ExitStatus::Success);
    }

    // Environments are prepared up front, under the store lock. A failure is
    // recorded against the hook rather than aborting the run.
    let local_envs_dir = store.path().join("local");
    let mut env_dirs: FxHashMap<usize, PathBuf> = FxHashMap::default();
    let mut env_errors: FxHashMap<usize, String> = FxHashMap::default();
    for hook in &selected {
        if languages::environment_name(hook).is_none() {
            continue;
        }
        let progress = reporter.on_install_start(&hook.id);
        match languages::ensure_environment(hook, &local_envs_dir).await {
            Ok(Some(env_dir)) => {
                env_dirs.insert(hook.idx, env_dir);
            }
            Ok(None) => {}
            Err(err) => {
                env_errors.insert(hook.idx, format!("{err:#}"));
            }
        }
        reporter.on_install_complete(progress);
    }

    drop(lock);
    reporter.clear();

    set_env_vars(stage, args.from_ref.as_deref(), args.to_ref.as_deref(), &args.extra);

    // Hooks run from the repository root.
    std::env::set_current_dir(&root)
        .with_context(|| format!("Failed to change directory to `{}`", root.display()))?;

    let stash = if should_stash && git::has_unstaged_changes(&root).await? {
        stash::capture(&root, store.path()).await?
    } else {
        None
    };
    // If the user interrupts the run, put their tree back before exiting.
    let cleanup_id = stash.as_ref().map(|stash| {
        let patch = stash.patch_path().to_path_buf();
        let root = root.clone();
        cleanup::register(move || {
            let _ = std::process::Command::new("git")
                .current_dir(&root)
                .args(["apply", "--whitespace=nowarn"])
                .arg(&patch)
                .status();
            let _ = std::fs::remove_file(&patch);
        })
    });

    let run_result = run_hooks(
        &root, &config, &selected, &env_dirs, &env_errors, store, &args, verbose, printer,
    )
    .await;

    let mut stash_conflict = false;
    if let Some(stash) = stash {
        match stash::restore(&root, &stash).await {
            Ok(stash::Restore::Reapplied) => {}
            Ok(stash::Restore::RolledBack) => {
                writeln!(
                    printer.stdout_important(),
                    "{}: {}",
                    "error".red().bold(),
                    stash::Error::Conflict,
                )?;
                stash_conflict = true;
            }
            Err(err) => {
                writeln!(
                    printer.stdout_important(),
                    "{}: failed to restore stashed changes: {err}",
                    "error".red().bold(),
                )?;
                stash_conflict = true;
            }
        }
    }
    if let Some(id) = cleanup_id {
        cleanup::unregister(id);
    }

    let status = run_result?;
    if stash_conflict {
        return Ok(ExitStatus::Failure);
    }
    Ok(status)
}

/// Export the environment variables hooks expect for the given stage.
fn set_env_vars(stage: Stage, from_ref: Option<&str>, to_ref: Option<&str>, args: &RunExtraArgs) {
    unsafe {
        std::env::set_var(EnvVars::PRE_COMMIT, "1");
        std::env::set_var(EnvVars::PRE_COMMIT_HOOK_STAGE, stage.as_str());

        if let Some(from_ref) = from_ref {
            std::env::set_var(EnvVars::PRE_COMMIT_ORIGIN, from_ref);
            std::env::set_var(EnvVars::PRE_COMMIT_FROM_REF, from_ref);
        }
        if let Some(to_ref) = to_ref {
            std::env::set_var(EnvVars::PRE_COMMIT_SOURCE, to_ref);
            std::env::set_var(EnvVars::PRE_COMMIT_TO_REF, to_ref);
        }
        if let Some(filename) = &args.commit_msg_filename {
            std::env::set_var(EnvVars::PRE_COMMIT_COMMIT_MSG_FILENAME, filename);
        }
        if let Some(source) = &args.prepare_commit_message_source {
            std::env::set_var(EnvVars::PRE_COMMIT_COMMIT_MSG_SOURCE, source);
        }
        if let Some(object) = &args.commit_object_name {
            std::env::set_var(EnvVars::PRE_COMMIT_COMMIT_OBJECT_NAME, object);
        }
        if let Some(branch) = &args.local_branch {
            std::env::set_var(EnvVars::PRE_COMMIT_LOCAL_BRANCH, branch);
        }
        if let Some(branch) = &args.remote_branch {
            std::env::set_var(EnvVars::PRE_COMMIT_REMOTE_BRANCH, branch);
        }
        if let Some(name) = &args.remote_name {
            std::env::set_var(EnvVars::PRE_COMMIT_REMOTE_NAME, name);
        }
        if let Some(url) = &args.remote_url {
            std::env::set_var(EnvVars::PRE_COMMIT_REMOTE_URL, url);
        }
        if let Some(checkout) = &args.checkout_type {
            std::env::set_var(EnvVars::PRE_COMMIT_CHECKOUT_TYPE, checkout);
        }
        if args.is_squash_merge {
            std::env::set_var(EnvVars::PRE_COMMIT_IS_SQUASH_MERGE, "1");
        }
        if let Some(command) = &args.rewrite_command {
            std::env::set_var(EnvVars::PRE_COMMIT_REWRITE_COMMAND, command);
        }
        if let Some(upstream) = &args.pre_rebase_upstream {
            std::env::set_var(EnvVars::PRE_COMMIT_PRE_REBASE_UPSTREAM, upstream);
        }
        if let Some(branch) = &args.pre_rebase_branch {
            std::env::set_var(EnvVars::PRE_COMMIT_PRE_REBASE_BRANCH, branch);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HookStatus {
    Passed,
    Failed,
    TimedOut,
    NoFiles,
    Skipped,
}

impl HookStatus {
    fn passed(self) -> bool {
        matches!(self, Self::Passed | Self::NoFiles | Self::Skipped)
    }
}

struct RunResult {
    idx: usize,
    status: HookStatus,
    duration: Duration,
    code: i32,
    output: Vec<u8>,
}

impl RunResult {
    fn skipped(idx: usize, status: HookStatus) -> Self {
        Self {
            idx,
            status,
            duration: Duration::ZERO,
            code: 0,
            output: Vec::new(),
        }
    }
}

/// The ids named in the `SKIP` environment variable.
fn skipped_ids() -> FxHashSet<String> {
    EnvVars::var(EnvVars::SKIP)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[allow(clippy::too_many_arguments)]
async fn run_hooks(
    root: &Path,
    config: &Config,
    hooks: &[Hook],
    env_dirs: &FxHashMap<usize, PathBuf>,
    env_errors: &FxHashMap<usize, String>,
    store: &Store,
    args: &RunArgs,
    verbose: bool,
    printer: Printer,
) -> Result<ExitStatus> {
    let filenames = collect_files(root, CollectOptions {
        stage: args.hook_stage,
        from_ref: args.from_ref.clone(),
        to_ref: args.to_ref.clone(),
        all_files: args.all_files,
        files: args.files.clone(),
        commit_msg_filename: args.extra.commit_msg_filename.clone(),
    })
    .await
    .context("Failed to collect files")?;
    debug!("Candidate files: {}", filenames.len());

    let filter = FileFilter::new(filenames.iter(), config);
    let skips = skipped_ids();

    let token = CancellationToken::new();
    let ctx = RunContext {
        work_dir: root.to_path_buf(),
        timeout: Duration::from_secs(args.hook_timeout),
        token: token.clone(),
    };

    let status_printer = StatusPrinter::for_hooks(hooks, printer);
    let fail_fast_config = args.fail_fast || config.fail_fast.unwrap_or(false);

    let mut results: Vec<Option<RunResult>> = (0..hooks.len()).map(|_| None).collect();
    let mut failed = false;

    // `require_serial` hooks form barriers: everything before them completes
    // first, everything after starts only once they finish. Hooks between
    // barriers share a pool of `--jobs` workers. Results are slotted by
    // declaration order, not completion order.
    let mut start = 0;
    'all: while start < hooks.len() {
        let end = if hooks[start].require_serial {
            start + 1
        } else {
            let mut end = start;
            while end < hooks.len() && !hooks[end].require_serial {
                end += 1;
            }
            end
        };
        let concurrency = if hooks[start].require_serial {
            1
        } else {
            args.jobs.max(1)
        };

        let mut stream = futures::stream::iter(
            hooks[start..end]
                .iter()
                .map(|hook| execute_one(hook, env_dirs, env_errors, &filter, &ctx, store, &skips)),
        )
        .buffer_unordered(concurrency);

        let mut segment_failed = false;
        let mut hook_fail_fast = false;
        while let Some(result) = stream.next().await {
            let slot = hooks
                .iter()
                .position(|h| h.idx == result.idx)
                .expect("result for unknown hook");
            if !result.status.passed() {
                segment_failed = true;
                hook_fail_fast |= hooks[slot].fail_fast;
            }
            results[slot] = Some(result);

            // Failing fast: cancel in-flight hooks and stop starting new
            // ones. Dropping the stream reaps their child processes; hooks
            // that never ran stay unreported.
            if segment_failed && (fail_fast_config || hook_fail_fast) {
                token.cancel();
                break;
            }
        }
        drop(stream);

        // Report this segment in declaration order.
        for (hook, result) in hooks[start..end].iter().zip(&results[start..end]) {
            if let Some(result) = result {
                status_printer.report(hook, result, verbose)?;
            }
        }

        if segment_failed {
            failed = true;
            if fail_fast_config || hook_fail_fast {
                break 'all;
            }
        }
        start = end;
    }

    if failed {
        Ok(ExitStatus::Failure)
    } else {
        Ok(ExitStatus::Success)
    }
}

async fn execute_one(
    hook: &Hook,
    env_dirs: &FxHashMap<usize, PathBuf>,
    env_errors: &FxHashMap<usize, String>,
    filter: &FileFilter<'_>,
    ctx: &RunContext,
    store: &Store,
    skips: &FxHashSet<String>,
) -> RunResult {
    if skips.contains(&hook.id)
        || hook
            .alias
            .as_ref()
            .is_some_and(|alias| skips.contains(alias))
    {
        return RunResult::skipped(hook.idx, HookStatus::Skipped);
    }

    let filenames = filter.for_hook(hook);
    if filenames.is_empty() && !hook.always_run {
        return RunResult::skipped(hook.idx, HookStatus::NoFiles);
    }

    if let Some(error) = env_errors.get(&hook.idx) {
        return RunResult {
            idx: hook.idx,
            status: HookStatus::Failed,
            duration: Duration::ZERO,
            code: 1,
            output: error.clone().into_bytes(),
        };
    }

    let start = std::time::Instant::now();
    let outcome = if hook.is_meta() {
        builtin::run(hook, &filenames, store)
            .await
            .map(|(code, output)| HookOutput {
                code,
                output,
                timed_out: false,
            })
    } else {
        run_hook(hook, env_dirs.get(&hook.idx).map(PathBuf::as_path), &filenames, ctx).await
    };
    let duration = start.elapsed();

    match outcome {
        Ok(output) => RunResult {
            idx: hook.idx,
            status: if output.timed_out {
                HookStatus::TimedOut
            } else if output.code == 0 {
                HookStatus::Passed
            } else {
                HookStatus::Failed
            },
            duration,
            code: output.code,
            output: output.output,
        },
        Err(err) => RunResult {
            idx: hook.idx,
            status: HookStatus::Failed,
            duration,
            code: 1,
            output: format!("{err:#}\n").into_bytes(),
        },
    }
}

struct StatusPrinter {
    printer: Printer,
    columns: usize,
}

impl StatusPrinter {
    const PASSED: &'static str = "Passed";
    const FAILED: &'static str = "Failed";
    const SKIPPED: &'static str = "Skipped";
    const TIMED_OUT: &'static str = "Timed out";
    const NO_FILES: &'static str = "(no files to check)";

    fn for_hooks(hooks: &[Hook], printer: Printer) -> Self {
        let name_len = hooks
            .iter()
            .map(|hook| hook.name.width())
            .max()
            .unwrap_or(0);
        let columns = std::cmp::max(
            79,
            // Hook name...(no files to check)Skipped
            name_len + 3 + Self::NO_FILES.len() + Self::SKIPPED.len(),
        );
        Self { printer, columns }
    }

    fn report(&self, hook: &Hook, result: &RunResult, verbose: bool) -> Result<()> {
        let (suffix, status_line, status_width) = match result.status {
            HookStatus::NoFiles => (
                Self::NO_FILES,
                Self::SKIPPED.black().on_cyan().to_string(),
                Self::SKIPPED.width(),
            ),
            HookStatus::Skipped => (
                "",
                Self::SKIPPED.black().on_yellow().to_string(),
                Self::SKIPPED.width(),
            ),
            HookStatus::Passed => (
                "",
                Self::PASSED.on_green().to_string(),
                Self::PASSED.width(),
            ),
            HookStatus::TimedOut => (
                "",
                Self::TIMED_OUT.on_red().to_string(),
                Self::TIMED_OUT.width(),
            ),
            HookStatus::Failed => {
                ("", Self::FAILED.on_red().to_string(), Self::FAILED.width())
            }
        };

        let dots = self
            .columns
            .saturating_sub(hook.name.width() + suffix.width() + status_width);
        let line = format!("{}{}{suffix}{status_line}", hook.name, ".".repeat(dots));

        let failed = !result.status.passed();
        let mut stdout = if failed {
            self.printer.stdout_important()
        } else {
            self.printer.stdout()
        };
        writeln!(stdout, "{line}")?;

        if matches!(result.status, HookStatus::NoFiles | HookStatus::Skipped) {
            return Ok(());
        }

        if verbose || hook.verbose || failed {
            writeln!(stdout, "{}", format!("- hook id: {}", hook.id).dimmed())?;
            if verbose || hook.verbose {
                writeln!(
                    stdout,
                    "{}",
                    format!("- duration: {:.2}s", result.duration.as_secs_f64()).dimmed()
                )?;
            }
            if result.code != 0 {
                writeln!(stdout, "{}", format!("- exit code: {}", result.code).dimmed())?;
            }

            let output = result.output.trim_ascii();
            if !output.is_empty() {
                if let Some(log_file) = hook.log_file.as_deref() {
                    let mut file = fs_err::OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(log_file)?;
                    file.write_all(output)?;
                    file.write_all(b"\n")?;
                } else {
                    writeln!(stdout)?;
                    for line in String::from_utf8_lossy(output).lines() {
                        if line.is_empty() {
                            writeln!(stdout)?;
                        } else {
                            writeln!(stdout, "  {line}")?;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
