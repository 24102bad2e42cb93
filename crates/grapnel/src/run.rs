use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::hook::Hook;
use crate::languages::{self, Invocation};
use crate::process::Cmd;

// https://www.in-ulm.de/~mascheck/various/argmax/
// https://github.com/rust-lang/rust/issues/40384
fn platform_max_cli_length() -> usize {
    // Leave generous headroom for the child's own environment manipulation.
    const ARG_HEADROOM: usize = 1 << 15;
    #[cfg(unix)]
    {
        let maximum = unsafe { libc::sysconf(libc::_SC_ARG_MAX) };
        let maximum = if maximum <= 0 {
            1 << 12
        } else {
            usize::try_from(maximum).expect("SC_ARG_MAX too large")
        };
        maximum.saturating_sub(ARG_HEADROOM).clamp(1 << 12, 1 << 20)
    }
    #[cfg(not(unix))]
    {
        (1 << 15) - 2048
    }
}

#[cfg(unix)]
fn osstr_exec_len(s: &std::ffi::OsStr) -> usize {
    use std::os::unix::ffi::OsStrExt;
    // Include +1 for the null terminator.
    s.as_bytes().len() + 1
}

#[cfg(not(unix))]
fn osstr_exec_len(s: &std::ffi::OsStr) -> usize {
    s.len() + 1
}

/// Iterator yielding file batches that fit within the maximum command line
/// length. Batches of a single hook always run sequentially.
struct Partitions<'a> {
    filenames: &'a [&'a Path],
    current_index: usize,
    command_length: usize,
    max_cli_length: usize,
}

impl<'a> Partitions<'a> {
    fn split(argv: &[String], filenames: &'a [&'a Path]) -> Result<Self> {
        let mut max_cli_length = platform_max_cli_length();

        // The environment shares the arg space with argv on exec.
        let env_size = std::env::vars_os()
            .map(|(key, value)| osstr_exec_len(&key) + osstr_exec_len(&value))
            .sum::<usize>();
        max_cli_length = max_cli_length.saturating_sub(env_size);

        let command_length =
            argv.iter().map(String::len).sum::<usize>() + argv.len();

        if command_length + 1 >= max_cli_length {
            anyhow::bail!(
                "Command line length ({command_length} bytes) exceeds the platform limit ({max_cli_length} bytes)"
            );
        }

        Ok(Self {
            filenames,
            current_index: 0,
            command_length,
            max_cli_length,
        })
    }
}

impl<'a> Iterator for Partitions<'a> {
    type Item = &'a [&'a Path];

    fn next(&mut self) -> Option<Self::Item> {
        // A hook with no files still runs once.
        if self.filenames.is_empty() && self.current_index == 0 {
            self.current_index = 1;
            return Some(&[]);
        }

        if self.current_index >= self.filenames.len() {
            return None;
        }

        let start_index = self.current_index;
        let mut current_length = self.command_length + 1;

        while self.current_index < self.filenames.len() {
            let filename = self.filenames[self.current_index];
            let length = filename.as_os_str().len() + 1;

            if current_length + length > self.max_cli_length
                && self.current_index > start_index
            {
                break;
            }

            current_length += length;
            self.current_index += 1;
        }

        Some(&self.filenames[start_index..self.current_index])
    }
}

/// The aggregated outcome of one hook invocation.
pub(crate) struct HookOutput {
    pub code: i32,
    pub output: Vec<u8>,
    pub timed_out: bool,
}

impl HookOutput {
    fn success() -> Self {
        Self {
            code: 0,
            output: Vec::new(),
            timed_out: false,
        }
    }
}

/// Everything an invocation needs beyond the hook itself.
pub(crate) struct RunContext {
    /// Hooks run from the repository root regardless of the invocation cwd.
    pub work_dir: std::path::PathBuf,
    /// Per-hook wall-clock budget.
    pub timeout: Duration,
    /// Shared cooperative cancellation; checked before each spawn, kills
    /// in-flight processes when fired.
    pub token: CancellationToken,
}

/// Execute a hook over its filtered files.
///
/// Files are passed in argv-length-bounded batches which run sequentially;
/// outputs are concatenated and success is the conjunction over batches.
pub(crate) async fn run_hook(
    hook: &Hook,
    env_dir: Option<&Path>,
    filenames: &[&Path],
    ctx: &RunContext,
) -> Result<HookOutput> {
    let invocation = languages::build_command(hook, env_dir)
        .with_context(|| format!("Failed to build command for hook `{hook}`"))?;

    match invocation {
        Invocation::FailMessage => {
            let (code, output) = languages::fail_render(hook, filenames);
            Ok(HookOutput {
                code,
                output,
                timed_out: false,
            })
        }
        Invocation::PyGrep => {
            let (code, output) = languages::pygrep_run(hook, filenames)?;
            Ok(HookOutput {
                code,
                output,
                timed_out: false,
            })
        }
        Invocation::Command(prefix) => run_command(hook, env_dir, prefix, filenames, ctx).await,
    }
}

async fn run_command(
    hook: &Hook,
    env_dir: Option<&Path>,
    prefix: Vec<String>,
    filenames: &[&Path],
    ctx: &RunContext,
) -> Result<HookOutput> {
    let mut argv = prefix;
    argv.extend(hook.args.iter().cloned());

    let env_changes = languages::build_env(hook, env_dir)?;
    let deadline = Instant::now() + ctx.timeout;

    let filenames = if hook.pass_filenames {
        filenames
    } else {
        &[]
    };

    let partitions = Partitions::split(&argv, filenames)?;
    trace!(
        hook = %hook,
        total_files = filenames.len(),
        "Executing hook command"
    );

    let mut aggregated = HookOutput::success();
    for batch in partitions {
        if ctx.token.is_cancelled() {
            aggregated.code = 130;
            aggregated.output.extend_from_slice(b"Interrupted\n");
            break;
        }

        let mut cmd = Cmd::new(&argv[0], "hook command");
        cmd.args(&argv[1..])
            .args(batch)
            .current_dir(&ctx.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .remove_git_envs()
            .check(false);
        // If this invocation's future is dropped (fail-fast cancellation),
        // the child must not outlive it.
        cmd.inner.kill_on_drop(true);
        for (key, value) in &env_changes {
            match value {
                Some(value) => cmd.env(key, value),
                None => cmd.env_remove(key),
            };
        }

        let (code, output, timed_out) = spawn_with_deadline(cmd, deadline, &ctx.token).await?;
        aggregated.output.extend(output);
        if code != 0 {
            aggregated.code = code;
        }
        if timed_out {
            aggregated.timed_out = true;
            aggregated
                .output
                .extend_from_slice(
                    format!("\nHook timed out after {:.0?}\n", ctx.timeout).as_bytes(),
                );
            break;
        }
    }

    Ok(aggregated)
}

/// Ask the child to terminate, give it a short grace window, then kill it.
async fn terminate_child(child: &mut tokio::process::Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
        let grace = tokio::time::sleep(Duration::from_millis(500));
        tokio::pin!(grace);
        tokio::select! {
            _ = child.wait() => return,
            _ = &mut grace => {}
        }
    }
    let _ = child.kill().await;
}

async fn spawn_with_deadline(
    mut cmd: Cmd,
    deadline: Instant,
    token: &CancellationToken,
) -> Result<(i32, Vec<u8>, bool)> {
    let mut child = cmd.spawn()?;

    let mut stdout = child.stdout.take().expect("stdout must be piped");
    let mut stderr = child.stderr.take().expect("stderr must be piped");
    let reader = tokio::spawn(async move {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let _ = tokio::join!(stdout.read_to_end(&mut out), stderr.read_to_end(&mut err));
        out.extend(err);
        out
    });

    let mut timed_out = false;
    let mut cancelled = false;
    let status = tokio::select! {
        status = child.wait() => status?,
        _ = tokio::time::sleep_until(deadline) => {
            timed_out = true;
            terminate_child(&mut child).await;
            child.wait().await?
        }
        _ = token.cancelled() => {
            cancelled = true;
            terminate_child(&mut child).await;
            child.wait().await?
        }
    };

    let mut output = reader.await.unwrap_or_default();
    if cancelled {
        output.extend_from_slice(b"\nInterrupted\n");
        return Ok((130, output, false));
    }

    let code = status.code().unwrap_or(1);
    let code = if timed_out && code == 0 { 1 } else { code };
    Ok((code, output, timed_out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn partitions<'a>(
        filenames: &'a [&'a Path],
        command_length: usize,
        max_cli_length: usize,
    ) -> Partitions<'a> {
        Partitions {
            filenames,
            current_index: 0,
            command_length,
            max_cli_length,
        }
    }

    #[test]
    fn no_files_still_runs_once() {
        let filenames: Vec<&Path> = vec![];
        let mut parts = partitions(&filenames, 100, 4096);
        assert_eq!(parts.next().map(<[&Path]>::len), Some(0));
        assert!(parts.next().is_none());
    }

    #[test]
    fn small_lists_fit_one_batch() {
        let files: Vec<PathBuf> = (0..3).map(|i| PathBuf::from(format!("f{i}.txt"))).collect();
        let refs: Vec<&Path> = files.iter().map(PathBuf::as_path).collect();

        let batches: Vec<usize> = partitions(&refs, 100, 4096).map(<[&Path]>::len).collect();
        assert_eq!(batches, vec![3]);
    }

    #[test]
    fn length_limit_splits_batches() {
        let files: Vec<PathBuf> = (0..10)
            .map(|i| PathBuf::from(format!("file{i}.txt")))
            .collect();
        let refs: Vec<&Path> = files.iter().map(PathBuf::as_path).collect();

        let batches: Vec<usize> = partitions(&refs, 50, 100).map(<[&Path]>::len).collect();
        assert!(batches.len() > 1, "{batches:?}");
        assert_eq!(batches.iter().sum::<usize>(), 10);
    }

    #[test]
    fn oversized_single_file_still_ships() {
        // A filename longer than the limit cannot be split further; it goes
        // out alone rather than being silently dropped.
        let long = PathBuf::from("a".repeat(5000));
        let small = PathBuf::from("b.txt");
        let refs: Vec<&Path> = vec![&small, &long, &small];

        let batches: Vec<usize> = partitions(&refs, 100, 1000).map(<[&Path]>::len).collect();
        assert_eq!(batches.iter().sum::<usize>(), 3);
    }
}
