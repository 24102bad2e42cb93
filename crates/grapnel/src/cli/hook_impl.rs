use std::io::Read;
use std::path::PathBuf;
use std::sync::LazyLock;

use anyhow::Result;
use owo_colors::OwoColorize;

use grapnel_consts::env_vars::EnvVars;

use crate::cli::{ExitStatus, HookImplArgs, RunArgs};
use crate::config::{HookType, config_file_in};
use crate::git::GIT_ROOT;
use crate::printer::Printer;
use crate::store::Store;

/// The entry point invoked by installed hook shims: translate the positional
/// arguments git passes for this hook type into `run` flags.
pub(crate) async fn hook_impl(
    store: &Store,
    config: Option<PathBuf>,
    args: HookImplArgs,
    printer: Printer,
) -> Result<ExitStatus> {
    let root = LazyLock::force(&GIT_ROOT).as_ref()?.clone();
    let config_path = match config {
        Some(path) => path,
        None => config_file_in(&root)?,
    };

    if !config_path.is_file() {
        if args.skip_on_missing_config || EnvVars::is_set(EnvVars::GRAPNEL_ALLOW_NO_CONFIG) {
            return Ok(ExitStatus::Success);
        }
        anstream::eprintln!(
            "{}: no configuration file found at `{}`\n\
             - To temporarily silence this, run `{}`\n\
             - To permanently silence this, install hooks with `{}`\n\
             - To uninstall hooks, run `{}`",
            "error".red().bold(),
            config_path.display(),
            "GRAPNEL_ALLOW_NO_CONFIG=1 git ...".cyan(),
            "grapnel install --allow-missing-config".cyan(),
            "grapnel uninstall".cyan(),
        );
        return Ok(ExitStatus::Failure);
    }

    if !args.hook_type.num_args().contains(&args.args.len()) {
        anyhow::bail!(
            "`{}` expects {:?} argument(s) from git, got {}",
            args.hook_type,
            args.hook_type.num_args(),
            args.args.len()
        );
    }

    let mut run_args = RunArgs {
        hook_stage: args.hook_type.into(),
        ..Default::default()
    };

    match args.hook_type {
        HookType::CommitMsg | HookType::PrepareCommitMsg => {
            run_args.extra.commit_msg_filename = args.args.first().cloned();
            if args.hook_type == HookType::PrepareCommitMsg {
                run_args.extra.prepare_commit_message_source = args.args.get(1).cloned();
                run_args.extra.commit_object_name = args.args.get(2).cloned();
            }
        }
        HookType::PrePush => {
            run_args.extra.remote_name = args.args.first().cloned();
            run_args.extra.remote_url = args.args.get(1).cloned();

            // git feeds the pushed refs on stdin:
            //   <local ref> SP <local sha> SP <remote ref> SP <remote sha> LF
            let mut stdin = String::new();
            std::io::stdin().read_to_string(&mut stdin)?;
            let Some(push) = stdin.lines().find_map(parse_push_line) else {
                // Nothing is being pushed.
                return Ok(ExitStatus::Success);
            };
            run_args.extra.local_branch = Some(push.local_ref);
            run_args.extra.remote_branch = Some(push.remote_ref);
            run_args.from_ref = Some(push.remote_sha);
            run_args.to_ref = Some(push.local_sha);
        }
        HookType::PostCheckout => {
            run_args.extra.checkout_type = args.args.get(2).cloned();
        }
        HookType::PostMerge => {
            run_args.extra.is_squash_merge = args.args.first().is_some_and(|arg| arg == "1");
        }
        HookType::PostRewrite => {
            run_args.extra.rewrite_command = args.args.first().cloned();
        }
        HookType::PreRebase => {
            run_args.extra.pre_rebase_upstream = args.args.first().cloned();
            run_args.extra.pre_rebase_branch = args.args.get(1).cloned();
        }
        HookType::PreCommit | HookType::PostCommit | HookType::PreMergeCommit => {}
    }

    crate::cli::run(store, Some(config_path), run_args, false, printer).await
}

struct PushLine {
    local_ref: String,
    local_sha: String,
    remote_ref: String,
    remote_sha: String,
}

fn parse_push_line(line: &str) -> Option<PushLine> {
    let mut parts = line.split_whitespace();
    let push = PushLine {
        local_ref: parts.next()?.to_string(),
        local_sha: parts.next()?.to_string(),
        remote_ref: parts.next()?.to_string(),
        remote_sha: parts.next()?.to_string(),
    };
    // A deleted remote ref pushes no content.
    if push.local_sha.chars().all(|c| c == '0') {
        return None;
    }
    Some(push)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_line_parses_four_fields() {
        let push = parse_push_line(
            "refs/heads/main 1111111111111111111111111111111111111111 \
             refs/heads/main 2222222222222222222222222222222222222222",
        )
        .unwrap();
        assert_eq!(push.local_ref, "refs/heads/main");
        assert_eq!(push.remote_sha, "2222222222222222222222222222222222222222");
    }

    #[test]
    fn deleting_a_ref_pushes_nothing() {
        assert!(
            parse_push_line(
                "refs/heads/gone 0000000000000000000000000000000000000000 \
                 refs/heads/gone 2222222222222222222222222222222222222222",
            )
            .is_none()
        );
    }
}
