use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::LazyLock;

use anyhow::{Context, Result};

use crate::cli::reporter::PrepareReporter;
use crate::cli::{ExitStatus, InstallArgs, UninstallArgs};
use crate::config::{HookType, config_file_in, read_config};
use crate::fs::Simplified;
use crate::git::GIT_ROOT;
use crate::hook::hooks_from_config;
use crate::printer::Printer;
use crate::store::Store;
use crate::{git, languages, warn_user};

/// Marker present in every shim we write; used to recognize our own hooks on
/// overwrite and uninstall.
const SHIM_MARKER: &str = "generated by grapnel";

fn shim(hook_type: HookType, skip_on_missing_config: bool) -> String {
    let skip_flag = if skip_on_missing_config {
        " --skip-on-missing-config"
    } else {
        ""
    };
    indoc::formatdoc! {r#"
        #!/bin/sh
        # File {SHIM_MARKER}: https://github.com/grapnel-dev/grapnel
        if command -v grapnel > /dev/null 2>&1; then
            exec grapnel hook-impl --hook-type={hook_type}{skip_flag} -- "$@"
        else
            echo 'grapnel not found; install it or remove this hook (`grapnel uninstall`)' 1>&2
            exit 1
        fi
    "#}
}

fn hook_types(args_types: &[HookType], config_default: Option<&Vec<HookType>>) -> Vec<HookType> {
    if !args_types.is_empty() {
        return args_types.to_vec();
    }
    if let Some(types) = config_default {
        if !types.is_empty() {
            return types.clone();
        }
    }
    vec![HookType::PreCommit]
}

/// Install hook shims into `.git/hooks`.
///
/// A pre-existing hook that is not ours is preserved as `<name>.legacy`
/// unless `--overwrite` is given. Idempotent for an unchanged config.
pub(crate) async fn install(
    store: &Store,
    config: Option<PathBuf>,
    args: InstallArgs,
    printer: Printer,
) -> Result<ExitStatus> {
    let root = LazyLock::force(&GIT_ROOT).as_ref()?.clone();

    if git::has_hooks_path_set(&root).await? {
        anyhow::bail!(
            "Cowardly refusing to install hooks with `core.hooksPath` set; \
             `git config --unset-all core.hooksPath` to fix this"
        );
    }

    let config_path = match &config {
        Some(path) => path.clone(),
        None => config_file_in(&root)?,
    };
    let config_defaults = read_config(&config_path)
        .ok()
        .and_then(|config| config.default_install_hook_types);

    for hook_type in hook_types(&args.hook_types, config_defaults.as_ref()) {
        let name = hook_type.as_str();
        let hooks_dir = git::hooks_dir(&root).await?;
        let target = hooks_dir.join(name);

        if target.is_file() {
            let existing = fs_err::read_to_string(&target).unwrap_or_default();
            if !existing.contains(SHIM_MARKER) {
                if args.overwrite {
                    warn_user!("Overwriting existing `{name}` hook");
                } else {
                    let legacy = hooks_dir.join(format!("{name}.legacy"));
                    fs_err::rename(&target, &legacy)?;
                    writeln!(
                        printer.stdout(),
                        "Existing `{name}` hook moved to `{}`",
                        legacy.user_display()
                    )?;
                }
            }
        }

        git::install_hook(&root, name, &shim(hook_type, args.allow_missing_config)).await?;
        writeln!(
            printer.stdout(),
            "grapnel installed at `.git/hooks/{name}`"
        )?;
    }

    if args.install_hooks {
        return install_hooks(store, Some(config_path), printer).await;
    }

    Ok(ExitStatus::Success)
}

/// Prepare every configured hook's repository clone and environment.
///
/// A second invocation with an unchanged config finds everything healthy and
/// installs nothing.
pub(crate) async fn install_hooks(
    store: &Store,
    config: Option<PathBuf>,
    printer: Printer,
) -> Result<ExitStatus> {
    let root = LazyLock::force(&GIT_ROOT).as_ref()?.clone();
    let config_path = match config {
        Some(path) => path,
        None => config_file_in(&root)?,
    };
    let config = read_config(&config_path)?;
    store.mark_config_used(&config_path);

    let reporter = PrepareReporter::new(printer);
    let _lock = store.lock_async().await?;

    let hooks = hooks_from_config(&config, store, Some(&reporter))
        .await
        .context("Failed to resolve hooks")?;

    let local_envs_dir = store.path().join("local");
    for hook in &hooks {
        if languages::environment_name(hook).is_none() {
            continue;
        }
        let progress = reporter.on_install_start(&hook.id);
        let result = languages::ensure_environment(hook, &local_envs_dir).await;
        reporter.on_install_complete(progress);
        result.with_context(|| format!("Failed to install environment for `{hook}`"))?;
    }
    reporter.clear();

    Ok(ExitStatus::Success)
}

/// Remove installed hook shims, restoring `.legacy` hooks when present.
pub(crate) async fn uninstall(args: UninstallArgs, printer: Printer) -> Result<ExitStatus> {
    let root = LazyLock::force(&GIT_ROOT).as_ref()?.clone();

    for hook_type in hook_types(&args.hook_types, None) {
        let name = hook_type.as_str();
        if !git::has_hook(&root, name).await? {
            continue;
        }
        let hooks_dir = git::hooks_dir(&root).await?;
        let target = hooks_dir.join(name);
        let existing = fs_err::read_to_string(&target).unwrap_or_default();
        if !existing.contains(SHIM_MARKER) {
            warn_user!("`{name}` hook was not installed by grapnel, skipping");
            continue;
        }

        git::uninstall_hook(&root, name).await?;
        writeln!(printer.stdout(), "`{name}` uninstalled")?;

        let legacy = hooks_dir.join(format!("{name}.legacy"));
        if legacy.is_file() {
            fs_err::rename(&legacy, &target)?;
            writeln!(printer.stdout(), "Restored previous `{name}` hook")?;
        }
    }

    Ok(ExitStatus::Success)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shim_is_posix_and_forwards_args() {
        let script = shim(HookType::PreCommit, false);
        assert!(script.starts_with("#!/bin/sh\n"));
        assert!(script.contains("hook-impl --hook-type=pre-commit -- \"$@\""));
        assert!(script.contains(SHIM_MARKER));

        let script = shim(HookType::PrePush, true);
        assert!(script.contains("--hook-type=pre-push --skip-on-missing-config"));
    }

    #[test]
    fn hook_type_defaults() {
        assert_eq!(hook_types(&[], None), vec![HookType::PreCommit]);
        assert_eq!(
            hook_types(&[HookType::PrePush], None),
            vec![HookType::PrePush]
        );
        assert_eq!(
            hook_types(&[], Some(&vec![HookType::CommitMsg])),
            vec![HookType::CommitMsg]
        );
    }
}
