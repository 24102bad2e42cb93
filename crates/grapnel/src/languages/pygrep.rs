use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

use crate::hook::Hook;
use crate::languages::{EnvChange, Invocation, LanguageImpl};

#[derive(Debug, Default)]
struct Args {
    ignore_case: bool,
    multiline: bool,
    negate: bool,
}

impl Args {
    fn parse(args: &[String]) -> Result<Self> {
        let mut parsed = Args::default();

        for arg in args {
            match arg.as_str() {
                "--ignore-case" | "-i" => parsed.ignore_case = true,
                "--multiline" => parsed.multiline = true,
                "--negate" => parsed.negate = true,
                _ => anyhow::bail!("Unknown argument: {arg}"),
            }
        }

        Ok(parsed)
    }
}

/// Regex grep over the matched files, implemented in-process; no external
/// process is spawned. The `entry` is the pattern.
#[derive(Debug, Copy, Clone)]
pub(crate) struct Pygrep;

impl LanguageImpl for Pygrep {
    async fn install(&self, _hook: &Hook, _env_dir: &Path) -> Result<()> {
        Ok(())
    }

    async fn check_health(&self, _env_dir: &Path) -> Result<()> {
        Ok(())
    }

    fn build_command(&self, hook: &Hook, _env_dir: Option<&Path>) -> Result<Invocation> {
        // Validate eagerly so a bad pattern fails before any files are read.
        build_pattern(hook)?;
        Ok(Invocation::PyGrep)
    }

    fn build_env(&self, _hook: &Hook, _env_dir: Option<&Path>) -> Result<Vec<EnvChange>> {
        Ok(vec![])
    }
}

fn build_pattern(hook: &Hook) -> Result<(fancy_regex::Regex, Args)> {
    let args = Args::parse(&hook.args)?;

    let mut pattern = String::new();
    if args.ignore_case {
        pattern.push_str("(?i)");
    }
    if args.multiline {
        pattern.push_str("(?ms)");
    }
    pattern.push_str(hook.entry.raw());

    let regex = fancy_regex::Regex::new(&pattern)
        .with_context(|| format!("Invalid pygrep pattern `{}`", hook.entry.raw()))?;
    Ok((regex, args))
}

/// Grep every file; a match is a failure (or, with `--negate`, the absence of
/// a match anywhere in a file is).
pub(crate) fn run(hook: &Hook, filenames: &[&Path]) -> Result<(i32, Vec<u8>)> {
    let (regex, args) = build_pattern(hook)?;

    let mut code = 0;
    let mut output = String::new();
    for filename in filenames {
        let Ok(bytes) = fs_err::read(filename) else {
            continue;
        };
        let contents = String::from_utf8_lossy(&bytes);

        let failed = if args.multiline {
            process_multiline(&regex, args.negate, filename, &contents, &mut output)
        } else {
            process_by_line(&regex, args.negate, filename, &contents, &mut output)
        };
        if failed {
            code = 1;
        }
    }

    Ok((code, output.into_bytes()))
}

fn process_by_line(
    regex: &fancy_regex::Regex,
    negate: bool,
    filename: &Path,
    contents: &str,
    output: &mut String,
) -> bool {
    if negate {
        for line in contents.lines() {
            if regex.is_match(line).unwrap_or(false) {
                return false;
            }
        }
        let _ = writeln!(output, "{}", filename.display());
        return true;
    }

    let mut failed = false;
    for (line_no, line) in contents.lines().enumerate() {
        if regex.is_match(line).unwrap_or(false) {
            failed = true;
            let _ = writeln!(output, "{}:{}:{}", filename.display(), line_no + 1, line);
        }
    }
    failed
}

fn process_multiline(
    regex: &fancy_regex::Regex,
    negate: bool,
    filename: &Path,
    contents: &str,
    output: &mut String,
) -> bool {
    let found = regex.find(contents).ok().flatten();

    if negate {
        if found.is_some() {
            return false;
        }
        let _ = writeln!(output, "{}", filename.display());
        return true;
    }

    let Some(m) = found else {
        return false;
    };
    let line_no = contents[..m.start()].matches('\n').count() + 1;
    let _ = writeln!(
        output,
        "{}:{}:{}",
        filename.display(),
        line_no,
        m.as_str().trim_end_matches('\n')
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HookOptions, Language, ManifestHook};
    use crate::hook::{HookBuilder, Repo};
    use std::sync::Arc;

    fn pygrep_hook(pattern: &str, args: &[&str]) -> Hook {
        let definition = ManifestHook {
            id: "grep".to_string(),
            name: "grep".to_string(),
            entry: pattern.to_string(),
            language: Language::Pygrep,
            options: HookOptions {
                args: Some(args.iter().map(ToString::to_string).collect()),
                ..Default::default()
            },
        };
        HookBuilder::from_local(Arc::new(Repo::Local { hooks: vec![] }), definition, 0)
            .build()
            .unwrap()
    }

    #[test]
    fn matches_fail_with_location() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("sample.py");
        fs_err::write(&file, "import os\nprint('x')\n").unwrap();

        let hook = pygrep_hook(r"print\(", &[]);
        let (code, output) = run(&hook, &[file.as_path()]).unwrap();
        assert_eq!(code, 1);
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("sample.py:2:print('x')"), "{output}");
    }

    #[test]
    fn no_match_passes() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("sample.py");
        fs_err::write(&file, "import os\n").unwrap();

        let hook = pygrep_hook(r"print\(", &[]);
        let (code, output) = run(&hook, &[file.as_path()]).unwrap();
        assert_eq!(code, 0);
        assert!(output.is_empty());
    }

    #[test]
    fn ignore_case_flag() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("sample.txt");
        fs_err::write(&file, "TODO fixme\n").unwrap();

        let hook = pygrep_hook("todo", &[]);
        let (code, _) = run(&hook, &[file.as_path()]).unwrap();
        assert_eq!(code, 0);

        let hook = pygrep_hook("todo", &["--ignore-case"]);
        let (code, _) = run(&hook, &[file.as_path()]).unwrap();
        assert_eq!(code, 1);
    }

    #[test]
    fn negate_inverts_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let with = dir.path().join("with.txt");
        let without = dir.path().join("without.txt");
        fs_err::write(&with, "marker\n").unwrap();
        fs_err::write(&without, "nothing here\n").unwrap();

        let hook = pygrep_hook("marker", &["--negate"]);
        let (code, output) = run(&hook, &[with.as_path()]).unwrap();
        assert_eq!(code, 0);
        assert!(output.is_empty());

        let (code, output) = run(&hook, &[without.as_path()]).unwrap();
        assert_eq!(code, 1);
        assert!(String::from_utf8(output).unwrap().contains("without.txt"));
    }

    #[test]
    fn multiline_spans_lines() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("sample.txt");
        fs_err::write(&file, "alpha\nbeta\ngamma\n").unwrap();

        let hook = pygrep_hook(r"beta.gamma", &["--multiline"]);
        let (code, output) = run(&hook, &[file.as_path()]).unwrap();
        assert_eq!(code, 1);
        let output = String::from_utf8(output).unwrap();
        assert!(output.starts_with(&format!("{}:2:", file.display())), "{output}");
    }
}
