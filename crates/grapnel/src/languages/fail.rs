use std::path::Path;

use anyhow::Result;

use crate::hook::Hook;
use crate::languages::{EnvChange, Invocation, LanguageImpl};

/// Always fails; used to intentionally block matched files. The executor
/// prints the entry text followed by the file list.
#[derive(Debug, Copy, Clone)]
pub(crate) struct Fail;

impl LanguageImpl for Fail {
    async fn install(&self, _hook: &Hook, _env_dir: &Path) -> Result<()> {
        Ok(())
    }

    async fn check_health(&self, _env_dir: &Path) -> Result<()> {
        Ok(())
    }

    fn build_command(&self, _hook: &Hook, _env_dir: Option<&Path>) -> Result<Invocation> {
        Ok(Invocation::FailMessage)
    }

    fn build_env(&self, _hook: &Hook, _env_dir: Option<&Path>) -> Result<Vec<EnvChange>> {
        Ok(vec![])
    }
}

/// Render the failure report: the entry text, then each matched file.
pub(crate) fn render(hook: &Hook, filenames: &[&Path]) -> (i32, Vec<u8>) {
    let mut out = hook.entry.raw().as_bytes().to_vec();
    out.extend(b"\n\n");
    for filename in filenames {
        out.extend(filename.to_string_lossy().as_bytes());
        out.push(b'\n');
    }
    out.push(b'\n');

    (1, out)
}
