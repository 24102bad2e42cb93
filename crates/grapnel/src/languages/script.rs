use std::path::Path;

use anyhow::Result;

use crate::hook::Hook;
use crate::languages::{EnvChange, Invocation, LanguageImpl};

/// Run `entry` as a script shipped inside the hook repository: the first
/// token is interpreted relative to the repo cache path.
#[derive(Debug, Copy, Clone)]
pub(crate) struct Script;

impl LanguageImpl for Script {
    async fn install(&self, _hook: &Hook, _env_dir: &Path) -> Result<()> {
        Ok(())
    }

    async fn check_health(&self, _env_dir: &Path) -> Result<()> {
        Ok(())
    }

    fn build_command(&self, hook: &Hook, _env_dir: Option<&Path>) -> Result<Invocation> {
        let mut entry = hook.entry.split()?;
        let repo_path = hook
            .repo_path()
            .ok_or_else(|| anyhow::anyhow!("`script` hooks require a hook repository"))?;
        entry[0] = repo_path.join(&entry[0]).to_string_lossy().to_string();
        Ok(Invocation::Command(entry))
    }

    fn build_env(&self, _hook: &Hook, _env_dir: Option<&Path>) -> Result<Vec<EnvChange>> {
        Ok(vec![])
    }
}
