use std::path::Path;

use anyhow::Result;

use crate::hook::Hook;
use crate::languages::{EnvChange, Invocation, LanguageImpl, resolve_command};

/// Run `entry` as-is under the user's `$PATH`. No environment is installed.
#[derive(Debug, Copy, Clone)]
pub(crate) struct System;

impl LanguageImpl for System {
    async fn install(&self, _hook: &Hook, _env_dir: &Path) -> Result<()> {
        Ok(())
    }

    async fn check_health(&self, _env_dir: &Path) -> Result<()> {
        Ok(())
    }

    fn build_command(&self, hook: &Hook, _env_dir: Option<&Path>) -> Result<Invocation> {
        let entry = hook.entry.split()?;
        Ok(Invocation::Command(resolve_command(entry, None)))
    }

    fn build_env(&self, _hook: &Hook, _env_dir: Option<&Path>) -> Result<Vec<EnvChange>> {
        Ok(vec![])
    }
}
