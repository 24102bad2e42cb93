use std::ffi::OsString;

use tracing::info;

pub struct EnvVars;

impl EnvVars {
    pub const PATH: &'static str = "PATH";
    pub const HOME: &'static str = "HOME";
    pub const TERM: &'static str = "TERM";
    pub const TMPDIR: &'static str = "TMPDIR";
    pub const NO_COLOR: &'static str = "NO_COLOR";
    pub const XDG_CACHE_HOME: &'static str = "XDG_CACHE_HOME";

    // Git related
    pub const GIT_DIR: &'static str = "GIT_DIR";
    pub const GIT_WORK_TREE: &'static str = "GIT_WORK_TREE";
    pub const GIT_TERMINAL_PROMPT: &'static str = "GIT_TERMINAL_PROMPT";

    pub const SKIP: &'static str = "SKIP";

    // Grapnel specific environment variables, public for users
    pub const GRAPNEL_HOME: &'static str = "GRAPNEL_HOME";
    pub const GRAPNEL_ALLOW_NO_CONFIG: &'static str = "GRAPNEL_ALLOW_NO_CONFIG";
    pub const GRAPNEL_NO_CONCURRENCY: &'static str = "GRAPNEL_NO_CONCURRENCY";

    // Grapnel internal environment variables
    pub const GRAPNEL_INTERNAL__SORT_FILENAMES: &'static str = "GRAPNEL_INTERNAL__SORT_FILENAMES";
    pub const GRAPNEL_INTERNAL__SKIP_POST_CHECKOUT: &'static str =
        "GRAPNEL_INTERNAL__SKIP_POST_CHECKOUT";

    // Variables exported into hook processes
    pub const PRE_COMMIT: &'static str = "PRE_COMMIT";
    pub const PRE_COMMIT_HOOK_STAGE: &'static str = "PRE_COMMIT_HOOK_STAGE";
    pub const PRE_COMMIT_ORIGIN: &'static str = "PRE_COMMIT_ORIGIN";
    pub const PRE_COMMIT_SOURCE: &'static str = "PRE_COMMIT_SOURCE";
    pub const PRE_COMMIT_FROM_REF: &'static str = "PRE_COMMIT_FROM_REF";
    pub const PRE_COMMIT_TO_REF: &'static str = "PRE_COMMIT_TO_REF";
    pub const PRE_COMMIT_LOCAL_BRANCH: &'static str = "PRE_COMMIT_LOCAL_BRANCH";
    pub const PRE_COMMIT_REMOTE_BRANCH: &'static str = "PRE_COMMIT_REMOTE_BRANCH";
    pub const PRE_COMMIT_REMOTE_NAME: &'static str = "PRE_COMMIT_REMOTE_NAME";
    pub const PRE_COMMIT_REMOTE_URL: &'static str = "PRE_COMMIT_REMOTE_URL";
    pub const PRE_COMMIT_COMMIT_MSG_FILENAME: &'static str = "PRE_COMMIT_COMMIT_MSG_FILENAME";
    pub const PRE_COMMIT_COMMIT_MSG_SOURCE: &'static str = "PRE_COMMIT_COMMIT_MSG_SOURCE";
    pub const PRE_COMMIT_COMMIT_OBJECT_NAME: &'static str = "PRE_COMMIT_COMMIT_OBJECT_NAME";
    pub const PRE_COMMIT_CHECKOUT_TYPE: &'static str = "PRE_COMMIT_CHECKOUT_TYPE";
    pub const PRE_COMMIT_IS_SQUASH_MERGE: &'static str = "PRE_COMMIT_IS_SQUASH_MERGE";
    pub const PRE_COMMIT_REWRITE_COMMAND: &'static str = "PRE_COMMIT_REWRITE_COMMAND";
    pub const PRE_COMMIT_PRE_REBASE_UPSTREAM: &'static str = "PRE_COMMIT_PRE_REBASE_UPSTREAM";
    pub const PRE_COMMIT_PRE_REBASE_BRANCH: &'static str = "PRE_COMMIT_PRE_REBASE_BRANCH";

    // Language environment activation
    pub const VIRTUAL_ENV: &'static str = "VIRTUAL_ENV";
    pub const PYTHONHOME: &'static str = "PYTHONHOME";
    pub const NPM_CONFIG_PREFIX: &'static str = "NPM_CONFIG_PREFIX";
    pub const NODE_PATH: &'static str = "NODE_PATH";
    pub const GEM_HOME: &'static str = "GEM_HOME";
    pub const GEM_PATH: &'static str = "GEM_PATH";
    pub const BUNDLE_IGNORE_CONFIG: &'static str = "BUNDLE_IGNORE_CONFIG";
    pub const GOPATH: &'static str = "GOPATH";
    pub const GOBIN: &'static str = "GOBIN";
    pub const GOFLAGS: &'static str = "GOFLAGS";
    pub const GOTOOLCHAIN: &'static str = "GOTOOLCHAIN";
    pub const CARGO_HOME: &'static str = "CARGO_HOME";
    pub const RUSTUP_TOOLCHAIN: &'static str = "RUSTUP_TOOLCHAIN";
}

impl EnvVars {
    // Pre-commit environment variables that we support for compatibility
    pub const PRE_COMMIT_HOME: &'static str = "PRE_COMMIT_HOME";
    const PRE_COMMIT_ALLOW_NO_CONFIG: &'static str = "PRE_COMMIT_ALLOW_NO_CONFIG";
    const PRE_COMMIT_NO_CONCURRENCY: &'static str = "PRE_COMMIT_NO_CONCURRENCY";
}

impl EnvVars {
    /// Read an environment variable, falling back to the pre-commit corresponding
    /// variable if not found.
    pub fn var_os(name: &str) -> Option<OsString> {
        std::env::var_os(name).or_else(|| {
            let name = Self::pre_commit_name(name)?;
            let val = std::env::var_os(name)?;
            info!("Falling back to pre-commit environment variable {name}");
            Some(val)
        })
    }

    pub fn is_set(name: &str) -> bool {
        Self::var_os(name).is_some()
    }

    pub fn var(name: &str) -> Result<String, std::env::VarError> {
        match Self::var_os(name) {
            Some(s) => s.into_string().map_err(std::env::VarError::NotUnicode),
            None => Err(std::env::VarError::NotPresent),
        }
    }

    fn pre_commit_name(name: &str) -> Option<&str> {
        match name {
            Self::GRAPNEL_HOME => Some(Self::PRE_COMMIT_HOME),
            Self::GRAPNEL_ALLOW_NO_CONFIG => Some(Self::PRE_COMMIT_ALLOW_NO_CONFIG),
            Self::GRAPNEL_NO_CONCURRENCY => Some(Self::PRE_COMMIT_NO_CONCURRENCY),
            _ => None,
        }
    }
}

/// Prepend paths to the current `$PATH`, returning the joined result.
pub fn prepend_paths(paths: &[&std::path::Path]) -> Result<OsString, std::env::JoinPathsError> {
    std::env::join_paths(
        paths.iter().map(|p| p.to_path_buf()).chain(
            EnvVars::var_os(EnvVars::PATH)
                .as_ref()
                .iter()
                .flat_map(std::env::split_paths),
        ),
    )
}
