use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::FxHashSet;
use thiserror::Error;

use grapnel_consts::MANIFEST_FILE;

use crate::config::{
    self, Config, ConfigHook, FilePattern, Language, LocalHook, ManifestHook, MetaHook, Stage,
    read_manifest,
};

#[derive(Error, Debug)]
pub(crate) enum Error {
    #[error(transparent)]
    Config(#[from] config::Error),

    #[error("Hook `{hook}` is not present in repository `{repo}`")]
    HookNotFound { hook: String, repo: String },

    #[error("Invalid hook `{hook}`: {reason}")]
    InvalidHook { hook: String, reason: String },

    #[error("Failed to read manifest of `{repo}`")]
    Manifest {
        repo: String,
        #[source]
        error: config::Error,
    },
}

/// A resolved source of hook definitions.
#[derive(Debug, Clone)]
pub(crate) enum Repo {
    Remote {
        /// Path to the cached clone.
        path: PathBuf,
        url: String,
        rev: String,
        hooks: Vec<ManifestHook>,
    },
    Local {
        hooks: Vec<ManifestHook>,
    },
    Meta {
        hooks: Vec<ManifestHook>,
    },
}

impl Repo {
    /// Load a remote repo's manifest from its cached clone.
    pub(crate) fn remote(url: String, rev: String, path: PathBuf) -> Result<Self, Error> {
        let manifest = read_manifest(&path.join(MANIFEST_FILE)).map_err(|e| Error::Manifest {
            repo: url.clone(),
            error: e,
        })?;

        Ok(Self::Remote {
            path,
            url,
            rev,
            hooks: manifest.hooks,
        })
    }

    /// Construct a local repo from inline hook definitions.
    pub(crate) fn local(hooks: Vec<LocalHook>) -> Self {
        Self::Local { hooks }
    }

    /// Construct the meta repo: its manifest is built in.
    pub(crate) fn meta(hooks: &[MetaHook]) -> Self {
        let hooks = hooks
            .iter()
            .map(|hook| meta_manifest_hook(&hook.0.id))
            .collect();
        Self::Meta { hooks }
    }

    /// Get the path to the cached clone if this is a remote repo.
    pub(crate) fn path(&self) -> Option<&Path> {
        match self {
            Repo::Remote { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Get a declared hook by id.
    pub(crate) fn get_hook(&self, id: &str) -> Option<&ManifestHook> {
        let hooks = match self {
            Repo::Remote { hooks, .. } | Repo::Local { hooks } | Repo::Meta { hooks } => hooks,
        };
        hooks.iter().find(|hook| hook.id == id)
    }
}

impl Display for Repo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Repo::Remote { url, rev, .. } => write!(f, "{url}@{rev}"),
            Repo::Local { .. } => write!(f, "local"),
            Repo::Meta { .. } => write!(f, "meta"),
        }
    }
}

/// The built-in manifest entry for a meta hook id.
fn meta_manifest_hook(id: &str) -> ManifestHook {
    let mut options = config::HookOptions::default();
    match id {
        "check-hooks-apply" | "check-useless-excludes" => {
            options.files = FilePattern::new(r"^\.pre-commit-config\.(yaml|yml)$").ok();
        }
        "identity" => {
            options.verbose = Some(true);
        }
        _ => {}
    }
    ManifestHook {
        id: id.to_string(),
        name: id.to_string(),
        entry: String::new(),
        language: Language::System,
        options,
    }
}

/// The stages a hook participates in. Absent configuration means all.
#[derive(Debug, Clone)]
pub(crate) enum Stages {
    All,
    Some(FxHashSet<Stage>),
}

impl Stages {
    pub(crate) fn contains(&self, stage: Stage) -> bool {
        match self {
            Stages::All => true,
            Stages::Some(stages) => stages.contains(&stage),
        }
    }
}

/// A hook `entry`: the command string declared by the hook author.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    hook: String,
    entry: String,
}

impl Entry {
    pub(crate) fn new(hook: String, entry: String) -> Self {
        Self { hook, entry }
    }

    /// Split the entry into argv tokens.
    pub(crate) fn split(&self) -> Result<Vec<String>, Error> {
        let splits = shlex::split(&self.entry).ok_or_else(|| Error::InvalidHook {
            hook: self.hook.clone(),
            reason: format!("Failed to parse entry `{}` as commands", &self.entry),
        })?;
        if splits.is_empty() {
            return Err(Error::InvalidHook {
                hook: self.hook.clone(),
                reason: "entry is empty".to_string(),
            });
        }
        Ok(splits)
    }

    pub(crate) fn raw(&self) -> &str {
        &self.entry
    }
}

/// An effective hook: the repo-declared definition joined with the user's
/// config overrides, with defaults filled in.
#[derive(Debug, Clone)]
pub(crate) struct Hook {
    repo: Arc<Repo>,

    /// The position of the hook in the configuration file.
    pub idx: usize,
    pub id: String,
    pub name: String,
    pub entry: Entry,
    pub language: Language,
    pub alias: Option<String>,
    pub files: Option<FilePattern>,
    pub exclude: Option<FilePattern>,
    pub types: Vec<String>,
    pub types_or: Vec<String>,
    pub exclude_types: Vec<String>,
    pub additional_dependencies: Vec<String>,
    pub args: Vec<String>,
    pub always_run: bool,
    pub fail_fast: bool,
    pub pass_filenames: bool,
    /// The resolved language version token; the adapter's default when the
    /// hook and config are both silent.
    pub language_version: String,
    pub log_file: Option<String>,
    pub require_serial: bool,
    pub stages: Stages,
    pub verbose: bool,
}

impl Display for Hook {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if f.alternate() {
            write!(f, "{}:{}", self.repo, self.id)
        } else {
            write!(f, "{}", self.id)
        }
    }
}

impl Hook {
    /// Get the path to the cached clone that declares this hook.
    pub(crate) fn repo_path(&self) -> Option<&Path> {
        self.repo.path()
    }

    pub(crate) fn is_meta(&self) -> bool {
        matches!(&*self.repo, Repo::Meta { .. })
    }
}

/// Resolve every hook declared by a config, in declaration order.
///
/// Remote repos are cloned into the store on first use; `local` and `meta`
/// repos resolve without one.
pub(crate) async fn hooks_from_config(
    config: &Config,
    store: &crate::store::Store,
    reporter: Option<&crate::cli::reporter::PrepareReporter>,
) -> anyhow::Result<Vec<Hook>> {
    let mut hooks = Vec::new();
    let mut idx = 0;

    for repo_config in &config.repos {
        match repo_config {
            config::Repo::Remote(remote) => {
                let path = store.clone_or_get(remote, reporter).await?;
                let repo = Arc::new(Repo::remote(
                    remote.repo.clone(),
                    remote.rev.clone(),
                    path,
                )?);
                for config_hook in &remote.hooks {
                    let mut builder = HookBuilder::from_repo(repo.clone(), config_hook, idx)?;
                    builder.apply_config_defaults(config);
                    hooks.push(builder.build()?);
                    idx += 1;
                }
            }
            config::Repo::Local(local) => {
                let repo = Arc::new(Repo::local(local.hooks.clone()));
                for definition in &local.hooks {
                    let mut builder =
                        HookBuilder::from_local(repo.clone(), definition.clone(), idx);
                    builder.apply_config_defaults(config);
                    hooks.push(builder.build()?);
                    idx += 1;
                }
            }
            config::Repo::Meta(meta) => {
                let repo = Arc::new(Repo::meta(&meta.hooks));
                for meta_hook in &meta.hooks {
                    let mut builder = HookBuilder::from_repo(repo.clone(), &meta_hook.0, idx)?;
                    builder.apply_config_defaults(config);
                    hooks.push(builder.build()?);
                    idx += 1;
                }
            }
        }
    }

    Ok(hooks)
}

#[derive(Debug)]
pub(crate) struct HookBuilder {
    repo: Arc<Repo>,
    definition: ManifestHook,
    idx: usize,
}

impl HookBuilder {
    /// Start from the repo-declared definition for `config_hook.id`.
    ///
    /// For `local` repos the user's hook entry itself is the complete
    /// definition, so the manifest lookup is skipped by the caller.
    pub(crate) fn from_repo(
        repo: Arc<Repo>,
        config_hook: &ConfigHook,
        idx: usize,
    ) -> Result<Self, Error> {
        let Some(definition) = repo.get_hook(&config_hook.id) else {
            return Err(Error::HookNotFound {
                hook: config_hook.id.clone(),
                repo: repo.to_string(),
            });
        };
        let mut builder = Self {
            definition: definition.clone(),
            repo,
            idx,
        };
        builder.apply_overrides(config_hook);
        Ok(builder)
    }

    /// A local hook: the inline definition is already complete.
    pub(crate) fn from_local(repo: Arc<Repo>, definition: LocalHook, idx: usize) -> Self {
        Self {
            repo,
            definition,
            idx,
        }
    }

    /// Join the user's per-hook overrides onto the repo-declared definition.
    fn apply_overrides(&mut self, config_hook: &ConfigHook) {
        debug_assert_eq!(self.definition.id, config_hook.id);

        if let Some(name) = &config_hook.name {
            if !name.is_empty() {
                self.definition.name.clone_from(name);
            }
        }
        if let Some(entry) = &config_hook.entry {
            if !entry.is_empty() {
                self.definition.entry.clone_from(entry);
            }
        }
        if let Some(language) = config_hook.language {
            self.definition.language = language;
        }
        self.definition.options.update(&config_hook.options);
    }

    /// Fill in configuration-wide defaults for fields the hook leaves unset.
    pub(crate) fn apply_config_defaults(&mut self, config: &Config) {
        let options = &mut self.definition.options;
        if options
            .language_version
            .as_ref()
            .is_none_or(String::is_empty)
        {
            options.language_version = config
                .default_language_version
                .as_ref()
                .and_then(|versions| versions.get(&self.definition.language).cloned());
        }
        if options.stages.is_none() {
            options.stages.clone_from(&config.default_stages);
        }
    }

    fn check(&self) -> Result<(), Error> {
        let language = self.definition.language;
        if !crate::languages::supported(language) {
            return Err(Error::InvalidHook {
                hook: self.definition.id.clone(),
                reason: format!("language `{language}` is not supported"),
            });
        }
        if self.definition.entry.is_empty()
            && language != Language::Fail
            && !matches!(&*self.repo, Repo::Meta { .. })
        {
            return Err(Error::InvalidHook {
                hook: self.definition.id.clone(),
                reason: "missing `entry`".to_string(),
            });
        }

        let deps = self
            .definition
            .options
            .additional_dependencies
            .as_deref()
            .unwrap_or(&[]);
        if !deps.is_empty() && !crate::languages::supports_dependencies(language) {
            return Err(Error::InvalidHook {
                hook: self.definition.id.clone(),
                reason: format!(
                    "`additional_dependencies` is not supported for language `{language}`"
                ),
            });
        }

        Ok(())
    }

    /// Produce the effective hook.
    pub(crate) fn build(self) -> Result<Hook, Error> {
        self.check()?;

        let ManifestHook {
            id,
            name,
            entry,
            language,
            options,
        } = self.definition;

        let stages = match options.stages {
            Some(stages) if !stages.is_empty() => {
                Stages::Some(stages.into_iter().collect::<FxHashSet<_>>())
            }
            _ => Stages::All,
        };

        let language_version = options
            .language_version
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| crate::languages::default_version_token(language).to_string());

        let entry = Entry::new(id.clone(), entry);

        Ok(Hook {
            repo: self.repo,
            idx: self.idx,
            id,
            name,
            entry,
            language,
            alias: options.alias,
            files: options.files,
            exclude: options.exclude,
            types: options.types.unwrap_or_else(|| vec!["file".to_string()]),
            types_or: options.types_or.unwrap_or_default(),
            exclude_types: options.exclude_types.unwrap_or_default(),
            additional_dependencies: options.additional_dependencies.unwrap_or_default(),
            args: options.args.unwrap_or_default(),
            always_run: options.always_run.unwrap_or(false),
            fail_fast: options.fail_fast.unwrap_or(false),
            pass_filenames: options.pass_filenames.unwrap_or(true),
            language_version,
            log_file: options.log_file,
            require_serial: options.require_serial.unwrap_or(false),
            stages,
            verbose: options.verbose.unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HookOptions;

    fn manifest_hook(id: &str) -> ManifestHook {
        ManifestHook {
            id: id.to_string(),
            name: format!("{id} name"),
            entry: "echo".to_string(),
            language: Language::System,
            options: HookOptions::default(),
        }
    }

    fn config_hook(id: &str) -> ConfigHook {
        ConfigHook {
            id: id.to_string(),
            name: None,
            entry: None,
            language: None,
            options: HookOptions::default(),
        }
    }

    #[test]
    fn unknown_hook_id_is_an_error() {
        let repo = Arc::new(Repo::Remote {
            path: PathBuf::from("/cache/repo0"),
            url: "https://example.com/hooks".to_string(),
            rev: "v1".to_string(),
            hooks: vec![manifest_hook("known")],
        });

        let err = HookBuilder::from_repo(repo, &config_hook("unknown"), 0).unwrap_err();
        assert!(matches!(err, Error::HookNotFound { .. }), "{err}");
    }

    #[test]
    fn overrides_replace_defaults_survive() {
        let repo = Arc::new(Repo::Remote {
            path: PathBuf::from("/cache/repo0"),
            url: "https://example.com/hooks".to_string(),
            rev: "v1".to_string(),
            hooks: vec![ManifestHook {
                options: HookOptions {
                    args: Some(vec!["--strict".to_string()]),
                    always_run: Some(true),
                    ..Default::default()
                },
                ..manifest_hook("fmt")
            }],
        });

        let mut user = config_hook("fmt");
        user.name = Some("custom".to_string());
        user.options.args = Some(vec!["--fast".to_string()]);
        user.options.always_run = Some(false);

        let hook = HookBuilder::from_repo(repo, &user, 3)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(hook.idx, 3);
        assert_eq!(hook.name, "custom");
        assert_eq!(hook.args, vec!["--fast".to_string()]);
        // User `false` does not clobber repo `true`.
        assert!(hook.always_run);
        // Defaults fill in.
        assert!(hook.pass_filenames);
        assert!(!hook.require_serial);
        assert_eq!(hook.types, vec!["file".to_string()]);
    }

    #[test]
    fn language_version_fallback_chain() {
        let repo = Arc::new(Repo::Local {
            hooks: vec![manifest_hook("x")],
        });

        let mut definition = manifest_hook("x");
        definition.language = Language::Python;
        let mut builder = HookBuilder::from_local(repo.clone(), definition, 0);

        let config: Config = serde_yaml::from_str(indoc::indoc! {r"
            repos: []
            default_language_version:
              python: '3.12'
        "})
        .unwrap();
        builder.apply_config_defaults(&config);
        let hook = builder.build().unwrap();
        assert_eq!(hook.language_version, "3.12");

        // Without a config default, the adapter default token applies.
        let mut definition = manifest_hook("x");
        definition.language = Language::Python;
        let builder = HookBuilder::from_local(repo, definition, 0);
        let hook = builder.build().unwrap();
        assert_eq!(hook.language_version, "default");
    }

    #[test]
    fn entry_required_unless_fail() {
        let repo = Arc::new(Repo::Local { hooks: vec![] });

        let mut definition = manifest_hook("block");
        definition.entry = String::new();
        definition.language = Language::Fail;
        // `fail` hooks don't need an entry command to run.
        let mut ok = definition.clone();
        ok.entry = "files must not be named this".to_string();
        assert!(
            HookBuilder::from_local(repo.clone(), ok, 0).build().is_ok()
        );
        assert!(
            HookBuilder::from_local(repo.clone(), definition, 0)
                .build()
                .is_ok()
        );

        let mut definition = manifest_hook("x");
        definition.entry = String::new();
        let err = HookBuilder::from_local(repo, definition, 0)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidHook { .. }), "{err}");
    }

    #[test]
    fn stages_default_to_all() {
        let repo = Arc::new(Repo::Local { hooks: vec![] });
        let hook = HookBuilder::from_local(repo, manifest_hook("x"), 0)
            .build()
            .unwrap();
        assert!(hook.stages.contains(Stage::PreCommit));
        assert!(hook.stages.contains(Stage::PrePush));
        assert!(hook.stages.contains(Stage::Manual));
    }
}
