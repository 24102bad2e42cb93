use std::collections::BTreeMap;
use std::fmt::Display;
use std::ops::RangeInclusive;
use std::path::Path;

use fancy_regex::Regex;
use itertools::Itertools;
use owo_colors::OwoColorize;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::instrument;

use grapnel_consts::{ALT_CONFIG_FILE, CONFIG_FILE};

use crate::fs::Simplified;
use crate::version;
use crate::warn_user;

/// A file pattern: a python-compatible regular expression.
///
/// The original pattern string is retained so that empty overrides can be
/// distinguished from absent ones and for display.
#[derive(Debug, Clone)]
pub(crate) struct FilePattern {
    pattern: String,
    regex: Regex,
}

impl FilePattern {
    pub(crate) fn new(pattern: &str) -> Result<Self, fancy_regex::Error> {
        Ok(Self {
            pattern: pattern.to_string(),
            regex: Regex::new(pattern)?,
        })
    }

    pub(crate) fn is_match(&self, s: &str) -> bool {
        self.regex.is_match(s).unwrap_or(false)
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.pattern
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pattern.is_empty()
    }
}

impl Display for FilePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.pattern)
    }
}

impl<'de> Deserialize<'de> for FilePattern {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let pattern = String::deserialize(deserializer)?;
        FilePattern::new(&pattern).map_err(|e| {
            serde::de::Error::custom(format!("Invalid regex pattern `{pattern}`: {e}"))
        })
    }
}

impl Serialize for FilePattern {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.pattern)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Language {
    Conda,
    Coursier,
    Dart,
    Docker,
    DockerImage,
    Dotnet,
    Fail,
    Golang,
    Haskell,
    Lua,
    Node,
    Perl,
    Python,
    Python2,
    R,
    Ruby,
    Rust,
    Swift,
    Pygrep,
    #[serde(alias = "unsupported_script")]
    Script,
    #[serde(alias = "unsupported")]
    System,
}

impl Language {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Conda => "conda",
            Self::Coursier => "coursier",
            Self::Dart => "dart",
            Self::Docker => "docker",
            Self::DockerImage => "docker_image",
            Self::Dotnet => "dotnet",
            Self::Fail => "fail",
            Self::Golang => "golang",
            Self::Haskell => "haskell",
            Self::Lua => "lua",
            Self::Node => "node",
            Self::Perl => "perl",
            Self::Python => "python",
            Self::Python2 => "python2",
            Self::R => "r",
            Self::Ruby => "ruby",
            Self::Rust => "rust",
            Self::Swift => "swift",
            Self::Pygrep => "pygrep",
            Self::Script => "script",
            Self::System => "system",
        }
    }
}

impl Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The git hook classes grapnel can install a shim for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum HookType {
    CommitMsg,
    PostCheckout,
    PostCommit,
    PostMerge,
    PostRewrite,
    #[default]
    PreCommit,
    PreMergeCommit,
    PrePush,
    PreRebase,
    PrepareCommitMsg,
}

impl HookType {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::CommitMsg => "commit-msg",
            Self::PostCheckout => "post-checkout",
            Self::PostCommit => "post-commit",
            Self::PostMerge => "post-merge",
            Self::PostRewrite => "post-rewrite",
            Self::PreCommit => "pre-commit",
            Self::PreMergeCommit => "pre-merge-commit",
            Self::PrePush => "pre-push",
            Self::PreRebase => "pre-rebase",
            Self::PrepareCommitMsg => "prepare-commit-msg",
        }
    }

    /// The number of positional arguments git passes to this hook type.
    pub(crate) fn num_args(self) -> RangeInclusive<usize> {
        match self {
            Self::CommitMsg => 1..=1,
            Self::PostCheckout => 3..=3,
            Self::PreCommit | Self::PostCommit | Self::PreMergeCommit => 0..=0,
            Self::PostMerge | Self::PostRewrite => 1..=1,
            Self::PrePush => 2..=2,
            Self::PreRebase => 1..=2,
            Self::PrepareCommitMsg => 1..=3,
        }
    }
}

impl Display for HookType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Deserialize, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum Stage {
    Manual,
    CommitMsg,
    PostCheckout,
    PostCommit,
    PostMerge,
    PostRewrite,
    #[default]
    #[serde(alias = "commit")]
    PreCommit,
    #[serde(alias = "merge-commit")]
    PreMergeCommit,
    #[serde(alias = "push")]
    PrePush,
    PreRebase,
    PrepareCommitMsg,
}

impl From<HookType> for Stage {
    fn from(value: HookType) -> Self {
        match value {
            HookType::CommitMsg => Self::CommitMsg,
            HookType::PostCheckout => Self::PostCheckout,
            HookType::PostCommit => Self::PostCommit,
            HookType::PostMerge => Self::PostMerge,
            HookType::PostRewrite => Self::PostRewrite,
            HookType::PreCommit => Self::PreCommit,
            HookType::PreMergeCommit => Self::PreMergeCommit,
            HookType::PrePush => Self::PrePush,
            HookType::PreRebase => Self::PreRebase,
            HookType::PrepareCommitMsg => Self::PrepareCommitMsg,
        }
    }
}

impl Stage {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::CommitMsg => "commit-msg",
            Self::PostCheckout => "post-checkout",
            Self::PostCommit => "post-commit",
            Self::PostMerge => "post-merge",
            Self::PostRewrite => "post-rewrite",
            Self::PreCommit => "pre-commit",
            Self::PreMergeCommit => "pre-merge-commit",
            Self::PrePush => "pre-push",
            Self::PreRebase => "pre-rebase",
            Self::PrepareCommitMsg => "prepare-commit-msg",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common hook options, shared between manifest hooks and config overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct HookOptions {
    pub alias: Option<String>,
    /// The pattern of files to run on.
    pub files: Option<FilePattern>,
    /// Exclude files that were matched by `files`.
    pub exclude: Option<FilePattern>,
    /// List of file types to run on (AND).
    #[serde(deserialize_with = "deserialize_and_validate_tags", default)]
    pub types: Option<Vec<String>>,
    /// List of file types to run on (OR).
    #[serde(deserialize_with = "deserialize_and_validate_tags", default)]
    pub types_or: Option<Vec<String>>,
    /// List of file types to exclude.
    #[serde(deserialize_with = "deserialize_and_validate_tags", default)]
    pub exclude_types: Option<Vec<String>>,
    pub additional_dependencies: Option<Vec<String>>,
    /// Additional arguments to pass to the hook.
    pub args: Option<Vec<String>>,
    /// This hook will run even if there are no matching files.
    /// Default is false.
    pub always_run: Option<bool>,
    /// If this hook fails, don't run any more hooks.
    /// Default is false.
    pub fail_fast: Option<bool>,
    /// Append filenames that would be checked to the hook entry as arguments.
    /// Default is true.
    pub pass_filenames: Option<bool>,
    /// A description of the hook. For metadata only.
    pub description: Option<String>,
    /// Run the hook on a specific version of the language.
    pub language_version: Option<String>,
    /// Write the output of the hook to a file when the hook fails or verbose
    /// is enabled.
    pub log_file: Option<String>,
    /// This hook will execute using a single process instead of in parallel.
    /// Default is false.
    pub require_serial: Option<bool>,
    /// Select which git hook(s) to run for.
    /// Default all stages are selected.
    pub stages: Option<Vec<Stage>>,
    /// Print the output of the hook even if it passes.
    /// Default is false.
    pub verbose: Option<bool>,
    /// The minimum version of grapnel required to run this hook.
    #[serde(deserialize_with = "deserialize_and_validate_minimum_version", default)]
    pub minimum_pre_commit_version: Option<String>,
    #[serde(flatten)]
    pub _unused_keys: BTreeMap<String, serde_json::Value>,
}

impl HookOptions {
    /// Apply overrides from a user config onto repo-declared options.
    ///
    /// Strings and sequences are total replacements and only win when
    /// non-empty. A plain boolean `true` overrides but `false` never clobbers
    /// a repo-declared `true`. `pass_filenames` is an optional-bool: any
    /// explicitly set user value wins.
    pub(crate) fn update(&mut self, other: &Self) {
        macro_rules! update_if_nonempty {
            ($($field:ident),* $(,)?) => {
                $(
                if other.$field.as_ref().is_some_and(|v| !v.is_empty()) {
                    self.$field.clone_from(&other.$field);
                }
                )*
            };
        }
        macro_rules! update_bool {
            ($($field:ident),* $(,)?) => {
                $(
                if other.$field == Some(true) {
                    self.$field = Some(true);
                }
                )*
            };
        }

        update_if_nonempty!(
            alias,
            files,
            exclude,
            description,
            language_version,
            log_file,
            minimum_pre_commit_version,
            types,
            types_or,
            exclude_types,
            additional_dependencies,
            args,
            stages,
        );
        update_bool!(always_run, fail_fast, require_serial, verbose);

        if other.pass_filenames.is_some() {
            self.pass_filenames = other.pass_filenames;
        }
    }
}

/// A hook definition as declared in a repository manifest
/// (`.pre-commit-hooks.yaml`), or inline for `local` repos.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct ManifestHook {
    /// The id of the hook.
    pub id: String,
    /// The name of the hook.
    pub name: String,
    /// The command to run. It can contain arguments that will not be overridden.
    pub entry: String,
    /// The language of the hook. Tells grapnel how to install and run it.
    pub language: Language,
    #[serde(flatten)]
    pub options: HookOptions,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub(crate) struct Manifest {
    pub hooks: Vec<ManifestHook>,
}

/// A user-declared hook in the configuration file.
///
/// All keys of a manifest hook are valid, but only `id` is required; any other
/// present field overrides the repo-declared definition.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct ConfigHook {
    /// The id of the hook.
    pub id: String,
    /// Override the name of the hook.
    pub name: Option<String>,
    /// Override the entrypoint.
    pub entry: Option<String>,
    /// Override the language.
    pub language: Option<Language>,
    #[serde(flatten)]
    pub options: HookOptions,
}

/// A local hook is a complete hook definition given inline.
pub(crate) type LocalHook = ManifestHook;

pub(crate) const META_HOOK_IDS: &[&str] =
    &["check-hooks-apply", "check-useless-excludes", "identity"];

/// A hook of the `meta` repo: one of a small closed set of built-in
/// diagnostic hooks, always `language: system`.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "ConfigHook")]
pub(crate) struct MetaHook(pub(crate) ConfigHook);

#[derive(Debug, thiserror::Error)]
pub(crate) enum MetaHookError {
    #[error("Unknown meta hook id `{0}`")]
    UnknownId(String),

    #[error("`language` must be `system` for meta hooks")]
    InvalidLanguage,

    #[error("`entry` is not allowed for meta hooks")]
    EntryNotAllowed,
}

impl TryFrom<ConfigHook> for MetaHook {
    type Error = MetaHookError;

    fn try_from(hook: ConfigHook) -> Result<Self, Self::Error> {
        if !META_HOOK_IDS.contains(&hook.id.as_str()) {
            return Err(MetaHookError::UnknownId(hook.id));
        }
        if hook.language.is_some_and(|l| l != Language::System) {
            return Err(MetaHookError::InvalidLanguage);
        }
        if hook.entry.is_some() {
            return Err(MetaHookError::EntryNotAllowed);
        }

        Ok(MetaHook(hook))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RemoteRepo {
    pub repo: String,
    pub rev: String,
    pub hooks: Vec<ConfigHook>,
    #[serde(flatten)]
    _unused_keys: BTreeMap<String, serde_json::Value>,
}

impl PartialEq for RemoteRepo {
    fn eq(&self, other: &Self) -> bool {
        self.repo == other.repo && self.rev == other.rev
    }
}

impl Eq for RemoteRepo {}

impl std::hash::Hash for RemoteRepo {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.repo.hash(state);
        self.rev.hash(state);
    }
}

impl Display for RemoteRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.repo, self.rev)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LocalRepo {
    pub repo: String,
    pub hooks: Vec<LocalHook>,
    #[serde(flatten)]
    _unused_keys: BTreeMap<String, serde_json::Value>,
}

impl Display for LocalRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("local")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MetaRepo {
    pub repo: String,
    pub hooks: Vec<MetaHook>,
    #[serde(flatten)]
    _unused_keys: BTreeMap<String, serde_json::Value>,
}

impl Display for MetaRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("meta")
    }
}

/// A source of hooks: a remote git URL pinned at a rev, or the sentinels
/// `local` and `meta`. Dispatch is on the `repo` key.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "serde_json::Value")]
pub(crate) enum Repo {
    Remote(RemoteRepo),
    Local(LocalRepo),
    Meta(MetaRepo),
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum RepoWireError {
    #[error("missing field `repo`")]
    MissingRepo,

    #[error("`repo` must be a string")]
    RepoNotString,

    #[error("Invalid local repo: {0}")]
    InvalidLocal(String),

    #[error("Invalid meta repo: {0}")]
    InvalidMeta(String),

    #[error("Invalid remote repo: {0}")]
    InvalidRemote(String),
}

impl TryFrom<serde_json::Value> for Repo {
    type Error = RepoWireError;

    fn try_from(wire: serde_json::Value) -> Result<Self, Self::Error> {
        let location = wire
            .get("repo")
            .ok_or(RepoWireError::MissingRepo)?
            .as_str()
            .ok_or(RepoWireError::RepoNotString)?
            .to_string();

        match location.as_str() {
            "local" => LocalRepo::deserialize(wire)
                .map(Repo::Local)
                .map_err(|e| RepoWireError::InvalidLocal(e.to_string())),
            "meta" => MetaRepo::deserialize(wire)
                .map(Repo::Meta)
                .map_err(|e| RepoWireError::InvalidMeta(e.to_string())),
            _ => RemoteRepo::deserialize(wire)
                .map(Repo::Remote)
                .map_err(|e| RepoWireError::InvalidRemote(e.to_string())),
        }
    }
}

impl Display for Repo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Repo::Remote(repo) => repo.fmt(f),
            Repo::Local(repo) => repo.fmt(f),
            Repo::Meta(repo) => repo.fmt(f),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct Config {
    pub repos: Vec<Repo>,
    /// The `--hook-type`s installed by default when running `grapnel install`.
    /// Default is `[pre-commit]`.
    pub default_install_hook_types: Option<Vec<HookType>>,
    /// A mapping from language to the default `language_version`.
    pub default_language_version: Option<FxHashMap<Language, String>>,
    /// A configuration-wide default for the stages property of hooks.
    /// Default to all stages.
    pub default_stages: Option<Vec<Stage>>,
    /// Global file include pattern.
    pub files: Option<FilePattern>,
    /// Global file exclude pattern.
    pub exclude: Option<FilePattern>,
    /// Stop running hooks after the first failure.
    /// Default is false.
    pub fail_fast: Option<bool>,
    /// The minimum version of grapnel required to run this configuration.
    #[serde(deserialize_with = "deserialize_and_validate_minimum_version", default)]
    pub minimum_pre_commit_version: Option<String>,
    /// Settings for continuous-integration runners; passed through opaquely.
    pub ci: Option<serde_json::Value>,

    #[serde(flatten)]
    _unused_keys: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to parse `{0}`")]
    Yaml(String, #[source] serde_yaml::Error),
}

/// Find the config file in the given directory.
pub(crate) fn config_file_in(dir: &Path) -> Result<std::path::PathBuf, Error> {
    let main = dir.join(CONFIG_FILE);
    if main.try_exists()? {
        return Ok(main);
    }
    let alt = dir.join(ALT_CONFIG_FILE);
    if alt.try_exists()? {
        return Ok(alt);
    }
    Ok(main)
}

/// Whether the YAML document uses the old-style top-level list form.
pub(crate) fn is_old_style(content: &str) -> bool {
    matches!(
        serde_yaml::from_str::<serde_yaml::Value>(content),
        Ok(serde_yaml::Value::Sequence(_))
    )
}

/// Read the configuration file from the given path.
///
/// The legacy top-level list form (no `repos:` key) is accepted and read as
/// the `repos` sequence.
pub(crate) fn load_config(path: &Path) -> Result<Config, Error> {
    let content = match fs_err::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::NotFound(path.user_display().to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    let value: serde_yaml::Value = serde_yaml::from_str(&content)
        .map_err(|e| Error::Yaml(path.user_display().to_string(), e))?;

    let value = if let serde_yaml::Value::Sequence(repos) = value {
        warn_user!(
            "`{}` uses the legacy top-level list format, run `grapnel migrate-config` to update it",
            path.user_display().cyan()
        );
        let mut mapping = serde_yaml::Mapping::new();
        mapping.insert(
            serde_yaml::Value::String("repos".to_string()),
            serde_yaml::Value::Sequence(repos),
        );
        serde_yaml::Value::Mapping(mapping)
    } else {
        value
    };

    let config: Config = serde_yaml::from_value(value)
        .map_err(|e| Error::Yaml(path.user_display().to_string(), e))?;

    tracing::trace!(
        repos = config.repos.len(),
        minimum_version = ?config.minimum_pre_commit_version,
        has_ci_block = config.ci.is_some(),
        "Loaded config",
    );

    Ok(config)
}

/// Read the configuration file from the given path, and warn about certain issues.
#[instrument(level = "trace")]
pub(crate) fn read_config(path: &Path) -> Result<Config, Error> {
    let config = load_config(path)?;

    // Check for mutable revs and warn the user.
    let mutable = config
        .repos
        .iter()
        .filter_map(|repo| {
            if let Repo::Remote(repo) = repo {
                let rev = &repo.rev;
                // A rev is considered mutable if it doesn't contain a '.' (like a version)
                // and is not a hexadecimal string (like a commit SHA).
                if !rev.contains('.') && !looks_like_sha(rev) {
                    return Some(repo);
                }
            }
            None
        })
        .collect::<Vec<_>>();
    if !mutable.is_empty() {
        let msg = mutable
            .iter()
            .map(|repo| format!("{}: {}", repo.repo.cyan(), repo.rev.yellow()))
            .join("\n");
        warn_user!(
            "The following repos have mutable `rev` fields (moving tag / branch):\n{msg}\n\
             Mutable references are never updated after first install and are not supported."
        );
    }

    for repo in &config.repos {
        let languages: Box<dyn Iterator<Item = Language>> = match repo {
            Repo::Local(local) => Box::new(local.hooks.iter().map(|h| h.language)),
            Repo::Remote(remote) => Box::new(remote.hooks.iter().filter_map(|h| h.language)),
            Repo::Meta(_) => Box::new(std::iter::empty()),
        };
        for language in languages {
            if language == Language::Python2 {
                crate::warn_user_once!(
                    "`language: python2` is deprecated and will be treated as `python`"
                );
            }
        }
    }

    Ok(config)
}

/// Read the repository manifest (`.pre-commit-hooks.yaml`) from the given path.
///
/// An empty sequence is a valid manifest with zero hooks.
pub(crate) fn read_manifest(path: &Path) -> Result<Manifest, Error> {
    let content = fs_err::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Manifest { hooks: vec![] });
    }
    let manifest = serde_yaml::from_str(&content)
        .map_err(|e| Error::Yaml(path.user_display().to_string(), e))?;
    Ok(manifest)
}

/// Check if a string looks like a git SHA.
fn looks_like_sha(s: &str) -> bool {
    !s.is_empty() && s.as_bytes().iter().all(u8::is_ascii_hexdigit)
}

fn deserialize_and_validate_minimum_version<'de, D>(
    deserializer: D,
) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(s) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if s.is_empty() {
        return Ok(None);
    }

    let Ok(required) = s.parse::<semver::Version>() else {
        // pre-commit version strings in the wild are not always semver;
        // only enforce the check for ones we can parse.
        return Ok(Some(s));
    };
    let current = version::version()
        .parse::<semver::Version>()
        .expect("Invalid grapnel version");
    if required > current {
        return Err(serde::de::Error::custom(format!(
            "Required minimum version `{required}` is greater than current version `{current}`"
        )));
    }

    Ok(Some(s))
}

/// Deserializes a vector of strings and validates that each is a known file type tag.
fn deserialize_and_validate_tags<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let tags: Option<Vec<String>> = Option::deserialize(deserializer)?;
    if let Some(tags) = &tags {
        for tag in tags {
            if !crate::identify::is_known_tag(tag) {
                return Err(serde::de::Error::custom(format!(
                    "Type tag `{tag}` is not recognized"
                )));
            }
        }
    }
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_local_repo() {
        let yaml = indoc::indoc! {r"
            repos:
              - repo: local
                hooks:
                  - id: cargo-fmt
                    name: cargo fmt
                    entry: cargo fmt --
                    language: system
        "};
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.repos.len(), 1);
        let Repo::Local(local) = &config.repos[0] else {
            panic!("expected local repo");
        };
        assert_eq!(local.hooks[0].id, "cargo-fmt");
        assert_eq!(local.hooks[0].language, Language::System);
    }

    #[test]
    fn parse_remote_repo_requires_rev() {
        let yaml = indoc::indoc! {r"
            repos:
              - repo: https://github.com/psf/black
                hooks:
                  - id: black
        "};
        let err = serde_yaml::from_str::<Config>(yaml).unwrap_err();
        assert!(err.to_string().contains("rev"), "{err}");
    }

    #[test]
    fn parse_meta_repo_rejects_unknown_id() {
        let yaml = indoc::indoc! {r"
            repos:
              - repo: meta
                hooks:
                  - id: not-a-meta-hook
        "};
        let err = serde_yaml::from_str::<Config>(yaml).unwrap_err();
        assert!(err.to_string().contains("Unknown meta hook"), "{err}");

        let yaml = indoc::indoc! {r"
            repos:
              - repo: meta
                hooks:
                  - id: identity
        "};
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let Repo::Meta(meta) = &config.repos[0] else {
            panic!("expected meta repo");
        };
        assert_eq!(meta.hooks[0].0.id, "identity");
    }

    #[test]
    fn invalid_regex_is_rejected() {
        let yaml = indoc::indoc! {r"
            repos:
              - repo: local
                hooks:
                  - id: x
                    name: x
                    entry: 'true'
                    language: system
                    files: '['
        "};
        let err = serde_yaml::from_str::<Config>(yaml).unwrap_err();
        assert!(err.to_string().contains("Invalid regex"), "{err}");
    }

    #[test]
    fn option_update_string_and_sequence_overrides() {
        let mut base = HookOptions {
            args: Some(vec!["--base".to_string()]),
            language_version: Some("3.10".to_string()),
            ..Default::default()
        };
        let overrides = HookOptions {
            args: Some(vec!["--override".to_string()]),
            language_version: Some(String::new()),
            types: Some(vec!["python".to_string()]),
            ..Default::default()
        };
        base.update(&overrides);

        // Non-empty sequence replaces; empty string does not clobber.
        assert_eq!(base.args.as_deref(), Some(&["--override".to_string()][..]));
        assert_eq!(base.language_version.as_deref(), Some("3.10"));
        assert_eq!(base.types.as_deref(), Some(&["python".to_string()][..]));
    }

    #[test]
    fn option_update_bool_rules() {
        let mut base = HookOptions {
            always_run: Some(true),
            pass_filenames: Some(true),
            ..Default::default()
        };
        let overrides = HookOptions {
            always_run: Some(false),
            pass_filenames: Some(false),
            ..Default::default()
        };
        base.update(&overrides);

        // `false` never clobbers a repo-declared `true`...
        assert_eq!(base.always_run, Some(true));
        // ...except for the optional-bool `pass_filenames`, where any explicit
        // user value wins.
        assert_eq!(base.pass_filenames, Some(false));
    }

    #[test]
    fn old_style_config_is_accepted() {
        let yaml = indoc::indoc! {r"
            - repo: local
              hooks:
                - id: x
                  name: x
                  entry: 'true'
                  language: system
        "};
        assert!(is_old_style(yaml));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs_err::write(&path, yaml).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.repos.len(), 1);
    }

    #[test]
    fn ci_block_is_passed_through() {
        let yaml = indoc::indoc! {r"
            ci:
              autofix_prs: true
            repos: []
        "};
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.ci.is_some());
        assert!(config.repos.is_empty());
    }
}
