// Copyright (c) 2017 Chris Kuehl, Anthony Sottile
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.

use std::io::{BufRead, Read};
use std::path::Path;
use std::sync::{OnceLock, RwLock};

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

#[derive(Clone, Default)]
pub(crate) struct TagSet(SmallVec<[&'static str; 8]>);

impl TagSet {
    fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, tag: &'static str) -> bool {
        if self.0.contains(&tag) {
            false
        } else {
            self.0.push(tag);
            true
        }
    }

    pub(crate) fn contains(&self, needle: &str) -> bool {
        self.0.contains(&needle)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().copied()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Extend<&'static str> for TagSet {
    fn extend<I: IntoIterator<Item = &'static str>>(&mut self, iter: I) {
        for tag in iter {
            self.insert(tag);
        }
    }
}

impl FromIterator<&'static str> for TagSet {
    fn from_iter<I: IntoIterator<Item = &'static str>>(iter: I) -> Self {
        let mut set = TagSet::new();
        set.extend(iter);
        set
    }
}

impl<const N: usize> From<[&'static str; N]> for TagSet {
    fn from(tags: [&'static str; N]) -> Self {
        tags.into_iter().collect()
    }
}

impl std::fmt::Debug for TagSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

mod tags {
    pub const DIRECTORY: &str = "directory";
    pub const SYMLINK: &str = "symlink";
    pub const SOCKET: &str = "socket";
    pub const FILE: &str = "file";
    pub const EXECUTABLE: &str = "executable";
    pub const NON_EXECUTABLE: &str = "non-executable";
    pub const TEXT: &str = "text";
    pub const BINARY: &str = "binary";
}

fn by_extension() -> &'static FxHashMap<&'static str, TagSet> {
    static EXTENSIONS: OnceLock<FxHashMap<&'static str, TagSet>> = OnceLock::new();
    EXTENSIONS.get_or_init(|| {
        let mut map = FxHashMap::default();
        map.insert("bash", TagSet::from([tags::TEXT, "shell", "bash"]));
        map.insert("bat", TagSet::from([tags::TEXT, "batch"]));
        map.insert("bmp", TagSet::from([tags::BINARY, "image", "bitmap"]));
        map.insert("bz2", TagSet::from([tags::BINARY, "bzip2"]));
        map.insert("c", TagSet::from([tags::TEXT, "c"]));
        map.insert("cc", TagSet::from([tags::TEXT, "c++"]));
        map.insert("cfg", TagSet::from([tags::TEXT]));
        map.insert("cjs", TagSet::from([tags::TEXT, "javascript"]));
        map.insert("cmake", TagSet::from([tags::TEXT, "cmake"]));
        map.insert("coffee", TagSet::from([tags::TEXT, "coffee"]));
        map.insert("conf", TagSet::from([tags::TEXT]));
        map.insert("cpp", TagSet::from([tags::TEXT, "c++"]));
        map.insert("cs", TagSet::from([tags::TEXT, "c#"]));
        map.insert("csh", TagSet::from([tags::TEXT, "shell", "csh"]));
        map.insert("css", TagSet::from([tags::TEXT, "css"]));
        map.insert("csv", TagSet::from([tags::TEXT, "csv"]));
        map.insert("cxx", TagSet::from([tags::TEXT, "c++"]));
        map.insert("dart", TagSet::from([tags::TEXT, "dart"]));
        map.insert("dll", TagSet::from([tags::BINARY]));
        map.insert("ejs", TagSet::from([tags::TEXT, "ejs"]));
        map.insert("erb", TagSet::from([tags::TEXT, "erb"]));
        map.insert("erl", TagSet::from([tags::TEXT, "erlang"]));
        map.insert("ex", TagSet::from([tags::TEXT, "elixir"]));
        map.insert("exe", TagSet::from([tags::BINARY]));
        map.insert("exs", TagSet::from([tags::TEXT, "elixir"]));
        map.insert("fish", TagSet::from([tags::TEXT, "fish"]));
        map.insert("gemspec", TagSet::from([tags::TEXT, "ruby"]));
        map.insert("gif", TagSet::from([tags::BINARY, "image", "gif"]));
        map.insert("go", TagSet::from([tags::TEXT, "go"]));
        map.insert("gradle", TagSet::from([tags::TEXT, "groovy"]));
        map.insert("graphql", TagSet::from([tags::TEXT, "graphql"]));
        map.insert("groovy", TagSet::from([tags::TEXT, "groovy"]));
        map.insert("gz", TagSet::from([tags::BINARY, "gzip"]));
        map.insert("h", TagSet::from([tags::TEXT, "header", "c", "c++"]));
        map.insert("hbs", TagSet::from([tags::TEXT, "handlebars"]));
        map.insert("hcl", TagSet::from([tags::TEXT, "hcl"]));
        map.insert("hpp", TagSet::from([tags::TEXT, "header", "c++"]));
        map.insert("hs", TagSet::from([tags::TEXT, "haskell"]));
        map.insert("htm", TagSet::from([tags::TEXT, "html"]));
        map.insert("html", TagSet::from([tags::TEXT, "html"]));
        map.insert("ico", TagSet::from([tags::BINARY, "icon"]));
        map.insert("ini", TagSet::from([tags::TEXT, "ini"]));
        map.insert("ipynb", TagSet::from([tags::TEXT, "jupyter", "json"]));
        map.insert("jar", TagSet::from([tags::BINARY, "zip", "jar"]));
        map.insert("java", TagSet::from([tags::TEXT, "java"]));
        map.insert("jinja", TagSet::from([tags::TEXT, "jinja"]));
        map.insert("jinja2", TagSet::from([tags::TEXT, "jinja"]));
        map.insert("jl", TagSet::from([tags::TEXT, "julia"]));
        map.insert("jpeg", TagSet::from([tags::BINARY, "image", "jpeg"]));
        map.insert("jpg", TagSet::from([tags::BINARY, "image", "jpeg"]));
        map.insert("js", TagSet::from([tags::TEXT, "javascript"]));
        map.insert("json", TagSet::from([tags::TEXT, "json"]));
        map.insert("json5", TagSet::from([tags::TEXT, "json5"]));
        map.insert("jsx", TagSet::from([tags::TEXT, "jsx"]));
        map.insert("kt", TagSet::from([tags::TEXT, "kotlin"]));
        map.insert("kts", TagSet::from([tags::TEXT, "kotlin"]));
        map.insert("less", TagSet::from([tags::TEXT, "less"]));
        map.insert("lua", TagSet::from([tags::TEXT, "lua"]));
        map.insert("m", TagSet::from([tags::TEXT, "objective-c"]));
        map.insert("markdown", TagSet::from([tags::TEXT, "markdown"]));
        map.insert("md", TagSet::from([tags::TEXT, "markdown"]));
        map.insert("mjs", TagSet::from([tags::TEXT, "javascript"]));
        map.insert("mk", TagSet::from([tags::TEXT, "makefile"]));
        map.insert("ml", TagSet::from([tags::TEXT, "ocaml"]));
        map.insert("mov", TagSet::from([tags::BINARY, "video"]));
        map.insert("mp3", TagSet::from([tags::BINARY, "audio"]));
        map.insert("mp4", TagSet::from([tags::BINARY, "video"]));
        map.insert("nim", TagSet::from([tags::TEXT, "nim"]));
        map.insert("nix", TagSet::from([tags::TEXT, "nix"]));
        map.insert("otf", TagSet::from([tags::BINARY, "otf"]));
        map.insert("pdf", TagSet::from([tags::BINARY, "pdf"]));
        map.insert("pem", TagSet::from([tags::TEXT, "pem"]));
        map.insert("php", TagSet::from([tags::TEXT, "php"]));
        map.insert("pl", TagSet::from([tags::TEXT, "perl"]));
        map.insert("pm", TagSet::from([tags::TEXT, "perl"]));
        map.insert("png", TagSet::from([tags::BINARY, "image", "png"]));
        map.insert("proto", TagSet::from([tags::TEXT, "proto"]));
        map.insert("ps1", TagSet::from([tags::TEXT, "powershell"]));
        map.insert("puml", TagSet::from([tags::TEXT, "plantuml"]));
        map.insert("py", TagSet::from([tags::TEXT, "python"]));
        map.insert("pyi", TagSet::from([tags::TEXT, "pyi"]));
        map.insert("pyx", TagSet::from([tags::TEXT, "cython"]));
        map.insert("r", TagSet::from([tags::TEXT, "r"]));
        map.insert("rake", TagSet::from([tags::TEXT, "ruby"]));
        map.insert("rb", TagSet::from([tags::TEXT, "ruby"]));
        map.insert("rs", TagSet::from([tags::TEXT, "rust"]));
        map.insert("rst", TagSet::from([tags::TEXT, "rst"]));
        map.insert("sass", TagSet::from([tags::TEXT, "sass"]));
        map.insert("scala", TagSet::from([tags::TEXT, "scala"]));
        map.insert("scss", TagSet::from([tags::TEXT, "scss"]));
        map.insert("sh", TagSet::from([tags::TEXT, "shell", "sh"]));
        map.insert("so", TagSet::from([tags::BINARY]));
        map.insert("sql", TagSet::from([tags::TEXT, "sql"]));
        map.insert("svg", TagSet::from([tags::TEXT, "image", "svg", "xml"]));
        map.insert("swift", TagSet::from([tags::TEXT, "swift"]));
        map.insert("tar", TagSet::from([tags::BINARY, "tar"]));
        map.insert("tf", TagSet::from([tags::TEXT, "terraform"]));
        map.insert("tfvars", TagSet::from([tags::TEXT, "terraform"]));
        map.insert("toml", TagSet::from([tags::TEXT, "toml"]));
        map.insert("ts", TagSet::from([tags::TEXT, "ts"]));
        map.insert("tsx", TagSet::from([tags::TEXT, "tsx"]));
        map.insert("ttf", TagSet::from([tags::BINARY, "ttf"]));
        map.insert("txt", TagSet::from([tags::TEXT, "plain-text"]));
        map.insert("vue", TagSet::from([tags::TEXT, "vue"]));
        map.insert("wav", TagSet::from([tags::BINARY, "audio"]));
        map.insert("webp", TagSet::from([tags::BINARY, "image", "webp"]));
        map.insert("whl", TagSet::from([tags::BINARY, "wheel", "zip"]));
        map.insert("woff", TagSet::from([tags::BINARY, "woff"]));
        map.insert("woff2", TagSet::from([tags::BINARY, "woff2"]));
        map.insert("xml", TagSet::from([tags::TEXT, "xml"]));
        map.insert("yaml", TagSet::from([tags::TEXT, "yaml"]));
        map.insert("yml", TagSet::from([tags::TEXT, "yaml"]));
        map.insert("zig", TagSet::from([tags::TEXT, "zig"]));
        map.insert("zip", TagSet::from([tags::BINARY, "zip"]));
        map.insert("zsh", TagSet::from([tags::TEXT, "shell", "zsh"]));
        map
    })
}

fn by_filename() -> &'static FxHashMap<&'static str, TagSet> {
    static FILENAMES: OnceLock<FxHashMap<&'static str, TagSet>> = OnceLock::new();
    FILENAMES.get_or_init(|| {
        let mut map = FxHashMap::default();
        map.insert(".bashrc", TagSet::from([tags::TEXT, "shell", "bash"]));
        map.insert(".envrc", TagSet::from([tags::TEXT, "shell", "bash"]));
        map.insert(".gitignore", TagSet::from([tags::TEXT, "gitignore"]));
        map.insert(".zshrc", TagSet::from([tags::TEXT, "shell", "zsh"]));
        map.insert("bsdmakefile", TagSet::from([tags::TEXT, "makefile"]));
        map.insert("cargo.lock", TagSet::from([tags::TEXT, "toml"]));
        map.insert("cargo.toml", TagSet::from([tags::TEXT, "toml"]));
        map.insert("chart.yaml", TagSet::from([tags::TEXT, "yaml", "helm"]));
        map.insert("cmakelists.txt", TagSet::from([tags::TEXT, "cmake"]));
        map.insert("containerfile", TagSet::from([tags::TEXT, "dockerfile"]));
        map.insert("dockerfile", TagSet::from([tags::TEXT, "dockerfile"]));
        map.insert("gemfile", TagSet::from([tags::TEXT, "ruby", "gemfile"]));
        map.insert("gemfile.lock", TagSet::from([tags::TEXT, "gemfile-lock"]));
        map.insert("gnumakefile", TagSet::from([tags::TEXT, "makefile"]));
        map.insert("go.mod", TagSet::from([tags::TEXT, "go-mod"]));
        map.insert("go.sum", TagSet::from([tags::TEXT, "go-sum"]));
        map.insert("jenkinsfile", TagSet::from([tags::TEXT, "groovy", "jenkins"]));
        map.insert("makefile", TagSet::from([tags::TEXT, "makefile"]));
        map.insert("pipfile", TagSet::from([tags::TEXT, "toml"]));
        map.insert("pipfile.lock", TagSet::from([tags::TEXT, "json"]));
        map.insert("rakefile", TagSet::from([tags::TEXT, "ruby", "rakefile"]));
        map.insert("setup.cfg", TagSet::from([tags::TEXT, "ini"]));
        map.insert("vagrantfile", TagSet::from([tags::TEXT, "ruby", "vagrantfile"]));
        map
    })
}

fn by_interpreter() -> &'static FxHashMap<&'static str, TagSet> {
    static INTERPRETERS: OnceLock<FxHashMap<&'static str, TagSet>> = OnceLock::new();
    INTERPRETERS.get_or_init(|| {
        let mut map = FxHashMap::default();
        map.insert("ash", TagSet::from(["shell", "ash"]));
        map.insert("bash", TagSet::from(["shell", "bash"]));
        map.insert("dash", TagSet::from(["shell", "dash"]));
        map.insert("node", TagSet::from(["javascript"]));
        map.insert("nodejs", TagSet::from(["javascript"]));
        map.insert("perl", TagSet::from(["perl"]));
        map.insert("python", TagSet::from(["python"]));
        map.insert("python2", TagSet::from(["python", "python2"]));
        map.insert("python3", TagSet::from(["python", "python3"]));
        map.insert("ruby", TagSet::from(["ruby"]));
        map.insert("sh", TagSet::from(["shell", "sh"]));
        map.insert("zsh", TagSet::from(["shell", "zsh"]));
        map
    })
}

/// Structural tags derived from where a file sits or how its name is shaped,
/// rather than from its extension alone.
fn structural_tags(path: &Path, lower_name: &str) -> TagSet {
    let mut tags = TagSet::new();

    // Framework template trees keep HTML under a `templates/` directory.
    if (lower_name.ends_with(".html") || lower_name.ends_with(".htm"))
        && path
            .components()
            .any(|c| c.as_os_str().eq_ignore_ascii_case("templates"))
    {
        tags.extend(["django", "flask"]);
    }

    // Angular source files follow `<name>.<kind>.ts` suffix conventions.
    for suffix in [
        ".component.ts",
        ".directive.ts",
        ".guard.ts",
        ".module.ts",
        ".pipe.ts",
        ".service.ts",
    ] {
        if lower_name.ends_with(suffix) {
            tags.insert("angular");
            break;
        }
    }

    // Compose files: docker-compose.yml, docker-compose.<profile>.yaml, compose.yaml ...
    if (lower_name.starts_with("docker-compose") || lower_name.starts_with("compose"))
        && (lower_name.ends_with(".yml") || lower_name.ends_with(".yaml"))
    {
        tags.insert("compose");
    }

    tags
}

type TypePredicate = fn(&Path) -> bool;

/// Additional type predicates registered at runtime, e.g. by language
/// adapters. Consulted after the built-in tables.
static EXTRA_TYPES: RwLock<Vec<(&'static str, TypePredicate)>> = RwLock::new(Vec::new());

#[allow(dead_code)]
pub(crate) fn register_type(name: &'static str, predicate: TypePredicate) {
    EXTRA_TYPES.write().unwrap().push((name, predicate));
}

fn extra_tags(path: &Path) -> TagSet {
    let extra = EXTRA_TYPES.read().unwrap();
    extra
        .iter()
        .filter(|(_, predicate)| predicate(path))
        .map(|(name, _)| *name)
        .collect()
}

/// Tags derived from the file name alone.
pub(crate) fn tags_from_filename(path: &Path) -> TagSet {
    let mut tags = TagSet::new();

    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return tags;
    };
    let lower_name = name.to_lowercase();

    if let Some(set) = by_filename().get(lower_name.as_str()) {
        tags.extend(set.iter());
    }
    // `Dockerfile.alpine` style prefix names.
    if lower_name.starts_with("dockerfile.") {
        tags.extend([tags::TEXT, "dockerfile"]);
    }

    // Match every extension segment so `a.tar.gz` picks up both `tar` and
    // `gzip` tags.
    for ext in lower_name.split('.').skip(1) {
        if let Some(set) = by_extension().get(ext) {
            tags.extend(set.iter());
        }
    }

    tags.extend(structural_tags(path, &lower_name).iter());
    tags.extend(extra_tags(path).iter());

    tags
}

fn tags_from_interpreter(interpreter: &str) -> TagSet {
    let mut name = Path::new(interpreter)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(interpreter);

    loop {
        if let Some(tags) = by_interpreter().get(name) {
            return tags.clone();
        }

        // python3.12.3 should match python3.12.3, python3.12, python3, python
        if let Some(pos) = name.rfind('.') {
            name = &name[..pos];
        } else {
            break;
        }
    }

    TagSet::new()
}

#[derive(thiserror::Error, Debug)]
pub(crate) enum ShebangError {
    #[error("No shebang found")]
    NoShebang,
    #[error("Shebang contains non-printable characters")]
    NonPrintableChars,
    #[error("Failed to parse shebang")]
    ParseFailed,
    #[error("No command found in shebang")]
    NoCommand,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn starts_with(slice: &[String], prefix: &[&str]) -> bool {
    slice.len() >= prefix.len() && slice.iter().zip(prefix.iter()).all(|(s, p)| s == p)
}

pub(crate) fn parse_shebang(path: &Path) -> Result<Vec<String>, ShebangError> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if !line.starts_with("#!") {
        return Err(ShebangError::NoShebang);
    }

    // Require only printable ASCII
    if line
        .bytes()
        .any(|b| !(0x20..=0x7E).contains(&b) && !(0x09..=0x0D).contains(&b))
    {
        return Err(ShebangError::NonPrintableChars);
    }

    let mut tokens = shlex::split(line[2..].trim()).ok_or(ShebangError::ParseFailed)?;
    let cmd =
        if starts_with(&tokens, &["/usr/bin/env", "-S"]) || starts_with(&tokens, &["env", "-S"]) {
            tokens.drain(0..2);
            tokens
        } else if starts_with(&tokens, &["/usr/bin/env"]) || starts_with(&tokens, &["env"]) {
            tokens.drain(0..1);
            tokens
        } else {
            tokens
        };
    if cmd.is_empty() {
        return Err(ShebangError::NoCommand);
    }

    Ok(cmd)
}

// Lookup table for text character detection.
static IS_TEXT_CHAR: [u32; 8] = {
    let mut table = [0u32; 8];
    let mut i = 0;
    while i < 256 {
        // Printable ASCII (0x20..0x7F)
        // High bit set (>= 0x80)
        // Control characters: 7, 8, 9, 10, 11, 12, 13, 27
        let is_text =
            (i >= 0x20 && i < 0x7F) || i >= 0x80 || matches!(i, 7 | 8 | 9 | 10 | 11 | 12 | 13 | 27);
        if is_text {
            table[i / 32] |= 1 << (i % 32);
        }
        i += 1;
    }
    table
};

fn is_text_char(b: u8) -> bool {
    let idx = b as usize;
    (IS_TEXT_CHAR[idx / 32] & (1 << (idx % 32))) != 0
}

/// Return whether the first KB of contents seems to be text.
///
/// This is roughly based on libmagic's binary/text detection.
fn is_text_file(path: &Path) -> bool {
    let mut buffer = [0; 1024];
    let Ok(mut file) = fs_err::File::open(path) else {
        return false;
    };

    let Ok(bytes_read) = file.read(&mut buffer) else {
        return false;
    };
    if bytes_read == 0 {
        return true;
    }

    buffer[..bytes_read].iter().all(|&b| is_text_char(b))
}

/// Compute the full tag set for a path on disk.
pub(crate) fn tags_from_path(path: &Path) -> Result<TagSet, std::io::Error> {
    let metadata = fs_err::symlink_metadata(path)?;
    if metadata.is_symlink() {
        return Ok(TagSet::from([tags::SYMLINK]));
    }
    if metadata.is_dir() {
        return Ok(TagSet::from([tags::DIRECTORY]));
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;
        if metadata.file_type().is_socket() {
            return Ok(TagSet::from([tags::SOCKET]));
        }
    }

    let mut tags = TagSet::from([tags::FILE]);

    #[cfg(unix)]
    let executable = {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    };
    #[cfg(not(unix))]
    let executable = true;

    tags.insert(if executable {
        tags::EXECUTABLE
    } else {
        tags::NON_EXECUTABLE
    });

    let name_tags = tags_from_filename(path);
    if name_tags.is_empty() && executable {
        // An executable with no recognizable name: classify via its shebang.
        if let Ok(shebang) = parse_shebang(path) {
            tags.extend(tags_from_interpreter(&shebang[0]).iter());
        }
    } else {
        tags.extend(name_tags.iter());
    }

    if !tags.contains(tags::TEXT) && !tags.contains(tags::BINARY) {
        tags.insert(if is_text_file(path) {
            tags::TEXT
        } else {
            tags::BINARY
        });
    }

    Ok(tags)
}

/// All known type tags, for validating `types` fields in configuration.
pub(crate) fn all_tags() -> &'static FxHashSet<&'static str> {
    static ALL_TAGS: OnceLock<FxHashSet<&'static str>> = OnceLock::new();
    ALL_TAGS.get_or_init(|| {
        let mut set = FxHashSet::default();

        set.insert(tags::DIRECTORY);
        set.insert(tags::SYMLINK);
        set.insert(tags::SOCKET);
        set.insert(tags::FILE);
        set.insert(tags::EXECUTABLE);
        set.insert(tags::NON_EXECUTABLE);
        set.insert(tags::TEXT);
        set.insert(tags::BINARY);
        set.extend(["django", "flask", "angular", "compose"]);

        for tags in by_extension()
            .values()
            .chain(by_filename().values())
            .chain(by_interpreter().values())
        {
            set.extend(tags.iter());
        }

        set
    })
}

pub(crate) fn is_known_tag(tag: &str) -> bool {
    all_tags().contains(tag)
        || EXTRA_TYPES
            .read()
            .unwrap()
            .iter()
            .any(|(name, _)| *name == tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn assert_tagset(actual: &TagSet, expected: &[&'static str]) {
        let mut actual_vec: Vec<_> = actual.iter().collect();
        actual_vec.sort_unstable();
        let mut expected_vec = expected.to_vec();
        expected_vec.sort_unstable();
        assert_eq!(actual_vec, expected_vec);
    }

    #[test]
    fn filename_tags() {
        let tags = tags_from_filename(Path::new("test.py"));
        assert_tagset(&tags, &["python", "text"]);

        let tags = tags_from_filename(Path::new("Dockerfile"));
        assert_tagset(&tags, &["dockerfile", "text"]);

        let tags = tags_from_filename(Path::new("Dockerfile.alpine"));
        assert_tagset(&tags, &["dockerfile", "text"]);

        let tags = tags_from_filename(Path::new("Gemfile"));
        assert_tagset(&tags, &["gemfile", "ruby", "text"]);

        let tags = tags_from_filename(Path::new("archive.tar.gz"));
        assert_tagset(&tags, &["binary", "gzip", "tar"]);

        let tags = tags_from_filename(Path::new("FILE.PDF"));
        assert_tagset(&tags, &["binary", "pdf"]);
    }

    #[test]
    fn structural_tag_rules() {
        let tags = tags_from_filename(Path::new("app/templates/index.html"));
        assert!(tags.contains("django"));
        assert!(tags.contains("flask"));

        let tags = tags_from_filename(Path::new("src/app/login.component.ts"));
        assert!(tags.contains("angular"));
        assert!(tags.contains("ts"));

        let tags = tags_from_filename(Path::new("docker-compose.override.yml"));
        assert!(tags.contains("compose"));
        assert!(tags.contains("yaml"));

        let tags = tags_from_filename(Path::new("compose.yaml"));
        assert!(tags.contains("compose"));
    }

    #[test]
    fn interpreter_tags() {
        assert_tagset(&tags_from_interpreter("/usr/bin/python3"), &[
            "python", "python3",
        ]);
        assert_tagset(&tags_from_interpreter("/usr/bin/python3.12.3"), &[
            "python", "python3",
        ]);
        assert_tagset(&tags_from_interpreter("sh"), &["shell", "sh"]);
        assert!(tags_from_interpreter("unknown-thing").is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn path_tags() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let src = dir.path().join("source.txt");
        let dest = dir.path().join("link.txt");
        fs_err::write(&src, "hello")?;
        std::os::unix::fs::symlink(&src, &dest)?;

        let tags = tags_from_path(dir.path())?;
        assert_tagset(&tags, &["directory"]);
        let tags = tags_from_path(&src)?;
        assert_tagset(&tags, &["plain-text", "non-executable", "file", "text"]);
        let tags = tags_from_path(&dest)?;
        assert_tagset(&tags, &["symlink"]);

        Ok(())
    }

    #[test]
    fn registered_extra_type() {
        register_type("frobnicator", |path| {
            path.extension().is_some_and(|e| e == "frob")
        });
        assert!(is_known_tag("frobnicator"));
        let tags = tags_from_filename(Path::new("widget.frob"));
        assert!(tags.contains("frobnicator"));
    }
}
