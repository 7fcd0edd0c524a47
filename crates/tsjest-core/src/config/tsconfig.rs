//! Locating and reading `tsconfig.json` files
//!
//! Supports JSONC, `extends` chains (relative paths and packages under
//! `node_modules`), and project `references`.

use globset::{Glob, GlobSet, GlobSetBuilder};
use rustc_hash::FxHashSet;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::ConfigError;
use crate::fs::{normalize_path, resolve_path, FileSystem};

pub const TSCONFIG_FILE_NAME: &str = "tsconfig.json";

/// Options holding paths, resolved against the tsconfig that declares them
const PATH_OPTIONS: &[&str] = &[
    "outDir",
    "rootDir",
    "baseUrl",
    "declarationDir",
    "tsBuildInfoFile",
];

/// Extensions of files `include` patterns pick up
const INPUT_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts"];

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Extends {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct RawReference {
    path: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTsConfig {
    #[serde(default)]
    extends: Option<Extends>,
    #[serde(default)]
    compiler_options: Option<Map<String, Value>>,
    #[serde(default)]
    files: Option<Vec<String>>,
    #[serde(default)]
    include: Option<Vec<String>>,
    #[serde(default)]
    exclude: Option<Vec<String>>,
    #[serde(default)]
    references: Option<Vec<RawReference>>,
}

/// A tsconfig file with its `extends` chain folded in
///
/// Compiler options stay raw JSON so that inline overrides can be merged key
/// by key before typing them.
#[derive(Debug, Clone, Default)]
pub struct TsConfigFile {
    pub path: PathBuf,
    pub compiler_options: Map<String, Value>,
    /// Absolute glob patterns
    pub include: Option<Vec<String>>,
    /// Absolute glob patterns
    pub exclude: Option<Vec<String>>,
    /// Absolute file paths
    pub files: Option<Vec<PathBuf>>,
    /// Paths of referenced tsconfig files
    pub references: Vec<PathBuf>,
}

impl TsConfigFile {
    fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("/"))
    }

    /// Root input files of the project, sorted
    ///
    /// `files` entries that exist, plus TypeScript files matched by `include`.
    /// Without either, every TypeScript file below the tsconfig directory is an
    /// input. `exclude` and `out_dir` only filter what `include` finds.
    pub fn file_names(
        &self,
        fs: &dyn FileSystem,
        out_dir: Option<&Path>,
    ) -> Result<Vec<PathBuf>, ConfigError> {
        let mut names: BTreeSet<PathBuf> = self
            .files
            .iter()
            .flatten()
            .filter(|file| fs.file_exists(file))
            .cloned()
            .collect();

        let include = match (&self.include, &self.files) {
            (Some(patterns), _) => patterns.clone(),
            (None, Some(_)) => Vec::new(),
            (None, None) => vec![format!("{}/**/*", self.dir().display())],
        };
        if include.is_empty() {
            return Ok(names.into_iter().collect());
        }

        let include_set = build_glob_set(&include)?;
        let exclude_set = build_glob_set(self.exclude.as_deref().unwrap_or_default())?;
        let bases: BTreeSet<PathBuf> = include.iter().map(|p| glob_base(p)).collect();
        for base in bases {
            for file in fs.list_files(&base).unwrap_or_default() {
                if !is_input_file(&file) || out_dir.is_some_and(|dir| file.starts_with(dir)) {
                    continue;
                }
                if matches_path_or_ancestor(&include_set, &file)
                    && !matches_path_or_ancestor(&exclude_set, &file)
                {
                    names.insert(file);
                }
            }
        }

        debug!(count = names.len(), "Expanded tsconfig file list");
        Ok(names.into_iter().collect())
    }
}

fn absolute_patterns(dir: &Path, patterns: &[String]) -> Vec<String> {
    patterns
        .iter()
        .map(|p| resolve_path(dir, Path::new(p)).to_string_lossy().into_owned())
        .collect()
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| ConfigError::InvalidGlob {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| ConfigError::InvalidGlob {
        pattern: patterns.join(", "),
        message: e.to_string(),
    })
}

/// Extensionless patterns like `src` name directories in tsc; approximate by
/// also matching every ancestor of `file`.
fn matches_path_or_ancestor(set: &GlobSet, file: &Path) -> bool {
    file.ancestors().any(|path| set.is_match(path))
}

/// Leading directories of `pattern` that contain no glob syntax
fn glob_base(pattern: &str) -> PathBuf {
    let mut base = PathBuf::new();
    for component in Path::new(pattern).components() {
        if component
            .as_os_str()
            .to_string_lossy()
            .contains(['*', '?', '[', '{'])
        {
            break;
        }
        base.push(component);
    }
    base
}

fn is_input_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| INPUT_EXTENSIONS.contains(&ext))
}

/// Walk up from `start_dir` looking for `tsconfig.json`
pub fn find_config_file(fs: &dyn FileSystem, start_dir: &Path) -> Option<PathBuf> {
    let mut dir = Some(start_dir);
    while let Some(current) = dir {
        let candidate = current.join(TSCONFIG_FILE_NAME);
        if fs.file_exists(&candidate) {
            return Some(candidate);
        }
        dir = current.parent();
    }
    None
}

/// Read a tsconfig file and everything it extends
pub fn read_config_file(fs: &dyn FileSystem, path: &Path) -> Result<TsConfigFile, ConfigError> {
    let mut visited = FxHashSet::default();
    read_config_file_inner(fs, &normalize_path(path), &mut visited)
}

fn read_config_file_inner(
    fs: &dyn FileSystem,
    path: &Path,
    visited: &mut FxHashSet<PathBuf>,
) -> Result<TsConfigFile, ConfigError> {
    if !visited.insert(path.to_path_buf()) {
        return Err(ConfigError::ExtendsCycle {
            path: path.to_path_buf(),
        });
    }

    debug!("Reading tsconfig {:?}", path);
    let source = fs.read_file(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value = parse_jsonc(&source).map_err(|e| ConfigError::InvalidJson {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let raw: RawTsConfig =
        serde_json::from_value(value).map_err(|e| ConfigError::InvalidJson {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let dir = path.parent().unwrap_or_else(|| Path::new("/"));

    let mut compiler_options = raw.compiler_options.unwrap_or_default();
    absolutize_path_options(&mut compiler_options, dir);

    let mut config = TsConfigFile {
        path: path.to_path_buf(),
        compiler_options,
        include: raw.include.map(|patterns| absolute_patterns(dir, &patterns)),
        exclude: raw.exclude.map(|patterns| absolute_patterns(dir, &patterns)),
        files: raw.files.map(|files| {
            files
                .iter()
                .map(|f| resolve_path(dir, Path::new(f)))
                .collect()
        }),
        references: raw
            .references
            .unwrap_or_default()
            .iter()
            .map(|r| reference_config_path(fs, dir, &r.path))
            .collect(),
    };

    let bases = match raw.extends {
        None => Vec::new(),
        Some(Extends::One(base)) => vec![base],
        Some(Extends::Many(bases)) => bases,
    };
    // Later entries of an `extends` array take precedence over earlier ones,
    // and the file itself over all of them.
    let mut merged_options = Map::new();
    let mut include = None;
    let mut exclude = None;
    let mut files = None;
    for base in bases {
        let base_path = resolve_extends_path(fs, dir, &base)?;
        let base_config = read_config_file_inner(fs, &base_path, visited)?;
        merged_options.extend(base_config.compiler_options);
        include = base_config.include.or(include);
        exclude = base_config.exclude.or(exclude);
        files = base_config.files.or(files);
    }
    merged_options.extend(std::mem::take(&mut config.compiler_options));
    config.compiler_options = merged_options;
    config.include = config.include.or(include);
    config.exclude = config.exclude.or(exclude);
    config.files = config.files.or(files);

    Ok(config)
}

fn resolve_extends_path(
    fs: &dyn FileSystem,
    dir: &Path,
    extends: &str,
) -> Result<PathBuf, ConfigError> {
    let with_json = |p: PathBuf| {
        if p.extension().is_some_and(|ext| ext == "json") {
            p
        } else {
            let mut s = p.into_os_string();
            s.push(".json");
            PathBuf::from(s)
        }
    };

    if extends.starts_with('.') || Path::new(extends).is_absolute() {
        let candidate = with_json(resolve_path(dir, Path::new(extends)));
        if fs.file_exists(&candidate) {
            return Ok(candidate);
        }
        return Err(ConfigError::TsConfigNotFound { path: candidate });
    }

    // Package specifier: search node_modules upward
    let mut current = Some(dir);
    while let Some(d) = current {
        let package_path = d.join("node_modules").join(extends);
        for candidate in [
            package_path.join(TSCONFIG_FILE_NAME),
            with_json(package_path.clone()),
            package_path.clone(),
        ] {
            if fs.file_exists(&candidate) {
                return Ok(normalize_path(&candidate));
            }
        }
        current = d.parent();
    }

    Err(ConfigError::TsConfigNotFound {
        path: dir.join("node_modules").join(extends),
    })
}

fn reference_config_path(fs: &dyn FileSystem, dir: &Path, reference: &str) -> PathBuf {
    let path = resolve_path(dir, Path::new(reference));
    if fs.file_exists(&path) {
        path
    } else {
        path.join(TSCONFIG_FILE_NAME)
    }
}

/// Resolve relative path-valued options against `dir`
pub fn absolutize_path_options(options: &mut Map<String, Value>, dir: &Path) {
    for key in PATH_OPTIONS {
        if let Some(Value::String(value)) = options.get_mut(*key) {
            *value = resolve_path(dir, Path::new(value.as_str()))
                .to_string_lossy()
                .into_owned();
        }
    }
}

/// Parse JSON allowing comments and trailing commas
pub fn parse_jsonc(source: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(&remove_trailing_commas(&strip_jsonc(source)))
}

fn strip_jsonc(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escape = false;
    let mut in_line_comment = false;
    let mut in_block_comment = false;

    while let Some(ch) = chars.next() {
        if in_line_comment {
            if ch == '\n' {
                in_line_comment = false;
                out.push(ch);
            }
            continue;
        }

        if in_block_comment {
            if ch == '*' && chars.peek() == Some(&'/') {
                chars.next();
                in_block_comment = false;
            } else if ch == '\n' {
                out.push(ch);
            }
            continue;
        }

        if in_string {
            out.push(ch);
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match (ch, chars.peek()) {
            ('"', _) => {
                in_string = true;
                out.push(ch);
            }
            ('/', Some('/')) => {
                chars.next();
                in_line_comment = true;
            }
            ('/', Some('*')) => {
                chars.next();
                in_block_comment = true;
            }
            _ => out.push(ch),
        }
    }

    out
}

fn remove_trailing_commas(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escape = false;

    while let Some(ch) = chars.next() {
        if in_string {
            out.push(ch);
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        if ch == '"' {
            in_string = true;
            out.push(ch);
            continue;
        }

        if ch == ',' {
            let next = chars.clone().find(|c| !c.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }

        out.push(ch);
    }

    out
}

/// A referenced sub-project whose output is built separately
#[derive(Debug, Clone)]
pub struct ProjectReference {
    pub config_path: PathBuf,
    pub root_dir: PathBuf,
    pub out_dir: Option<PathBuf>,
    include: Option<GlobSet>,
    files: Option<Vec<PathBuf>>,
}

impl ProjectReference {
    pub fn load(fs: &dyn FileSystem, config_path: &Path) -> Result<Self, ConfigError> {
        let config = read_config_file(fs, config_path)?;
        let config_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let path_option = |key: &str| {
            config
                .compiler_options
                .get(key)
                .and_then(Value::as_str)
                .map(PathBuf::from)
        };

        let include = config.include.as_deref().map(build_glob_set).transpose()?;

        Ok(Self {
            config_path: config.path.clone(),
            root_dir: path_option("rootDir").unwrap_or(config_dir),
            out_dir: path_option("outDir"),
            include,
            files: config.files,
        })
    }

    /// Whether `file` is one of this project's inputs
    pub fn contains(&self, file: &Path) -> bool {
        if !file.starts_with(&self.root_dir) || is_declaration_file(file) {
            return false;
        }
        if let Some(files) = &self.files {
            if files.iter().any(|f| f == file) {
                return true;
            }
            if self.include.is_none() {
                return false;
            }
        }
        self.include
            .as_ref()
            .map_or(true, |set| matches_path_or_ancestor(set, file))
    }

    /// Where `tsc --build` writes the JavaScript for `file`
    pub fn output_file_for(&self, file: &Path) -> PathBuf {
        let relative = file.strip_prefix(&self.root_dir).unwrap_or(file);
        let base = match &self.out_dir {
            Some(out_dir) => out_dir.join(relative),
            None => file.to_path_buf(),
        };
        let extension = match file.extension().and_then(|e| e.to_str()) {
            Some("mts") => "mjs",
            Some("cts") => "cjs",
            Some("json") => "json",
            _ => "js",
        };
        base.with_extension(extension)
    }
}

pub fn is_declaration_file(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    name.ends_with(".d.ts") || name.ends_with(".d.mts") || name.ends_with(".d.cts")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;

    #[test]
    fn test_parse_jsonc_strips_comments_and_trailing_commas() {
        let source = r#"{
            // line comment
            "compilerOptions": {
                /* block */ "target": "es2019",
                "url": "http://example.com/a", // keeps strings intact
            },
        }"#;
        let value = parse_jsonc(source).unwrap();
        assert_eq!(value["compilerOptions"]["target"], "es2019");
        assert_eq!(value["compilerOptions"]["url"], "http://example.com/a");
    }

    #[test]
    fn test_find_config_file_walks_up() {
        let fs = MockFileSystem::new();
        fs.add_file("/repo/tsconfig.json", "{}");

        assert_eq!(
            find_config_file(&fs, Path::new("/repo/packages/app")),
            Some(PathBuf::from("/repo/tsconfig.json"))
        );
        assert_eq!(find_config_file(&MockFileSystem::new(), Path::new("/x")), None);
    }

    #[test]
    fn test_extends_merges_options_child_wins() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "/repo/tsconfig.base.json",
            r#"{ "compilerOptions": { "target": "es5", "strict": true, "outDir": "dist" } }"#,
        );
        fs.add_file(
            "/repo/app/tsconfig.json",
            r#"{ "extends": "../tsconfig.base", "compilerOptions": { "target": "es2020" } }"#,
        );

        let config = read_config_file(&fs, Path::new("/repo/app/tsconfig.json")).unwrap();
        assert_eq!(config.compiler_options["target"], "es2020");
        assert_eq!(config.compiler_options["strict"], true);
        // resolved against the base file's directory
        assert_eq!(config.compiler_options["outDir"], "/repo/dist");
    }

    #[test]
    fn test_extends_from_node_modules() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "/repo/node_modules/@tsconfig/node16/tsconfig.json",
            r#"{ "compilerOptions": { "target": "es2021" } }"#,
        );
        fs.add_file(
            "/repo/tsconfig.json",
            r#"{ "extends": "@tsconfig/node16" }"#,
        );

        let config = read_config_file(&fs, Path::new("/repo/tsconfig.json")).unwrap();
        assert_eq!(config.compiler_options["target"], "es2021");
    }

    #[test]
    fn test_extends_cycle_is_an_error() {
        let fs = MockFileSystem::new();
        fs.add_file("/repo/a.json", r#"{ "extends": "./b.json" }"#);
        fs.add_file("/repo/b.json", r#"{ "extends": "./a.json" }"#);

        let err = read_config_file(&fs, Path::new("/repo/a.json")).unwrap_err();
        assert!(matches!(err, ConfigError::ExtendsCycle { .. }));
    }

    #[test]
    fn test_invalid_json_is_reported_with_path() {
        let fs = MockFileSystem::new();
        fs.add_file("/repo/tsconfig.json", "{ not json");

        let err = read_config_file(&fs, Path::new("/repo/tsconfig.json")).unwrap_err();
        assert!(err.to_string().contains("/repo/tsconfig.json"));
    }

    #[test]
    fn test_project_reference_output_path() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "/repo/lib/tsconfig.json",
            r#"{ "compilerOptions": { "rootDir": "src", "outDir": "dist", "composite": true }, "include": ["src"] }"#,
        );
        fs.add_file(
            "/repo/tsconfig.json",
            r#"{ "references": [{ "path": "./lib" }] }"#,
        );

        let root = read_config_file(&fs, Path::new("/repo/tsconfig.json")).unwrap();
        assert_eq!(root.references, vec![PathBuf::from("/repo/lib/tsconfig.json")]);

        let reference = ProjectReference::load(&fs, &root.references[0]).unwrap();
        let input = Path::new("/repo/lib/src/util/math.ts");
        assert!(reference.contains(input));
        assert!(!reference.contains(Path::new("/repo/app/index.ts")));
        assert!(!reference.contains(Path::new("/repo/lib/src/types.d.ts")));
        assert_eq!(
            reference.output_file_for(input),
            PathBuf::from("/repo/lib/dist/util/math.js")
        );
    }

    #[test]
    fn test_declaration_file_detection() {
        assert!(is_declaration_file(Path::new("/a/types.d.ts")));
        assert!(is_declaration_file(Path::new("/a/types.d.mts")));
        assert!(!is_declaration_file(Path::new("/a/types.ts")));
    }

    fn file_names(fs: &MockFileSystem, out_dir: Option<&Path>) -> Vec<PathBuf> {
        read_config_file(fs, Path::new("/p/tsconfig.json"))
            .unwrap()
            .file_names(fs, out_dir)
            .unwrap()
    }

    #[test]
    fn test_file_names_default_to_every_typescript_file() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/tsconfig.json", "{}");
        fs.add_file("/p/src/a.ts", "");
        fs.add_file("/p/src/global.d.ts", "");
        fs.add_file("/p/src/view.tsx", "");
        fs.add_file("/p/src/style.css", "");
        fs.add_file("/p/node_modules/x/index.d.ts", "");
        fs.add_file("/p/build/a.d.ts", "");

        assert_eq!(
            file_names(&fs, Some(Path::new("/p/build"))),
            vec![
                PathBuf::from("/p/src/a.ts"),
                PathBuf::from("/p/src/global.d.ts"),
                PathBuf::from("/p/src/view.tsx"),
            ]
        );
    }

    #[test]
    fn test_file_names_from_files_only() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "/p/tsconfig.json",
            r#"{ "files": ["src/global.d.ts", "src/lib.ts", "src/missing.ts"] }"#,
        );
        fs.add_file("/p/src/global.d.ts", "");
        fs.add_file("/p/src/lib.ts", "");
        fs.add_file("/p/src/other.ts", "");

        assert_eq!(
            file_names(&fs, None),
            vec![PathBuf::from("/p/src/global.d.ts"), PathBuf::from("/p/src/lib.ts")]
        );
    }

    #[test]
    fn test_file_names_include_directory_and_exclude() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "/p/tsconfig.json",
            r#"{ "include": ["src", "types/**/*.d.ts"], "exclude": ["src/legacy"] }"#,
        );
        fs.add_file("/p/src/a.ts", "");
        fs.add_file("/p/src/legacy/old.ts", "");
        fs.add_file("/p/types/env.d.ts", "");
        fs.add_file("/p/scripts/build.ts", "");

        assert_eq!(
            file_names(&fs, None),
            vec![PathBuf::from("/p/src/a.ts"), PathBuf::from("/p/types/env.d.ts")]
        );
    }

    #[test]
    fn test_file_names_inherit_include_through_extends() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/base.json", r#"{ "include": ["lib"] }"#);
        fs.add_file("/p/tsconfig.json", r#"{ "extends": "./base.json" }"#);
        fs.add_file("/p/lib/a.ts", "");
        fs.add_file("/p/src/b.ts", "");

        assert_eq!(file_names(&fs, None), vec![PathBuf::from("/p/lib/a.ts")]);
    }

    #[test]
    fn test_glob_base_stops_at_glob_syntax() {
        assert_eq!(glob_base("/p/src/**/*.ts"), PathBuf::from("/p/src"));
        assert_eq!(glob_base("/p/src"), PathBuf::from("/p/src"));
        assert_eq!(glob_base("/p/{a,b}/*.ts"), PathBuf::from("/p"));
    }
}
