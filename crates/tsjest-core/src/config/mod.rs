//! Configuration set: everything that affects compilation, resolved once per
//! host configuration

pub mod diagnostics;
pub mod host;
pub mod options;
pub mod tsconfig;

pub use diagnostics::{
    parse_diagnostic_code, parse_diagnostic_codes, CodeItem, CodeList, DiagnosticsOptions,
    DiagnosticsPolicy, DiagnosticsSetting, IGNORE_DIAGNOSTICS_ENV, IGNORE_DIAGNOSTIC_CODES,
};
pub use host::{HostConfig, OneOrMany, TransformOptions, TsConfigSource, TsJestOptions};
pub use options::{CompilerOptions, ModuleKind, ScriptTarget, ALLOW_JS_OUT_DIR};
pub use tsconfig::{is_declaration_file, ProjectReference, TsConfigFile};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use regex::Regex;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::cache::hash_config;
use crate::di::Container;
use crate::diagnostics::{
    format_diagnostics, format_diagnostics_with_color_and_context, Diagnostic, DiagnosticCategory,
    DiagnosticHandler,
};
use crate::errors::{ConfigError, TsError};
use crate::fs::FileSystem;
use crate::memoize::Memoized;
use crate::typescript::{TypeScript, DEFAULT_COMPILER};

/// Host `testMatch`/`testRegex` rules
#[derive(Debug, Clone)]
struct TestMatcher {
    globs: Option<GlobSet>,
    patterns: Vec<String>,
    regexes: Vec<Regex>,
}

impl TestMatcher {
    fn new(host: &HostConfig) -> Result<Self, ConfigError> {
        let regex_sources = host.test_regex_patterns();
        let mut patterns: Vec<String> = host
            .test_match
            .iter()
            .map(|p| host::replace_root_dir(p, &host.root_dir))
            .collect();
        if patterns.is_empty() && regex_sources.is_empty() {
            patterns = host::DEFAULT_TEST_MATCH
                .iter()
                .map(|p| p.to_string())
                .collect();
        }

        let globs = if patterns.is_empty() {
            None
        } else {
            let mut builder = GlobSetBuilder::new();
            for pattern in &patterns {
                let glob = GlobBuilder::new(pattern)
                    .literal_separator(true)
                    .build()
                    .map_err(|e| ConfigError::InvalidGlob {
                        pattern: pattern.clone(),
                        message: e.to_string(),
                    })?;
                builder.add(glob);
            }
            Some(builder.build().map_err(|e| ConfigError::InvalidGlob {
                pattern: patterns.join(", "),
                message: e.to_string(),
            })?)
        };

        let regexes = regex_sources
            .iter()
            .map(|source| {
                Regex::new(source).map_err(|e| ConfigError::InvalidRegex {
                    option: "testRegex",
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            globs,
            patterns,
            regexes,
        })
    }

    fn is_match(&self, path: &Path) -> bool {
        if self.globs.as_ref().is_some_and(|g| g.is_match(path)) {
            return true;
        }
        let text = path.to_string_lossy();
        self.regexes.iter().any(|r| r.is_match(&text))
    }
}

/// Compiler options, root files and references after tsconfig resolution
struct ResolvedTsConfig {
    path: Option<PathBuf>,
    options: CompilerOptions,
    file_names: Vec<PathBuf>,
    references: Vec<ProjectReference>,
}

/// `with_file_names` expands the tsconfig's `files`/`include` on disk; only
/// the type-checking compiler needs them.
fn resolve_ts_config(
    fs: &dyn FileSystem,
    host: &HostConfig,
    source: Option<&TsConfigSource>,
    with_file_names: bool,
) -> Result<ResolvedTsConfig, ConfigError> {
    let config_path = match source {
        Some(TsConfigSource::Toggle(false)) => None,
        Some(TsConfigSource::Path(path)) => {
            let path = host.resolve_path(path);
            if !fs.file_exists(&path) {
                return Err(ConfigError::TsConfigNotFound { path });
            }
            Some(path)
        }
        _ => tsconfig::find_config_file(fs, &host.root_dir),
    };

    let mut file = match &config_path {
        Some(path) => tsconfig::read_config_file(fs, path)?,
        None => TsConfigFile::default(),
    };
    debug!(tsconfig = ?config_path, "Resolved TypeScript config");

    let mut raw_options = std::mem::take(&mut file.compiler_options);
    if let Some(TsConfigSource::Inline(overrides)) = source {
        let mut overrides: Map<String, Value> = overrides.clone();
        tsconfig::absolutize_path_options(&mut overrides, &host.root_dir);
        raw_options.extend(overrides);
    }

    let mut options: CompilerOptions =
        serde_json::from_value(Value::Object(raw_options)).map_err(|e| {
            ConfigError::InvalidOption {
                option: "compilerOptions".to_string(),
                message: e.to_string(),
            }
        })?;

    if options.target.is_none() {
        options.target = Some(ScriptTarget::DEFAULT);
    }
    if options.allow_js() && options.out_dir.is_none() {
        options.out_dir = Some(host.root_dir.join(ALLOW_JS_OUT_DIR));
    }
    options.apply_forced();

    let references = file
        .references
        .iter()
        .map(|path| ProjectReference::load(fs, path))
        .collect::<Result<Vec<_>, _>>()?;

    // Without a tsconfig there is no project, only the files the host compiles
    let file_names = if with_file_names && config_path.is_some() {
        file.file_names(fs, options.out_dir.as_deref())?
    } else {
        Vec::new()
    };

    Ok(ResolvedTsConfig {
        path: config_path,
        options,
        file_names,
        references,
    })
}

/// Read extra ignored codes from [`IGNORE_DIAGNOSTICS_ENV`]
pub fn env_ignore_codes() -> Result<Vec<u32>, ConfigError> {
    match std::env::var(IGNORE_DIAGNOSTICS_ENV) {
        Ok(value) => parse_diagnostic_codes(&value),
        Err(_) => Ok(Vec::new()),
    }
}

/// Normalized, immutable view of one host configuration
///
/// Derived values that are asked for repeatedly are memoized per instance.
pub struct ConfigSet {
    host: Arc<HostConfig>,
    container: Container,
    tsconfig_path: Option<PathBuf>,
    compiler_options: CompilerOptions,
    file_names: Vec<PathBuf>,
    references: Vec<ProjectReference>,
    diagnostics: DiagnosticsPolicy,
    isolated_modules: bool,
    use_esm: bool,
    compiler_name: String,
    compiler_module: Arc<dyn TypeScript>,
    cache_directory: Option<PathBuf>,
    stringify_regex: Option<Regex>,
    test_matcher: TestMatcher,
    cache_key_memo: Memoized<(), String>,
    is_test_file_memo: Memoized<PathBuf, bool>,
}

impl ConfigSet {
    pub fn new(host: Arc<HostConfig>, container: &Container) -> Result<Self, ConfigError> {
        let env_codes = env_ignore_codes()?;
        Self::with_env_ignore_codes(host, container, &env_codes)
    }

    /// Like [`ConfigSet::new`] with the environment's ignore codes given explicitly
    pub fn with_env_ignore_codes(
        host: Arc<HostConfig>,
        container: &Container,
        env_codes: &[u32],
    ) -> Result<Self, ConfigError> {
        let ts_jest = host.ts_jest_options()?;
        let fs = container.file_system();

        let resolved = resolve_ts_config(
            fs.as_ref(),
            &host,
            ts_jest.tsconfig.as_ref(),
            !ts_jest.isolated_modules,
        )?;
        let diagnostics = DiagnosticsPolicy::from_setting(ts_jest.diagnostics.as_ref(), env_codes)?;

        let compiler_name = ts_jest
            .compiler
            .clone()
            .unwrap_or_else(|| DEFAULT_COMPILER.to_string());
        let compiler_module = container.compilers().resolve(&compiler_name)?;

        let stringify_regex = ts_jest
            .stringify_content_path_regex
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegex {
                    option: "stringifyContentPathRegex",
                    message: e.to_string(),
                })
            })
            .transpose()?;

        let cache_directory = host
            .cache_directory
            .as_ref()
            .map(|dir| host.resolve_path(&dir.to_string_lossy()));
        let test_matcher = TestMatcher::new(&host)?;

        debug!(
            root_dir = %host.root_dir.display(),
            isolated = ts_jest.isolated_modules,
            compiler = %compiler_name,
            "Created configuration set"
        );

        Ok(Self {
            container: container.clone(),
            tsconfig_path: resolved.path,
            compiler_options: resolved.options,
            file_names: resolved.file_names,
            references: resolved.references,
            diagnostics,
            isolated_modules: ts_jest.isolated_modules,
            use_esm: ts_jest.use_esm,
            compiler_name,
            compiler_module,
            cache_directory,
            stringify_regex,
            test_matcher,
            host,
            cache_key_memo: Memoized::new("cache_key"),
            is_test_file_memo: Memoized::new("is_test_file"),
        })
    }

    pub fn host(&self) -> &Arc<HostConfig> {
        &self.host
    }

    pub fn root_dir(&self) -> &Path {
        &self.host.root_dir
    }

    pub fn cwd(&self) -> &Path {
        self.host.cwd()
    }

    pub fn tsconfig_path(&self) -> Option<&Path> {
        self.tsconfig_path.as_deref()
    }

    /// Options with forced values applied, before the per-call module switch
    pub fn compiler_options(&self) -> &CompilerOptions {
        &self.compiler_options
    }

    /// Options for one compile call
    pub fn compiler_options_for(&self, transform: &TransformOptions) -> CompilerOptions {
        self.compiler_options
            .for_module_system(self.use_esm, transform.supports_static_esm)
    }

    pub fn diagnostics(&self) -> &DiagnosticsPolicy {
        &self.diagnostics
    }

    pub fn is_isolated(&self) -> bool {
        self.isolated_modules
    }

    pub fn use_esm(&self) -> bool {
        self.use_esm
    }

    pub fn allow_js(&self) -> bool {
        self.compiler_options.allow_js()
    }

    pub fn compiler_name(&self) -> &str {
        &self.compiler_name
    }

    pub fn compiler_module(&self) -> &Arc<dyn TypeScript> {
        &self.compiler_module
    }

    pub fn cache_directory(&self) -> Option<&Path> {
        self.cache_directory.as_deref()
    }

    /// Root input files listed by the tsconfig, empty in isolated mode
    pub fn file_names(&self) -> &[PathBuf] {
        &self.file_names
    }

    pub fn references(&self) -> &[ProjectReference] {
        &self.references
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn file_system(&self) -> &Arc<dyn FileSystem> {
        self.container.file_system()
    }

    pub fn diagnostic_handler(&self) -> &Arc<dyn DiagnosticHandler> {
        self.container.diagnostic_handler()
    }

    pub fn is_test_file(&self, path: &Path) -> bool {
        self.is_test_file_memo
            .get_or_compute(&path.to_path_buf(), |p| self.test_matcher.is_match(p))
    }

    pub fn should_report_diagnostic(&self, path: &Path) -> bool {
        self.diagnostics.should_report(path)
    }

    pub fn should_stringify_content(&self, path: &Path) -> bool {
        self.stringify_regex
            .as_ref()
            .is_some_and(|r| r.is_match(&path.to_string_lossy()))
    }

    /// The referenced project `path` belongs to, if any
    pub fn project_reference_for(&self, path: &Path) -> Option<&ProjectReference> {
        self.references.iter().find(|r| r.contains(path))
    }

    /// Filter `diagnostics` raised while compiling `file` and report the rest
    ///
    /// Returns an error when throwing is enabled and an error or warning is
    /// left; otherwise every remaining diagnostic is logged as a warning.
    pub fn raise_diagnostics(
        &self,
        diagnostics: Vec<Diagnostic>,
        file: &Path,
    ) -> Result<(), TsError> {
        if !self.should_report_diagnostic(file) {
            return Ok(());
        }
        let remaining = self.diagnostics.filter(diagnostics);
        if remaining.is_empty() {
            return Ok(());
        }

        if self.diagnostics.throws {
            let important: Vec<_> = remaining
                .iter()
                .filter(|d| d.is_important())
                .cloned()
                .collect();
            if !important.is_empty() {
                return Err(self.create_ts_error(&important));
            }
        }

        let handler = self.diagnostic_handler();
        for diagnostic in remaining {
            handler.report(Diagnostic {
                category: DiagnosticCategory::Warning,
                ..diagnostic
            });
        }
        Ok(())
    }

    pub fn create_ts_error(&self, diagnostics: &[Diagnostic]) -> TsError {
        let diagnostic_text = if self.diagnostics.pretty {
            let fs = self.file_system();
            format_diagnostics_with_color_and_context(diagnostics, self.cwd(), |path| {
                fs.read_file(path).ok()
            })
        } else {
            format_diagnostics(diagnostics, self.cwd())
        };
        TsError {
            diagnostic_text,
            diagnostic_codes: diagnostics.iter().map(|d| d.code).collect(),
        }
    }

    /// Digest of every input that changes compiled output
    pub fn cache_key(&self) -> String {
        self.cache_key_memo.get_or_compute(&(), |_| {
            let fingerprint = json!({
                "version": env!("CARGO_PKG_VERSION"),
                "compiler": {
                    "name": self.compiler_name,
                    "version": self.compiler_module.version(),
                },
                "rootDir": self.host.root_dir,
                "tsconfig": self.tsconfig_path,
                "compilerOptions": self.compiler_options,
                "isolatedModules": self.isolated_modules,
                "useESM": self.use_esm,
                "diagnostics": {
                    "enabled": self.diagnostics.enabled,
                    "pretty": self.diagnostics.pretty,
                    "throws": self.diagnostics.throws,
                    "ignoreCodes": self.diagnostics.ignore_codes,
                    "pathRegex": self.diagnostics.path_regex.as_ref().map(Regex::as_str),
                },
                "stringifyContentPathRegex": self.stringify_regex.as_ref().map(Regex::as_str),
                "testMatch": self.test_matcher.patterns,
                "testRegex": self.host.test_regex_patterns(),
                "references": self
                    .references
                    .iter()
                    .map(|r| &r.config_path)
                    .collect::<Vec<_>>(),
            });
            hash_config(&fingerprint)
        })
    }
}

impl std::fmt::Debug for ConfigSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigSet")
            .field("root_dir", &self.host.root_dir)
            .field("tsconfig_path", &self.tsconfig_path)
            .field("isolated_modules", &self.isolated_modules)
            .field("compiler_name", &self.compiler_name)
            .finish_non_exhaustive()
    }
}
