//! Boundary to the TypeScript compiler
//!
//! The compiler itself is an external collaborator. These traits mirror the
//! parts of its API that the core drives: the stateful language service (with
//! a host that owns the script table) and the stateless `transpileModule`.

use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::CompilerOptions;
use crate::diagnostics::Diagnostic;
use crate::errors::ConfigError;

/// Registry name of the default compiler module
pub const DEFAULT_COMPILER: &str = "typescript";

/// A compiler module: the factory for language services and the transpiler
pub trait TypeScript: Send + Sync {
    /// Compiler version, part of every configuration fingerprint
    fn version(&self) -> &str;

    fn create_language_service(&self) -> Box<dyn LanguageService>;

    fn transpile_module(&self, input: &str, options: &TranspileOptions<'_>) -> TranspileOutput;
}

pub struct TranspileOptions<'a> {
    pub file_name: &'a Path,
    pub compiler_options: &'a CompilerOptions,
    pub report_diagnostics: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranspileOutput {
    pub output_text: String,
    pub source_map_text: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub name: PathBuf,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitOutput {
    pub output_files: Vec<OutputFile>,
    pub emit_skipped: bool,
}

/// Callbacks the language service uses to see the project
///
/// Versions are opaque to the service: it only compares them with the values
/// it saw last time to decide what to recompute.
pub trait LanguageServiceHost {
    fn project_version(&self) -> u64;

    fn script_file_names(&self) -> Vec<PathBuf>;

    fn script_version(&self, file: &Path) -> Option<u64>;

    /// Current text of `file`. Files not tracked yet are read from disk and
    /// start being tracked.
    fn script_snapshot(&mut self, file: &Path) -> Option<String>;

    fn compilation_settings(&self) -> &CompilerOptions;

    fn current_directory(&self) -> &Path;

    fn file_exists(&self, path: &Path) -> bool;

    fn read_file(&self, path: &Path) -> Option<String>;
}

/// Stateful, incremental, type-checking compiler API
pub trait LanguageService: Send {
    fn get_emit_output(&mut self, host: &mut dyn LanguageServiceHost, file: &Path) -> EmitOutput;

    fn get_syntactic_diagnostics(
        &mut self,
        host: &mut dyn LanguageServiceHost,
        file: &Path,
    ) -> Vec<Diagnostic>;

    fn get_semantic_diagnostics(
        &mut self,
        host: &mut dyn LanguageServiceHost,
        file: &Path,
    ) -> Vec<Diagnostic>;

    /// Absolute paths of the modules `file` imports directly
    fn get_resolved_modules(&mut self, host: &mut dyn LanguageServiceHost, file: &Path)
        -> Vec<PathBuf>;
}

/// Compiler modules selectable by name from the `compiler` option
#[derive(Clone, Default)]
pub struct CompilerRegistry {
    modules: FxHashMap<String, Arc<dyn TypeScript>>,
}

impl CompilerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding a single module under [`DEFAULT_COMPILER`]
    pub fn with_default(module: Arc<dyn TypeScript>) -> Self {
        let mut registry = Self::new();
        registry.register(DEFAULT_COMPILER, module);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, module: Arc<dyn TypeScript>) {
        self.modules.insert(name.into(), module);
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn TypeScript>, ConfigError> {
        self.modules
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownCompiler {
                name: name.to_string(),
                registered: self.names().join(", "),
            })
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.modules.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for CompilerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilerRegistry")
            .field("modules", &self.names())
            .finish()
    }
}
