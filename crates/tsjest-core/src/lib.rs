pub mod cache;
pub mod compiler;
pub mod config;
pub mod di;
pub mod diagnostics;
pub mod errors;
pub mod fs;
pub mod memoize;
pub mod transformer;
pub mod typescript;

pub use cache::{DependencyGraphCache, DependencyGraphEntry};
pub use compiler::{create_compiler, CompiledOutput, TsCompiler};
pub use config::{
    CompilerOptions, ConfigSet, HostConfig, ModuleKind, ScriptTarget, TransformOptions,
    TsJestOptions,
};
pub use di::Container;
pub use diagnostics::{
    codes, Diagnostic, DiagnosticCategory, DiagnosticHandler, Position,
};
pub use errors::{CompileError, ConfigError, TransformError, TsError};
pub use transformer::{FallbackTransformer, TransformedSource, TsJestTransformer};
pub use typescript::{CompilerRegistry, LanguageService, LanguageServiceHost, TypeScript};
