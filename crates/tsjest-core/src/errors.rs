use std::path::PathBuf;
use thiserror::Error;

/// Fatal setup errors: raised while building a configuration set
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {}: {message}", path.display())]
    InvalidJson { path: PathBuf, message: String },

    #[error("TypeScript config file not found: {}", path.display())]
    TsConfigNotFound { path: PathBuf },

    #[error("tsconfig extends cycle detected at {}", path.display())]
    ExtendsCycle { path: PathBuf },

    #[error("Unable to resolve compiler module '{name}' (registered: {registered})")]
    UnknownCompiler { name: String, registered: String },

    #[error("Invalid regular expression for {option}: {message}")]
    InvalidRegex { option: &'static str, message: String },

    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidGlob { pattern: String, message: String },

    #[error("Invalid diagnostic code '{value}'")]
    InvalidDiagnosticCode { value: String },

    #[error("Invalid host configuration: {0}")]
    InvalidHostConfig(String),

    #[error("Invalid value for option '{option}': {message}")]
    InvalidOption { option: String, message: String },
}

/// Compiler diagnostics that survived filtering, formatted as one message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unable to compile TypeScript:\n{diagnostic_text}")]
pub struct TsError {
    pub diagnostic_text: String,
    pub diagnostic_codes: Vec<u32>,
}

/// Per-file failures: abort the file being processed, never the run
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Diagnostics(#[from] TsError),

    #[error("{}: Emit skipped for language service", file.display())]
    EmitSkipped { file: PathBuf },

    #[error(
        "Unable to require `.d.ts` file.\nThis is usually the result of a faulty configuration or import. \
         Make sure there is a `.js`, `.json` or another executable extension available alongside `{}`.",
        file.display()
    )]
    NoOutput { file: PathBuf },

    #[error(
        "Could not find output JavaScript file for input {} (looked at {}).\n\
         The input file is part of a project reference located at {}, so the pre-built output is read from disk. \
         Try running `tsc --build` to build project references.",
        input.display(),
        expected.display(),
        project.display()
    )]
    MissingReferencedOutput {
        input: PathBuf,
        expected: PathBuf,
        project: PathBuf,
    },

    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CompileError {
    /// Diagnostic codes carried by the error, empty for non-diagnostic failures
    pub fn diagnostic_codes(&self) -> &[u32] {
        match self {
            CompileError::Diagnostics(err) => &err.diagnostic_codes,
            _ => &[],
        }
    }
}

/// Errors surfaced through the transformer entry points
#[derive(Debug, Error)]
pub enum TransformError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("Fallback transformer '{name}' failed: {message}")]
    Fallback { name: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ts_error_message() {
        let err = TsError {
            diagnostic_text: "a.ts(1,7): error TS2322: nope\n".to_string(),
            diagnostic_codes: vec![2322],
        };
        assert!(err.to_string().starts_with("Unable to compile TypeScript:\n"));
        assert!(err.to_string().contains("TS2322"));
    }

    #[test]
    fn test_diagnostic_codes_only_for_diagnostics() {
        let err = CompileError::from(TsError {
            diagnostic_text: String::new(),
            diagnostic_codes: vec![2322, 1005],
        });
        assert_eq!(err.diagnostic_codes(), &[2322, 1005]);

        let skipped = CompileError::EmitSkipped {
            file: PathBuf::from("a.ts"),
        };
        assert!(skipped.diagnostic_codes().is_empty());
    }

    #[test]
    fn test_missing_reference_names_remediation() {
        let err = CompileError::MissingReferencedOutput {
            input: PathBuf::from("lib/src/a.ts"),
            expected: PathBuf::from("lib/dist/a.js"),
            project: PathBuf::from("lib/tsconfig.json"),
        };
        let message = err.to_string();
        assert!(message.contains("lib/dist/a.js"));
        assert!(message.contains("tsc --build"));
    }
}
