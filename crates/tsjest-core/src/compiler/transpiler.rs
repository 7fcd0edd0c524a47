use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use super::{finalize_output, CompiledOutput, TsCompiler};
use crate::config::{ConfigSet, ProjectReference, TransformOptions};
use crate::errors::CompileError;
use crate::fs::normalize_path;
use crate::typescript::TranspileOptions;

/// Per-file transpilation without cross-file type information
pub struct TranspileCompiler {
    config: Arc<ConfigSet>,
}

impl TranspileCompiler {
    pub fn new(config: Arc<ConfigSet>) -> Self {
        debug!(compiler = config.compiler_name(), "Using isolated modules");
        Self { config }
    }

    /// Read what `tsc --build` wrote for `path`
    fn read_referenced_output(
        &self,
        reference: &ProjectReference,
        path: &Path,
    ) -> Result<CompiledOutput, CompileError> {
        let fs = self.config.file_system();
        let expected = reference.output_file_for(path);
        if !fs.file_exists(&expected) {
            return Err(CompileError::MissingReferencedOutput {
                input: path.to_path_buf(),
                expected,
                project: reference.config_path.clone(),
            });
        }

        let code = fs.read_file(&expected).map_err(|source| CompileError::Io {
            path: expected.clone(),
            source,
        })?;
        let mut map_path = expected.clone().into_os_string();
        map_path.push(".map");
        let map = fs.read_file(&PathBuf::from(map_path)).ok();

        debug!("Using pre-built output {:?} for {:?}", expected, path);
        Ok(finalize_output(&code, map.as_deref(), path))
    }
}

impl TsCompiler for TranspileCompiler {
    fn compile(
        &mut self,
        content: &str,
        path: &Path,
        options: &TransformOptions,
    ) -> Result<CompiledOutput, CompileError> {
        let path = normalize_path(path);
        if let Some(reference) = self.config.project_reference_for(&path) {
            return self.read_referenced_output(reference, &path);
        }

        let compiler_options = self.config.compiler_options_for(options);
        let report_diagnostics = self.config.should_report_diagnostic(&path);
        let output = self.config.compiler_module().transpile_module(
            content,
            &TranspileOptions {
                file_name: &path,
                compiler_options: &compiler_options,
                report_diagnostics,
            },
        );

        if report_diagnostics {
            self.config.raise_diagnostics(output.diagnostics, &path)?;
        }

        Ok(finalize_output(
            &output.output_text,
            output.source_map_text.as_deref(),
            &path,
        ))
    }

    /// Imports are not resolved without a program
    fn resolved_modules(
        &mut self,
        _content: &str,
        _path: &Path,
    ) -> Result<Vec<PathBuf>, CompileError> {
        Ok(Vec::new())
    }
}
