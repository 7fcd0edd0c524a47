use indexmap::IndexSet;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::memory_cache::{FileUpdate, MemoryFileTable};
use super::{finalize_output, is_node_modules, CompiledOutput, TsCompiler};
use crate::cache::DependencyGraphCache;
use crate::config::{CompilerOptions, ConfigSet, TransformOptions};
use crate::diagnostics::Diagnostic;
use crate::errors::CompileError;
use crate::fs::{normalize_path, FileSystem};
use crate::typescript::{EmitOutput, LanguageService, LanguageServiceHost};

/// Host side of the language service: script table, versions and options
struct ServiceHost {
    files: MemoryFileTable,
    /// Project inputs from the tsconfig, part of the program before any compile
    root_files: IndexSet<PathBuf>,
    project_version: u64,
    options: CompilerOptions,
    cwd: PathBuf,
    file_system: Arc<dyn FileSystem>,
}

impl ServiceHost {
    fn new(
        options: CompilerOptions,
        root_files: IndexSet<PathBuf>,
        cwd: PathBuf,
        file_system: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            files: MemoryFileTable::new(),
            root_files,
            project_version: 1,
            options,
            cwd,
            file_system,
        }
    }

    fn update_file(&mut self, path: &Path, text: &str) -> FileUpdate {
        let update = self.files.update(path, text);
        if update.is_dirty() {
            self.project_version += 1;
        }
        update
    }

    fn set_options(&mut self, options: CompilerOptions) {
        if self.options != options {
            debug!("Compiler options changed, invalidating project");
            self.options = options;
            self.project_version += 1;
        }
    }
}

impl LanguageServiceHost for ServiceHost {
    fn project_version(&self) -> u64 {
        self.project_version
    }

    fn script_file_names(&self) -> Vec<PathBuf> {
        let mut names = self.files.paths();
        names.extend(
            self.root_files
                .iter()
                .filter(|file| !self.files.contains(file))
                .cloned(),
        );
        names.sort();
        names
    }

    /// Root files not read yet report version 0
    fn script_version(&self, file: &Path) -> Option<u64> {
        let file = normalize_path(file);
        self.files
            .version(&file)
            .or_else(|| self.root_files.contains(&file).then_some(0))
    }

    fn script_snapshot(&mut self, file: &Path) -> Option<String> {
        let file = normalize_path(file);
        if let Some(text) = self.files.text(&file) {
            return Some(text.to_string());
        }
        let text = self.file_system.read_file(&file).ok()?;
        if self.root_files.contains(&file) {
            // Already part of the program, reading it changes nothing
            self.files.update(&file, &text);
        } else {
            // Files outside the project list, e.g. resolved from node_modules
            self.update_file(&file, &text);
        }
        Some(text)
    }

    fn compilation_settings(&self) -> &CompilerOptions {
        &self.options
    }

    fn current_directory(&self) -> &Path {
        &self.cwd
    }

    fn file_exists(&self, path: &Path) -> bool {
        let path = normalize_path(path);
        self.files.contains(&path) || self.file_system.file_exists(&path)
    }

    fn read_file(&self, path: &Path) -> Option<String> {
        let path = normalize_path(path);
        match self.files.text(&path) {
            Some(text) => Some(text.to_string()),
            None => self.file_system.read_file(&path).ok(),
        }
    }
}

/// Full, type-checked compilation through a language service
pub struct LanguageServiceCompiler {
    config: Arc<ConfigSet>,
    service: Box<dyn LanguageService>,
    host: ServiceHost,
    graph: DependencyGraphCache,
}

impl LanguageServiceCompiler {
    pub fn new(config: Arc<ConfigSet>) -> Self {
        let file_system = config.file_system().clone();
        let graph = DependencyGraphCache::open(file_system.clone(), config.cache_directory());
        let root_files: IndexSet<PathBuf> = config
            .file_names()
            .iter()
            .filter(|file| !config.is_test_file(file))
            .cloned()
            .collect();
        debug!("Seeding language service with {} project files", root_files.len());
        let host = ServiceHost::new(
            config.compiler_options_for(&TransformOptions::default()),
            root_files,
            config.cwd().to_path_buf(),
            file_system,
        );
        let service = config.compiler_module().create_language_service();
        info!(
            compiler = config.compiler_name(),
            version = config.compiler_module().version(),
            "Created language service"
        );

        Self {
            config,
            service,
            host,
            graph,
        }
    }

    fn diagnostics_for(&mut self, path: &Path) -> Vec<Diagnostic> {
        let mut diagnostics = self.service.get_syntactic_diagnostics(&mut self.host, path);
        diagnostics.extend(self.service.get_semantic_diagnostics(&mut self.host, path));
        diagnostics
    }

    fn type_check(&mut self, path: &Path) -> Result<(), CompileError> {
        if !self.config.should_report_diagnostic(path) {
            return Ok(());
        }
        let diagnostics = self.diagnostics_for(path);
        self.config.raise_diagnostics(diagnostics, path)?;
        Ok(())
    }

    /// Breadth-first walk over imports, skipping `node_modules`
    fn collect_resolved_modules(&mut self, path: &Path) -> Vec<PathBuf> {
        let mut seen: IndexSet<PathBuf> = IndexSet::new();
        let mut queue = VecDeque::from([path.to_path_buf()]);

        while let Some(file) = queue.pop_front() {
            for module in self.service.get_resolved_modules(&mut self.host, &file) {
                let module = normalize_path(&module);
                if module == path || is_node_modules(&module) {
                    continue;
                }
                if seen.insert(module.clone()) {
                    queue.push_back(module);
                }
            }
        }

        seen.into_iter().collect()
    }

    /// Re-check recorded test files that import `path` but are not loaded
    ///
    /// Their diagnostics were computed against the old content of `path`.
    fn revalidate_dependents(&mut self, path: &Path) -> Result<(), CompileError> {
        let dependents: Vec<PathBuf> = self
            .graph
            .dependents_of(path)
            .into_iter()
            .filter(|test_file| !self.host.files.contains(test_file))
            .collect();

        for test_file in dependents {
            let Some(snapshot) = self
                .config
                .file_system()
                .read_file(&test_file)
                .ok()
                .or_else(|| self.graph.entry(&test_file).map(|e| e.file_content.clone()))
            else {
                continue;
            };
            debug!("Re-checking {:?} after {:?} changed", test_file, path);
            self.host.update_file(&test_file, &snapshot);
            self.type_check(&test_file)?;
        }
        Ok(())
    }

    fn select_output(path: &Path, emit: EmitOutput) -> Result<CompiledOutput, CompileError> {
        if emit.emit_skipped {
            return Err(CompileError::EmitSkipped {
                file: path.to_path_buf(),
            });
        }

        let mut code = None;
        let mut map = None;
        for output in emit.output_files {
            let name = output.name.to_string_lossy();
            if name.ends_with(".map") {
                map.get_or_insert(output.text);
            } else if !name.ends_with(".d.ts") {
                code.get_or_insert(output.text);
            }
        }

        let code = code.ok_or_else(|| CompileError::NoOutput {
            file: path.to_path_buf(),
        })?;
        Ok(finalize_output(&code, map.as_deref(), path))
    }
}

impl TsCompiler for LanguageServiceCompiler {
    fn compile(
        &mut self,
        content: &str,
        path: &Path,
        options: &TransformOptions,
    ) -> Result<CompiledOutput, CompileError> {
        let path = normalize_path(path);
        self.host
            .set_options(self.config.compiler_options_for(options));
        self.host.update_file(&path, content);

        let project_version = self.host.project_version;
        if let Some(output) = self.host.files.output(&path, project_version) {
            debug!("Reusing compiled output for {:?}", path);
            return Ok(output.clone());
        }

        debug!("Compiling {:?}", path);
        let emit = self.service.get_emit_output(&mut self.host, &path);

        self.type_check(&path)?;

        if self.config.is_test_file(&path) {
            let modules = self.collect_resolved_modules(&path);
            self.graph.record_modules_for(&path, content, modules);
        } else {
            self.revalidate_dependents(&path)?;
        }

        let output = Self::select_output(&path, emit)?;
        // Dependents may have been loaded above, which moves the project on
        self.host
            .files
            .store_output(&path, self.host.project_version, output.clone());
        Ok(output)
    }

    fn resolved_modules(
        &mut self,
        content: &str,
        path: &Path,
    ) -> Result<Vec<PathBuf>, CompileError> {
        let path = normalize_path(path);
        if let Some(modules) = self.graph.lookup_valid(&path, content) {
            return Ok(modules.to_vec());
        }

        self.host.update_file(&path, content);
        let modules = self.collect_resolved_modules(&path);
        if self.config.is_test_file(&path) {
            self.graph.record_modules_for(&path, content, modules.clone());
        }
        Ok(modules)
    }
}
