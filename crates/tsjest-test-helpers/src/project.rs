//! In-memory project wiring for end-to-end transformer tests

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tsjest_core::config::{HostConfig, TsJestOptions};
use tsjest_core::di::Container;
use tsjest_core::fs::{FileSystem, MockFileSystem};
use tsjest_core::transformer::{FallbackTransformer, TsJestTransformer};
use tsjest_core::typescript::CompilerRegistry;

use crate::fake_typescript::{FakeStats, FakeTypeScript};
use crate::mocks::MockDiagnosticHandler;

pub const PROJECT_ROOT: &str = "/project";
pub const CACHE_DIR: &str = "/project/.cache";

/// A project rooted at [`PROJECT_ROOT`] on a [`MockFileSystem`]
///
/// Transformers created from the same project share the file system, so a
/// second transformer behaves like a fresh worker process of the same run.
pub struct TestProject {
    pub fs: Arc<MockFileSystem>,
    pub typescript: Arc<FakeTypeScript>,
    pub diagnostics: Arc<MockDiagnosticHandler>,
    fallback: Option<Arc<dyn FallbackTransformer>>,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            fs: Arc::new(MockFileSystem::new()),
            typescript: Arc::new(FakeTypeScript::new()),
            diagnostics: MockDiagnosticHandler::new(),
            fallback: None,
        }
    }

    /// Add `content` at `relative` under the root
    pub fn file(self, relative: &str, content: &str) -> Self {
        self.add_file(relative, content);
        self
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackTransformer>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn add_file(&self, relative: &str, content: &str) {
        self.fs.add_file(self.path(relative), content);
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        Path::new(PROJECT_ROOT).join(relative)
    }

    pub fn read(&self, relative: &str) -> Option<String> {
        self.fs.read_file(&self.path(relative)).ok()
    }

    pub fn touch(&self, relative: &str) {
        self.fs.touch(self.path(relative));
    }

    pub fn stats(&self) -> Arc<FakeStats> {
        self.typescript.stats()
    }

    /// Host configuration with the given `ts-jest` options and the cache dir
    pub fn host_config(&self, options: TsJestOptions) -> Arc<HostConfig> {
        Arc::new(
            HostConfig::new(PROJECT_ROOT)
                .with_cache_directory(CACHE_DIR)
                .with_ts_jest(&options),
        )
    }

    pub fn container(&self) -> Container {
        let container = Container::with_dependencies(
            CompilerRegistry::with_default(self.typescript.clone()),
            self.diagnostics.clone(),
            self.fs.clone(),
        );
        match &self.fallback {
            Some(fallback) => container.with_fallback_transformer(fallback.clone()),
            None => container,
        }
    }

    pub fn transformer(&self) -> TsJestTransformer {
        TsJestTransformer::new(self.container())
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}
