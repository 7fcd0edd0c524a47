//! Mock implementations for testing

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tsjest_core::diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticHandler};
use tsjest_core::transformer::{FallbackTransformer, TransformedSource};

/// A mock diagnostic handler that collects diagnostics
#[derive(Debug, Default)]
pub struct MockDiagnosticHandler {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl MockDiagnosticHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Codes of every diagnostic reported so far, in order
    pub fn codes(&self) -> Vec<u32> {
        self.diagnostics.lock().unwrap().iter().map(|d| d.code).collect()
    }

    pub fn messages_with_code(&self, code: u32) -> Vec<String> {
        self.diagnostics
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.code == code)
            .map(|d| d.message.clone())
            .collect()
    }

    fn count(&self, category: DiagnosticCategory) -> usize {
        self.diagnostics
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.category == category)
            .count()
    }
}

impl DiagnosticHandler for MockDiagnosticHandler {
    fn report(&self, diagnostic: Diagnostic) {
        self.diagnostics.lock().unwrap().push(diagnostic);
    }

    fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    fn error_count(&self) -> usize {
        self.count(DiagnosticCategory::Error)
    }

    fn warning_count(&self) -> usize {
        self.count(DiagnosticCategory::Warning)
    }
}

/// Fallback transformer that tags its input and remembers every call
#[derive(Debug)]
pub struct RecordingFallback {
    name: String,
    calls: Mutex<Vec<(PathBuf, bool)>>,
}

impl RecordingFallback {
    /// Header prepended to everything this transformer returns
    pub const MARKER: &'static str = "/* babel */\n";

    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// `(path, instrument)` for every call so far
    pub fn calls(&self) -> Vec<(PathBuf, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

impl FallbackTransformer for RecordingFallback {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(
        &self,
        source: &str,
        path: &Path,
        instrument: bool,
    ) -> Result<TransformedSource, String> {
        self.calls
            .lock()
            .unwrap()
            .push((path.to_path_buf(), instrument));
        Ok(TransformedSource::new(format!("{}{source}", Self::MARKER)))
    }
}
