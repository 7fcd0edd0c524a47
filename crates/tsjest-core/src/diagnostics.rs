use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::{error, info, warn};

/// Codes reported by this crate itself, outside of the compiler's own range
pub mod codes {
    /// A JavaScript file reached the transformer while `allowJs` is off
    pub const JS_FILE_WITHOUT_ALLOW_JS: u32 = 151002;
    /// A file with an extension the transformer does not handle
    pub const UNKNOWN_FILE_TYPE: u32 = 151003;
}

/// Diagnostic severity, matching the compiler's categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticCategory {
    Error,
    Warning,
    Suggestion,
    Message,
}

impl DiagnosticCategory {
    fn label(self) -> &'static str {
        match self {
            DiagnosticCategory::Error => "error",
            DiagnosticCategory::Warning => "warning",
            DiagnosticCategory::Suggestion => "suggestion",
            DiagnosticCategory::Message => "message",
        }
    }

    fn color(self) -> &'static str {
        match self {
            DiagnosticCategory::Error => "\x1b[91m",
            DiagnosticCategory::Warning => "\x1b[93m",
            DiagnosticCategory::Suggestion => "\x1b[90m",
            DiagnosticCategory::Message => "\x1b[94m",
        }
    }
}

/// Zero-based line/character position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// A structured issue reported by the compiler or by this crate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub category: DiagnosticCategory,
    pub code: u32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
}

impl Diagnostic {
    pub fn new(category: DiagnosticCategory, code: u32, message: impl Into<String>) -> Self {
        Self {
            category,
            code,
            message: message.into(),
            file: None,
            start: None,
            length: None,
        }
    }

    pub fn error(code: u32, message: impl Into<String>) -> Self {
        Self::new(DiagnosticCategory::Error, code, message)
    }

    pub fn warning(code: u32, message: impl Into<String>) -> Self {
        Self::new(DiagnosticCategory::Warning, code, message)
    }

    pub fn message(code: u32, message: impl Into<String>) -> Self {
        Self::new(DiagnosticCategory::Message, code, message)
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_span(mut self, start: Position, length: u32) -> Self {
        self.start = Some(start);
        self.length = Some(length);
        self
    }

    /// Errors and warnings are the categories that may fail a compile
    pub fn is_important(&self) -> bool {
        matches!(
            self.category,
            DiagnosticCategory::Error | DiagnosticCategory::Warning
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}", file.display())?;
            if let Some(start) = self.start {
                write!(f, "({},{})", start.line + 1, start.character + 1)?;
            }
            write!(f, ": ")?;
        }
        write!(
            f,
            "{} TS{}: {}",
            self.category.label(),
            self.code,
            self.message
        )
    }
}

fn display_path(file: &Path, cwd: &Path) -> String {
    file.strip_prefix(cwd)
        .unwrap_or(file)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Plain formatting, one diagnostic per line: `file(line,col): error TS1234: message`
pub fn format_diagnostics(diagnostics: &[Diagnostic], cwd: &Path) -> String {
    let mut out = String::new();
    for diagnostic in diagnostics {
        if let Some(file) = &diagnostic.file {
            out.push_str(&display_path(file, cwd));
            if let Some(start) = diagnostic.start {
                out.push_str(&format!("({},{})", start.line + 1, start.character + 1));
            }
            out.push_str(": ");
        }
        out.push_str(&format!(
            "{} TS{}: {}\n",
            diagnostic.category.label(),
            diagnostic.code,
            diagnostic.message
        ));
    }
    out
}

/// Colored formatting with the offending source line underneath
///
/// `source_of` supplies file contents for the context lines; files it cannot
/// provide are printed without context.
pub fn format_diagnostics_with_color_and_context(
    diagnostics: &[Diagnostic],
    cwd: &Path,
    source_of: impl Fn(&Path) -> Option<String>,
) -> String {
    const RESET: &str = "\x1b[0m";
    const CYAN: &str = "\x1b[96m";
    const YELLOW: &str = "\x1b[93m";
    const GREY: &str = "\x1b[90m";

    let mut out = String::new();
    for diagnostic in diagnostics {
        if let Some(file) = &diagnostic.file {
            out.push_str(&format!("{CYAN}{}{RESET}", display_path(file, cwd)));
            if let Some(start) = diagnostic.start {
                out.push_str(&format!(
                    ":{YELLOW}{}{RESET}:{YELLOW}{}{RESET}",
                    start.line + 1,
                    start.character + 1
                ));
            }
            out.push_str(" - ");
        }
        out.push_str(&format!(
            "{}{}{RESET}{GREY} TS{}:{RESET} {}\n",
            diagnostic.category.color(),
            diagnostic.category.label(),
            diagnostic.code,
            diagnostic.message
        ));

        let context = diagnostic
            .file
            .as_deref()
            .zip(diagnostic.start)
            .and_then(|(file, start)| {
                let source = source_of(file)?;
                let line = source.lines().nth(start.line as usize)?.to_string();
                Some((start, line))
            });
        if let Some((start, line)) = context {
            let number = (start.line + 1).to_string();
            let underline = "~".repeat(diagnostic.length.unwrap_or(1).max(1) as usize);
            out.push_str(&format!("\n\x1b[7m{number}{RESET} {line}\n"));
            out.push_str(&format!(
                "\x1b[7m{}{RESET} {}{}{underline}{RESET}\n\n",
                " ".repeat(number.len()),
                " ".repeat(start.character as usize),
                diagnostic.category.color(),
            ));
        }
    }
    out
}

/// Trait for handling diagnostics
/// This allows for dependency injection and testing with mock handlers
pub trait DiagnosticHandler: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);

    fn warning(&self, code: u32, message: &str) {
        self.report(Diagnostic::warning(code, message));
    }

    fn has_errors(&self) -> bool;
    fn error_count(&self) -> usize;
    fn warning_count(&self) -> usize;
}

/// Production handler: forwards every diagnostic to `tracing`
///
/// Only counts are kept; a worker process lives for a whole test run.
#[derive(Debug, Default)]
pub struct ConsoleDiagnosticHandler {
    errors: AtomicUsize,
    warnings: AtomicUsize,
}

impl ConsoleDiagnosticHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DiagnosticHandler for ConsoleDiagnosticHandler {
    fn report(&self, diagnostic: Diagnostic) {
        match diagnostic.category {
            DiagnosticCategory::Error => {
                error!(code = diagnostic.code, "{}", diagnostic.message);
                self.errors.fetch_add(1, Ordering::Relaxed);
            }
            DiagnosticCategory::Warning => {
                warn!(code = diagnostic.code, "{}", diagnostic.message);
                self.warnings.fetch_add(1, Ordering::Relaxed);
            }
            DiagnosticCategory::Suggestion | DiagnosticCategory::Message => {
                info!(code = diagnostic.code, "{}", diagnostic.message)
            }
        }
    }

    fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    fn error_count(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }

    fn warning_count(&self) -> usize {
        self.warnings.load(Ordering::Relaxed)
    }
}

/// Collecting diagnostic handler for testing
/// Collects all diagnostics without logging
pub struct CollectingDiagnosticHandler {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl CollectingDiagnosticHandler {
    pub fn new() -> Self {
        Self {
            diagnostics: Mutex::new(Vec::new()),
        }
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().unwrap().clone()
    }
}

impl Default for CollectingDiagnosticHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticHandler for CollectingDiagnosticHandler {
    fn report(&self, diagnostic: Diagnostic) {
        self.diagnostics.lock().unwrap().push(diagnostic);
    }

    fn has_errors(&self) -> bool {
        self.diagnostics
            .lock()
            .unwrap()
            .iter()
            .any(|d| d.category == DiagnosticCategory::Error)
    }

    fn error_count(&self) -> usize {
        self.diagnostics
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.category == DiagnosticCategory::Error)
            .count()
    }

    fn warning_count(&self) -> usize {
        self.diagnostics
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.category == DiagnosticCategory::Warning)
            .count()
    }
}
