//! A deterministic stand-in for the TypeScript compiler
//!
//! [`FakeTypeScript`] understands just enough TypeScript for the fixtures in
//! this crate: it strips simple type annotations, rewrites `import`/`export`
//! to CommonJS when the module kind asks for it, resolves relative and
//! `node_modules` imports through the host, and reports TS1005 for
//! unbalanced braces, TS2322 for literal type mismatches (including values
//! imported from other files) and TS2304 for `__NAME__` globals that no
//! declaration file of the program declares.
//!
//! Every call is counted in [`FakeStats`] so tests can assert how much work
//! the core asked the compiler to do.

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashSet;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tsjest_core::config::{is_declaration_file, CompilerOptions};
use tsjest_core::diagnostics::{Diagnostic, Position};
use tsjest_core::fs::normalize_path;
use tsjest_core::typescript::{
    EmitOutput, LanguageService, LanguageServiceHost, OutputFile, TranspileOptions,
    TranspileOutput, TypeScript,
};

/// Unbalanced braces
pub const MISSING_TOKEN: u32 = 1005;
/// Type mismatch, e.g. `const x: string = 5`
pub const TYPE_NOT_ASSIGNABLE: u32 = 2322;
/// Use of an ambient global no program file declares
pub const CANNOT_FIND_NAME: u32 = 2304;

const IDENT: &str = r"[A-Za-z_$][\w$]*";
const TYPE: &str = r"[A-Za-z_$][\w$.]*(?:<[^>]*>)?(?:\[\])*";

static TYPE_DECLARATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:export\s+)?(?:interface|type|declare)\s").unwrap());
static TYPE_ONLY_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:import|export)\s+type\s").unwrap());
static VAR_ANNOTATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b(const|let|var)\s+({IDENT})\s*:\s*[^=;]+?(\s*[=;])")).unwrap()
});
static RETURN_ANNOTATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"\)\s*:\s*{TYPE}\s*(\{{|=>)")).unwrap());
static PARAM_ANNOTATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"({IDENT})\??\s*:\s*{TYPE}(\s*[,)=])")).unwrap());

static IMPORT_NAMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*import\s*\{([^}]*)\}\s*from\s*['"]([^'"]+)['"]\s*;?\s*$"#).unwrap()
});
static IMPORT_DEFAULT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r#"^\s*import\s+({IDENT})\s+from\s*['"]([^'"]+)['"]\s*;?\s*$"#)).unwrap()
});
static IMPORT_NAMESPACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r#"^\s*import\s*\*\s*as\s+({IDENT})\s+from\s*['"]([^'"]+)['"]\s*;?\s*$"#
    ))
    .unwrap()
});
static IMPORT_BARE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*import\s*['"]([^'"]+)['"]\s*;?\s*$"#).unwrap());
static EXPORT_DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(\s*)export\s+((?:async\s+)?(?:const|let|var|function|class)\s+({IDENT}))"
    ))
    .unwrap()
});
static EXPORT_DEFAULT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\s*)export\s+default\s+").unwrap());
static EXPORT_LIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*export\s*\{([^}]*)\}\s*;?\s*$").unwrap());

static MODULE_SPECIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?:\bfrom|^\s*import|\brequire\()\s*['"]([^'"]+)['"]"#).unwrap());
static VALUE_DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^\s*(?:export\s+)?(?:const|let|var)\s+({IDENT})\s*(?::\s*({TYPE})\s*)?=\s*(.+?)\s*;?\s*$"
    ))
    .unwrap()
});

static AMBIENT_GLOBAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b__[A-Z][A-Z0-9_]*__\b").unwrap());
static AMBIENT_DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*declare\s+(?:const|let|var)\s+(__[A-Z][A-Z0-9_]*__)\b").unwrap()
});

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(&format!("^{IDENT}$")).unwrap());

const PRIMITIVES: &[&str] = &["string", "number", "boolean"];

const RESOLVE_SUFFIXES: &[&str] = &[".ts", ".tsx", ".d.ts", ".js", "/index.ts", "/index.d.ts", "/index.js"];

/// Call counters shared by the fake and every service it created
#[derive(Debug, Default)]
pub struct FakeStats {
    emits: AtomicUsize,
    transpiles: AtomicUsize,
    semantic_checks: AtomicUsize,
    program_builds: AtomicUsize,
    program_files: Mutex<Vec<PathBuf>>,
}

impl FakeStats {
    pub fn emits(&self) -> usize {
        self.emits.load(Ordering::SeqCst)
    }

    pub fn transpiles(&self) -> usize {
        self.transpiles.load(Ordering::SeqCst)
    }

    pub fn semantic_checks(&self) -> usize {
        self.semantic_checks.load(Ordering::SeqCst)
    }

    /// Number of times a service saw a new project version
    pub fn program_builds(&self) -> usize {
        self.program_builds.load(Ordering::SeqCst)
    }

    /// Script names the host listed at the last emit
    pub fn program_files(&self) -> Vec<PathBuf> {
        self.program_files.lock().unwrap().clone()
    }

    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// Fake compiler module
pub struct FakeTypeScript {
    version: String,
    stats: Arc<FakeStats>,
    skip_emit: Arc<Mutex<FxHashSet<PathBuf>>>,
}

impl FakeTypeScript {
    pub fn new() -> Self {
        Self::with_version("5.4.5-fake")
    }

    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            stats: Arc::new(FakeStats::default()),
            skip_emit: Arc::new(Mutex::new(FxHashSet::default())),
        }
    }

    pub fn stats(&self) -> Arc<FakeStats> {
        self.stats.clone()
    }

    /// Make every language service report `emitSkipped` for `path`
    pub fn skip_emit(&self, path: impl AsRef<Path>) {
        self.skip_emit
            .lock()
            .unwrap()
            .insert(normalize_path(path.as_ref()));
    }
}

impl Default for FakeTypeScript {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeScript for FakeTypeScript {
    fn version(&self) -> &str {
        &self.version
    }

    fn create_language_service(&self) -> Box<dyn LanguageService> {
        Box::new(FakeLanguageService {
            stats: self.stats.clone(),
            skip_emit: self.skip_emit.clone(),
            seen_project_version: None,
        })
    }

    fn transpile_module(&self, input: &str, options: &TranspileOptions<'_>) -> TranspileOutput {
        FakeStats::bump(&self.stats.transpiles);
        let (output_text, source_map_text) =
            emit_javascript(input, options.file_name, options.compiler_options);
        let diagnostics = if options.report_diagnostics {
            syntactic_diagnostics(input, options.file_name)
        } else {
            Vec::new()
        };
        TranspileOutput {
            output_text,
            source_map_text,
            diagnostics,
        }
    }
}

struct FakeLanguageService {
    stats: Arc<FakeStats>,
    skip_emit: Arc<Mutex<FxHashSet<PathBuf>>>,
    seen_project_version: Option<u64>,
}

impl FakeLanguageService {
    fn sync(&mut self, host: &dyn LanguageServiceHost) {
        let version = host.project_version();
        if self.seen_project_version != Some(version) {
            FakeStats::bump(&self.stats.program_builds);
            self.seen_project_version = Some(version);
        }
    }
}

impl LanguageService for FakeLanguageService {
    fn get_emit_output(&mut self, host: &mut dyn LanguageServiceHost, file: &Path) -> EmitOutput {
        FakeStats::bump(&self.stats.emits);
        self.sync(host);
        *self.stats.program_files.lock().unwrap() = host.script_file_names();

        if self.skip_emit.lock().unwrap().contains(&normalize_path(file)) {
            return EmitOutput {
                output_files: Vec::new(),
                emit_skipped: true,
            };
        }
        if is_declaration_file(file) {
            return EmitOutput::default();
        }
        let Some(text) = host.script_snapshot(file) else {
            return EmitOutput {
                output_files: Vec::new(),
                emit_skipped: true,
            };
        };

        let (code, map) = emit_javascript(&text, file, host.compilation_settings());
        let js_name = output_name(file);
        let mut output_files = Vec::new();
        if let Some(map) = map {
            let mut map_name = js_name.clone().into_os_string();
            map_name.push(".map");
            output_files.push(OutputFile {
                name: PathBuf::from(map_name),
                text: map,
            });
        }
        output_files.push(OutputFile {
            name: js_name,
            text: code,
        });
        EmitOutput {
            output_files,
            emit_skipped: false,
        }
    }

    fn get_syntactic_diagnostics(
        &mut self,
        host: &mut dyn LanguageServiceHost,
        file: &Path,
    ) -> Vec<Diagnostic> {
        self.sync(host);
        host.script_snapshot(file)
            .map(|text| syntactic_diagnostics(&text, file))
            .unwrap_or_default()
    }

    fn get_semantic_diagnostics(
        &mut self,
        host: &mut dyn LanguageServiceHost,
        file: &Path,
    ) -> Vec<Diagnostic> {
        FakeStats::bump(&self.stats.semantic_checks);
        self.sync(host);
        let Some(text) = host.script_snapshot(file) else {
            return Vec::new();
        };

        let mut diagnostics = undeclared_globals(host, file, &text);
        for (line_number, line) in text.lines().enumerate() {
            let Some(caps) = VALUE_DECLARATION.captures(line) else {
                continue;
            };
            let Some(declared) = caps
                .get(2)
                .map(|m| m.as_str())
                .filter(|ty| PRIMITIVES.contains(ty))
            else {
                continue;
            };
            let Some(actual) = expression_type(host, file, &text, &caps[3], 0) else {
                continue;
            };
            if actual != declared {
                let name = caps.get(1).map_or(0, |m| m.start());
                diagnostics.push(
                    Diagnostic::error(
                        TYPE_NOT_ASSIGNABLE,
                        format!("Type '{actual}' is not assignable to type '{declared}'."),
                    )
                    .with_file(file)
                    .with_span(Position::new(line_number as u32, name as u32), caps[1].len() as u32),
                );
            }
        }
        diagnostics
    }

    fn get_resolved_modules(
        &mut self,
        host: &mut dyn LanguageServiceHost,
        file: &Path,
    ) -> Vec<PathBuf> {
        self.sync(host);
        let Some(text) = host.script_snapshot(file) else {
            return Vec::new();
        };
        let mut modules = Vec::new();
        for line in text.lines() {
            for caps in MODULE_SPECIFIER.captures_iter(line) {
                if let Some(module) = resolve_module(host, file, &caps[1]) {
                    if !modules.contains(&module) {
                        modules.push(module);
                    }
                }
            }
        }
        modules
    }
}

/// TS2304 for every `__NAME__` used in `text` that neither the file itself
/// nor a declaration file among the host's scripts declares
fn undeclared_globals(
    host: &mut dyn LanguageServiceHost,
    file: &Path,
    text: &str,
) -> Vec<Diagnostic> {
    let mut declared: FxHashSet<String> = declared_globals(text);
    for script in host.script_file_names() {
        if script.as_path() != file && is_declaration_file(&script) {
            if let Some(declarations) = host.script_snapshot(&script) {
                declared.extend(declared_globals(&declarations));
            }
        }
    }

    let mut diagnostics = Vec::new();
    for (line_number, line) in text.lines().enumerate() {
        if AMBIENT_DECLARATION.is_match(line) {
            continue;
        }
        for global in AMBIENT_GLOBAL.find_iter(line) {
            if declared.contains(global.as_str()) {
                continue;
            }
            diagnostics.push(
                Diagnostic::error(
                    CANNOT_FIND_NAME,
                    format!("Cannot find name '{}'.", global.as_str()),
                )
                .with_file(file)
                .with_span(
                    Position::new(line_number as u32, global.start() as u32),
                    global.len() as u32,
                ),
            );
        }
    }
    diagnostics
}

fn declared_globals(text: &str) -> FxHashSet<String> {
    text.lines()
        .filter_map(|line| AMBIENT_DECLARATION.captures(line))
        .map(|caps| caps[1].to_string())
        .collect()
}

fn output_name(file: &Path) -> PathBuf {
    match file.extension().and_then(|e| e.to_str()) {
        Some("mts") => file.with_extension("mjs"),
        Some("cts") => file.with_extension("cjs"),
        _ => file.with_extension("js"),
    }
}

/// Resolve `specifier` the way `moduleResolution: node` would, through the host
pub fn resolve_module(
    host: &dyn LanguageServiceHost,
    from: &Path,
    specifier: &str,
) -> Option<PathBuf> {
    let dir = from.parent().unwrap_or(Path::new("/"));
    let bases: Vec<PathBuf> = if specifier.starts_with('.') || specifier.starts_with('/') {
        vec![normalize_path(&dir.join(specifier))]
    } else {
        dir.ancestors()
            .map(|ancestor| ancestor.join("node_modules").join(specifier))
            .collect()
    };

    for base in bases {
        if base.extension().is_some() && host.file_exists(&base) {
            return Some(base);
        }
        for suffix in RESOLVE_SUFFIXES {
            let mut candidate = base.clone().into_os_string();
            candidate.push(suffix);
            let candidate = PathBuf::from(candidate);
            if host.file_exists(&candidate) {
                return Some(candidate);
            }
        }
    }
    None
}

fn literal_type(expression: &str) -> Option<&'static str> {
    let expression = expression.trim();
    if expression.parse::<f64>().is_ok() {
        Some("number")
    } else if expression.starts_with(['"', '\'', '`']) {
        Some("string")
    } else if expression == "true" || expression == "false" {
        Some("boolean")
    } else {
        None
    }
}

/// Type of an initializer: a literal, or an identifier declared locally or
/// imported from a relative module
fn expression_type(
    host: &mut dyn LanguageServiceHost,
    file: &Path,
    text: &str,
    expression: &str,
    depth: usize,
) -> Option<String> {
    if let Some(ty) = literal_type(expression) {
        return Some(ty.to_string());
    }
    if depth > 8 || !IDENTIFIER.is_match(expression) {
        return None;
    }
    identifier_type(host, file, text, expression, depth + 1)
}

fn identifier_type(
    host: &mut dyn LanguageServiceHost,
    file: &Path,
    text: &str,
    name: &str,
    depth: usize,
) -> Option<String> {
    for line in text.lines() {
        if let Some(caps) = VALUE_DECLARATION.captures(line) {
            if &caps[1] == name {
                if let Some(declared) = caps.get(2) {
                    return Some(declared.as_str().to_string());
                }
                return expression_type(host, file, text, &caps[3], depth);
            }
        }
    }

    for line in text.lines() {
        let Some(caps) = IMPORT_NAMED.captures(line) else {
            continue;
        };
        let imported = caps[1].split(',').find_map(|binding| {
            let mut parts = binding.split(" as ").map(str::trim);
            let exported = parts.next()?;
            let local = parts.next().unwrap_or(exported);
            (local == name).then(|| exported.to_string())
        });
        let Some(imported) = imported else {
            continue;
        };
        let module = resolve_module(host, file, &caps[2])?;
        let module_text = host.script_snapshot(&module)?;
        return identifier_type(host, &module, &module_text, &imported, depth + 1);
    }
    None
}

fn syntactic_diagnostics(text: &str, file: &Path) -> Vec<Diagnostic> {
    let opened = text.matches('{').count();
    let closed = text.matches('}').count();
    if opened == closed {
        return Vec::new();
    }
    let last_line = text.lines().count().saturating_sub(1) as u32;
    vec![Diagnostic::error(MISSING_TOKEN, "'}' expected.")
        .with_file(file)
        .with_span(Position::new(last_line, 0), 1)]
}

/// Strip types and, for CommonJS, rewrite the module syntax
///
/// Returns the JavaScript with a trailing `sourceMappingURL` comment, and the
/// map, when `sourceMap` is on.
pub fn emit_javascript(
    source: &str,
    file: &Path,
    options: &CompilerOptions,
) -> (String, Option<String>) {
    let esm = options.effective_module().is_es_module();
    let mut body = Vec::new();
    let mut exports = Vec::new();
    let mut uses_modules = false;
    let mut skip_depth = 0usize;

    for line in source.lines() {
        if skip_depth > 0 {
            skip_depth = (skip_depth + line.matches('{').count()).saturating_sub(line.matches('}').count());
            continue;
        }
        if TYPE_ONLY_IMPORT.is_match(line) {
            continue;
        }
        if TYPE_DECLARATION.is_match(line) {
            skip_depth = line.matches('{').count().saturating_sub(line.matches('}').count());
            continue;
        }

        let mut line = strip_annotations(line);
        if !esm {
            uses_modules |= rewrite_module_syntax(&mut line, &mut exports);
        }
        body.push(line);
    }

    let mut code = String::new();
    if !esm {
        code.push_str("\"use strict\";\n");
        if uses_modules {
            code.push_str("Object.defineProperty(exports, \"__esModule\", { value: true });\n");
        }
    }
    for line in body {
        code.push_str(&line);
        code.push('\n');
    }
    for name in exports {
        code.push_str(&format!("exports.{name} = {name};\n"));
    }

    if !options.source_map.unwrap_or(false) {
        return (code, None);
    }
    let js_name = output_name(file);
    let js_file_name = js_name
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let source_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    code.push_str(&format!("//# sourceMappingURL={js_file_name}.map"));

    let mut map = json!({
        "version": 3,
        "file": js_file_name,
        "sourceRoot": "",
        "sources": [source_name],
        "names": [],
        "mappings": "AAAA",
    });
    if options.inline_sources.unwrap_or(false) {
        map["sourcesContent"] = json!([source]);
    }
    (code, Some(map.to_string()))
}

fn strip_annotations(line: &str) -> String {
    let line = VAR_ANNOTATION.replace_all(line, "$1 $2$3");
    if line.contains("function") || line.contains("=>") {
        let line = RETURN_ANNOTATION.replace_all(&line, ") $1");
        PARAM_ANNOTATION.replace_all(&line, "$1$2").into_owned()
    } else {
        line.into_owned()
    }
}

/// Rewrite one line of ES module syntax to CommonJS, returning whether it was
/// module syntax at all
fn rewrite_module_syntax(line: &mut String, exports: &mut Vec<String>) -> bool {
    if let Some(caps) = IMPORT_NAMED.captures(line) {
        let bindings = caps[1].replace(" as ", ": ");
        *line = format!("const {{{bindings}}} = require(\"{}\");", &caps[2]);
    } else if let Some(caps) = IMPORT_NAMESPACE.captures(line) {
        *line = format!("const {} = require(\"{}\");", &caps[1], &caps[2]);
    } else if let Some(caps) = IMPORT_DEFAULT.captures(line) {
        *line = format!("const {} = require(\"{}\").default;", &caps[1], &caps[2]);
    } else if let Some(caps) = IMPORT_BARE.captures(line) {
        *line = format!("require(\"{}\");", &caps[1]);
    } else if let Some(caps) = EXPORT_LIST.captures(line) {
        exports.extend(
            caps[1]
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
        );
        line.clear();
    } else if let Some(caps) = EXPORT_DECLARATION.captures(line) {
        exports.push(caps[3].to_string());
        *line = EXPORT_DECLARATION.replace(line, "$1$2").into_owned();
    } else if EXPORT_DEFAULT.is_match(line) {
        *line = EXPORT_DEFAULT.replace(line, "${1}exports.default = ").into_owned();
    } else {
        return false;
    }
    true
}
