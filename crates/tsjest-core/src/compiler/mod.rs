//! Compiler instance: language-service or transpile mode behind one trait

mod language_service;
mod memory_cache;
mod transpiler;

pub use language_service::LanguageServiceCompiler;
pub use memory_cache::{FileUpdate, MemoryFileRecord, MemoryFileTable};
pub use transpiler::TranspileCompiler;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{ConfigSet, TransformOptions};
use crate::errors::CompileError;

const SOURCE_MAPPING_URL: &str = "//# sourceMappingURL=";

/// JavaScript for one file, with its source map inlined
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledOutput {
    pub code: String,
    /// The map that was inlined, after path rewriting
    pub source_map: Option<String>,
}

/// Compile one file, or list the modules it imports
pub trait TsCompiler: Send {
    fn compile(
        &mut self,
        content: &str,
        path: &Path,
        options: &TransformOptions,
    ) -> Result<CompiledOutput, CompileError>;

    /// Absolute paths of the modules `path` imports, transitively
    fn resolved_modules(&mut self, content: &str, path: &Path)
        -> Result<Vec<PathBuf>, CompileError>;
}

/// Pick the implementation for `config`
pub fn create_compiler(config: Arc<ConfigSet>) -> Box<dyn TsCompiler> {
    if config.is_isolated() {
        Box::new(TranspileCompiler::new(config))
    } else {
        Box::new(LanguageServiceCompiler::new(config))
    }
}

/// Inline `source_map` into `code` as a base64 data URL
///
/// The map's `file` and `sources` are pointed at `file` and `sourceRoot` is
/// dropped so that stack traces resolve to the original path. A trailing
/// `sourceMappingURL` comment is replaced.
pub fn finalize_output(code: &str, source_map: Option<&str>, file: &Path) -> CompiledOutput {
    let Some(map) = source_map else {
        return CompiledOutput {
            code: code.to_string(),
            source_map: None,
        };
    };

    let map = rewrite_source_map(map, file);
    let body = match code.rfind(SOURCE_MAPPING_URL) {
        Some(index) if !code[index..].trim_end().contains('\n') => &code[..index],
        _ => code,
    };

    let mut out = body.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(SOURCE_MAPPING_URL);
    out.push_str("data:application/json;charset=utf-8;base64,");
    out.push_str(&STANDARD.encode(map.as_bytes()));

    CompiledOutput {
        code: out,
        source_map: Some(map),
    }
}

fn rewrite_source_map(map: &str, file: &Path) -> String {
    let Ok(Value::Object(mut object)) = serde_json::from_str::<Value>(map) else {
        return map.to_string();
    };
    let file = file.to_string_lossy().replace('\\', "/");
    object.insert("file".to_string(), Value::from(file.clone()));
    object.insert("sources".to_string(), Value::from(vec![file]));
    object.remove("sourceRoot");
    serde_json::to_string(&object).unwrap_or_else(|_| map.to_string())
}

pub(crate) fn is_node_modules(path: &Path) -> bool {
    path.components()
        .any(|component| component.as_os_str() == "node_modules")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_inline_map(code: &str) -> Value {
        let (_, encoded) = code
            .rsplit_once("base64,")
            .expect("inline source map present");
        serde_json::from_slice(&STANDARD.decode(encoded).unwrap()).unwrap()
    }

    #[test]
    fn test_finalize_replaces_mapping_comment() {
        let code = "var a = 1;\n//# sourceMappingURL=a.js.map";
        let map = r#"{"version":3,"file":"a.js","sourceRoot":"src","sources":["a.ts"],"mappings":"AAAA"}"#;

        let output = finalize_output(code, Some(map), Path::new("/project/src/a.ts"));

        assert!(output.code.starts_with("var a = 1;\n//# sourceMappingURL=data:application/json"));
        assert_eq!(output.code.matches(SOURCE_MAPPING_URL).count(), 1);

        let inlined = decode_inline_map(&output.code);
        assert_eq!(inlined["file"], "/project/src/a.ts");
        assert_eq!(inlined["sources"][0], "/project/src/a.ts");
        assert!(inlined.get("sourceRoot").is_none());
        assert_eq!(inlined["mappings"], "AAAA");
    }

    #[test]
    fn test_finalize_without_map_keeps_code() {
        let output = finalize_output("var a = 1;\n", None, Path::new("/a.ts"));
        assert_eq!(output.code, "var a = 1;\n");
        assert!(output.source_map.is_none());
    }

    #[test]
    fn test_finalize_appends_when_no_comment() {
        let output = finalize_output("var a = 1;", Some(r#"{"version":3}"#), Path::new("/a.ts"));
        assert!(output.code.starts_with("var a = 1;\n//# sourceMappingURL=data:"));
    }

    #[test]
    fn test_node_modules_detection() {
        assert!(is_node_modules(Path::new("/p/node_modules/lodash/index.js")));
        assert!(!is_node_modules(Path::new("/p/src/node_modules_like.ts")));
    }
}
