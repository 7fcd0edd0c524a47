use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Output directory used when `allowJs` is on and no `outDir` is configured,
/// so that emitting a `.js` input never targets the input itself
pub const ALLOW_JS_OUT_DIR: &str = "$$tsjest$$";

fn normalize_option(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != '-' && *c != '_' && !c.is_whitespace())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Language level of the emitted JavaScript
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum ScriptTarget {
    ES3,
    ES5,
    ES2015,
    ES2016,
    ES2017,
    ES2018,
    ES2019,
    ES2020,
    ES2021,
    ES2022,
    ESNext,
}

impl ScriptTarget {
    /// Used when neither tsconfig nor overrides name a target
    pub const DEFAULT: ScriptTarget = ScriptTarget::ES2015;

    pub fn as_str(self) -> &'static str {
        match self {
            ScriptTarget::ES3 => "es3",
            ScriptTarget::ES5 => "es5",
            ScriptTarget::ES2015 => "es2015",
            ScriptTarget::ES2016 => "es2016",
            ScriptTarget::ES2017 => "es2017",
            ScriptTarget::ES2018 => "es2018",
            ScriptTarget::ES2019 => "es2019",
            ScriptTarget::ES2020 => "es2020",
            ScriptTarget::ES2021 => "es2021",
            ScriptTarget::ES2022 => "es2022",
            ScriptTarget::ESNext => "esnext",
        }
    }
}

impl FromStr for ScriptTarget {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match normalize_option(value).as_str() {
            "es3" => ScriptTarget::ES3,
            "es5" => ScriptTarget::ES5,
            "es6" | "es2015" => ScriptTarget::ES2015,
            "es2016" => ScriptTarget::ES2016,
            "es2017" => ScriptTarget::ES2017,
            "es2018" => ScriptTarget::ES2018,
            "es2019" => ScriptTarget::ES2019,
            "es2020" => ScriptTarget::ES2020,
            "es2021" => ScriptTarget::ES2021,
            "es2022" => ScriptTarget::ES2022,
            "esnext" => ScriptTarget::ESNext,
            _ => return Err(format!("unsupported compilerOptions.target '{value}'")),
        })
    }
}

impl TryFrom<String> for ScriptTarget {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScriptTarget> for &'static str {
    fn from(target: ScriptTarget) -> Self {
        target.as_str()
    }
}

impl fmt::Display for ScriptTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Module system of the emitted JavaScript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum ModuleKind {
    None,
    CommonJS,
    AMD,
    UMD,
    System,
    ES2015,
    ES2020,
    ES2022,
    ESNext,
    Node16,
    NodeNext,
}

impl ModuleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ModuleKind::None => "none",
            ModuleKind::CommonJS => "commonjs",
            ModuleKind::AMD => "amd",
            ModuleKind::UMD => "umd",
            ModuleKind::System => "system",
            ModuleKind::ES2015 => "es2015",
            ModuleKind::ES2020 => "es2020",
            ModuleKind::ES2022 => "es2022",
            ModuleKind::ESNext => "esnext",
            ModuleKind::Node16 => "node16",
            ModuleKind::NodeNext => "nodenext",
        }
    }

    /// Kinds that emit static `import`/`export` syntax
    pub fn is_es_module(self) -> bool {
        matches!(
            self,
            ModuleKind::ES2015 | ModuleKind::ES2020 | ModuleKind::ES2022 | ModuleKind::ESNext
        )
    }
}

impl FromStr for ModuleKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match normalize_option(value).as_str() {
            "none" => ModuleKind::None,
            "commonjs" => ModuleKind::CommonJS,
            "amd" => ModuleKind::AMD,
            "umd" => ModuleKind::UMD,
            "system" => ModuleKind::System,
            "es6" | "es2015" => ModuleKind::ES2015,
            "es2020" => ModuleKind::ES2020,
            "es2022" => ModuleKind::ES2022,
            "esnext" => ModuleKind::ESNext,
            "node16" => ModuleKind::Node16,
            "nodenext" => ModuleKind::NodeNext,
            _ => return Err(format!("unsupported compilerOptions.module '{value}'")),
        })
    }
}

impl TryFrom<String> for ModuleKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ModuleKind> for &'static str {
    fn from(kind: ModuleKind) -> Self {
        kind.as_str()
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compiler options handed to the TypeScript compiler
///
/// Options the core reasons about are typed; everything else is carried
/// through untouched in `other`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ScriptTarget>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<ModuleKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_js: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub es_module_interop: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_synthetic_default_imports: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_map: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_source_map: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_sources: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declaration: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declaration_map: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declaration_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emit_declaration_only: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composite: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_emit: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_comments: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_file: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts_build_info_file: Option<PathBuf>,

    /// Options passed through to the compiler without interpretation
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

impl CompilerOptions {
    /// Overwrite the options the transform pipeline depends on
    ///
    /// Output must stay in memory with a source map the transformer can
    /// inline, so these win over tsconfig values and inline overrides.
    pub fn apply_forced(&mut self) {
        self.source_map = Some(true);
        self.inline_source_map = Some(false);
        self.inline_sources = Some(true);
        self.declaration = Some(false);
        self.no_emit = Some(false);
        self.remove_comments = Some(false);

        self.out = None;
        self.out_file = None;
        self.composite = None;
        self.declaration_dir = None;
        self.declaration_map = None;
        self.emit_declaration_only = None;
        self.source_root = None;
        self.ts_build_info_file = None;
    }

    pub fn allow_js(&self) -> bool {
        self.allow_js.unwrap_or(false)
    }

    pub fn effective_module(&self) -> ModuleKind {
        self.module.unwrap_or(ModuleKind::CommonJS)
    }

    /// Options for one compile call, after the ESM/CommonJS switch
    ///
    /// ES module output is only produced when the user asked for it and the
    /// host can execute it; interop flags are then forced on so that importing
    /// CommonJS dependencies keeps working.
    pub fn for_module_system(&self, use_esm: bool, supports_static_esm: bool) -> CompilerOptions {
        let mut options = self.clone();
        if use_esm && supports_static_esm {
            let module = options.module.filter(|m| m.is_es_module());
            options.module = Some(module.unwrap_or(ModuleKind::ESNext));
            options.es_module_interop = Some(true);
            options.allow_synthetic_default_imports = Some(true);
        } else {
            options.module = Some(ModuleKind::CommonJS);
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_targets_case_insensitively() {
        assert_eq!("ES6".parse::<ScriptTarget>().unwrap(), ScriptTarget::ES2015);
        assert_eq!("ESNext".parse::<ScriptTarget>().unwrap(), ScriptTarget::ESNext);
        assert!("es1999".parse::<ScriptTarget>().is_err());
        assert!(ScriptTarget::ES3 < ScriptTarget::DEFAULT);
    }

    #[test]
    fn test_deserialize_keeps_unknown_options() {
        let json = r#"{
            "target": "ES2019",
            "module": "ESNext",
            "strict": true,
            "jsx": "react"
        }"#;
        let options: CompilerOptions = serde_json::from_str(json).unwrap();

        assert_eq!(options.target, Some(ScriptTarget::ES2019));
        assert_eq!(options.module, Some(ModuleKind::ESNext));
        assert_eq!(options.other.get("strict"), Some(&Value::Bool(true)));
        assert_eq!(options.other.get("jsx"), Some(&Value::from("react")));
    }

    #[test]
    fn test_serialize_round_trips_through_strings() {
        let options = CompilerOptions {
            target: Some(ScriptTarget::ES2020),
            module: Some(ModuleKind::CommonJS),
            ..Default::default()
        };
        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json["target"], "es2020");
        assert_eq!(json["module"], "commonjs");
        assert!(json.get("outDir").is_none());
    }

    #[test]
    fn test_apply_forced_overrides_user_values() {
        let mut options: CompilerOptions = serde_json::from_str(
            r#"{ "sourceMap": false, "declaration": true, "outFile": "bundle.js", "noEmit": true, "composite": true }"#,
        )
        .unwrap();
        options.apply_forced();

        assert_eq!(options.source_map, Some(true));
        assert_eq!(options.inline_source_map, Some(false));
        assert_eq!(options.declaration, Some(false));
        assert_eq!(options.no_emit, Some(false));
        assert_eq!(options.out_file, None);
        assert_eq!(options.composite, None);
    }

    #[test]
    fn test_module_system_switch() {
        let options = CompilerOptions {
            module: Some(ModuleKind::AMD),
            ..Default::default()
        };

        let esm = options.for_module_system(true, true);
        assert_eq!(esm.module, Some(ModuleKind::ESNext));
        assert_eq!(esm.es_module_interop, Some(true));
        assert_eq!(esm.allow_synthetic_default_imports, Some(true));

        let es2020 = CompilerOptions {
            module: Some(ModuleKind::ES2020),
            ..Default::default()
        };
        assert_eq!(
            es2020.for_module_system(true, true).module,
            Some(ModuleKind::ES2020)
        );

        assert_eq!(
            options.for_module_system(true, false).module,
            Some(ModuleKind::CommonJS)
        );
        assert_eq!(
            es2020.for_module_system(false, true).module,
            Some(ModuleKind::CommonJS)
        );
    }
}
