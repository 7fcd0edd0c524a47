//! Host-side configuration: the project record the test runner hands over
//! and the `ts-jest` options nested inside its globals.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::diagnostics::DiagnosticsSetting;
use crate::errors::ConfigError;

/// Key under `globals` holding [`TsJestOptions`]
pub const TS_JEST_GLOBALS_KEY: &str = "ts-jest";

/// Token replaced by the project root in path-like options
pub const ROOT_DIR_TOKEN: &str = "<rootDir>";

/// Default `testMatch` globs when the host configures neither `testMatch`
/// nor `testRegex`
pub const DEFAULT_TEST_MATCH: &[&str] = &[
    "**/__tests__/**/*.{js,jsx,ts,tsx}",
    "**/*.{spec,test}.{js,jsx,ts,tsx}",
];

/// One pattern or a list of them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            OneOrMany::One(value) => vec![value.clone()],
            OneOrMany::Many(values) => values.clone(),
        }
    }
}

/// The subset of the host's project configuration this crate reads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConfig {
    pub root_dir: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_directory: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test_match: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_regex: Option<OneOrMany>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub globals: BTreeMap<String, Value>,
}

impl HostConfig {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Default::default()
        }
    }

    /// Parse a serialized host configuration, as passed to the cache-key hook
    pub fn from_json(serialized: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(serialized)
            .map_err(|e| ConfigError::InvalidHostConfig(e.to_string()))
    }

    /// Canonical serialized form, identical for equal configurations
    pub fn to_canonical_json(&self) -> String {
        // Maps are BTreeMap-backed, so key order is stable.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn with_ts_jest(mut self, options: &TsJestOptions) -> Self {
        if let Ok(value) = serde_json::to_value(options) {
            self.globals.insert(TS_JEST_GLOBALS_KEY.to_string(), value);
        }
        self
    }

    pub fn with_cache_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_directory = Some(dir.into());
        self
    }

    pub fn with_test_match(mut self, patterns: &[&str]) -> Self {
        self.test_match = patterns.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn cwd(&self) -> &Path {
        self.cwd.as_deref().unwrap_or(&self.root_dir)
    }

    /// The `ts-jest` options from `globals`, defaults when absent
    pub fn ts_jest_options(&self) -> Result<TsJestOptions, ConfigError> {
        match self.globals.get(TS_JEST_GLOBALS_KEY) {
            None | Some(Value::Null) => Ok(TsJestOptions::default()),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                ConfigError::InvalidHostConfig(format!("globals['{TS_JEST_GLOBALS_KEY}']: {e}"))
            }),
        }
    }

    pub fn test_regex_patterns(&self) -> Vec<String> {
        self.test_regex
            .as_ref()
            .map(OneOrMany::to_vec)
            .unwrap_or_default()
    }

    /// Replace `<rootDir>` and resolve the result against the root
    pub fn resolve_path(&self, value: &str) -> PathBuf {
        let replaced = replace_root_dir(value, &self.root_dir);
        crate::fs::resolve_path(&self.root_dir, Path::new(&replaced))
    }
}

pub fn replace_root_dir(value: &str, root_dir: &Path) -> String {
    value.replace(ROOT_DIR_TOKEN, &root_dir.to_string_lossy())
}

/// Where the compiler options come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TsConfigSource {
    /// `false` skips tsconfig lookup entirely; `true` is the default search
    Toggle(bool),
    /// Explicit tsconfig path, relative to the root dir
    Path(String),
    /// Compiler option overrides, merged over the discovered tsconfig
    Inline(Map<String, Value>),
}

/// Options under `globals["ts-jest"]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TsJestOptions {
    #[serde(default, alias = "tsConfig", skip_serializing_if = "Option::is_none")]
    pub tsconfig: Option<TsConfigSource>,

    #[serde(default)]
    pub isolated_modules: bool,

    /// Registry name of the compiler module
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiler: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<DiagnosticsSetting>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stringify_content_path_regex: Option<String>,

    #[serde(default, rename = "useESM")]
    pub use_esm: bool,
}

/// Per-call options from the host transform hook
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransformOptions {
    #[serde(default)]
    pub instrument: bool,

    #[serde(default, rename = "supportsStaticESM")]
    pub supports_static_esm: bool,
}

impl TransformOptions {
    pub fn esm() -> Self {
        Self {
            supports_static_esm: true,
            ..Default::default()
        }
    }
}
