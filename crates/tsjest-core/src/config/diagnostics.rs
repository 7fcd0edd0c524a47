//! Which compiler diagnostics get reported, and how

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::diagnostics::Diagnostic;
use crate::errors::ConfigError;

/// Codes never reported:
/// 6059 `rootDir` is expected to contain all source files,
/// 18002 the `files` list in config file is empty,
/// 18003 no inputs were found in config file
pub const IGNORE_DIAGNOSTIC_CODES: &[u32] = &[6059, 18002, 18003];

/// Comma-separated extra codes to ignore
pub const IGNORE_DIAGNOSTICS_ENV: &str = "TSJEST_IGNORE_DIAGNOSTICS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CodeItem {
    Number(u32),
    /// `"TS2322"`, `"2322"` or a comma-separated list of those
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CodeList {
    One(CodeItem),
    Many(Vec<CodeItem>),
}

impl CodeList {
    pub fn codes(&self) -> Result<Vec<u32>, ConfigError> {
        let items = match self {
            CodeList::One(item) => std::slice::from_ref(item),
            CodeList::Many(items) => items.as_slice(),
        };
        let mut codes = Vec::new();
        for item in items {
            match item {
                CodeItem::Number(code) => codes.push(*code),
                CodeItem::Text(text) => codes.extend(parse_diagnostic_codes(text)?),
            }
        }
        Ok(codes)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pretty: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_codes: Option<CodeList>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_regex: Option<String>,

    #[serde(default)]
    pub warn_only: bool,
}

/// `diagnostics` as written by the user: a switch or a detailed object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DiagnosticsSetting {
    Toggle(bool),
    Options(DiagnosticsOptions),
}

/// Parse `"TS2322"` or `"2322"`
pub fn parse_diagnostic_code(value: &str) -> Result<u32, ConfigError> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("TS")
        .or_else(|| trimmed.strip_prefix("ts"))
        .unwrap_or(trimmed);
    digits
        .parse()
        .map_err(|_| ConfigError::InvalidDiagnosticCode {
            value: value.to_string(),
        })
}

/// Parse a comma-separated list of codes, ignoring empty entries
pub fn parse_diagnostic_codes(value: &str) -> Result<Vec<u32>, ConfigError> {
    value
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(parse_diagnostic_code)
        .collect()
}

/// Normalized diagnostics behavior
#[derive(Debug, Clone)]
pub struct DiagnosticsPolicy {
    pub enabled: bool,
    pub pretty: bool,
    /// Raise a compile error; otherwise only log
    pub throws: bool,
    /// Sorted and deduplicated
    pub ignore_codes: Vec<u32>,
    pub path_regex: Option<Regex>,
}

impl Default for DiagnosticsPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            pretty: true,
            throws: true,
            ignore_codes: IGNORE_DIAGNOSTIC_CODES.to_vec(),
            path_regex: None,
        }
    }
}

impl DiagnosticsPolicy {
    pub fn from_setting(
        setting: Option<&DiagnosticsSetting>,
        env_codes: &[u32],
    ) -> Result<Self, ConfigError> {
        let mut policy = Self::default();
        policy.ignore_codes.extend_from_slice(env_codes);

        match setting {
            None | Some(DiagnosticsSetting::Toggle(true)) => {}
            Some(DiagnosticsSetting::Toggle(false)) => {
                policy.enabled = false;
                policy.throws = false;
            }
            Some(DiagnosticsSetting::Options(options)) => {
                policy.pretty = options.pretty.unwrap_or(true);
                policy.throws = !options.warn_only;
                if let Some(codes) = &options.ignore_codes {
                    policy.ignore_codes.extend(codes.codes()?);
                }
                if let Some(pattern) = &options.path_regex {
                    policy.path_regex =
                        Some(Regex::new(pattern).map_err(|e| ConfigError::InvalidRegex {
                            option: "diagnostics.pathRegex",
                            message: e.to_string(),
                        })?);
                }
            }
        }

        policy.ignore_codes.sort_unstable();
        policy.ignore_codes.dedup();
        Ok(policy)
    }

    /// Whether diagnostics for `file` are wanted at all
    pub fn should_report(&self, file: &Path) -> bool {
        if !self.enabled {
            return false;
        }
        match &self.path_regex {
            Some(regex) => regex.is_match(&file.to_string_lossy()),
            None => true,
        }
    }

    /// Drop ignored codes and diagnostics located in excluded files
    pub fn filter(&self, diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
        diagnostics
            .into_iter()
            .filter(|d| self.ignore_codes.binary_search(&d.code).is_err())
            .filter(|d| d.file.as_deref().map_or(true, |f| self.should_report(f)))
            .collect()
    }
}
