use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::Result;

/// Import list recorded for one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyGraphEntry {
    /// Content the resolution was computed from
    pub file_content: String,

    /// Absolute paths of every module the file imports, transitively
    pub resolved_module_names: Vec<PathBuf>,
}

impl DependencyGraphEntry {
    pub fn new(file_content: impl Into<String>, resolved_module_names: Vec<PathBuf>) -> Self {
        Self {
            file_content: file_content.into(),
            resolved_module_names,
        }
    }

    /// An entry only describes the content it was recorded for
    pub fn is_valid_for(&self, content: &str) -> bool {
        self.file_content == content
    }
}

/// File path -> dependency entry, serialized as one JSON object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyGraph {
    entries: BTreeMap<PathBuf, DependencyGraphEntry>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Add or replace an entry, returning whether anything changed
    pub fn insert_entry(&mut self, path: PathBuf, entry: DependencyGraphEntry) -> bool {
        if self.entries.get(&path) == Some(&entry) {
            return false;
        }
        self.entries.insert(path, entry);
        true
    }

    pub fn get_entry(&self, path: &Path) -> Option<&DependencyGraphEntry> {
        self.entries.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &DependencyGraphEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
