use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use tracing::trace;

use super::CompiledOutput;

/// What [`MemoryFileTable::update`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileUpdate {
    Added,
    Changed,
    Unchanged,
}

impl FileUpdate {
    /// New files and changed content both invalidate the project
    pub fn is_dirty(self) -> bool {
        !matches!(self, FileUpdate::Unchanged)
    }
}

/// One file tracked by the language service
#[derive(Debug, Clone)]
pub struct MemoryFileRecord {
    pub text: String,
    pub version: u64,
    /// Output compiled from `text`, with the project version it was built at
    output: Option<(u64, CompiledOutput)>,
}

/// Script table shared with the language service
///
/// `version` of a record increases by one every time its text changes and
/// never otherwise; a version number is never reused for different text.
#[derive(Debug, Default)]
pub struct MemoryFileTable {
    files: FxHashMap<PathBuf, MemoryFileRecord>,
}

impl MemoryFileTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the text of `path`, the only way text and versions change
    pub fn update(&mut self, path: &Path, text: &str) -> FileUpdate {
        match self.files.get_mut(path) {
            Some(record) if record.text == text => FileUpdate::Unchanged,
            Some(record) => {
                record.text = text.to_string();
                record.version += 1;
                record.output = None;
                trace!(version = record.version, "Updated {:?}", path);
                FileUpdate::Changed
            }
            None => {
                self.files.insert(
                    path.to_path_buf(),
                    MemoryFileRecord {
                        text: text.to_string(),
                        version: 1,
                        output: None,
                    },
                );
                trace!("Tracking {:?}", path);
                FileUpdate::Added
            }
        }
    }

    pub fn get(&self, path: &Path) -> Option<&MemoryFileRecord> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn version(&self, path: &Path) -> Option<u64> {
        self.files.get(path).map(|r| r.version)
    }

    pub fn text(&self, path: &Path) -> Option<&str> {
        self.files.get(path).map(|r| r.text.as_str())
    }

    /// Remember `output` for the current text of `path`
    pub fn store_output(&mut self, path: &Path, project_version: u64, output: CompiledOutput) {
        if let Some(record) = self.files.get_mut(path) {
            record.output = Some((project_version, output));
        }
    }

    /// Output stored for the current text, if the project has not changed since
    pub fn output(&self, path: &Path, project_version: u64) -> Option<&CompiledOutput> {
        self.files
            .get(path)?
            .output
            .as_ref()
            .filter(|(built_at, _)| *built_at == project_version)
            .map(|(_, output)| output)
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.files.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn output(code: &str) -> CompiledOutput {
        CompiledOutput {
            code: code.to_string(),
            source_map: None,
        }
    }

    #[test]
    fn test_update_lifecycle() {
        let mut table = MemoryFileTable::new();
        let path = Path::new("/p/a.ts");

        assert_eq!(table.update(path, "a"), FileUpdate::Added);
        assert_eq!(table.version(path), Some(1));
        assert_eq!(table.update(path, "a"), FileUpdate::Unchanged);
        assert_eq!(table.version(path), Some(1));
        assert_eq!(table.update(path, "b"), FileUpdate::Changed);
        assert_eq!(table.version(path), Some(2));
        assert_eq!(table.text(path), Some("b"));
    }

    #[test]
    fn test_output_reuse_requires_same_project_version() {
        let mut table = MemoryFileTable::new();
        let path = Path::new("/p/a.ts");
        table.update(path, "a");
        table.store_output(path, 3, output("js"));

        assert_eq!(table.output(path, 3), Some(&output("js")));
        assert_eq!(table.output(path, 4), None);

        table.update(path, "b");
        assert_eq!(table.output(path, 3), None);
    }

    proptest! {
        #[test]
        fn prop_version_increases_exactly_on_change(
            texts in proptest::collection::vec("[ab]{0,2}", 1..40)
        ) {
            let mut table = MemoryFileTable::new();
            let path = Path::new("/p/a.ts");
            let mut previous: Option<(String, u64)> = None;

            for text in &texts {
                table.update(path, text);
                let version = table.version(path).unwrap();
                if let Some((prev_text, prev_version)) = &previous {
                    if prev_text == text {
                        prop_assert_eq!(version, *prev_version);
                    } else {
                        prop_assert_eq!(version, prev_version + 1);
                    }
                }
                previous = Some((text.clone(), version));
            }
        }
    }
}
