use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::fs::FileSystem;

use super::{
    graph_file_name, CacheError, DependencyGraph, DependencyGraphEntry, InvalidationEngine,
    Result,
};

/// In-memory dependency graph backed by one file in the cache directory
///
/// Concurrent processes are not coordinated: every save overwrites the whole
/// file with this process's view, so the last writer wins. A lost update only
/// costs a recomputation later.
pub struct DependencyGraphCache {
    file_system: Arc<dyn FileSystem>,

    /// `None` keeps the graph in memory only
    file_path: Option<PathBuf>,

    graph: DependencyGraph,
}

impl DependencyGraphCache {
    pub fn new(file_system: Arc<dyn FileSystem>, cache_dir: Option<&Path>) -> Self {
        Self {
            file_system,
            file_path: cache_dir.map(|dir| dir.join(graph_file_name())),
            graph: DependencyGraph::new(),
        }
    }

    /// Create the cache and load whatever is on disk
    pub fn open(file_system: Arc<dyn FileSystem>, cache_dir: Option<&Path>) -> Self {
        let mut cache = Self::new(file_system, cache_dir);
        cache.load();
        cache
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Replace the in-memory graph with the persisted one
    ///
    /// Missing or corrupt files leave the graph empty.
    pub fn load(&mut self) {
        let Some(path) = &self.file_path else {
            return;
        };
        if !self.file_system.file_exists(path) {
            debug!("No dependency graph at {:?}", path);
            return;
        }

        match self
            .file_system
            .read_file(path)
            .map_err(|source| CacheError::Io {
                path: path.clone(),
                source,
            })
            .and_then(|json| DependencyGraph::from_json(&json))
        {
            Ok(graph) => {
                info!("Loaded dependency graph with {} entries", graph.len());
                self.graph = graph;
            }
            Err(e) => {
                warn!("Ignoring unreadable dependency graph {:?}: {}", path, e);
                self.graph = DependencyGraph::new();
            }
        }
    }

    /// Record the resolved modules of `path` for `content`
    ///
    /// Persists immediately when the entry changed. Returns whether it changed.
    pub fn record_modules_for(
        &mut self,
        path: &Path,
        content: &str,
        modules: Vec<PathBuf>,
    ) -> bool {
        let changed = self.graph.insert_entry(
            path.to_path_buf(),
            DependencyGraphEntry::new(content, modules),
        );
        if changed {
            debug!("Recorded resolved modules for {:?}", path);
        }
        if changed && self.file_path.is_some() {
            if let Err(e) = self.save() {
                warn!("Failed to write dependency graph: {}", e);
            }
        }
        changed
    }

    /// Recorded modules of `path`, whatever content they came from
    pub fn lookup(&self, path: &Path) -> Option<&[PathBuf]> {
        self.graph
            .get_entry(path)
            .map(|entry| entry.resolved_module_names.as_slice())
    }

    /// Recorded modules of `path`, only if recorded for `content`
    pub fn lookup_valid(&self, path: &Path, content: &str) -> Option<&[PathBuf]> {
        self.graph
            .get_entry(path)
            .filter(|entry| entry.is_valid_for(content))
            .map(|entry| entry.resolved_module_names.as_slice())
    }

    pub fn entry(&self, path: &Path) -> Option<&DependencyGraphEntry> {
        self.graph.get_entry(path)
    }

    /// Recorded files that import `module`
    pub fn dependents_of(&self, module: &Path) -> Vec<PathBuf> {
        InvalidationEngine::new(&self.graph).dependents_of(module)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&PathBuf, &DependencyGraphEntry)> {
        self.graph.iter()
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// Drop every entry, in memory and on disk
    pub fn clear(&mut self) -> Result<()> {
        self.graph.clear();
        if let Some(path) = &self.file_path {
            if self.file_system.file_exists(path) {
                self.file_system
                    .remove_file(path)
                    .map_err(|source| CacheError::Io {
                        path: path.clone(),
                        source,
                    })?;
            }
        }
        info!("Dependency graph cleared");
        Ok(())
    }

    /// Overwrite the graph file with the in-memory graph
    pub fn save(&self) -> Result<()> {
        let path = self.file_path.as_ref().ok_or(CacheError::NoCacheDirectory)?;
        let json = self.graph.to_json()?;
        self.file_system
            .write_file(path, &json)
            .map_err(|source| CacheError::Io {
                path: path.clone(),
                source,
            })?;
        debug!(
            "Saved dependency graph with {} entries to {:?}",
            self.graph.len(),
            path
        );
        Ok(())
    }
}

impl std::fmt::Debug for DependencyGraphCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraphCache")
            .field("file_path", &self.file_path)
            .field("entries", &self.graph.len())
            .finish()
    }
}
