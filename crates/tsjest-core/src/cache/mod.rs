//! Dependency graph cache
//!
//! Maps a test file to the modules it imports, transitively, together with
//! the content that produced that resolution. The graph is kept in memory
//! and persisted as one JSON file inside the cache directory so that the
//! cache-key hook can see imported modules without compiling.

mod error;
mod graph;
mod hash;
mod invalidation;
mod manager;

pub use error::{CacheError, Result};
pub use graph::{DependencyGraph, DependencyGraphEntry};
pub use hash::{graph_file_name, hash_config, hash_content, CacheKeyBuilder};
pub use invalidation::InvalidationEngine;
pub use manager::DependencyGraphCache;

/// Cache format version - increment when the graph file layout changes
pub const CACHE_VERSION: u32 = 1;

/// Fixed namespace the graph file name is derived from
pub const GRAPH_NAMESPACE: &str = "tsjest-resolved-modules";
