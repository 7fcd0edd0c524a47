use serde::Serialize;

use super::{CACHE_VERSION, GRAPH_NAMESPACE};

/// Compute Blake3 hash of text content
pub fn hash_content(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

/// Hash a configuration fingerprint
/// Any change in the serialized value changes the digest
pub fn hash_config<T: Serialize>(config: &T) -> String {
    // serde_json maps are BTreeMap-backed, so the serialization is stable
    let json = serde_json::to_vec(config).unwrap_or_default();
    blake3::hash(&json).to_hex().to_string()
}

/// File name of the persisted dependency graph inside a cache directory
pub fn graph_file_name() -> String {
    hash_content(&format!("{GRAPH_NAMESPACE}{CACHE_VERSION}"))
}

/// Incremental cache key over a sequence of parts
///
/// Each part is fed with its byte length in front, so part boundaries are
/// unambiguous even when a part contains NUL bytes.
pub struct CacheKeyBuilder {
    hasher: blake3::Hasher,
}

impl CacheKeyBuilder {
    pub fn new() -> Self {
        Self {
            hasher: blake3::Hasher::new(),
        }
    }

    pub fn push(&mut self, part: impl AsRef<[u8]>) -> &mut Self {
        let part = part.as_ref();
        self.hasher.update(&(part.len() as u64).to_le_bytes());
        self.hasher.update(part);
        self
    }

    pub fn finish(&self) -> String {
        self.hasher.finalize().to_hex().to_string()
    }
}

impl Default for CacheKeyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
