//! Transform orchestrator: the two hooks the host runner calls per file

use rustc_hash::FxHashMap;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::cache::CacheKeyBuilder;
use crate::compiler::{create_compiler, TsCompiler};
use crate::config::{is_declaration_file, ConfigSet, HostConfig, TransformOptions};
use crate::di::Container;
use crate::diagnostics::codes;
use crate::errors::TransformError;
use crate::fs::{mtime_millis, resolve_path};

/// What `process` hands back to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedSource {
    pub code: String,
    pub map: Option<String>,
}

impl TransformedSource {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            map: None,
        }
    }
}

/// Transformer chained after compilation, e.g. a Babel stage
pub trait FallbackTransformer: Send + Sync {
    fn name(&self) -> &str;

    fn process(
        &self,
        source: &str,
        path: &Path,
        instrument: bool,
    ) -> Result<TransformedSource, String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    TypeScript,
    JavaScript,
    Other,
}

impl FileKind {
    fn of(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("ts" | "tsx" | "mts" | "cts") => FileKind::TypeScript,
            Some("js" | "jsx" | "mjs" | "cjs") => FileKind::JavaScript,
            _ => FileKind::Other,
        }
    }
}

/// Configuration set and compiler for one host configuration
struct CompilerEntry {
    config: Arc<ConfigSet>,
    compiler: Mutex<Box<dyn TsCompiler>>,
}

#[derive(Default)]
struct EntryCache {
    /// Latest live configuration seen for each entry, compared by pointer
    by_identity: Vec<(Arc<HostConfig>, Arc<CompilerEntry>)>,
    /// Canonical and raw serialized forms
    by_serialized: FxHashMap<String, Arc<CompilerEntry>>,
}

/// Entry point for the host runner
///
/// One configuration set and compiler instance is built per distinct host
/// configuration and reused for every file, whether the host passes the live
/// configuration or its serialized form.
pub struct TsJestTransformer {
    container: Container,
    entries: Mutex<EntryCache>,
}

impl TsJestTransformer {
    pub fn new(container: Container) -> Self {
        Self {
            container,
            entries: Mutex::new(EntryCache::default()),
        }
    }

    /// The configuration set for `host`, built on first use
    pub fn config_set(&self, host: &Arc<HostConfig>) -> Result<Arc<ConfigSet>, TransformError> {
        Ok(self.entry_for(host)?.config.clone())
    }

    fn entry_for(&self, host: &Arc<HostConfig>) -> Result<Arc<CompilerEntry>, TransformError> {
        let mut cache = self.entries.lock().unwrap();
        if let Some((_, entry)) = cache
            .by_identity
            .iter()
            .find(|(known, _)| Arc::ptr_eq(known, host))
        {
            return Ok(entry.clone());
        }

        let canonical = host.to_canonical_json();
        let entry = match cache.by_serialized.get(&canonical) {
            Some(entry) => entry.clone(),
            None => {
                let entry = self.create_entry(host.clone())?;
                cache.by_serialized.insert(canonical, entry.clone());
                entry
            }
        };

        // One live slot per entry: an equal configuration rebuilt by the host
        // takes over the slot of the one it replaces.
        match cache
            .by_identity
            .iter_mut()
            .find(|(_, known)| Arc::ptr_eq(known, &entry))
        {
            Some(slot) => slot.0 = host.clone(),
            None => cache.by_identity.push((host.clone(), entry.clone())),
        }
        Ok(entry)
    }

    fn entry_for_serialized(&self, serialized: &str) -> Result<Arc<CompilerEntry>, TransformError> {
        if let Some(entry) = self.entries.lock().unwrap().by_serialized.get(serialized) {
            return Ok(entry.clone());
        }

        let host = Arc::new(HostConfig::from_json(serialized)?);
        let entry = self.entry_for(&host)?;
        self.entries
            .lock()
            .unwrap()
            .by_serialized
            .insert(serialized.to_string(), entry.clone());
        Ok(entry)
    }

    fn create_entry(&self, host: Arc<HostConfig>) -> Result<Arc<CompilerEntry>, TransformError> {
        let config = Arc::new(ConfigSet::new(host, &self.container)?);
        let compiler = create_compiler(config.clone());
        Ok(Arc::new(CompilerEntry {
            config,
            compiler: Mutex::new(compiler),
        }))
    }

    /// Transform one file
    pub fn process(
        &self,
        source: &str,
        path: &Path,
        host: &Arc<HostConfig>,
        options: &TransformOptions,
    ) -> Result<TransformedSource, TransformError> {
        let entry = self.entry_for(host)?;
        let config = &entry.config;
        let path = resolve_path(config.root_dir(), path);

        if is_declaration_file(&path) {
            return Ok(TransformedSource::new(""));
        }
        if config.should_stringify_content(&path) {
            return Ok(TransformedSource::new(format!(
                "module.exports={}",
                Value::from(source)
            )));
        }

        let fallback = self.container.fallback_transformer();
        let handler = config.diagnostic_handler();
        let result = match FileKind::of(&path) {
            FileKind::JavaScript if !config.allow_js() => {
                handler.warning(
                    codes::JS_FILE_WITHOUT_ALLOW_JS,
                    &format!(
                        "Got a `.js` file to compile while `allowJs` option is not set to `true` (file: {}). \
                         If you want TypeScript to process this file, set `allowJs` to `true` in your TypeScript config.",
                        path.display()
                    ),
                );
                TransformedSource::new(source)
            }
            FileKind::TypeScript | FileKind::JavaScript => {
                let output = entry.compiler.lock().unwrap().compile(source, &path, options)?;
                TransformedSource {
                    code: output.code,
                    map: output.source_map,
                }
            }
            FileKind::Other => {
                let hint = match fallback {
                    Some(f) => format!(
                        " It will be handed to the `{}` transformer as is.",
                        f.name()
                    ),
                    None => String::new(),
                };
                handler.warning(
                    codes::UNKNOWN_FILE_TYPE,
                    &format!(
                        "Got a unknown file type to compile (file: {}). \
                         Change the transform pattern so that it does not match this kind of files anymore.{hint}",
                        path.display()
                    ),
                );
                TransformedSource::new(source)
            }
        };

        match fallback {
            Some(fallback) => {
                debug!("Passing {:?} to {}", path, fallback.name());
                fallback
                    .process(&result.code, &path, false)
                    .map_err(|message| TransformError::Fallback {
                        name: fallback.name().to_string(),
                        message,
                    })
            }
            None => Ok(result),
        }
    }

    /// Cache key for a file, with the host configuration in serialized form
    pub fn get_cache_key(
        &self,
        source: &str,
        path: &Path,
        serialized_host_config: &str,
        options: &TransformOptions,
    ) -> Result<String, TransformError> {
        let entry = self.entry_for_serialized(serialized_host_config)?;
        self.compute_cache_key(&entry, source, path, options)
    }

    /// Cache key for a file, with the live host configuration
    pub fn get_cache_key_for(
        &self,
        source: &str,
        path: &Path,
        host: &Arc<HostConfig>,
        options: &TransformOptions,
    ) -> Result<String, TransformError> {
        let entry = self.entry_for(host)?;
        self.compute_cache_key(&entry, source, path, options)
    }

    fn compute_cache_key(
        &self,
        entry: &CompilerEntry,
        source: &str,
        path: &Path,
        options: &TransformOptions,
    ) -> Result<String, TransformError> {
        let config = &entry.config;
        let path = resolve_path(config.root_dir(), path);

        let mut key = CacheKeyBuilder::new();
        key.push(config.cache_key())
            .push(config.root_dir().to_string_lossy().as_bytes())
            .push(if options.instrument {
                "instrument:on"
            } else {
                "instrument:off"
            })
            .push(source)
            .push(path.to_string_lossy().as_bytes());
        if let Some(fallback) = self.container.fallback_transformer() {
            key.push(fallback.name());
        }

        if !config.is_isolated() {
            let modules: Vec<PathBuf> = entry
                .compiler
                .lock()
                .unwrap()
                .resolved_modules(source, &path)?;
            let fs = config.file_system();
            for module in modules {
                key.push(module.to_string_lossy().as_bytes());
                match fs.modified(&module) {
                    Ok(modified) => key.push(mtime_millis(modified).to_string()),
                    Err(e) => {
                        warn!("Cannot stat resolved module {:?}: {}", module, e);
                        key.push("missing")
                    }
                };
            }
        }

        Ok(key.finish())
    }
}
