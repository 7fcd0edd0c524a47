//! File system seam
//!
//! Everything the core reads or writes on disk goes through [`FileSystem`] so
//! that tests can drive modification times and file contents deterministically.

use rustc_hash::FxHashMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use walkdir::WalkDir;

/// Trait for file system access
/// This allows for dependency injection and testing with an in-memory file system
pub trait FileSystem: Send + Sync {
    fn read_file(&self, path: &Path) -> io::Result<String>;

    /// Write a whole file, creating parent directories as needed
    fn write_file(&self, path: &Path, content: &str) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;

    fn file_exists(&self, path: &Path) -> bool;

    fn modified(&self, path: &Path) -> io::Result<SystemTime>;

    /// Every file below `dir`, sorted; `node_modules` directories are skipped
    fn list_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;
}

fn is_node_modules_dir(name: &std::ffi::OsStr) -> bool {
    name == "node_modules"
}

/// File system backed by `std::fs`
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFileSystem;

impl RealFileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFileSystem {
    fn read_file(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write_file(&self, path: &Path, content: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        std::fs::metadata(path)?.modified()
    }

    fn list_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let walker = WalkDir::new(dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_node_modules_dir(e.file_name()));
        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }
}

#[derive(Debug, Clone)]
struct MockFile {
    content: String,
    modified: SystemTime,
}

/// In-memory file system for tests
///
/// Modification times come from a logical clock that advances by one second
/// on every write, so two writes to the same file always yield distinct mtimes.
#[derive(Debug, Default)]
pub struct MockFileSystem {
    files: Mutex<FxHashMap<PathBuf, MockFile>>,
    clock: Mutex<u64>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<String>) {
        let modified = self.tick();
        self.files.lock().unwrap().insert(
            normalize_path(path.as_ref()),
            MockFile {
                content: content.into(),
                modified,
            },
        );
    }

    /// Bump the modification time without touching the content
    pub fn touch(&self, path: impl AsRef<Path>) {
        let modified = self.tick();
        if let Some(file) = self
            .files
            .lock()
            .unwrap()
            .get_mut(&normalize_path(path.as_ref()))
        {
            file.modified = modified;
        }
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.files.lock().unwrap().keys().cloned().collect();
        paths.sort();
        paths
    }

    fn tick(&self) -> SystemTime {
        let mut clock = self.clock.lock().unwrap();
        *clock += 1;
        UNIX_EPOCH + Duration::from_secs(*clock)
    }

    fn not_found(path: &Path) -> io::Error {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no such file: {}", path.display()),
        )
    }
}

impl FileSystem for MockFileSystem {
    fn read_file(&self, path: &Path) -> io::Result<String> {
        self.files
            .lock()
            .unwrap()
            .get(&normalize_path(path))
            .map(|f| f.content.clone())
            .ok_or_else(|| Self::not_found(path))
    }

    fn write_file(&self, path: &Path, content: &str) -> io::Result<()> {
        self.add_file(path, content);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.files
            .lock()
            .unwrap()
            .remove(&normalize_path(path))
            .map(|_| ())
            .ok_or_else(|| Self::not_found(path))
    }

    fn file_exists(&self, path: &Path) -> bool {
        self.files
            .lock()
            .unwrap()
            .contains_key(&normalize_path(path))
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        self.files
            .lock()
            .unwrap()
            .get(&normalize_path(path))
            .map(|f| f.modified)
            .ok_or_else(|| Self::not_found(path))
    }
    fn list_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let dir = normalize_path(dir);
        let mut files: Vec<PathBuf> = self
            .files
            .lock()
            .unwrap()
            .keys()
            .filter(|path| {
                path.strip_prefix(&dir).is_ok_and(|relative| {
                    !relative.components().any(|c| is_node_modules_dir(c.as_os_str()))
                })
            })
            .cloned()
            .collect();
        files.sort();
        Ok(files)
    }
}

/// Lexically normalize a path: drop `.` segments and fold `..` into its parent.
/// Does not touch the file system, so it works for files that do not exist yet.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolve `path` against `base` unless it is already absolute, then normalize
pub fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_path(path)
    } else {
        normalize_path(&base.join(path))
    }
}

/// Milliseconds since the Unix epoch, saturating at zero for pre-epoch times
pub fn mtime_millis(time: SystemTime) -> u128 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
