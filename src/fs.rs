//! File system collaborator used to locate and read partials.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

/// Storage for templates. Sync methods serve the synchronous driver;
/// the async ones default to them.
#[async_trait(?Send)]
pub trait FileSystem: fmt::Debug + Send + Sync {
    fn exists_sync(&self, path: &str) -> bool;

    /// # Errors
    ///
    /// Returns the underlying I/O error.
    fn read_file_sync(&self, path: &str) -> io::Result<String>;

    async fn exists(&self, path: &str) -> bool {
        self.exists_sync(path)
    }

    async fn read_file(&self, path: &str) -> io::Result<String> {
        self.read_file_sync(path)
    }

    fn dirname(&self, path: &str) -> String {
        Path::new(path)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Join `file` onto `root`, append `extname` when `file` has no
    /// extension, and normalize `.` and `..` lexically.
    fn resolve(&self, root: &str, file: &str, extname: &str) -> String {
        let mut path = normalize(&Path::new(root).join(file));
        if !extname.is_empty() && path.extension().is_none() {
            let mut name = path.file_name().unwrap_or_default().to_os_string();
            name.push(extname);
            path.set_file_name(name);
        }
        path.to_string_lossy().into_owned()
    }

    /// Whether `file` lies under `root`.
    fn contains(&self, root: &str, file: &str) -> bool {
        normalize(Path::new(file)).starts_with(normalize(Path::new(root)))
    }

    fn sep(&self) -> char {
        std::path::MAIN_SEPARATOR
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Disk-backed file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

#[async_trait(?Send)]
impl FileSystem for LocalFs {
    fn exists_sync(&self, path: &str) -> bool {
        Path::new(path).is_file()
    }

    fn read_file_sync(&self, path: &str) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// In-memory file system keyed by normalized path.
#[derive(Debug, Default, Clone)]
pub struct MemoryFs {
    files: HashMap<String, String>,
}

impl MemoryFs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_file(mut self, path: &str, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&mut self, path: &str, content: impl Into<String>) {
        let key = normalize(Path::new(path)).to_string_lossy().into_owned();
        self.files.insert(key, content.into());
    }
}

#[async_trait(?Send)]
impl FileSystem for MemoryFs {
    fn exists_sync(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    fn read_file_sync(&self, path: &str) -> io::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }
}
