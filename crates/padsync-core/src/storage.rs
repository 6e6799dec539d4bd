//! Backing-file access for documents with no open buffer.
//!
//! Implementations:
//! - `InMemoryStorage` - For testing
//! - `DirStorage` - Real files under the session root via std::fs
//!
//! Remote content normally lands in an open buffer; these writes are the
//! fallback when nothing is open, and deletes happen only on forced remote
//! deletion. Durability is out of scope; errors are surfaced so callers
//! can log and continue.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Remove {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Where document text lands when no host buffer is open to receive it.
pub trait Storage {
    /// Write `text` to `path`, creating parent directories as needed.
    fn write(&mut self, path: &Path, text: &str) -> Result<()>;

    /// Delete the file at `path`. A missing file is not an error.
    fn remove(&mut self, path: &Path) -> Result<()>;
}

/// Storage over a real directory tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirStorage;

impl DirStorage {
    pub fn new() -> Self {
        Self
    }
}

impl Storage for DirStorage {
    fn write(&mut self, path: &Path, text: &str) -> Result<()> {
        let wrap = |source| StorageError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(wrap)?;
        }
        fs::write(path, text).map_err(wrap)
    }

    fn remove(&mut self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Remove {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// In-memory storage for testing.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    files: HashMap<PathBuf, String>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self, path: &Path) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Storage for InMemoryStorage {
    fn write(&mut self, path: &Path, text: &str) -> Result<()> {
        self.files.insert(path.to_path_buf(), text.to_string());
        Ok(())
    }

    fn remove(&mut self, path: &Path) -> Result<()> {
        self.files.remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_write_read_remove() {
        let mut storage = InMemoryStorage::new();
        let path = Path::new("/ws/notes/a.md");

        storage.write(path, "hello").unwrap();
        assert_eq!(storage.read(path), Some("hello"));
        assert_eq!(storage.len(), 1);

        storage.remove(path).unwrap();
        assert!(!storage.contains(path));
        // Removing a missing file is fine.
        storage.remove(path).unwrap();
    }

    #[test]
    fn test_dir_storage_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = DirStorage::new();
        let path = dir.path().join("deep/nested/a.md");

        storage.write(&path, "content").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "content");
    }

    #[test]
    fn test_dir_storage_remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = DirStorage::new();
        let path = dir.path().join("a.md");

        storage.remove(&path).unwrap();

        storage.write(&path, "x").unwrap();
        storage.remove(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_dir_storage_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = DirStorage::new();
        let path = dir.path().join("a.md");

        storage.write(&path, "one").unwrap();
        storage.write(&path, "two").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
    }
}
