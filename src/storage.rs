//! File storage boundary for uploaded document bytes.
//!
//! The pipeline and export builder only see the `FileStore` trait; production
//! code uses `LocalFileStore` rooted at the configured documents directory,
//! tests substitute a tempdir-rooted store.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File not found in storage: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait FileStore: Send + Sync {
    /// Persist uploaded bytes under a stored filename; returns the storage
    /// path used for all later reads.
    fn write(&self, stored_filename: &str, bytes: &[u8]) -> Result<String, StorageError>;

    fn read(&self, file_path: &str) -> Result<Vec<u8>, StorageError>;

    fn delete(&self, file_path: &str) -> Result<(), StorageError>;
}

pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileStore for LocalFileStore {
    fn write(&self, stored_filename: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let path = self.root.join(stored_filename);
        fs::write(&path, bytes)?;
        Ok(path.to_string_lossy().into_owned())
    }

    fn read(&self, file_path: &str) -> Result<Vec<u8>, StorageError> {
        fs::read(file_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(file_path.to_string())
            } else {
                StorageError::Io(e)
            }
        })
    }

    fn delete(&self, file_path: &str) -> Result<(), StorageError> {
        fs::remove_file(file_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(file_path.to_string())
            } else {
                StorageError::Io(e)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (tempfile::TempDir, LocalFileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path().join("documents")).unwrap();
        (dir, store)
    }

    #[test]
    fn write_read_round_trip() {
        let (_dir, store) = test_store();
        let path = store.write("abc_receipt.png", b"fake png bytes").unwrap();
        assert!(path.ends_with("abc_receipt.png"));
        assert_eq!(store.read(&path).unwrap(), b"fake png bytes");
    }

    #[test]
    fn read_missing_file_is_not_found() {
        let (_dir, store) = test_store();
        let missing = store.root().join("nope.pdf");
        let result = store.read(&missing.to_string_lossy());
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn delete_removes_file() {
        let (_dir, store) = test_store();
        let path = store.write("gone.pdf", b"x").unwrap();
        store.delete(&path).unwrap();
        assert!(matches!(
            store.read(&path),
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            store.delete(&path),
            Err(StorageError::NotFound(_))
        ));
    }
}
