//! Filesystem-backed object store.
//!
//! Stands in for a cloud bucket: objects are addressed by
//! container-relative keys (`receipts/20260807-101500-ab12cd34.jpg`)
//! and written exactly once. Keys may contain `/` segments but can
//! never escape the container root.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid object key '{0}'")]
    InvalidKey(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write object '{key}': {source}")]
    WriteObject {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// A single named container of objects rooted at a directory.
pub struct ObjectStore {
    container: String,
    container_root: PathBuf,
}

impl ObjectStore {
    pub fn new<P: AsRef<Path>>(root: P, container: &str) -> Self {
        Self {
            container: container.to_string(),
            container_root: root.as_ref().join(container),
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// Writes an object under `key`. The write is create-only: storing
    /// the same key twice is an error, which backs up the single-use
    /// guarantee of upload credentials.
    pub fn put(&self, key: &str, content: &[u8]) -> Result<PathBuf, StorageError> {
        validate_key(key)?;

        let path = self.container_root.join(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        // create_new gives an atomic check-and-create, so two concurrent
        // writers of one key cannot both succeed.
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                use std::io::Write;
                file.write_all(content).map_err(|e| StorageError::WriteObject {
                    key: key.to_string(),
                    source: e,
                })?;
                log::debug!("Stored object {} ({} bytes)", key, content.len());
                Ok(path)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StorageError::AlreadyExists(key.to_string()))
            }
            Err(e) => Err(StorageError::WriteObject {
                key: key.to_string(),
                source: e,
            }),
        }
    }

    /// Whether an object exists under `key`. Invalid keys simply don't
    /// exist.
    pub fn exists(&self, key: &str) -> bool {
        if validate_key(key).is_err() {
            return false;
        }
        self.container_root.join(key).is_file()
    }
}

/// Rejects keys that are empty, absolute, contain traversal segments, or
/// carry characters that cannot safely map to a path.
fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() || key.contains('\\') || key.contains('\0') {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    if key.starts_with('/') || key.ends_with('/') {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    if key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}
