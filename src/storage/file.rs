//! File-backed storage: one file per key under a directory.
//!
//! Keys are hex-encoded into file names so that any key string (slashes,
//! dots, unicode) maps to a single flat file. Keys whose hex form would not
//! fit in a file name are stored under a name-based UUID (v5) of the key
//! instead. Behaves like a browser's local storage that survives process
//! restarts.

use std::fmt::Write as _;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::StorageBackend;
use crate::error::StorageError;

/// File extension used for stored values.
const EXTENSION: &str = "json";

/// Longest file name accepted by common filesystems, in bytes.
const MAX_FILE_NAME: usize = 255;

/// Directory-backed store.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Opens (and creates if needed) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        tracing::debug!(dir = %dir.display(), "file storage opened");
        Ok(Self { dir })
    }

    /// Returns the root directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let hex_len = key.len().saturating_mul(2);
        let mut name = String::with_capacity(hex_len.min(MAX_FILE_NAME));
        if hex_len.saturating_add(EXTENSION.len() + 1) <= MAX_FILE_NAME {
            for byte in key.as_bytes() {
                let _ = write!(name, "{byte:02x}");
            }
        } else {
            // hyphenated, so never equal to a hex-encoded name
            let digest = uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, key.as_bytes());
            let _ = write!(name, "{}", digest.hyphenated());
        }
        name.push('.');
        name.push_str(EXTENSION);
        self.dir.join(name)
    }
}

impl StorageBackend for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
