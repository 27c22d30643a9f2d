//! In-memory `FileStore`.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{StorageError, StorageResult};
use crate::storage::{FileStore, StoredFile};

/// File store kept in a shared map.
///
/// Clones share the same files, so a test can keep a handle while a pool
/// owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileStore {
    files: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored files.
    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

fn normalize(path: &str) -> String {
    path.trim_matches('/').to_string()
}

fn folder_prefix(path: &str) -> String {
    let folder = normalize(path);
    if folder.is_empty() {
        folder
    } else {
        format!("{}/", folder)
    }
}

impl FileStore for MemoryFileStore {
    fn write(&self, path: &str, content: &[u8]) -> StorageResult<()> {
        let path = normalize(path);
        if path.is_empty() {
            return Err(StorageError::InvalidPath(path));
        }
        self.files.write().insert(path, content.to_vec());
        Ok(())
    }

    fn read(&self, path: &str) -> StorageResult<Vec<u8>> {
        self.files
            .read()
            .get(&normalize(path))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    fn delete(&self, path: &str) -> StorageResult<()> {
        self.files.write().remove(&normalize(path));
        Ok(())
    }

    fn delete_folder(&self, path: &str) -> StorageResult<()> {
        let prefix = folder_prefix(path);
        if prefix.is_empty() {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        self.files.write().retain(|name, _| !name.starts_with(&prefix));
        Ok(())
    }

    fn list_files(&self, path: &str) -> StorageResult<Vec<StoredFile>> {
        let prefix = folder_prefix(path);
        let files = self.files.read();

        Ok(files
            .iter()
            .filter(|(name, _)| {
                name.strip_prefix(&prefix)
                    .is_some_and(|rest| !rest.contains('/'))
            })
            .map(|(name, content)| StoredFile {
                path: name.clone(),
                content: content.clone(),
            })
            .collect())
    }
}
