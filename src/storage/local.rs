//! Local File Store
//!
//! `FileStore` rooted at a directory on disk.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};
use crate::storage::{FileStore, StoredFile};

/// File store that keeps every path below a root directory.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    /// Opens a store at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a relative store path onto the filesystem.
    ///
    /// Absolute paths and `..` components are rejected.
    fn resolve(&self, path: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        let mut resolved = self.root.clone();

        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => return Err(StorageError::InvalidPath(path.to_string())),
            }
        }

        Ok(resolved)
    }
}

impl FileStore for LocalFileStore {
    fn write(&self, path: &str, content: &[u8]) -> StorageResult<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write beside the target and rename so readers never see partial content
        let staging = target.with_extension("tmp");
        fs::write(&staging, content)?;
        fs::rename(&staging, &target)?;
        Ok(())
    }

    fn read(&self, path: &str) -> StorageResult<Vec<u8>> {
        let target = self.resolve(path)?;
        fs::read(&target).map_err(|err| match err.kind() {
            ErrorKind::NotFound => StorageError::NotFound(path.to_string()),
            _ => StorageError::Io(err),
        })
    }

    fn delete(&self, path: &str) -> StorageResult<()> {
        let target = self.resolve(path)?;
        match fs::remove_file(&target) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn delete_folder(&self, path: &str) -> StorageResult<()> {
        let target = self.resolve(path)?;
        if target == self.root {
            return Err(StorageError::InvalidPath(path.to_string()));
        }

        match fs::remove_dir_all(&target) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn list_files(&self, path: &str) -> StorageResult<Vec<StoredFile>> {
        let folder = self.resolve(path)?;
        let entries = match fs::read_dir(&folder) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let prefix = path.trim_matches('/');
        let mut files = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Skipping unreadable entry under {:?}: {}", folder, err);
                    continue;
                }
            };
            let Some(content) = read_entry(&entry.path()) else {
                continue;
            };

            let name = entry.file_name().to_string_lossy().into_owned();
            files.push(StoredFile {
                path: if prefix.is_empty() {
                    name
                } else {
                    format!("{}/{}", prefix, name)
                },
                content,
            });
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        debug!("Listed {} files under {:?}", files.len(), folder);
        Ok(files)
    }
}

/// Reads one listed entry.
///
/// Returns `None` for anything that is not a regular file, including entries
/// removed since the folder was read. Other failures are logged and skipped.
fn read_entry(path: &Path) -> Option<Vec<u8>> {
    let result = fs::metadata(path).and_then(|meta| {
        if meta.is_file() {
            fs::read(path).map(Some)
        } else {
            Ok(None)
        }
    });

    match result {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!("{:?} vanished while listing", path);
            None
        }
        Err(err) => {
            warn!("Skipping unreadable file {:?}: {}", path, err);
            None
        }
    }
}
