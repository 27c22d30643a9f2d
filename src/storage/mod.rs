//! Storage Module
//!
//! Persistence collaborators the durable pools delegate to: a byte-oriented
//! file store and a record-oriented table store.

mod local;
mod memory_files;
mod memory_records;
mod sqlite;

pub use local::LocalFileStore;
pub use memory_files::MemoryFileStore;
pub use memory_records::MemoryRecordStore;
pub use sqlite::{SqliteRecordStore, TableLayout};

use serde::{Deserialize, Serialize};

use crate::error::StorageResult;

// == File Store ==
/// A file with its content, as returned by [`FileStore::list_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Path relative to the store root, `/` separated
    pub path: String,
    pub content: Vec<u8>,
}

/// Byte-oriented storage addressed by `/` separated relative paths.
pub trait FileStore {
    /// Writes a file, creating parent folders as needed.
    fn write(&self, path: &str, content: &[u8]) -> StorageResult<()>;

    /// Reads a file; a missing file is `StorageError::NotFound`.
    fn read(&self, path: &str) -> StorageResult<Vec<u8>>;

    /// Deletes a file.
    fn delete(&self, path: &str) -> StorageResult<()>;

    /// Deletes a folder and everything below it.
    fn delete_folder(&self, path: &str) -> StorageResult<()>;

    /// Lists every file directly inside a folder, with content.
    fn list_files(&self, path: &str) -> StorageResult<Vec<StoredFile>>;
}

// == Record Store ==
/// One cache record as kept in a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Unique id derived from namespace and key
    pub id: String,
    /// Serialized item
    pub data: String,
    /// Expiration as Unix milliseconds, None = never expires
    pub expiration: Option<i64>,
    pub namespace: String,
}

/// Selection used by bulk record operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordFilter {
    /// Every record in the namespace
    Namespace(String),
    /// Records in the namespace with an expiration strictly before `now`
    /// (Unix milliseconds); records without expiration never match
    ExpiredBefore { namespace: String, now: i64 },
}

impl RecordFilter {
    /// Evaluates the filter against a record.
    pub fn matches(&self, record: &CacheRecord) -> bool {
        match self {
            RecordFilter::Namespace(namespace) => &record.namespace == namespace,
            RecordFilter::ExpiredBefore { namespace, now } => {
                &record.namespace == namespace
                    && record.expiration.is_some_and(|expiration| expiration < *now)
            }
        }
    }
}

/// Record-oriented storage bound to one table.
pub trait RecordStore {
    /// Inserts a record or replaces the one with the same id.
    fn upsert(&self, record: &CacheRecord) -> StorageResult<()>;

    /// Reads a record by id.
    fn find(&self, id: &str) -> StorageResult<Option<CacheRecord>>;

    /// Deletes a record by id; deleting an absent id is not an error.
    fn delete(&self, id: &str) -> StorageResult<()>;

    /// Deletes every matching record, returning how many were removed.
    fn delete_where(&self, filter: &RecordFilter) -> StorageResult<usize>;

    /// Counts matching records.
    fn count(&self, filter: &RecordFilter) -> StorageResult<usize>;
}
