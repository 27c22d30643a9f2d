//! Shared helpers for integration tests.
//!
//! Wraps the in-memory stores so individual operations can be made to fail.

#![allow(dead_code)]

use std::collections::HashSet;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

use cache_pools::error::{StorageError, StorageResult};
use cache_pools::storage::{
    CacheRecord, FileStore, MemoryFileStore, MemoryRecordStore, RecordFilter, RecordStore,
    StoredFile,
};

// == Fault Switches ==
#[derive(Debug, Default)]
struct FaultState {
    reads: bool,
    writes: bool,
    deletes: bool,
    /// Paths or record ids whose writes and deletes fail
    targets: HashSet<String>,
}

/// Shared switches; clones control the same store.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    state: Arc<Mutex<FaultState>>,
}

impl Faults {
    pub fn fail_reads(&self, on: bool) {
        self.state.lock().reads = on;
    }

    pub fn fail_writes(&self, on: bool) {
        self.state.lock().writes = on;
    }

    pub fn fail_deletes(&self, on: bool) {
        self.state.lock().deletes = on;
    }

    /// Makes writes and deletes of one path or record id fail.
    pub fn fail_target(&self, target: impl Into<String>) {
        self.state.lock().targets.insert(target.into());
    }

    pub fn reset(&self) {
        *self.state.lock() = FaultState::default();
    }

    fn check_read(&self) -> StorageResult<()> {
        if self.state.lock().reads {
            return Err(injected("read"));
        }
        Ok(())
    }

    fn check_write(&self, target: &str) -> StorageResult<()> {
        let state = self.state.lock();
        if state.writes || state.targets.contains(target) {
            return Err(injected("write"));
        }
        Ok(())
    }

    fn check_delete(&self, target: &str) -> StorageResult<()> {
        let state = self.state.lock();
        if state.deletes || state.targets.contains(target) {
            return Err(injected("delete"));
        }
        Ok(())
    }
}

fn injected(op: &str) -> StorageError {
    StorageError::Io(io::Error::new(
        io::ErrorKind::PermissionDenied,
        format!("injected {} failure", op),
    ))
}

// == Flaky File Store ==
#[derive(Debug, Clone, Default)]
pub struct FlakyFileStore {
    pub inner: MemoryFileStore,
    pub faults: Faults,
}

impl FileStore for FlakyFileStore {
    fn write(&self, path: &str, content: &[u8]) -> StorageResult<()> {
        self.faults.check_write(path)?;
        self.inner.write(path, content)
    }

    fn read(&self, path: &str) -> StorageResult<Vec<u8>> {
        self.faults.check_read()?;
        self.inner.read(path)
    }

    fn delete(&self, path: &str) -> StorageResult<()> {
        self.faults.check_delete(path)?;
        self.inner.delete(path)
    }

    fn delete_folder(&self, path: &str) -> StorageResult<()> {
        self.faults.check_delete(path)?;
        self.inner.delete_folder(path)
    }

    fn list_files(&self, path: &str) -> StorageResult<Vec<StoredFile>> {
        self.faults.check_read()?;
        self.inner.list_files(path)
    }
}

// == Flaky Record Store ==
#[derive(Debug, Clone, Default)]
pub struct FlakyRecordStore {
    pub inner: MemoryRecordStore,
    pub faults: Faults,
}

impl RecordStore for FlakyRecordStore {
    fn upsert(&self, record: &CacheRecord) -> StorageResult<()> {
        self.faults.check_write(&record.id)?;
        self.inner.upsert(record)
    }

    fn find(&self, id: &str) -> StorageResult<Option<CacheRecord>> {
        self.faults.check_read()?;
        self.inner.find(id)
    }

    fn delete(&self, id: &str) -> StorageResult<()> {
        self.faults.check_delete(id)?;
        self.inner.delete(id)
    }

    fn delete_where(&self, filter: &RecordFilter) -> StorageResult<usize> {
        self.faults.check_delete("")?;
        self.inner.delete_where(filter)
    }

    fn count(&self, filter: &RecordFilter) -> StorageResult<usize> {
        self.faults.check_read()?;
        self.inner.count(filter)
    }
}
