//! In-memory `RecordStore`.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::StorageResult;
use crate::storage::{CacheRecord, RecordFilter, RecordStore};

/// Record table kept in a shared map. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    records: Arc<RwLock<BTreeMap<String, CacheRecord>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records across all namespaces.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl RecordStore for MemoryRecordStore {
    fn upsert(&self, record: &CacheRecord) -> StorageResult<()> {
        self.records
            .write()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn find(&self, id: &str) -> StorageResult<Option<CacheRecord>> {
        Ok(self.records.read().get(id).cloned())
    }

    fn delete(&self, id: &str) -> StorageResult<()> {
        self.records.write().remove(id);
        Ok(())
    }

    fn delete_where(&self, filter: &RecordFilter) -> StorageResult<usize> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, record| !filter.matches(record));
        Ok(before - records.len())
    }

    fn count(&self, filter: &RecordFilter) -> StorageResult<usize> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|record| filter.matches(record))
            .count())
    }
}
