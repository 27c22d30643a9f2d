//! Cache Pools - cache item pools with deferred commits
//!
//! Provides item pools over memory, file and record storage, a simple
//! key/value facade, and a registry of named instances.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod registry;
pub mod simple;
pub mod storage;

pub use cache::{CacheItem, CachePool, DeleteExpiredItems, FilePool, MemoryPool, RecordPool, Ttl};
pub use clock::{Clock, FrozenClock, SharedClock, SystemClock};
pub use config::{Backend, Config};
pub use error::{CacheError, Result, StorageError};
pub use registry::{CacheRegistry, PoolRegistry, Registry};
pub use simple::SimpleCache;
