//! Cache Module
//!
//! Cache items, the pool contract and its in-memory, file and record backends.

mod deferred;
mod file;
mod item;
pub mod key;
mod memory;
mod pool;
mod record;
mod ttl;


// Re-export public types
pub use deferred::DeferredQueue;
pub use file::FilePool;
pub use item::CacheItem;
pub use key::validate_key;
pub use memory::MemoryPool;
pub use pool::{CachePool, DeleteExpiredItems};
pub use record::{record_id, RecordPool};
pub use ttl::{Interval, Ttl};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Characters a key may not contain
pub const RESERVED_KEY_CHARACTERS: &str = "{}()/\\@:";

/// File name suffix for items stored by [`FilePool`]
pub const CACHE_FILE_SUFFIX: &str = ".cache";
