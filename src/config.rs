//! Configuration Module
//!
//! Loads the backend selection and pool settings from environment variables.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::cache::Ttl;
use crate::error::CacheError;

/// Storage backend behind the configured pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// One file per item under `cache_dir/namespace`
    #[default]
    File,
    /// One row per item in `cache_dir/cache.sqlite3`
    Sqlite,
}

impl FromStr for Backend {
    type Err = CacheError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Backend::File),
            "sqlite" => Ok(Backend::Sqlite),
            other => Err(CacheError::InvalidArgument(format!(
                "unknown backend {:?}, expected file or sqlite",
                other
            ))),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::File => f.write_str("file"),
            Backend::Sqlite => f.write_str("sqlite"),
        }
    }
}

/// Pool configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Storage backend
    pub backend: Backend,
    /// Root directory for cache files and the SQLite database
    pub cache_dir: PathBuf,
    /// Folder name for the file pool, record namespace for the SQLite pool
    pub namespace: String,
    /// Default TTL in seconds; `None` stores items without expiration
    pub default_ttl: Option<u64>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_BACKEND` - `file` or `sqlite` (default: file)
    /// - `CACHE_DIR` - Storage root directory (default: ./cache)
    /// - `CACHE_NAMESPACE` - Pool namespace (default: default)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: unset, never expires)
    ///
    /// Unparsable values fall back to their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            backend: env::var("CACHE_BACKEND")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.backend),
            cache_dir: env::var("CACHE_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            namespace: env::var("CACHE_NAMESPACE")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.namespace),
            default_ttl: env::var("DEFAULT_TTL").ok().and_then(|v| v.parse().ok()),
        }
    }

    /// Default TTL as a [`Ttl`].
    pub fn ttl(&self) -> Option<Ttl> {
        self.default_ttl.map(Ttl::from)
    }

    /// Location of the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        self.cache_dir.join("cache.sqlite3")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::File,
            cache_dir: PathBuf::from("./cache"),
            namespace: "default".to_string(),
            default_ttl: None,
        }
    }
}
