//! Cache Pools - operator CLI
//!
//! Reads, writes and sweeps a file or SQLite backed cache pool from the
//! command line.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cache_pools::cache::{CachePool, DeleteExpiredItems, FilePool, RecordPool, Ttl};
use cache_pools::clock::system_clock;
use cache_pools::storage::{LocalFileStore, SqliteRecordStore, TableLayout};
use cache_pools::{Backend, Config, SimpleCache};

type Cache = SimpleCache<Box<dyn CachePool>>;

/// Inspect and maintain a cache pool
#[derive(Parser, Debug)]
#[command(name = "cache_pools", version, about)]
struct Cli {
    /// Storage backend (file or sqlite)
    #[arg(long, env = "CACHE_BACKEND")]
    backend: Option<Backend>,

    /// Storage root directory
    #[arg(long, env = "CACHE_DIR")]
    dir: Option<PathBuf>,

    /// Pool namespace
    #[arg(long, env = "CACHE_NAMESPACE")]
    namespace: Option<String>,

    /// Default TTL in seconds for written values
    #[arg(long, env = "DEFAULT_TTL")]
    default_ttl: Option<u64>,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug, Clone)]
enum Action {
    /// Print the values of one or more keys
    Get {
        /// Cache keys
        #[arg(required = true)]
        keys: Vec<String>,
        /// JSON value printed for missing keys
        #[arg(long, default_value = "null")]
        default: String,
    },

    /// Store a value
    Set {
        /// Cache key
        key: String,
        /// Value, parsed as JSON and stored as a string otherwise
        value: String,
        /// TTL in seconds, overriding the default TTL
        #[arg(long)]
        ttl: Option<i64>,
    },

    /// Delete one or more keys
    Delete {
        /// Cache keys
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Exit with status 0 if the key holds a live value, 1 otherwise
    Has {
        /// Cache key
        key: String,
    },

    /// Remove every item of the namespace
    Clear,

    /// Remove expired items
    Sweep,
}

fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cache_pools=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli);
    debug!(
        "Configuration loaded: backend={}, dir={}, namespace={}, default_ttl={:?}",
        config.backend,
        config.cache_dir.display(),
        config.namespace,
        config.default_ttl
    );

    let mut cache = open_cache(&config)?;
    let found = run(&mut cache, cli.action)?;

    if !cache.close() {
        warn!("Some writes could not be flushed");
    }

    if !found {
        std::process::exit(1);
    }
    Ok(())
}

/// Layers CLI flags over the environment configuration.
fn resolve_config(cli: &Cli) -> Config {
    let mut config = Config::from_env();
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(dir) = &cli.dir {
        config.cache_dir = dir.clone();
    }
    if let Some(namespace) = &cli.namespace {
        config.namespace = namespace.clone();
    }
    if cli.default_ttl.is_some() {
        config.default_ttl = cli.default_ttl;
    }
    config
}

fn open_cache(config: &Config) -> anyhow::Result<Cache> {
    let clock = system_clock();

    let pool: Box<dyn CachePool> = match config.backend {
        Backend::File => {
            let store = LocalFileStore::open(&config.cache_dir)
                .with_context(|| format!("opening {}", config.cache_dir.display()))?;
            Box::new(FilePool::new(
                store,
                config.namespace.clone(),
                clock,
                config.ttl(),
            )?)
        }
        Backend::Sqlite => {
            std::fs::create_dir_all(&config.cache_dir)
                .with_context(|| format!("creating {}", config.cache_dir.display()))?;
            let path = config.database_path();
            let store = SqliteRecordStore::open(&path, TableLayout::default())
                .with_context(|| format!("opening {}", path.display()))?;
            Box::new(RecordPool::new(
                store,
                config.namespace.clone(),
                clock,
                config.ttl(),
            )?)
        }
    };

    info!("Opened {} pool {}", config.backend, config.namespace);
    Ok(SimpleCache::new(pool, config.ttl()))
}

/// Runs one action; returns false when `has` finds nothing.
fn run(cache: &mut Cache, action: Action) -> anyhow::Result<bool> {
    match action {
        Action::Get { keys, default } => {
            let default = parse_value(&default);
            if let [key] = keys.as_slice() {
                println!("{}", cache.get(key, default)?);
            } else {
                let values: Map<String, Value> = cache.get_multiple(keys, default)?.collect();
                println!("{}", Value::Object(values));
            }
        }
        Action::Set { key, value, ttl } => {
            if !cache.set(&key, parse_value(&value), ttl.map(Ttl::Seconds))? {
                bail!("failed to store {}", key);
            }
            info!("Stored {}", key);
        }
        Action::Delete { keys } => {
            let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
            if !cache.delete_multiple(&keys)? {
                bail!("failed to delete some keys");
            }
        }
        Action::Has { key } => {
            let found = cache.has(&key)?;
            println!("{}", found);
            return Ok(found);
        }
        Action::Clear => {
            if !cache.clear() {
                bail!("failed to clear the pool");
            }
            info!("Cleared pool");
        }
        Action::Sweep => {
            if !cache.delete_expired_items() {
                bail!("sweep failed or is not supported by this backend");
            }
            info!("Removed expired items");
        }
    }
    Ok(true)
}

/// Parses `raw` as JSON, falling back to a plain string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
