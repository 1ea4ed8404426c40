//! Database connection pool management.
//!
//! SQLite allows one writer at a time, so writes go through a dedicated
//! single-connection pool and queue in-process instead of racing for the
//! file lock. Reads use a separate pool of read-only connections; in WAL
//! mode they see a consistent snapshot and never block the writer.

use std::str::FromStr;
use std::time::{Duration, Instant};

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::{debug, info, warn};

use quire_core::{defaults, Error, Result};

/// Store configuration options.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// SQLite URL, e.g. `sqlite://quire.db` or `sqlite::memory:`.
    pub database_url: String,
    /// Maximum number of read connections.
    pub max_readers: u32,
    /// How long a connection waits on a locked database.
    pub busy_timeout: Duration,
    /// How long a caller waits for a free connection.
    pub acquire_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: defaults::DATABASE_URL.to_string(),
            max_readers: defaults::MAX_READERS,
            busy_timeout: Duration::from_millis(defaults::BUSY_TIMEOUT_MS),
            acquire_timeout: Duration::from_secs(defaults::ACQUIRE_TIMEOUT_SECS),
        }
    }
}

impl StoreConfig {
    /// Create a new store configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the environment, reading `.env` when present.
    ///
    /// Environment variables:
    /// - `QUIRE_DATABASE_URL` (default: `sqlite://quire.db`)
    /// - `QUIRE_MAX_READERS` (default: 8)
    /// - `QUIRE_BUSY_TIMEOUT_MS` (default: 5000)
    /// - `QUIRE_ACQUIRE_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        if let Ok(url) = std::env::var("QUIRE_DATABASE_URL") {
            config.database_url = url;
        }
        if let Some(n) = parse_env::<u32>("QUIRE_MAX_READERS")? {
            config.max_readers = n;
        }
        if let Some(ms) = parse_env::<u64>("QUIRE_BUSY_TIMEOUT_MS")? {
            config.busy_timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_env::<u64>("QUIRE_ACQUIRE_TIMEOUT_SECS")? {
            config.acquire_timeout = Duration::from_secs(secs);
        }
        config.validate()?;
        Ok(config)
    }

    /// Set the database URL.
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }

    /// Set the maximum number of read connections.
    pub fn max_readers(mut self, n: u32) -> Self {
        self.max_readers = n;
        self
    }

    /// Set the busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Set the acquire timeout.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(Error::Config("database URL must not be empty".to_string()));
        }
        if self.max_readers == 0 {
            return Err(Error::Config("max_readers must be at least 1".to_string()));
        }
        Ok(())
    }

    /// In-memory databases exist per connection, so they cannot be split
    /// into reader and writer pools.
    pub fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
    }
}

fn parse_env<T: FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} has invalid value {:?}", key, raw))),
        Err(_) => Ok(None),
    }
}

/// Writer and reader pools over one database.
#[derive(Debug, Clone)]
pub struct StorePools {
    /// Single connection; every mutation runs here.
    pub writer: SqlitePool,
    /// Read-only snapshot connections for search and lookups.
    pub reader: SqlitePool,
}

/// Open the writer and reader pools described by `config`.
pub async fn create_pools(config: &StoreConfig) -> Result<StorePools> {
    config.validate()?;
    let start = Instant::now();

    info!(
        subsystem = "db",
        component = "pool",
        op = "create",
        max_readers = config.max_readers,
        busy_timeout_ms = config.busy_timeout.as_millis() as u64,
        acquire_timeout_secs = config.acquire_timeout.as_secs(),
        in_memory = config.is_in_memory(),
        "Creating database connection pools"
    );

    let base = SqliteConnectOptions::from_str(&config.database_url)?
        .foreign_keys(true)
        .busy_timeout(config.busy_timeout);

    if config.is_in_memory() {
        // One connection that is never recycled holds the whole database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(base)
            .await?;
        log_established(&pool, "shared", start);
        return Ok(StorePools {
            reader: pool.clone(),
            writer: pool,
        });
    }

    let writer_options = base
        .clone()
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);
    let writer = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(writer_options)
        .await?;
    log_established(&writer, "writer", start);

    let reader_options = base.read_only(true);
    let reader = SqlitePoolOptions::new()
        .max_connections(config.max_readers)
        .min_connections(0)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(reader_options)
        .await?;
    log_established(&reader, "reader", start);

    Ok(StorePools { writer, reader })
}

fn log_established(pool: &SqlitePool, role: &str, start: Instant) {
    info!(
        subsystem = "db",
        component = "pool",
        op = "established",
        role,
        pool_size = pool.size(),
        pool_idle = pool.num_idle(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Database connection pool established"
    );
}

/// Log current pool health metrics.
///
/// Warns and returns `true` when every connection is checked out.
pub fn log_pool_metrics(pool: &SqlitePool, role: &str) -> bool {
    let size = pool.size();
    let idle = pool.num_idle();

    debug!(
        subsystem = "db",
        component = "pool",
        op = "metrics",
        role,
        pool_size = size,
        pool_idle = idle,
        "Pool health check"
    );

    let saturated = idle == 0 && size > 0;
    if saturated {
        warn!(
            subsystem = "db",
            component = "pool",
            op = "metrics",
            role,
            pool_size = size,
            "No idle connections available"
        );
    }
    saturated
}
