//! A small fixed-size pool of SQLite connections.
//!
//! Callers never touch a connection directly: [`ConnectionPool::run`] waits
//! for a permit, leases an idle connection, and runs the job on tokio's
//! blocking pool. The lease returns the connection when the job ends, even
//! if the job panicked or the awaiting future was dropped. A dropped future
//! does not abort the job; a transaction it opened still commits or rolls
//! back and the result is discarded.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rusqlite::Connection;
use tokio::sync::Semaphore;

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};

/// Fixed-size connection pool.
pub struct ConnectionPool {
    idle: Arc<Mutex<Vec<Connection>>>,
    permits: Arc<Semaphore>,
    size: usize,
}

impl ConnectionPool {
    /// Open `config.effective_pool_size()` configured connections.
    ///
    /// `init` runs once on the first connection before the others open
    /// (schema migration).
    pub fn open<F>(config: &StoreConfig, init: F) -> Result<Self>
    where
        F: FnOnce(&mut Connection) -> Result<()>,
    {
        let size = config.effective_pool_size();

        let mut first = open_connection(config)?;
        init(&mut first)?;

        let mut connections = Vec::with_capacity(size);
        connections.push(first);
        for _ in 1..size {
            connections.push(open_connection(config)?);
        }

        tracing::debug!(
            size,
            path = ?config.path,
            "opened connection pool"
        );

        Ok(Self::from_connections(connections))
    }

    /// Wrap already-configured connections.
    pub fn from_connections(connections: Vec<Connection>) -> Self {
        let size = connections.len();
        Self {
            idle: Arc::new(Mutex::new(connections)),
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Number of pooled connections.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of connections not currently leased.
    pub fn idle(&self) -> usize {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Run `job` on a leased connection off the async runtime.
    pub async fn run<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| StoreError::Pool(format!("pool closed: {e}")))?;
        let idle = self.idle.clone();

        tokio::task::spawn_blocking(move || {
            // Locals drop in reverse order: the lease is returned before the
            // permit is released.
            let _permit = permit;
            let mut lease = Lease::take(idle)?;
            job(lease.connection())
        })
        .await
        .map_err(|e| StoreError::Pool(format!("spawn_blocking failed: {e}")))?
    }

    /// Stop handing out connections. Jobs already running finish normally.
    pub fn close(&self) {
        self.permits.close();
    }
}

/// A connection taken from the idle list, returned on drop.
struct Lease {
    connection: Option<Connection>,
    idle: Arc<Mutex<Vec<Connection>>>,
}

impl Lease {
    fn take(idle: Arc<Mutex<Vec<Connection>>>) -> Result<Self> {
        let connection = idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .ok_or_else(|| StoreError::Pool("no idle connection behind permit".into()))?;
        Ok(Self {
            connection: Some(connection),
            idle,
        })
    }

    fn connection(&mut self) -> &mut Connection {
        // Only `Drop` empties the slot.
        match self.connection.as_mut() {
            Some(connection) => connection,
            None => unreachable!("lease used after release"),
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.idle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(connection);
        }
    }
}

/// Open and configure one connection.
fn open_connection(config: &StoreConfig) -> Result<Connection> {
    let connection = match &config.path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let connection = Connection::open(path)?;
            let mode: String = connection.pragma_update_and_check(
                None,
                "journal_mode",
                "WAL",
                |row| row.get(0),
            )?;
            if !mode.eq_ignore_ascii_case("wal") {
                tracing::warn!(%mode, "database did not switch to WAL journal mode");
            }
            connection
        }
        None => Connection::open_in_memory()?,
    };

    connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    connection.pragma_update(None, "foreign_keys", "ON")?;
    Ok(connection)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_pool() -> ConnectionPool {
        ConnectionPool::open(&StoreConfig::memory(), |_| Ok(())).unwrap()
    }

    #[tokio::test]
    async fn test_run_returns_connection() {
        let pool = memory_pool();
        assert_eq!(pool.size(), 1);

        let answer: i64 = pool
            .run(|conn| Ok(conn.query_row("SELECT 41 + 1", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(answer, 42);
        assert_eq!(pool.idle(), 1);
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let pool = memory_pool();
        let enabled: i64 = pool
            .run(|conn| Ok(conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[tokio::test]
    async fn test_job_error_returns_connection() {
        let pool = memory_pool();
        let err = pool
            .run(|conn| {
                conn.execute("SELECT * FROM missing_table", [])?;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
        assert_eq!(pool.idle(), 1);
    }

    #[tokio::test]
    async fn test_panicking_job_returns_connection() {
        let pool = memory_pool();
        let err = pool
            .run(|_conn| -> Result<()> { panic!("job blew up") })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Pool(_)));
        assert_eq!(pool.idle(), 1);
        pool.run(|_| Ok(())).await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_pool_rejects_jobs() {
        let pool = memory_pool();
        pool.close();
        let err = pool.run(|_| Ok(())).await.unwrap_err();
        assert!(matches!(err, StoreError::Pool(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_file_pool_serves_concurrent_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::file(dir.path().join("pool.db")).with_pool_size(3);
        let pool = Arc::new(
            ConnectionPool::open(&config, |conn| {
                conn.execute_batch("CREATE TABLE hits (n INTEGER NOT NULL)")?;
                Ok(())
            })
            .unwrap(),
        );
        assert_eq!(pool.size(), 3);

        let mut handles = Vec::new();
        for n in 0..12i64 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                pool.run(move |conn| {
                    conn.execute("INSERT INTO hits (n) VALUES (?1)", [n])?;
                    Ok(())
                })
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let total: i64 = pool
            .run(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM hits", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(total, 12);
        assert_eq!(pool.idle(), 3);
    }
}
