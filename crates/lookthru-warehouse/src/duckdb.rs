//! `DuckDB` connection pool.
//!
//! Connections are opened lazily per access mode and returned to the pool
//! when the guard is dropped. The pool never holds more than
//! `max_pool_size` idle connections per mode.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ::duckdb::Connection;

/// Access mode for database connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Read-only access.
    ReadOnly,
    /// Read-write access.
    ReadWrite,
}

#[derive(Default)]
struct IdleConnections {
    read_only: Vec<Connection>,
    read_write: Vec<Connection>,
}

impl IdleConnections {
    fn stack(&mut self, mode: AccessMode) -> &mut Vec<Connection> {
        match mode {
            AccessMode::ReadOnly => &mut self.read_only,
            AccessMode::ReadWrite => &mut self.read_write,
        }
    }
}

struct PoolShared {
    db_path: PathBuf,
    max_pool_size: usize,
    idle: Mutex<IdleConnections>,
}

/// A pool of `DuckDB` connections keyed by access mode.
#[derive(Clone)]
pub struct DuckDbPool {
    shared: Arc<PoolShared>,
}

impl DuckDbPool {
    /// Create a pool for the database at `path`, keeping at most
    /// `max_pool_size` idle connections per access mode.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, max_pool_size: usize) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                db_path: path.into(),
                max_pool_size: max_pool_size.max(1),
                idle: Mutex::new(IdleConnections::default()),
            }),
        }
    }

    /// Acquire a connection, reusing an idle one when available.
    ///
    /// # Errors
    /// Returns an error if the database file cannot be opened or configured.
    ///
    /// # Panics
    /// Panics if the pool mutex is poisoned.
    pub fn acquire(&self, mode: AccessMode) -> Result<PooledConnection, ::duckdb::Error> {
        let reused = self
            .shared
            .idle
            .lock()
            .expect("duckdb pool mutex poisoned")
            .stack(mode)
            .pop();

        let connection = match reused {
            Some(connection) => connection,
            None => open_connection(self.shared.db_path.as_path(), mode)?,
        };

        Ok(PooledConnection {
            mode,
            shared: Arc::clone(&self.shared),
            connection: Some(connection),
        })
    }

    /// Path of the backing database file.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        self.shared.db_path.as_path()
    }
}

/// A connection checked out of the pool; returns on drop.
pub struct PooledConnection {
    mode: AccessMode,
    shared: Arc<PoolShared>,
    connection: Option<Connection>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("pooled connection already returned")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_mut()
            .expect("pooled connection already returned")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        let mut idle = self
            .shared
            .idle
            .lock()
            .expect("duckdb pool mutex poisoned");
        let stack = idle.stack(self.mode);
        if stack.len() < self.shared.max_pool_size {
            stack.push(connection);
        }
    }
}

fn open_connection(path: &Path, mode: AccessMode) -> Result<Connection, ::duckdb::Error> {
    let connection = Connection::open(path)?;
    connection.execute_batch("PRAGMA disable_progress_bar;")?;
    if mode == AccessMode::ReadOnly {
        // Best effort: some embedded builds reject switching access mode on
        // an open connection. Callers still route writes through ReadWrite.
        let _ = connection.execute_batch("SET access_mode = 'READ_ONLY';");
    }
    Ok(connection)
}
