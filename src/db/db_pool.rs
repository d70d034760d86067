use crate::config::AccessMode;
use duckdb::Connection;
use r2d2::ManageConnection;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Hands out connections cloned from one root handle so every pooled
/// connection, including in-memory ones, sees the same database.
pub struct DuckDBConnectionManager {
    connection_string: String,
    access_mode: AccessMode,
    root: Mutex<Option<Connection>>,
}

impl DuckDBConnectionManager {
    pub fn new(connection_string: String, access_mode: AccessMode) -> Self {
        Self {
            connection_string,
            access_mode,
            root: Mutex::new(None),
        }
    }

    fn is_in_memory(&self) -> bool {
        matches!(self.connection_string.trim(), ":memory:" | "memory")
    }

    fn open_root(&self) -> Result<Connection, duckdb::Error> {
        let flags = match self.access_mode {
            AccessMode::ReadOnly => duckdb::Config::default().access_mode(duckdb::AccessMode::ReadOnly)?,
            AccessMode::ReadWrite => duckdb::Config::default(),
        };

        debug!(
            "Opening DuckDB database '{}' ({:?})",
            self.connection_string, self.access_mode
        );

        if self.is_in_memory() {
            Connection::open_in_memory_with_flags(flags)
        } else {
            Connection::open_with_flags(&self.connection_string, flags)
        }
    }
}

impl ManageConnection for DuckDBConnectionManager {
    type Connection = Connection;
    type Error = duckdb::Error;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let mut root = self.root.lock().unwrap_or_else(PoisonError::into_inner);
        match root.as_ref() {
            Some(conn) => conn.try_clone(),
            None => {
                let conn = self.open_root()?;
                let clone = conn.try_clone()?;
                *root = Some(conn);
                Ok(clone)
            }
        }
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.execute_batch("SELECT 1")
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}
