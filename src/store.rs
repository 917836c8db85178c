use std::{cell::Cell, path::Path};

use rusqlite::{Connection, OptionalExtension, Params};

use crate::{errors::UndoGraphError, schema::ensure_schema};

/// Thin façade over the SQLite connection. Owns the connection exclusively
/// and tracks transaction depth so nested mutation calls participate in the
/// active transaction instead of opening their own.
pub struct GraphStore {
    conn: Connection,
    tx_depth: Cell<u32>,
}

impl GraphStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, UndoGraphError> {
        let conn =
            Connection::open(path).map_err(|e| UndoGraphError::connection(e.to_string()))?;
        ensure_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, UndoGraphError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| UndoGraphError::connection(e.to_string()))?;
        ensure_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Runs `f` inside a store-level transaction. Commits on `Ok`, rolls
    /// back on `Err`. A nested call runs `f` directly; the outermost caller
    /// owns commit and rollback.
    pub fn with_transaction<T>(
        &self,
        f: impl FnOnce() -> Result<T, UndoGraphError>,
    ) -> Result<T, UndoGraphError> {
        if self.tx_depth.get() > 0 {
            return f();
        }
        self.conn
            .execute("BEGIN IMMEDIATE", [])
            .map_err(|e| UndoGraphError::query(e.to_string()))?;
        self.tx_depth.set(1);
        let result = f();
        self.tx_depth.set(0);
        match result {
            Ok(value) => {
                self.conn
                    .execute("COMMIT", [])
                    .map_err(|e| UndoGraphError::query(e.to_string()))?;
                Ok(value)
            }
            Err(err) => {
                let _ = self.conn.execute("ROLLBACK", []);
                Err(err)
            }
        }
    }

    /// Single-value query; `None` when no row matches.
    pub fn scalar<P: Params>(&self, sql: &str, params: P) -> Result<Option<i64>, UndoGraphError> {
        self.conn
            .query_row(sql, params, |row| row.get(0))
            .optional()
            .map_err(|e| UndoGraphError::query(e.to_string()))
    }

    /// Single text column from at most one row.
    pub fn pluck<P: Params>(&self, sql: &str, params: P) -> Result<Option<String>, UndoGraphError> {
        self.conn
            .query_row(sql, params, |row| row.get(0))
            .optional()
            .map_err(|e| UndoGraphError::query(e.to_string()))
    }

    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<usize, UndoGraphError> {
        self.conn
            .execute(sql, params)
            .map_err(|e| UndoGraphError::query(e.to_string()))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            tx_depth: Cell::new(0),
        }
    }
}
