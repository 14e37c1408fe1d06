use moneywiz_core::{PlannedStatement, RowId, StatementExecutor, StatementKind, StorageError};
use rusqlite::{params_from_iter, Connection};

use crate::{storage_err, to_value};

const SAVEPOINT: &str = "moneywiz_write";

/// Applies planned statements to a live connection.
///
/// `begin`/`commit`/`rollback` map onto a single savepoint; only one level is
/// supported. Dropping the executor with the savepoint still open rolls it back.
pub struct SqliteExecutor<'a> {
    conn: &'a Connection,
    active: bool,
}

impl<'a> SqliteExecutor<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn, active: false }
    }

    pub fn in_transaction(&self) -> bool {
        self.active
    }
}

impl StatementExecutor for SqliteExecutor<'_> {
    fn execute(&mut self, statement: &PlannedStatement) -> Result<Option<RowId>, StorageError> {
        let changed = self
            .conn
            .execute(statement.sql(), params_from_iter(statement.params().iter().map(to_value)))
            .map_err(storage_err)?;
        tracing::debug!(sql = statement.sql(), changed, "Executed statement");
        match statement.kind() {
            StatementKind::Insert => Ok(Some(self.conn.last_insert_rowid())),
            StatementKind::Update | StatementKind::Delete => Ok(None),
        }
    }

    fn begin(&mut self) -> Result<(), StorageError> {
        if self.active {
            return Err(StorageError::TransactionAlreadyActive);
        }
        self.conn
            .execute_batch(&format!("SAVEPOINT {}", SAVEPOINT))
            .map_err(storage_err)?;
        self.active = true;
        tracing::debug!("SQLite transaction started");
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        if !self.active {
            return Err(StorageError::NoActiveTransaction);
        }
        self.conn
            .execute_batch(&format!("RELEASE SAVEPOINT {}", SAVEPOINT))
            .map_err(storage_err)?;
        self.active = false;
        tracing::debug!("SQLite transaction committed");
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StorageError> {
        if !self.active {
            return Err(StorageError::NoActiveTransaction);
        }
        self.conn
            .execute_batch(&format!(
                "ROLLBACK TO SAVEPOINT {0}; RELEASE SAVEPOINT {0}",
                SAVEPOINT
            ))
            .map_err(storage_err)?;
        self.active = false;
        tracing::debug!("SQLite transaction rolled back");
        Ok(())
    }
}

impl Drop for SqliteExecutor<'_> {
    fn drop(&mut self) {
        if self.active {
            if let Err(e) = self.rollback() {
                tracing::warn!(error = %e, "Failed to roll back open transaction on drop");
            }
        }
    }
}
