use std::collections::BTreeMap;

use crate::models::{
    read::{CategoryAssignment, ReferenceColumn, ReferenceDescriptor, TagLink},
    write::PlannedStatement,
    RawRecord, TypeTable,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
    #[error("database not found: {0}")]
    DatabaseNotFound(String),
    #[error("no active transaction")]
    NoActiveTransaction,
    #[error("a transaction is already active")]
    TransactionAlreadyActive,
}

pub type RowId = i64;

/// Read access to the store: type names, raw rows and the side tables.
pub trait SchemaSource {
    fn type_table(&self) -> &TypeTable;
    fn record(&self, id: i64) -> Result<Option<RawRecord>, StorageError>;
    fn record_by_gid(&self, gid: &str) -> Result<Option<RawRecord>, StorageError>;
    fn records(&self) -> Result<Vec<RawRecord>, StorageError>;
    fn users(&self) -> Result<BTreeMap<i64, String>, StorageError>;
    fn category_assignments(&self) -> Result<Vec<CategoryAssignment>, StorageError>;
    fn tag_links(&self) -> Result<Vec<TagLink>, StorageError>;

    /// Rows whose `reference` column equals `id`. `None` when the table or
    /// column does not exist in this store.
    fn count_references(
        &self,
        reference: &ReferenceColumn,
        id: i64,
        sample_size: usize,
    ) -> Result<Option<ReferenceDescriptor>, StorageError>;
}

/// Applies planned statements.
pub trait StatementExecutor {
    /// Runs one statement; inserts report the new row id.
    fn execute(&mut self, statement: &PlannedStatement) -> Result<Option<RowId>, StorageError>;

    fn begin(&mut self) -> Result<(), StorageError>;
    fn commit(&mut self) -> Result<(), StorageError>;
    fn rollback(&mut self) -> Result<(), StorageError>;

    fn is_dry_run(&self) -> bool {
        false
    }
}

/// Executor for preview mode: nothing reaches storage.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunExecutor;

impl StatementExecutor for DryRunExecutor {
    fn execute(&mut self, _statement: &PlannedStatement) -> Result<Option<RowId>, StorageError> {
        Ok(None)
    }

    fn begin(&mut self) -> Result<(), StorageError> {
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StorageError> {
        Ok(())
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}
