//! The write-planning session.
//!
//! Every mutation is first turned into [`PlannedStatement`]s and appended to
//! the session's plan; the executor chosen at construction then either applies
//! it (apply mode) or ignores it (dry-run). The plan is identical either way,
//! which is what lets every command preview exactly what it would commit.

use std::collections::HashSet;

use moneywiz_core::{
    schema, CategorySplit, FieldSet, Identifier, PlanError, PlannedStatement, ReferenceColumn,
    ReferenceDescriptor, SqlValue, StatementKind,
};
use moneywiz_sqlite::SqliteStore;
use thiserror::Error;

use crate::storage::{DryRunExecutor, RowId, SchemaSource, StatementExecutor, StorageError};

pub const DEFAULT_SAMPLE_SIZE: usize = 5;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("unknown type name: {0}")]
    UnknownType(String),
    #[error("no fields to write for row {0}")]
    NoFields(i64),
    #[error("cannot determine the name column of row {id} (type {type_name}); pass it explicitly")]
    AmbiguousNameField { id: i64, type_name: String },
    #[error("row not found: {0}")]
    RecordNotFound(i64),
    #[error("column {0} cannot be written")]
    ImmutableColumn(String),
    #[error("write session is closed")]
    SessionClosed,
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    DryRun,
    Apply,
}

impl ExecutionMode {
    pub fn from_apply_flag(apply: bool) -> Self {
        if apply {
            ExecutionMode::Apply
        } else {
            ExecutionMode::DryRun
        }
    }
}

pub struct WriteSession<'a> {
    source: &'a dyn SchemaSource,
    executor: Box<dyn StatementExecutor + 'a>,
    references: Vec<ReferenceColumn>,
    sample_size: usize,
    planned: Vec<PlannedStatement>,
    dry_run: bool,
    depth: u8,
    closed: bool,
}

impl<'a> WriteSession<'a> {
    pub fn new(source: &'a dyn SchemaSource, executor: Box<dyn StatementExecutor + 'a>) -> Self {
        let dry_run = executor.is_dry_run();
        Self {
            source,
            executor,
            references: ReferenceColumn::builtin(),
            sample_size: DEFAULT_SAMPLE_SIZE,
            planned: Vec::new(),
            dry_run,
            depth: 0,
            closed: false,
        }
    }

    pub fn dry_run(source: &'a dyn SchemaSource) -> Self {
        Self::new(source, Box::new(DryRunExecutor))
    }

    /// Session over a SQLite store, applying statements only in `Apply` mode.
    pub fn for_store(store: &'a SqliteStore, mode: ExecutionMode) -> Self {
        let executor: Box<dyn StatementExecutor + 'a> = match mode {
            ExecutionMode::DryRun => Box::new(DryRunExecutor),
            ExecutionMode::Apply => Box::new(store.executor()),
        };
        Self::new(store, executor)
    }

    pub fn with_references(mut self, references: Vec<ReferenceColumn>, sample_size: usize) -> Self {
        self.references = references;
        self.sample_size = sample_size;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn planned(&self) -> &[PlannedStatement] {
        &self.planned
    }

    pub fn source(&self) -> &'a dyn SchemaSource {
        self.source
    }

    fn ensure_open(&self) -> Result<(), WriteError> {
        if self.closed {
            return Err(WriteError::SessionClosed);
        }
        Ok(())
    }

    fn check_writable(fields: &FieldSet) -> Result<(), WriteError> {
        match fields.keys().find(|c| c.is_immutable()) {
            Some(column) => Err(WriteError::ImmutableColumn(column.to_string())),
            None => Ok(()),
        }
    }

    fn push(&mut self, statement: PlannedStatement) -> Result<Option<RowId>, WriteError> {
        tracing::debug!(sql = statement.sql(), dry_run = self.dry_run, "Planned statement");
        // a failed statement stays in the plan
        let result = self.executor.execute(&statement);
        self.planned.push(statement);
        Ok(result?)
    }

    /// Inserts a `ZSYNCOBJECT` row of the given type. Returns the new primary
    /// key when applied; in dry-run no key exists yet and `None` is returned.
    pub fn insert_syncobject(&mut self, type_name: &str, fields: FieldSet) -> Result<Option<RowId>, WriteError> {
        self.ensure_open()?;
        let ent = self
            .source
            .type_table()
            .resolve_type(type_name)
            .ok_or_else(|| WriteError::UnknownType(type_name.to_string()))?;
        Self::check_writable(&fields)?;

        let mut columns = vec![schema::ENT.to_string()];
        let mut params = vec![SqlValue::Integer(ent)];
        for (column, value) in fields {
            columns.push(column.to_string());
            params.push(value);
        }
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            schema::SYNC_OBJECT_TABLE,
            columns.join(", "),
            placeholders
        );
        let id = self.push(PlannedStatement::new(StatementKind::Insert, sql, params)?)?;
        if let Some(id) = id {
            tracing::info!(type_name, id, "Inserted row");
        }
        Ok(id)
    }

    pub fn update_syncobject(&mut self, id: i64, fields: FieldSet) -> Result<(), WriteError> {
        self.ensure_open()?;
        if fields.is_empty() {
            return Err(WriteError::NoFields(id));
        }
        Self::check_writable(&fields)?;

        let mut assignments = Vec::with_capacity(fields.len());
        let mut params = Vec::with_capacity(fields.len() + 1);
        for (column, value) in fields {
            assignments.push(format!("{} = ?", column));
            params.push(value);
        }
        params.push(SqlValue::Integer(id));
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            schema::SYNC_OBJECT_TABLE,
            assignments.join(", "),
            schema::PK
        );
        self.push(PlannedStatement::new(StatementKind::Update, sql, params)?)?;
        Ok(())
    }

    pub fn delete_syncobject(&mut self, id: i64) -> Result<(), WriteError> {
        self.ensure_open()?;
        let sql = format!("DELETE FROM {} WHERE {} = ?", schema::SYNC_OBJECT_TABLE, schema::PK);
        self.push(PlannedStatement::new(StatementKind::Delete, sql, vec![SqlValue::Integer(id)])?)?;
        Ok(())
    }

    /// Deletes `id` only if no known reference column points at it.
    ///
    /// When references exist they are returned and nothing is planned.
    pub fn safe_delete(&mut self, id: i64) -> Result<Vec<ReferenceDescriptor>, WriteError> {
        self.ensure_open()?;
        let mut found = Vec::new();
        for reference in &self.references {
            match self.source.count_references(reference, id, self.sample_size)? {
                Some(descriptor) if descriptor.count > 0 => found.push(descriptor),
                Some(_) => {}
                None => tracing::debug!(%reference, "Reference column absent, not checked"),
            }
        }
        if !found.is_empty() {
            tracing::warn!(id, references = found.len(), "Delete aborted, row is still referenced");
            return Ok(found);
        }
        self.delete_syncobject(id)?;
        Ok(found)
    }

    /// Sets the name of a row. Without an explicit `name_field` the column is
    /// chosen from the row's entity type.
    pub fn rename_entity(&mut self, id: i64, new_name: &str, name_field: Option<&str>) -> Result<(), WriteError> {
        self.ensure_open()?;
        let column = match name_field {
            Some(field) => Identifier::new(field)?,
            None => {
                let record = self.source.record(id)?.ok_or(WriteError::RecordNotFound(id))?;
                let types = self.source.type_table();
                let column = types.kind_for(record.ent).name_column().ok_or_else(|| {
                    WriteError::AmbiguousNameField {
                        id,
                        type_name: types.typename_for(record.ent).unwrap_or("?").to_string(),
                    }
                })?;
                Identifier::new(column)?
            }
        };
        let mut fields = FieldSet::new();
        fields.insert(column, SqlValue::from(new_name));
        self.update_syncobject(id, fields)
    }

    /// Replaces every category split of `tx_id` with `splits`.
    pub fn assign_categories(&mut self, tx_id: i64, splits: &[CategorySplit]) -> Result<(), WriteError> {
        self.ensure_open()?;
        let delete = format!(
            "DELETE FROM {} WHERE {} = ?",
            schema::CATEGORY_ASSIGNMENT_TABLE,
            schema::category_assignment::TRANSACTION
        );
        self.push(PlannedStatement::new(StatementKind::Delete, delete, vec![SqlValue::Integer(tx_id)])?)?;

        let insert = format!(
            "INSERT INTO {} ({}, {}, {}) VALUES (?, ?, ?)",
            schema::CATEGORY_ASSIGNMENT_TABLE,
            schema::category_assignment::TRANSACTION,
            schema::category_assignment::CATEGORY,
            schema::category_assignment::AMOUNT
        );
        for split in splits {
            let params = vec![
                SqlValue::Integer(tx_id),
                SqlValue::Integer(split.category),
                SqlValue::from(split.amount),
            ];
            self.push(PlannedStatement::new(StatementKind::Insert, insert.as_str(), params)?)?;
        }
        Ok(())
    }

    /// Replaces the tag set of `tx_id`. Repeated ids are written once.
    pub fn assign_tags(&mut self, tx_id: i64, tag_ids: &[i64]) -> Result<(), WriteError> {
        self.ensure_open()?;
        let delete = format!(
            "DELETE FROM {} WHERE {} = ?",
            schema::TAG_LINK_TABLE,
            schema::tag_link::TRANSACTION
        );
        self.push(PlannedStatement::new(StatementKind::Delete, delete, vec![SqlValue::Integer(tx_id)])?)?;

        let insert = format!(
            "INSERT INTO {} ({}, {}) VALUES (?, ?)",
            schema::TAG_LINK_TABLE,
            schema::tag_link::TRANSACTION,
            schema::tag_link::TAG
        );
        let mut seen = HashSet::new();
        for tag in tag_ids.iter().filter(|t| seen.insert(**t)) {
            let params = vec![SqlValue::Integer(tx_id), SqlValue::Integer(*tag)];
            self.push(PlannedStatement::new(StatementKind::Insert, insert.as_str(), params)?)?;
        }
        Ok(())
    }

    /// Points a refund at the withdraw it refunds. The withdraw's type is not checked.
    pub fn link_refund(&mut self, refund_id: i64, withdraw_id: i64) -> Result<(), WriteError> {
        let mut fields = FieldSet::new();
        fields.insert(
            Identifier::new(schema::transaction::ORIGINAL_TRANSACTION)?,
            SqlValue::Integer(withdraw_id),
        );
        self.update_syncobject(refund_id, fields)
    }

    /// Runs `f` inside one transaction: committed when it returns `Ok`, rolled
    /// back when it returns `Err`. Nested calls join the enclosing scope.
    pub fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<WriteError>,
    {
        self.ensure_open()?;
        if self.depth > 0 {
            return f(self);
        }

        self.executor.begin().map_err(WriteError::from)?;
        self.depth = 1;
        let result = f(self);
        if self.depth == 0 {
            // closed inside the scope; close() already rolled back
            return result;
        }
        self.depth = 0;

        match result {
            Ok(value) => {
                self.executor.commit().map_err(WriteError::from)?;
                if !self.dry_run {
                    tracing::info!(statements = self.planned.len(), "Committed");
                }
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.executor.rollback() {
                    tracing::warn!(error = %rollback, "Rollback failed");
                } else if !self.dry_run {
                    tracing::info!("Rolled back");
                }
                Err(e)
            }
        }
    }

    /// Releases the session's hold on the connection. Safe to call twice.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        if self.depth > 0 {
            if let Err(e) = self.executor.rollback() {
                tracing::warn!(error = %e, "Rollback on close failed");
            }
            self.depth = 0;
        }
        self.executor = Box::new(DryRunExecutor);
        self.closed = true;
    }
}
