use std::{collections::BTreeMap, sync::Arc};

use moneywiz_core::{
    schema, CategoryAssignment, RawRecord, ReferenceColumn, ReferenceDescriptor, TagLink, TypeTable,
};

// Re-export core storage types so callers can use crate::storage::* directly
pub use moneywiz_core::storage::{DryRunExecutor, RowId, SchemaSource, StatementExecutor, StorageError};

/// A `SchemaSource` held entirely in memory.
///
/// Models the same tables as the SQLite store so the planner and the catalog
/// can be exercised without a database file.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    types: TypeTable,
    records: BTreeMap<i64, RawRecord>,
    users: BTreeMap<i64, String>,
    assignments: Vec<CategoryAssignment>,
    tag_links: Vec<TagLink>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, code: i64, name: &str) -> Self {
        self.types.insert(code, name);
        self
    }

    pub fn with_user(mut self, id: i64, login: &str) -> Self {
        self.users.insert(id, login.to_string());
        self
    }

    pub fn with_record(mut self, record: RawRecord) -> Self {
        self.records.insert(record.id, record);
        self
    }

    pub fn with_assignment(mut self, assignment: CategoryAssignment) -> Self {
        self.assignments.push(assignment);
        self
    }

    pub fn with_tag_link(mut self, transaction: i64, tag: i64) -> Self {
        self.tag_links.push(TagLink { transaction, tag });
        self
    }

    fn descriptor(reference: &ReferenceColumn, matches: Vec<i64>, sample_size: usize) -> ReferenceDescriptor {
        ReferenceDescriptor {
            table: Arc::from(reference.table.as_str()),
            column: Arc::from(reference.column.as_str()),
            count: matches.len() as u64,
            sample_ids: matches.into_iter().take(sample_size).collect(),
        }
    }
}

impl SchemaSource for InMemorySource {
    fn type_table(&self) -> &TypeTable {
        &self.types
    }

    fn record(&self, id: i64) -> Result<Option<RawRecord>, StorageError> {
        Ok(self.records.get(&id).cloned())
    }

    fn record_by_gid(&self, gid: &str) -> Result<Option<RawRecord>, StorageError> {
        Ok(self
            .records
            .values()
            .find(|r| r.gid.as_deref() == Some(gid))
            .cloned())
    }

    fn records(&self) -> Result<Vec<RawRecord>, StorageError> {
        Ok(self.records.values().cloned().collect())
    }

    fn users(&self) -> Result<BTreeMap<i64, String>, StorageError> {
        Ok(self.users.clone())
    }

    fn category_assignments(&self) -> Result<Vec<CategoryAssignment>, StorageError> {
        Ok(self.assignments.clone())
    }

    fn tag_links(&self) -> Result<Vec<TagLink>, StorageError> {
        Ok(self.tag_links.clone())
    }

    fn count_references(
        &self,
        reference: &ReferenceColumn,
        id: i64,
        sample_size: usize,
    ) -> Result<Option<ReferenceDescriptor>, StorageError> {
        let (table, column) = (reference.table.as_str(), reference.column.as_str());
        let matches: Vec<i64> = match table {
            schema::SYNC_OBJECT_TABLE => {
                // A column exists once any row carries it.
                if !self.records.values().any(|r| r.columns.contains_key(column)) {
                    return Ok(None);
                }
                self.records
                    .values()
                    .filter(|r| r.int(column) == Some(id))
                    .map(|r| r.id)
                    .collect()
            }
            schema::CATEGORY_ASSIGNMENT_TABLE => {
                let pick: fn(&CategoryAssignment) -> i64 = match column {
                    schema::category_assignment::CATEGORY => |a| a.category,
                    schema::category_assignment::TRANSACTION => |a| a.transaction,
                    _ => return Ok(None),
                };
                self.assignments
                    .iter()
                    .filter(|a| pick(a) == id)
                    .map(|a| a.id)
                    .collect()
            }
            schema::TAG_LINK_TABLE => {
                let pick: fn(&TagLink) -> i64 = match column {
                    schema::tag_link::TAG => |l| l.tag,
                    schema::tag_link::TRANSACTION => |l| l.transaction,
                    _ => return Ok(None),
                };
                self.tag_links
                    .iter()
                    .enumerate()
                    .filter(|(_, l)| pick(l) == id)
                    .map(|(idx, _)| idx as i64 + 1)
                    .collect()
            }
            _ => return Ok(None),
        };
        Ok(Some(Self::descriptor(reference, matches, sample_size)))
    }
}
