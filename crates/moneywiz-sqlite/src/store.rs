use std::{collections::BTreeMap, path::Path, sync::Arc, time::Duration};

use moneywiz_core::{
    schema, CategoryAssignment, RawRecord, ReferenceColumn, ReferenceDescriptor, SchemaSource,
    StorageError, TagLink, TypeTable,
};
use rusqlite::{params, Connection, OpenFlags, Row};
use rust_decimal::{prelude::FromPrimitive, Decimal};

use crate::{executor::SqliteExecutor, from_value_ref, storage_err};

pub struct SqliteStore {
    conn: Connection,
    types: TypeTable,
}

impl SqliteStore {
    /// Opens an existing store. Never creates a file and never changes the
    /// journal mode, so opening alone leaves the file untouched.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StorageError::DatabaseNotFound(path.display().to_string()));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(storage_err)?;
        tracing::debug!(path = %path.display(), "Opened MoneyWiz store");
        Self::from_connection(conn)
    }

    pub fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        // The finance app may hold the file; wait on its lock rather than fail.
        conn.busy_timeout(Duration::from_secs(5)).map_err(storage_err)?;
        let types = load_types(&conn)?;
        tracing::debug!(types = types.len(), "Loaded entity types");
        Ok(Self { conn, types })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn executor(&self) -> SqliteExecutor<'_> {
        SqliteExecutor::new(&self.conn)
    }

    pub fn close(self) -> Result<(), StorageError> {
        self.conn.close().map_err(|(_, e)| storage_err(e))
    }

    fn has_column(&self, table: &str, column: &str) -> Result<bool, StorageError> {
        self.conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM pragma_table_info(?1) WHERE name = ?2 COLLATE NOCASE",
                params![table, column],
                |row| row.get(0),
            )
            .map_err(storage_err)
    }

    fn query_records<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<RawRecord>, StorageError> {
        let mut stmt = self.conn.prepare(sql).map_err(storage_err)?;
        let names: Vec<Arc<str>> = stmt.column_names().into_iter().map(Arc::<str>::from).collect();
        let rows = stmt
            .query_map(params, |row| raw_record(row, &names))
            .map_err(storage_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
    }
}

fn load_types(conn: &Connection) -> Result<TypeTable, StorageError> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {}, {} FROM {}",
            schema::ENT,
            schema::TYPE_NAME,
            schema::PRIMARY_KEY_TABLE
        ))
        .map_err(storage_err)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))
        .map_err(storage_err)?;
    let rows = rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)?;
    Ok(TypeTable::from_rows(rows))
}

fn raw_record(row: &Row, names: &[Arc<str>]) -> rusqlite::Result<RawRecord> {
    let mut record = RawRecord::new(0, 0);
    for (idx, name) in names.iter().enumerate() {
        let value = from_value_ref(row.get_ref(idx)?);
        match name.as_ref() {
            schema::PK => record.id = value.as_i64().unwrap_or_default(),
            schema::ENT => record.ent = value.as_i64().unwrap_or_default(),
            schema::GID => record.gid = value.as_str().map(str::to_string),
            _ => {
                record.columns.insert(name.clone(), value);
            }
        }
    }
    Ok(record)
}

impl SchemaSource for SqliteStore {
    fn type_table(&self) -> &TypeTable {
        &self.types
    }

    fn record(&self, id: i64) -> Result<Option<RawRecord>, StorageError> {
        let sql = format!("SELECT * FROM {} WHERE {} = ?1", schema::SYNC_OBJECT_TABLE, schema::PK);
        Ok(self.query_records(&sql, params![id])?.into_iter().next())
    }

    fn record_by_gid(&self, gid: &str) -> Result<Option<RawRecord>, StorageError> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?1 ORDER BY {} LIMIT 1",
            schema::SYNC_OBJECT_TABLE,
            schema::GID,
            schema::PK
        );
        Ok(self.query_records(&sql, params![gid])?.into_iter().next())
    }

    fn records(&self) -> Result<Vec<RawRecord>, StorageError> {
        let sql = format!("SELECT * FROM {} ORDER BY {}", schema::SYNC_OBJECT_TABLE, schema::PK);
        self.query_records(&sql, [])
    }

    fn users(&self) -> Result<BTreeMap<i64, String>, StorageError> {
        if !self.has_column(schema::USER_TABLE, schema::user::LOGIN)? {
            tracing::debug!("No user table in this store");
            return Ok(BTreeMap::new());
        }
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {}, {} FROM {} ORDER BY {}",
                schema::PK,
                schema::user::LOGIN,
                schema::USER_TABLE,
                schema::PK
            ))
            .map_err(storage_err)?;
        let rows = stmt
            .query_map([], |row| {
                let id: i64 = row.get(0)?;
                let login: Option<String> = row.get(1)?;
                Ok((id, login.unwrap_or_default()))
            })
            .map_err(storage_err)?;

        let mut result = BTreeMap::new();
        for row in rows {
            let (id, login) = row.map_err(storage_err)?;
            result.insert(id, login);
        }
        Ok(result)
    }

    fn category_assignments(&self) -> Result<Vec<CategoryAssignment>, StorageError> {
        if !self.has_column(schema::CATEGORY_ASSIGNMENT_TABLE, schema::category_assignment::TRANSACTION)? {
            return Ok(Vec::new());
        }
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {}, {}, {}, {} FROM {} ORDER BY {}",
                schema::PK,
                schema::category_assignment::TRANSACTION,
                schema::category_assignment::CATEGORY,
                schema::category_assignment::AMOUNT,
                schema::CATEGORY_ASSIGNMENT_TABLE,
                schema::PK
            ))
            .map_err(storage_err)?;
        let rows = stmt
            .query_map([], |row| {
                let amount: Option<f64> = row.get(3)?;
                Ok(CategoryAssignment {
                    id: row.get(0)?,
                    transaction: row.get::<_, Option<i64>>(1)?.unwrap_or_default(),
                    category: row.get::<_, Option<i64>>(2)?.unwrap_or_default(),
                    amount: amount.and_then(Decimal::from_f64).unwrap_or(Decimal::ZERO),
                })
            })
            .map_err(storage_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
    }

    fn tag_links(&self) -> Result<Vec<TagLink>, StorageError> {
        if !self.has_column(schema::TAG_LINK_TABLE, schema::tag_link::TRANSACTION)? {
            return Ok(Vec::new());
        }
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {}, {} FROM {} ORDER BY rowid",
                schema::tag_link::TRANSACTION,
                schema::tag_link::TAG,
                schema::TAG_LINK_TABLE
            ))
            .map_err(storage_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(TagLink {
                    transaction: row.get(0)?,
                    tag: row.get(1)?,
                })
            })
            .map_err(storage_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
    }

    fn count_references(
        &self,
        reference: &ReferenceColumn,
        id: i64,
        sample_size: usize,
    ) -> Result<Option<ReferenceDescriptor>, StorageError> {
        let (table, column) = (reference.table.as_str(), reference.column.as_str());
        if !self.has_column(table, column)? {
            tracing::debug!(%reference, "Reference column not present, skipping");
            return Ok(None);
        }

        let count: i64 = self
            .conn
            .query_row(
                &format!("SELECT COUNT(*) FROM \"{}\" WHERE \"{}\" = ?1", table, column),
                params![id],
                |row| row.get(0),
            )
            .map_err(storage_err)?;

        let mut sample_ids = Vec::new();
        if count > 0 && sample_size > 0 {
            let mut stmt = self
                .conn
                .prepare(&format!(
                    "SELECT rowid FROM \"{}\" WHERE \"{}\" = ?1 ORDER BY rowid LIMIT ?2",
                    table, column
                ))
                .map_err(storage_err)?;
            let rows = stmt
                .query_map(params![id, sample_size as i64], |row| row.get::<_, i64>(0))
                .map_err(storage_err)?;
            sample_ids = rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)?;
        }

        Ok(Some(ReferenceDescriptor {
            table: Arc::from(table),
            column: Arc::from(column),
            count: count.max(0) as u64,
            sample_ids,
        }))
    }
}
