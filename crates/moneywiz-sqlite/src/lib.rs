//! SQLite backend for the MoneyWiz database toolkit.
//!
//! `SqliteStore` reads the Core Data store; `SqliteExecutor` applies planned
//! statements against the same connection inside a savepoint.

mod executor;
mod store;

pub use executor::SqliteExecutor;
pub use store::SqliteStore;

use moneywiz_core::{SqlValue, StorageError};
use rusqlite::types::{Value, ValueRef};

pub(crate) fn storage_err(e: rusqlite::Error) -> StorageError {
    StorageError::Other(e.to_string())
}

pub(crate) fn to_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::Integer(*i),
        SqlValue::Real(r) => Value::Real(*r),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Blob(b) => Value::Blob(b.clone()),
    }
}

pub(crate) fn from_value_ref(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Integer(i),
        ValueRef::Real(r) => SqlValue::Real(r),
        ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
    }
}
