//! Core types and traits for the MoneyWiz database toolkit.
//!
//! This crate provides the `SchemaSource` and `StatementExecutor` traits and all
//! associated types, so storage backends and the write planner can live in
//! separate crates.

pub mod models;
pub mod schema;
pub mod storage;

// Re-export key types at crate root for convenience
pub use models::{core_data_datetime, EntityKind, AccountKind, TransactionKind, Identifier, RawRecord, SqlValue, TypeTable};
pub use models::read::{
    Account, Category, CategoryAssignment, InvestmentHolding, Payee, Record, ReferenceColumn,
    ReferenceDescriptor, Tag, TagLink, Transaction,
};
pub use models::write::{count_placeholders, CategorySplit, FieldSet, PlanError, PlannedStatement, StatementKind};
pub use storage::{DryRunExecutor, RowId, SchemaSource, StatementExecutor, StorageError};
