use std::{collections::BTreeMap, fmt::Display, sync::Arc};

use rust_decimal::Decimal;
use thiserror::Error;

use super::{Identifier, SqlValue};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("statement has {placeholders} placeholder(s) but {params} parameter(s)")]
    ParameterMismatch { placeholders: usize, params: usize },
    #[error("invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),
}

/// Column/value pairs of an insert or update, ordered by column name.
pub type FieldSet = BTreeMap<Identifier, SqlValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Insert,
    Update,
    Delete,
}

/// A statement the write session intends to run, with its bound parameters.
///
/// Immutable once built; construction guarantees the parameter list matches
/// the statement's placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedStatement {
    kind: StatementKind,
    sql: Arc<str>,
    params: Vec<SqlValue>,
}

impl PlannedStatement {
    pub fn new(kind: StatementKind, sql: impl Into<Arc<str>>, params: Vec<SqlValue>) -> Result<Self, PlanError> {
        let sql = sql.into();
        let placeholders = count_placeholders(&sql);
        if placeholders != params.len() {
            return Err(PlanError::ParameterMismatch {
                placeholders,
                params: params.len(),
            });
        }
        Ok(Self { kind, sql, params })
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }
}

impl Display for PlannedStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.sql)?;
        if !self.params.is_empty() {
            let params: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
            write!(f, " -- [{}]", params.join(", "))?;
        }
        Ok(())
    }
}

/// Counts `?` placeholders outside of quoted literals and identifiers.
pub fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    let mut quote: Option<char> = None;
    for c in sql.chars() {
        match quote {
            // A doubled quote closes and reopens, which nets out the same.
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '[' => quote = Some(']'),
                '?' => count += 1,
                _ => {}
            },
        }
    }
    count
}

/// One category split of a transaction, as requested by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySplit {
    pub category: i64,
    pub amount: Decimal,
}

impl CategorySplit {
    pub fn new(category: i64, amount: Decimal) -> Self {
        Self { category, amount }
    }
}
