use std::{fmt::Display, sync::Arc};

use rust_decimal::{prelude::FromPrimitive, Decimal};
use time::OffsetDateTime;

use crate::schema;

use super::{core_data_datetime, write::PlanError, AccountKind, EntityKind, Identifier, RawRecord, TransactionKind};

fn decimal(raw: &RawRecord, column: &str) -> Option<Decimal> {
    raw.real(column).and_then(Decimal::from_f64)
}

fn text(raw: &RawRecord, column: &str) -> String {
    raw.text(column).unwrap_or_default().to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: i64,
    pub kind: AccountKind,
    pub gid: Option<String>,
    pub name: String,
    pub currency: String,
    pub user: Option<i64>,
    pub opening_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub id: i64,
    pub gid: Option<String>,
    pub name: String,
    pub category_type: Option<i64>,
    pub parent: Option<i64>,
    pub user: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Payee {
    pub id: i64,
    pub gid: Option<String>,
    pub name: String,
    pub user: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub id: i64,
    pub gid: Option<String>,
    pub name: String,
    pub user: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: i64,
    pub kind: TransactionKind,
    pub gid: Option<String>,
    pub account: Option<i64>,
    pub amount: Decimal,
    pub datetime: Option<OffsetDateTime>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub payee: Option<i64>,
    pub original_amount: Option<Decimal>,
    pub original_currency: Option<String>,
    pub original_transaction: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvestmentHolding {
    pub id: i64,
    pub gid: Option<String>,
    pub account: Option<i64>,
    pub symbol: String,
    pub number_of_shares: Decimal,
    pub description: Option<String>,
}

/// A row of `ZSYNCOBJECT` interpreted through its entity type.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Account(Account),
    Category(Category),
    Payee(Payee),
    Tag(Tag),
    Transaction(Transaction),
    InvestmentHolding(InvestmentHolding),
    Other(RawRecord),
}

impl Record {
    pub fn from_raw(raw: RawRecord, kind: EntityKind) -> Record {
        match kind {
            EntityKind::Account(kind) => Record::Account(Account {
                id: raw.id,
                kind,
                name: text(&raw, schema::account::NAME),
                currency: text(&raw, schema::account::CURRENCY),
                user: raw.int(schema::account::USER),
                opening_balance: decimal(&raw, schema::account::OPENING_BALANCE).unwrap_or_default(),
                gid: raw.gid,
            }),
            EntityKind::Category => Record::Category(Category {
                id: raw.id,
                name: text(&raw, schema::category::NAME),
                category_type: raw.int(schema::category::TYPE),
                parent: raw.int(schema::category::PARENT),
                user: raw.int(schema::category::USER),
                gid: raw.gid,
            }),
            EntityKind::Payee => Record::Payee(Payee {
                id: raw.id,
                name: text(&raw, schema::payee::NAME),
                user: raw.int(schema::payee::USER),
                gid: raw.gid,
            }),
            EntityKind::Tag => Record::Tag(Tag {
                id: raw.id,
                name: text(&raw, schema::tag::NAME),
                user: raw.int(schema::tag::USER),
                gid: raw.gid,
            }),
            EntityKind::Transaction(kind) => Record::Transaction(Transaction {
                id: raw.id,
                kind,
                account: raw.int(schema::transaction::ACCOUNT),
                amount: decimal(&raw, schema::transaction::AMOUNT).unwrap_or_default(),
                datetime: raw.real(schema::transaction::DATE).and_then(core_data_datetime),
                description: raw.text(schema::transaction::DESCRIPTION).map(str::to_string),
                notes: raw.text(schema::transaction::NOTES).map(str::to_string),
                payee: raw.int(schema::transaction::PAYEE),
                original_amount: decimal(&raw, schema::transaction::ORIGINAL_AMOUNT),
                original_currency: raw.text(schema::transaction::ORIGINAL_CURRENCY).map(str::to_string),
                original_transaction: raw.int(schema::transaction::ORIGINAL_TRANSACTION),
                gid: raw.gid,
            }),
            EntityKind::InvestmentHolding => Record::InvestmentHolding(InvestmentHolding {
                id: raw.id,
                account: raw.int(schema::holding::ACCOUNT),
                symbol: text(&raw, schema::holding::SYMBOL),
                number_of_shares: decimal(&raw, schema::holding::SHARES).unwrap_or_default(),
                description: raw.text(schema::holding::DESCRIPTION).map(str::to_string),
                gid: raw.gid,
            }),
            EntityKind::Other => Record::Other(raw),
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Record::Account(a) => a.id,
            Record::Category(c) => c.id,
            Record::Payee(p) => p.id,
            Record::Tag(t) => t.id,
            Record::Transaction(t) => t.id,
            Record::InvestmentHolding(h) => h.id,
            Record::Other(r) => r.id,
        }
    }
}

/// One category split of a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryAssignment {
    pub id: i64,
    pub transaction: i64,
    pub category: i64,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TagLink {
    pub transaction: i64,
    pub tag: i64,
}

/// A `table.column` pair that may hold the primary key of another row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceColumn {
    pub table: Identifier,
    pub column: Identifier,
}

impl ReferenceColumn {
    pub fn new(table: &str, column: &str) -> Result<Self, PlanError> {
        Ok(Self {
            table: Identifier::new(table)?,
            column: Identifier::new(column)?,
        })
    }

    /// Parses `TABLE.COLUMN`.
    pub fn parse(entry: &str) -> Result<Self, PlanError> {
        match entry.split_once('.') {
            Some((table, column)) => Self::new(table.trim(), column.trim()),
            None => Err(PlanError::InvalidIdentifier(entry.to_string())),
        }
    }

    pub fn builtin() -> Vec<ReferenceColumn> {
        schema::KNOWN_REFERENCES
            .iter()
            .filter_map(|(table, column)| Self::new(table, column).ok())
            .collect()
    }
}

impl Display for ReferenceColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// Rows that still point at a row about to be deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceDescriptor {
    pub table: Arc<str>,
    pub column: Arc<str>,
    pub count: u64,
    pub sample_ids: Vec<i64>,
}
