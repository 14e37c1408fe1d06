use std::{
    collections::{BTreeMap, HashMap},
    fmt::Display,
    sync::Arc,
};

use rust_decimal::{prelude::ToPrimitive, Decimal};
use time::{Duration, OffsetDateTime};

use crate::schema;

use self::write::PlanError;

pub mod read;
pub mod write;

/// Seconds between the Unix epoch and the Core Data reference date (2001-01-01 UTC).
const CORE_DATA_EPOCH_OFFSET: i64 = 978_307_200;

/// Converts a Core Data timestamp into a UTC date-time.
pub fn core_data_datetime(seconds: f64) -> Option<OffsetDateTime> {
    if !seconds.is_finite() {
        return None;
    }
    let base = OffsetDateTime::from_unix_timestamp(CORE_DATA_EPOCH_OFFSET).ok()?;
    base.checked_add(Duration::seconds_f64(seconds))
}

/// A single SQLite value, as stored in a column or bound to a placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(i) => Some(*i),
            SqlValue::Real(r) if r.fract() == 0.0 => Some(*r as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Integer(i) => Some(*i as f64),
            SqlValue::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl Display for SqlValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Integer(i) => write!(f, "{}", i),
            SqlValue::Real(r) => write!(f, "{}", r),
            SqlValue::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            SqlValue::Blob(b) => write!(f, "BLOB({} bytes)", b.len()),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Real(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<Decimal> for SqlValue {
    // Amounts are REAL columns in the store.
    fn from(value: Decimal) -> Self {
        value.to_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// A validated SQL identifier (table or column name).
///
/// Identifiers end up in statement text rather than in bound parameters, so
/// only `[A-Za-z_][A-Za-z0-9_]*` is accepted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier(Arc<str>);

impl Identifier {
    pub fn new(name: &str) -> Result<Self, PlanError> {
        let mut chars = name.chars();
        let valid = match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        };
        if !valid {
            return Err(PlanError::InvalidIdentifier(name.to_string()));
        }
        Ok(Self(Arc::from(name)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Primary key and entity-type code never change after insert.
    pub fn is_immutable(&self) -> bool {
        self.0.eq_ignore_ascii_case(schema::PK) || self.0.eq_ignore_ascii_case(schema::ENT)
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountKind {
    BankCheque,
    BankSaving,
    Cash,
    CreditCard,
    Loan,
    Investment,
    Forex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    TransferDeposit,
    TransferWithdraw,
    InvestmentExchange,
    InvestmentBuy,
    InvestmentSell,
    Refund,
    Reconcile,
    TransferBudget,
}

/// The record variant a row of `ZSYNCOBJECT` belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Account(AccountKind),
    Category,
    Payee,
    Tag,
    Transaction(TransactionKind),
    InvestmentHolding,
    Other,
}

impl EntityKind {
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "BankChequeAccount" => EntityKind::Account(AccountKind::BankCheque),
            "BankSavingAccount" => EntityKind::Account(AccountKind::BankSaving),
            "CashAccount" => EntityKind::Account(AccountKind::Cash),
            "CreditCardAccount" => EntityKind::Account(AccountKind::CreditCard),
            "LoanAccount" => EntityKind::Account(AccountKind::Loan),
            "InvestmentAccount" => EntityKind::Account(AccountKind::Investment),
            "ForexAccount" => EntityKind::Account(AccountKind::Forex),
            "Category" => EntityKind::Category,
            "Payee" => EntityKind::Payee,
            "Tag" => EntityKind::Tag,
            "DepositTransaction" => EntityKind::Transaction(TransactionKind::Deposit),
            "WithdrawTransaction" => EntityKind::Transaction(TransactionKind::Withdraw),
            "TransferDepositTransaction" => EntityKind::Transaction(TransactionKind::TransferDeposit),
            "TransferWithdrawTransaction" => EntityKind::Transaction(TransactionKind::TransferWithdraw),
            "InvestmentExchangeTransaction" => EntityKind::Transaction(TransactionKind::InvestmentExchange),
            "InvestmentBuyTransaction" => EntityKind::Transaction(TransactionKind::InvestmentBuy),
            "InvestmentSellTransaction" => EntityKind::Transaction(TransactionKind::InvestmentSell),
            "RefundTransaction" => EntityKind::Transaction(TransactionKind::Refund),
            "ReconcileTransaction" => EntityKind::Transaction(TransactionKind::Reconcile),
            "TransferBudgetTransaction" => EntityKind::Transaction(TransactionKind::TransferBudget),
            "InvestmentHolding" => EntityKind::InvestmentHolding,
            _ => EntityKind::Other,
        }
    }

    /// The column holding the human-readable name of this variant, if it has one.
    pub fn name_column(&self) -> Option<&'static str> {
        match self {
            EntityKind::Account(_) => Some(schema::account::NAME),
            EntityKind::Category => Some(schema::category::NAME),
            EntityKind::Payee => Some(schema::payee::NAME),
            EntityKind::Tag => Some(schema::tag::NAME),
            EntityKind::Transaction(_) => Some(schema::transaction::DESCRIPTION),
            EntityKind::InvestmentHolding | EntityKind::Other => None,
        }
    }
}

/// Type names of `Z_PRIMARYKEY`, resolved once when the store is opened.
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    by_name: HashMap<Arc<str>, i64>,
    by_code: BTreeMap<i64, (Arc<str>, EntityKind)>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows<I, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = (i64, S)>,
        S: AsRef<str>,
    {
        let mut table = Self::new();
        for (code, name) in rows {
            table.insert(code, name.as_ref());
        }
        table
    }

    pub fn insert(&mut self, code: i64, name: &str) {
        let name: Arc<str> = Arc::from(name);
        self.by_name.insert(name.clone(), code);
        self.by_code.insert(code, (name.clone(), EntityKind::from_type_name(&name)));
    }

    pub fn resolve_type(&self, name: &str) -> Option<i64> {
        self.by_name.get(name).copied()
    }

    pub fn typename_for(&self, code: i64) -> Option<&str> {
        self.by_code.get(&code).map(|(name, _)| name.as_ref())
    }

    pub fn kind_for(&self, code: i64) -> EntityKind {
        self.by_code
            .get(&code)
            .map(|(_, kind)| *kind)
            .unwrap_or(EntityKind::Other)
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

/// One untyped row of `ZSYNCOBJECT`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub id: i64,
    pub ent: i64,
    pub gid: Option<String>,
    pub columns: BTreeMap<Arc<str>, SqlValue>,
}

impl RawRecord {
    pub fn new(id: i64, ent: i64) -> Self {
        Self {
            id,
            ent,
            gid: None,
            columns: BTreeMap::new(),
        }
    }

    pub fn with(mut self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.columns.insert(Arc::from(column), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns.get(column)
    }

    pub fn int(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(SqlValue::as_i64)
    }

    pub fn real(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(SqlValue::as_f64)
    }

    pub fn text(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(SqlValue::as_str)
    }

    /// Columns that carry a value.
    pub fn filtered(&self) -> BTreeMap<Arc<str>, SqlValue> {
        self.columns
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
