use std::io::{self, Write};

use clap::ValueEnum;
use moneywiz_core::{
    Account, Category, InvestmentHolding, Payee, PlannedStatement, RawRecord, ReferenceDescriptor, SqlValue, Tag,
    Transaction,
};
use prettytable::{format, Cell, Row, Table};
use serde_json::{Map, Value};
use time::{macros::format_description, OffsetDateTime};

use crate::catalog::Summary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

pub type JsonRow = Map<String, Value>;

pub fn datetime_text(value: OffsetDateTime) -> String {
    let layout = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    value.format(layout).unwrap_or_else(|_| value.to_string())
}

pub fn sql_to_json(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::from(*i),
        SqlValue::Real(f) => serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number),
        SqlValue::Text(s) => Value::String(s.clone()),
        SqlValue::Blob(b) => Value::String(format!("BLOB({} bytes)", b.len())),
    }
}

fn columns_json<'a>(columns: impl Iterator<Item = (&'a std::sync::Arc<str>, &'a SqlValue)>) -> Value {
    Value::Object(columns.map(|(k, v)| (k.to_string(), sql_to_json(v))).collect())
}

/// Every column of a row, nulls included.
pub fn raw_all_json(raw: &RawRecord) -> Value {
    columns_json(raw.columns.iter())
}

/// The non-null columns of a row.
pub fn raw_json(raw: &RawRecord) -> Value {
    columns_json(raw.filtered().iter())
}

pub fn record_row(raw: &RawRecord, type_name: Option<&str>) -> JsonRow {
    let mut row = JsonRow::new();
    row.insert("id".into(), raw.id.into());
    row.insert("ent".into(), raw.ent.into());
    row.insert("type".into(), type_name.map_or(Value::Null, Value::from));
    row.insert("gid".into(), raw.gid.clone().map_or(Value::Null, Value::from));
    row.insert("fields".into(), raw_json(raw));
    row
}

pub fn account_row(account: &Account) -> JsonRow {
    let mut row = JsonRow::new();
    row.insert("id".into(), account.id.into());
    row.insert("type".into(), format!("{:?}", account.kind).into());
    row.insert("name".into(), account.name.clone().into());
    row.insert("currency".into(), account.currency.clone().into());
    row.insert("user".into(), account.user.into());
    row.insert("opening_balance".into(), account.opening_balance.to_string().into());
    row
}

pub fn category_row(category: &Category, full_name: Option<String>) -> JsonRow {
    let mut row = JsonRow::new();
    row.insert("id".into(), category.id.into());
    row.insert("name".into(), category.name.clone().into());
    if let Some(full_name) = full_name {
        row.insert("full_name".into(), full_name.into());
    }
    row.insert("parent".into(), category.parent.into());
    row.insert("type".into(), category.category_type.into());
    row.insert("user".into(), category.user.into());
    row
}

pub fn payee_row(payee: &Payee) -> JsonRow {
    let mut row = JsonRow::new();
    row.insert("id".into(), payee.id.into());
    row.insert("name".into(), payee.name.clone().into());
    row.insert("user".into(), payee.user.into());
    row
}

pub fn tag_row(tag: &Tag) -> JsonRow {
    let mut row = JsonRow::new();
    row.insert("id".into(), tag.id.into());
    row.insert("name".into(), tag.name.clone().into());
    row.insert("user".into(), tag.user.into());
    row
}

pub fn holding_row(holding: &InvestmentHolding) -> JsonRow {
    let mut row = JsonRow::new();
    row.insert("id".into(), holding.id.into());
    row.insert("account".into(), holding.account.into());
    row.insert("symbol".into(), holding.symbol.clone().into());
    row.insert("shares".into(), holding.number_of_shares.to_string().into());
    row.insert("description".into(), holding.description.clone().into());
    row
}

/// The listing columns of a transaction. Names are resolved by the caller.
pub fn transaction_row(tx: &Transaction, account_name: Option<&str>, payee_name: Option<&str>) -> JsonRow {
    let mut row = JsonRow::new();
    row.insert("id".into(), tx.id.into());
    row.insert("datetime".into(), tx.datetime.map(datetime_text).into());
    row.insert("account".into(), tx.account.into());
    if let Some(name) = account_name {
        row.insert("account_name".into(), name.into());
    }
    if let Some(payee) = tx.payee {
        row.insert("payee".into(), payee.into());
    }
    if let Some(name) = payee_name {
        row.insert("payee_name".into(), name.into());
    }
    row.insert("amount".into(), tx.amount.to_string().into());
    row.insert("description".into(), tx.description.clone().into());
    row
}

/// Model fields beyond the listing columns; existing keys are kept.
pub fn enrich_transaction(row: &mut JsonRow, tx: &Transaction, raw: Option<&RawRecord>) {
    let extra: [(&str, Value); 7] = [
        ("__type", format!("{:?}", tx.kind).into()),
        ("gid", tx.gid.clone().into()),
        ("notes", tx.notes.clone().into()),
        ("original_amount", tx.original_amount.map(|d| d.to_string()).into()),
        ("original_currency", tx.original_currency.clone().into()),
        ("original_transaction", tx.original_transaction.into()),
        ("payee", tx.payee.into()),
    ];
    for (key, value) in extra {
        row.entry(key).or_insert(value);
    }
    if let Some(raw) = raw {
        row.insert("__raw".into(), raw_json(raw));
        row.insert("__raw_all".into(), raw_all_json(raw));
    }
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Writes rows as an aligned table over `headers`, or as a pretty JSON array.
pub fn write_rows(out: &mut dyn Write, output: OutputFormat, headers: &[&str], rows: &[JsonRow]) -> io::Result<()> {
    match output {
        OutputFormat::Json => {
            let array = Value::Array(rows.iter().cloned().map(Value::Object).collect());
            writeln!(out, "{}", serde_json::to_string_pretty(&array)?)
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_format(*format::consts::FORMAT_CLEAN);
            table.set_titles(Row::new(headers.iter().map(|h| Cell::new(h)).collect()));
            for row in rows {
                table.add_row(Row::new(
                    headers.iter().map(|h| Cell::new(&cell_text(row.get(*h)))).collect(),
                ));
            }
            write!(out, "{}", table)
        }
    }
}

pub fn write_value(out: &mut dyn Write, value: &Value) -> io::Result<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(value)?)
}

pub fn write_summary(out: &mut dyn Write, output: OutputFormat, summary: &Summary) -> io::Result<()> {
    let counts: [(&str, usize); 10] = [
        ("users", summary.users),
        ("accounts", summary.accounts),
        ("categories", summary.categories),
        ("payees", summary.payees),
        ("tags", summary.tags),
        ("transactions", summary.transactions),
        ("holdings", summary.holdings),
        ("other", summary.other),
        ("category_assignments", summary.category_assignments),
        ("tag_links", summary.tag_links),
    ];
    match output {
        OutputFormat::Json => {
            let object: JsonRow = counts.iter().map(|(k, v)| (k.to_string(), Value::from(*v))).collect();
            write_value(out, &Value::Object(object))
        }
        OutputFormat::Table => {
            let rows: Vec<JsonRow> = counts
                .iter()
                .map(|(k, v)| {
                    let mut row = JsonRow::new();
                    row.insert("manager".into(), (*k).into());
                    row.insert("count".into(), (*v).into());
                    row
                })
                .collect();
            write_rows(out, output, &["manager", "count"], &rows)
        }
    }
}

pub fn banner(dry_run: bool) -> &'static str {
    if dry_run {
        "-- DRY-RUN --"
    } else {
        "-- APPLY --"
    }
}

pub fn write_plan(out: &mut dyn Write, dry_run: bool, planned: &[PlannedStatement]) -> io::Result<()> {
    writeln!(out, "{}", banner(dry_run))?;
    write_steps(out, planned)
}

pub fn write_steps(out: &mut dyn Write, planned: &[PlannedStatement]) -> io::Result<()> {
    for (i, step) in planned.iter().enumerate() {
        writeln!(out, "[{}] SQL: {}", i + 1, step.sql())?;
        let params: Vec<String> = step.params().iter().map(|p| p.to_string()).collect();
        writeln!(out, "    params: [{}]", params.join(", "))?;
    }
    Ok(())
}

pub fn write_references(out: &mut dyn Write, references: &[ReferenceDescriptor]) -> io::Result<()> {
    writeln!(out, "-- ABORT: References found; not deleting --")?;
    for r in references {
        let samples: Vec<String> = r.sample_ids.iter().map(|id| id.to_string()).collect();
        if samples.is_empty() {
            writeln!(out, "- {}.{}: {}", r.table, r.column, r.count)?;
        } else {
            writeln!(out, "- {}.{}: {} (sample ids: {})", r.table, r.column, r.count, samples.join(", "))?;
        }
    }
    Ok(())
}
