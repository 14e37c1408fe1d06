//! Subcommand dispatch: opens the store, runs one command, renders its output.

use std::{collections::BTreeSet, io::Write, str::FromStr};

use moneywiz_core::{CategorySplit, FieldSet, Identifier, PlanError, SqlValue};
use moneywiz_sqlite::SqliteStore;
use rust_decimal::Decimal;
use serde_json::Value;
use thiserror::Error;
use time::{macros::format_description, Date, OffsetDateTime, PrimitiveDateTime};

use crate::{
    catalog::Catalog,
    config::{CliArgs, Command, Config},
    reassign::{reassign_payees, ReassignEvent},
    render::{self, JsonRow, OutputFormat},
    storage::{SchemaSource, StorageError},
    write_session::{ExecutionMode, WriteError, WriteSession},
};

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error("invalid --{arg}: {message}")]
    Payload { arg: &'static str, message: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// A safe delete found referencing rows and deleted nothing.
    ReferencesFound,
}

fn payload_err(arg: &'static str, message: impl ToString) -> CliError {
    CliError::Payload {
        arg,
        message: message.to_string(),
    }
}

/// Parses a JSON object of `column: value` pairs.
pub fn parse_fields(json: &str) -> Result<FieldSet, CliError> {
    let object: serde_json::Map<String, Value> = serde_json::from_str(json).map_err(|e| payload_err("fields", e))?;
    let mut fields = FieldSet::new();
    for (column, value) in object {
        let value = match value {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Integer(i64::from(b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Integer(i),
                None => SqlValue::Real(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => SqlValue::Text(s),
            other => return Err(payload_err("fields", format!("unsupported value for {}: {}", column, other))),
        };
        fields.insert(Identifier::new(&column)?, value);
    }
    Ok(fields)
}

fn parse_amount(value: &Value) -> Result<Decimal, CliError> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        other => return Err(payload_err("splits", format!("amount must be a number, got {}", other))),
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| payload_err("splits", e))
}

/// Parses a JSON array of `[category_id, amount]` pairs.
pub fn parse_splits(json: &str) -> Result<Vec<CategorySplit>, CliError> {
    let pairs: Vec<(i64, Value)> = serde_json::from_str(json).map_err(|e| payload_err("splits", e))?;
    pairs
        .iter()
        .map(|(category, amount)| Ok(CategorySplit::new(*category, parse_amount(amount)?)))
        .collect()
}

pub fn parse_tags(json: &str) -> Result<Vec<i64>, CliError> {
    serde_json::from_str(json).map_err(|e| payload_err("tags", e))
}

/// `YYYY-MM-DD` (midnight UTC) or `YYYY-MM-DDTHH:MM:SS` (UTC).
pub fn parse_until(value: &str) -> Result<OffsetDateTime, CliError> {
    let value = value.trim();
    if let Ok(date) = Date::parse(value, format_description!("[year]-[month]-[day]")) {
        return Ok(date.midnight().assume_utc());
    }
    PrimitiveDateTime::parse(value, format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"))
        .or_else(|_| PrimitiveDateTime::parse(value, format_description!("[year]-[month]-[day] [hour]:[minute]:[second]")))
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|e| payload_err("until", e))
}

pub fn run(cli: &CliArgs, config: &Config, out: &mut dyn Write) -> Result<Outcome, CliError> {
    let store = SqliteStore::open(&config.database.path)?;
    let outcome = dispatch(&store, cli, config, out)?;
    store.close()?;
    Ok(outcome)
}

fn dispatch(store: &SqliteStore, cli: &CliArgs, config: &Config, out: &mut dyn Write) -> Result<Outcome, CliError> {
    let format = cli.format;
    match &cli.command {
        Command::Users => {
            let catalog = Catalog::load(store)?;
            let rows: Vec<JsonRow> = catalog
                .users()
                .iter()
                .map(|(id, login)| {
                    let mut row = JsonRow::new();
                    row.insert("id".into(), (*id).into());
                    row.insert("login".into(), login.clone().into());
                    row
                })
                .collect();
            render::write_rows(out, format, &["id", "login"], &rows)?;
        }
        Command::Accounts { user } => {
            let catalog = Catalog::load(store)?;
            let accounts = match user {
                Some(user) => catalog.accounts_for_user(*user),
                None => catalog.accounts().collect(),
            };
            let rows: Vec<JsonRow> = accounts.into_iter().map(render::account_row).collect();
            render::write_rows(out, format, &["id", "type", "name", "currency", "user"], &rows)?;
        }
        Command::Categories { user, full_name } => {
            let catalog = Catalog::load(store)?;
            let rows: Vec<JsonRow> = catalog
                .categories_for_user(*user)
                .into_iter()
                .map(|c| {
                    let chain = full_name.then(|| catalog.name_chain(c.id).join(" > "));
                    render::category_row(c, chain)
                })
                .collect();
            let headers: &[&str] = if *full_name {
                &["id", "name", "full_name", "parent"]
            } else {
                &["id", "name", "parent"]
            };
            render::write_rows(out, format, headers, &rows)?;
        }
        Command::Payees { user, sort_by_name } => {
            let catalog = Catalog::load(store)?;
            let mut payees = match user {
                Some(user) => catalog.payees_for_user(*user),
                None => catalog.payees().collect(),
            };
            if *sort_by_name {
                payees.sort_by_key(|p| (p.name.to_lowercase(), p.id));
            }
            let rows: Vec<JsonRow> = payees.into_iter().map(render::payee_row).collect();
            render::write_rows(out, format, &["id", "name", "user"], &rows)?;
        }
        Command::Tags { user } => {
            let catalog = Catalog::load(store)?;
            let tags = match user {
                Some(user) => catalog.tags_for_user(*user),
                None => catalog.tags().collect(),
            };
            let rows: Vec<JsonRow> = tags.into_iter().map(render::tag_row).collect();
            render::write_rows(out, format, &["id", "name", "user"], &rows)?;
        }
        Command::Holdings { account } => {
            let catalog = Catalog::load(store)?;
            let rows: Vec<JsonRow> = catalog
                .holdings_for_account(*account)
                .into_iter()
                .map(render::holding_row)
                .collect();
            render::write_rows(out, format, &["id", "symbol", "shares", "description"], &rows)?;
        }
        Command::Transactions { .. } => list_transactions(store, cli, out)?,
        Command::Record { id, gid } => {
            let raw = match (id, gid) {
                (Some(id), _) => store.record(*id)?,
                (None, Some(gid)) => store.record_by_gid(gid)?,
                (None, None) => None,
            };
            let raw = raw.ok_or_else(|| {
                CliError::NotFound(id.map_or_else(|| format!("gid {}", gid.as_deref().unwrap_or("")), |id| format!("row {}", id)))
            })?;
            let row = render::record_row(&raw, store.type_table().typename_for(raw.ent));
            match format {
                OutputFormat::Json => render::write_value(out, &Value::Object(row))?,
                OutputFormat::Table => {
                    let mut rows = Vec::new();
                    let fields = row.get("fields").and_then(Value::as_object).cloned().unwrap_or_default();
                    for (column, value) in row.iter().filter(|(k, _)| *k != "fields").chain(fields.iter()) {
                        let mut line = JsonRow::new();
                        line.insert("column".into(), column.clone().into());
                        line.insert("value".into(), value.clone());
                        rows.push(line);
                    }
                    render::write_rows(out, format, &["column", "value"], &rows)?;
                }
            }
        }
        Command::Summary => {
            let catalog = Catalog::load(store)?;
            render::write_summary(out, format, &catalog.summary())?;
        }
        Command::Insert { type_name, fields } => {
            let fields = match fields {
                Some(json) => parse_fields(json)?,
                None => FieldSet::new(),
            };
            let mut session = open_session(store, cli, config)?;
            let id = session.transaction(|s| s.insert_syncobject(type_name, fields))?;
            finish(out, &mut session)?;
            if let Some(id) = id {
                writeln!(out, "new id: {}", id)?;
            }
        }
        Command::Update { id, fields } => {
            let fields = parse_fields(fields)?;
            let mut session = open_session(store, cli, config)?;
            session.transaction(|s| s.update_syncobject(*id, fields))?;
            finish(out, &mut session)?;
        }
        Command::Delete { id } => {
            let mut session = open_session(store, cli, config)?;
            session.transaction(|s| s.delete_syncobject(*id))?;
            finish(out, &mut session)?;
        }
        Command::SafeDelete { id } => {
            let mut session = open_session(store, cli, config)?;
            let references = session.transaction(|s| s.safe_delete(*id))?;
            if !references.is_empty() {
                render::write_references(out, &references)?;
                session.close();
                return Ok(Outcome::ReferencesFound);
            }
            finish(out, &mut session)?;
        }
        Command::Rename { id, name, name_field } => {
            let mut session = open_session(store, cli, config)?;
            session.transaction(|s| s.rename_entity(*id, name, name_field.as_deref()))?;
            finish(out, &mut session)?;
        }
        Command::AssignCategories { tx, splits } => {
            let splits = parse_splits(splits)?;
            let mut session = open_session(store, cli, config)?;
            session.transaction(|s| s.assign_categories(*tx, &splits))?;
            finish(out, &mut session)?;
        }
        Command::AssignTags { tx, tags } => {
            let tags = parse_tags(tags)?;
            let mut session = open_session(store, cli, config)?;
            session.transaction(|s| s.assign_tags(*tx, &tags))?;
            finish(out, &mut session)?;
        }
        Command::LinkRefund { refund, withdraw } => {
            let mut session = open_session(store, cli, config)?;
            session.transaction(|s| s.link_refund(*refund, *withdraw))?;
            finish(out, &mut session)?;
        }
        Command::ReassignPayees {
            from_payee_id,
            quiet,
            show_plan,
        } => {
            let catalog = Catalog::load(store)?;
            let mut session = open_session(store, cli, config)?;
            writeln!(out, "{}", render::banner(session.is_dry_run()))?;
            let report = session.transaction(|s| reassign_payees(&catalog, s, *from_payee_id))?;
            for event in &report.events {
                match event {
                    ReassignEvent::Updated { transaction, payee } if cli.apply || !quiet => {
                        writeln!(out, "Updated tx {} -> payee {}", transaction, payee)?;
                    }
                    _ if *quiet => {}
                    ReassignEvent::Skipped { transaction, reason } => {
                        writeln!(out, "Skip tx {}: {}", transaction, reason)?;
                    }
                    ReassignEvent::Created { transaction, name, payee: None } => writeln!(
                        out,
                        "[PLAN] Create payee name='{}' and update tx {} (id will be assigned on apply)",
                        name, transaction
                    )?,
                    ReassignEvent::Created { name, payee: Some(id), .. } => {
                        writeln!(out, "Created payee '{}' (id={})", name, id)?;
                    }
                    ReassignEvent::Updated { .. } => {}
                }
            }
            if *show_plan {
                writeln!(out, "\nPlanned SQL steps:")?;
                render::write_steps(out, session.planned())?;
            }
            writeln!(
                out,
                "\nSummary: processed={}, created={}, updated={}, skipped={}",
                report.processed, report.created, report.updated, report.skipped
            )?;
            session.close();
        }
    }
    Ok(Outcome::Success)
}

fn open_session<'a>(store: &'a SqliteStore, cli: &CliArgs, config: &Config) -> Result<WriteSession<'a>, CliError> {
    let references = config.safe_delete.reference_columns()?;
    let mode = ExecutionMode::from_apply_flag(cli.apply);
    Ok(WriteSession::for_store(store, mode).with_references(references, config.safe_delete.sample_size))
}

fn finish(out: &mut dyn Write, session: &mut WriteSession<'_>) -> Result<(), CliError> {
    render::write_plan(out, session.is_dry_run(), session.planned())?;
    session.close();
    Ok(())
}

const DEFAULT_TRANSACTION_FIELDS: [&str; 6] = ["id", "datetime", "account", "account_name", "amount", "description"];
const PREFERRED_TRANSACTION_FIELDS: [&str; 9] = [
    "id",
    "datetime",
    "account",
    "account_name",
    "payee",
    "payee_name",
    "amount",
    "description",
    "__type",
];

fn list_transactions(store: &SqliteStore, cli: &CliArgs, out: &mut dyn Write) -> Result<(), CliError> {
    let Command::Transactions {
        account,
        limit,
        until,
        with_categories,
        with_tags,
        fields,
        list_fields,
        all_fields,
    } = &cli.command
    else {
        return Ok(());
    };

    let until = match until {
        Some(value) => parse_until(value)?,
        None => OffsetDateTime::now_utc(),
    };
    let catalog = Catalog::load(store)?;
    let mut transactions = match account {
        Some(account) => catalog.transactions_for_account(*account, until),
        None => catalog.transactions(until),
    };
    transactions.reverse();
    if *limit > 0 {
        transactions.truncate(*limit);
    }

    let enrich = *all_fields || fields.is_some() || *list_fields;
    let mut rows = Vec::with_capacity(transactions.len());
    for tx in transactions {
        let account_name = tx.account.and_then(|a| catalog.account(a)).map(|a| a.name.as_str());
        let payee_name = tx.payee.and_then(|p| catalog.payee(p)).map(|p| p.name.as_str());
        let mut row = render::transaction_row(tx, account_name, payee_name);
        if enrich {
            let raw = store.record(tx.id)?;
            render::enrich_transaction(&mut row, tx, raw.as_ref());
        }
        if *with_categories {
            let splits: Vec<Value> = catalog
                .categories_for_transaction(tx.id)
                .into_iter()
                .map(|(category, amount)| serde_json::json!({"category_id": category.id, "amount": amount.to_string()}))
                .collect();
            row.insert("categories".into(), Value::Array(splits));
        }
        if *with_tags {
            let tags: Vec<Value> = catalog
                .tags_for_transaction(tx.id)
                .into_iter()
                .map(|t| Value::from(t.id))
                .collect();
            row.insert("tags".into(), Value::Array(tags));
        }
        rows.push(row);
    }

    let available: BTreeSet<&str> = rows
        .iter()
        .flat_map(|r| r.keys().map(String::as_str))
        .filter(|k| *k != "__raw" && *k != "__raw_all")
        .collect();
    if *list_fields {
        for key in &available {
            writeln!(out, "{}", key)?;
        }
        return Ok(());
    }

    if cli.format == OutputFormat::Json {
        return Ok(render::write_rows(out, OutputFormat::Json, &[], &rows)?);
    }

    let headers: Vec<&str> = match fields {
        Some(list) => list.split(',').map(str::trim).filter(|h| !h.is_empty()).collect(),
        None if *all_fields => {
            let mut headers: Vec<&str> = PREFERRED_TRANSACTION_FIELDS
                .iter()
                .copied()
                .filter(|k| available.contains(k))
                .collect();
            headers.extend(available.iter().copied().filter(|k| !PREFERRED_TRANSACTION_FIELDS.contains(k)));
            headers
        }
        None => DEFAULT_TRANSACTION_FIELDS.to_vec(),
    };
    render::write_rows(out, OutputFormat::Table, &headers, &rows)?;
    if *with_categories {
        writeln!(out, "\n# categories: use --format json to see per-transaction details")?;
    }
    if *with_tags {
        writeln!(out, "# tags: use --format json to see per-transaction details")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use time::macros::datetime;

    #[test]
    fn test_parse_fields() {
        let fields = parse_fields(r#"{"ZNAME5": "Coffee Shop", "ZUSER7": 2, "ZAMOUNT1": -1.5, "ZFLAG": true, "ZNOTES1": null}"#)
            .unwrap();
        let get = |k: &str| fields.get(&Identifier::new(k).unwrap()).cloned();
        assert_eq!(get("ZNAME5"), Some(SqlValue::from("Coffee Shop")));
        assert_eq!(get("ZUSER7"), Some(SqlValue::Integer(2)));
        assert_eq!(get("ZAMOUNT1"), Some(SqlValue::Real(-1.5)));
        assert_eq!(get("ZFLAG"), Some(SqlValue::Integer(1)));
        assert_eq!(get("ZNOTES1"), Some(SqlValue::Null));

        assert!(matches!(parse_fields("[1]"), Err(CliError::Payload { arg: "fields", .. })));
        assert!(matches!(parse_fields(r#"{"a": [1]}"#), Err(CliError::Payload { .. })));
        assert!(matches!(
            parse_fields(r#"{"bad column": 1}"#),
            Err(CliError::Plan(PlanError::InvalidIdentifier(_)))
        ));
    }

    #[test]
    fn test_parse_splits_and_tags() {
        let splits = parse_splits(r#"[[201, -12.5], [202, "2500"], [203, 1e2]]"#).unwrap();
        assert_eq!(splits[0], CategorySplit::new(201, dec!(-12.5)));
        assert_eq!(splits[1].amount, dec!(2500));
        assert_eq!(splits[2].amount, dec!(100));
        assert!(parse_splits("[]").unwrap().is_empty());
        assert!(parse_splits(r#"[[201, "abc"]]"#).is_err());
        assert!(parse_splits(r#"[[201]]"#).is_err());

        assert_eq!(parse_tags("[400, 401]").unwrap(), vec![400, 401]);
        assert!(parse_tags(r#"["x"]"#).is_err());
    }

    #[test]
    fn test_parse_until() {
        assert_eq!(parse_until("2023-01-31").unwrap(), datetime!(2023-01-31 0:00 UTC));
        assert_eq!(parse_until("2023-01-31T12:30:00").unwrap(), datetime!(2023-01-31 12:30 UTC));
        assert!(matches!(parse_until("yesterday"), Err(CliError::Payload { arg: "until", .. })));
    }
}
