//! Moves transactions off a catch-all payee onto payees named after their
//! descriptions.

use std::collections::HashMap;

use moneywiz_core::{schema, FieldSet, Identifier, SqlValue};

use crate::{
    catalog::Catalog,
    write_session::{WriteError, WriteSession},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReassignEvent {
    /// No description, or the transaction's account does not exist.
    Skipped { transaction: i64, reason: &'static str },
    /// A payee was planned for insertion; `payee` is `None` in dry-run.
    Created { transaction: i64, name: String, payee: Option<i64> },
    Updated { transaction: i64, payee: i64 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReassignReport {
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub events: Vec<ReassignEvent>,
}

enum Pending {
    Known(i64),
    Planned,
}

pub fn reassign_payees(
    catalog: &Catalog,
    session: &mut WriteSession<'_>,
    from_payee: i64,
) -> Result<ReassignReport, WriteError> {
    let mut report = ReassignReport::default();
    // payees created during this run, keyed by (user, name)
    let mut created: HashMap<(Option<i64>, String), Pending> = HashMap::new();
    let payee_column = Identifier::new(schema::transaction::PAYEE)?;

    for tx in catalog.transactions_for_payee(from_payee) {
        report.processed += 1;
        // Names match exactly; only a missing or empty description is skipped.
        let name = tx.description.as_deref().unwrap_or_default();
        if name.is_empty() {
            report.skipped += 1;
            report.events.push(ReassignEvent::Skipped { transaction: tx.id, reason: "empty description" });
            continue;
        }
        let Some(account) = tx.account.and_then(|a| catalog.account(a)) else {
            report.skipped += 1;
            report.events.push(ReassignEvent::Skipped { transaction: tx.id, reason: "account not found" });
            continue;
        };
        let user = account.user;

        let key = (user, name.to_string());
        let target = match catalog.find_payee(user, name) {
            Some(payee) => Some(payee.id),
            None => match created.get(&key) {
                Some(Pending::Known(id)) => Some(*id),
                Some(Pending::Planned) => None,
                None => {
                    let mut fields = FieldSet::new();
                    fields.insert(Identifier::new(schema::payee::NAME)?, SqlValue::from(name));
                    fields.insert(Identifier::new(schema::payee::USER)?, user.map_or(SqlValue::Null, SqlValue::Integer));
                    let id = session.insert_syncobject("Payee", fields)?;
                    report.created += 1;
                    report.events.push(ReassignEvent::Created {
                        transaction: tx.id,
                        name: name.to_string(),
                        payee: id,
                    });
                    created.insert(key, id.map_or(Pending::Planned, Pending::Known));
                    id
                }
            },
        };

        // In dry-run a freshly planned payee has no id to point at yet.
        let Some(payee) = target else { continue };
        let mut fields = FieldSet::new();
        fields.insert(payee_column.clone(), SqlValue::Integer(payee));
        session.update_syncobject(tx.id, fields)?;
        report.updated += 1;
        report.events.push(ReassignEvent::Updated { transaction: tx.id, payee });
    }

    tracing::info!(
        from_payee,
        processed = report.processed,
        created = report.created,
        updated = report.updated,
        skipped = report.skipped,
        "Payee reassignment planned"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use moneywiz_core::{PlannedStatement, RawRecord, RowId, StatementKind};

    use crate::storage::{InMemorySource, StatementExecutor, StorageError};

    fn source() -> InMemorySource {
        InMemorySource::new()
            .with_type(10, "BankChequeAccount")
            .with_type(28, "Payee")
            .with_type(47, "WithdrawTransaction")
            .with_record(RawRecord::new(100, 10).with("ZUSER", 2i64))
            .with_record(RawRecord::new(300, 28).with("ZNAME5", "Unknown").with("ZUSER7", 2i64))
            .with_record(RawRecord::new(302, 28).with("ZNAME5", "Bakery").with("ZUSER7", 2i64))
            .with_record(RawRecord::new(500, 47).with("ZACCOUNT2", 100i64).with("ZPAYEE2", 300i64).with("ZDESC2", "Bakery"))
            .with_record(RawRecord::new(501, 47).with("ZACCOUNT2", 100i64).with("ZPAYEE2", 300i64).with("ZDESC2", "Corner Store"))
            .with_record(RawRecord::new(502, 47).with("ZACCOUNT2", 100i64).with("ZPAYEE2", 300i64).with("ZDESC2", ""))
            .with_record(RawRecord::new(503, 47).with("ZACCOUNT2", 999i64).with("ZPAYEE2", 300i64).with("ZDESC2", "Gym"))
            .with_record(RawRecord::new(504, 47).with("ZACCOUNT2", 100i64).with("ZPAYEE2", 300i64).with("ZDESC2", "Corner Store"))
    }

    struct CountingExecutor(i64);

    impl StatementExecutor for CountingExecutor {
        fn execute(&mut self, statement: &PlannedStatement) -> Result<Option<RowId>, StorageError> {
            if statement.kind() == StatementKind::Insert {
                self.0 += 1;
                return Ok(Some(self.0));
            }
            Ok(None)
        }
        fn begin(&mut self) -> Result<(), StorageError> {
            Ok(())
        }
        fn commit(&mut self) -> Result<(), StorageError> {
            Ok(())
        }
        fn rollback(&mut self) -> Result<(), StorageError> {
            Ok(())
        }
    }

    #[test]
    fn test_reassign_dry_run() {
        let src = source();
        let catalog = Catalog::load(&src).unwrap();
        let mut session = WriteSession::dry_run(&src);
        let report = reassign_payees(&catalog, &mut session, 300).unwrap();

        assert_eq!(report.processed, 5);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.created, 1, "Corner Store is planned once");
        assert_eq!(report.updated, 1, "only the existing payee can be pointed at");
        let kinds: Vec<StatementKind> = session.planned().iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, vec![StatementKind::Update, StatementKind::Insert]);
        assert_eq!(session.planned()[0].params(), &[SqlValue::Integer(302), SqlValue::Integer(500)]);
    }

    #[test]
    fn test_reassign_apply_reuses_created_payee() {
        let src = source();
        let catalog = Catalog::load(&src).unwrap();
        let mut session = WriteSession::new(&src, Box::new(CountingExecutor(1000)));
        let report = reassign_payees(&catalog, &mut session, 300).unwrap();

        assert_eq!(report.created, 1);
        assert_eq!(report.updated, 3);
        assert!(report.events.contains(&ReassignEvent::Updated { transaction: 501, payee: 1001 }));
        assert!(report.events.contains(&ReassignEvent::Updated { transaction: 504, payee: 1001 }));
        assert!(report
            .events
            .contains(&ReassignEvent::Skipped { transaction: 503, reason: "account not found" }));
    }

    #[test]
    fn test_reassign_matches_description_exactly() {
        let src = InMemorySource::new()
            .with_type(10, "BankChequeAccount")
            .with_type(28, "Payee")
            .with_type(47, "WithdrawTransaction")
            .with_record(RawRecord::new(100, 10).with("ZUSER", 2i64))
            .with_record(RawRecord::new(300, 28).with("ZNAME5", "Unknown").with("ZUSER7", 2i64))
            .with_record(RawRecord::new(302, 28).with("ZNAME5", "Bakery").with("ZUSER7", 2i64))
            .with_record(RawRecord::new(500, 47).with("ZACCOUNT2", 100i64).with("ZPAYEE2", 300i64).with("ZDESC2", "  Bakery "))
            .with_record(RawRecord::new(501, 47).with("ZACCOUNT2", 100i64).with("ZPAYEE2", 300i64).with("ZDESC2", "   "));
        let catalog = Catalog::load(&src).unwrap();
        let mut session = WriteSession::dry_run(&src);
        let report = reassign_payees(&catalog, &mut session, 300).unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(report.skipped, 0, "whitespace is a description");
        assert_eq!(report.created, 2);
        assert_eq!(report.updated, 0, "padded name does not match Bakery");
        let planned = session.planned();
        assert!(planned.iter().all(|s| s.kind() == StatementKind::Insert));
        assert!(planned[0].params().contains(&SqlValue::from("  Bakery ")));
        assert!(planned[1].params().contains(&SqlValue::from("   ")));
    }

    #[test]
    fn test_reassign_account_without_user() {
        let src = InMemorySource::new()
            .with_type(10, "BankChequeAccount")
            .with_type(28, "Payee")
            .with_type(47, "WithdrawTransaction")
            .with_record(RawRecord::new(101, 10))
            .with_record(RawRecord::new(300, 28).with("ZNAME5", "Unknown").with("ZUSER7", 2i64))
            .with_record(RawRecord::new(303, 28).with("ZNAME5", "Gym"))
            .with_record(RawRecord::new(602, 47).with("ZACCOUNT2", 101i64).with("ZPAYEE2", 300i64).with("ZDESC2", "Gym"))
            .with_record(RawRecord::new(603, 47).with("ZACCOUNT2", 101i64).with("ZPAYEE2", 300i64).with("ZDESC2", "Pool"));
        let catalog = Catalog::load(&src).unwrap();
        let mut session = WriteSession::dry_run(&src);
        let report = reassign_payees(&catalog, &mut session, 300).unwrap();

        assert_eq!(report.skipped, 0);
        assert!(report.events.contains(&ReassignEvent::Updated { transaction: 602, payee: 303 }));
        assert!(report.events.contains(&ReassignEvent::Created {
            transaction: 603,
            name: "Pool".into(),
            payee: None
        }));
        let insert = &session.planned()[1];
        assert_eq!(insert.kind(), StatementKind::Insert);
        assert!(insert.params().contains(&SqlValue::Null));
    }
}
