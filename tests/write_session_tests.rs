mod common;

use common::Fixture;
use moneywiz::catalog::Catalog;
use moneywiz::reassign::reassign_payees;
use moneywiz::write_session::{ExecutionMode, WriteError, WriteSession};
use moneywiz_core::{CategorySplit, FieldSet, Identifier, Record, SchemaSource, SqlValue, StatementKind};
use moneywiz_sqlite::SqliteStore;
use rust_decimal_macros::dec;

fn fields(pairs: &[(&str, SqlValue)]) -> FieldSet {
    pairs
        .iter()
        .map(|(k, v)| (Identifier::new(k).unwrap(), v.clone()))
        .collect()
}

#[test]
fn test_dry_run_leaves_file_unchanged() {
    let fx = Fixture::new();
    let before = fx.hash();

    let store = SqliteStore::open(&fx.path).unwrap();
    {
        let mut session = WriteSession::for_store(&store, ExecutionMode::DryRun);
        assert!(session.is_dry_run());
        session
            .transaction(|s| {
                let id = s.insert_syncobject("Payee", fields(&[("ZNAME5", "Coffee Shop".into())]))?;
                assert_eq!(id, None);
                s.update_syncobject(500, fields(&[("ZNOTES1", "note".into())]))?;
                s.rename_entity(201, "Supermarket", None)?;
                s.assign_categories(500, &[CategorySplit::new(200, dec!(-12.5))])?;
                s.assign_tags(500, &[401])?;
                s.link_refund(503, 500)?;
                assert!(s.safe_delete(203)?.is_empty());
                s.delete_syncobject(700)
            })
            .unwrap();
        assert_eq!(session.planned().len(), 10);
        session.close();
    }
    store.close().unwrap();

    assert_eq!(fx.hash(), before, "dry-run must not touch the file");
    assert!(fx.exists(700));
    assert_eq!(fx.splits(500), vec![(201, -12.5)]);
}

#[test]
fn test_assign_empty_splits_clears() {
    let fx = Fixture::new();
    let store = SqliteStore::open(&fx.path).unwrap();
    {
        let mut session = WriteSession::for_store(&store, ExecutionMode::Apply);
        session.transaction(|s| s.assign_categories(500, &[])).unwrap();
    }
    store.close().unwrap();

    assert!(fx.splits(500).is_empty());
    assert_eq!(fx.splits(502), vec![(202, 2500.0)], "other transactions keep their splits");
}

#[test]
fn test_assign_splits_is_idempotent() {
    let fx = Fixture::new();
    let splits = [CategorySplit::new(201, dec!(-7.5)), CategorySplit::new(200, dec!(-5))];
    let store = SqliteStore::open(&fx.path).unwrap();
    {
        let mut session = WriteSession::for_store(&store, ExecutionMode::Apply);
        session.transaction(|s| s.assign_categories(500, &splits)).unwrap();
        session.transaction(|s| s.assign_categories(500, &splits)).unwrap();
    }
    store.close().unwrap();

    assert_eq!(fx.splits(500), vec![(200, -5.0), (201, -7.5)]);
}

#[test]
fn test_safe_delete_aborts_when_referenced() {
    let fx = Fixture::new();
    let store = SqliteStore::open(&fx.path).unwrap();
    {
        let mut session = WriteSession::for_store(&store, ExecutionMode::Apply);
        let refs = session.transaction(|s| s.safe_delete(300)).unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].table.as_ref(), "ZSYNCOBJECT");
        assert_eq!(refs[0].column.as_ref(), "ZPAYEE2");
        assert_eq!(refs[0].count, 4);
        assert_eq!(refs[0].sample_ids, vec![500, 501, 504, 505]);
        assert!(session.planned().is_empty());

        let refs = session.transaction(|s| s.safe_delete(400)).unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].table.as_ref(), "Z_36TAGS");

        let refs = session.transaction(|s| s.safe_delete(201)).unwrap();
        assert_eq!(refs[0].column.as_ref(), "ZCATEGORY");
        assert!(session.planned().is_empty());
    }
    store.close().unwrap();

    assert!(fx.exists(300));
    assert!(fx.exists(400));
    assert!(fx.exists(201));
}

#[test]
fn test_safe_delete_unreferenced_row() {
    let fx = Fixture::new();
    let store = SqliteStore::open(&fx.path).unwrap();
    {
        let mut session = WriteSession::for_store(&store, ExecutionMode::Apply);
        let refs = session.transaction(|s| s.safe_delete(203)).unwrap();
        assert!(refs.is_empty());
        assert_eq!(session.planned().len(), 1);
        assert_eq!(session.planned()[0].sql(), "DELETE FROM ZSYNCOBJECT WHERE Z_PK = ?");
    }
    store.close().unwrap();

    assert!(!fx.exists(203));
}

#[test]
fn test_insert_payee_round_trip() {
    let fx = Fixture::new();
    let store = SqliteStore::open(&fx.path).unwrap();
    let pk = {
        let mut session = WriteSession::for_store(&store, ExecutionMode::Apply);
        session
            .transaction(|s| {
                s.insert_syncobject(
                    "Payee",
                    fields(&[("ZNAME5", "Coffee Shop".into()), ("ZUSER7", SqlValue::Integer(2))]),
                )
            })
            .unwrap()
            .expect("apply mode returns the new key")
    };

    let raw = store.record(pk).unwrap().unwrap();
    assert_eq!(store.type_table().typename_for(raw.ent), Some("Payee"));
    match Record::from_raw(raw, store.type_table().kind_for(28)) {
        Record::Payee(payee) => {
            assert_eq!(payee.id, pk);
            assert_eq!(payee.name, "Coffee Shop");
            assert_eq!(payee.user, Some(2));
        }
        other => panic!("expected a payee, got {:?}", other),
    }
    store.close().unwrap();
}

#[test]
fn test_update_without_fields_appends_nothing() {
    let fx = Fixture::new();
    let store = SqliteStore::open(&fx.path).unwrap();
    {
        let mut session = WriteSession::for_store(&store, ExecutionMode::Apply);
        let err = session.update_syncobject(7, FieldSet::new()).unwrap_err();
        assert!(matches!(err, WriteError::NoFields(7)));
        assert!(session.planned().is_empty());
    }
    store.close().unwrap();
}

#[test]
fn test_rename_category_plans_one_update() {
    let fx = Fixture::new();
    let store = SqliteStore::open(&fx.path).unwrap();
    {
        let mut session = WriteSession::for_store(&store, ExecutionMode::Apply);
        session.transaction(|s| s.rename_entity(201, "Supermarket", None)).unwrap();
        assert_eq!(session.planned().len(), 1);
        let stmt = &session.planned()[0];
        assert_eq!(stmt.kind(), StatementKind::Update);
        assert_eq!(stmt.sql(), "UPDATE ZSYNCOBJECT SET ZNAME2 = ? WHERE Z_PK = ?");
    }
    let catalog = Catalog::load(&store).unwrap();
    assert_eq!(catalog.category(201).map(|c| c.name.as_str()), Some("Supermarket"));
    assert_eq!(catalog.category(201).and_then(|c| c.parent), Some(200));
    store.close().unwrap();
}

#[test]
fn test_failed_transaction_leaves_no_partial_writes() {
    let fx = Fixture::new();
    let store = SqliteStore::open(&fx.path).unwrap();
    {
        let mut session = WriteSession::for_store(&store, ExecutionMode::Apply);
        let err = session
            .transaction(|s| {
                s.assign_categories(500, &[CategorySplit::new(200, dec!(-1))])?;
                s.update_syncobject(500, FieldSet::new())
            })
            .unwrap_err();
        assert!(matches!(err, WriteError::NoFields(500)));
        assert_eq!(session.planned().len(), 2, "the plan still records what ran");
    }
    store.close().unwrap();

    assert_eq!(fx.splits(500), vec![(201, -12.5)]);
}

#[test]
fn test_tags_and_refund_link_apply() {
    let fx = Fixture::new();
    let store = SqliteStore::open(&fx.path).unwrap();
    {
        let mut session = WriteSession::for_store(&store, ExecutionMode::Apply);
        session
            .transaction(|s| {
                s.assign_tags(500, &[401, 401, 400])?;
                s.link_refund(503, 500)
            })
            .unwrap();
    }
    store.close().unwrap();

    assert_eq!(fx.tags(500), vec![400, 401]);
    assert_eq!(fx.tags(502), vec![401]);
    assert_eq!(fx.int_column(503, "ZORIGINALTRANSACTION"), Some(500));
}

#[test]
fn test_reassign_payees_apply() {
    let fx = Fixture::new();
    let store = SqliteStore::open(&fx.path).unwrap();
    let report = {
        let catalog = Catalog::load(&store).unwrap();
        let mut session = WriteSession::for_store(&store, ExecutionMode::Apply);
        session.transaction(|s| reassign_payees(&catalog, s, 300)).unwrap()
    };
    store.close().unwrap();

    assert_eq!(report.processed, 4);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.created, 1);
    assert_eq!(report.updated, 3);

    assert_eq!(fx.int_column(500, "ZPAYEE2"), Some(302));
    let corner_store = fx.int_column(501, "ZPAYEE2");
    assert!(corner_store.is_some_and(|id| id > 700));
    assert_eq!(fx.int_column(505, "ZPAYEE2"), corner_store);
    assert_eq!(fx.int_column(504, "ZPAYEE2"), Some(300));
}
