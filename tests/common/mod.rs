#![allow(dead_code)]

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use sha2::{Digest, Sha256};
use tempfile::TempDir;

// 2023-01-05, 2023-01-06 and 2023-02-01 as Core Data timestamps
pub const JAN_5: f64 = 694_569_600.0;
pub const JAN_6: f64 = 694_656_000.0;
pub const FEB_1: f64 = 696_902_400.0;

const SCHEMA: &str = "
CREATE TABLE Z_PRIMARYKEY (Z_ENT INTEGER PRIMARY KEY, Z_NAME VARCHAR, Z_SUPER INTEGER, Z_MAX INTEGER);
CREATE TABLE ZUSER (Z_PK INTEGER PRIMARY KEY, Z_ENT INTEGER, ZSYNCLOGIN VARCHAR);
CREATE TABLE ZSYNCOBJECT (
    Z_PK INTEGER PRIMARY KEY,
    Z_ENT INTEGER,
    ZGID VARCHAR,
    ZNAME VARCHAR, ZCURRENCYNAME VARCHAR, ZUSER INTEGER, ZOPENINGBALANCE FLOAT,
    ZNAME2 VARCHAR, ZTYPE2 INTEGER, ZPARENTCATEGORY INTEGER, ZUSER3 INTEGER,
    ZNAME5 VARCHAR, ZUSER7 INTEGER,
    ZNAME6 VARCHAR, ZUSER8 INTEGER,
    ZACCOUNT2 INTEGER, ZAMOUNT1 FLOAT, ZDATE1 TIMESTAMP, ZDESC2 VARCHAR, ZNOTES1 VARCHAR, ZPAYEE2 INTEGER,
    ZORIGINALAMOUNT FLOAT, ZORIGINALCURRENCY VARCHAR, ZORIGINALTRANSACTION INTEGER,
    ZINVESTMENTACCOUNT INTEGER, ZSYMBOL VARCHAR, ZNUMBEROFSHARES FLOAT, ZDESC VARCHAR
);
CREATE TABLE ZCATEGORYASSIGMENT (Z_PK INTEGER PRIMARY KEY, Z_ENT INTEGER, ZCATEGORY INTEGER, ZTRANSACTION INTEGER, ZAMOUNT FLOAT);
CREATE TABLE Z_36TAGS (Z_36TRANSACTIONS INTEGER, Z_35TAGS INTEGER, PRIMARY KEY (Z_36TRANSACTIONS, Z_35TAGS));
";

const SEED: &str = "
INSERT INTO Z_PRIMARYKEY (Z_ENT, Z_NAME) VALUES
    (10, 'BankChequeAccount'), (11, 'CashAccount'), (12, 'InvestmentAccount'),
    (19, 'Category'), (26, 'InvestmentHolding'), (28, 'Payee'), (30, 'Budget'), (35, 'Tag'),
    (37, 'DepositTransaction'), (45, 'RefundTransaction'), (47, 'WithdrawTransaction');

INSERT INTO ZUSER (Z_PK, ZSYNCLOGIN) VALUES (1, 'main'), (2, 'alice');

INSERT INTO ZSYNCOBJECT (Z_PK, Z_ENT, ZGID, ZNAME, ZCURRENCYNAME, ZUSER, ZOPENINGBALANCE) VALUES
    (100, 10, 'acc-checking', 'Checking', 'USD', 2, 1000.0),
    (101, 11, NULL, 'Wallet', 'USD', 2, 50.0),
    (102, 12, NULL, 'Brokerage', 'USD', 2, 0.0);

INSERT INTO ZSYNCOBJECT (Z_PK, Z_ENT, ZNAME2, ZTYPE2, ZPARENTCATEGORY, ZUSER3) VALUES
    (200, 19, 'Food', 1, NULL, 2),
    (201, 19, 'Groceries', 1, 200, 2),
    (202, 19, 'Salary', 2, NULL, 2),
    (203, 19, 'Unused', 1, NULL, 2);

INSERT INTO ZSYNCOBJECT (Z_PK, Z_ENT, ZNAME5, ZUSER7) VALUES
    (300, 28, 'Unknown', 2),
    (301, 28, 'Employer', 2),
    (302, 28, 'Bakery', 2);

INSERT INTO ZSYNCOBJECT (Z_PK, Z_ENT, ZNAME6, ZUSER8) VALUES
    (400, 35, 'groceries', 2),
    (401, 35, 'work', 2);

INSERT INTO ZSYNCOBJECT (Z_PK, Z_ENT, ZACCOUNT2, ZAMOUNT1, ZDATE1, ZDESC2, ZPAYEE2) VALUES
    (500, 47, 100, -12.5, 694569600.0, 'Bakery', 300),
    (501, 47, 100, -7.25, 694656000.0, 'Corner Store', 300),
    (502, 37, 100, 2500.0, 694569600.0, 'Payday', 301),
    (503, 45, 100, 4.0, 696902400.0, 'Refund', NULL),
    (504, 47, 101, -3.0, 694656000.0, '', 300),
    (505, 47, 101, -9.0, 696902400.0, 'Corner Store', 300);

INSERT INTO ZSYNCOBJECT (Z_PK, Z_ENT, ZINVESTMENTACCOUNT, ZSYMBOL, ZNUMBEROFSHARES, ZDESC) VALUES
    (600, 26, 102, 'AAPL', 10.0, 'Apple Inc.');

INSERT INTO ZSYNCOBJECT (Z_PK, Z_ENT) VALUES (700, 30);

INSERT INTO ZCATEGORYASSIGMENT (Z_PK, ZCATEGORY, ZTRANSACTION, ZAMOUNT) VALUES
    (1, 201, 500, -12.5),
    (2, 202, 502, 2500.0);

INSERT INTO Z_36TAGS (Z_36TRANSACTIONS, Z_35TAGS) VALUES (500, 400), (502, 401);
";

/// A seeded MoneyWiz-shaped database in a temporary directory.
pub struct Fixture {
    _dir: TempDir,
    pub path: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("moneywiz.sqlite");
        let conn = Connection::open(&path).expect("create fixture db");
        conn.execute_batch(SCHEMA).expect("schema");
        conn.execute_batch(SEED).expect("seed");
        conn.close().expect("close fixture db");
        Fixture { _dir: dir, path }
    }

    pub fn connection(&self) -> Connection {
        Connection::open(&self.path).expect("open fixture db")
    }

    pub fn hash(&self) -> Vec<u8> {
        file_hash(&self.path)
    }

    /// `(category, amount)` pairs of a transaction, sorted.
    pub fn splits(&self, tx: i64) -> Vec<(i64, f64)> {
        let conn = self.connection();
        let mut stmt = conn
            .prepare("SELECT ZCATEGORY, ZAMOUNT FROM ZCATEGORYASSIGMENT WHERE ZTRANSACTION = ?1 ORDER BY ZCATEGORY, ZAMOUNT")
            .unwrap();
        let rows = stmt.query_map([tx], |r| Ok((r.get(0)?, r.get(1)?))).unwrap();
        rows.collect::<Result<Vec<_>, _>>().unwrap()
    }

    pub fn tags(&self, tx: i64) -> Vec<i64> {
        let conn = self.connection();
        let mut stmt = conn
            .prepare("SELECT Z_35TAGS FROM Z_36TAGS WHERE Z_36TRANSACTIONS = ?1 ORDER BY Z_35TAGS")
            .unwrap();
        let rows = stmt.query_map([tx], |r| r.get(0)).unwrap();
        rows.collect::<Result<Vec<_>, _>>().unwrap()
    }

    pub fn exists(&self, id: i64) -> bool {
        let count: i64 = self
            .connection()
            .query_row("SELECT COUNT(*) FROM ZSYNCOBJECT WHERE Z_PK = ?1", [id], |r| r.get(0))
            .unwrap();
        count > 0
    }

    pub fn int_column(&self, id: i64, column: &str) -> Option<i64> {
        self.connection()
            .query_row(&format!("SELECT {} FROM ZSYNCOBJECT WHERE Z_PK = ?1", column), [id], |r| r.get(0))
            .unwrap()
    }
}

pub fn file_hash(path: &Path) -> Vec<u8> {
    let bytes = std::fs::read(path).expect("read db file");
    Sha256::digest(&bytes).to_vec()
}
