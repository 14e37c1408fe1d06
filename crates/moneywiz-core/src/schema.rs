//! Table and column names of the MoneyWiz Core Data store.
//!
//! Columns in `ZSYNCOBJECT` are shared between entity types, so the same
//! physical column can carry a different meaning per variant. Every name used
//! anywhere in the toolkit is declared here, grouped by the variant that owns it.

pub const SYNC_OBJECT_TABLE: &str = "ZSYNCOBJECT";
pub const PRIMARY_KEY_TABLE: &str = "Z_PRIMARYKEY";
pub const USER_TABLE: &str = "ZUSER";
// The misspelling is the store's, not ours.
pub const CATEGORY_ASSIGNMENT_TABLE: &str = "ZCATEGORYASSIGMENT";
pub const TAG_LINK_TABLE: &str = "Z_36TAGS";

pub const PK: &str = "Z_PK";
pub const ENT: &str = "Z_ENT";
pub const GID: &str = "ZGID";
pub const TYPE_NAME: &str = "Z_NAME";

pub mod user {
    pub const LOGIN: &str = "ZSYNCLOGIN";
}

pub mod account {
    pub const NAME: &str = "ZNAME";
    pub const CURRENCY: &str = "ZCURRENCYNAME";
    pub const USER: &str = "ZUSER";
    pub const OPENING_BALANCE: &str = "ZOPENINGBALANCE";
}

pub mod category {
    pub const NAME: &str = "ZNAME2";
    pub const TYPE: &str = "ZTYPE2";
    pub const PARENT: &str = "ZPARENTCATEGORY";
    pub const USER: &str = "ZUSER3";
}

pub mod payee {
    pub const NAME: &str = "ZNAME5";
    pub const USER: &str = "ZUSER7";
}

pub mod tag {
    pub const NAME: &str = "ZNAME6";
    pub const USER: &str = "ZUSER8";
}

pub mod transaction {
    pub const ACCOUNT: &str = "ZACCOUNT2";
    pub const AMOUNT: &str = "ZAMOUNT1";
    pub const DATE: &str = "ZDATE1";
    pub const DESCRIPTION: &str = "ZDESC2";
    pub const NOTES: &str = "ZNOTES1";
    pub const PAYEE: &str = "ZPAYEE2";
    pub const ORIGINAL_AMOUNT: &str = "ZORIGINALAMOUNT";
    pub const ORIGINAL_CURRENCY: &str = "ZORIGINALCURRENCY";
    /// On refunds, the withdraw transaction being refunded.
    pub const ORIGINAL_TRANSACTION: &str = "ZORIGINALTRANSACTION";
}

pub mod holding {
    pub const ACCOUNT: &str = "ZINVESTMENTACCOUNT";
    pub const SYMBOL: &str = "ZSYMBOL";
    pub const SHARES: &str = "ZNUMBEROFSHARES";
    pub const DESCRIPTION: &str = "ZDESC";
}

pub mod category_assignment {
    pub const CATEGORY: &str = "ZCATEGORY";
    pub const TRANSACTION: &str = "ZTRANSACTION";
    pub const AMOUNT: &str = "ZAMOUNT";
}

pub mod tag_link {
    pub const TRANSACTION: &str = "Z_36TRANSACTIONS";
    pub const TAG: &str = "Z_35TAGS";
}

/// Columns known to hold the primary key of another row. Safe delete refuses
/// to remove a row that any of these still point at.
pub const KNOWN_REFERENCES: &[(&str, &str)] = &[
    (SYNC_OBJECT_TABLE, transaction::ACCOUNT),
    (SYNC_OBJECT_TABLE, transaction::PAYEE),
    (SYNC_OBJECT_TABLE, category::PARENT),
    (SYNC_OBJECT_TABLE, holding::ACCOUNT),
    (SYNC_OBJECT_TABLE, transaction::ORIGINAL_TRANSACTION),
    (CATEGORY_ASSIGNMENT_TABLE, category_assignment::CATEGORY),
    (CATEGORY_ASSIGNMENT_TABLE, category_assignment::TRANSACTION),
    (TAG_LINK_TABLE, tag_link::TAG),
    (TAG_LINK_TABLE, tag_link::TRANSACTION),
];
