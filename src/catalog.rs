//! Typed, read-only views over a loaded database.
//!
//! Every row is read once and sorted into its variant; the managers below are
//! plain lookups over those caches.

use std::collections::{BTreeMap, HashSet};

use moneywiz_core::{
    Account, Category, CategoryAssignment, InvestmentHolding, Payee, RawRecord, Record, Tag, TagLink,
    Transaction,
};
use rust_decimal::Decimal;
use time::OffsetDateTime;

use crate::storage::{SchemaSource, StorageError};

/// Number of rows per manager.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub users: usize,
    pub accounts: usize,
    pub categories: usize,
    pub payees: usize,
    pub tags: usize,
    pub transactions: usize,
    pub holdings: usize,
    pub other: usize,
    pub category_assignments: usize,
    pub tag_links: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    users: BTreeMap<i64, String>,
    accounts: BTreeMap<i64, Account>,
    categories: BTreeMap<i64, Category>,
    payees: BTreeMap<i64, Payee>,
    tags: BTreeMap<i64, Tag>,
    transactions: BTreeMap<i64, Transaction>,
    holdings: BTreeMap<i64, InvestmentHolding>,
    other: BTreeMap<i64, RawRecord>,
    assignments: Vec<CategoryAssignment>,
    tag_links: Vec<TagLink>,
}

impl Catalog {
    pub fn load(source: &dyn SchemaSource) -> Result<Self, StorageError> {
        let types = source.type_table();
        let mut catalog = Catalog {
            users: source.users()?,
            assignments: source.category_assignments()?,
            tag_links: source.tag_links()?,
            ..Default::default()
        };

        for raw in source.records()? {
            let (id, kind) = (raw.id, types.kind_for(raw.ent));
            match Record::from_raw(raw, kind) {
                Record::Account(a) => {
                    catalog.accounts.insert(id, a);
                }
                Record::Category(c) => {
                    catalog.categories.insert(id, c);
                }
                Record::Payee(p) => {
                    catalog.payees.insert(id, p);
                }
                Record::Tag(t) => {
                    catalog.tags.insert(id, t);
                }
                Record::Transaction(t) => {
                    catalog.transactions.insert(id, t);
                }
                Record::InvestmentHolding(h) => {
                    catalog.holdings.insert(id, h);
                }
                Record::Other(r) => {
                    catalog.other.insert(id, r);
                }
            }
        }

        tracing::debug!(
            accounts = catalog.accounts.len(),
            transactions = catalog.transactions.len(),
            "Catalog loaded"
        );
        Ok(catalog)
    }

    pub fn users(&self) -> &BTreeMap<i64, String> {
        &self.users
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn accounts_for_user(&self, user: i64) -> Vec<&Account> {
        self.accounts.values().filter(|a| a.user == Some(user)).collect()
    }

    pub fn account(&self, id: i64) -> Option<&Account> {
        self.accounts.get(&id)
    }

    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.values()
    }

    pub fn categories_for_user(&self, user: i64) -> Vec<&Category> {
        self.categories.values().filter(|c| c.user == Some(user)).collect()
    }

    pub fn category(&self, id: i64) -> Option<&Category> {
        self.categories.get(&id)
    }

    /// Names from the root category down to `id`. A parent cycle stops at
    /// the first category seen twice.
    pub fn name_chain(&self, id: i64) -> Vec<&str> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.categories.get(&id);
        while let Some(category) = current {
            if !seen.insert(category.id) {
                break;
            }
            chain.push(category.name.as_str());
            current = category.parent.and_then(|p| self.categories.get(&p));
        }
        chain.reverse();
        chain
    }

    pub fn payees(&self) -> impl Iterator<Item = &Payee> {
        self.payees.values()
    }

    pub fn payees_for_user(&self, user: i64) -> Vec<&Payee> {
        self.payees.values().filter(|p| p.user == Some(user)).collect()
    }

    pub fn payee(&self, id: i64) -> Option<&Payee> {
        self.payees.get(&id)
    }

    /// First payee of `user` whose name is exactly `name`.
    /// Exact name match; a `None` user matches payees without one.
    pub fn find_payee(&self, user: Option<i64>, name: &str) -> Option<&Payee> {
        self.payees.values().find(|p| p.user == user && p.name == name)
    }

    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.tags.values()
    }

    pub fn tags_for_user(&self, user: i64) -> Vec<&Tag> {
        self.tags.values().filter(|t| t.user == Some(user)).collect()
    }

    pub fn tag(&self, id: i64) -> Option<&Tag> {
        self.tags.get(&id)
    }

    pub fn transaction(&self, id: i64) -> Option<&Transaction> {
        self.transactions.get(&id)
    }

    /// Transactions dated at or before `until`, oldest first. Undated rows
    /// sort ahead of dated ones.
    pub fn transactions(&self, until: OffsetDateTime) -> Vec<&Transaction> {
        self.sorted_transactions(|_| true, until)
    }

    pub fn transactions_for_account(&self, account: i64, until: OffsetDateTime) -> Vec<&Transaction> {
        self.sorted_transactions(|t| t.account == Some(account), until)
    }

    /// Every transaction whose payee is `payee`, by id.
    pub fn transactions_for_payee(&self, payee: i64) -> Vec<&Transaction> {
        self.transactions.values().filter(|t| t.payee == Some(payee)).collect()
    }

    fn sorted_transactions<F>(&self, keep: F, until: OffsetDateTime) -> Vec<&Transaction>
    where
        F: Fn(&Transaction) -> bool,
    {
        let mut rows: Vec<&Transaction> = self
            .transactions
            .values()
            .filter(|t| keep(t))
            .filter(|t| t.datetime.map_or(true, |d| d <= until))
            .collect();
        rows.sort_by_key(|t| (t.datetime, t.id));
        rows
    }

    pub fn categories_for_transaction(&self, tx: i64) -> Vec<(&Category, Decimal)> {
        self.assignments
            .iter()
            .filter(|a| a.transaction == tx)
            .filter_map(|a| self.categories.get(&a.category).map(|c| (c, a.amount)))
            .collect()
    }

    pub fn tags_for_transaction(&self, tx: i64) -> Vec<&Tag> {
        self.tag_links
            .iter()
            .filter(|l| l.transaction == tx)
            .filter_map(|l| self.tags.get(&l.tag))
            .collect()
    }

    pub fn holdings_for_account(&self, account: i64) -> Vec<&InvestmentHolding> {
        self.holdings.values().filter(|h| h.account == Some(account)).collect()
    }

    pub fn summary(&self) -> Summary {
        Summary {
            users: self.users.len(),
            accounts: self.accounts.len(),
            categories: self.categories.len(),
            payees: self.payees.len(),
            tags: self.tags.len(),
            transactions: self.transactions.len(),
            holdings: self.holdings.len(),
            other: self.other.len(),
            category_assignments: self.assignments.len(),
            tag_links: self.tag_links.len(),
        }
    }
}
