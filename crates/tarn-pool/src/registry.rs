//! Permissive borrowers registry.
//!
//! Authorizes every account and aggregates outstanding principal per account
//! and in total. Sufficient for single-pool deployments and tests; gated
//! registries implement [`BorrowersRegistry`] with their own policy.

use std::collections::HashMap;

use parking_lot::Mutex;

use tarn_core::traits::BorrowersRegistry;
use tarn_core::types::{AccountId, Amount};

#[derive(Debug, Default)]
struct Book {
    per_account: HashMap<AccountId, Amount>,
    total: Amount,
}

/// A registry that lets anyone borrow.
#[derive(Debug, Default)]
pub struct OpenBorrowersRegistry {
    book: Mutex<Book>,
}

impl OpenBorrowersRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outstanding principal recorded for one account.
    pub fn exposure_of(&self, account: &AccountId) -> Amount {
        self.book.lock().per_account.get(account).copied().unwrap_or(0)
    }
}

impl BorrowersRegistry for OpenBorrowersRegistry {
    fn can_borrow(&self, _account: &AccountId) -> bool {
        true
    }

    fn record_borrow(&self, account: &AccountId, amount: Amount) {
        let mut book = self.book.lock();
        let entry = book.per_account.entry(*account).or_insert(0);
        *entry = entry.saturating_add(amount);
        book.total = book.total.saturating_add(amount);
    }

    fn record_repay(&self, account: &AccountId, amount: Amount) {
        let mut book = self.book.lock();
        let entry = book.per_account.entry(*account).or_insert(0);
        *entry = entry.saturating_sub(amount);
        book.total = book.total.saturating_sub(amount);
    }

    fn total_exposure(&self) -> Amount {
        self.book.lock().total
    }
}
