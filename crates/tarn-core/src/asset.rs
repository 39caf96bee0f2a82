//! Fungible-asset interface and in-memory ledger.
//!
//! Provides the [`FungibleAsset`] trait for the value transfers the pool and
//! reward stream perform, and the [`TokenLedger`] in-memory implementation
//! backing both the deposit asset and the reward asset. Transfers are
//! all-or-nothing: insufficient balance or allowance fails the call with no
//! partial movement.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::AssetError;
use crate::types::{AccountId, Amount};

/// Standard fungible-asset operations.
///
/// Mutating methods take `&mut self`; callers serialize access through a
/// single lock per asset (see [`SharedAsset`]).
pub trait FungibleAsset: Send + Sync {
    /// Current balance of an account.
    fn balance_of(&self, account: &AccountId) -> Amount;

    /// Remaining amount `spender` may move out of `owner`'s balance.
    fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Amount;

    /// Set the allowance of `spender` over `owner`'s balance. Overwrites any
    /// prior allowance.
    fn approve(&mut self, owner: &AccountId, spender: &AccountId, amount: Amount);

    /// Move `amount` from `from` to `to`. A zero amount is a no-op success.
    fn transfer(&mut self, from: &AccountId, to: &AccountId, amount: Amount)
    -> Result<(), AssetError>;

    /// Move `amount` from `from` to `to` on behalf of `spender`, consuming
    /// allowance.
    fn transfer_from(
        &mut self,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), AssetError>;
}

/// An asset shared between a pool, its reward stream, and external callers.
pub type SharedAsset = Arc<Mutex<dyn FungibleAsset>>;

/// In-memory fungible-asset ledger.
///
/// Suitable for tests and single-process deployments; production integrations
/// implement [`FungibleAsset`] over the real transfer substrate.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TokenLedger {
    balances: HashMap<AccountId, Amount>,
    allowances: HashMap<(AccountId, AccountId), Amount>,
    total_issued: Amount,
}

impl TokenLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue new units to an account.
    pub fn mint(&mut self, to: &AccountId, amount: Amount) -> Result<(), AssetError> {
        let total = self
            .total_issued
            .checked_add(amount)
            .ok_or(AssetError::SupplyOverflow)?;
        let balance = self
            .balances
            .get(to)
            .copied()
            .unwrap_or(0)
            .checked_add(amount)
            .ok_or(AssetError::SupplyOverflow)?;
        self.total_issued = total;
        self.balances.insert(*to, balance);
        Ok(())
    }

    /// Total units ever issued.
    pub fn total_issued(&self) -> Amount {
        self.total_issued
    }

    fn debit(&mut self, from: &AccountId, amount: Amount) -> Result<(), AssetError> {
        let have = self.balances.get(from).copied().unwrap_or(0);
        if have < amount {
            return Err(AssetError::InsufficientBalance { have, need: amount });
        }
        self.balances.insert(*from, have - amount);
        Ok(())
    }

    fn credit(&mut self, to: &AccountId, amount: Amount) {
        // Credits cannot overflow: the debited total never exceeds total_issued.
        let balance = self.balances.get(to).copied().unwrap_or(0) + amount;
        self.balances.insert(*to, balance);
    }
}

impl FungibleAsset for TokenLedger {
    fn balance_of(&self, account: &AccountId) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Amount {
        self.allowances.get(&(*owner, *spender)).copied().unwrap_or(0)
    }

    fn approve(&mut self, owner: &AccountId, spender: &AccountId, amount: Amount) {
        self.allowances.insert((*owner, *spender), amount);
    }

    fn transfer(&mut self, from: &AccountId, to: &AccountId, amount: Amount)
    -> Result<(), AssetError> {
        if amount == 0 {
            return Ok(());
        }
        self.debit(from, amount)?;
        self.credit(to, amount);
        Ok(())
    }

    fn transfer_from(
        &mut self,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), AssetError> {
        if amount == 0 {
            return Ok(());
        }
        let allowed = self.allowance(from, spender);
        if allowed < amount {
            return Err(AssetError::InsufficientAllowance { have: allowed, need: amount });
        }
        self.debit(from, amount)?;
        self.credit(to, amount);
        self.allowances.insert((*from, *spender), allowed - amount);
        Ok(())
    }
}
