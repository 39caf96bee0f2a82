//! The pool ledger.
//!
//! Tracks depositor shares and borrower debt against two linear compounding
//! indices, and mirrors every share change into the reward stream. Totals
//! are themselves indexed positions, so the conservation invariant
//! `sum(balances) == total_deposited` holds through accrual, not only at
//! principal changes.
//!
//! Every balance-mutating operation follows one discipline:
//!
//! 1. read `now` from the clock, exactly once
//! 2. validate on read-only projections (amounts, balances, allowances,
//!    liquidity) — failures abort before any state changes
//! 3. checkpoint both indices
//! 4. unstake the touched account(s) from the reward stream at their
//!    pre-mutation balances
//! 5. apply the principal delta and rebase the touched positions and totals
//!    to the fresh index
//! 6. restake at post-mutation balances
//! 7. move the asset leg (pre-validated, cannot fail)
//! 8. recompute rates from the post-mutation utilization
//!
//! Reward accrual is therefore always settled against the balance an account
//! held *before* the mutation, never after.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tarn_accrual::{LinearIndex, utilization};
use tarn_core::asset::{FungibleAsset, SharedAsset};
use tarn_core::clock::Clock;
use tarn_core::error::{MathError, PoolError};
use tarn_core::traits::{BorrowersRegistry, RatesCalculator};
use tarn_core::types::{AccountId, Amount, Fixed, Position, Timestamp};

use crate::rewarder::RewardStream;

/// Persistable snapshot of a pool's ledger state.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct PoolState {
    pub deposit_index: LinearIndex,
    pub borrow_index: LinearIndex,
    pub total_deposited: Position,
    pub total_borrowed: Position,
    /// Sorted by account for deterministic encoding.
    pub deposits: Vec<(AccountId, Position)>,
    pub borrows: Vec<(AccountId, Position)>,
    pub allowances: Vec<(AccountId, AccountId, Amount)>,
}

/// A shared liquidity pool over one fungible asset.
pub struct Pool {
    /// The pool's own account in the deposit asset ledger, and the
    /// capability presented to the reward stream's pool-only hooks.
    address: AccountId,
    deposit_asset: SharedAsset,
    rewarder: Arc<Mutex<RewardStream>>,
    registry: Arc<dyn BorrowersRegistry>,
    rates: Arc<dyn RatesCalculator>,
    clock: Arc<dyn Clock>,
    deposit_index: LinearIndex,
    borrow_index: LinearIndex,
    deposits: HashMap<AccountId, Position>,
    borrows: HashMap<AccountId, Position>,
    total_deposited: Position,
    total_borrowed: Position,
    allowances: HashMap<(AccountId, AccountId), Amount>,
}

impl Pool {
    /// Create an empty pool. Indices start at 1.0 with zero rates at the
    /// clock's current instant.
    pub fn new(
        address: AccountId,
        deposit_asset: SharedAsset,
        rewarder: Arc<Mutex<RewardStream>>,
        registry: Arc<dyn BorrowersRegistry>,
        rates: Arc<dyn RatesCalculator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now();
        let deposit_index = LinearIndex::new(now);
        let borrow_index = LinearIndex::new(now);
        let snapshot = deposit_index.stored_value();
        Self {
            address,
            deposit_asset,
            rewarder,
            registry,
            rates,
            clock,
            deposit_index,
            borrow_index,
            deposits: HashMap::new(),
            borrows: HashMap::new(),
            total_deposited: Position::empty(snapshot),
            total_borrowed: Position::empty(snapshot),
            allowances: HashMap::new(),
        }
    }

    pub fn address(&self) -> &AccountId {
        &self.address
    }

    // ------------------------------------------------------------------
    // Read-only projections
    // ------------------------------------------------------------------

    fn deposit_value_at(&self, account: &AccountId, now: Timestamp) -> Result<Amount, MathError> {
        match self.deposits.get(account) {
            Some(p) => p.value_at(self.deposit_index.value_at(now)?),
            None => Ok(0),
        }
    }

    fn borrow_value_at(&self, account: &AccountId, now: Timestamp) -> Result<Amount, MathError> {
        match self.borrows.get(account) {
            Some(p) => p.value_at(self.borrow_index.value_at(now)?),
            None => Ok(0),
        }
    }

    fn total_deposited_at(&self, now: Timestamp) -> Result<Amount, MathError> {
        self.total_deposited
            .value_at(self.deposit_index.value_at(now)?)
    }

    fn total_borrowed_at(&self, now: Timestamp) -> Result<Amount, MathError> {
        self.total_borrowed
            .value_at(self.borrow_index.value_at(now)?)
    }

    fn available_at(&self, now: Timestamp) -> Result<Amount, MathError> {
        // Truncation in the two totals can lag each other by a unit.
        Ok(self
            .total_deposited_at(now)?
            .saturating_sub(self.total_borrowed_at(now)?))
    }

    /// Current deposit balance of an account, interest included.
    pub fn balance_of(&self, account: &AccountId) -> Result<Amount, PoolError> {
        Ok(self.deposit_value_at(account, self.clock.now())?)
    }

    /// Current debt of an account, interest included.
    pub fn borrowed_of(&self, account: &AccountId) -> Result<Amount, PoolError> {
        Ok(self.borrow_value_at(account, self.clock.now())?)
    }

    /// Total deposited value, interest included.
    pub fn total_deposited(&self) -> Result<Amount, PoolError> {
        Ok(self.total_deposited_at(self.clock.now())?)
    }

    /// Total borrowed value, interest included.
    pub fn total_borrowed(&self) -> Result<Amount, PoolError> {
        Ok(self.total_borrowed_at(self.clock.now())?)
    }

    /// Liquidity currently available to withdraw or borrow.
    pub fn available_liquidity(&self) -> Result<Amount, PoolError> {
        Ok(self.available_at(self.clock.now())?)
    }

    /// Current utilization, fixed-point.
    pub fn utilization(&self) -> Result<Fixed, PoolError> {
        let now = self.clock.now();
        Ok(utilization(
            self.total_borrowed_at(now)?,
            self.total_deposited_at(now)?,
        )?)
    }

    /// The per-annum rate depositors currently accrue at.
    pub fn deposit_rate(&self) -> Fixed {
        self.deposit_index.rate_per_annum()
    }

    /// The per-annum rate borrowers currently pay.
    pub fn borrow_rate(&self) -> Fixed {
        self.borrow_index.rate_per_annum()
    }

    /// Remaining pool-share allowance of `spender` over `owner`'s balance.
    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Amount {
        self.allowances.get(&(*owner, *spender)).copied().unwrap_or(0)
    }

    /// Rewards currently claimable by an account. Read-only and idempotent:
    /// repeated calls with no elapsed time return the same value.
    pub fn check_rewards(&self, account: &AccountId) -> Result<Amount, PoolError> {
        let now = self.clock.now();
        Ok(self.rewarder.lock().earned(account, now)?)
    }

    // ------------------------------------------------------------------
    // Internal helpers
    // ------------------------------------------------------------------

    fn accrue(&mut self, now: Timestamp) -> Result<(), MathError> {
        self.deposit_index.checkpoint(now)?;
        self.borrow_index.checkpoint(now)?;
        Ok(())
    }

    /// Recompute both rates from post-mutation utilization. Checkpoints are
    /// already folded, so `set_rate` switches cleanly at `now`.
    fn update_rates(&mut self, now: Timestamp) -> Result<(), PoolError> {
        let deposited = self.total_deposited_at(now)?;
        let borrowed = self.total_borrowed_at(now)?;
        let pair = self.rates.rates(borrowed, deposited)?;
        self.deposit_index.set_rate(now, pair.deposit_rate)?;
        self.borrow_index.set_rate(now, pair.borrow_rate)?;
        Ok(())
    }

    /// Re-record a deposit position with `value` as principal against the
    /// current (checkpointed) index.
    fn rebase_deposit(&mut self, account: &AccountId, value: Amount) {
        self.deposits.insert(
            *account,
            Position { principal: value, snapshot: self.deposit_index.stored_value() },
        );
    }

    fn rebase_borrow(&mut self, account: &AccountId, value: Amount) {
        self.borrows.insert(
            *account,
            Position { principal: value, snapshot: self.borrow_index.stored_value() },
        );
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Deposit `amount` of the pool asset for `account`.
    ///
    /// The account must have approved the pool for at least `amount` in the
    /// deposit asset ledger.
    pub fn deposit(&mut self, account: &AccountId, amount: Amount) -> Result<(), PoolError> {
        if amount == 0 {
            return Err(PoolError::InvalidAmount);
        }
        let now = self.clock.now();

        {
            let asset = self.deposit_asset.lock();
            let have = asset.balance_of(account);
            if have < amount {
                return Err(PoolError::InsufficientBalance { have, need: amount });
            }
            let allowed = asset.allowance(account, &self.address);
            if allowed < amount {
                return Err(PoolError::InsufficientAllowance { have: allowed, need: amount });
            }
        }
        let pre = self.deposit_value_at(account, now)?;
        let post = pre.checked_add(amount).ok_or(MathError::Overflow)?;
        let pre_total = self.total_deposited_at(now)?;
        let post_total = pre_total.checked_add(amount).ok_or(MathError::Overflow)?;

        self.accrue(now)?;
        {
            let rewarder = Arc::clone(&self.rewarder);
            let mut rewarder = rewarder.lock();
            rewarder.withdraw_for(&self.address, account, pre, now)?;
            self.rebase_deposit(account, post);
            self.total_deposited =
                Position { principal: post_total, snapshot: self.deposit_index.stored_value() };
            rewarder.stake_for(&self.address, account, post, now)?;
        }
        let pool_addr = self.address;
        self.deposit_asset
            .lock()
            .transfer_from(&pool_addr, account, &pool_addr, amount)?;
        self.update_rates(now)?;

        debug!("deposit: {} +{} units (balance {})", account, amount, post);
        Ok(())
    }

    /// Withdraw `amount` of the pool asset to `account`.
    pub fn withdraw(&mut self, account: &AccountId, amount: Amount) -> Result<(), PoolError> {
        if amount == 0 {
            return Err(PoolError::InvalidAmount);
        }
        let now = self.clock.now();

        let pre = self.deposit_value_at(account, now)?;
        if amount > pre {
            return Err(PoolError::InsufficientBalance { have: pre, need: amount });
        }
        let available = self.available_at(now)?;
        if amount > available {
            return Err(PoolError::InsufficientLiquidity { available, requested: amount });
        }
        let held = self.deposit_asset.lock().balance_of(&self.address);
        if amount > held {
            return Err(PoolError::InsufficientLiquidity { available: held, requested: amount });
        }
        let pre_total = self.total_deposited_at(now)?;

        self.accrue(now)?;
        {
            let rewarder = Arc::clone(&self.rewarder);
            let mut rewarder = rewarder.lock();
            rewarder.withdraw_for(&self.address, account, pre, now)?;
            let post = pre - amount;
            self.rebase_deposit(account, post);
            self.total_deposited = Position {
                principal: pre_total.saturating_sub(amount),
                snapshot: self.deposit_index.stored_value(),
            };
            rewarder.stake_for(&self.address, account, post, now)?;
        }
        let pool_addr = self.address;
        self.deposit_asset
            .lock()
            .transfer(&pool_addr, account, amount)?;
        self.update_rates(now)?;

        debug!("withdraw: {} -{} units", account, amount);
        Ok(())
    }

    /// Move `amount` of pool shares from `from` to `to`.
    pub fn transfer(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), PoolError> {
        self.transfer_shares(from, to, amount)
    }

    /// Set the pool-share allowance of `spender` over `owner`'s balance.
    pub fn approve(&mut self, owner: &AccountId, spender: &AccountId, amount: Amount) {
        self.allowances.insert((*owner, *spender), amount);
        debug!("approve: {} allows {} up to {} units", owner, spender, amount);
    }

    /// Move `amount` of pool shares from `from` to `to` on behalf of
    /// `spender`, consuming share allowance.
    pub fn transfer_from(
        &mut self,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), PoolError> {
        let allowed = self.allowance(from, spender);
        if allowed < amount {
            return Err(PoolError::InsufficientAllowance { have: allowed, need: amount });
        }
        self.transfer_shares(from, to, amount)?;
        self.allowances.insert((*from, *spender), allowed - amount);
        Ok(())
    }

    fn transfer_shares(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), PoolError> {
        if amount == 0 {
            return Err(PoolError::InvalidAmount);
        }
        let now = self.clock.now();

        let pre_from = self.deposit_value_at(from, now)?;
        if amount > pre_from {
            return Err(PoolError::InsufficientBalance { have: pre_from, need: amount });
        }

        if from == to {
            // Value does not move, but the checkpoint discipline still runs
            // so reward accrual is settled at the pre-transfer balance.
            self.accrue(now)?;
            {
                let rewarder = Arc::clone(&self.rewarder);
                let mut rewarder = rewarder.lock();
                rewarder.withdraw_for(&self.address, from, pre_from, now)?;
                self.rebase_deposit(from, pre_from);
                rewarder.stake_for(&self.address, from, pre_from, now)?;
            }
            self.update_rates(now)?;
            return Ok(());
        }

        let pre_to = self.deposit_value_at(to, now)?;
        let post_to = pre_to.checked_add(amount).ok_or(MathError::Overflow)?;
        let post_from = pre_from - amount;

        self.accrue(now)?;
        {
            let rewarder = Arc::clone(&self.rewarder);
            let mut rewarder = rewarder.lock();
            rewarder.withdraw_for(&self.address, from, pre_from, now)?;
            rewarder.withdraw_for(&self.address, to, pre_to, now)?;
            self.rebase_deposit(from, post_from);
            self.rebase_deposit(to, post_to);
            rewarder.stake_for(&self.address, from, post_from, now)?;
            rewarder.stake_for(&self.address, to, post_to, now)?;
        }
        self.update_rates(now)?;

        debug!("transfer: {} -> {} {} units", from, to, amount);
        Ok(())
    }

    /// Draw `amount` of pooled liquidity as a registry-authorized borrower.
    ///
    /// Does not touch the reward stream — rewards track deposit shares only.
    pub fn borrow(&mut self, account: &AccountId, amount: Amount) -> Result<(), PoolError> {
        if amount == 0 {
            return Err(PoolError::InvalidAmount);
        }
        if !self.registry.can_borrow(account) {
            return Err(PoolError::Unauthorized("borrowers registry"));
        }
        let now = self.clock.now();

        let available = self.available_at(now)?;
        if amount > available {
            return Err(PoolError::InsufficientLiquidity { available, requested: amount });
        }
        let held = self.deposit_asset.lock().balance_of(&self.address);
        if amount > held {
            return Err(PoolError::InsufficientLiquidity { available: held, requested: amount });
        }
        let pre = self.borrow_value_at(account, now)?;
        let post = pre.checked_add(amount).ok_or(MathError::Overflow)?;
        let post_total = self
            .total_borrowed_at(now)?
            .checked_add(amount)
            .ok_or(MathError::Overflow)?;

        self.accrue(now)?;
        self.rebase_borrow(account, post);
        self.total_borrowed =
            Position { principal: post_total, snapshot: self.borrow_index.stored_value() };
        let pool_addr = self.address;
        self.deposit_asset
            .lock()
            .transfer(&pool_addr, account, amount)?;
        self.registry.record_borrow(account, amount);
        self.update_rates(now)?;

        debug!("borrow: {} +{} units (debt {})", account, amount, post);
        Ok(())
    }

    /// Repay up to the account's outstanding debt, interest included.
    ///
    /// Repaying more than owed is rejected; there is no over-repayment
    /// credit.
    pub fn repay(&mut self, account: &AccountId, amount: Amount) -> Result<(), PoolError> {
        if amount == 0 {
            return Err(PoolError::InvalidAmount);
        }
        let now = self.clock.now();

        let debt = self.borrow_value_at(account, now)?;
        if amount > debt {
            return Err(PoolError::InvalidAmount);
        }
        {
            let asset = self.deposit_asset.lock();
            let have = asset.balance_of(account);
            if have < amount {
                return Err(PoolError::InsufficientBalance { have, need: amount });
            }
            let allowed = asset.allowance(account, &self.address);
            if allowed < amount {
                return Err(PoolError::InsufficientAllowance { have: allowed, need: amount });
            }
        }
        let pre_total = self.total_borrowed_at(now)?;

        self.accrue(now)?;
        self.rebase_borrow(account, debt - amount);
        self.total_borrowed = Position {
            principal: pre_total.saturating_sub(amount),
            snapshot: self.borrow_index.stored_value(),
        };
        let pool_addr = self.address;
        self.deposit_asset
            .lock()
            .transfer_from(&pool_addr, account, &pool_addr, amount)?;
        self.registry.record_repay(account, amount);
        self.update_rates(now)?;

        debug!("repay: {} -{} units (debt {})", account, amount, debt - amount);
        Ok(())
    }

    /// Claim the account's accrued rewards out to its reward-asset balance.
    ///
    /// Returns the amount paid; zero is a valid result.
    pub fn get_rewards(&mut self, account: &AccountId) -> Result<Amount, PoolError> {
        let now = self.clock.now();
        Ok(self.rewarder.lock().claim(&self.address, account, now)?)
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Snapshot the ledger state for persistence.
    pub fn snapshot(&self) -> PoolState {
        let mut deposits: Vec<(AccountId, Position)> =
            self.deposits.iter().map(|(a, p)| (*a, *p)).collect();
        deposits.sort_by_key(|(a, _)| *a);
        let mut borrows: Vec<(AccountId, Position)> =
            self.borrows.iter().map(|(a, p)| (*a, *p)).collect();
        borrows.sort_by_key(|(a, _)| *a);
        let mut allowances: Vec<(AccountId, AccountId, Amount)> = self
            .allowances
            .iter()
            .map(|((o, s), v)| (*o, *s, *v))
            .collect();
        allowances.sort();

        PoolState {
            deposit_index: self.deposit_index,
            borrow_index: self.borrow_index,
            total_deposited: self.total_deposited,
            total_borrowed: self.total_borrowed,
            deposits,
            borrows,
            allowances,
        }
    }

    /// Replace the ledger state from a snapshot. Collaborator wiring is
    /// unchanged.
    pub fn restore(&mut self, state: PoolState) {
        self.deposit_index = state.deposit_index;
        self.borrow_index = state.borrow_index;
        self.total_deposited = state.total_deposited;
        self.total_borrowed = state.total_borrowed;
        self.deposits = state.deposits.into_iter().collect();
        self.borrows = state.borrows.into_iter().collect();
        self.allowances = state
            .allowances
            .into_iter()
            .map(|(o, s, v)| ((o, s), v))
            .collect();
    }
}
