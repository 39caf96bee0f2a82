//! Proportional reward stream.
//!
//! Implements the reward-per-unit-stake, time-integrated distribution: a
//! funded epoch streams `reward_rate` units per second, split among stakers
//! in proportion to their staked balance. The owning pool pushes stake
//! changes explicitly through [`stake_for`](RewardStream::stake_for) /
//! [`withdraw_for`](RewardStream::withdraw_for); the stream never infers
//! balances on its own.
//!
//! All methods take `now` explicitly — the stream holds no clock and is a
//! pure function of `now` and its stored checkpoints. All division truncates
//! toward zero, so rounding only ever under-distributes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tarn_core::asset::{FungibleAsset, SharedAsset};
use tarn_core::constants::ACCRUAL_PRECISION;
use tarn_core::error::{MathError, RewardError};
use tarn_core::math::{mul_div, mul_div_u64};
use tarn_core::types::{AccountId, Amount, Fixed, Timestamp};

/// Per-account reward bookkeeping.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Stake {
    /// Mirror of the account's pool-share balance, pushed by the pool.
    pub staked: Amount,
    /// Reward-per-token already credited to `accrued`.
    pub reward_per_token_paid: Fixed,
    /// Rewards earned but not yet claimed.
    pub accrued: Amount,
}

/// Persistable snapshot of a reward stream's ledger state.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct RewardStreamState {
    pub duration: u64,
    pub period_finish: Timestamp,
    /// Base units times `ACCRUAL_PRECISION` per second.
    pub reward_rate: Fixed,
    pub last_update: Timestamp,
    pub reward_per_token_stored: Fixed,
    pub total_staked: Amount,
    /// Sorted by account for deterministic encoding.
    pub stakes: Vec<(AccountId, Stake)>,
}

/// A Synthetix-style streaming reward distributor for one pool.
pub struct RewardStream {
    /// The stream's own account in the reward asset ledger.
    address: AccountId,
    /// The only caller allowed to move stake or trigger claims.
    pool: AccountId,
    /// The only caller allowed to configure epochs.
    owner: AccountId,
    reward_asset: SharedAsset,
    duration: u64,
    period_finish: Timestamp,
    reward_rate: Fixed,
    last_update: Timestamp,
    reward_per_token_stored: Fixed,
    total_staked: Amount,
    stakes: HashMap<AccountId, Stake>,
}

impl RewardStream {
    /// Create an unfunded stream. No rewards accrue until an epoch is
    /// configured via [`set_rewards_duration`](Self::set_rewards_duration)
    /// and [`notify_reward_amount`](Self::notify_reward_amount).
    pub fn new(
        address: AccountId,
        pool: AccountId,
        owner: AccountId,
        reward_asset: SharedAsset,
    ) -> Self {
        Self {
            address,
            pool,
            owner,
            reward_asset,
            duration: 0,
            period_finish: 0,
            reward_rate: 0,
            last_update: 0,
            reward_per_token_stored: 0,
            total_staked: 0,
            stakes: HashMap::new(),
        }
    }

    pub fn address(&self) -> &AccountId {
        &self.address
    }

    pub fn reward_rate(&self) -> Fixed {
        self.reward_rate
    }

    pub fn period_finish(&self) -> Timestamp {
        self.period_finish
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn total_staked(&self) -> Amount {
        self.total_staked
    }

    /// The stake mirror for an account (zero if never staked).
    pub fn staked_balance(&self, account: &AccountId) -> Amount {
        self.stakes.get(account).map(|s| s.staked).unwrap_or(0)
    }

    fn require_pool(&self, caller: &AccountId) -> Result<(), RewardError> {
        if caller != &self.pool {
            return Err(RewardError::Unauthorized("pool"));
        }
        Ok(())
    }

    fn require_owner(&self, caller: &AccountId) -> Result<(), RewardError> {
        if caller != &self.owner {
            return Err(RewardError::Unauthorized("owner"));
        }
        Ok(())
    }

    /// Cumulative reward per staked unit at `now`, fixed-point.
    ///
    /// Unchanged while nobody is staked: reward for empty intervals is never
    /// distributed and stays in the reserve.
    pub fn reward_per_token(&self, now: Timestamp) -> Result<Fixed, MathError> {
        if self.total_staked == 0 {
            return Ok(self.reward_per_token_stored);
        }
        let applicable = now.min(self.period_finish);
        if applicable <= self.last_update {
            return Ok(self.reward_per_token_stored);
        }
        let elapsed = (applicable - self.last_update) as u128;
        let accrued = mul_div(elapsed, self.reward_rate, self.total_staked as u128)?;
        self.reward_per_token_stored
            .checked_add(accrued)
            .ok_or(MathError::Overflow)
    }

    /// Rewards claimable by `account` at `now`. Read-only.
    pub fn earned(&self, account: &AccountId, now: Timestamp) -> Result<Amount, MathError> {
        let Some(entry) = self.stakes.get(account) else {
            return Ok(0);
        };
        let rpt = self.reward_per_token(now)?;
        let fresh = mul_div_u64(
            entry.staked,
            rpt.saturating_sub(entry.reward_per_token_paid),
            ACCRUAL_PRECISION,
        )?;
        entry.accrued.checked_add(fresh).ok_or(MathError::Overflow)
    }

    /// Fold elapsed accrual into stored state; with an account, also settle
    /// that account's earned rewards at its pre-mutation stake.
    fn checkpoint(&mut self, account: Option<&AccountId>, now: Timestamp) -> Result<(), MathError> {
        let rpt = self.reward_per_token(now)?;
        self.reward_per_token_stored = rpt;
        let applicable = now.min(self.period_finish);
        if applicable > self.last_update {
            self.last_update = applicable;
        }
        if let Some(account) = account {
            let entry = self.stakes.entry(*account).or_default();
            let fresh = mul_div_u64(
                entry.staked,
                rpt.saturating_sub(entry.reward_per_token_paid),
                ACCRUAL_PRECISION,
            )?;
            entry.accrued = entry.accrued.checked_add(fresh).ok_or(MathError::Overflow)?;
            entry.reward_per_token_paid = rpt;
        }
        Ok(())
    }

    /// Pool-only: raise an account's stake mirror by `amount`.
    pub fn stake_for(
        &mut self,
        caller: &AccountId,
        account: &AccountId,
        amount: Amount,
        now: Timestamp,
    ) -> Result<(), RewardError> {
        self.require_pool(caller)?;
        self.checkpoint(Some(account), now)?;
        let total = self
            .total_staked
            .checked_add(amount)
            .ok_or(MathError::Overflow)?;
        let entry = self.stakes.entry(*account).or_default();
        entry.staked = entry.staked.checked_add(amount).ok_or(MathError::Overflow)?;
        self.total_staked = total;
        Ok(())
    }

    /// Pool-only: lower an account's stake mirror by up to `amount`.
    ///
    /// The pool passes indexed pre-mutation balances, which may exceed the
    /// stake recorded before interest accrual; the adjustment is clamped to
    /// the recorded stake and the applied amount returned, keeping
    /// `total_staked` equal to the sum of stakes.
    pub fn withdraw_for(
        &mut self,
        caller: &AccountId,
        account: &AccountId,
        amount: Amount,
        now: Timestamp,
    ) -> Result<Amount, RewardError> {
        self.require_pool(caller)?;
        self.checkpoint(Some(account), now)?;
        let entry = self.stakes.entry(*account).or_default();
        let applied = amount.min(entry.staked);
        entry.staked -= applied;
        self.total_staked -= applied;
        Ok(applied)
    }

    /// Pool-only: settle and pay out an account's accrued rewards.
    ///
    /// Returns the amount transferred; zero is a valid, non-error result.
    pub fn claim(
        &mut self,
        caller: &AccountId,
        account: &AccountId,
        now: Timestamp,
    ) -> Result<Amount, RewardError> {
        self.require_pool(caller)?;
        self.checkpoint(Some(account), now)?;
        let entry = self.stakes.entry(*account).or_default();
        let amount = entry.accrued;
        entry.accrued = 0;
        if amount > 0 {
            self.reward_asset.lock().transfer(&self.address, account, amount)?;
            debug!("reward claim: {} paid {} units", account, amount);
        }
        Ok(amount)
    }

    /// Owner-only: store the epoch length used by the next
    /// [`notify_reward_amount`](Self::notify_reward_amount).
    ///
    /// Locked while an epoch is running.
    pub fn set_rewards_duration(
        &mut self,
        caller: &AccountId,
        new_duration: u64,
        now: Timestamp,
    ) -> Result<(), RewardError> {
        self.require_owner(caller)?;
        if now < self.period_finish {
            return Err(RewardError::DurationLocked { remaining: self.period_finish - now });
        }
        if new_duration == 0 {
            return Err(RewardError::InvalidDuration);
        }
        self.duration = new_duration;
        info!("reward duration set to {}s", new_duration);
        Ok(())
    }

    /// Owner-only: start (or top up) a reward epoch of `duration` seconds.
    ///
    /// Leftover from an unfinished epoch is folded into the new rate. The
    /// committed total must be covered by the reward-asset balance the
    /// stream currently holds; the engine never promises more than it can
    /// pay.
    pub fn notify_reward_amount(
        &mut self,
        caller: &AccountId,
        amount: Amount,
        now: Timestamp,
    ) -> Result<(), RewardError> {
        self.require_owner(caller)?;
        if self.duration == 0 {
            return Err(RewardError::InvalidDuration);
        }
        self.checkpoint(None, now)?;

        let scaled = (amount as u128)
            .checked_mul(ACCRUAL_PRECISION)
            .ok_or(MathError::Overflow)?;
        let rate = if now >= self.period_finish {
            scaled / self.duration as u128
        } else {
            let remaining = (self.period_finish - now) as u128;
            let leftover = remaining
                .checked_mul(self.reward_rate)
                .ok_or(MathError::Overflow)?;
            scaled.checked_add(leftover).ok_or(MathError::Overflow)? / self.duration as u128
        };

        let committed = mul_div(rate, self.duration as u128, ACCRUAL_PRECISION)?;
        let held = self.reward_asset.lock().balance_of(&self.address);
        if committed > held as u128 {
            return Err(RewardError::RewardOvercommit {
                committed: u64::try_from(committed).unwrap_or(u64::MAX),
                held,
            });
        }

        self.reward_rate = rate;
        self.period_finish = now + self.duration;
        self.last_update = now;
        info!(
            "reward epoch: {} units over {}s, finishes at {}",
            amount, self.duration, self.period_finish
        );
        Ok(())
    }

    /// Snapshot the ledger state for persistence.
    pub fn snapshot(&self) -> RewardStreamState {
        let mut stakes: Vec<(AccountId, Stake)> =
            self.stakes.iter().map(|(a, s)| (*a, *s)).collect();
        stakes.sort_by_key(|(a, _)| *a);
        RewardStreamState {
            duration: self.duration,
            period_finish: self.period_finish,
            reward_rate: self.reward_rate,
            last_update: self.last_update,
            reward_per_token_stored: self.reward_per_token_stored,
            total_staked: self.total_staked,
            stakes,
        }
    }

    /// Replace the ledger state from a snapshot. Collaborator wiring
    /// (addresses, reward asset) is unchanged.
    pub fn restore(&mut self, state: RewardStreamState) {
        self.duration = state.duration;
        self.period_finish = state.period_finish;
        self.reward_rate = state.reward_rate;
        self.last_update = state.last_update;
        self.reward_per_token_stored = state.reward_per_token_stored;
        self.total_staked = state.total_staked;
        self.stakes = state.stakes.into_iter().collect();
    }
}
