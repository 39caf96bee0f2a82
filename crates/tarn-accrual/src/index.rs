//! Linear compounding index.
//!
//! The index is a monotonically non-decreasing factor converting a principal
//! recorded at some snapshot into its current accrued value:
//! `current = stored * (1 + rate * elapsed / SECONDS_PER_YEAR)`.
//!
//! Compounding is linear between checkpoints; every rate change folds the
//! accrual earned at the old rate into storage first, so the growth path is
//! piecewise linear and order-independent for a fixed checkpoint schedule.

use serde::{Deserialize, Serialize};

use tarn_core::constants::{ACCRUAL_PRECISION, SECONDS_PER_YEAR};
use tarn_core::error::MathError;
use tarn_core::math::{mul_div, mul_div_u64};
use tarn_core::types::{Amount, Fixed, Timestamp};

/// A compounding accrual accumulator.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct LinearIndex {
    stored_value: Fixed,
    rate_per_annum: Fixed,
    last_update: Timestamp,
}

impl LinearIndex {
    /// Create a fresh index at 1.0 with a zero rate.
    pub fn new(start: Timestamp) -> Self {
        Self {
            stored_value: ACCRUAL_PRECISION,
            rate_per_annum: 0,
            last_update: start,
        }
    }

    /// The last stored index value (accrual up to `last_update` folded in).
    pub fn stored_value(&self) -> Fixed {
        self.stored_value
    }

    /// The current per-annum rate.
    pub fn rate_per_annum(&self) -> Fixed {
        self.rate_per_annum
    }

    /// The instant accrual was last folded into storage.
    pub fn last_update(&self) -> Timestamp {
        self.last_update
    }

    /// Read-only projection of the index value at `now`.
    ///
    /// Instants at or before `last_update` project the stored value
    /// unchanged; the index never moves backwards.
    pub fn value_at(&self, now: Timestamp) -> Result<Fixed, MathError> {
        if now <= self.last_update || self.rate_per_annum == 0 {
            return Ok(self.stored_value);
        }
        let elapsed = (now - self.last_update) as u128;
        let accrued = self
            .rate_per_annum
            .checked_mul(elapsed)
            .ok_or(MathError::Overflow)?
            / SECONDS_PER_YEAR as u128;
        let factor = ACCRUAL_PRECISION
            .checked_add(accrued)
            .ok_or(MathError::Overflow)?;
        mul_div(self.stored_value, factor, ACCRUAL_PRECISION)
    }

    /// Fold elapsed-time accrual into storage.
    ///
    /// Must be called before any rate change or principal change that
    /// depends on the current value.
    pub fn checkpoint(&mut self, now: Timestamp) -> Result<(), MathError> {
        self.stored_value = self.value_at(now)?;
        if now > self.last_update {
            self.last_update = now;
        }
        Ok(())
    }

    /// Checkpoint at `now`, then switch to `rate`.
    pub fn set_rate(&mut self, now: Timestamp, rate: Fixed) -> Result<(), MathError> {
        self.checkpoint(now)?;
        self.rate_per_annum = rate;
        Ok(())
    }

    /// Current value of `principal` recorded at `snapshot`, truncating.
    ///
    /// Truncation under-counts by at most one base unit per call and never
    /// over-counts.
    pub fn indexed_value(
        &self,
        principal: Amount,
        snapshot: Fixed,
        now: Timestamp,
    ) -> Result<Amount, MathError> {
        if principal == 0 {
            return Ok(0);
        }
        if snapshot == 0 {
            return Err(MathError::DivisionByZero);
        }
        mul_div_u64(principal, self.value_at(now)?, snapshot)
    }
}
