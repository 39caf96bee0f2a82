//! Core ledger types: accounts, positions, rates.
//!
//! All monetary values are in base units (1 token = 10^8 base units).
//! Accrual accumulators are `u128` fixed-point with denominator
//! [`ACCRUAL_PRECISION`](crate::constants::ACCRUAL_PRECISION).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::MathError;
use crate::math::mul_div_u64;

/// Monetary amount in base units.
pub type Amount = u64;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Fixed-point value with denominator `ACCRUAL_PRECISION`.
pub type Fixed = u128;

/// A 32-byte opaque participant identifier.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    /// The zero account. Used as the "nobody" sentinel in tests.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create an AccountId from a byte array.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if this is the zero account.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 32]> for AccountId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for AccountId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A principal recorded against an index snapshot.
///
/// The current value is `principal * current_index / snapshot`. Positions are
/// created lazily on first activity and never removed; a zero principal is a
/// valid terminal state.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Position {
    /// Value recorded at the last index snapshot, before further accrual.
    pub principal: Amount,
    /// Index value at the time the principal was recorded.
    pub snapshot: Fixed,
}

impl Position {
    /// An empty position recorded against the given index snapshot.
    pub fn empty(snapshot: Fixed) -> Self {
        Self { principal: 0, snapshot }
    }

    /// Current value of the position at the given index value, truncating.
    ///
    /// Truncation under-counts by at most one base unit per call and never
    /// over-counts.
    pub fn value_at(&self, index_value: Fixed) -> Result<Amount, MathError> {
        if self.principal == 0 {
            return Ok(0);
        }
        if self.snapshot == 0 {
            return Err(MathError::DivisionByZero);
        }
        mul_div_u64(self.principal, index_value, self.snapshot)
    }
}

/// Deposit and borrow rates produced by a rates calculator, per annum,
/// fixed-point against `ACCRUAL_PRECISION`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RatePair {
    pub deposit_rate: Fixed,
    pub borrow_rate: Fixed,
}
