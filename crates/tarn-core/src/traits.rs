//! Trait interfaces for the Tarn ledger.
//!
//! These traits define the contracts between crates:
//! - [`RatesCalculator`] — utilization-to-rate curve (tarn-accrual implements)
//! - [`BorrowersRegistry`] — borrow authorization and cross-pool exposure
//!   aggregation (tarn-pool ships a permissive implementation)

use crate::error::RateError;
use crate::types::{AccountId, Amount, RatePair};

/// Pure mapping from pool utilization to deposit and borrow rates.
///
/// Utilization is `total_borrowed / total_deposited`, 0 when nothing is
/// deposited. Implementations must return non-negative rates that are
/// non-decreasing in utilization with `deposit_rate <= borrow_rate`; the
/// spread between the two funds the pool surplus.
pub trait RatesCalculator: Send + Sync {
    /// Per-annum deposit and borrow rates for the given pool totals,
    /// fixed-point against `ACCRUAL_PRECISION`.
    fn rates(&self, total_borrowed: Amount, total_deposited: Amount) -> Result<RatePair, RateError>;
}

/// Borrow authorization and exposure aggregation across pools.
///
/// Consulted by the pool on every `borrow`/`repay`: first as a capability
/// check, then as a side-channel total. The registry's internal policy is
/// outside the ledger's scope.
pub trait BorrowersRegistry: Send + Sync {
    /// Whether the account is authorized to draw pooled liquidity.
    fn can_borrow(&self, account: &AccountId) -> bool;

    /// Record principal drawn by an account.
    fn record_borrow(&self, account: &AccountId, amount: Amount);

    /// Record principal repaid by an account.
    fn record_repay(&self, account: &AccountId, amount: Amount);

    /// Aggregate outstanding principal across all accounts and pools.
    fn total_exposure(&self) -> Amount;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ACCRUAL_PRECISION;

    // ------------------------------------------------------------------
    // Mock: RatesCalculator with fixed rates
    // ------------------------------------------------------------------

    struct FixedRatesCalculator {
        deposit_rate: u128,
        borrow_rate: u128,
    }

    impl RatesCalculator for FixedRatesCalculator {
        fn rates(&self, _total_borrowed: Amount, _total_deposited: Amount) -> Result<RatePair, RateError> {
            Ok(RatePair {
                deposit_rate: self.deposit_rate,
                borrow_rate: self.borrow_rate,
            })
        }
    }

    // ------------------------------------------------------------------
    // Mock: registry that denies everyone
    // ------------------------------------------------------------------

    struct ClosedRegistry;

    impl BorrowersRegistry for ClosedRegistry {
        fn can_borrow(&self, _account: &AccountId) -> bool {
            false
        }

        fn record_borrow(&self, _account: &AccountId, _amount: Amount) {}

        fn record_repay(&self, _account: &AccountId, _amount: Amount) {}

        fn total_exposure(&self) -> Amount {
            0
        }
    }

    #[test]
    fn fixed_calculator_ignores_totals() {
        let calc = FixedRatesCalculator {
            deposit_rate: ACCRUAL_PRECISION / 100,
            borrow_rate: ACCRUAL_PRECISION / 50,
        };
        let a = calc.rates(0, 0).unwrap();
        let b = calc.rates(500, 1_000).unwrap();
        assert_eq!(a, b);
        assert!(a.deposit_rate <= a.borrow_rate);
    }

    #[test]
    fn closed_registry_denies() {
        let reg = ClosedRegistry;
        assert!(!reg.can_borrow(&AccountId([7; 32])));
        assert_eq!(reg.total_exposure(), 0);
    }

    #[test]
    fn rates_calculator_as_dyn() {
        let calc = FixedRatesCalculator { deposit_rate: 0, borrow_rate: 0 };
        let dyn_calc: &dyn RatesCalculator = &calc;
        assert_eq!(dyn_calc.rates(1, 2).unwrap().borrow_rate, 0);
    }

    #[test]
    fn registry_as_dyn() {
        let reg = ClosedRegistry;
        let dyn_reg: &dyn BorrowersRegistry = &reg;
        assert!(!dyn_reg.can_borrow(&AccountId::ZERO));
    }
}
