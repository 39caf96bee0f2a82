//! Kinked utilization rate curve.
//!
//! Borrow rate is piecewise linear in utilization with a single kink; the
//! deposit rate is the borrow rate scaled by utilization minus the pool
//! spread, so depositors earn exactly what borrowers pay less the retained
//! share. Curve parameters are deployment configuration, not protocol rules.

use serde::{Deserialize, Serialize};

use tarn_core::constants::{
    ACCRUAL_PRECISION, BPS_PRECISION, DEFAULT_BASE_RATE, DEFAULT_DEPOSIT_SPREAD_BPS, DEFAULT_KINK,
    DEFAULT_SLOPE_1, DEFAULT_SLOPE_2,
};
use tarn_core::error::{MathError, RateError};
use tarn_core::math::mul_div;
use tarn_core::traits::RatesCalculator;
use tarn_core::types::{Amount, Fixed, RatePair};

/// Current pool utilization, fixed-point against `ACCRUAL_PRECISION`.
///
/// Zero when nothing is deposited; clamped to 1.0 above full utilization so
/// transient rounding in the totals cannot push rates off the curve.
pub fn utilization(total_borrowed: Amount, total_deposited: Amount) -> Result<Fixed, MathError> {
    if total_deposited == 0 {
        return Ok(0);
    }
    let u = mul_div(
        total_borrowed as u128,
        ACCRUAL_PRECISION,
        total_deposited as u128,
    )?;
    Ok(u.min(ACCRUAL_PRECISION))
}

/// Parameters of the kinked curve. All rates per annum, fixed-point against
/// `ACCRUAL_PRECISION`; the kink is a utilization in `(0, 1)`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateCurveConfig {
    /// Borrow rate at zero utilization.
    pub base_rate: Fixed,
    /// Borrow-rate increase from zero utilization to the kink.
    pub slope_1: Fixed,
    /// Utilization at which the steep segment begins.
    pub kink: Fixed,
    /// Borrow-rate increase from the kink to full utilization.
    pub slope_2: Fixed,
    /// Share of borrow interest retained by the pool, in basis points.
    pub deposit_spread_bps: u64,
}

impl Default for RateCurveConfig {
    fn default() -> Self {
        Self {
            base_rate: DEFAULT_BASE_RATE,
            slope_1: DEFAULT_SLOPE_1,
            kink: DEFAULT_KINK,
            slope_2: DEFAULT_SLOPE_2,
            deposit_spread_bps: DEFAULT_DEPOSIT_SPREAD_BPS,
        }
    }
}

impl RateCurveConfig {
    /// Reject configurations that break the curve's monotonicity contract.
    pub fn validate(&self) -> Result<(), RateError> {
        if self.kink == 0 || self.kink >= ACCRUAL_PRECISION {
            return Err(RateError::InvalidCurve(format!(
                "kink {} outside (0, {})",
                self.kink, ACCRUAL_PRECISION
            )));
        }
        if self.deposit_spread_bps > BPS_PRECISION {
            return Err(RateError::InvalidCurve(format!(
                "deposit spread {} exceeds {} bps",
                self.deposit_spread_bps, BPS_PRECISION
            )));
        }
        Ok(())
    }
}

/// The production rates calculator.
#[derive(Debug, Clone, Copy, Default)]
pub struct UtilizationRates {
    config: RateCurveConfig,
}

impl UtilizationRates {
    /// Create a calculator with a validated configuration.
    pub fn new(config: RateCurveConfig) -> Result<Self, RateError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The active curve parameters.
    pub fn config(&self) -> &RateCurveConfig {
        &self.config
    }

    fn borrow_rate_at(&self, u: Fixed) -> Result<Fixed, MathError> {
        let c = &self.config;
        let rate = if u <= c.kink {
            c.base_rate
                .checked_add(mul_div(c.slope_1, u, c.kink)?)
                .ok_or(MathError::Overflow)?
        } else {
            let above = mul_div(c.slope_2, u - c.kink, ACCRUAL_PRECISION - c.kink)?;
            c.base_rate
                .checked_add(c.slope_1)
                .and_then(|r| r.checked_add(above))
                .ok_or(MathError::Overflow)?
        };
        Ok(rate)
    }
}

impl RatesCalculator for UtilizationRates {
    fn rates(&self, total_borrowed: Amount, total_deposited: Amount) -> Result<RatePair, RateError> {
        let u = utilization(total_borrowed, total_deposited)?;
        let borrow_rate = self.borrow_rate_at(u)?;
        // Depositors earn the borrow rate weighted by utilization, less the
        // retained spread. Structurally <= borrow_rate since u <= 1.
        let retained = (BPS_PRECISION - self.config.deposit_spread_bps) as u128;
        let gross = mul_div(borrow_rate, u, ACCRUAL_PRECISION)?;
        let deposit_rate = mul_div(gross, retained, BPS_PRECISION as u128)?;
        Ok(RatePair { deposit_rate, borrow_rate })
    }
}
