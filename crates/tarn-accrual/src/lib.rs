//! # tarn-accrual — Accrual index and utilization rate curve.
//!
//! All calculations use integer arithmetic only for determinism.
//!
//! This crate implements the pure math underneath the pool ledger:
//! - **Linear compounding index**: a monotonically non-decreasing accumulator
//!   converting a fixed principal into a time-grown current value, with
//!   checkpoint-before-rate-change discipline.
//! - **Kinked utilization curve**: a two-slope monotonic mapping from pool
//!   utilization to per-annum deposit and borrow rates, with the spread
//!   between them funding the pool surplus.

pub mod index;
pub mod rates;

pub use index::LinearIndex;
pub use rates::{RateCurveConfig, UtilizationRates, utilization};
