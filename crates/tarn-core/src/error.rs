//! Error types for the Tarn ledger.
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathError {
    #[error("arithmetic overflow")] Overflow,
    #[error("division by zero")] DivisionByZero,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateError {
    #[error("invalid rate curve: {0}")] InvalidCurve(String),
    #[error(transparent)] Math(#[from] MathError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    #[error("insufficient balance: have {have}, need {need}")] InsufficientBalance { have: u64, need: u64 },
    #[error("insufficient allowance: have {have}, need {need}")] InsufficientAllowance { have: u64, need: u64 },
    #[error("supply overflow")] SupplyOverflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewardError {
    #[error("unauthorized: {0} only")] Unauthorized(&'static str),
    #[error("reward overcommit: committed {committed} exceeds held {held}")] RewardOvercommit { committed: u64, held: u64 },
    #[error("duration locked: {remaining}s of the current epoch remain")] DurationLocked { remaining: u64 },
    #[error("invalid duration")] InvalidDuration,
    #[error(transparent)] Math(#[from] MathError),
    #[error(transparent)] Asset(#[from] AssetError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("invalid amount")] InvalidAmount,
    #[error("insufficient balance: have {have}, need {need}")] InsufficientBalance { have: u64, need: u64 },
    #[error("insufficient allowance: have {have}, need {need}")] InsufficientAllowance { have: u64, need: u64 },
    #[error("insufficient liquidity: available {available}, requested {requested}")] InsufficientLiquidity { available: u64, requested: u64 },
    #[error("unauthorized: {0}")] Unauthorized(&'static str),
    #[error(transparent)] Math(#[from] MathError),
    #[error(transparent)] Rates(#[from] RateError),
    #[error(transparent)] Asset(#[from] AssetError),
    #[error(transparent)] Reward(#[from] RewardError),
}

#[derive(Error, Debug)]
pub enum TarnError {
    #[error(transparent)] Math(#[from] MathError),
    #[error(transparent)] Rates(#[from] RateError),
    #[error(transparent)] Asset(#[from] AssetError),
    #[error(transparent)] Reward(#[from] RewardError),
    #[error(transparent)] Pool(#[from] PoolError),
}
