//! # tarn-pool — Shared liquidity pool ledger.
//!
//! A pool holds one fungible asset deposited by participants, lends it to
//! registry-authorized borrowers, and accrues both sides against linear
//! compounding indices. A separate reward stream pays a second asset out
//! pro-rata over time to depositors, tracking pool-share balances exactly
//! through every balance-mutating operation.
//!
//! Every public operation is atomic: it either fully applies or fails with a
//! specific error before any state mutation. Per pool instance, operations
//! are strictly sequential; callers on multi-threaded platforms serialize
//! through one exclusive critical section per pool.

pub mod pool;
pub mod registry;
pub mod rewarder;

pub use pool::{Pool, PoolState};
pub use registry::OpenBorrowersRegistry;
pub use rewarder::{RewardStream, RewardStreamState, Stake};
