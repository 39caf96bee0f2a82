//! Shared test helpers: account ids, amount shorthands, and the wired-up
//! pool/rewarder fixture.

use std::sync::Arc;

use parking_lot::Mutex;

use tarn_accrual::UtilizationRates;
use tarn_core::asset::{FungibleAsset, TokenLedger};
use tarn_core::clock::{Clock, ManualClock};
use tarn_core::constants::UNIT;
use tarn_core::traits::BorrowersRegistry;
use tarn_core::types::{AccountId, Amount};
use tarn_pool::{OpenBorrowersRegistry, Pool, RewardStream};

pub const DAY: u64 = 86_400;

/// Fixture genesis instant.
pub const T0: u64 = 1_700_000_000;

/// Tolerance matching the original acceptance checks: 1e-4 tokens.
pub const CLOSE: Amount = UNIT / 10_000;

pub fn days(n: u64) -> u64 {
    n * DAY
}

/// Simple account id from a seed byte.
pub fn acct(seed: u8) -> AccountId {
    AccountId([seed; 32])
}

pub fn tokens(n: u64) -> Amount {
    n * UNIT
}

pub fn tenths(n: u64) -> Amount {
    n * UNIT / 10
}

pub fn cents(n: u64) -> Amount {
    n * UNIT / 100
}

/// Assert `actual` is within `tol` base units of `expected`.
pub fn assert_close(actual: Amount, expected: Amount, tol: Amount) {
    let diff = actual.abs_diff(expected);
    assert!(
        diff <= tol,
        "expected {expected} +/- {tol}, got {actual} (off by {diff})"
    );
}

/// A registry that refuses every borrower.
#[derive(Debug, Default)]
pub struct DenyAllRegistry;

impl BorrowersRegistry for DenyAllRegistry {
    fn can_borrow(&self, _account: &AccountId) -> bool {
        false
    }

    fn record_borrow(&self, _account: &AccountId, _amount: Amount) {}

    fn record_repay(&self, _account: &AccountId, _amount: Amount) {}

    fn total_exposure(&self) -> Amount {
        0
    }
}

/// A pool wired to a reward stream, in-memory assets, a manual clock, the
/// default utilization curve, and an open borrowers registry.
pub struct TestBench {
    pub clock: Arc<ManualClock>,
    pub pool_token: Arc<Mutex<TokenLedger>>,
    pub reward_token: Arc<Mutex<TokenLedger>>,
    pub rewarder: Arc<Mutex<RewardStream>>,
    pub registry: Arc<OpenBorrowersRegistry>,
    pub pool: Pool,
    pub pool_id: AccountId,
    pub rewarder_id: AccountId,
    pub owner: AccountId,
}

impl TestBench {
    pub fn new() -> Self {
        let open = Arc::new(OpenBorrowersRegistry::new());
        let clock = Arc::new(ManualClock::new(T0));
        let pool_token = Arc::new(Mutex::new(TokenLedger::new()));
        let reward_token = Arc::new(Mutex::new(TokenLedger::new()));
        let pool_id = acct(0xF0);
        let rewarder_id = acct(0xEE);
        let owner = acct(0xF1);
        let rewarder = Arc::new(Mutex::new(RewardStream::new(
            rewarder_id,
            pool_id,
            owner,
            reward_token.clone(),
        )));
        let pool = Pool::new(
            pool_id,
            pool_token.clone(),
            rewarder.clone(),
            open.clone(),
            Arc::new(UtilizationRates::default()),
            clock.clone(),
        );
        Self {
            clock,
            pool_token,
            reward_token,
            rewarder,
            registry: open,
            pool,
            pool_id,
            rewarder_id,
            owner,
        }
    }

    /// A second pool over the same assets, clock, and reward stream, wired
    /// to a custom registry.
    pub fn pool_with_registry(&self, registry: Arc<dyn BorrowersRegistry>) -> Pool {
        Pool::new(
            self.pool_id,
            self.pool_token.clone(),
            self.rewarder.clone(),
            registry,
            Arc::new(UtilizationRates::default()),
            self.clock.clone(),
        )
    }

    /// The bench clock's current instant.
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Mint reward tokens into the stream's reserve.
    pub fn fund_rewards(&self, amount: Amount) {
        self.reward_token.lock().mint(&self.rewarder_id, amount).unwrap();
    }

    /// Mint pool tokens to an account and approve the pool to pull them.
    pub fn mint_and_approve(&self, account: &AccountId, amount: Amount) {
        self.pool_token.lock().mint(account, amount).unwrap();
        let allowed = self.pool_token.lock().allowance(account, &self.pool_id);
        self.pool_token
            .lock()
            .approve(account, &self.pool_id, allowed + amount);
    }

    /// Configure the epoch length as the stream owner.
    pub fn set_duration(&self, duration: u64) {
        self.rewarder
            .lock()
            .set_rewards_duration(&self.owner, duration, self.clock.now())
            .unwrap();
    }

    /// Start a reward epoch as the stream owner.
    pub fn notify(&self, amount: Amount) {
        self.rewarder
            .lock()
            .notify_reward_amount(&self.owner, amount, self.clock.now())
            .unwrap();
    }

    /// Reward tokens still held by the stream.
    pub fn reserve(&self) -> Amount {
        self.reward_token.lock().balance_of(&self.rewarder_id)
    }

    /// Reward tokens held by an account.
    pub fn reward_balance(&self, account: &AccountId) -> Amount {
        self.reward_token.lock().balance_of(account)
    }
}

impl Default for TestBench {
    fn default() -> Self {
        Self::new()
    }
}
