//! Pool ledger lifecycle tests: deposits, withdrawals, borrowing, and the
//! error taxonomy at the operation surface.

use std::sync::Arc;

use tarn_core::asset::FungibleAsset;
use tarn_core::constants::SECONDS_PER_YEAR;
use tarn_core::error::PoolError;
use tarn_tests::helpers::*;

#[test]
fn borrow_requires_registry_authorization() {
    let bench = TestBench::new();
    let mut gated = bench.pool_with_registry(Arc::new(DenyAllRegistry));
    let d1 = acct(1);
    bench.mint_and_approve(&d1, tokens(10));
    gated.deposit(&d1, tokens(10)).unwrap();

    let err = gated.borrow(&d1, tokens(1)).unwrap_err();
    assert!(matches!(err, PoolError::Unauthorized(_)));
    assert_eq!(gated.total_borrowed().unwrap(), 0);
}

#[test]
fn borrow_limited_to_available_liquidity() {
    let mut bench = TestBench::new();
    let d1 = acct(1);
    bench.mint_and_approve(&d1, tokens(10));
    bench.pool.deposit(&d1, tokens(10)).unwrap();

    let err = bench.pool.borrow(&d1, tokens(11)).unwrap_err();
    assert!(matches!(err, PoolError::InsufficientLiquidity { .. }));

    bench.pool.borrow(&d1, tokens(7)).unwrap();
    assert_eq!(bench.pool.total_borrowed().unwrap(), tokens(7));
    assert_eq!(bench.pool.available_liquidity().unwrap(), tokens(3));
    assert_eq!(bench.registry.exposure_of(&d1), tokens(7));

    // The borrowed share of the pool cannot be withdrawn out from under the
    // borrower.
    let err = bench.pool.withdraw(&d1, tokens(5)).unwrap_err();
    assert!(matches!(err, PoolError::InsufficientLiquidity { .. }));
    bench.pool.withdraw(&d1, tokens(3)).unwrap();
}

#[test]
fn borrow_and_repay_lifecycle_with_interest() {
    let mut bench = TestBench::new();
    let d1 = acct(1);
    bench.mint_and_approve(&d1, tokens(100));
    bench.pool.deposit(&d1, tokens(100)).unwrap();
    bench.pool.borrow(&d1, tokens(80)).unwrap();
    assert_eq!(bench.pool_token.lock().balance_of(&d1), tokens(80));

    // A year at the kink: borrowers pay 4%, depositors earn
    // 4% * 0.8 utilization * 95% pass-through = 3.04%.
    bench.clock.advance(SECONDS_PER_YEAR);
    let debt = bench.pool.borrowed_of(&d1).unwrap();
    let balance = bench.pool.balance_of(&d1).unwrap();
    assert_eq!(debt, tenths(832));
    assert_eq!(balance, cents(10304));

    // Over-repayment is rejected, not credited.
    assert_eq!(
        bench.pool.repay(&d1, debt + 1).unwrap_err(),
        PoolError::InvalidAmount
    );

    // Settle the full debt, interest included.
    bench.pool_token.lock().mint(&d1, debt - tokens(80)).unwrap();
    bench.pool_token.lock().approve(&d1, &bench.pool_id, debt);
    bench.pool.repay(&d1, debt).unwrap();
    assert_eq!(bench.pool.borrowed_of(&d1).unwrap(), 0);
    assert_eq!(bench.pool.total_borrowed().unwrap(), 0);
    assert_eq!(bench.registry.exposure_of(&d1), 0);

    // Depositors can now exit with interest; the 5% spread stays behind as
    // pool surplus.
    bench.pool.withdraw(&d1, balance).unwrap();
    assert_eq!(bench.pool.total_deposited().unwrap(), 0);
    assert_eq!(
        bench.pool_token.lock().balance_of(&bench.pool_id),
        cents(16)
    );
}

#[test]
fn repay_requires_token_approval() {
    let mut bench = TestBench::new();
    let d1 = acct(1);
    bench.mint_and_approve(&d1, tokens(10));
    bench.pool.deposit(&d1, tokens(10)).unwrap();
    bench.pool.borrow(&d1, tokens(5)).unwrap();

    // The earlier approval was consumed by the deposit.
    let err = bench.pool.repay(&d1, tokens(5)).unwrap_err();
    assert!(matches!(err, PoolError::InsufficientAllowance { .. }));

    bench.pool_token.lock().approve(&d1, &bench.pool_id, tokens(5));
    bench.pool.repay(&d1, tokens(5)).unwrap();
    assert_eq!(bench.pool.borrowed_of(&d1).unwrap(), 0);
}

#[test]
fn deposit_requires_token_balance() {
    let mut bench = TestBench::new();
    let d1 = acct(1);
    bench.pool_token.lock().approve(&d1, &bench.pool_id, tokens(10));
    let err = bench.pool.deposit(&d1, tokens(10)).unwrap_err();
    assert!(matches!(err, PoolError::InsufficientBalance { .. }));
    assert_eq!(bench.pool.total_deposited().unwrap(), 0);
}

#[test]
fn two_depositors_and_a_borrower_conserve_value() {
    let mut bench = TestBench::new();
    let (d1, d2, b) = (acct(1), acct(2), acct(3));
    bench.mint_and_approve(&d1, tokens(60));
    bench.pool.deposit(&d1, tokens(60)).unwrap();
    bench.mint_and_approve(&d2, tokens(40));
    bench.pool.deposit(&d2, tokens(40)).unwrap();
    bench.pool.borrow(&b, tokens(50)).unwrap();

    bench.clock.advance(SECONDS_PER_YEAR);
    let sum = bench.pool.balance_of(&d1).unwrap() + bench.pool.balance_of(&d2).unwrap();
    let total = bench.pool.total_deposited().unwrap();
    assert!(
        sum.abs_diff(total) <= 2,
        "conservation violated: sum {sum} vs total {total}"
    );
    assert!(bench.pool.total_borrowed().unwrap() <= total);
}

#[test]
fn exchange_rate_survives_partial_exits() {
    let mut bench = TestBench::new();
    let (d1, d2) = (acct(1), acct(2));
    bench.mint_and_approve(&d1, tokens(50));
    bench.pool.deposit(&d1, tokens(50)).unwrap();
    bench.mint_and_approve(&d2, tokens(50));
    bench.pool.deposit(&d2, tokens(50)).unwrap();
    bench.pool.borrow(&d1, tokens(60)).unwrap();

    bench.clock.advance(SECONDS_PER_YEAR / 2);
    let b1 = bench.pool.balance_of(&d1).unwrap();
    let b2 = bench.pool.balance_of(&d2).unwrap();
    // Same deposit, same window, same growth.
    assert_eq!(b1, b2);
    assert!(b1 > tokens(50));

    // d2 exits what liquidity allows; d1's balance keeps accruing
    // independently.
    bench.pool.withdraw(&d2, tokens(20)).unwrap();
    bench.clock.advance(SECONDS_PER_YEAR / 2);
    assert!(bench.pool.balance_of(&d1).unwrap() > b1);
    let sum = bench.pool.balance_of(&d1).unwrap() + bench.pool.balance_of(&d2).unwrap();
    let total = bench.pool.total_deposited().unwrap();
    assert!(sum.abs_diff(total) <= 3);
}

#[test]
fn read_surface_is_idempotent() {
    let mut bench = TestBench::new();
    let d1 = acct(1);
    bench.fund_rewards(tokens(100));
    bench.set_duration(days(30));
    bench.notify(tokens(30));
    bench.mint_and_approve(&d1, tokens(10));
    bench.pool.deposit(&d1, tokens(10)).unwrap();
    bench.pool.borrow(&d1, tokens(4)).unwrap();
    bench.clock.advance(days(7));

    let rewards = bench.pool.check_rewards(&d1).unwrap();
    assert_eq!(bench.pool.check_rewards(&d1).unwrap(), rewards);
    let balance = bench.pool.balance_of(&d1).unwrap();
    assert_eq!(bench.pool.balance_of(&d1).unwrap(), balance);
    let util = bench.pool.utilization().unwrap();
    assert_eq!(bench.pool.utilization().unwrap(), util);
    let debt = bench.pool.borrowed_of(&d1).unwrap();
    assert_eq!(bench.pool.borrowed_of(&d1).unwrap(), debt);
}
