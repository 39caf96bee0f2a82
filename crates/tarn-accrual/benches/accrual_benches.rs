//! Criterion benchmarks for tarn-accrual critical operations.
//!
//! Covers: index projection, checkpointing, and rate-curve evaluation.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use tarn_accrual::{LinearIndex, UtilizationRates};
use tarn_core::constants::{ACCRUAL_PRECISION, SECONDS_PER_YEAR, UNIT};
use tarn_core::traits::RatesCalculator;

fn bench_value_at(c: &mut Criterion) {
    let mut idx = LinearIndex::new(0);
    idx.set_rate(0, ACCRUAL_PRECISION / 20).unwrap();

    c.bench_function("index_value_at", |b| {
        b.iter(|| idx.value_at(black_box(SECONDS_PER_YEAR)))
    });
}

fn bench_checkpoint(c: &mut Criterion) {
    c.bench_function("index_checkpoint_year", |b| {
        b.iter(|| {
            let mut idx = LinearIndex::new(0);
            idx.set_rate(0, ACCRUAL_PRECISION / 20).unwrap();
            idx.checkpoint(black_box(SECONDS_PER_YEAR)).unwrap();
            idx
        })
    });
}

fn bench_rates(c: &mut Criterion) {
    let calc = UtilizationRates::default();
    // Mid-curve utilization, above the kink.
    let borrowed = 90 * UNIT;
    let deposited = 100 * UNIT;

    c.bench_function("utilization_rates", |b| {
        b.iter(|| calc.rates(black_box(borrowed), black_box(deposited)))
    });
}

criterion_group!(benches, bench_value_at, bench_checkpoint, bench_rates);
criterion_main!(benches);
