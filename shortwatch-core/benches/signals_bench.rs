//! Criterion benchmarks for the signal engines.
//!
//! Benchmarks:
//! 1. Gross-shorts scoring over a full-market snapshot
//! 2. Position scoring with and without a previous report
//! 3. Days-to-cover augmentation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::HashMap;

use chrono::NaiveDate;
use shortwatch_core::config::{GrossShortsConfig, ShortPositionsConfig};
use shortwatch_core::domain::{GrossRow, PositionRow};
use shortwatch_core::{apply_days_to_cover, compute_gross_signals, compute_position_signals};

// ── Helpers ──────────────────────────────────────────────────────────

fn code(i: usize) -> String {
    format!("C{i:03}")
}

fn make_gross(n: usize) -> Vec<GrossRow> {
    let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    (0..n)
        .map(|i| GrossRow {
            code: code(i),
            date,
            gross: Some(1_000.0 * (i % 500) as f64),
            issued: Some(100_000_000.0 + i as f64 * 1_000.0),
            vendor_pct: Some((i % 100) as f64 / 10_000.0),
        })
        .collect()
}

fn make_positions(n: usize, day: u32, drift: f64) -> Vec<PositionRow> {
    let date = NaiveDate::from_ymd_opt(2024, 5, day).unwrap();
    (0..n)
        .map(|i| PositionRow {
            code: code(i),
            date,
            reported_short: None,
            issued: Some(200_000_000.0),
            pct_short: Some(((i % 150) as f64 / 10.0 + drift).max(0.0)),
        })
        .collect()
}

// ── 1. Gross ─────────────────────────────────────────────────────────

fn bench_gross(c: &mut Criterion) {
    let mut group = c.benchmark_group("gross_signals");
    let cfg = GrossShortsConfig::default();

    for &n in &[500, 2_000] {
        let rows = make_gross(n);
        group.bench_with_input(BenchmarkId::new("score", n), &n, |b, _| {
            b.iter(|| compute_gross_signals(black_box(&rows), black_box(&cfg)));
        });
    }

    group.finish();
}

// ── 2. Positions ─────────────────────────────────────────────────────

fn bench_positions(c: &mut Criterion) {
    let mut group = c.benchmark_group("position_signals");
    let cfg = ShortPositionsConfig::default();

    for &n in &[500, 2_000] {
        let today = make_positions(n, 2, 0.0);
        let prev = make_positions(n, 1, 0.7);

        group.bench_with_input(BenchmarkId::new("no_prev", n), &n, |b, _| {
            b.iter(|| compute_position_signals(black_box(&today), None, black_box(&cfg)));
        });
        group.bench_with_input(BenchmarkId::new("with_prev", n), &n, |b, _| {
            b.iter(|| {
                compute_position_signals(black_box(&today), Some(black_box(prev.as_slice())), black_box(&cfg))
            });
        });
    }

    group.finish();
}

// ── 3. Days to cover ─────────────────────────────────────────────────

fn bench_days_to_cover(c: &mut Criterion) {
    let cfg = ShortPositionsConfig::default();
    let scored = compute_position_signals(&make_positions(2_000, 2, 0.0), None, &cfg);
    let adv: HashMap<String, f64> = (0..2_000).map(|i| (code(i), 50_000.0 + i as f64)).collect();

    c.bench_function("days_to_cover_2000", |b| {
        b.iter(|| {
            let mut rows = scored.clone();
            apply_days_to_cover(black_box(&mut rows), black_box(&adv));
            black_box(rows);
        });
    });
}

criterion_group!(benches, bench_gross, bench_positions, bench_days_to_cover);
criterion_main!(benches);
