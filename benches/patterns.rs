//! Benchmarks for market-structure pattern detection.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use yasmc::prelude::*;

/// Generate realistic random bars
fn generate_bars(n: usize) -> Vec<Bar> {
  let mut bars = Vec::with_capacity(n);
  let mut price = 100.0;

  for i in 0..n {
    let change = ((i * 7 + 13) % 100) as f64 / 50.0 - 1.0; // Deterministic "random"
    let volatility = 2.0 + ((i * 3) % 10) as f64 / 5.0;

    let o = price;
    let c = price + change;
    let h = o.max(c) + volatility * 0.5;
    let l = o.min(c) - volatility * 0.5;
    let v = 1000.0 + ((i * 11) % 17) as f64 * 50.0;

    bars.push(Bar::new(i as i64 * 60_000, o, h, l, c, v));
    price = c;
  }

  bars
}

fn bench_single_detector(c: &mut Criterion) {
  let bars = generate_bars(1000);

  let engine = EngineBuilder::new()
    .add(BuiltinDetector::FairValueGap(FairValueGapDetector::with_defaults()))
    .build()
    .unwrap();

  c.bench_function("scan_fvg_1000_bars", |b| {
    b.iter(|| {
      let _ = black_box(engine.scan(black_box(&bars)));
    })
  });
}

fn bench_all_patterns(c: &mut Criterion) {
  let bars = generate_bars(1000);

  let engine = EngineBuilder::new().with_all_defaults().build().unwrap();

  c.bench_function("detect_all_patterns_1000_bars", |b| {
    b.iter(|| {
      let _ = black_box(engine.detect_patterns(black_box(&bars), "EURUSD", "1h"));
    })
  });
}

fn bench_scaling(c: &mut Criterion) {
  let engine = EngineBuilder::new().with_all_defaults().build().unwrap();

  let mut group = c.benchmark_group("scaling");

  for size in [100, 500, 1000, 5000, 10000].iter() {
    let bars = generate_bars(*size);

    group.bench_with_input(BenchmarkId::new("scan", size), size, |b, _| {
      b.iter(|| {
        let _ = black_box(engine.scan(black_box(&bars)));
      })
    });
  }

  group.finish();
}

fn bench_parallel_scan(c: &mut Criterion) {
  let bars1 = generate_bars(1000);
  let bars2 = generate_bars(1000);
  let bars3 = generate_bars(1000);
  let bars4 = generate_bars(1000);

  let engine = EngineBuilder::new().with_all_defaults().build().unwrap();

  let jobs: Vec<(&str, &str, &[Bar])> = vec![
    ("EURUSD", "1h", &bars1),
    ("GBPUSD", "1h", &bars2),
    ("USDJPY", "4h", &bars3),
    ("AUDUSD", "4h", &bars4),
  ];

  c.bench_function("parallel_scan_4_jobs", |b| {
    b.iter(|| {
      let _ = black_box(scan_parallel(black_box(&engine), black_box(jobs.clone())));
    })
  });
}

fn bench_context_computation(c: &mut Criterion) {
  let bars = generate_bars(1000);

  let engine = EngineBuilder::new().with_all_defaults().build().unwrap();

  c.bench_function("compute_contexts_1000_bars", |b| {
    b.iter(|| {
      let _ = black_box(engine.compute_contexts(black_box(&bars)));
    })
  });
}

fn bench_swings(c: &mut Criterion) {
  let bars = generate_bars(1000);

  c.bench_function("extract_swings_1000_bars", |b| {
    b.iter(|| {
      let _ = black_box(extract_swings(black_box(&bars), DEFAULT_SWING_WINDOW));
    })
  });
}

fn bench_aggregate(c: &mut Criterion) {
  let predictions: Vec<Prediction> = (0..64)
    .map(|i| {
      let kind = PatternKind::ALL[i % 5];
      let direction = if i % 3 == 0 { Direction::Bearish } else { Direction::Bullish };
      Prediction::new(kind, direction, (i % 10) as f64 / 10.0, 0.5).unwrap()
    })
    .collect();

  c.bench_function("aggregate_64_predictions", |b| {
    b.iter(|| {
      let _ = black_box(aggregate(black_box(&predictions)));
    })
  });
}

criterion_group!(
  benches,
  bench_single_detector,
  bench_all_patterns,
  bench_scaling,
  bench_parallel_scan,
  bench_context_computation,
  bench_swings,
  bench_aggregate,
);

criterion_main!(benches);
