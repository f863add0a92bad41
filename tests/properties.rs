//! Property tests: invariants that hold for any well-formed bar sequence.

use chrono::{DateTime, Duration};
use proptest::prelude::*;
use yasmc::prelude::*;

/// Well-formed bars: low <= min(open, close), high >= max(open, close)
fn bars_strategy(max_len: usize) -> impl Strategy<Value = Vec<Bar>> {
    prop::collection::vec(
        (
            -3.0f64..3.0,
            0.0f64..2.0,
            0.0f64..2.0,
            -3.0f64..3.0,
            0.0f64..1e6,
        ),
        0..max_len,
    )
    .prop_map(|steps| {
        let mut price = 100.0;
        steps
            .into_iter()
            .enumerate()
            .map(|(i, (gap, upper, lower, change, volume))| {
                let open = (price + gap).max(1.0);
                let close = (open + change).max(1.0);
                price = close;
                Bar::new(
                    i as i64 * 60_000,
                    open,
                    open.max(close) + upper,
                    (open.min(close) - lower).max(0.5),
                    close,
                    volume,
                )
            })
            .collect()
    })
}

fn prediction_strategy() -> impl Strategy<Value = Prediction> {
    (0usize..5, 0usize..3, 0.0f64..=1.0, 0.0f64..=1.0).prop_map(|(k, d, conf, weight)| {
        let direction = [Direction::Bullish, Direction::Neutral, Direction::Bearish][d];
        Prediction::new(PatternKind::ALL[k], direction, conf, weight).unwrap()
    })
}

proptest! {
    #[test]
    fn confidence_always_in_unit_interval(bars in bars_strategy(150)) {
        let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
        for m in engine.scan(&bars).unwrap() {
            prop_assert!((0.0..=1.0).contains(&m.confidence), "{m:?}");
        }
    }

    #[test]
    fn detection_is_deterministic(bars in bars_strategy(120)) {
        let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
        let first = engine.detect_patterns(&bars, "EURUSD", "1h").unwrap();
        let second = engine.detect_patterns(&bars, "EURUSD", "1h").unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn patterns_inherit_bar_timestamps(bars in bars_strategy(120)) {
        let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
        for m in engine.scan(&bars).unwrap() {
            prop_assert!(m.index < bars.len());
            prop_assert!(m.start_index <= m.index && m.index <= m.end_index);
        }
        for p in engine.detect_patterns(&bars, "EURUSD", "1h").unwrap() {
            prop_assert!(bars.iter().any(|b| b.timestamp == p.timestamp));
        }
    }

    #[test]
    fn detector_confidence_caps_hold(bars in bars_strategy(150)) {
        let contexts = DefaultContextProvider::default().compute_all(&bars);
        for m in PatternDetector::detect(&StructureBreakDetector::default(), &bars, &contexts) {
            prop_assert!(m.confidence <= 0.95);
        }
        for m in PatternDetector::detect(&FairValueGapDetector::default(), &bars, &contexts) {
            prop_assert!(m.confidence <= 0.9);
        }
        for m in PatternDetector::detect(&OrderBlockDetector::default(), &bars, &contexts) {
            prop_assert!(m.confidence <= 0.9);
        }
        for m in PatternDetector::detect(&LiquiditySweepDetector::default(), &bars, &contexts) {
            prop_assert!(m.confidence <= 0.85);
        }
    }

    #[test]
    fn short_sequences_have_no_swings(bars in bars_strategy(5)) {
        prop_assert!(extract_swings(&bars, DEFAULT_SWING_WINDOW).is_empty());
    }

    #[test]
    fn swings_are_strict_extremes(bars in bars_strategy(80)) {
        let swings = extract_swings(&bars, 2);
        for s in &swings.highs {
            for j in s.index - 2..=s.index + 2 {
                prop_assert!(j == s.index || bars[j].high < s.price);
            }
        }
        for s in &swings.lows {
            for j in s.index - 2..=s.index + 2 {
                prop_assert!(j == s.index || bars[j].low > s.price);
            }
        }
    }

    #[test]
    fn aggregate_confidence_is_mean(predictions in prop::collection::vec(prediction_strategy(), 1..12)) {
        let d = aggregate(&predictions);
        let mean = predictions.iter().map(|p| p.confidence.get()).sum::<f64>() / predictions.len() as f64;
        prop_assert!((d.confidence - mean).abs() < 1e-9);
        prop_assert_eq!(d.contributors(), predictions.len());
        prop_assert_eq!(&d.predictions[..], &predictions[..]);
        prop_assert!(d.pattern_type.is_some());
    }

    #[test]
    fn store_never_serves_stale_after_prune(
        offsets in prop::collection::vec(0i64..72, 0..40),
        now_hours in 72i64..200,
    ) {
        let store = PatternStore::default();
        let now = DateTime::from_timestamp_millis(now_hours * 3_600_000).unwrap();
        let bars: Vec<Bar> = (0..20)
            .map(|i| Bar::new(i * 60_000, 1.0, 1.0, 1.0, 1.0, 1.0))
            .collect();
        let template = PatternMatch {
            kind: PatternKind::Ls,
            direction: Direction::Bearish,
            price: 1.0,
            confidence: 0.6,
            magnitude: 0.6,
            index: 0,
            start_index: 0,
            end_index: 0,
            zone: None,
        };

        let patterns: Vec<Pattern> = offsets
            .iter()
            .map(|h| {
                let mut p = Pattern::from_match(&template, &bars, "EURUSD", "1h").unwrap();
                p.timestamp = (now_hours - h) * 3_600_000;
                p
            })
            .collect();
        store.record(now, patterns);
        store.prune(now);

        let cutoff = (now - Duration::hours(24)).timestamp_millis();
        prop_assert!(store.all().iter().all(|p| p.timestamp >= cutoff));
        let kept = offsets.iter().filter(|&&h| h <= 24).count();
        prop_assert_eq!(store.len(), kept);
    }
}
