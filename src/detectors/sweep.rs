//! Liquidity sweep detector

use std::collections::HashMap;

use super::helpers::{confirmation_window, score, window_high, window_low, SWEEP_CONFIDENCE_CAP};
use crate::{
    params::{get_count, get_period, get_ratio, ParamMeta, ParameterizedDetector},
    Direction, MarketContext, PatternDetector, PatternError, PatternKind, PatternMatch, Period,
    Ratio, Result, OHLCV,
};

impl_with_defaults!(LiquiditySweepDetector);

/// Shortest sequence scanned for sweeps
pub const MIN_SWEEP_BARS: usize = 20;

/// LS - a bar takes out the extreme of the preceding `lookback` bars and
/// price then reverses.
///
/// Reversal strength is the share of the next `confirmation_lag` closes on the
/// reversal side of the sweeping bar's close. A breach of the high is checked
/// first; the low is only considered when the high was not breached.
#[derive(Debug, Clone)]
pub struct LiquiditySweepDetector {
    pub lookback: Period,
    /// First bar index examined; must be >= lookback
    pub start_index: usize,
    pub confirmation_lag: Period,
    /// Reversal strength must exceed this
    pub min_reversal: Ratio,
    pub confidence_cap: Ratio,
}

impl Default for LiquiditySweepDetector {
    fn default() -> Self {
        Self {
            lookback: Period::new_const(10),
            start_index: 15,
            confirmation_lag: Period::new_const(5),
            min_reversal: Ratio::new_const(0.5),
            confidence_cap: Ratio::new_const(SWEEP_CONFIDENCE_CAP),
        }
    }
}

impl PatternDetector for LiquiditySweepDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::Ls
    }

    fn min_bars(&self) -> usize {
        MIN_SWEEP_BARS
    }

    fn detect<T: OHLCV>(&self, bars: &[T], _contexts: &[MarketContext]) -> Vec<PatternMatch> {
        let lookback = self.lookback.get();
        let lag = self.confirmation_lag.get();
        let mut results = Vec::new();

        for i in self.start_index.max(lookback)..bars.len() {
            let Some(window) = confirmation_window(bars, i, lag) else {
                break;
            };
            let bar = &bars[i];
            let close = bar.close();

            let (direction, price, reversed) = match (
                window_high(bars, i - lookback, i),
                window_low(bars, i - lookback, i),
            ) {
                (Some(high), _) if bar.high() > high => (
                    Direction::Bearish,
                    bar.high(),
                    window.iter().filter(|b| b.close() < close).count(),
                ),
                (_, Some(low)) if bar.low() < low => (
                    Direction::Bullish,
                    bar.low(),
                    window.iter().filter(|b| b.close() > close).count(),
                ),
                _ => continue,
            };

            let strength = reversed as f64 / window.len() as f64;
            if strength <= self.min_reversal.get() {
                continue;
            }

            results.push(PatternMatch {
                kind: PatternKind::Ls,
                direction,
                price,
                confidence: score(strength, 1.0, self.confidence_cap.get()),
                magnitude: strength,
                index: i,
                start_index: i - lookback,
                end_index: i + lag,
                zone: None,
            });
        }

        results
    }

    fn validate_config(&self) -> Result<()> {
        if self.start_index < self.lookback.get() {
            return Err(PatternError::InvalidConfig(format!(
                "start_index {} must be >= lookback {}",
                self.start_index,
                self.lookback.get()
            )));
        }
        Ok(())
    }
}

static LIQUIDITY_SWEEP_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("lookback", 10.0, (5.0, 20.0, 1.0), "Bars whose extreme must be taken out"),
    ParamMeta::count("start_index", 15.0, (10.0, 30.0, 1.0), "First bar considered, at least lookback"),
    ParamMeta::period("confirmation_lag", 5.0, (3.0, 10.0, 1.0), "Bars inspected for reversal"),
    ParamMeta::ratio("min_reversal", 0.5, (0.3, 0.8, 0.1), "Minimum share of reversing closes"),
    ParamMeta::ratio("confidence_cap", 0.85, (0.5, 1.0, 0.05), "Upper bound on confidence"),
];

impl ParameterizedDetector for LiquiditySweepDetector {
    fn param_meta() -> &'static [ParamMeta] {
        LIQUIDITY_SWEEP_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let detector = Self {
            lookback: get_period(params, "lookback", 10)?,
            start_index: get_count(params, "start_index", 15)?,
            confirmation_lag: get_period(params, "confirmation_lag", 5)?,
            min_reversal: get_ratio(params, "min_reversal", 0.5)?,
            confidence_cap: get_ratio(params, "confidence_cap", SWEEP_CONFIDENCE_CAP)?,
        };
        detector.validate_config()?;
        Ok(detector)
    }

    fn pattern_id_str() -> &'static str {
        "LS"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bar;

    fn flat(i: usize) -> Bar {
        Bar::new(i as i64, 100.0, 101.0, 99.0, 100.0, 1000.0)
    }

    fn with_sweep(sweep: Bar, follow: [f64; 5]) -> Vec<Bar> {
        let mut bars: Vec<Bar> = (0..20).map(flat).collect();
        bars.push(Bar { timestamp: 20, ..sweep });
        for (k, c) in follow.into_iter().enumerate() {
            bars.push(Bar::new(21 + k as i64, c, c + 0.5, c - 0.5, c, 1000.0));
        }
        bars
    }

    #[test]
    fn test_bearish_sweep() {
        let spike = Bar::new(0, 100.0, 103.0, 99.5, 100.5, 1000.0);
        let bars = with_sweep(spike, [100.0, 100.0, 100.0, 101.0, 101.0]);
        let matches = LiquiditySweepDetector::default().detect(&bars, &[]);

        assert_eq!(matches.len(), 1);
        let m = matches[0];
        assert_eq!(m.direction, Direction::Bearish);
        assert_eq!(m.index, 20);
        assert_eq!(m.price, 103.0);
        assert!((m.confidence - 0.6).abs() < 1e-12);
        assert_eq!(m.start_index, 10);
    }

    #[test]
    fn test_bullish_sweep() {
        let dip = Bar::new(0, 100.0, 100.5, 97.0, 99.5, 1000.0);
        let bars = with_sweep(dip, [100.0, 100.0, 100.0, 99.0, 99.0]);
        let matches = LiquiditySweepDetector::default().detect(&bars, &[]);

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].direction, Direction::Bullish);
        assert_eq!(matches[0].price, 97.0);
    }

    #[test]
    fn test_confidence_capped() {
        let spike = Bar::new(0, 100.0, 103.0, 99.5, 100.5, 1000.0);
        let bars = with_sweep(spike, [99.0; 5]);
        let matches = LiquiditySweepDetector::default().detect(&bars, &[]);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].confidence, 0.85);
    }

    #[test]
    fn test_high_breach_shadows_low() {
        // Both extremes taken out; no bearish reversal, so nothing at all
        let outside = Bar::new(0, 100.0, 103.0, 97.0, 100.0, 1000.0);
        let bars = with_sweep(outside, [101.0; 5]);
        assert!(LiquiditySweepDetector::default().detect(&bars, &[]).is_empty());
    }

    #[test]
    fn test_weak_reversal() {
        let spike = Bar::new(0, 100.0, 103.0, 99.5, 100.5, 1000.0);
        let bars = with_sweep(spike, [100.0, 100.0, 101.0, 101.0, 101.0]);
        assert!(LiquiditySweepDetector::default().detect(&bars, &[]).is_empty());
    }

    #[test]
    fn test_start_before_lookback_rejected() {
        let mut params = HashMap::new();
        params.insert("start_index", 5.0);
        assert!(LiquiditySweepDetector::with_params(&params).is_err());
    }

    #[test]
    fn test_start_index_is_tunable() {
        let meta = LiquiditySweepDetector::param_meta();
        let start = meta.iter().find(|m| m.name == "start_index").unwrap();
        assert!(start.validate(15.0).is_ok());

        let mut params = HashMap::new();
        params.insert("start_index", 12.0);
        assert_eq!(LiquiditySweepDetector::with_params(&params).unwrap().start_index, 12);
    }
}
