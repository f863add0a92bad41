//! Fair value gap detector
//!
//! A three-bar window `(c1, c2, c3)` leaves a bullish gap when `c2` trades
//! entirely above `c1` and `c3` dips back below `c2`'s high; bearish mirrors it.
//! The bearish check runs only when the bullish structure is absent.

use std::collections::HashMap;

use super::helpers::{score, GAP_CONFIDENCE_CAP};
use crate::{
  params::{get_factor, get_ratio, ParamMeta, ParameterizedDetector},
  Direction, MarketContext, PatternDetector, PatternError, PatternKind, PatternMatch, Ratio, Result,
  OHLCV,
};

impl_with_defaults!(FairValueGapDetector);

/// FVG - price imbalance left between the first and second bar of a triple
#[derive(Debug, Clone)]
pub struct FairValueGapDetector {
  /// Gap must exceed this fraction of the reference price
  pub min_gap_ratio:    f64,
  /// Confidence = min(gap ratio * scale, cap)
  pub confidence_scale: f64,
  pub confidence_cap:   Ratio,
}

impl Default for FairValueGapDetector {
  fn default() -> Self {
    Self {
      min_gap_ratio:    0.0005,
      confidence_scale: 1000.0,
      confidence_cap:   Ratio::new_const(GAP_CONFIDENCE_CAP),
    }
  }
}

impl FairValueGapDetector {
  fn gap_match(&self, direction: Direction, lower: f64, upper: f64, reference: f64, i: usize) -> Option<PatternMatch> {
    if reference <= 0.0 {
      return None;
    }
    let ratio = (upper - lower) / reference;
    if ratio <= self.min_gap_ratio {
      return None;
    }

    Some(PatternMatch {
      kind:        PatternKind::Fvg,
      direction,
      price:       (lower + upper) / 2.0,
      confidence:  score(ratio, self.confidence_scale, self.confidence_cap.get()),
      magnitude:   upper - lower,
      index:       i,
      start_index: i - 2,
      end_index:   i,
      zone:        Some((lower, upper)),
    })
  }
}

impl PatternDetector for FairValueGapDetector {
  fn kind(&self) -> PatternKind {
    PatternKind::Fvg
  }

  fn min_bars(&self) -> usize {
    3
  }

  fn detect<T: OHLCV>(&self, bars: &[T], _contexts: &[MarketContext]) -> Vec<PatternMatch> {
    let mut results = Vec::new();

    for i in 2..bars.len() {
      let (c1, c2, c3) = (&bars[i - 2], &bars[i - 1], &bars[i]);

      let found = if c2.low() > c1.high() && c3.low() < c2.high() {
        self.gap_match(Direction::Bullish, c1.high(), c2.low(), c1.high(), i)
      } else if c2.high() < c1.low() && c3.high() > c2.low() {
        self.gap_match(Direction::Bearish, c2.high(), c1.low(), c1.low(), i)
      } else {
        None
      };

      results.extend(found);
    }

    results
  }

  fn validate_config(&self) -> Result<()> {
    if !self.min_gap_ratio.is_finite() || self.min_gap_ratio < 0.0 {
      return Err(PatternError::InvalidConfig("min_gap_ratio must be finite and non-negative".into()));
    }
    if !self.confidence_scale.is_finite() || self.confidence_scale < 0.0 {
      return Err(PatternError::InvalidConfig("confidence_scale must be finite and non-negative".into()));
    }
    Ok(())
  }
}

static FAIR_VALUE_GAP_PARAMS: &[ParamMeta] = &[
  ParamMeta::ratio("min_gap_ratio", 0.0005, (0.0001, 0.005, 0.0001), "Minimum gap as a fraction of price"),
  ParamMeta::factor("confidence_scale", 1000.0, (100.0, 5000.0, 100.0), "Multiplier on the gap ratio"),
  ParamMeta::ratio("confidence_cap", 0.9, (0.5, 1.0, 0.05), "Upper bound on confidence"),
];

impl ParameterizedDetector for FairValueGapDetector {
  fn param_meta() -> &'static [ParamMeta] {
    FAIR_VALUE_GAP_PARAMS
  }

  fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
    Ok(Self {
      min_gap_ratio:    get_ratio(params, "min_gap_ratio", 0.0005)?.get(),
      confidence_scale: get_factor(params, "confidence_scale", 1000.0)?,
      confidence_cap:   get_ratio(params, "confidence_cap", GAP_CONFIDENCE_CAP)?,
    })
  }

  fn pattern_id_str() -> &'static str {
    "FVG"
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::Bar;

  fn detect(bars: &[Bar]) -> Vec<PatternMatch> {
    FairValueGapDetector::default().detect(bars, &[])
  }

  #[test]
  fn test_bullish_gap() {
    let bars = vec![
      Bar::new(0, 0.999, 1.0, 0.998, 0.9995, 10.0),
      Bar::new(1, 1.0025, 1.003, 1.002, 1.0028, 10.0),
      Bar::new(2, 1.0015, 1.002, 1.001, 1.0012, 10.0),
    ];
    let matches = detect(&bars);

    assert_eq!(matches.len(), 1);
    let m = matches[0];
    assert_eq!(m.direction, Direction::Bullish);
    assert!((m.price - 1.001).abs() < 1e-12);
    assert!((m.confidence - 0.9).abs() < 1e-12);
    assert_eq!(m.index, 2);
    assert_eq!(m.start_index, 0);
    assert_eq!(m.zone, Some((1.0, 1.002)));
  }

  #[test]
  fn test_bearish_gap() {
    let bars = vec![
      Bar::new(0, 2.001, 2.002, 2.0, 2.0005, 10.0),
      Bar::new(1, 1.9965, 1.997, 1.996, 1.9962, 10.0),
      Bar::new(2, 1.9964, 1.9968, 1.9962, 1.9966, 10.0),
    ];
    let matches = detect(&bars);

    assert_eq!(matches.len(), 1);
    let m = matches[0];
    assert_eq!(m.direction, Direction::Bearish);
    assert_eq!(m.zone, Some((1.997, 2.0)));
    assert!((m.price - 1.9985).abs() < 1e-12);
    assert!((m.confidence - 0.9).abs() < 1e-12);
  }

  #[test]
  fn test_small_gap_ignored() {
    let bars = vec![
      Bar::new(0, 99.9, 100.0, 99.8, 99.95, 10.0),
      Bar::new(1, 100.03, 100.05, 100.01, 100.04, 10.0),
      Bar::new(2, 100.02, 100.03, 100.0, 100.02, 10.0),
    ];
    // gap 0.01 on 100.0 is 0.0001, below 0.0005
    assert!(detect(&bars).is_empty());
  }

  #[test]
  fn test_filled_gap_ignored() {
    // Third bar never trades back below the second bar's high
    let bars = vec![
      Bar::new(0, 0.999, 1.0, 0.998, 0.9995, 10.0),
      Bar::new(1, 1.0025, 1.003, 1.002, 1.0028, 10.0),
      Bar::new(2, 1.004, 1.006, 1.0035, 1.005, 10.0),
    ];
    assert!(detect(&bars).is_empty());
  }

  #[test]
  fn test_too_few_bars() {
    let bars = vec![Bar::new(0, 1.0, 1.0, 1.0, 1.0, 1.0); 2];
    assert!(detect(&bars).is_empty());
  }

  #[test]
  fn test_with_params() {
    let mut params = HashMap::new();
    params.insert("min_gap_ratio", 0.003);
    let d = FairValueGapDetector::with_params(&params).unwrap();
    assert_eq!(d.min_gap_ratio, 0.003);

    let bars = vec![
      Bar::new(0, 0.999, 1.0, 0.998, 0.9995, 10.0),
      Bar::new(1, 1.0025, 1.003, 1.002, 1.0028, 10.0),
      Bar::new(2, 1.0015, 1.002, 1.001, 1.0012, 10.0),
    ];
    assert!(d.detect(&bars, &[]).is_empty());
  }
}
