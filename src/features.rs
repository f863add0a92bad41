//! Fixed-width feature vectors for external classifiers
//!
//! Layout (all taken at the last bar):
//!
//! | slot | feature |
//! |---|---|
//! | 0 | close |
//! | 1 | close change vs previous bar (fraction) |
//! | 2 | 5-bar mean close |
//! | 3 | 20-bar mean close |
//! | 4 | volume |
//! | 5 | 5-bar mean volume |
//! | 6 | high - low |
//! | 7 | 5-bar mean of high - low |
//! | 8.. | 0.0 |
//!
//! Any value whose window is longer than the data is 0.0.

use crate::{OHLCVExt, PatternError, Result, OHLCV};

/// Width of every feature vector
pub const FEATURE_LEN: usize = 70;

/// Slots actually populated by [`extract`]
pub const POPULATED_FEATURES: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector([f64; FEATURE_LEN]);

impl Default for FeatureVector {
    fn default() -> Self {
        Self([0.0; FEATURE_LEN])
    }
}

impl FeatureVector {
    pub fn new(values: [f64; FEATURE_LEN]) -> Self {
        Self(values)
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<f64> {
        self.0.get(index).copied()
    }
}

/// Mean of the last `period` values, or 0.0 if there are fewer.
fn trailing_mean(values: impl ExactSizeIterator<Item = f64> + DoubleEndedIterator, period: usize) -> f64 {
    if period == 0 || values.len() < period {
        return 0.0;
    }
    values.rev().take(period).sum::<f64>() / period as f64
}

/// Feature vector describing the tail of `bars`.
pub fn extract<T: OHLCV>(bars: &[T]) -> Result<FeatureVector> {
    let Some(last) = bars.last() else {
        return Err(PatternError::InsufficientData { need: 1, got: 0 });
    };

    let closes = || bars.iter().map(|b| b.close());
    let change = match bars.len().checked_sub(2).map(|i| bars[i].close()) {
        Some(prev) if prev != 0.0 => (last.close() - prev) / prev,
        _ => 0.0,
    };

    let mut values = [0.0; FEATURE_LEN];
    values[..POPULATED_FEATURES].copy_from_slice(&[
        last.close(),
        change,
        trailing_mean(closes(), 5),
        trailing_mean(closes(), 20),
        last.volume(),
        trailing_mean(bars.iter().map(|b| b.volume()), 5),
        last.range(),
        trailing_mean(bars.iter().map(|b| b.range()), 5),
    ]);

    for v in &mut values {
        if !v.is_finite() {
            *v = 0.0;
        }
    }

    Ok(FeatureVector(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bar;

    fn bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let c = 10.0 + i as f64;
                Bar::new(i as i64, c, c + 1.0, c - 1.0, c, 100.0 * (i + 1) as f64)
            })
            .collect()
    }

    #[test]
    fn test_empty_is_error() {
        let empty: Vec<Bar> = vec![];
        assert!(matches!(extract(&empty), Err(PatternError::InsufficientData { .. })));
    }

    #[test]
    fn test_width_and_padding() {
        let f = extract(&bars(30)).unwrap();
        assert_eq!(f.as_slice().len(), FEATURE_LEN);
        assert!(f.as_slice()[POPULATED_FEATURES..].iter().all(|&v| v == 0.0));
        assert_eq!(f.get(FEATURE_LEN), None);
    }

    #[test]
    fn test_values() {
        let f = extract(&bars(30)).unwrap();
        assert_eq!(f.get(0), Some(39.0));
        assert!((f.get(1).unwrap() - 1.0 / 38.0).abs() < 1e-12);
        assert_eq!(f.get(2), Some(37.0));
        assert_eq!(f.get(3), Some(29.5));
        assert_eq!(f.get(4), Some(3000.0));
        assert_eq!(f.get(5), Some(2800.0));
        assert_eq!(f.get(6), Some(2.0));
        assert_eq!(f.get(7), Some(2.0));
    }

    #[test]
    fn test_short_history_zeroes_long_windows() {
        let f = extract(&bars(3)).unwrap();
        assert_eq!(f.get(0), Some(12.0));
        assert_eq!(f.get(2), Some(0.0));
        assert_eq!(f.get(3), Some(0.0));

        let single = extract(&bars(1)).unwrap();
        assert_eq!(single.get(1), Some(0.0));
    }
}
