//! Common helper functions for market-structure pattern detection
//!
//! The confidence scorer shared by every detector, plus window scans over bars.

use crate::OHLCV;

// ============================================================
// CONFIDENCE CAPS
// ============================================================

/// BOS confidence never exceeds this
pub const STRUCTURE_CONFIDENCE_CAP: f64 = 0.95;
/// FVG confidence never exceeds this
pub const GAP_CONFIDENCE_CAP: f64 = 0.9;
/// OB confidence never exceeds this
pub const REJECTION_CONFIDENCE_CAP: f64 = 0.9;
/// LS confidence never exceeds this
pub const SWEEP_CONFIDENCE_CAP: f64 = 0.85;

// ============================================================
// CONFIDENCE SCORER
// ============================================================

/// Map a raw magnitude to a confidence: `min(magnitude * scale, cap)`.
///
/// The result is always within [0.0, 1.0]; NaN input scores 0.0.
#[inline]
pub fn score(magnitude: f64, scale: f64, cap: f64) -> f64 {
    let raw = magnitude * scale;
    if raw.is_nan() {
        return 0.0;
    }
    clamp_unit(raw.min(cap))
}

/// Clamp into [0.0, 1.0]; NaN maps to 0.0.
#[inline]
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

// ============================================================
// WINDOW HELPERS
// ============================================================

/// Highest high over `bars[start..end]`, or None for an empty window.
#[inline]
pub fn window_high<T: OHLCV>(bars: &[T], start: usize, end: usize) -> Option<f64> {
    bars.get(start..end)?
        .iter()
        .map(|b| b.high())
        .fold(None, |acc, h| Some(acc.map_or(h, |a: f64| a.max(h))))
}

/// Lowest low over `bars[start..end]`, or None for an empty window.
#[inline]
pub fn window_low<T: OHLCV>(bars: &[T], start: usize, end: usize) -> Option<f64> {
    bars.get(start..end)?
        .iter()
        .map(|b| b.low())
        .fold(None, |acc, l| Some(acc.map_or(l, |a: f64| a.min(l))))
}

/// The `lag` bars after `index`, or None if the sequence ends before the
/// confirmation window is complete.
#[inline]
pub fn confirmation_window<T: OHLCV>(bars: &[T], index: usize, lag: usize) -> Option<&[T]> {
    if lag == 0 || index + lag >= bars.len() {
        return None;
    }
    Some(&bars[index + 1..=index + lag])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bar;

    fn flat(i: i64, h: f64, l: f64) -> Bar {
        Bar::new(i, (h + l) / 2.0, h, l, (h + l) / 2.0, 1.0)
    }

    #[test]
    fn test_score_caps() {
        assert_eq!(score(0.002, 1000.0, GAP_CONFIDENCE_CAP), 0.9);
        assert!((score(0.0006, 1000.0, GAP_CONFIDENCE_CAP) - 0.6).abs() < 1e-12);
        assert_eq!(score(5.0, 1.0, 1.5), 1.0);
    }

    #[test]
    fn test_score_never_negative() {
        assert_eq!(score(-0.4, 1.0, SWEEP_CONFIDENCE_CAP), 0.0);
        assert_eq!(score(f64::NAN, 1.0, 0.9), 0.0);
        assert_eq!(score(f64::INFINITY, 1.0, 0.9), 0.9);
    }

    #[test]
    fn test_window_extremes() {
        let bars = vec![flat(0, 2.0, 1.0), flat(1, 5.0, 0.5), flat(2, 3.0, 2.0)];
        assert_eq!(window_high(&bars, 0, 3), Some(5.0));
        assert_eq!(window_low(&bars, 0, 3), Some(0.5));
        assert_eq!(window_high(&bars, 2, 3), Some(3.0));
        assert_eq!(window_high(&bars, 1, 1), None);
        assert_eq!(window_low(&bars, 2, 9), None);
    }

    #[test]
    fn test_confirmation_window() {
        let bars: Vec<Bar> = (0..10).map(|i| flat(i, 2.0, 1.0)).collect();
        assert_eq!(confirmation_window(&bars, 4, 5).map(|w| w.len()), Some(5));
        assert!(confirmation_window(&bars, 5, 5).is_none());
        assert!(confirmation_window(&bars, 0, 0).is_none());
    }
}
