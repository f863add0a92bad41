//! Swing point extraction
//!
//! A bar is a swing high when its high is strictly above the highs of the `w`
//! bars on either side; a swing low mirrors this with lows.

use crate::OHLCV;

/// Default half-width of the symmetric swing window (5 bars in total)
pub const DEFAULT_SWING_WINDOW: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SwingKind {
    High,
    Low,
}

/// Local extremum found in a bar sequence
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SwingPoint {
    pub index: usize,
    pub price: f64,
    pub timestamp: i64,
    pub kind: SwingKind,
}

/// Swing highs and lows, each in sequence order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Swings {
    pub highs: Vec<SwingPoint>,
    pub lows: Vec<SwingPoint>,
}

impl Swings {
    pub fn is_empty(&self) -> bool {
        self.highs.is_empty() && self.lows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.highs.len() + self.lows.len()
    }
}

/// Extract swing highs and lows with a symmetric window of half-width `window`.
///
/// Returns no swings when `window` is 0 or the sequence is shorter than
/// `2 * window + 1`.
pub fn extract_swings<T: OHLCV>(bars: &[T], window: usize) -> Swings {
    let mut swings = Swings::default();
    let n = bars.len();
    if window == 0 || n < 2 * window + 1 {
        return swings;
    }

    for i in window..n - window {
        let bar = &bars[i];
        let mut neighbours = (i - window..=i + window).filter(|&j| j != i);

        if neighbours.clone().all(|j| bar.high() > bars[j].high()) {
            swings.highs.push(SwingPoint {
                index: i,
                price: bar.high(),
                timestamp: bar.timestamp(),
                kind: SwingKind::High,
            });
        }

        if neighbours.all(|j| bar.low() < bars[j].low()) {
            swings.lows.push(SwingPoint {
                index: i,
                price: bar.low(),
                timestamp: bar.timestamp(),
                kind: SwingKind::Low,
            });
        }
    }

    swings
}
