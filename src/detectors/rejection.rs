//! Order block detector
//!
//! A strong rejection candle (dominant wick) followed by continuation in the
//! rejection's direction within the confirmation window.

use std::collections::HashMap;

use super::helpers::{confirmation_window, score, REJECTION_CONFIDENCE_CAP};
use crate::{
    params::{get_count, get_factor, get_period, get_ratio, ParamMeta, ParameterizedDetector},
    Direction, MarketContext, OHLCVExt, PatternDetector, PatternError, PatternKind, PatternMatch,
    Period, Ratio, Result, OHLCV,
};

impl_with_defaults!(OrderBlockDetector);

/// Shortest sequence scanned for order blocks
pub const MIN_REJECTION_BARS: usize = 10;

/// OB - rejection candle whose wick exceeds `body_multiple` x body and
/// `wick_share` of the range, confirmed by a move of more than
/// `min_continuation_pct` percent over the next `confirmation_lag` closes.
#[derive(Debug, Clone)]
pub struct OrderBlockDetector {
    pub body_multiple: f64,
    pub wick_share: Ratio,
    /// Percent (0.3 = 0.3%)
    pub min_continuation_pct: f64,
    pub confirmation_lag: Period,
    /// First bar index examined
    pub start_index: usize,
    pub confidence_cap: Ratio,
}

impl Default for OrderBlockDetector {
    fn default() -> Self {
        Self {
            body_multiple: 2.0,
            wick_share: Ratio::new_const(0.6),
            min_continuation_pct: 0.3,
            confirmation_lag: Period::new_const(5),
            start_index: 5,
            confidence_cap: Ratio::new_const(REJECTION_CONFIDENCE_CAP),
        }
    }
}

impl OrderBlockDetector {
    #[inline]
    fn is_rejection(&self, wick: f64, body: f64, range: f64) -> bool {
        wick > body * self.body_multiple && wick > range * self.wick_share.get()
    }

    /// Percent move from `close` to the best close of the window, floored at 0.
    fn continuation<T: OHLCV>(window: &[T], close: f64, up: bool) -> f64 {
        if close <= 0.0 {
            return 0.0;
        }
        let closes = window.iter().map(|b| b.close());
        let movement = if up {
            closes.fold(f64::NEG_INFINITY, f64::max) - close
        } else {
            close - closes.fold(f64::INFINITY, f64::min)
        };
        (movement / close * 100.0).max(0.0)
    }
}

impl PatternDetector for OrderBlockDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::Ob
    }

    fn min_bars(&self) -> usize {
        MIN_REJECTION_BARS
    }

    fn detect<T: OHLCV>(&self, bars: &[T], _contexts: &[MarketContext]) -> Vec<PatternMatch> {
        let lag = self.confirmation_lag.get();
        let mut results = Vec::new();

        for i in self.start_index..bars.len() {
            let bar = &bars[i];
            let range = bar.range();
            if range <= 0.0 {
                continue;
            }
            let Some(window) = confirmation_window(bars, i, lag) else {
                // every later candidate is even closer to the end
                break;
            };

            let body = bar.body();
            let (direction, wick, price) = if self.is_rejection(bar.lower_wick(), body, range) {
                (Direction::Bullish, bar.lower_wick(), bar.low())
            } else if self.is_rejection(bar.upper_wick(), body, range) {
                (Direction::Bearish, bar.upper_wick(), bar.high())
            } else {
                continue;
            };

            let moved = Self::continuation(window, bar.close(), direction.is_bullish());
            if moved <= self.min_continuation_pct {
                continue;
            }

            let strength = wick / range;
            results.push(PatternMatch {
                kind: PatternKind::Ob,
                direction,
                price,
                confidence: score(strength, 1.0, self.confidence_cap.get()),
                magnitude: strength,
                index: i,
                start_index: i,
                end_index: i + lag,
                zone: None,
            });
        }

        results
    }

    fn validate_config(&self) -> Result<()> {
        if !self.body_multiple.is_finite() || self.body_multiple < 0.0 {
            return Err(PatternError::InvalidConfig(
                "body_multiple must be finite and non-negative".into(),
            ));
        }
        if !self.min_continuation_pct.is_finite() || self.min_continuation_pct < 0.0 {
            return Err(PatternError::InvalidConfig(
                "min_continuation_pct must be finite and non-negative".into(),
            ));
        }
        Ok(())
    }
}

static ORDER_BLOCK_PARAMS: &[ParamMeta] = &[
    ParamMeta::factor("body_multiple", 2.0, (1.0, 4.0, 0.5), "Wick must exceed this multiple of the body"),
    ParamMeta::ratio("wick_share", 0.6, (0.4, 0.9, 0.05), "Wick must exceed this share of the range"),
    ParamMeta::factor(
        "min_continuation_pct",
        0.3,
        (0.1, 1.0, 0.1),
        "Minimum follow-through, in percent of the close",
    ),
    ParamMeta::period("confirmation_lag", 5.0, (3.0, 10.0, 1.0), "Bars inspected for follow-through"),
    ParamMeta::count("start_index", 5.0, (0.0, 20.0, 1.0), "First bar considered as a candidate"),
    ParamMeta::ratio("confidence_cap", 0.9, (0.5, 1.0, 0.05), "Upper bound on confidence"),
];

impl ParameterizedDetector for OrderBlockDetector {
    fn param_meta() -> &'static [ParamMeta] {
        ORDER_BLOCK_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            body_multiple: get_factor(params, "body_multiple", 2.0)?,
            wick_share: get_ratio(params, "wick_share", 0.6)?,
            min_continuation_pct: get_factor(params, "min_continuation_pct", 0.3)?,
            confirmation_lag: get_period(params, "confirmation_lag", 5)?,
            start_index: get_count(params, "start_index", 5)?,
            confidence_cap: get_ratio(params, "confidence_cap", REJECTION_CONFIDENCE_CAP)?,
        })
    }

    fn pattern_id_str() -> &'static str {
        "OB"
    }
}
