//! Structure detectors: break of structure (BOS) and change of character (CHoCH)

use std::collections::HashMap;

use super::{
    helpers::{clamp_unit, score, STRUCTURE_CONFIDENCE_CAP},
    swing::{extract_swings, SwingPoint, DEFAULT_SWING_WINDOW},
};
use crate::{
    params::{get_factor, get_period, get_ratio, ParamMeta, ParameterizedDetector},
    Direction, MarketContext, PatternDetector, PatternError, PatternKind, PatternMatch, Period,
    Ratio, Result, OHLCV,
};

impl_with_defaults!(StructureBreakDetector, CharacterChangeDetector);

// ============================================================
// BREAK OF STRUCTURE
// ============================================================

/// Bars needed before momentum (10-bar lookback) can confirm a break
pub const MIN_STRUCTURE_BARS: usize = 10;

/// BOS - a swing extreme beyond the previous one, confirmed by momentum.
///
/// Only the most recent qualifying break per direction is reported.
#[derive(Debug, Clone)]
pub struct StructureBreakDetector {
    /// Half-width of the swing window
    pub swing_window: Period,
    /// |momentum| must exceed this
    pub momentum_threshold: Ratio,
    pub confidence_cap: Ratio,
}

impl Default for StructureBreakDetector {
    fn default() -> Self {
        Self {
            swing_window: Period::new_const(DEFAULT_SWING_WINDOW),
            momentum_threshold: Ratio::new_const(0.6),
            confidence_cap: Ratio::new_const(STRUCTURE_CONFIDENCE_CAP),
        }
    }
}

impl StructureBreakDetector {
    /// Latest break among consecutive swing pairs. `higher` selects bullish
    /// breaks of swing highs, otherwise bearish breaks of swing lows.
    fn latest_break(
        &self,
        swings: &[SwingPoint],
        contexts: &[MarketContext],
        higher: bool,
    ) -> Option<PatternMatch> {
        let threshold = self.momentum_threshold.get();
        let mut latest = None;

        for pair in swings.windows(2) {
            let (prev, curr) = (pair[0], pair[1]);
            let broken = if higher {
                curr.price > prev.price
            } else {
                curr.price < prev.price
            };
            if !broken {
                continue;
            }

            let momentum = contexts.get(curr.index).map_or(0.0, |c| c.momentum);
            let confirmed = if higher {
                momentum > threshold
            } else {
                momentum < -threshold
            };
            if !confirmed {
                continue;
            }

            latest = Some(PatternMatch {
                kind: PatternKind::Bos,
                direction: if higher {
                    Direction::Bullish
                } else {
                    Direction::Bearish
                },
                price: curr.price,
                confidence: score(momentum.abs(), 1.0, self.confidence_cap.get()),
                magnitude: momentum,
                index: curr.index,
                start_index: prev.index,
                end_index: curr.index,
                zone: None,
            });
        }

        latest
    }
}

impl PatternDetector for StructureBreakDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::Bos
    }

    fn min_bars(&self) -> usize {
        MIN_STRUCTURE_BARS.max(2 * self.swing_window.get() + 1)
    }

    fn detect<T: OHLCV>(&self, bars: &[T], contexts: &[MarketContext]) -> Vec<PatternMatch> {
        let swings = extract_swings(bars, self.swing_window.get());

        [
            self.latest_break(&swings.highs, contexts, true),
            self.latest_break(&swings.lows, contexts, false),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

// ============================================================
// CHANGE OF CHARACTER
// ============================================================

/// CHoCH - the sign of (short MA - long MA) differs from its sign `trend_lag`
/// bars earlier.
///
/// Confidence = clamp(|MA separation| * separation_scale
/// + volume / trailing mean volume * volume_weight, 0, 1).
#[derive(Debug, Clone)]
pub struct CharacterChangeDetector {
    /// Bars between the two trend readings
    pub trend_lag: Period,
    /// Confidence must exceed this
    pub min_confidence: Ratio,
    pub separation_scale: f64,
    pub volume_weight: f64,
}

impl Default for CharacterChangeDetector {
    fn default() -> Self {
        Self {
            trend_lag: Period::new_const(10),
            min_confidence: Ratio::new_const(0.7),
            separation_scale: 1000.0,
            volume_weight: 0.1,
        }
    }
}

impl PatternDetector for CharacterChangeDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::Choch
    }

    fn min_bars(&self) -> usize {
        self.trend_lag.get() + 1
    }

    fn detect<T: OHLCV>(&self, bars: &[T], contexts: &[MarketContext]) -> Vec<PatternMatch> {
        let lag = self.trend_lag.get();
        let n = bars.len().min(contexts.len());
        let mut results = Vec::new();

        for i in lag..n {
            let (ctx, prev) = (&contexts[i], &contexts[i - lag]);
            // An undefined moving average carries no trend sign
            let (Some(short), Some(long), Some(prev_short), Some(prev_long)) =
                (ctx.ma_short, ctx.ma_long, prev.ma_short, prev.ma_long)
            else {
                continue;
            };

            let rising = short > long;
            if rising == (prev_short > prev_long) {
                continue;
            }

            let separation = (short - long).abs();
            let volume_factor = if ctx.avg_volume > 0.0 {
                bars[i].volume() / ctx.avg_volume
            } else {
                0.0
            };
            let confidence =
                clamp_unit(separation * self.separation_scale + volume_factor * self.volume_weight);

            if confidence > self.min_confidence.get() {
                results.push(PatternMatch {
                    kind: PatternKind::Choch,
                    direction: if rising {
                        Direction::Bullish
                    } else {
                        Direction::Bearish
                    },
                    price: bars[i].close(),
                    confidence,
                    magnitude: separation,
                    index: i,
                    start_index: i - lag,
                    end_index: i,
                    zone: None,
                });
            }
        }

        results
    }

    fn validate_config(&self) -> Result<()> {
        if !self.separation_scale.is_finite() || self.separation_scale < 0.0 {
            return Err(PatternError::InvalidConfig(
                "separation_scale must be finite and non-negative".into(),
            ));
        }
        if !self.volume_weight.is_finite() || self.volume_weight < 0.0 {
            return Err(PatternError::InvalidConfig(
                "volume_weight must be finite and non-negative".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================
// PARAMETER METADATA
// ============================================================

static STRUCTURE_BREAK_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("swing_window", 2.0, (1.0, 5.0, 1.0), "Half-width of the swing window"),
    ParamMeta::ratio(
        "momentum_threshold",
        0.6,
        (0.3, 0.9, 0.1),
        "Minimum |momentum| confirming a break",
    ),
    ParamMeta::ratio("confidence_cap", 0.95, (0.5, 1.0, 0.05), "Upper bound on confidence"),
];

static CHARACTER_CHANGE_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("trend_lag", 10.0, (5.0, 20.0, 1.0), "Bars between trend readings"),
    ParamMeta::ratio("min_confidence", 0.7, (0.5, 0.9, 0.05), "Emit only above this confidence"),
    ParamMeta::factor(
        "separation_scale",
        1000.0,
        (100.0, 5000.0, 100.0),
        "Multiplier on |short MA - long MA|",
    ),
    ParamMeta::factor(
        "volume_weight",
        0.1,
        (0.0, 0.5, 0.05),
        "Weight of relative volume in confidence",
    ),
];

impl ParameterizedDetector for StructureBreakDetector {
    fn param_meta() -> &'static [ParamMeta] {
        STRUCTURE_BREAK_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            swing_window: get_period(params, "swing_window", DEFAULT_SWING_WINDOW)?,
            momentum_threshold: get_ratio(params, "momentum_threshold", 0.6)?,
            confidence_cap: get_ratio(params, "confidence_cap", STRUCTURE_CONFIDENCE_CAP)?,
        })
    }

    fn pattern_id_str() -> &'static str {
        "BOS"
    }
}

impl ParameterizedDetector for CharacterChangeDetector {
    fn param_meta() -> &'static [ParamMeta] {
        CHARACTER_CHANGE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            trend_lag: get_period(params, "trend_lag", 10)?,
            min_confidence: get_ratio(params, "min_confidence", 0.7)?,
            separation_scale: get_factor(params, "separation_scale", 1000.0)?,
            volume_weight: get_factor(params, "volume_weight", 0.1)?,
        })
    }

    fn pattern_id_str() -> &'static str {
        "CHoCH"
    }
}
