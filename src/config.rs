//! Scanner configuration
//!
//! Every tunable constant of the engine, detectors and store in one
//! serde-friendly struct. Missing keys take their defaults, so an empty
//! document is a valid configuration.
//!
//! ```rust
//! use yasmc::prelude::*;
//!
//! let config = ScannerConfig { min_gap_ratio: 0.001, ..Default::default() };
//! let engine = EngineBuilder::from_config(&config).unwrap().build().unwrap();
//! assert_eq!(engine.detector_count(), 5);
//! ```

use crate::{
    detectors::{
        CharacterChangeDetector, FairValueGapDetector, LiquiditySweepDetector,
        OrderBlockDetector, StructureBreakDetector, GAP_CONFIDENCE_CAP, REJECTION_CONFIDENCE_CAP,
        STRUCTURE_CONFIDENCE_CAP, SWEEP_CONFIDENCE_CAP,
    },
    BuiltinDetector, DefaultContextProvider, EngineBuilder, PatternError, Period, Ratio, Result,
    DEFAULT_MIN_BARS,
};

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    // swings / BOS
    pub swing_window: usize,
    pub momentum_lookback: usize,
    pub momentum_threshold: f64,

    // CHoCH
    pub short_ma_period: usize,
    pub long_ma_period: usize,
    pub trend_lag: usize,
    pub volume_lookback: usize,
    pub choch_min_confidence: f64,

    // FVG
    pub min_gap_ratio: f64,

    // OB
    pub rejection_body_multiple: f64,
    pub rejection_wick_share: f64,
    /// Percent, not a fraction
    pub min_continuation_pct: f64,

    // LS
    pub sweep_lookback: usize,
    pub sweep_start_index: usize,
    pub min_reversal: f64,

    /// Bars after a candidate inspected by OB and LS
    pub confirmation_lag: usize,

    // store
    pub retention_hours: i64,
    pub read_limit: usize,

    /// Sequences shorter than this produce no patterns
    pub min_bars: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            swing_window: 2,
            momentum_lookback: 10,
            momentum_threshold: 0.6,
            short_ma_period: 20,
            long_ma_period: 50,
            trend_lag: 10,
            volume_lookback: 10,
            choch_min_confidence: 0.7,
            min_gap_ratio: 0.0005,
            rejection_body_multiple: 2.0,
            rejection_wick_share: 0.6,
            min_continuation_pct: 0.3,
            sweep_lookback: 10,
            sweep_start_index: 15,
            min_reversal: 0.5,
            confirmation_lag: 5,
            retention_hours: 24,
            read_limit: 50,
            min_bars: DEFAULT_MIN_BARS,
        }
    }
}

impl ScannerConfig {
    /// Context provider carrying the moving-average, volume and momentum windows.
    pub fn context_provider(&self) -> Result<DefaultContextProvider> {
        Ok(DefaultContextProvider {
            short_ma_period: Period::new(self.short_ma_period)?,
            long_ma_period: Period::new(self.long_ma_period)?,
            volume_period: Period::new(self.volume_lookback)?,
            momentum_period: Period::new(self.momentum_lookback)?,
            ..Default::default()
        })
    }

    /// The five detectors, in BOS, CHoCH, FVG, OB, LS order.
    pub fn detectors(&self) -> Result<[BuiltinDetector; 5]> {
        let lag = Period::new(self.confirmation_lag)?;

        Ok([
            BuiltinDetector::StructureBreak(StructureBreakDetector {
                swing_window: Period::new(self.swing_window)?,
                momentum_threshold: Ratio::new(self.momentum_threshold)?,
                confidence_cap: Ratio::new_const(STRUCTURE_CONFIDENCE_CAP),
            }),
            BuiltinDetector::CharacterChange(CharacterChangeDetector {
                trend_lag: Period::new(self.trend_lag)?,
                min_confidence: Ratio::new(self.choch_min_confidence)?,
                ..Default::default()
            }),
            BuiltinDetector::FairValueGap(FairValueGapDetector {
                min_gap_ratio: Ratio::new(self.min_gap_ratio)?.get(),
                confidence_cap: Ratio::new_const(GAP_CONFIDENCE_CAP),
                ..Default::default()
            }),
            BuiltinDetector::OrderBlock(OrderBlockDetector {
                body_multiple: self.rejection_body_multiple,
                wick_share: Ratio::new(self.rejection_wick_share)?,
                min_continuation_pct: self.min_continuation_pct,
                confirmation_lag: lag,
                confidence_cap: Ratio::new_const(REJECTION_CONFIDENCE_CAP),
                ..Default::default()
            }),
            BuiltinDetector::LiquiditySweep(LiquiditySweepDetector {
                lookback: Period::new(self.sweep_lookback)?,
                start_index: self.sweep_start_index,
                confirmation_lag: lag,
                min_reversal: Ratio::new(self.min_reversal)?,
                confidence_cap: Ratio::new_const(SWEEP_CONFIDENCE_CAP),
            }),
        ])
    }

    /// Pattern retention window
    pub fn retention(&self) -> Result<chrono::Duration> {
        if self.retention_hours <= 0 {
            return Err(PatternError::InvalidConfig(format!(
                "retention_hours must be positive, got {}",
                self.retention_hours
            )));
        }
        chrono::Duration::try_hours(self.retention_hours).ok_or_else(|| {
            PatternError::InvalidConfig(format!("retention_hours {} overflows", self.retention_hours))
        })
    }
}

impl EngineBuilder<DefaultContextProvider> {
    /// Builder preloaded with the context provider, the five detectors and
    /// `min_bars` from `config`. Every detector is validated on the way in.
    pub fn from_config(config: &ScannerConfig) -> Result<Self> {
        let mut builder = Self::new()
            .context_provider(config.context_provider()?)
            .min_bars(config.min_bars);
        for detector in config.detectors()? {
            builder = builder.add_checked(detector)?;
        }
        Ok(builder)
    }
}
