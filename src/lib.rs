//! # YASMC - Yet Another Smart-Money-Concept scanner
//!
//! Market-structure pattern detection over OHLCV bar sequences: structure
//! breaks (BOS), character changes (CHoCH), fair value gaps (FVG), order
//! blocks (OB) and liquidity sweeps (LS), plus confidence-weighted ensemble
//! voting over independent predictions.
//!
//! ## Quick Start
//!
//! ```rust
//! use yasmc::prelude::*;
//!
//! // Create engine with the five default detectors
//! let engine = EngineBuilder::new()
//!     .with_all_defaults()
//!     .build()
//!     .unwrap();
//!
//! // Scan your data
//! let bars: Vec<Bar> = vec![];
//! let patterns = engine.detect_patterns(&bars, "EURUSD", "1h").unwrap();
//! assert!(patterns.is_empty());
//!
//! // Combine predictions from independent sources
//! let decision = aggregate(&[]);
//! assert_eq!(decision.pattern_label(), "UNKNOWN");
//! ```

pub mod config;
pub mod detectors;
pub mod ensemble;
pub mod features;
pub mod params;
pub mod store;

pub mod prelude {
    pub use crate::{
        // Configuration
        config::ScannerConfig,
        // Detectors
        detectors::*,
        // Ensemble
        ensemble::{aggregate, Classification, Decision, Ensemble, EnsembleMethod, Prediction, PredictionSource},
        // Features
        features::{extract, FeatureVector, FEATURE_LEN},
        // Parameters
        params::{get_factor, get_period, get_ratio, ParamMeta, ParamType, ParameterizedDetector},
        // Parallel
        scan_parallel,
        // Store
        store::PatternStore,
        // Types
        Bar,
        // Engine
        BuiltinDetector,
        ContextProvider,
        DefaultContextProvider,
        DefaultEngine,
        Direction,
        // Core traits
        DynPatternDetector,
        EngineBuilder,
        MarketContext,
        OHLCVExt,
        Pattern,
        PatternData,
        PatternDetector,
        PatternEngine,
        // Errors
        PatternError,
        PatternKind,
        PatternMatch,
        Period,
        Ratio,
        Result,
        ScanError,
        ScanResult,
        OHLCV,
    };
}

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, PatternError>;

/// Errors raised at API boundaries (configuration, validation, inputs).
///
/// Detection itself never fails: short sequences, flat bars and empty
/// ensembles all degrade to "nothing found".
#[derive(Debug, Clone, thiserror::Error)]
pub enum PatternError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Insufficient data: need {need} bars, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("Invalid OHLCV at index {index}: {reason}")]
    InvalidOHLCV { index: usize, reason: &'static str },

    #[error("Timestamp at index {index} is not strictly after the previous bar")]
    UnorderedTimestamps { index: usize },
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(PatternError::InvalidValue(
                "Ratio cannot be NaN or infinite",
            ));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(PatternError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    /// Create a Ratio from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    /// Clamp any finite value into [0.0, 1.0]; NaN maps to 0.0.
    pub fn saturating(value: f64) -> Self {
        if value.is_nan() {
            Self(0.0)
        } else {
            Self(value.clamp(0.0, 1.0))
        }
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Period (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(PatternError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
///
/// Timestamps are milliseconds since the Unix epoch. A bar sequence must be
/// ordered by strictly increasing timestamp.
pub trait OHLCV {
    fn timestamp(&self) -> i64;
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;
}

/// Blanket impl for references to dyn OHLCV
impl OHLCV for &dyn OHLCV {
    fn timestamp(&self) -> i64 {
        (*self).timestamp()
    }

    fn open(&self) -> f64 {
        (*self).open()
    }

    fn high(&self) -> f64 {
        (*self).high()
    }

    fn low(&self) -> f64 {
        (*self).low()
    }

    fn close(&self) -> f64 {
        (*self).close()
    }

    fn volume(&self) -> f64 {
        (*self).volume()
    }
}

/// Extension trait with computed properties for OHLCV data
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn body(&self) -> f64 {
        (self.close() - self.open()).abs()
    }

    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    #[inline]
    fn upper_wick(&self) -> f64 {
        self.high() - self.open().max(self.close())
    }

    #[inline]
    fn lower_wick(&self) -> f64 {
        self.open().min(self.close()) - self.low()
    }

    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    #[inline]
    fn is_bearish(&self) -> bool {
        self.close() < self.open()
    }

    /// Upper wick as ratio of range. Returns None for a flat bar
    #[inline]
    fn upper_wick_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range > 0.0).then(|| self.upper_wick() / range)
    }

    /// Lower wick as ratio of range. Returns None for a flat bar
    #[inline]
    fn lower_wick_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range > 0.0).then(|| self.lower_wick() / range)
    }

    /// Bar open time as an instant, if the timestamp is representable
    fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp())
    }

    /// Validate OHLCV data consistency
    fn validate(&self) -> Result<()> {
        let values = [self.open(), self.high(), self.low(), self.close(), self.volume()];
        if values.iter().any(|v| v.is_nan()) {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "NaN in OHLCV",
            });
        }
        if values.iter().any(|v| v.is_infinite()) {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "Infinite value in OHLCV",
            });
        }
        if self.high() < self.low() {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "high < low",
            });
        }
        if self.low() > self.open().min(self.close()) {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "low above open/close",
            });
        }
        if self.high() < self.open().max(self.close()) {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "high below open/close",
            });
        }
        if self.volume() < 0.0 {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "negative volume",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV> OHLCVExt for T {}

/// Plain OHLCV bar
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bar {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl OHLCV for Bar {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }
}

// ============================================================
// PATTERN MATCH - result of detection (Copy, no allocations)
// ============================================================

/// Market-structure pattern type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PatternKind {
    /// Break of structure
    #[serde(rename = "BOS")]
    Bos,
    /// Change of character
    #[serde(rename = "CHoCH")]
    Choch,
    /// Fair value gap
    #[serde(rename = "FVG")]
    Fvg,
    /// Order block
    #[serde(rename = "OB")]
    Ob,
    /// Liquidity sweep
    #[serde(rename = "LS")]
    Ls,
}

impl PatternKind {
    pub const ALL: [PatternKind; 5] = [
        PatternKind::Bos,
        PatternKind::Choch,
        PatternKind::Fvg,
        PatternKind::Ob,
        PatternKind::Ls,
    ];

    /// Returns the short identifier
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::Bos => "BOS",
            PatternKind::Choch => "CHoCH",
            PatternKind::Fvg => "FVG",
            PatternKind::Ob => "OB",
            PatternKind::Ls => "LS",
        }
    }

    /// Name of the raw magnitude a detector of this kind reports
    pub fn magnitude_label(&self) -> &'static str {
        match self {
            PatternKind::Bos => "momentum",
            PatternKind::Choch => "ma_separation",
            PatternKind::Fvg => "gap_size",
            PatternKind::Ob => "rejection_strength",
            PatternKind::Ls => "reversal_strength",
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction/bias of a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Bullish,
    Neutral,
    Bearish,
}

impl Direction {
    #[inline]
    pub fn is_bullish(self) -> bool {
        matches!(self, Direction::Bullish)
    }

    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, Direction::Bearish)
    }

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Bullish => "BULLISH",
            Direction::Neutral => "NEUTRAL",
            Direction::Bearish => "BEARISH",
        }
    }

    fn title(self) -> &'static str {
        match self {
            Direction::Bullish => "Bullish",
            Direction::Neutral => "Neutral",
            Direction::Bearish => "Bearish",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of pattern detection - Copy, no allocations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternMatch {
    pub kind: PatternKind,
    pub direction: Direction,
    /// Price level the pattern refers to
    pub price: f64,
    /// Confidence score 0.0..=1.0
    pub confidence: f64,
    /// Raw magnitude behind the confidence (see [`PatternKind::magnitude_label`])
    pub magnitude: f64,
    /// Triggering bar; the pattern inherits its timestamp
    pub index: usize,
    pub start_index: usize,
    /// Last bar examined, including any confirmation window
    pub end_index: usize,
    /// Price band for zone patterns (FVG): (lower, upper)
    pub zone: Option<(f64, f64)>,
}

/// Auxiliary data attached to an emitted [`Pattern`]
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PatternData {
    pub pair: String,
    pub magnitude: f64,
    pub magnitude_label: String,
    pub start_index: usize,
    pub end_index: usize,
}

/// Fully labelled pattern, as handed to collaborators
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Pattern {
    #[serde(rename = "type")]
    pub kind: PatternKind,
    pub direction: Direction,
    pub price: f64,
    pub confidence: f64,
    pub timeframe: String,
    /// Milliseconds since the Unix epoch, inherited from the triggering bar
    pub timestamp: i64,
    pub description: String,
    pub data: PatternData,
}

impl Pattern {
    /// Label a raw match with its instrument, timeframe and triggering bar.
    ///
    /// Returns None when the match index is outside `bars`.
    pub fn from_match<T: OHLCV>(
        m: &PatternMatch,
        bars: &[T],
        pair: &str,
        timeframe: &str,
    ) -> Option<Self> {
        let bar = bars.get(m.index)?;
        Some(Self {
            kind: m.kind,
            direction: m.direction,
            price: m.price,
            confidence: m.confidence.clamp(0.0, 1.0),
            timeframe: timeframe.to_string(),
            timestamp: bar.timestamp(),
            description: describe(m),
            data: PatternData {
                pair: pair.to_string(),
                magnitude: m.magnitude,
                magnitude_label: m.kind.magnitude_label().to_string(),
                start_index: m.start_index,
                end_index: m.end_index,
            },
        })
    }

    /// Pattern time as an instant, if the timestamp is representable
    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

fn describe(m: &PatternMatch) -> String {
    match (m.kind, m.zone) {
        (PatternKind::Choch, _) => format!("CHoCH to {} at {:.5}", m.direction, m.price),
        (PatternKind::Fvg, Some((lower, upper))) => {
            format!("{} FVG {:.5} - {:.5}", m.direction.title(), lower, upper)
        }
        (kind, _) => format!("{} {} at {:.5}", m.direction.title(), kind, m.price),
    }
}

// ============================================================
// MARKET CONTEXT
// ============================================================

/// Per-bar indicator values shared by the detectors
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MarketContext {
    /// Short simple moving average of close; None until the window is full
    pub ma_short: Option<f64>,
    /// Long simple moving average of close; None until the window is full
    pub ma_long: Option<f64>,
    /// Mean volume of the trailing bars, NOT including the current bar (0.0 if none)
    pub avg_volume: f64,
    /// Scaled close-to-close change over the momentum lookback, clamped to [-1, 1]
    pub momentum: f64,
}

/// Provider of market context - precomputes context for all bars
pub trait ContextProvider: Send + Sync {
    fn compute_all<T: OHLCV>(&self, bars: &[T]) -> Vec<MarketContext>;
}

/// Default context provider using simple moving averages
#[derive(Debug, Clone)]
pub struct DefaultContextProvider {
    pub short_ma_period: Period,
    pub long_ma_period: Period,
    pub volume_period: Period,
    pub momentum_period: Period,
    /// Multiplier applied to the fractional change before clamping (100 = percent)
    pub momentum_scale: f64,
}

impl Default for DefaultContextProvider {
    fn default() -> Self {
        Self {
            short_ma_period: Period::new_const(20),
            long_ma_period: Period::new_const(50),
            volume_period: Period::new_const(10),
            momentum_period: Period::new_const(10),
            momentum_scale: 100.0,
        }
    }
}

impl ContextProvider for DefaultContextProvider {
    fn compute_all<T: OHLCV>(&self, bars: &[T]) -> Vec<MarketContext> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close()).collect();
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume()).collect();

        let ma_short = rolling_mean(&closes, self.short_ma_period.get());
        let ma_long = rolling_mean(&closes, self.long_ma_period.get());

        (0..bars.len())
            .map(|i| MarketContext {
                ma_short: ma_short[i],
                ma_long: ma_long[i],
                avg_volume: self.trailing_volume(&volumes, i),
                momentum: self.momentum(&closes, i),
            })
            .collect()
    }
}

impl DefaultContextProvider {
    /// Mean of volume over bars[i - period..i] (current bar excluded).
    fn trailing_volume(&self, volumes: &[f64], index: usize) -> f64 {
        let start = index.saturating_sub(self.volume_period.get());
        let slice = &volumes[start..index];
        if slice.is_empty() {
            return 0.0;
        }
        slice.iter().sum::<f64>() / slice.len() as f64
    }

    fn momentum(&self, closes: &[f64], index: usize) -> f64 {
        let period = self.momentum_period.get();
        if index < period {
            return 0.0;
        }
        let prev = closes[index - period];
        if prev.abs() <= f64::EPSILON {
            return 0.0;
        }
        let change = (closes[index] - prev) / prev * self.momentum_scale;
        if change.is_nan() {
            return 0.0;
        }
        change.clamp(-1.0, 1.0)
    }
}

/// Simple moving average with a running sum; `None` until `period` values are seen.
fn rolling_mean(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for (i, v) in values.iter().enumerate() {
        sum += v;
        if i >= period {
            sum -= values[i - period];
        }
        if i + 1 >= period {
            out.push(Some(sum / period as f64));
        } else {
            out.push(None);
        }
    }
    out
}

// ============================================================
// PATTERN DETECTOR TRAITS
// ============================================================

/// Generic pattern detector trait - for concrete types
///
/// A detector scans the whole sequence in one pass and returns its matches in
/// bar order. `contexts` is parallel to `bars`.
pub trait PatternDetector: Send + Sync {
    fn kind(&self) -> PatternKind;
    fn min_bars(&self) -> usize;
    fn detect<T: OHLCV>(&self, bars: &[T], contexts: &[MarketContext]) -> Vec<PatternMatch>;

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }
}

/// Object-safe pattern detector trait - for custom detectors
pub trait DynPatternDetector: Send + Sync {
    fn kind(&self) -> PatternKind;
    fn min_bars(&self) -> usize;
    fn detect(&self, bars: &[&dyn OHLCV], contexts: &[MarketContext]) -> Vec<PatternMatch>;
    fn validate_config(&self) -> Result<()>;
}

impl<D: PatternDetector> DynPatternDetector for D {
    fn kind(&self) -> PatternKind {
        PatternDetector::kind(self)
    }

    fn min_bars(&self) -> usize {
        PatternDetector::min_bars(self)
    }

    fn detect(&self, bars: &[&dyn OHLCV], contexts: &[MarketContext]) -> Vec<PatternMatch> {
        PatternDetector::detect(self, bars, contexts)
    }

    fn validate_config(&self) -> Result<()> {
        PatternDetector::validate_config(self)
    }
}

// ============================================================
// BUILTIN DETECTORS - generated via macro
// ============================================================

use detectors::*;

/// Macro to generate BuiltinDetector enum without boilerplate
macro_rules! define_builtin_detectors {
    (
        $(
            $variant:ident($detector:ty)
        ),* $(,)?
    ) => {
        /// All builtin detectors - fast path via enum dispatch
        #[derive(Debug, Clone)]
        pub enum BuiltinDetector {
            $($variant($detector)),*
        }

        impl BuiltinDetector {
            #[inline]
            pub fn detect<T: OHLCV>(
                &self,
                bars: &[T],
                contexts: &[MarketContext],
            ) -> Vec<PatternMatch> {
                match self {
                    $(Self::$variant(d) => PatternDetector::detect(d, bars, contexts)),*
                }
            }

            #[inline]
            pub fn kind(&self) -> PatternKind {
                match self {
                    $(Self::$variant(d) => PatternDetector::kind(d)),*
                }
            }

            #[inline]
            pub fn min_bars(&self) -> usize {
                match self {
                    $(Self::$variant(d) => PatternDetector::min_bars(d)),*
                }
            }

            pub fn validate_config(&self) -> Result<()> {
                match self {
                    $(Self::$variant(d) => PatternDetector::validate_config(d)),*
                }
            }
        }
    };
}

define_builtin_detectors! {
    StructureBreak(StructureBreakDetector),
    CharacterChange(CharacterChangeDetector),
    FairValueGap(FairValueGapDetector),
    OrderBlock(OrderBlockDetector),
    LiquiditySweep(LiquiditySweepDetector),
}

// ============================================================
// PATTERN ENGINE
// ============================================================

/// Shortest sequence `detect_patterns` will look at
pub const DEFAULT_MIN_BARS: usize = 20;

/// Engine configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EngineConfig {
    pub min_confidence: Option<f64>,
    pub validate_data: bool,
    pub kind_filter: Option<Vec<PatternKind>>,
    /// Sequences shorter than this produce no patterns at all
    pub min_bars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_confidence: None,
            validate_data: false,
            kind_filter: None,
            min_bars: DEFAULT_MIN_BARS,
        }
    }
}

/// Main pattern detection engine
///
/// Holds no mutable state: the same bars always produce the same patterns,
/// and one engine can be shared across threads.
pub struct PatternEngine<C: ContextProvider = DefaultContextProvider> {
    builtin: Vec<BuiltinDetector>,
    custom: Vec<Box<dyn DynPatternDetector>>,
    context_provider: C,
    config: EngineConfig,
}

impl<C: ContextProvider> PatternEngine<C> {
    pub fn new(context_provider: C) -> Self {
        Self {
            builtin: Vec::new(),
            custom: Vec::new(),
            context_provider,
            config: EngineConfig::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of registered detectors (builtin and custom)
    pub fn detector_count(&self) -> usize {
        self.builtin.len() + self.custom.len()
    }

    /// Precompute contexts for all bars.
    #[inline]
    pub fn compute_contexts<T: OHLCV>(&self, bars: &[T]) -> Vec<MarketContext> {
        self.context_provider.compute_all(bars)
    }

    /// Scan all bars and return a flat list of matches, detector by detector.
    pub fn scan<T: OHLCV>(&self, bars: &[T]) -> Result<Vec<PatternMatch>> {
        if self.config.validate_data {
            self.validate_bars(bars)?;
        }

        if bars.len() < self.config.min_bars {
            debug!(
                bars = bars.len(),
                need = self.config.min_bars,
                "sequence too short, skipping scan"
            );
            return Ok(Vec::new());
        }

        let contexts = self.compute_contexts(bars);
        Ok(self.run_detectors(bars, &contexts))
    }

    /// Scan and return matches grouped by triggering bar index.
    pub fn scan_grouped<T: OHLCV>(&self, bars: &[T]) -> Result<Vec<Vec<PatternMatch>>> {
        let mut grouped = vec![Vec::new(); bars.len()];
        for m in self.scan(bars)? {
            if let Some(slot) = grouped.get_mut(m.index) {
                slot.push(m);
            }
        }
        Ok(grouped)
    }

    /// Detect and label patterns for one instrument/timeframe pair.
    ///
    /// Output is the concatenation of each detector's matches in registration
    /// order; within a detector, matches keep bar order.
    pub fn detect_patterns<T: OHLCV>(
        &self,
        bars: &[T],
        pair: &str,
        timeframe: &str,
    ) -> Result<Vec<Pattern>> {
        let patterns: Vec<Pattern> = self
            .scan(bars)?
            .iter()
            .filter_map(|m| Pattern::from_match(m, bars, pair, timeframe))
            .collect();

        debug!(pair, timeframe, count = patterns.len(), "patterns detected");
        Ok(patterns)
    }

    /// One detection cycle: detect, then prune and append into `store`.
    ///
    /// Returns the number of patterns recorded.
    pub fn run_cycle<T: OHLCV>(
        &self,
        store: &store::PatternStore,
        bars: &[T],
        pair: &str,
        timeframe: &str,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let patterns = self.detect_patterns(bars, pair, timeframe)?;
        Ok(store.record(now, patterns))
    }

    // ===========================================
    // Internal helpers
    // ===========================================

    fn run_detectors<T: OHLCV>(&self, bars: &[T], contexts: &[MarketContext]) -> Vec<PatternMatch> {
        let mut results = Vec::new();

        // Fast path: builtin detectors (enum dispatch, no vtable)
        for detector in &self.builtin {
            if bars.len() < detector.min_bars() {
                trace!(kind = %detector.kind(), "not enough bars for detector");
                continue;
            }
            results.extend(
                detector
                    .detect(bars, contexts)
                    .into_iter()
                    .filter(|m| self.should_include(m)),
            );
        }

        // Slow path: custom detectors (vtable)
        if !self.custom.is_empty() {
            let bar_refs: Vec<&dyn OHLCV> = bars.iter().map(|b| b as &dyn OHLCV).collect();
            for detector in &self.custom {
                if bar_refs.len() < detector.min_bars() {
                    continue;
                }
                results.extend(
                    detector
                        .detect(&bar_refs, contexts)
                        .into_iter()
                        .filter(|m| self.should_include(m)),
                );
            }
        }

        results
    }

    fn should_include(&self, m: &PatternMatch) -> bool {
        if let Some(min) = self.config.min_confidence {
            if m.confidence < min {
                return false;
            }
        }
        if let Some(ref filter) = self.config.kind_filter {
            if !filter.contains(&m.kind) {
                return false;
            }
        }
        true
    }

    fn validate_bars<T: OHLCV>(&self, bars: &[T]) -> Result<()> {
        for (i, bar) in bars.iter().enumerate() {
            bar.validate().map_err(|e| match e {
                PatternError::InvalidOHLCV { reason, .. } => {
                    PatternError::InvalidOHLCV { index: i, reason }
                }
                other => other,
            })?;
            if i > 0 && bar.timestamp() <= bars[i - 1].timestamp() {
                return Err(PatternError::UnorderedTimestamps { index: i });
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for d in &self.builtin {
            d.validate_config()?;
        }
        for d in &self.custom {
            d.validate_config()?;
        }
        if let Some(min) = self.config.min_confidence {
            if !(0.0..=1.0).contains(&min) {
                return Err(PatternError::OutOfRange {
                    field: "min_confidence",
                    value: min,
                    min: 0.0,
                    max: 1.0,
                });
            }
        }
        Ok(())
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating PatternEngine instances
pub struct EngineBuilder<C: ContextProvider = DefaultContextProvider> {
    context_provider: C,
    builtin: Vec<BuiltinDetector>,
    custom: Vec<Box<dyn DynPatternDetector>>,
    config: EngineConfig,
}

impl Default for EngineBuilder<DefaultContextProvider> {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder<DefaultContextProvider> {
    pub fn new() -> Self {
        Self {
            context_provider: DefaultContextProvider::default(),
            builtin: Vec::new(),
            custom: Vec::new(),
            config: EngineConfig::default(),
        }
    }
}

impl<C: ContextProvider> EngineBuilder<C> {
    /// Change context provider
    pub fn context_provider<C2: ContextProvider>(self, provider: C2) -> EngineBuilder<C2> {
        EngineBuilder {
            context_provider: provider,
            builtin: self.builtin,
            custom: self.custom,
            config: self.config,
        }
    }

    /// Add the five detectors with default configurations (BOS, CHoCH, FVG, OB, LS)
    pub fn with_all_defaults(mut self) -> Self {
        self.builtin.extend([
            BuiltinDetector::StructureBreak(Default::default()),
            BuiltinDetector::CharacterChange(Default::default()),
            BuiltinDetector::FairValueGap(Default::default()),
            BuiltinDetector::OrderBlock(Default::default()),
            BuiltinDetector::LiquiditySweep(Default::default()),
        ]);
        self
    }

    /// Add a builtin detector
    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, detector: BuiltinDetector) -> Self {
        self.builtin.push(detector);
        self
    }

    /// Add with config validation
    pub fn add_checked(mut self, detector: BuiltinDetector) -> Result<Self> {
        detector.validate_config()?;
        self.builtin.push(detector);
        Ok(self)
    }

    /// Add a custom detector (slow path)
    pub fn add_custom<D: DynPatternDetector + 'static>(mut self, detector: D) -> Self {
        self.custom.push(Box::new(detector));
        self
    }

    /// Set minimum confidence filter
    pub fn min_confidence(mut self, confidence: f64) -> Self {
        self.config.min_confidence = Some(confidence);
        self
    }

    /// Enable/disable data validation
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.config.validate_data = enable;
        self
    }

    /// Filter to specific pattern kinds only
    pub fn only_kinds(mut self, kinds: impl IntoIterator<Item = PatternKind>) -> Self {
        self.config.kind_filter = Some(kinds.into_iter().collect());
        self
    }

    /// Shortest sequence the engine will scan
    pub fn min_bars(mut self, bars: usize) -> Self {
        self.config.min_bars = bars;
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<PatternEngine<C>> {
        let engine = PatternEngine {
            builtin: self.builtin,
            custom: self.custom,
            context_provider: self.context_provider,
            config: self.config,
        };
        engine.validate()?;
        Ok(engine)
    }
}

// ============================================================
// PARALLEL SCANNING
// ============================================================

use rayon::prelude::*;

/// Result of scanning a single (pair, timeframe) job
#[derive(Debug)]
pub struct ScanResult {
    pub pair: String,
    pub timeframe: String,
    pub patterns: Vec<Pattern>,
}

/// Error from scanning a single (pair, timeframe) job
#[derive(Debug)]
pub struct ScanError {
    pub pair: String,
    pub timeframe: String,
    pub error: PatternError,
}

/// Parallel scanning of independent (pair, timeframe, bars) jobs
pub fn scan_parallel<'a, T, I, C>(
    engine: &PatternEngine<C>,
    jobs: I,
) -> (Vec<ScanResult>, Vec<ScanError>)
where
    T: OHLCV + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a str, &'a [T])>,
    C: ContextProvider + Sync,
{
    let results: Vec<_> = jobs
        .into_par_iter()
        .map(|(pair, timeframe, bars)| {
            engine
                .detect_patterns(bars, pair, timeframe)
                .map(|patterns| ScanResult {
                    pair: pair.to_string(),
                    timeframe: timeframe.to_string(),
                    patterns,
                })
                .map_err(|error| ScanError {
                    pair: pair.to_string(),
                    timeframe: timeframe.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    (successes, errors)
}

// ============================================================
// TYPE ALIASES
// ============================================================

/// Default engine with DefaultContextProvider
pub type DefaultEngine = PatternEngine<DefaultContextProvider>;

// ============================================================
// TESTS
// ============================================================
