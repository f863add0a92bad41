//! Ensemble voting over independent predictions
//!
//! Each [`Prediction`] contributes `confidence * source_weight` to two
//! separate tallies, one keyed by pattern type and one by direction. The
//! heaviest key wins each tally; ties go to the key seen first. The reported
//! confidence is the plain mean of the raw confidences.
//!
//! # Example
//!
//! ```rust
//! use yasmc::prelude::*;
//!
//! let predictions = [
//!     Prediction::new(PatternKind::Fvg, Direction::Bullish, 0.8, 0.9).unwrap(),
//!     Prediction::new(PatternKind::Ob, Direction::Bearish, 0.6, 0.5).unwrap(),
//! ];
//! let decision = aggregate(&predictions);
//! assert_eq!(decision.pattern_type, Some(PatternKind::Fvg));
//! assert_eq!(decision.direction, Direction::Bullish);
//! assert!((decision.confidence - 0.7).abs() < 1e-12);
//! ```

use tracing::{debug, warn};

use crate::{
    features::{extract, FeatureVector},
    Direction, PatternKind, PatternMatch, Ratio, Result, OHLCV,
};

// ============================================================
// PREDICTIONS
// ============================================================

/// One source's vote
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Prediction {
    pub pattern_type: PatternKind,
    pub direction: Direction,
    pub confidence: Ratio,
    /// Reliability of the source, e.g. its historical accuracy
    pub source_weight: Ratio,
}

impl Prediction {
    /// Both `confidence` and `source_weight` must lie in [0, 1].
    pub fn new(
        pattern_type: PatternKind,
        direction: Direction,
        confidence: f64,
        source_weight: f64,
    ) -> Result<Self> {
        Ok(Self {
            pattern_type,
            direction,
            confidence: Ratio::new(confidence)?,
            source_weight: Ratio::new(source_weight)?,
        })
    }

    /// Vote on behalf of a detector match.
    pub fn from_match(m: &PatternMatch, source_weight: Ratio) -> Self {
        Self {
            pattern_type: m.kind,
            direction: m.direction,
            confidence: Ratio::saturating(m.confidence),
            source_weight,
        }
    }

    /// Contribution to each tally
    #[inline]
    pub fn weight(&self) -> f64 {
        self.confidence.get() * self.source_weight.get()
    }
}

/// Unweighted output of a [`PredictionSource`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub pattern_type: PatternKind,
    pub direction: Direction,
    pub confidence: Ratio,
}

// ============================================================
// DECISION
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum EnsembleMethod {
    ConfidenceWeightedVoting,
    /// Nothing to vote on
    NoSources,
}

/// Aggregated ranking of a set of predictions
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Decision {
    /// None when there was nothing to vote on ("UNKNOWN")
    pub pattern_type: Option<PatternKind>,
    pub direction: Direction,
    pub confidence: f64,
    pub method: EnsembleMethod,
    /// Predictions that voted, in input order
    pub predictions: Vec<Prediction>,
}

impl Decision {
    /// Sentinel for an empty input
    pub fn unknown() -> Self {
        Self {
            pattern_type: None,
            direction: Direction::Neutral,
            confidence: 0.0,
            method: EnsembleMethod::NoSources,
            predictions: Vec::new(),
        }
    }

    /// Number of predictions that voted
    #[inline]
    pub fn contributors(&self) -> usize {
        self.predictions.len()
    }

    pub fn pattern_label(&self) -> &'static str {
        self.pattern_type.map_or("UNKNOWN", |k| k.as_str())
    }
}

/// Weighted tally that remembers first-seen key order
struct Tally<K> {
    entries: Vec<(K, f64)>,
}

impl<K: PartialEq + Copy> Tally<K> {
    fn new() -> Self {
        Self { entries: Vec::new() }
    }

    fn add(&mut self, key: K, weight: f64) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, total)) => *total += weight,
            None => self.entries.push((key, weight)),
        }
    }

    /// Heaviest key; only a strictly greater total displaces an earlier key.
    fn winner(&self) -> Option<K> {
        let mut best: Option<(K, f64)> = None;
        for &(key, total) in &self.entries {
            match best {
                Some((_, top)) if total <= top => {}
                _ => best = Some((key, total)),
            }
        }
        best.map(|(key, _)| key)
    }
}

/// Confidence-weighted vote over `predictions`, in the order supplied.
pub fn aggregate(predictions: &[Prediction]) -> Decision {
    if predictions.is_empty() {
        debug!("no predictions to aggregate");
        return Decision::unknown();
    }

    let mut types = Tally::new();
    let mut directions = Tally::new();
    let mut confidence_sum = 0.0;

    for p in predictions {
        let weight = p.weight();
        types.add(p.pattern_type, weight);
        directions.add(p.direction, weight);
        confidence_sum += p.confidence.get();
    }

    let decision = Decision {
        pattern_type: types.winner(),
        direction: directions.winner().unwrap_or(Direction::Neutral),
        confidence: confidence_sum / predictions.len() as f64,
        method: EnsembleMethod::ConfidenceWeightedVoting,
        predictions: predictions.to_vec(),
    };

    debug!(
        pattern = decision.pattern_label(),
        direction = %decision.direction,
        confidence = decision.confidence,
        contributors = decision.contributors(),
        "ensemble decision"
    );
    decision
}

// ============================================================
// PREDICTION SOURCES
// ============================================================

/// Anything that can classify a feature vector: a trained model, a rule set,
/// a remote service.
pub trait PredictionSource: Send + Sync {
    fn name(&self) -> &str;

    /// Weight given to this source's votes
    fn accuracy(&self) -> Ratio;

    /// None when the source cannot classify these features
    fn predict(&self, features: &FeatureVector) -> Option<Classification>;
}

/// Set of prediction sources voted together
#[derive(Default)]
pub struct Ensemble {
    sources: Vec<Box<dyn PredictionSource>>,
}

impl Ensemble {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source<S: PredictionSource + 'static>(mut self, source: S) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Ask every source, in registration order, skipping those that abstain.
    pub fn predictions(&self, features: &FeatureVector) -> Vec<Prediction> {
        self.sources
            .iter()
            .filter_map(|source| match source.predict(features) {
                Some(c) => Some(Prediction {
                    pattern_type: c.pattern_type,
                    direction: c.direction,
                    confidence: c.confidence,
                    source_weight: source.accuracy(),
                }),
                None => {
                    warn!(source = source.name(), "prediction source abstained");
                    None
                }
            })
            .collect()
    }

    pub fn decide(&self, features: &FeatureVector) -> Decision {
        aggregate(&self.predictions(features))
    }

    /// Extract features from `bars` and decide. Fails only on an empty sequence.
    pub fn decide_bars<T: OHLCV>(&self, bars: &[T]) -> Result<Decision> {
        let features = extract(bars)?;
        Ok(self.decide(&features))
    }
}
