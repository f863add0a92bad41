//! Parameter metadata for pattern detectors
//!
//! Every tunable constant of the five detectors is described here, enabling:
//! - Grid search over thresholds
//! - Parameter documentation
//! - Construction from loosely typed key/value maps
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use yasmc::params::ParameterizedDetector;
//! use yasmc::prelude::*;
//!
//! for param in FairValueGapDetector::param_meta() {
//!     println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//!
//! let mut params = HashMap::new();
//! params.insert("min_gap_ratio", 0.001);
//! let detector = FairValueGapDetector::with_params(&params).unwrap();
//! assert_eq!(detector.min_gap_ratio, 0.001);
//! ```

use std::collections::HashMap;

use crate::{PatternError, Period, Ratio, Result};

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Ratio value in 0.0..=1.0
  Ratio,
  /// Period value (positive integer)
  Period,
  /// Unbounded non-negative multiplier or threshold (e.g. a 2x body multiple)
  Factor,
  /// Non-negative integer, such as a first bar index
  Count,
}

/// Metadata for a single detector parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Parameter name (e.g., "min_gap_ratio")
  pub name: &'static str,
  pub param_type: ParamType,
  pub default: f64,
  /// Range for optimization: (min, max, step)
  pub range: (f64, f64, f64),
  pub description: &'static str,
}

impl ParamMeta {
  /// Create a new ParamMeta for a Ratio parameter
  pub const fn ratio(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Ratio, default, range, description }
  }

  /// Create a new ParamMeta for a Period parameter
  pub const fn period(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Period, default, range, description }
  }

  /// Create a new ParamMeta for a Factor parameter
  pub const fn factor(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Factor, default, range, description }
  }

  /// Create a new ParamMeta for a Count parameter
  pub const fn count(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Count, default, range, description }
  }

  /// Generate all values for grid search
  pub fn generate_grid(&self) -> Vec<f64> {
    let (min, max, step) = self.range;
    let mut values = Vec::new();
    if step <= 0.0 {
      values.push(min);
      return values;
    }
    let mut k = 0usize;
    loop {
      let v = min + step * k as f64;
      if v > max + step * 1e-9 {
        break;
      }
      values.push(v);
      k += 1;
    }
    values
  }

  /// Validate a value for this parameter
  pub fn validate(&self, value: f64) -> Result<()> {
    let (min, max, _) = self.range;
    if value.is_nan() || value < min || value > max {
      return Err(PatternError::OutOfRange { field: self.name, value, min, max });
    }
    match self.param_type {
      ParamType::Ratio => Ratio::new(value).map(|_| ()),
      ParamType::Period => {
        if value < 1.0 || value.fract() != 0.0 {
          return Err(PatternError::InvalidValue("Period must be a positive integer"));
        }
        Ok(())
      },
      ParamType::Factor => {
        if value < 0.0 || value.is_infinite() {
          return Err(PatternError::InvalidValue("Factor must be finite and non-negative"));
        }
        Ok(())
      },
      ParamType::Count => {
        if value < 0.0 || value.fract() != 0.0 {
          return Err(PatternError::InvalidValue("Count must be a non-negative integer"));
        }
        Ok(())
      },
    }
  }
}

// ============================================================
// PARAMETERIZED DETECTOR TRAIT
// ============================================================

/// Trait for detectors that support parameterization
pub trait ParameterizedDetector: Sized {
  /// Returns metadata for all configurable parameters
  fn param_meta() -> &'static [ParamMeta];

  /// Creates a detector with parameters from a HashMap
  ///
  /// Missing parameters use their default values.
  fn with_params(params: &HashMap<&str, f64>) -> Result<Self>;

  /// Returns the pattern ID string
  fn pattern_id_str() -> &'static str;
}

// ============================================================
// PARAMETER VALUE HELPERS
// ============================================================

/// Helper to get a Ratio from params with default fallback
pub fn get_ratio(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<Ratio> {
  let value = params.get(key).copied().unwrap_or(default);
  Ratio::new(value)
}

/// Helper to get a Period from params with default fallback
pub fn get_period(params: &HashMap<&str, f64>, key: &str, default: usize) -> Result<Period> {
  let value = params.get(key).copied().unwrap_or(default as f64);
  if value < 0.0 || value.fract() != 0.0 {
    return Err(PatternError::InvalidValue("Period must be a positive integer"));
  }
  Period::new(value as usize)
}

/// Helper to get a non-negative finite multiplier from params with default fallback
pub fn get_factor(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<f64> {
  let value = params.get(key).copied().unwrap_or(default);
  if value.is_nan() || value.is_infinite() || value < 0.0 {
    return Err(PatternError::InvalidValue("Factor must be finite and non-negative"));
  }
  Ok(value)
}

/// Helper to get a plain index/count from params with default fallback
pub fn get_count(params: &HashMap<&str, f64>, key: &str, default: usize) -> Result<usize> {
  let value = params.get(key).copied().unwrap_or(default as f64);
  if value < 0.0 || value.fract() != 0.0 {
    return Err(PatternError::InvalidValue("Count must be a non-negative integer"));
  }
  Ok(value as usize)
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_param_meta_ratio() {
    let meta = ParamMeta::ratio("test_ratio", 0.5, (0.3, 0.7, 0.1), "Test ratio parameter");

    assert_eq!(meta.name, "test_ratio");
    assert_eq!(meta.param_type, ParamType::Ratio);
    assert_eq!(meta.default, 0.5);
  }

  #[test]
  fn test_param_meta_factor() {
    let meta = ParamMeta::factor("body_multiple", 2.0, (1.0, 4.0, 0.5), "Test factor");
    assert_eq!(meta.param_type, ParamType::Factor);
    assert!(meta.validate(3.5).is_ok());
    assert!(meta.validate(4.5).is_err());
  }

  #[test]
  fn test_param_meta_count() {
    let meta = ParamMeta::count("start_index", 5.0, (0.0, 20.0, 1.0), "Test count");
    assert_eq!(meta.param_type, ParamType::Count);
    assert!(meta.validate(0.0).is_ok());
    assert!(meta.validate(2.5).is_err());
    assert_eq!(meta.generate_grid().len(), 21);
  }

  #[test]
  fn test_generate_grid() {
    let meta = ParamMeta::ratio("test", 0.5, (0.3, 0.7, 0.2), "Test");

    let grid = meta.generate_grid();
    assert_eq!(grid.len(), 3);
    assert!((grid[0] - 0.3).abs() < 1e-12);
    assert!((grid[1] - 0.5).abs() < 1e-12);
    assert!((grid[2] - 0.7).abs() < 1e-12);
  }

  #[test]
  fn test_generate_grid_zero_step() {
    let meta = ParamMeta::ratio("test", 0.5, (0.5, 0.5, 0.0), "Test");
    assert_eq!(meta.generate_grid(), vec![0.5]);
  }

  #[test]
  fn test_validate_ratio() {
    let meta = ParamMeta::ratio("test", 0.5, (0.3, 0.7, 0.1), "Test");

    assert!(meta.validate(0.5).is_ok());
    assert!(meta.validate(0.3).is_ok());
    assert!(meta.validate(0.7).is_ok());
    assert!(meta.validate(0.2).is_err());
    assert!(meta.validate(0.8).is_err());
    assert!(meta.validate(f64::NAN).is_err());
  }

  #[test]
  fn test_validate_period() {
    let meta = ParamMeta::period("test", 10.0, (5.0, 20.0, 1.0), "Test");

    assert!(meta.validate(10.0).is_ok());
    assert!(meta.validate(5.0).is_ok());
    assert!(meta.validate(20.0).is_ok());
    assert!(meta.validate(10.5).is_err());
    assert!(meta.validate(4.0).is_err());
    assert!(meta.validate(21.0).is_err());
  }

  #[test]
  fn test_get_ratio_helper() {
    let mut params = HashMap::new();
    params.insert("key1", 0.8);

    assert!((get_ratio(&params, "key1", 0.5).unwrap().get() - 0.8).abs() < f64::EPSILON);
    assert!((get_ratio(&params, "key2", 0.5).unwrap().get() - 0.5).abs() < f64::EPSILON);
  }

  #[test]
  fn test_get_period_helper() {
    let mut params = HashMap::new();
    params.insert("key1", 20.0);
    params.insert("bad", 2.5);

    assert_eq!(get_period(&params, "key1", 10).unwrap().get(), 20);
    assert_eq!(get_period(&params, "key2", 10).unwrap().get(), 10);
    assert!(get_period(&params, "bad", 10).is_err());
  }

  #[test]
  fn test_get_factor_helper() {
    let mut params = HashMap::new();
    params.insert("scale", 1000.0);
    params.insert("negative", -1.0);

    assert_eq!(get_factor(&params, "scale", 1.0).unwrap(), 1000.0);
    assert_eq!(get_factor(&params, "missing", 2.0).unwrap(), 2.0);
    assert!(get_factor(&params, "negative", 2.0).is_err());
  }

  #[test]
  fn test_get_count_helper() {
    let mut params = HashMap::new();
    params.insert("start", 15.0);
    assert_eq!(get_count(&params, "start", 5).unwrap(), 15);
    assert_eq!(get_count(&params, "other", 5).unwrap(), 5);
  }
}
