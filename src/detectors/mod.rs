//! Market-structure pattern detectors
//!
//! # Detectors
//!
//! - **BOS** ([`StructureBreakDetector`]): successive swing extremes confirmed by momentum
//! - **CHoCH** ([`CharacterChangeDetector`]): short/long moving-average trend flips
//! - **FVG** ([`FairValueGapDetector`]): unfilled gaps across three consecutive bars
//! - **OB** ([`OrderBlockDetector`]): strong rejection candles confirmed by continuation
//! - **LS** ([`LiquiditySweepDetector`]): breaches of recent extremes followed by reversal
//!
//! Swing extraction ([`extract_swings`]) and the shared confidence scorer
//! ([`score`]) live alongside.

pub mod helpers;

/// Generate `with_defaults()` -> `Self::default()` for multiple detector types.
macro_rules! impl_with_defaults {
  ($($detector:ty),* $(,)?) => {
    $(impl $detector {
      pub fn with_defaults() -> Self { Self::default() }
    })*
  };
}

pub mod gap;
pub mod rejection;
pub mod structure;
pub mod sweep;
pub mod swing;

// Re-export all detectors for convenience
pub use gap::*;
pub use helpers::*;
pub use rejection::*;
pub use structure::*;
pub use sweep::*;
pub use swing::*;
