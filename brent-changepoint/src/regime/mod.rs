//! Volatility regime classification.
//!
//! Labels volatility relative to a baseline:
//! - Low: below 0.8x baseline
//! - Normal: 0.8x to 1.2x baseline
//! - High: above 1.2x baseline

pub mod classifier;

pub use classifier::{
    classify, VolatilityBaseline, VolatilityConfig, VolatilityRegime, VolatilityRegimeClassifier,
    VolatilityRegimeLabel, VolatilityReport, YearlyVolatility, HIGH_RATIO, LOW_RATIO,
};
