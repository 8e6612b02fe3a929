//! Series preprocessing.
//!
//! Turns raw daily observations into a validated [`PriceSeries`]:
//! - Log returns, dated at the later day
//! - Trailing moving average and annualized realized volatility
//! - Descriptive statistics and per-year volatility

pub mod series;
pub mod stats;

pub use series::{
    realized_volatility, PreprocessConfig, PriceSeries, RollingPoint, TRADING_DAYS_PER_YEAR,
};
pub use stats::{
    yearly_volatility, LjungBox, MovingAverageStats, Percentiles, PriceStats, ReturnStats,
    SeriesSummary, TrendStats,
};
