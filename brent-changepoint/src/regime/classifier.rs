//! Volatility regime classifier.
//!
//! Labels a volatility value against a baseline by their ratio:
//! - High: ratio > 1.2
//! - Low: ratio < 0.8
//! - Normal: otherwise, both boundaries included

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::error::{DataError, DataResult};
use crate::preprocess::{yearly_volatility, PriceSeries};

/// Ratio above which volatility is High.
pub const HIGH_RATIO: f64 = 1.2;
/// Ratio below which volatility is Low.
pub const LOW_RATIO: f64 = 0.8;

/// Volatility regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VolatilityRegime {
    Low,
    Normal,
    High,
}

impl VolatilityRegime {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > HIGH_RATIO {
            Self::High
        } else if ratio < LOW_RATIO {
            Self::Low
        } else {
            Self::Normal
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Low => "Below-average volatility",
            Self::Normal => "Typical volatility",
            Self::High => "Elevated volatility",
        }
    }
}

/// A labelled volatility value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolatilityRegimeLabel {
    pub value: f64,
    pub baseline: f64,
    pub ratio: f64,
    pub label: VolatilityRegime,
}

/// Label `value` relative to `baseline`.
///
/// The baseline must be positive and finite; the value finite and
/// non-negative.
pub fn classify(value: f64, baseline: f64) -> DataResult<VolatilityRegimeLabel> {
    if !baseline.is_finite() || baseline <= 0.0 {
        return Err(DataError::InvalidBaseline(baseline));
    }
    if !value.is_finite() || value < 0.0 {
        return Err(DataError::InvalidVolatility(value));
    }

    let ratio = value / baseline;
    Ok(VolatilityRegimeLabel {
        value,
        baseline,
        ratio,
        label: VolatilityRegime::from_ratio(ratio),
    })
}

/// How the baseline is derived from the rolling volatility series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VolatilityBaseline {
    /// Mean over the whole history.
    HistoricalMean,
    /// Mean over the last `observations` values (1260 is about five years).
    TrailingMean { observations: usize },
    /// A fixed annualized value.
    Fixed { value: f64 },
}

impl Default for VolatilityBaseline {
    fn default() -> Self {
        Self::HistoricalMean
    }
}

impl VolatilityBaseline {
    /// Resolve the baseline against a rolling volatility series.
    pub fn resolve(&self, rolling_volatility: &[f64]) -> DataResult<f64> {
        let mean = |values: &[f64]| {
            if values.is_empty() {
                Err(DataError::InsufficientData {
                    required: 1,
                    actual: 0,
                })
            } else {
                Ok(values.iter().mean())
            }
        };

        let baseline = match self {
            Self::HistoricalMean => mean(rolling_volatility)?,
            Self::TrailingMean { observations } => {
                if *observations == 0 {
                    return Err(DataError::InvalidParameter(
                        "trailing baseline needs at least one observation".to_string(),
                    ));
                }
                let start = rolling_volatility.len().saturating_sub(*observations);
                mean(&rolling_volatility[start..])?
            }
            Self::Fixed { value } => *value,
        };

        if !baseline.is_finite() || baseline <= 0.0 {
            return Err(DataError::InvalidBaseline(baseline));
        }
        Ok(baseline)
    }
}

/// Classifier configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolatilityConfig {
    pub baseline: VolatilityBaseline,
    /// Rolling window (observations) of the volatility series. Independent
    /// of the summary window.
    pub window: usize,
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            baseline: VolatilityBaseline::HistoricalMean,
            window: 30,
        }
    }
}

/// Label of one calendar year's mean volatility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyVolatility {
    pub year: i32,
    pub label: VolatilityRegimeLabel,
}

/// Current and per-year volatility labels for a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityReport {
    pub baseline_kind: VolatilityBaseline,
    pub baseline: f64,
    pub current_date: NaiveDate,
    pub current: VolatilityRegimeLabel,
    pub yearly: Vec<YearlyVolatility>,
}

impl VolatilityReport {
    /// Years in the given regime.
    pub fn years_in(&self, regime: VolatilityRegime) -> Vec<i32> {
        self.yearly
            .iter()
            .filter(|y| y.label.label == regime)
            .map(|y| y.year)
            .collect()
    }
}

/// Applies [`classify`] to a price series with a configured baseline.
#[derive(Debug, Clone, Default)]
pub struct VolatilityRegimeClassifier {
    config: VolatilityConfig,
}

impl VolatilityRegimeClassifier {
    pub fn new(config: VolatilityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VolatilityConfig {
        &self.config
    }

    pub fn report(&self, series: &PriceSeries) -> DataResult<VolatilityReport> {
        let rolling = series.rolling_volatility(self.config.window)?;
        let (current_date, current_value) =
            *rolling.last().ok_or(DataError::InsufficientData {
                required: self.config.window + 1,
                actual: series.len(),
            })?;

        let values: Vec<f64> = rolling.iter().map(|(_, v)| *v).collect();
        let baseline = self.config.baseline.resolve(&values)?;

        let yearly_means: BTreeMap<i32, f64> = yearly_volatility(series, self.config.window)?;
        let yearly = yearly_means
            .into_iter()
            .map(|(year, value)| {
                classify(value, baseline).map(|label| YearlyVolatility { year, label })
            })
            .collect::<DataResult<Vec<_>>>()?;

        Ok(VolatilityReport {
            baseline_kind: self.config.baseline.clone(),
            baseline,
            current_date,
            current: classify(current_value, baseline)?,
            yearly,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PriceObservation;
    use chrono::Duration;

    #[test]
    fn test_boundaries_are_normal() {
        assert_eq!(classify(1.2, 1.0).unwrap().label, VolatilityRegime::Normal);
        assert_eq!(classify(0.8, 1.0).unwrap().label, VolatilityRegime::Normal);
        assert_eq!(classify(1.2001, 1.0).unwrap().label, VolatilityRegime::High);
        assert_eq!(classify(0.7999, 1.0).unwrap().label, VolatilityRegime::Low);
    }

    #[test]
    fn test_label_fields() {
        let label = classify(0.45, 0.30).unwrap();
        assert_eq!(label.value, 0.45);
        assert_eq!(label.baseline, 0.30);
        assert!((label.ratio - 1.5).abs() < 1e-12);
        assert_eq!(label.label, VolatilityRegime::High);
    }

    #[test]
    fn test_invalid_inputs() {
        assert_eq!(classify(0.3, 0.0), Err(DataError::InvalidBaseline(0.0)));
        assert!(matches!(
            classify(0.3, f64::NAN),
            Err(DataError::InvalidBaseline(_))
        ));
        assert_eq!(classify(-0.1, 0.3), Err(DataError::InvalidVolatility(-0.1)));
    }

    #[test]
    fn test_baseline_resolution() {
        let values = [0.2, 0.2, 0.4, 0.4];
        assert!((VolatilityBaseline::HistoricalMean.resolve(&values).unwrap() - 0.3).abs() < 1e-12);
        assert!(
            (VolatilityBaseline::TrailingMean { observations: 2 }
                .resolve(&values)
                .unwrap()
                - 0.4)
                .abs()
                < 1e-12
        );
        assert_eq!(
            VolatilityBaseline::Fixed { value: 0.35 }.resolve(&values).unwrap(),
            0.35
        );
        assert!(VolatilityBaseline::Fixed { value: -1.0 }.resolve(&values).is_err());
        assert!(VolatilityBaseline::HistoricalMean.resolve(&[]).is_err());
    }

    #[test]
    fn test_baseline_serde_shape() {
        let parsed: VolatilityBaseline =
            serde_json::from_str(r#"{"kind":"trailing_mean","observations":1260}"#).unwrap();
        assert_eq!(parsed, VolatilityBaseline::TrailingMean { observations: 1260 });
    }

    #[test]
    fn test_report_flags_turbulent_year() {
        let start = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap();
        // Calm 2019, turbulent 2020.
        let obs: Vec<PriceObservation> = (0..730)
            .map(|i| {
                let amplitude = if i < 365 { 0.5 } else { 4.0 };
                let price = 60.0 + if i % 2 == 0 { amplitude } else { -amplitude };
                PriceObservation::new(start + Duration::days(i), price)
            })
            .collect();
        let series = PriceSeries::new(obs).unwrap();

        let report = VolatilityRegimeClassifier::default().report(&series).unwrap();
        assert_eq!(report.years_in(VolatilityRegime::Low), vec![2019]);
        assert_eq!(report.years_in(VolatilityRegime::High), vec![2020]);
        assert_eq!(report.current.label, VolatilityRegime::High);
    }
}
