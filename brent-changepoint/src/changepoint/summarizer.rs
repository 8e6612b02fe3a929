//! Posterior summarizer.
//!
//! Collapses per-index boundary probabilities into discrete change points:
//! 1. Keep indices whose probability exceeds the threshold
//! 2. Non-maximum suppression: strongest first, drop anything closer than
//!    `min_separation` to an already accepted index
//! 3. Describe each survivor by the spans between its neighbours

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::error::{DataError, DataResult};
use crate::inference::Posterior;
use crate::preprocess::PriceSeries;

/// Summarizer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    /// Indices need a boundary probability strictly above this.
    pub probability_threshold: f64,
    /// Minimum distance (observations) between reported change points.
    pub min_separation: usize,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            probability_threshold: 0.5,
            min_separation: 5,
        }
    }
}

/// A detected regime shift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangePoint {
    /// Date of the first trading day in the new regime.
    pub date: NaiveDate,
    /// Return index of the shift; the new regime starts at price `index + 1`.
    pub index: usize,
    /// Posterior probability of a boundary at `index`.
    pub probability: f64,
    /// Mean price since the previous change point (or series start).
    pub mean_before: f64,
    /// Mean price until the next change point (or series end).
    pub mean_after: f64,
    /// Posterior log-return variance of the regime before.
    pub variance_before: f64,
    /// Posterior log-return variance of the regime after.
    pub variance_after: f64,
    pub return_mean_before: f64,
    pub return_mean_after: f64,
    /// `(mean_after / mean_before - 1) * 100`. Positive is a price increase.
    pub impact_pct: f64,
    /// Whether inference passed its convergence diagnostics.
    pub converged: bool,
}

impl ChangePoint {
    /// Index into the price series of the first day of the new regime.
    pub fn price_index(&self) -> usize {
        self.index + 1
    }
}

/// Turns a [`Posterior`] into [`ChangePoint`]s. Deterministic.
#[derive(Debug, Clone, Default)]
pub struct PosteriorSummarizer {
    config: SummarizerConfig,
}

impl PosteriorSummarizer {
    pub fn new(config: SummarizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SummarizerConfig {
        &self.config
    }

    fn validate(&self) -> DataResult<()> {
        let t = self.config.probability_threshold;
        if !(0.0..1.0).contains(&t) {
            return Err(DataError::InvalidParameter(format!(
                "probability_threshold must be in [0, 1), got {}",
                t
            )));
        }
        if self.config.min_separation == 0 {
            return Err(DataError::InvalidParameter(
                "min_separation must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Indices surviving thresholding and suppression, in chronological order.
    pub fn select_indices(&self, probabilities: &[f64]) -> DataResult<Vec<usize>> {
        self.validate()?;

        let mut candidates: Vec<usize> = (0..probabilities.len())
            .filter(|&i| probabilities[i] > self.config.probability_threshold)
            .collect();
        // Strongest first; ties go to the earlier index.
        candidates.sort_by(|&a, &b| {
            probabilities[b]
                .total_cmp(&probabilities[a])
                .then(a.cmp(&b))
        });

        let mut accepted: Vec<usize> = Vec::new();
        for candidate in candidates {
            let suppressed = accepted
                .iter()
                .any(|&k| k.abs_diff(candidate) < self.config.min_separation);
            if !suppressed {
                accepted.push(candidate);
            }
        }

        accepted.sort_unstable();
        Ok(accepted)
    }

    pub fn summarize(
        &self,
        series: &PriceSeries,
        posterior: &Posterior,
    ) -> DataResult<Vec<ChangePoint>> {
        let returns = series.returns();
        if posterior.len() != returns.len() {
            return Err(DataError::LengthMismatch {
                expected: returns.len(),
                actual: posterior.len(),
            });
        }

        let indices = self.select_indices(&posterior.boundary_probability)?;
        let prices = series.prices();
        let converged = posterior.diagnostics.converged;

        let points = indices
            .iter()
            .enumerate()
            .map(|(j, &k)| {
                let prev = if j == 0 { None } else { Some(indices[j - 1]) };
                let next = indices.get(j + 1).copied();

                // Price spans: the regime before ends at price k, the one
                // after starts at price k + 1.
                let price_start = prev.map_or(0, |p| p + 1);
                let price_end = next.map_or(prices.len(), |n| n + 1);
                let mean_before = span_mean(&prices, price_start, k + 1);
                let mean_after = span_mean(&prices, k + 1, price_end);

                let return_start = prev.unwrap_or(0);
                let return_end = next.unwrap_or(returns.len());

                ChangePoint {
                    date: returns[k].date,
                    index: k,
                    probability: posterior.boundary_probability[k],
                    mean_before,
                    mean_after,
                    variance_before: span_mean(&posterior.regime_variance, return_start, k),
                    variance_after: span_mean(&posterior.regime_variance, k, return_end),
                    return_mean_before: span_mean(&posterior.regime_mean, return_start, k),
                    return_mean_after: span_mean(&posterior.regime_mean, k, return_end),
                    impact_pct: (mean_after / mean_before - 1.0) * 100.0,
                    converged,
                }
            })
            .collect();

        Ok(points)
    }
}

/// Mean of `values[start..end]`; an empty span falls back to the value at
/// `start`.
fn span_mean(values: &[f64], start: usize, end: usize) -> f64 {
    if start >= end {
        return values[start.min(values.len() - 1)];
    }
    values[start..end].iter().mean()
}
