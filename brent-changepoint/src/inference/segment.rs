//! Conjugate segment likelihood.
//!
//! Returns inside one regime are Normal with unknown mean and variance under a
//! Normal-Inverse-Gamma prior. Both parameters integrate out, so a segment is
//! scored by its marginal likelihood, which only needs the segment length,
//! sum and sum of squares. Those come from prefix sums in O(1).

use serde::{Deserialize, Serialize};
use statrs::function::gamma::ln_gamma;
use statrs::statistics::Statistics;

use crate::error::{DataError, DataResult};

/// Prior over regimes, on the standardized return scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorConfig {
    /// Prior mean of a regime's mean.
    pub mu0: f64,
    /// Pseudo-observations behind `mu0`.
    pub kappa0: f64,
    /// Inverse-Gamma shape for the regime variance.
    pub alpha0: f64,
    /// Inverse-Gamma scale for the regime variance.
    pub beta0: f64,
    /// Prior probability that any interior index starts a new regime.
    /// Lower values favor fewer regimes.
    pub change_point_rate: f64,
}

impl Default for PriorConfig {
    fn default() -> Self {
        Self {
            mu0: 0.0,
            kappa0: 0.01,
            alpha0: 1.0,
            beta0: 1.0,
            change_point_rate: 1.0 / 250.0, // one shift per trading year
        }
    }
}

impl PriorConfig {
    pub fn validate(&self) -> DataResult<()> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(DataError::InvalidParameter(format!(
                    "{} must be positive, got {}",
                    name, v
                )))
            }
        };
        positive("kappa0", self.kappa0)?;
        positive("alpha0", self.alpha0)?;
        positive("beta0", self.beta0)?;

        if !self.mu0.is_finite() {
            return Err(DataError::InvalidParameter(format!(
                "mu0 must be finite, got {}",
                self.mu0
            )));
        }
        if !(self.change_point_rate > 0.0 && self.change_point_rate < 1.0) {
            return Err(DataError::InvalidParameter(format!(
                "change_point_rate must be in (0, 1), got {}",
                self.change_point_rate
            )));
        }
        Ok(())
    }

    /// Log prior odds of a boundary at one index.
    pub fn log_odds(&self) -> f64 {
        (self.change_point_rate / (1.0 - self.change_point_rate)).ln()
    }
}

/// Returns rescaled to zero mean and unit variance.
#[derive(Debug, Clone, PartialEq)]
pub struct Standardized {
    pub values: Vec<f64>,
    pub center: f64,
    /// Sample standard deviation, or 1 for a constant series.
    pub scale: f64,
}

impl Standardized {
    pub fn mean_to_original(&self, mean: f64) -> f64 {
        self.center + self.scale * mean
    }

    pub fn variance_to_original(&self, variance: f64) -> f64 {
        variance * self.scale * self.scale
    }
}

pub fn standardize(values: &[f64]) -> Standardized {
    let center = if values.is_empty() {
        0.0
    } else {
        values.iter().copied().mean()
    };
    let std = if values.len() > 1 {
        values.iter().copied().std_dev()
    } else {
        0.0
    };
    let scale = if std.is_finite() && std > 0.0 { std } else { 1.0 };

    Standardized {
        values: values.iter().map(|v| (v - center) / scale).collect(),
        center,
        scale,
    }
}

/// Marginal likelihood of any contiguous segment of a fixed series.
#[derive(Debug, Clone)]
pub struct SegmentModel {
    prior: PriorConfig,
    prefix_sum: Vec<f64>,
    prefix_sq: Vec<f64>,
    /// `ln Gamma(alpha0 + n/2)` for n in 0..=len.
    ln_gamma_table: Vec<f64>,
    /// Terms that depend only on the prior.
    ln_prior_const: f64,
}

impl SegmentModel {
    pub fn new(values: &[f64], prior: PriorConfig) -> Self {
        let n = values.len();
        let mut prefix_sum = Vec::with_capacity(n + 1);
        let mut prefix_sq = Vec::with_capacity(n + 1);
        let (mut s1, mut s2) = (0.0, 0.0);
        prefix_sum.push(0.0);
        prefix_sq.push(0.0);
        for v in values {
            s1 += v;
            s2 += v * v;
            prefix_sum.push(s1);
            prefix_sq.push(s2);
        }

        let ln_gamma_table = (0..=n)
            .map(|k| ln_gamma(prior.alpha0 + k as f64 / 2.0))
            .collect();
        let ln_prior_const =
            -ln_gamma(prior.alpha0) + prior.alpha0 * prior.beta0.ln() + 0.5 * prior.kappa0.ln();

        Self {
            prior,
            prefix_sum,
            prefix_sq,
            ln_gamma_table,
            ln_prior_const,
        }
    }

    pub fn len(&self) -> usize {
        self.prefix_sum.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn prior(&self) -> &PriorConfig {
        &self.prior
    }

    /// Posterior hyperparameters `(kappa_n, mu_n, alpha_n, beta_n)` of `[start, end)`.
    fn posterior(&self, start: usize, end: usize) -> (f64, f64, f64, f64) {
        let n = (end - start) as f64;
        let sum = self.prefix_sum[end] - self.prefix_sum[start];
        let sq = self.prefix_sq[end] - self.prefix_sq[start];
        let mean = sum / n;
        let ss = (sq - sum * mean).max(0.0);

        let p = &self.prior;
        let kappa_n = p.kappa0 + n;
        let mu_n = (p.kappa0 * p.mu0 + sum) / kappa_n;
        let alpha_n = p.alpha0 + n / 2.0;
        let dev = mean - p.mu0;
        let beta_n = p.beta0 + 0.5 * ss + p.kappa0 * n * dev * dev / (2.0 * kappa_n);
        (kappa_n, mu_n, alpha_n, beta_n)
    }

    /// Log marginal likelihood of the values in `[start, end)`.
    pub fn log_marginal(&self, start: usize, end: usize) -> f64 {
        debug_assert!(start < end && end <= self.len());
        let n = end - start;
        let (kappa_n, _, alpha_n, beta_n) = self.posterior(start, end);

        self.ln_gamma_table[n] + self.ln_prior_const
            - alpha_n * beta_n.ln()
            - 0.5 * kappa_n.ln()
            - 0.5 * n as f64 * (2.0 * std::f64::consts::PI).ln()
    }

    /// Posterior mean of the regime mean and variance for `[start, end)`.
    pub fn regime_moments(&self, start: usize, end: usize) -> (f64, f64) {
        let (_, mu_n, alpha_n, beta_n) = self.posterior(start, end);
        let variance = if alpha_n > 1.0 {
            beta_n / (alpha_n - 1.0)
        } else {
            beta_n / alpha_n
        };
        (mu_n, variance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standardize() {
        let s = standardize(&[1.0, 2.0, 3.0]);
        assert!((s.center - 2.0).abs() < 1e-12);
        assert!((s.scale - 1.0).abs() < 1e-12);
        for (v, expected) in s.values.iter().zip([-1.0, 0.0, 1.0]) {
            assert!((v - expected).abs() < 1e-12);
        }

        let flat = standardize(&[0.5, 0.5, 0.5]);
        assert_eq!(flat.scale, 1.0);
        assert!(flat.values.iter().all(|v| *v == 0.0));
        assert!((flat.mean_to_original(0.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_single_observation_marginal_matches_student_t() {
        // Predictive for one observation is Student-t with 2*alpha0 dof.
        let prior = PriorConfig {
            mu0: 0.0,
            kappa0: 1.0,
            alpha0: 1.0,
            beta0: 1.0,
            change_point_rate: 0.01,
        };
        let model = SegmentModel::new(&[0.7], prior.clone());

        let dof = 2.0 * prior.alpha0;
        let scale2 = prior.beta0 * (1.0 + prior.kappa0) / (prior.alpha0 * prior.kappa0);
        let x: f64 = 0.7;
        let expected = ln_gamma((dof + 1.0) / 2.0)
            - ln_gamma(dof / 2.0)
            - 0.5 * (dof * std::f64::consts::PI * scale2).ln()
            - (dof + 1.0) / 2.0 * (1.0 + x * x / (dof * scale2)).ln();

        assert!((model.log_marginal(0, 1) - expected).abs() < 1e-10);
    }

    #[test]
    fn test_marginal_prefers_split_at_shift() {
        let mut values = vec![0.0; 40];
        for (i, v) in values.iter_mut().enumerate() {
            let noise = if i % 2 == 0 { 0.1 } else { -0.1 };
            *v = if i < 20 { -1.0 + noise } else { 1.0 + noise };
        }
        let model = SegmentModel::new(&values, PriorConfig::default());

        let split = model.log_marginal(0, 20) + model.log_marginal(20, 40);
        let whole = model.log_marginal(0, 40);
        assert!(split - whole > 10.0);
    }

    #[test]
    fn test_regime_moments() {
        let values: Vec<f64> = (0..200)
            .map(|i| if i % 2 == 0 { 2.5 } else { 1.5 })
            .collect();
        let model = SegmentModel::new(&values, PriorConfig::default());
        let (mean, var) = model.regime_moments(0, 200);

        assert!((mean - 2.0).abs() < 0.01);
        assert!((var - 0.25).abs() < 0.05);
    }

    #[test]
    fn test_prior_validation() {
        assert!(PriorConfig::default().validate().is_ok());
        let bad = PriorConfig {
            change_point_rate: 1.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = PriorConfig {
            beta0: 0.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
