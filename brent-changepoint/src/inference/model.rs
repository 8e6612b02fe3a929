//! Multi-chain change-point model.

use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::diagnostics::{ConvergenceCriteria, Diagnostics};
use super::sampler::{run_chain, ChainTrace, SamplerConfig};
use super::segment::{standardize, PriorConfig, SegmentModel};
use crate::error::{DataError, DataResult};

/// Posterior over regime boundaries, per return index, in log-return units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posterior {
    /// Probability that a new regime starts at each index. Index 0 is 0.
    pub boundary_probability: Vec<f64>,
    /// Posterior mean of the regime mean containing each index.
    pub regime_mean: Vec<f64>,
    /// Posterior mean of the regime variance containing each index.
    pub regime_variance: Vec<f64>,
    /// Posterior mean number of regimes.
    pub expected_regimes: f64,
    pub diagnostics: Diagnostics,
}

impl Posterior {
    pub fn len(&self) -> usize {
        self.boundary_probability.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundary_probability.is_empty()
    }
}

/// Bayesian change-point model over a log-return series.
///
/// Fitting is a pure function of the returns, prior, budget and seed.
/// Chains run as independent rayon tasks and are merged once all finish.
#[derive(Debug, Clone, Default)]
pub struct ChangePointModel {
    pub prior: PriorConfig,
    pub sampler: SamplerConfig,
    pub criteria: ConvergenceCriteria,
}

impl ChangePointModel {
    pub fn new(prior: PriorConfig, sampler: SamplerConfig, criteria: ConvergenceCriteria) -> Self {
        Self {
            prior,
            sampler,
            criteria,
        }
    }

    pub fn fit(&self, log_returns: &[f64]) -> DataResult<Posterior> {
        if log_returns.is_empty() {
            return Err(DataError::InsufficientData {
                required: 1,
                actual: 0,
            });
        }
        if let Some(index) = log_returns.iter().position(|r| !r.is_finite()) {
            return Err(DataError::NonFiniteReturn { index });
        }
        self.prior.validate()?;
        if self.sampler.chains == 0 {
            return Err(DataError::InvalidParameter(
                "at least one chain is required".to_string(),
            ));
        }
        if let Some(limit) = self.sampler.time_limit_secs {
            if !(limit.is_finite() && limit > 0.0) {
                return Err(DataError::InvalidParameter(format!(
                    "time_limit_secs must be positive, got {}",
                    limit
                )));
            }
        }

        let started = Instant::now();
        let deadline = self
            .sampler
            .time_limit_secs
            .map(|secs| started + Duration::from_secs_f64(secs));

        let data = standardize(log_returns);
        let model = SegmentModel::new(&data.values, self.prior.clone());

        info!(
            "Sampling {} returns with {} chains ({} sweeps each)",
            log_returns.len(),
            self.sampler.chains,
            self.sampler.total_sweeps()
        );

        let traces: Vec<ChainTrace> = (0..self.sampler.chains)
            .into_par_iter()
            .map(|chain| run_chain(&model, &self.sampler, chain, deadline))
            .collect();

        let elapsed = started.elapsed().as_secs_f64();
        let diagnostics = Diagnostics::from_traces(&traces, self.criteria.clone(), elapsed);

        let n = log_returns.len();
        let total: u64 = traces.iter().map(|t| t.samples as u64).sum();
        let total_f = total as f64;

        let mut boundary_probability = vec![0.0; n];
        let mut regime_mean = vec![0.0; n];
        let mut regime_variance = vec![0.0; n];
        for trace in &traces {
            for i in 0..n {
                boundary_probability[i] += trace.boundary_counts[i] as f64;
                regime_mean[i] += trace.mean_sums[i];
                regime_variance[i] += trace.variance_sums[i];
            }
        }
        for i in 0..n {
            boundary_probability[i] /= total_f;
            regime_mean[i] = data.mean_to_original(regime_mean[i] / total_f);
            regime_variance[i] = data.variance_to_original(regime_variance[i] / total_f);
        }

        let expected_regimes = traces
            .iter()
            .flat_map(|t| t.regime_counts.iter())
            .sum::<f64>()
            / total_f;

        info!(
            "Sampling finished in {:.2}s: {:.2} expected regimes, R-hat {}, ESS {:.0}",
            elapsed,
            expected_regimes,
            diagnostics
                .r_hat
                .map_or_else(|| "n/a".to_string(), |r| format!("{:.3}", r)),
            diagnostics.ess
        );

        Ok(Posterior {
            boundary_probability,
            regime_mean,
            regime_variance,
            expected_regimes,
            diagnostics,
        })
    }
}
