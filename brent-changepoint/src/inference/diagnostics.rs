//! Convergence diagnostics across chains.
//!
//! - Gelman-Rubin potential scale reduction (R-hat)
//! - Effective sample size via Geyer's initial positive sequence
//!
//! Both are computed on the regime-count and log-posterior traces and the
//! worse of the two is reported.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use thiserror::Error;

use super::sampler::ChainTrace;

/// Thresholds a run must meet to count as converged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceCriteria {
    pub max_r_hat: f64,
    pub min_ess: f64,
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        Self {
            max_r_hat: 1.1,
            min_ess: 200.0,
        }
    }
}

/// Diagnostics failed. The posterior is still usable but less trustworthy.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvergenceError {
    #[error("Sampling budget exhausted after {elapsed_secs:.1}s")]
    BudgetExhausted { elapsed_secs: f64 },

    #[error("Chains disagree: R-hat {r_hat:.3} exceeds {max_r_hat:.3}")]
    ChainDisagreement { r_hat: f64, max_r_hat: f64 },

    #[error("Effective sample size {ess:.1} below {min_ess:.1}")]
    InsufficientEffectiveSamples { ess: f64, min_ess: f64 },
}

/// Diagnostics for one inference run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub chains: usize,
    pub samples_per_chain: Vec<usize>,
    /// Worst R-hat over the monitored traces. `None` with a single chain.
    pub r_hat: Option<f64>,
    /// Smallest multi-chain ESS over the monitored traces.
    pub ess: f64,
    pub shift_acceptance_rate: f64,
    /// Any chain hit the wall-clock limit.
    pub budget_exhausted: bool,
    pub elapsed_secs: f64,
    pub criteria: ConvergenceCriteria,
    pub converged: bool,
}

impl Diagnostics {
    pub fn from_traces(
        traces: &[ChainTrace],
        criteria: ConvergenceCriteria,
        elapsed_secs: f64,
    ) -> Self {
        let regime_counts: Vec<&[f64]> = traces.iter().map(|t| t.regime_counts.as_slice()).collect();
        let log_posterior: Vec<&[f64]> = traces.iter().map(|t| t.log_posterior.as_slice()).collect();

        let r_hat = match (
            potential_scale_reduction(&regime_counts),
            potential_scale_reduction(&log_posterior),
        ) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let ess = effective_sample_size(&regime_counts).min(effective_sample_size(&log_posterior));

        let proposals: u64 = traces.iter().map(|t| t.shift_proposals).sum();
        let accepts: u64 = traces.iter().map(|t| t.shift_accepts).sum();
        let shift_acceptance_rate = if proposals > 0 {
            accepts as f64 / proposals as f64
        } else {
            0.0
        };

        let mut diagnostics = Self {
            chains: traces.len(),
            samples_per_chain: traces.iter().map(|t| t.samples).collect(),
            r_hat,
            ess,
            shift_acceptance_rate,
            budget_exhausted: traces.iter().any(|t| t.stopped_early),
            elapsed_secs,
            criteria,
            converged: false,
        };
        diagnostics.converged = diagnostics.ensure_converged().is_ok();
        diagnostics
    }

    /// Check the run against its criteria. R-hat is only checked with two
    /// or more chains.
    pub fn ensure_converged(&self) -> Result<(), ConvergenceError> {
        if self.budget_exhausted {
            return Err(ConvergenceError::BudgetExhausted {
                elapsed_secs: self.elapsed_secs,
            });
        }
        if let Some(r_hat) = self.r_hat {
            if !(r_hat <= self.criteria.max_r_hat) {
                return Err(ConvergenceError::ChainDisagreement {
                    r_hat,
                    max_r_hat: self.criteria.max_r_hat,
                });
            }
        }
        if self.ess < self.criteria.min_ess {
            return Err(ConvergenceError::InsufficientEffectiveSamples {
                ess: self.ess,
                min_ess: self.criteria.min_ess,
            });
        }
        Ok(())
    }
}

/// Gelman-Rubin R-hat over chains truncated to a common length.
///
/// `None` with fewer than two chains or fewer than two draws each. Chains
/// that never move give 1.0 when they agree and infinity when they do not.
pub fn potential_scale_reduction(chains: &[&[f64]]) -> Option<f64> {
    if chains.len() < 2 {
        return None;
    }
    let n = chains.iter().map(|c| c.len()).min()?;
    if n < 2 {
        return None;
    }

    let chains: Vec<&[f64]> = chains.iter().map(|c| &c[..n]).collect();
    let m = chains.len() as f64;
    let nf = n as f64;

    let means: Vec<f64> = chains.iter().map(|c| c.iter().mean()).collect();
    let within = chains.iter().map(|c| c.iter().variance()).sum::<f64>() / m;
    let between = nf * means.iter().variance();

    if within <= 0.0 {
        return Some(if between > 0.0 { f64::INFINITY } else { 1.0 });
    }

    let pooled = (nf - 1.0) / nf * within + between / nf;
    Some((pooled / within).sqrt())
}

/// Effective sample size of one chain (Geyer initial positive sequence).
fn chain_ess(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 4 {
        return n as f64;
    }
    let m = values.iter().mean();
    let centered: Vec<f64> = values.iter().map(|v| v - m).collect();
    let c0 = centered.iter().map(|v| v * v).sum::<f64>() / n as f64;
    if c0 <= 0.0 {
        return n as f64;
    }

    let autocorr = |lag: usize| {
        centered[..n - lag]
            .iter()
            .zip(&centered[lag..])
            .map(|(a, b)| a * b)
            .sum::<f64>()
            / n as f64
            / c0
    };

    let mut tau = -1.0;
    let mut lag = 0;
    while lag + 1 < n {
        let pair = autocorr(lag) + autocorr(lag + 1);
        if pair <= 0.0 {
            break;
        }
        tau += 2.0 * pair;
        lag += 2;
    }

    if tau <= 0.0 {
        return n as f64;
    }
    (n as f64 / tau).min(n as f64)
}

/// Effective sample size summed over chains.
pub fn effective_sample_size(chains: &[&[f64]]) -> f64 {
    chains.iter().map(|c| chain_ess(c)).sum()
}
