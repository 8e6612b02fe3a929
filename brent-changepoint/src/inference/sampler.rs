//! Single-chain sampler over regime boundaries.
//!
//! State is a boolean per return index: `true` means a new regime starts
//! there. Index 0 always starts the first regime and is never a boundary.
//! Each sweep runs:
//! - A collapsed Gibbs pass resampling every indicator given its neighbours
//! - Metropolis moves shifting each existing boundary by a small offset

use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::segment::SegmentModel;

/// Sampling budget and chain layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Independent chains, run in parallel.
    pub chains: usize,
    /// Sweeps discarded before recording.
    pub warmup: usize,
    /// Recorded samples per chain.
    pub samples: usize,
    /// Sweeps between recorded samples.
    pub thin: usize,
    /// Largest offset tried by a boundary shift move.
    pub max_shift: usize,
    /// Wall-clock limit for the whole run, in seconds.
    pub time_limit_secs: Option<f64>,
    /// Base seed; chain `c` uses `seed + c`. Entropy when unset.
    pub seed: Option<u64>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            chains: 4,
            warmup: 500,
            samples: 1000,
            thin: 1,
            max_shift: 5,
            time_limit_secs: None,
            seed: None,
        }
    }
}

impl SamplerConfig {
    /// Total sweeps a chain runs when not stopped early.
    pub fn total_sweeps(&self) -> usize {
        self.warmup + self.samples * self.thin.max(1)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Everything one chain recorded.
#[derive(Debug, Clone)]
pub struct ChainTrace {
    pub chain: usize,
    /// Recorded samples.
    pub samples: usize,
    /// Sweeps actually run.
    pub sweeps: usize,
    /// Per index, how many recorded samples had a boundary there.
    pub boundary_counts: Vec<u64>,
    /// Per index, sum over samples of the containing regime's mean.
    pub mean_sums: Vec<f64>,
    /// Per index, sum over samples of the containing regime's variance.
    pub variance_sums: Vec<f64>,
    /// Regime count of each recorded sample.
    pub regime_counts: Vec<f64>,
    /// Unnormalized log posterior of each recorded sample.
    pub log_posterior: Vec<f64>,
    pub shift_proposals: u64,
    pub shift_accepts: u64,
    /// The deadline cut the chain short.
    pub stopped_early: bool,
}

impl ChainTrace {
    fn new(chain: usize, n: usize) -> Self {
        Self {
            chain,
            samples: 0,
            sweeps: 0,
            boundary_counts: vec![0; n],
            mean_sums: vec![0.0; n],
            variance_sums: vec![0.0; n],
            regime_counts: Vec::new(),
            log_posterior: Vec::new(),
            shift_proposals: 0,
            shift_accepts: 0,
            stopped_early: false,
        }
    }
}

fn logistic(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

struct ChainState<'a> {
    model: &'a SegmentModel,
    boundaries: Vec<bool>,
    log_odds: f64,
    ln_rate: f64,
    ln_no_change: f64,
}

impl<'a> ChainState<'a> {
    fn new(model: &'a SegmentModel, init_rate: f64, rng: &mut StdRng) -> Self {
        let n = model.len();
        let boundaries = (0..n).map(|t| t > 0 && rng.gen::<f64>() < init_rate).collect();
        let rate = model.prior().change_point_rate;
        Self {
            model,
            boundaries,
            log_odds: model.prior().log_odds(),
            ln_rate: rate.ln(),
            ln_no_change: (1.0 - rate).ln(),
        }
    }

    fn positions(&self) -> Vec<usize> {
        self.boundaries
            .iter()
            .enumerate()
            .filter_map(|(t, b)| b.then_some(t))
            .collect()
    }

    /// Segment boundaries `[0, b1, ..., bk, n]`.
    fn edges(&self) -> Vec<usize> {
        let mut edges = Vec::with_capacity(self.boundaries.len() / 8 + 2);
        edges.push(0);
        edges.extend(self.positions());
        edges.push(self.boundaries.len());
        edges
    }

    fn gibbs_sweep(&mut self, rng: &mut StdRng) {
        let n = self.boundaries.len();

        // Indicators above t are untouched when t is visited, so the next
        // boundary can be computed up front.
        let mut next_after = vec![n; n];
        let mut next = n;
        for t in (0..n).rev() {
            next_after[t] = next;
            if self.boundaries[t] {
                next = t;
            }
        }

        let mut prev = 0;
        for t in 1..n {
            let next = next_after[t];
            let split = self.model.log_marginal(prev, t) + self.model.log_marginal(t, next);
            let merged = self.model.log_marginal(prev, next);
            let p = logistic(split - merged + self.log_odds);

            self.boundaries[t] = rng.gen::<f64>() < p;
            if self.boundaries[t] {
                prev = t;
            }
        }
    }

    fn shift_moves(&mut self, max_shift: usize, rng: &mut StdRng, trace: &mut ChainTrace) {
        if max_shift == 0 {
            return;
        }
        let n = self.boundaries.len();
        let mut positions = self.positions();

        for j in 0..positions.len() {
            let current = positions[j];
            let lo = if j == 0 { 0 } else { positions[j - 1] };
            let hi = positions.get(j + 1).copied().unwrap_or(n);

            let step = rng.gen_range(1..=max_shift);
            let proposed = if rng.gen::<bool>() {
                current + step
            } else if current > step {
                current - step
            } else {
                continue;
            };
            trace.shift_proposals += 1;
            if proposed <= lo || proposed >= hi {
                continue;
            }

            let m = self.model;
            let delta = m.log_marginal(lo, proposed) + m.log_marginal(proposed, hi)
                - m.log_marginal(lo, current)
                - m.log_marginal(current, hi);

            if rng.gen::<f64>().ln() < delta {
                self.boundaries[current] = false;
                self.boundaries[proposed] = true;
                positions[j] = proposed;
                trace.shift_accepts += 1;
            }
        }
    }

    fn record(&self, trace: &mut ChainTrace) {
        let edges = self.edges();
        let mut log_likelihood = 0.0;

        for w in edges.windows(2) {
            let (start, end) = (w[0], w[1]);
            log_likelihood += self.model.log_marginal(start, end);
            let (mean, variance) = self.model.regime_moments(start, end);
            for t in start..end {
                trace.mean_sums[t] += mean;
                trace.variance_sums[t] += variance;
            }
            if start > 0 {
                trace.boundary_counts[start] += 1;
            }
        }

        let changes = edges.len() - 2;
        let interior = self.boundaries.len().saturating_sub(1);
        let log_prior =
            changes as f64 * self.ln_rate + (interior - changes) as f64 * self.ln_no_change;

        trace.samples += 1;
        trace.regime_counts.push((changes + 1) as f64);
        trace.log_posterior.push(log_likelihood + log_prior);
    }
}

/// Run one chain to completion or until `deadline`.
///
/// Chains start from different boundary densities so that disagreement
/// between them is visible in the diagnostics.
pub fn run_chain(
    model: &SegmentModel,
    config: &SamplerConfig,
    chain: usize,
    deadline: Option<Instant>,
) -> ChainTrace {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(chain as u64)),
        None => StdRng::from_entropy(),
    };

    let n = model.len();
    let mut trace = ChainTrace::new(chain, n);
    if n == 0 {
        return trace;
    }

    let init_rate = (chain as f64 * 0.01).min(0.5);
    let mut state = ChainState::new(model, init_rate, &mut rng);
    let thin = config.thin.max(1);

    for sweep in 0..config.total_sweeps() {
        if deadline.map_or(false, |d| Instant::now() >= d) {
            trace.stopped_early = true;
            break;
        }

        state.gibbs_sweep(&mut rng);
        state.shift_moves(config.max_shift, &mut rng, &mut trace);
        trace.sweeps += 1;

        if sweep >= config.warmup && (sweep - config.warmup) % thin == 0 {
            state.record(&mut trace);
        }
    }

    if trace.samples == 0 {
        state.record(&mut trace);
    }

    debug!(
        "Chain {} finished: {} sweeps, {} samples{}",
        chain,
        trace.sweeps,
        trace.samples,
        if trace.stopped_early { " (stopped early)" } else { "" }
    );

    trace
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::segment::{standardize, PriorConfig};

    fn shifted_series() -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(7);
        (0..120)
            .map(|i| {
                let level = if i < 60 { -1.0 } else { 1.5 };
                level + rng.gen_range(-0.2..0.2)
            })
            .collect()
    }

    fn quick_config() -> SamplerConfig {
        SamplerConfig {
            chains: 1,
            warmup: 50,
            samples: 100,
            thin: 1,
            max_shift: 3,
            time_limit_secs: None,
            seed: Some(11),
        }
    }

    #[test]
    fn test_logistic_is_stable() {
        assert_eq!(logistic(0.0), 0.5);
        assert!(logistic(800.0) <= 1.0);
        assert!(logistic(-800.0) >= 0.0);
        assert!(logistic(-800.0).is_finite());
    }

    #[test]
    fn test_chain_finds_shift() {
        let data = standardize(&shifted_series());
        let model = SegmentModel::new(&data.values, PriorConfig::default());
        let trace = run_chain(&model, &quick_config(), 0, None);

        assert_eq!(trace.samples, 100);
        assert_eq!(trace.sweeps, 150);
        assert!(!trace.stopped_early);
        assert_eq!(trace.boundary_counts[0], 0);

        let (best, count) = trace
            .boundary_counts
            .iter()
            .enumerate()
            .max_by_key(|(_, c)| **c)
            .unwrap();
        assert_eq!(best, 60);
        assert!(*count as f64 / trace.samples as f64 > 0.9);
    }

    #[test]
    fn test_same_seed_same_trace() {
        let data = standardize(&shifted_series());
        let model = SegmentModel::new(&data.values, PriorConfig::default());
        let a = run_chain(&model, &quick_config(), 2, None);
        let b = run_chain(&model, &quick_config(), 2, None);

        assert_eq!(a.boundary_counts, b.boundary_counts);
        assert_eq!(a.log_posterior, b.log_posterior);
    }

    #[test]
    fn test_expired_deadline_still_records_once() {
        let data = standardize(&shifted_series());
        let model = SegmentModel::new(&data.values, PriorConfig::default());
        let trace = run_chain(&model, &quick_config(), 0, Some(Instant::now()));

        assert!(trace.stopped_early);
        assert_eq!(trace.sweeps, 0);
        assert_eq!(trace.samples, 1);
        assert_eq!(trace.regime_counts.len(), 1);
    }
}
