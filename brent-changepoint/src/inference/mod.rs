//! Bayesian change-point inference.
//!
//! Returns are modeled as Normal with piecewise-constant mean and variance:
//! - Segment parameters are integrated out under a conjugate prior
//! - Boundary indicators are sampled by collapsed Gibbs plus shift moves
//! - Several seeded chains run in parallel and are checked for agreement

pub mod diagnostics;
pub mod model;
pub mod sampler;
pub mod segment;

pub use diagnostics::{
    effective_sample_size, potential_scale_reduction, ConvergenceCriteria, ConvergenceError,
    Diagnostics,
};
pub use model::{ChangePointModel, Posterior};
pub use sampler::{run_chain, ChainTrace, SamplerConfig};
pub use segment::{standardize, PriorConfig, SegmentModel, Standardized};
