//! Engine configuration and the end-to-end pipeline.

pub mod config;
pub mod engine;

pub use config::{ConfigError, EngineConfig};
pub use engine::{AnalysisReport, EngineError, RegimeEngine};
