//! Engine configuration.
//!
//! Every section has defaults, so a TOML file only needs the values it
//! changes:
//!
//! ```toml
//! [sampler]
//! seed = 42
//!
//! [correlator]
//! tolerance_days = 20
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::changepoint::SummarizerConfig;
use crate::events::CorrelatorConfig;
use crate::impact::ImpactConfig;
use crate::inference::{ConvergenceCriteria, PriorConfig, SamplerConfig};
use crate::preprocess::PreprocessConfig;
use crate::regime::{VolatilityBaseline, VolatilityConfig};
use crate::validation::IntegrityConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Configuration for a full engine run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub preprocess: PreprocessConfig,
    pub prior: PriorConfig,
    pub sampler: SamplerConfig,
    pub convergence: ConvergenceCriteria,
    pub summarizer: SummarizerConfig,
    pub correlator: CorrelatorConfig,
    pub impact: ImpactConfig,
    pub volatility: VolatilityConfig,
    pub validation: IntegrityConfig,
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.sampler.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: String| Err(ConfigError::Invalid { field, reason });

        if self.preprocess.rolling_window < 2 {
            return invalid("preprocess.rolling_window", "must be at least 2".to_string());
        }
        if let Err(e) = self.prior.validate() {
            return invalid("prior", e.to_string());
        }
        if self.sampler.chains == 0 {
            return invalid("sampler.chains", "must be at least 1".to_string());
        }
        if self.sampler.samples == 0 {
            return invalid("sampler.samples", "must be at least 1".to_string());
        }
        if self.sampler.thin == 0 {
            return invalid("sampler.thin", "must be at least 1".to_string());
        }
        if let Some(limit) = self.sampler.time_limit_secs {
            if !(limit.is_finite() && limit > 0.0) {
                return invalid("sampler.time_limit_secs", format!("must be positive, got {}", limit));
            }
        }
        if !(self.convergence.max_r_hat >= 1.0) {
            return invalid(
                "convergence.max_r_hat",
                format!("must be at least 1, got {}", self.convergence.max_r_hat),
            );
        }
        if !(0.0..1.0).contains(&self.summarizer.probability_threshold) {
            return invalid(
                "summarizer.probability_threshold",
                format!("must be in [0, 1), got {}", self.summarizer.probability_threshold),
            );
        }
        if self.summarizer.min_separation == 0 {
            return invalid("summarizer.min_separation", "must be at least 1".to_string());
        }
        if self.correlator.tolerance_days < 0 {
            return invalid(
                "correlator.tolerance_days",
                format!("must be non-negative, got {}", self.correlator.tolerance_days),
            );
        }
        if self.impact.window == 0 {
            return invalid("impact.window", "must be at least 1".to_string());
        }
        if self.volatility.window < 2 {
            return invalid("volatility.window", "must be at least 2".to_string());
        }
        if self.validation.max_gap_days < 1 {
            return invalid(
                "validation.max_gap_days",
                format!("must be at least 1, got {}", self.validation.max_gap_days),
            );
        }
        if !(self.validation.max_abs_log_return.is_finite() && self.validation.max_abs_log_return > 0.0) {
            return invalid(
                "validation.max_abs_log_return",
                format!("must be positive, got {}", self.validation.max_abs_log_return),
            );
        }
        match self.volatility.baseline {
            VolatilityBaseline::TrailingMean { observations: 0 } => {
                return invalid(
                    "volatility.baseline",
                    "trailing mean needs at least one observation".to_string(),
                );
            }
            VolatilityBaseline::Fixed { value } if !(value.is_finite() && value > 0.0) => {
                return invalid(
                    "volatility.baseline",
                    format!("fixed baseline must be positive, got {}", value),
                );
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.summarizer.probability_threshold, 0.5);
        assert_eq!(config.summarizer.min_separation, 5);
        assert_eq!(config.correlator.tolerance_days, 30);
        assert_eq!(config.impact.window, 30);
        assert_eq!(config.preprocess.rolling_window, 30);
        assert_eq!(config.sampler.chains, 4);
        assert_eq!(config.volatility.baseline, VolatilityBaseline::HistoricalMean);
        assert!((config.prior.change_point_rate - 1.0 / 250.0).abs() < 1e-15);
    }

    #[test]
    fn test_partial_toml() {
        let config = EngineConfig::from_toml_str(
            r#"
            [sampler]
            seed = 7
            chains = 2

            [correlator]
            tolerance_days = 10

            [volatility.baseline]
            kind = "trailing_mean"
            observations = 1260
            "#,
        )
        .unwrap();

        assert_eq!(config.sampler.seed, Some(7));
        assert_eq!(config.sampler.chains, 2);
        assert_eq!(config.sampler.warmup, SamplerConfig::default().warmup);
        assert_eq!(config.correlator.tolerance_days, 10);
        // Tolerance and impact windows are independent.
        assert_eq!(config.impact.window, 30);
        assert_eq!(
            config.volatility.baseline,
            VolatilityBaseline::TrailingMean { observations: 1260 }
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = EngineConfig::from_toml_str("[summarizer]\nprobability_threshold = 1.5\n")
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "summarizer.probability_threshold",
                ..
            }
        ));

        assert!(EngineConfig::from_toml_str("[sampler]\nchains = 0\n").is_err());
        assert!(matches!(
            EngineConfig::from_toml_str("[validation]\nmax_gap_days = 0\n").unwrap_err(),
            ConfigError::Invalid {
                field: "validation.max_gap_days",
                ..
            }
        ));
        assert!(EngineConfig::from_toml_str("[sampler\n").is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = EngineConfig::default().with_seed(99);
        let text = config.to_toml_string().unwrap();
        assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_shipped_default_file_parses() {
        let shipped = include_str!("../../config/default.toml");
        let config = EngineConfig::from_toml_str(shipped).unwrap();
        assert_eq!(config.summarizer, SummarizerConfig::default());
        assert_eq!(config.correlator, CorrelatorConfig::default());
        assert_eq!(config.validation, IntegrityConfig::default());
        assert_eq!(config.volatility.window, config.preprocess.rolling_window);
    }

    #[test]
    fn test_validation_section() {
        let config = EngineConfig::from_toml_str(
            "[validation]\nmax_gap_days = 4\nmax_abs_log_return = 0.25\n",
        )
        .unwrap();
        assert_eq!(config.validation.max_gap_days, 4);
        assert_eq!(config.validation.max_abs_log_return, 0.25);
    }
}
