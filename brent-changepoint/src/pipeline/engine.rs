//! End-to-end analysis pipeline.
//!
//! prices -> returns -> posterior -> change points -> correlations and
//! impacts -> volatility labels. Each run recomputes everything from its
//! inputs.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::config::{ConfigError, EngineConfig};
use crate::changepoint::{ChangePoint, PosteriorSummarizer};
use crate::data::{DataLoader, Event, LoaderError, PriceObservation};
use crate::error::DataError;
use crate::events::{CorrelationIndex, EventCatalog, EventCorrelator, EventFilter};
use crate::impact::{event_type_volatility, EventTypeVolatility, ImpactQuantifier, ImpactRecord};
use crate::inference::{ChangePointModel, Diagnostics};
use crate::preprocess::{PriceSeries, SeriesSummary};
use crate::regime::{VolatilityRegimeClassifier, VolatilityReport};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Loader error: {0}")]
    Loader(#[from] LoaderError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Everything one run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub summary: SeriesSummary,
    pub diagnostics: Diagnostics,
    /// Convergence failure, if any. The results are still reported.
    pub convergence_error: Option<String>,
    pub expected_regimes: f64,
    pub change_points: Vec<ChangePoint>,
    pub events: Vec<Event>,
    pub correlations: CorrelationIndex,
    pub event_impacts: Vec<ImpactRecord>,
    pub change_point_impacts: Vec<ImpactRecord>,
    pub event_type_volatility: Vec<EventTypeVolatility>,
    /// `None` when the series is shorter than the volatility window.
    pub volatility: Option<VolatilityReport>,
}

impl AnalysisReport {
    pub fn converged(&self) -> bool {
        self.diagnostics.converged
    }

    /// Change points with probability at least `floor`.
    pub fn change_points_above(&self, floor: f64) -> Vec<&ChangePoint> {
        self.change_points
            .iter()
            .filter(|cp| cp.probability >= floor)
            .collect()
    }

    pub fn events_matching(&self, filter: &EventFilter) -> Vec<&Event> {
        self.events.iter().filter(|e| filter.matches(e)).collect()
    }

    /// Events matched to the change point at `change_point_ref`.
    pub fn events_for_change_point(&self, change_point_ref: usize) -> Vec<&Event> {
        self.correlations
            .events_for(change_point_ref)
            .map(|refs| refs.iter().filter_map(|&i| self.events.get(i)).collect())
            .unwrap_or_default()
    }
}

/// Runs the full analysis with one configuration.
#[derive(Debug, Clone, Default)]
pub struct RegimeEngine {
    config: EngineConfig,
}

impl RegimeEngine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Load prices (and optionally events) from disk and analyze them.
    pub fn analyze_files(
        &self,
        prices: impl AsRef<Path>,
        events: Option<&Path>,
    ) -> Result<AnalysisReport, EngineError> {
        let loader = DataLoader::new();
        let loaded = loader.load_prices(prices)?;
        let events = match events {
            Some(path) => loader.load_events(path)?,
            None => Vec::new(),
        };
        self.analyze(loaded.observations, events)
    }

    pub fn analyze(
        &self,
        observations: Vec<PriceObservation>,
        events: Vec<Event>,
    ) -> Result<AnalysisReport, EngineError> {
        let config = &self.config;

        let series = PriceSeries::new(observations)?;
        info!(
            "Analyzing {} prices ({} to {}) against {} events",
            series.len(),
            series.first_date(),
            series.last_date(),
            events.len()
        );
        let summary = SeriesSummary::from_series(&series, config.preprocess.rolling_window)?;

        let model = ChangePointModel::new(
            config.prior.clone(),
            config.sampler.clone(),
            config.convergence.clone(),
        );
        let posterior = model.fit(&series.log_returns())?;
        let convergence_error = match posterior.diagnostics.ensure_converged() {
            Ok(()) => None,
            Err(e) => {
                warn!("Inference did not converge: {}", e);
                Some(e.to_string())
            }
        };

        let change_points =
            PosteriorSummarizer::new(config.summarizer.clone()).summarize(&series, &posterior)?;
        info!("Detected {} change points", change_points.len());

        let catalog = EventCatalog::new(events);
        let correlations =
            EventCorrelator::new(config.correlator.clone()).correlate(catalog.events(), &change_points)?;
        info!(
            "Matched {} of {} events to change points",
            correlations.matched_count(),
            catalog.len()
        );

        let quantifier = ImpactQuantifier::new(config.impact.clone());
        let event_impacts = quantifier.for_events(&series, catalog.events())?;
        let change_point_impacts = quantifier.for_change_points(&series, &change_points)?;
        let by_type = event_type_volatility(catalog.events(), &event_impacts);

        let volatility = match VolatilityRegimeClassifier::new(config.volatility.clone()).report(&series) {
            Ok(report) => Some(report),
            Err(DataError::InsufficientData { required, actual }) => {
                warn!(
                    "Skipping volatility regimes: need {} prices, have {}",
                    required, actual
                );
                None
            }
            Err(DataError::InvalidBaseline(baseline)) => {
                warn!(
                    "Skipping volatility regimes: rolling volatility gives baseline {}",
                    baseline
                );
                None
            }
            Err(e) => return Err(e.into()),
        };

        Ok(AnalysisReport {
            summary,
            expected_regimes: posterior.expected_regimes,
            diagnostics: posterior.diagnostics,
            convergence_error,
            change_points,
            events: catalog.events().to_vec(),
            correlations,
            event_impacts,
            change_point_impacts,
            event_type_volatility: by_type,
            volatility,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::EventType;
    use crate::inference::SamplerConfig;
    use chrono::{Duration, NaiveDate};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
    }

    /// 100 daily prices around $50, jumping to around $70 at day 50.
    fn jump_series() -> Vec<PriceObservation> {
        let mut rng = StdRng::seed_from_u64(2024);
        (0..100)
            .map(|i| {
                let level = if i < 50 { 50.0 } else { 70.0 };
                let price = level + rng.gen_range(-0.5..0.5);
                PriceObservation::new(start() + Duration::days(i), price)
            })
            .collect()
    }

    fn engine() -> RegimeEngine {
        let config = EngineConfig {
            sampler: SamplerConfig {
                chains: 4,
                warmup: 200,
                samples: 400,
                seed: Some(42),
                ..Default::default()
            },
            ..Default::default()
        };
        RegimeEngine::new(config).unwrap()
    }

    #[test]
    fn test_detects_injected_jump() {
        let report = engine().analyze(jump_series(), Vec::new()).unwrap();

        assert_eq!(report.change_points.len(), 1, "{:?}", report.change_points);
        let cp = &report.change_points[0];
        let day = (cp.date - start()).num_days();
        assert!((49..=52).contains(&day), "change point on day {}", day);
        assert!(cp.probability > 0.5);
        assert!((cp.impact_pct - 40.0).abs() < 2.0, "impact {}", cp.impact_pct);
        assert!(cp.mean_after > cp.mean_before);

        assert_eq!(report.change_point_impacts.len(), 1);
        assert!(report.change_point_impacts[0].percent_change > 30.0);
    }

    #[test]
    fn test_event_after_jump_is_matched() {
        let engine = engine();
        let first = engine.analyze(jump_series(), Vec::new()).unwrap();
        let cp_date = first.change_points[0].date;

        let events = vec![
            Event::new(cp_date + Duration::days(5), "supply shock", EventType::SupplyDisruption, "Global"),
            Event::new(start() - Duration::days(400), "unrelated", EventType::Other, "Global"),
        ];
        let report = engine.analyze(jump_series(), events).unwrap();

        let c = &report.correlations.correlations[0];
        assert!(c.matched);
        assert_eq!(c.change_point_ref, Some(0));
        assert_eq!(c.offset_days, Some(-5));
        assert!(!report.correlations.correlations[1].matched);

        assert_eq!(report.events_for_change_point(0).len(), 1);
        assert_eq!(report.event_impacts.len(), 2);
        assert!(report.event_impacts[1].partial_window);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let a = engine().analyze(jump_series(), Vec::new()).unwrap();
        let b = engine().analyze(jump_series(), Vec::new()).unwrap();
        assert_eq!(a.change_points, b.change_points);
    }

    #[test]
    fn test_report_queries() {
        let report = engine().analyze(jump_series(), Vec::new()).unwrap();
        assert_eq!(report.change_points_above(0.5).len(), 1);
        assert!(report.change_points_above(1.01).is_empty());
        assert!(report.volatility.is_some());
        assert_eq!(report.summary.observations, 100);
    }

    #[test]
    fn test_short_series_skips_volatility() {
        let obs: Vec<_> = (0..10)
            .map(|i| PriceObservation::new(start() + Duration::days(i), 60.0 + (i % 2) as f64))
            .collect();
        let report = engine().analyze(obs, Vec::new()).unwrap();
        assert!(report.volatility.is_none());
    }

    #[test]
    fn test_flat_prices_skip_volatility() {
        let obs: Vec<_> = (0..60)
            .map(|i| PriceObservation::new(start() + Duration::days(i), 60.0))
            .collect();
        let report = engine().analyze(obs, Vec::new()).unwrap();

        assert!(report.volatility.is_none());
        assert!(report.change_points.is_empty());
        assert_eq!(report.summary.volatility_current, Some(0.0));
    }

    #[test]
    fn test_unconverged_run_still_reports() {
        let mut config = engine().config().clone();
        config.convergence.min_ess = 1e9;
        let report = RegimeEngine::new(config)
            .unwrap()
            .analyze(jump_series(), Vec::new())
            .unwrap();

        assert!(!report.converged());
        let error = report.convergence_error.as_deref().unwrap();
        assert!(error.contains("Effective sample size"), "{}", error);
        assert!(!report.change_points.is_empty());
        assert!(report.change_points.iter().all(|cp| !cp.converged));
    }

    #[test]
    fn test_invalid_input_is_fatal() {
        let obs = vec![PriceObservation::new(start(), 50.0)];
        assert!(matches!(
            engine().analyze(obs, Vec::new()),
            Err(EngineError::Data(DataError::InsufficientData { .. }))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EngineConfig::default();
        config.impact.window = 0;
        assert!(matches!(
            RegimeEngine::new(config),
            Err(EngineError::Config(_))
        ));
    }
}
