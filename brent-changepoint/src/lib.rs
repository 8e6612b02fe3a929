pub mod changepoint;
pub mod data;
pub mod error;
pub mod events;
pub mod impact;
pub mod inference;
pub mod pipeline;
pub mod preprocess;
pub mod regime;
pub mod validation;

// Re-export commonly used types
pub use changepoint::{ChangePoint, PosteriorSummarizer, SummarizerConfig};
pub use data::{DataLoader, Event, EventType, PriceObservation, ReturnObservation};
pub use error::DataError;
pub use events::{Correlation, CorrelationIndex, EventCatalog, EventCorrelator, EventFilter};
pub use impact::{Anchor, ImpactQuantifier, ImpactRecord};
pub use inference::{ChangePointModel, ConvergenceError, Diagnostics, Posterior};
pub use pipeline::{AnalysisReport, EngineConfig, EngineError, RegimeEngine};
pub use preprocess::{PriceSeries, SeriesSummary};
pub use regime::{classify, VolatilityBaseline, VolatilityRegime, VolatilityRegimeLabel};
pub use validation::SeriesIntegrityValidator;
