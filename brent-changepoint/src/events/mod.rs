//! Event catalog and event to change point correlation.

pub mod catalog;
pub mod correlator;

pub use catalog::{EventCatalog, EventFilter, TypeCount};
pub use correlator::{Correlation, CorrelationIndex, CorrelatorConfig, EventCorrelator};
