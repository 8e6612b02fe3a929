//! Validation of raw price data.
//!
//! Checks order, duplicates, price validity, calendar gaps and extreme moves
//! before the series is handed to the engine.

pub mod data_integrity;

pub use data_integrity::{CheckResult, IntegrityConfig, IntegrityReport, SeriesIntegrityValidator};
