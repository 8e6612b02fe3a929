//! Input errors shared by every stage of the engine.

use chrono::NaiveDate;
use thiserror::Error;

/// Malformed or insufficient input. Fatal: the run is aborted and the
/// offending record is reported back to the caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("Insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Dates must be strictly increasing: {date} at index {index} follows {previous}")]
    NonMonotonicDate {
        index: usize,
        previous: NaiveDate,
        date: NaiveDate,
    },

    #[error("Invalid price {price} on {date} (index {index})")]
    InvalidPrice {
        index: usize,
        date: NaiveDate,
        price: f64,
    },

    #[error("Non-finite return at index {index}")]
    NonFiniteReturn { index: usize },

    #[error("Posterior covers {actual} returns but the series has {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Invalid volatility baseline: {0}")]
    InvalidBaseline(f64),

    #[error("Invalid volatility value: {0}")]
    InvalidVolatility(f64),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type DataResult<T> = Result<T, DataError>;
