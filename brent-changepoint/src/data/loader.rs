//! Data loader for Brent price and event catalog files.
//!
//! Prices are read from CSV or Parquet (chosen by file extension) with a
//! `Date` and a `Price` column. Brent history files mix date formats, so
//! dates are parsed leniently:
//! - `20-May-87` (`%d-%b-%y`)
//! - `Apr 22, 2020` (`%b %d, %Y`)
//! - `2020-04-22` (`%Y-%m-%d`)
//!
//! Light cleaning happens here (missing values, ordering, duplicates). Value
//! validation (positive prices, strictly increasing dates) is left to
//! [`crate::preprocess::PriceSeries`].

use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::types::{Event, EventType, PriceObservation};

/// Accepted date formats, tried in order.
pub const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%b-%y", "%d-%b-%Y", "%b %d, %Y", "%m/%d/%Y"];

/// Columns required in an event catalog file.
pub const EVENT_COLUMNS: &[&str] = &["event_date", "event_name", "event_type"];

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What the loader had to fix while reading a price file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningReport {
    /// Rows in the source file.
    pub total_rows: usize,
    /// Rows dropped for a missing or unparseable date or price.
    pub dropped_missing: usize,
    /// Rows dropped because their date was already present.
    pub dropped_duplicates: usize,
    /// Whether rows had to be re-sorted by date.
    pub reordered: bool,
}

impl CleaningReport {
    pub fn is_clean(&self) -> bool {
        self.dropped_missing == 0 && self.dropped_duplicates == 0 && !self.reordered
    }
}

/// Prices read from disk together with the cleaning that was applied.
#[derive(Debug, Clone)]
pub struct LoadedPrices {
    pub observations: Vec<PriceObservation>,
    pub report: CleaningReport,
}

/// Loader for price and event files.
#[derive(Debug, Clone)]
pub struct DataLoader {
    date_column: String,
    price_column: String,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self {
            date_column: "Date".to_string(),
            price_column: "Price".to_string(),
        }
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use different column names for the price file.
    pub fn with_columns(mut self, date_column: &str, price_column: &str) -> Self {
        self.date_column = date_column.to_string();
        self.price_column = price_column.to_string();
        self
    }

    /// Load and clean a daily price file.
    pub fn load_prices(&self, path: impl AsRef<Path>) -> Result<LoadedPrices, LoaderError> {
        let path = path.as_ref();
        info!("Loading prices from {}", path.display());

        let df = read_frame(path)?;
        let dates = string_column(&df, &self.date_column)?;
        let prices = float_column(&df, &self.price_column)?;

        let (observations, report) = clean_prices(&dates, &prices);

        if report.dropped_missing > 0 {
            warn!("Removed {} rows with missing values", report.dropped_missing);
        }
        if report.dropped_duplicates > 0 {
            warn!("Removed {} duplicate rows", report.dropped_duplicates);
        }
        if report.reordered {
            warn!("Price rows were not in chronological order; re-sorted");
        }
        if observations.is_empty() {
            return Err(LoaderError::InvalidData(format!(
                "No usable price rows in {}",
                path.display()
            )));
        }

        info!(
            "Loaded {} price observations ({} to {})",
            observations.len(),
            observations[0].date,
            observations[observations.len() - 1].date
        );

        Ok(LoadedPrices {
            observations,
            report,
        })
    }

    /// Load an event catalog.
    ///
    /// Rows without a parseable `event_date` or an `event_name` are skipped.
    pub fn load_events(&self, path: impl AsRef<Path>) -> Result<Vec<Event>, LoaderError> {
        let path = path.as_ref();
        info!("Loading events from {}", path.display());

        let df = read_frame(path)?;
        for column in EVENT_COLUMNS {
            if df.column(column).is_err() {
                return Err(LoaderError::MissingColumn(column.to_string()));
            }
        }

        let dates = string_column(&df, "event_date")?;
        let names = string_column(&df, "event_name")?;
        let types = string_column(&df, "event_type")?;
        let regions = optional_string_column(&df, "region_org", df.height())?;
        let descriptions = optional_string_column(&df, "description", df.height())?;
        let expected = optional_string_column(&df, "expected_impact", df.height())?;

        let mut events = Vec::with_capacity(df.height());
        let mut skipped = 0;

        for idx in 0..df.height() {
            let date = dates[idx].as_deref().and_then(parse_date);
            let name = names[idx].as_deref().filter(|s| !s.is_empty());

            let (Some(date), Some(name)) = (date, name) else {
                skipped += 1;
                continue;
            };

            let event_type = types[idx]
                .as_deref()
                .map(EventType::from_label)
                .unwrap_or(EventType::Other);

            events.push(Event {
                date,
                name: name.to_string(),
                event_type,
                region: regions[idx].clone().unwrap_or_else(|| "Unknown".to_string()),
                description: descriptions[idx].clone().filter(|s| !s.is_empty()),
                expected_impact: expected[idx].clone().filter(|s| !s.is_empty()),
            });
        }

        if skipped > 0 {
            warn!("Skipped {} event rows without a valid date or name", skipped);
        }
        info!("Loaded {} events", events.len());

        Ok(events)
    }
}

/// Parse a date in any of the accepted [`DATE_FORMATS`].
///
/// Timestamps such as `2020-04-22 00:00:00` are reduced to their date part.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            s.split(|c: char| c == ' ' || c == 'T')
                .next()
                .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
        })
}

/// Drop incomplete rows, sort by date and remove duplicate dates (first wins).
fn clean_prices(
    dates: &[Option<String>],
    prices: &[Option<f64>],
) -> (Vec<PriceObservation>, CleaningReport) {
    let mut report = CleaningReport {
        total_rows: dates.len(),
        ..Default::default()
    };

    let mut observations: Vec<PriceObservation> = dates
        .iter()
        .zip(prices.iter())
        .filter_map(|(date, price)| {
            let date = date.as_deref().and_then(parse_date);
            match (date, price) {
                (Some(date), Some(price)) if price.is_finite() => {
                    Some(PriceObservation::new(date, *price))
                }
                _ => None,
            }
        })
        .collect();
    report.dropped_missing = report.total_rows - observations.len();

    report.reordered = observations.windows(2).any(|w| w[1].date < w[0].date);
    // Stable sort keeps file order among equal dates, so dedup keeps the first row.
    observations.sort_by_key(|o| o.date);

    let before_dedup = observations.len();
    observations.dedup_by_key(|o| o.date);
    report.dropped_duplicates = before_dedup - observations.len();

    (observations, report)
}

fn read_frame(path: &Path) -> Result<DataFrame, LoaderError> {
    if !path.exists() {
        return Err(LoaderError::FileNotFound(path.display().to_string()));
    }

    let is_parquet = path
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("parquet"));

    let df = if is_parquet {
        ParquetReader::new(File::open(path)?).finish()?
    } else {
        CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?
    };

    Ok(df)
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>, LoaderError> {
    let column = df
        .column(name)
        .map_err(|_| LoaderError::MissingColumn(name.to_string()))?
        .cast(&DataType::String)?;

    let values = column
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.trim().to_string()))
        .collect();
    Ok(values)
}

fn optional_string_column(
    df: &DataFrame,
    name: &str,
    height: usize,
) -> Result<Vec<Option<String>>, LoaderError> {
    if df.column(name).is_err() {
        return Ok(vec![None; height]);
    }
    string_column(df, name)
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, LoaderError> {
    let column = df
        .column(name)
        .map_err(|_| LoaderError::MissingColumn(name.to_string()))?
        .cast(&DataType::Float64)?;

    Ok(column.f64()?.into_iter().collect())
}
