//! Data integrity validation for daily price files.
//!
//! Validates:
//! - Missing values dropped while loading
//! - Chronological order
//! - Duplicate dates
//! - Price validity (positive, finite)
//! - Date continuity (no calendar gap longer than a week)
//! - Extreme daily moves (|log return| above a threshold)

use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::{DataLoader, LoadedPrices, LoaderError, PriceObservation};

/// Integrity thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrityConfig {
    /// Longest calendar gap between observations that is not flagged.
    pub max_gap_days: i64,
    /// Largest |daily log return| that is not flagged.
    pub max_abs_log_return: f64,
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        Self {
            max_gap_days: 7,
            max_abs_log_return: 0.5,
        }
    }
}

/// Result of a single validation check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
}

impl CheckResult {
    pub fn pass(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            message: message.to_string(),
            details: None,
        }
    }

    pub fn fail(name: &str, message: &str, details: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            message: message.to_string(),
            details,
        }
    }
}

/// Integrity report for one price series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub observations: usize,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub checks: Vec<CheckResult>,
}

impl IntegrityReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failed_checks(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }

    pub fn summary(&self) -> String {
        let passed = self.checks.iter().filter(|c| c.passed).count();
        let range = match (self.start_date, self.end_date) {
            (Some(s), Some(e)) => format!("{} to {}", s, e),
            _ => "empty".to_string(),
        };
        format!(
            "{} observations ({}): {}/{} checks passed",
            self.observations,
            range,
            passed,
            self.checks.len()
        )
    }
}

/// Joins the first few offending entries for a check's details.
fn sample_details(items: &[String]) -> String {
    let mut details = items.iter().take(5).cloned().collect::<Vec<_>>().join(", ");
    if items.len() > 5 {
        details.push_str(&format!(" (+{} more)", items.len() - 5));
    }
    details
}

/// Validator for daily price series.
#[derive(Debug, Clone, Default)]
pub struct SeriesIntegrityValidator {
    loader: DataLoader,
    config: IntegrityConfig,
}

impl SeriesIntegrityValidator {
    pub fn new(loader: DataLoader, config: IntegrityConfig) -> Self {
        Self { loader, config }
    }

    /// Load a price file and validate it, including what cleaning removed.
    pub fn validate_file(&self, path: impl AsRef<Path>) -> Result<IntegrityReport, LoaderError> {
        let loaded = self.loader.load_prices(path)?;
        Ok(self.validate_loaded(&loaded))
    }

    /// Validate cleaned prices. Order and duplicate checks come from the
    /// cleaning report since the observations are already sorted and unique.
    pub fn validate_loaded(&self, loaded: &LoadedPrices) -> IntegrityReport {
        let report = &loaded.report;
        let obs = &loaded.observations;

        let missing = if report.dropped_missing == 0 {
            CheckResult::pass("missing_values", "No rows with missing values")
        } else {
            CheckResult::fail(
                "missing_values",
                &format!(
                    "{} of {} rows dropped for a missing or unparseable value",
                    report.dropped_missing, report.total_rows
                ),
                None,
            )
        };
        let order = if report.reordered {
            CheckResult::fail("chronological_order", "Rows were not in date order", None)
        } else {
            CheckResult::pass("chronological_order", "Rows in date order")
        };
        let duplicates = if report.dropped_duplicates == 0 {
            CheckResult::pass("duplicate_dates", "No duplicate dates")
        } else {
            CheckResult::fail(
                "duplicate_dates",
                &format!("{} duplicate dates dropped", report.dropped_duplicates),
                None,
            )
        };

        self.report(
            obs,
            vec![
                missing,
                order,
                duplicates,
                self.check_prices(obs),
                self.check_gaps(obs),
                self.check_extreme_moves(obs),
            ],
        )
    }

    /// Run all checks on raw observations in their given order.
    pub fn validate(&self, observations: &[PriceObservation]) -> IntegrityReport {
        self.report(
            observations,
            vec![
                self.check_order(observations),
                self.check_duplicates(observations),
                self.check_prices(observations),
                self.check_gaps(observations),
                self.check_extreme_moves(observations),
            ],
        )
    }

    fn report(&self, obs: &[PriceObservation], checks: Vec<CheckResult>) -> IntegrityReport {
        IntegrityReport {
            observations: obs.len(),
            start_date: obs.iter().map(|o| o.date).min(),
            end_date: obs.iter().map(|o| o.date).max(),
            checks,
        }
    }

    fn check_order(&self, obs: &[PriceObservation]) -> CheckResult {
        let out_of_order: Vec<String> = obs
            .windows(2)
            .filter(|w| w[1].date < w[0].date)
            .map(|w| format!("{} after {}", w[1].date, w[0].date))
            .collect();

        if out_of_order.is_empty() {
            CheckResult::pass("chronological_order", "Observations in date order")
        } else {
            CheckResult::fail(
                "chronological_order",
                &format!("{} out-of-order observations", out_of_order.len()),
                Some(sample_details(&out_of_order)),
            )
        }
    }

    fn check_duplicates(&self, obs: &[PriceObservation]) -> CheckResult {
        let mut dates: Vec<NaiveDate> = obs.iter().map(|o| o.date).collect();
        dates.sort_unstable();
        let duplicates: Vec<String> = dates
            .windows(2)
            .filter(|w| w[0] == w[1])
            .map(|w| w[0].to_string())
            .collect();

        if duplicates.is_empty() {
            CheckResult::pass("duplicate_dates", "No duplicate dates")
        } else {
            CheckResult::fail(
                "duplicate_dates",
                &format!("{} duplicate dates", duplicates.len()),
                Some(sample_details(&duplicates)),
            )
        }
    }

    fn check_prices(&self, obs: &[PriceObservation]) -> CheckResult {
        let invalid: Vec<String> = obs
            .iter()
            .filter(|o| !o.price.is_finite() || o.price <= 0.0)
            .map(|o| format!("{}: {}", o.date, o.price))
            .collect();

        if invalid.is_empty() {
            CheckResult::pass("price_validity", "All prices positive")
        } else {
            CheckResult::fail(
                "price_validity",
                &format!("{} non-positive or non-finite prices", invalid.len()),
                Some(sample_details(&invalid)),
            )
        }
    }

    fn check_gaps(&self, obs: &[PriceObservation]) -> CheckResult {
        let gaps: Vec<String> = obs
            .windows(2)
            .filter_map(|w| {
                let days = (w[1].date - w[0].date).num_days();
                (days > self.config.max_gap_days)
                    .then(|| format!("{} to {} ({} days)", w[0].date, w[1].date, days))
            })
            .collect();

        if gaps.is_empty() {
            CheckResult::pass(
                "date_continuity",
                &format!("No gaps over {} days", self.config.max_gap_days),
            )
        } else {
            CheckResult::fail(
                "date_continuity",
                &format!("{} major gaps found", gaps.len()),
                Some(sample_details(&gaps)),
            )
        }
    }

    fn check_extreme_moves(&self, obs: &[PriceObservation]) -> CheckResult {
        let extreme: Vec<String> = obs
            .windows(2)
            .filter(|w| w[0].price > 0.0 && w[1].price > 0.0)
            .filter_map(|w| {
                let r = (w[1].price / w[0].price).ln();
                (r.abs() > self.config.max_abs_log_return)
                    .then(|| format!("{}: {:+.1}%", w[1].date, r * 100.0))
            })
            .collect();

        if extreme.is_empty() {
            CheckResult::pass(
                "extreme_moves",
                &format!(
                    "No daily log return beyond {:.0}%",
                    self.config.max_abs_log_return * 100.0
                ),
            )
        } else {
            CheckResult::fail(
                "extreme_moves",
                &format!("{} extreme daily moves", extreme.len()),
                Some(sample_details(&extreme)),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CleaningReport;
    use chrono::Duration;

    fn obs(day: i64, price: f64) -> PriceObservation {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        PriceObservation::new(start + Duration::days(day), price)
    }

    #[test]
    fn test_check_result() {
        let pass = CheckResult::pass("test", "passed");
        assert!(pass.passed);
        assert!(pass.details.is_none());

        let fail = CheckResult::fail("test", "failed", Some("details".to_string()));
        assert!(!fail.passed);
        assert_eq!(fail.details, Some("details".to_string()));
    }

    #[test]
    fn test_clean_series_passes() {
        let series: Vec<_> = (0..10).map(|i| obs(i, 60.0 + i as f64)).collect();
        let report = SeriesIntegrityValidator::default().validate(&series);
        assert!(report.all_passed());
        assert_eq!(report.checks.len(), 5);
        assert_eq!(report.summary(), "10 observations (2020-01-01 to 2020-01-10): 5/5 checks passed");
    }

    #[test]
    fn test_detects_each_problem() {
        let series = vec![
            obs(0, 60.0),
            obs(2, 61.0),
            obs(1, 62.0),
            obs(1, 62.5),
            obs(20, 0.0),
            obs(21, 20.0),
            obs(22, 45.0),
        ];
        let report = SeriesIntegrityValidator::default().validate(&series);
        let failed: Vec<&str> = report
            .failed_checks()
            .iter()
            .map(|c| c.name.as_str())
            .collect();

        assert_eq!(
            failed,
            vec![
                "chronological_order",
                "duplicate_dates",
                "price_validity",
                "date_continuity",
                "extreme_moves"
            ]
        );
    }

    #[test]
    fn test_thresholds_come_from_config() {
        // Friday to Monday gaps and one 20% move.
        let series = vec![obs(0, 60.0), obs(3, 61.0), obs(4, 73.0), obs(7, 72.0)];
        assert!(SeriesIntegrityValidator::default().validate(&series).all_passed());

        let strict = SeriesIntegrityValidator::new(
            DataLoader::new(),
            IntegrityConfig {
                max_gap_days: 2,
                max_abs_log_return: 0.1,
            },
        );
        let report = strict.validate(&series);
        let failed: Vec<&str> = report
            .failed_checks()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(failed, vec!["date_continuity", "extreme_moves"]);
    }

    #[test]
    fn test_validate_loaded_uses_cleaning_report() {
        let loaded = LoadedPrices {
            observations: (0..5).map(|i| obs(i, 60.0)).collect(),
            report: CleaningReport {
                total_rows: 8,
                dropped_missing: 2,
                dropped_duplicates: 1,
                reordered: false,
            },
        };
        let report = SeriesIntegrityValidator::default().validate_loaded(&loaded);
        let failed: Vec<&str> = report
            .failed_checks()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(failed, vec!["missing_values", "duplicate_dates"]);
    }
}
