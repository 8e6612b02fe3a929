//! Validated price series with derived log returns and rolling statistics.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::data::{PriceObservation, ReturnObservation};
use crate::error::{DataError, DataResult};

/// Trading days per year used to annualize daily volatility.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Preprocessor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Trailing window (observations) for moving average and realized volatility
    /// in the series summary. The regime classifier has its own window.
    pub rolling_window: usize,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self { rolling_window: 30 }
    }
}

/// Rolling statistics at one trading day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RollingPoint {
    pub date: NaiveDate,
    pub price: f64,
    /// Mean of the last `window` prices, once that many exist.
    pub moving_average: Option<f64>,
    /// Annualized std of the last `window` log returns, once that many exist.
    pub volatility: Option<f64>,
}

/// Annualized realized volatility of a slice of daily log returns.
///
/// Sample standard deviation (n-1) times sqrt(252). `None` with fewer than
/// two returns.
pub fn realized_volatility(log_returns: &[f64]) -> Option<f64> {
    if log_returns.len() < 2 {
        return None;
    }
    let std = log_returns.iter().copied().std_dev();
    std.is_finite().then(|| std * TRADING_DAYS_PER_YEAR.sqrt())
}

/// A chronological, validated daily price series.
///
/// Construction enforces at least two observations, strictly increasing
/// dates, and positive finite prices. Log returns are computed once.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    observations: Vec<PriceObservation>,
    returns: Vec<ReturnObservation>,
}

impl PriceSeries {
    pub fn new(observations: Vec<PriceObservation>) -> DataResult<Self> {
        if observations.len() < 2 {
            return Err(DataError::InsufficientData {
                required: 2,
                actual: observations.len(),
            });
        }

        for (index, obs) in observations.iter().enumerate() {
            if !obs.price.is_finite() || obs.price <= 0.0 {
                return Err(DataError::InvalidPrice {
                    index,
                    date: obs.date,
                    price: obs.price,
                });
            }
            if index > 0 {
                let previous = observations[index - 1].date;
                if obs.date <= previous {
                    return Err(DataError::NonMonotonicDate {
                        index,
                        previous,
                        date: obs.date,
                    });
                }
            }
        }

        let returns = observations
            .windows(2)
            .enumerate()
            .map(|(index, pair)| {
                let log_return = (pair[1].price / pair[0].price).ln();
                if log_return.is_finite() {
                    Ok(ReturnObservation {
                        date: pair[1].date,
                        log_return,
                    })
                } else {
                    Err(DataError::NonFiniteReturn { index })
                }
            })
            .collect::<DataResult<Vec<_>>>()?;

        Ok(Self {
            observations,
            returns,
        })
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn observations(&self) -> &[PriceObservation] {
        &self.observations
    }

    /// Log returns; `returns()[i]` is dated at `observations()[i + 1]`.
    pub fn returns(&self) -> &[ReturnObservation] {
        &self.returns
    }

    pub fn prices(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.price).collect()
    }

    pub fn log_returns(&self) -> Vec<f64> {
        self.returns.iter().map(|r| r.log_return).collect()
    }

    pub fn first_date(&self) -> NaiveDate {
        self.observations[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.observations[self.observations.len() - 1].date
    }

    /// Index of the trading day closest to `date`. Equidistant days resolve
    /// to the earlier one.
    pub fn nearest_index(&self, date: NaiveDate) -> usize {
        let upper = self.observations.partition_point(|o| o.date < date);
        if upper == 0 {
            return 0;
        }
        if upper == self.observations.len() {
            return upper - 1;
        }

        let before = (date - self.observations[upper - 1].date).num_days();
        let after = (self.observations[upper].date - date).num_days();
        if after < before {
            upper
        } else {
            upper - 1
        }
    }

    /// Observations dated within `[start, end]`, as a new validated series.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> DataResult<Self> {
        let subset = self
            .observations
            .iter()
            .filter(|o| o.date >= start && o.date <= end)
            .copied()
            .collect();
        Self::new(subset)
    }

    /// Trailing moving average and realized volatility at every trading day.
    pub fn rolling(&self, window: usize) -> DataResult<Vec<RollingPoint>> {
        if window < 2 {
            return Err(DataError::InvalidParameter(format!(
                "rolling window must be at least 2, got {}",
                window
            )));
        }

        let prices = self.prices();
        let log_returns = self.log_returns();

        let points = self
            .observations
            .iter()
            .enumerate()
            .map(|(i, obs)| {
                let moving_average =
                    (i + 1 >= window).then(|| prices[i + 1 - window..=i].iter().copied().mean());
                // Returns available at day i are log_returns[..i].
                let volatility = if i >= window {
                    realized_volatility(&log_returns[i - window..i])
                } else {
                    None
                };
                RollingPoint {
                    date: obs.date,
                    price: obs.price,
                    moving_average,
                    volatility,
                }
            })
            .collect();

        Ok(points)
    }

    /// The defined values of the rolling volatility series.
    pub fn rolling_volatility(&self, window: usize) -> DataResult<Vec<(NaiveDate, f64)>> {
        Ok(self
            .rolling(window)?
            .into_iter()
            .filter_map(|p| p.volatility.map(|v| (p.date, v)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn series(prices: &[f64]) -> PriceSeries {
        let start = date(2020, 1, 1);
        let obs = prices
            .iter()
            .enumerate()
            .map(|(i, p)| PriceObservation::new(start + Duration::days(i as i64), *p))
            .collect();
        PriceSeries::new(obs).unwrap()
    }

    #[test]
    fn test_returns_match_log_ratios() {
        let prices = [50.0, 51.5, 49.0, 70.2, 69.9];
        let s = series(&prices);

        assert_eq!(s.returns().len(), prices.len() - 1);
        for i in 0..prices.len() - 1 {
            assert_eq!(s.returns()[i].log_return, (prices[i + 1] / prices[i]).ln());
            assert_eq!(s.returns()[i].date, s.observations()[i + 1].date);
        }
    }

    #[test]
    fn test_rejects_too_few_observations() {
        let result = PriceSeries::new(vec![PriceObservation::new(date(2020, 1, 1), 50.0)]);
        assert_eq!(
            result.unwrap_err(),
            DataError::InsufficientData {
                required: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_rejects_non_monotonic_dates() {
        let obs = vec![
            PriceObservation::new(date(2020, 1, 2), 50.0),
            PriceObservation::new(date(2020, 1, 3), 51.0),
            PriceObservation::new(date(2020, 1, 3), 52.0),
        ];
        assert_eq!(
            PriceSeries::new(obs).unwrap_err(),
            DataError::NonMonotonicDate {
                index: 2,
                previous: date(2020, 1, 3),
                date: date(2020, 1, 3)
            }
        );
    }

    #[test]
    fn test_rejects_non_positive_price() {
        let obs = vec![
            PriceObservation::new(date(2020, 4, 17), 28.0),
            PriceObservation::new(date(2020, 4, 20), -37.6),
        ];
        assert!(matches!(
            PriceSeries::new(obs),
            Err(DataError::InvalidPrice { index: 1, .. })
        ));
    }

    #[test]
    fn test_rolling_availability() {
        let prices: Vec<f64> = (0..10).map(|i| 50.0 + i as f64).collect();
        let s = series(&prices);
        let rolling = s.rolling(3).unwrap();

        assert_eq!(rolling.len(), 10);
        assert!(rolling[1].moving_average.is_none());
        assert!((rolling[2].moving_average.unwrap() - 51.0).abs() < 1e-12);
        assert!(rolling[2].volatility.is_none());
        assert!(rolling[3].volatility.is_some());
    }

    #[test]
    fn test_constant_series_has_zero_volatility() {
        let s = series(&[60.0; 40]);
        let vol = s.rolling_volatility(30).unwrap();
        assert_eq!(vol.len(), 10);
        assert!(vol.iter().all(|(_, v)| *v == 0.0));
    }

    #[test]
    fn test_realized_volatility() {
        assert_eq!(realized_volatility(&[0.01]), None);
        let vol = realized_volatility(&[0.01, -0.01]).unwrap();
        let expected = (2.0_f64 * 0.0001).sqrt() * 252.0_f64.sqrt();
        assert!((vol - expected).abs() < 1e-12);
    }

    #[test]
    fn test_nearest_index_tie_goes_earlier() {
        let obs = vec![
            PriceObservation::new(date(2020, 1, 3), 60.0),
            PriceObservation::new(date(2020, 1, 6), 61.0),
            PriceObservation::new(date(2020, 1, 7), 62.0),
        ];
        let s = PriceSeries::new(obs).unwrap();

        // Saturday: one day after Friday, two before Monday.
        assert_eq!(s.nearest_index(date(2020, 1, 4)), 0);
        // Sunday: closer to Monday.
        assert_eq!(s.nearest_index(date(2020, 1, 5)), 1);
        assert_eq!(s.nearest_index(date(2019, 12, 1)), 0);
        assert_eq!(s.nearest_index(date(2020, 2, 1)), 2);

        let obs = vec![
            PriceObservation::new(date(2020, 1, 1), 60.0),
            PriceObservation::new(date(2020, 1, 3), 61.0),
        ];
        let s = PriceSeries::new(obs).unwrap();
        assert_eq!(s.nearest_index(date(2020, 1, 2)), 0);
    }

    #[test]
    fn test_between() {
        let s = series(&[50.0, 51.0, 52.0, 53.0, 54.0]);
        let sub = s.between(date(2020, 1, 2), date(2020, 1, 4)).unwrap();
        assert_eq!(sub.len(), 3);
        assert_eq!(sub.first_date(), date(2020, 1, 2));
        assert!(s.between(date(2021, 1, 1), date(2021, 2, 1)).is_err());
    }
}
