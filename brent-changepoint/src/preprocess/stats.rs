//! Descriptive statistics over a price series.
//!
//! - Price and return moments, percentiles and a Jarque-Bera normality test
//! - Linear price trend
//! - Moving-average summaries over 30, 90 and 365 trading days
//! - Ljung-Box test for volatility clustering on squared returns

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};
use statrs::statistics::{Data, OrderStatistics, Statistics};

use super::series::PriceSeries;
use crate::error::DataResult;

/// Moving-average windows summarized in [`SeriesSummary`].
pub const MOVING_AVERAGE_WINDOWS: [usize; 3] = [30, 90, 365];
/// Lags used by the volatility clustering test.
pub const LJUNG_BOX_LAGS: usize = 10;

/// Percentiles of a sample (median-unbiased estimator).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p1: f64,
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub p99: f64,
}

impl Percentiles {
    pub fn from_values(values: &[f64]) -> Self {
        let mut data = Data::new(values.to_vec());
        Self {
            p1: data.percentile(1),
            p5: data.percentile(5),
            p25: data.percentile(25),
            p50: data.percentile(50),
            p75: data.percentile(75),
            p95: data.percentile(95),
            p99: data.percentile(99),
        }
    }
}

/// Price level statistics (USD).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceStats {
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub percentiles: Percentiles,
    /// Jarque-Bera p-value. `None` with fewer than 4 prices or no variation.
    pub jarque_bera_p: Option<f64>,
}

/// Daily log return statistics, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnStats {
    pub mean_pct: f64,
    pub std_pct: f64,
    /// Adjusted Fisher-Pearson skewness. `None` with fewer than 3 returns.
    pub skewness: Option<f64>,
    /// Adjusted excess kurtosis. `None` with fewer than 4 returns.
    pub kurtosis: Option<f64>,
    pub percentiles: Percentiles,
    pub jarque_bera_p: Option<f64>,
}

/// Least-squares line through price against trading-day index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendStats {
    /// USD per trading day.
    pub slope: f64,
    pub intercept: f64,
    /// 0 when prices never move.
    pub r_squared: f64,
}

/// Summary of one moving-average series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovingAverageStats {
    pub window: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

/// Ljung-Box portmanteau test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LjungBox {
    pub lags: usize,
    pub statistic: f64,
    pub p_value: f64,
}

impl LjungBox {
    /// Autocorrelation is significant at the 5% level.
    pub fn is_significant(&self) -> bool {
        self.p_value < 0.05
    }
}

/// Summary of a price series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub observations: usize,
    pub price: PriceStats,
    pub returns: ReturnStats,
    pub trend: TrendStats,
    /// Only windows the series is long enough for.
    pub moving_averages: Vec<MovingAverageStats>,
    /// Ljung-Box on squared returns. `None` when too short or constant.
    pub volatility_clustering: Option<LjungBox>,
    /// Mean of the rolling volatility series.
    pub volatility_mean: Option<f64>,
    /// Last rolling volatility value.
    pub volatility_current: Option<f64>,
    pub latest_price: f64,
    /// Cumulative log return over the last trading day, in percent.
    pub change_1d_pct: Option<f64>,
    /// Cumulative log return over the last 5 trading days, in percent.
    pub change_5d_pct: Option<f64>,
    /// Cumulative log return over the last 21 trading days, in percent.
    pub change_21d_pct: Option<f64>,
}

impl SeriesSummary {
    pub fn from_series(series: &PriceSeries, window: usize) -> DataResult<Self> {
        let prices = series.prices();
        let log_returns = series.log_returns();
        let returns_pct: Vec<f64> = log_returns.iter().map(|r| r * 100.0).collect();
        let volatility: Vec<f64> = series
            .rolling_volatility(window)?
            .into_iter()
            .map(|(_, v)| v)
            .collect();

        let price = PriceStats {
            mean: prices.iter().mean(),
            median: Data::new(prices.clone()).median(),
            std: prices.iter().std_dev(),
            min: Statistics::min(prices.iter()),
            max: Statistics::max(prices.iter()),
            percentiles: Percentiles::from_values(&prices),
            jarque_bera_p: jarque_bera_p_value(&prices),
        };

        let returns = ReturnStats {
            mean_pct: returns_pct.iter().mean(),
            std_pct: if returns_pct.len() > 1 {
                returns_pct.iter().std_dev()
            } else {
                0.0
            },
            skewness: skewness(&returns_pct),
            kurtosis: excess_kurtosis(&returns_pct),
            percentiles: Percentiles::from_values(&returns_pct),
            jarque_bera_p: jarque_bera_p_value(&returns_pct),
        };

        let mut moving_averages = Vec::new();
        for ma_window in MOVING_AVERAGE_WINDOWS {
            if ma_window > series.len() {
                continue;
            }
            let values: Vec<f64> = series
                .rolling(ma_window)?
                .into_iter()
                .filter_map(|p| p.moving_average)
                .collect();
            moving_averages.push(MovingAverageStats {
                window: ma_window,
                mean: values.iter().mean(),
                std: if values.len() > 1 { values.iter().std_dev() } else { 0.0 },
                min: Statistics::min(values.iter()),
                max: Statistics::max(values.iter()),
            });
        }

        let squared: Vec<f64> = log_returns.iter().map(|r| r * r).collect();

        let trailing = |k: usize| {
            (log_returns.len() >= k)
                .then(|| log_returns[log_returns.len() - k..].iter().sum::<f64>() * 100.0)
        };

        Ok(Self {
            start_date: series.first_date(),
            end_date: series.last_date(),
            observations: series.len(),
            price,
            returns,
            trend: linear_trend(&prices),
            moving_averages,
            volatility_clustering: ljung_box(&squared, LJUNG_BOX_LAGS),
            volatility_mean: (!volatility.is_empty()).then(|| volatility.iter().mean()),
            volatility_current: volatility.last().copied(),
            latest_price: prices[prices.len() - 1],
            change_1d_pct: trailing(1),
            change_5d_pct: trailing(5),
            change_21d_pct: trailing(21),
        })
    }
}

/// Mean rolling volatility per calendar year.
pub fn yearly_volatility(series: &PriceSeries, window: usize) -> DataResult<BTreeMap<i32, f64>> {
    let mut by_year: BTreeMap<i32, Vec<f64>> = BTreeMap::new();
    for (date, vol) in series.rolling_volatility(window)? {
        by_year.entry(date.year()).or_default().push(vol);
    }

    Ok(by_year
        .into_iter()
        .map(|(year, values)| (year, values.iter().mean()))
        .collect())
}

fn linear_trend(prices: &[f64]) -> TrendStats {
    let n = prices.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = prices.iter().mean();

    let (sxx, sxy, syy) = prices.iter().enumerate().fold(
        (0.0, 0.0, 0.0),
        |(sxx, sxy, syy), (i, y)| {
            let dx = i as f64 - x_mean;
            let dy = y - y_mean;
            (sxx + dx * dx, sxy + dx * dy, syy + dy * dy)
        },
    );

    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    TrendStats {
        slope,
        intercept: y_mean - slope * x_mean,
        r_squared: if sxx > 0.0 && syy > 0.0 {
            sxy * sxy / (sxx * syy)
        } else {
            0.0
        },
    }
}

fn central_moments(values: &[f64]) -> (f64, f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().mean();
    let (m2, m3, m4) = values.iter().fold((0.0, 0.0, 0.0), |(m2, m3, m4), v| {
        let d = v - mean;
        (m2 + d * d, m3 + d * d * d, m4 + d * d * d * d)
    });
    (m2 / n, m3 / n, m4 / n)
}

fn skewness(values: &[f64]) -> Option<f64> {
    let n = values.len() as f64;
    if values.len() < 3 {
        return None;
    }
    let (m2, m3, _) = central_moments(values);
    if m2 == 0.0 {
        return Some(0.0);
    }
    let g1 = m3 / m2.powf(1.5);
    Some((n * (n - 1.0)).sqrt() / (n - 2.0) * g1)
}

fn excess_kurtosis(values: &[f64]) -> Option<f64> {
    let n = values.len() as f64;
    if values.len() < 4 {
        return None;
    }
    let (m2, _, m4) = central_moments(values);
    if m2 == 0.0 {
        return Some(0.0);
    }
    let g2 = m4 / (m2 * m2) - 3.0;
    Some(((n + 1.0) * g2 + 6.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0)))
}

/// Upper tail probability of a chi-squared statistic.
fn chi_squared_sf(statistic: f64, df: f64) -> Option<f64> {
    ChiSquared::new(df).ok().map(|chi2| 1.0 - chi2.cdf(statistic))
}

/// Jarque-Bera p-value from the population skewness and excess kurtosis.
fn jarque_bera_p_value(values: &[f64]) -> Option<f64> {
    if values.len() < 4 {
        return None;
    }
    let (m2, m3, m4) = central_moments(values);
    if m2 <= 0.0 {
        return None;
    }
    let n = values.len() as f64;
    let s = m3 / m2.powf(1.5);
    let k = m4 / (m2 * m2) - 3.0;
    let jb = n / 6.0 * (s * s + k * k / 4.0);
    chi_squared_sf(jb, 2.0)
}

/// Ljung-Box Q over the first `lags` autocorrelations.
fn ljung_box(values: &[f64], lags: usize) -> Option<LjungBox> {
    let n = values.len();
    if lags == 0 || n <= lags + 1 {
        return None;
    }
    let mean = values.iter().mean();
    let centered: Vec<f64> = values.iter().map(|v| v - mean).collect();
    let c0: f64 = centered.iter().map(|v| v * v).sum();
    if c0 <= 0.0 {
        return None;
    }

    let nf = n as f64;
    let q = (1..=lags)
        .map(|k| {
            let ck: f64 = centered[k..].iter().zip(&centered[..n - k]).map(|(a, b)| a * b).sum();
            let rho = ck / c0;
            rho * rho / (nf - k as f64)
        })
        .sum::<f64>()
        * nf
        * (nf + 2.0);

    Some(LjungBox {
        lags,
        statistic: q,
        p_value: chi_squared_sf(q, lags as f64)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PriceObservation;
    use chrono::Duration;

    fn series_from(start: NaiveDate, prices: &[f64]) -> PriceSeries {
        let obs = prices
            .iter()
            .enumerate()
            .map(|(i, p)| PriceObservation::new(start + Duration::days(i as i64), *p))
            .collect();
        PriceSeries::new(obs).unwrap()
    }

    #[test]
    fn test_summary_basic_stats() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let s = series_from(start, &[10.0, 20.0, 30.0, 40.0]);
        let summary = SeriesSummary::from_series(&s, 2).unwrap();

        assert_eq!(summary.observations, 4);
        assert_eq!(summary.price.mean, 25.0);
        assert_eq!(summary.price.median, 25.0);
        assert_eq!(summary.price.min, 10.0);
        assert_eq!(summary.price.max, 40.0);
        assert_eq!(summary.latest_price, 40.0);
        let expected_1d = (40.0_f64 / 30.0).ln() * 100.0;
        assert!((summary.change_1d_pct.unwrap() - expected_1d).abs() < 1e-9);
        assert!(summary.change_5d_pct.is_none());
    }

    #[test]
    fn test_symmetric_returns_have_zero_skew() {
        let values = [-2.0, -1.0, 0.0, 1.0, 2.0];
        assert!(skewness(&values).unwrap().abs() < 1e-12);
        assert!(excess_kurtosis(&values).is_some());
        assert!(skewness(&[1.0, 2.0]).is_none());
    }

    #[test]
    fn test_percentiles() {
        let values: Vec<f64> = (1..=101).map(f64::from).collect();
        let p = Percentiles::from_values(&values);
        assert!((p.p50 - 51.0).abs() < 1e-9);
        assert!(p.p1 < p.p5 && p.p5 < p.p25 && p.p25 < p.p50);
        assert!(p.p50 < p.p75 && p.p75 < p.p95 && p.p95 < p.p99);
        assert!(p.p1 >= 1.0 && p.p99 <= 101.0);
    }

    #[test]
    fn test_linear_trend() {
        let t = linear_trend(&[10.0, 20.0, 30.0, 40.0]);
        assert!((t.slope - 10.0).abs() < 1e-12);
        assert!((t.intercept - 10.0).abs() < 1e-12);
        assert!((t.r_squared - 1.0).abs() < 1e-12);

        let flat = linear_trend(&[5.0; 10]);
        assert_eq!(flat.slope, 0.0);
        assert_eq!(flat.intercept, 5.0);
        assert_eq!(flat.r_squared, 0.0);
    }

    #[test]
    fn test_jarque_bera() {
        // Population skew 0, excess kurtosis -1: JB = 4/6 * 1/4.
        let p = jarque_bera_p_value(&[-1.0, 0.0, 0.0, 1.0]).unwrap();
        assert!((p - (-1.0_f64 / 12.0).exp()).abs() < 1e-6);

        let mut heavy = vec![0.1, -0.1].repeat(100);
        heavy.extend([10.0, -10.0]);
        assert!(jarque_bera_p_value(&heavy).unwrap() < 0.001);

        assert!(jarque_bera_p_value(&[1.0, 1.0, 1.0, 1.0]).is_none());
        assert!(jarque_bera_p_value(&[1.0, 2.0]).is_none());
    }

    #[test]
    fn test_ljung_box_detects_volatility_clustering() {
        // Calm then turbulent returns: squared returns are persistent.
        let returns: Vec<f64> = (0..200)
            .map(|i| {
                let amplitude = if i < 100 { 0.001 } else { 0.05 };
                if i % 2 == 0 { amplitude } else { -amplitude }
            })
            .collect();
        let squared: Vec<f64> = returns.iter().map(|r| r * r).collect();
        let lb = ljung_box(&squared, LJUNG_BOX_LAGS).unwrap();
        assert_eq!(lb.lags, 10);
        assert!(lb.statistic > 0.0);
        assert!(lb.is_significant(), "p = {}", lb.p_value);

        assert!(ljung_box(&[0.01; 50], LJUNG_BOX_LAGS).is_none());
        assert!(ljung_box(&[0.01, 0.02, 0.03], LJUNG_BOX_LAGS).is_none());
    }

    #[test]
    fn test_moving_averages_follow_series_length() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let short: Vec<f64> = (0..80).map(|i| 60.0 + (i % 5) as f64).collect();
        let summary = SeriesSummary::from_series(&series_from(start, &short), 30).unwrap();
        let windows: Vec<usize> = summary.moving_averages.iter().map(|m| m.window).collect();
        assert_eq!(windows, vec![30]);

        let long: Vec<f64> = (0..400).map(|i| 60.0 + (i % 5) as f64).collect();
        let summary = SeriesSummary::from_series(&series_from(start, &long), 30).unwrap();
        let windows: Vec<usize> = summary.moving_averages.iter().map(|m| m.window).collect();
        assert_eq!(windows, vec![30, 90, 365]);
        let ma = &summary.moving_averages[0];
        assert!(ma.min <= ma.mean && ma.mean <= ma.max);
        assert!((ma.mean - 62.0).abs() < 0.1);
    }

    #[test]
    fn test_flat_series_summary() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let summary = SeriesSummary::from_series(&series_from(start, &[60.0; 60]), 30).unwrap();
        assert_eq!(summary.price.std, 0.0);
        assert!(summary.price.jarque_bera_p.is_none());
        assert!(summary.volatility_clustering.is_none());
        assert_eq!(summary.trend.r_squared, 0.0);
        assert_eq!(summary.volatility_current, Some(0.0));
    }

    #[test]
    fn test_yearly_volatility_groups_by_year() {
        let start = NaiveDate::from_ymd_opt(2019, 12, 1).unwrap();
        let prices: Vec<f64> = (0..70).map(|i| 60.0 + (i % 3) as f64).collect();
        let s = series_from(start, &prices);

        let yearly = yearly_volatility(&s, 5).unwrap();
        assert_eq!(yearly.keys().copied().collect::<Vec<_>>(), vec![2019, 2020]);
        assert!(yearly.values().all(|v| *v > 0.0));
    }
}
