//! Before/after impact of events and change points.
//!
//! The anchor date is snapped to the nearest trading day. Windows of up to
//! `window` trading days on each side exclude that day. Windows clipped by
//! the series ends are flagged but still reported.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::warn;

use crate::changepoint::ChangePoint;
use crate::data::{Event, EventType};
use crate::error::{DataError, DataResult};
use crate::preprocess::{realized_volatility, PriceSeries};

/// Impact window configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactConfig {
    /// Trading days on each side of the anchor.
    pub window: usize,
}

impl Default for ImpactConfig {
    fn default() -> Self {
        Self { window: 30 }
    }
}

/// What an impact record is measured around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anchor {
    Event { event_ref: usize },
    ChangePoint { change_point_ref: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactRecord {
    pub anchor: Anchor,
    /// Date of the event or change point.
    pub anchor_date: NaiveDate,
    /// Trading day the anchor resolved to.
    pub trading_date: NaiveDate,
    /// Mean price over the before window.
    pub price_before: f64,
    /// Mean price over the after window.
    pub price_after: f64,
    /// `price_after - price_before`, in USD.
    pub price_change: f64,
    /// `(price_after / price_before - 1) * 100`.
    pub percent_change: f64,
    /// Highest price in the after window.
    pub max_price: f64,
    /// Lowest price in the after window.
    pub min_price: f64,
    /// Annualized volatility over the before window.
    pub volatility_before: Option<f64>,
    pub volatility_after: Option<f64>,
    /// `volatility_after - volatility_before`.
    pub volatility_change: Option<f64>,
    /// Requested trading days per side.
    pub window_length_days: usize,
    pub before_observations: usize,
    pub after_observations: usize,
    /// A window was clipped by the start or end of the series.
    pub partial_window: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ImpactQuantifier {
    config: ImpactConfig,
}

impl ImpactQuantifier {
    pub fn new(config: ImpactConfig) -> Self {
        Self { config }
    }

    /// Impact around one anchor date.
    pub fn measure(
        &self,
        series: &PriceSeries,
        anchor: Anchor,
        anchor_date: NaiveDate,
    ) -> DataResult<ImpactRecord> {
        let w = self.config.window;
        if w == 0 {
            return Err(DataError::InvalidParameter(
                "impact window must be at least 1".to_string(),
            ));
        }

        let prices = series.prices();
        let log_returns = series.log_returns();
        let a = series.nearest_index(anchor_date);

        let before = a.saturating_sub(w)..a;
        let after = (a + 1)..(a + 1 + w).min(prices.len());

        let window_mean = |range: &std::ops::Range<usize>| {
            if range.is_empty() {
                prices[a]
            } else {
                prices[range.clone()].iter().copied().mean()
            }
        };
        // Returns fully inside prices[s..e] are log_returns[s..e - 1].
        let window_vol = |range: &std::ops::Range<usize>| {
            if range.len() < 2 {
                None
            } else {
                realized_volatility(&log_returns[range.start..range.end - 1])
            }
        };

        let after_prices = if after.is_empty() {
            &prices[a..=a]
        } else {
            &prices[after.clone()]
        };

        let price_before = window_mean(&before);
        let price_after = window_mean(&after);
        let volatility_before = window_vol(&before);
        let volatility_after = window_vol(&after);

        Ok(ImpactRecord {
            anchor,
            anchor_date,
            trading_date: series.observations()[a].date,
            price_before,
            price_after,
            price_change: price_after - price_before,
            percent_change: (price_after / price_before - 1.0) * 100.0,
            max_price: Statistics::max(after_prices.iter()),
            min_price: Statistics::min(after_prices.iter()),
            volatility_before,
            volatility_after,
            volatility_change: volatility_before
                .zip(volatility_after)
                .map(|(b, a)| a - b),
            window_length_days: w,
            before_observations: before.len(),
            after_observations: after.len(),
            partial_window: before.len() < w || after.len() < w,
        })
    }

    pub fn for_events(&self, series: &PriceSeries, events: &[Event]) -> DataResult<Vec<ImpactRecord>> {
        let records = events
            .iter()
            .enumerate()
            .map(|(event_ref, e)| self.measure(series, Anchor::Event { event_ref }, e.date))
            .collect::<DataResult<Vec<_>>>()?;
        warn_partial("event", &records);
        Ok(records)
    }

    pub fn for_change_points(
        &self,
        series: &PriceSeries,
        change_points: &[ChangePoint],
    ) -> DataResult<Vec<ImpactRecord>> {
        let records = change_points
            .iter()
            .enumerate()
            .map(|(change_point_ref, cp)| {
                self.measure(series, Anchor::ChangePoint { change_point_ref }, cp.date)
            })
            .collect::<DataResult<Vec<_>>>()?;
        warn_partial("change point", &records);
        Ok(records)
    }
}

fn warn_partial(kind: &str, records: &[ImpactRecord]) {
    let partial = records.iter().filter(|r| r.partial_window).count();
    if partial > 0 {
        warn!(
            "{} of {} {} impact windows clipped at the series boundary",
            partial,
            records.len(),
            kind
        );
    }
}

/// Mean volatility around events of one type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTypeVolatility {
    pub event_type: EventType,
    /// Events with both volatility values.
    pub events: usize,
    pub volatility_before: f64,
    pub volatility_after: f64,
    pub change: f64,
    /// Change relative to the before value, in percent.
    pub change_pct: f64,
}

/// Aggregate event impact records by event type.
pub fn event_type_volatility(events: &[Event], impacts: &[ImpactRecord]) -> Vec<EventTypeVolatility> {
    let mut groups: BTreeMap<EventType, (f64, f64, usize)> = BTreeMap::new();

    for record in impacts {
        let Anchor::Event { event_ref } = record.anchor else {
            continue;
        };
        let (Some(event), Some(before), Some(after)) = (
            events.get(event_ref),
            record.volatility_before,
            record.volatility_after,
        ) else {
            continue;
        };
        let entry = groups.entry(event.event_type).or_insert((0.0, 0.0, 0));
        entry.0 += before;
        entry.1 += after;
        entry.2 += 1;
    }

    groups
        .into_iter()
        .map(|(event_type, (before_sum, after_sum, count))| {
            let before = before_sum / count as f64;
            let after = after_sum / count as f64;
            let change = after - before;
            EventTypeVolatility {
                event_type,
                events: count,
                volatility_before: before,
                volatility_after: after,
                change,
                change_pct: if before > 0.0 { change / before * 100.0 } else { 0.0 },
            }
        })
        .collect()
}
