//! Event to change point correlation.
//!
//! Each event is matched to the nearest change point within a tolerance
//! window of calendar days. Equidistant change points resolve to the earlier
//! one. Several events may share a change point, so the result also carries
//! a reverse index from change point to events.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::changepoint::ChangePoint;
use crate::data::Event;
use crate::error::{DataError, DataResult};

/// Correlator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelatorConfig {
    /// Maximum |change point date - event date|, inclusive.
    pub tolerance_days: i64,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self { tolerance_days: 30 }
    }
}

/// Match result for one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correlation {
    /// Position of the event in the input slice.
    pub event_ref: usize,
    /// Position of the matched change point in the input slice.
    pub change_point_ref: Option<usize>,
    /// `change point date - event date`; negative when the change point came first.
    pub offset_days: Option<i64>,
    pub matched: bool,
}

/// All correlations plus the change point to events reverse index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationIndex {
    /// One entry per event, in event order.
    pub correlations: Vec<Correlation>,
    /// Change point ref -> refs of the events matched to it.
    pub by_change_point: BTreeMap<usize, BTreeSet<usize>>,
}

impl CorrelationIndex {
    pub fn matched_count(&self) -> usize {
        self.correlations.iter().filter(|c| c.matched).count()
    }

    /// Events matched to the given change point.
    pub fn events_for(&self, change_point_ref: usize) -> Option<&BTreeSet<usize>> {
        self.by_change_point.get(&change_point_ref)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventCorrelator {
    config: CorrelatorConfig,
}

impl EventCorrelator {
    pub fn new(config: CorrelatorConfig) -> Self {
        Self { config }
    }

    pub fn correlate(
        &self,
        events: &[Event],
        change_points: &[ChangePoint],
    ) -> DataResult<CorrelationIndex> {
        if self.config.tolerance_days < 0 {
            return Err(DataError::InvalidParameter(format!(
                "tolerance_days must be non-negative, got {}",
                self.config.tolerance_days
            )));
        }

        let mut index = CorrelationIndex::default();

        for (event_ref, event) in events.iter().enumerate() {
            let nearest = change_points
                .iter()
                .enumerate()
                .map(|(cp_ref, cp)| (cp_ref, (cp.date - event.date).num_days(), cp.date))
                .filter(|(_, offset, _)| offset.abs() <= self.config.tolerance_days)
                .min_by_key(|&(_, offset, date)| (offset.abs(), date));

            let correlation = match nearest {
                Some((cp_ref, offset, _)) => {
                    index
                        .by_change_point
                        .entry(cp_ref)
                        .or_default()
                        .insert(event_ref);
                    Correlation {
                        event_ref,
                        change_point_ref: Some(cp_ref),
                        offset_days: Some(offset),
                        matched: true,
                    }
                }
                None => Correlation {
                    event_ref,
                    change_point_ref: None,
                    offset_days: None,
                    matched: false,
                },
            };
            index.correlations.push(correlation);
        }

        Ok(index)
    }
}
