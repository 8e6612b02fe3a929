//! Read-only event catalog with simple queries.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::{Event, EventType};

/// Query over the catalog. Unset fields match everything; dates are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventFilter {
    pub event_type: Option<EventType>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        self.event_type.map_or(true, |t| event.event_type == t)
            && self.start.map_or(true, |s| event.date >= s)
            && self.end.map_or(true, |e| event.date <= e)
    }
}

/// Number of events of one type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeCount {
    pub event_type: EventType,
    pub count: usize,
    /// Share of the whole catalog, in percent.
    pub percent: f64,
}

#[derive(Debug, Clone, Default)]
pub struct EventCatalog {
    events: Vec<Event>,
}

impl EventCatalog {
    /// Events keep their input order; correlation refs index into it.
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn filter(&self, filter: &EventFilter) -> Vec<&Event> {
        self.events.iter().filter(|e| filter.matches(e)).collect()
    }

    /// Counts per event type, most frequent first.
    pub fn type_counts(&self) -> Vec<TypeCount> {
        let mut counts: BTreeMap<EventType, usize> = BTreeMap::new();
        for event in &self.events {
            *counts.entry(event.event_type).or_insert(0) += 1;
        }

        let total = self.events.len() as f64;
        let mut result: Vec<TypeCount> = counts
            .into_iter()
            .map(|(event_type, count)| TypeCount {
                event_type,
                count,
                percent: count as f64 / total * 100.0,
            })
            .collect();
        result.sort_by(|a, b| b.count.cmp(&a.count).then(a.event_type.cmp(&b.event_type)));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> EventCatalog {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        EventCatalog::new(vec![
            Event::new(d(1990, 8, 2), "Iraq invades Kuwait", EventType::GeopoliticalConflict, "Middle East"),
            Event::new(d(2008, 9, 15), "Lehman collapse", EventType::EconomicShock, "Global"),
            Event::new(d(2014, 11, 27), "OPEC holds output", EventType::OpecPolicy, "OPEC"),
            Event::new(d(2020, 3, 6), "OPEC+ talks collapse", EventType::OpecPolicy, "OPEC"),
            Event::new(d(2022, 2, 24), "Russia invades Ukraine", EventType::GeopoliticalConflict, "Europe"),
            Event::new(d(2020, 3, 11), "COVID-19 declared pandemic", EventType::Pandemic, "Global"),
        ])
    }

    #[test]
    fn test_filter_by_type_and_range() {
        let c = catalog();
        let opec = c.filter(&EventFilter {
            event_type: Some(EventType::OpecPolicy),
            ..Default::default()
        });
        assert_eq!(opec.len(), 2);

        let in_2020 = c.filter(&EventFilter {
            event_type: None,
            start: NaiveDate::from_ymd_opt(2020, 1, 1),
            end: NaiveDate::from_ymd_opt(2020, 12, 31),
        });
        assert_eq!(in_2020.len(), 2);
        assert_eq!(c.filter(&EventFilter::default()).len(), 6);
    }

    #[test]
    fn test_type_counts() {
        let counts = catalog().type_counts();
        assert_eq!(counts[0].event_type, EventType::GeopoliticalConflict);
        assert_eq!(counts[0].count, 2);
        assert_eq!(counts[1].event_type, EventType::OpecPolicy);
        let total: f64 = counts.iter().map(|c| c.percent).sum();
        assert!((total - 100.0).abs() < 1e-9);
    }
}
