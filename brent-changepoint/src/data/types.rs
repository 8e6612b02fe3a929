//! Core input types for the change-point engine.
//!
//! Prices and events are loaded once per run and never mutated by the
//! engine. Everything downstream is derived from them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single daily closing price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    /// Trading day.
    pub date: NaiveDate,
    /// Price in USD per barrel.
    pub price: f64,
}

impl PriceObservation {
    pub fn new(date: NaiveDate, price: f64) -> Self {
        Self { date, price }
    }
}

/// Log return between two consecutive trading days, dated at the later day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnObservation {
    pub date: NaiveDate,
    pub log_return: f64,
}

/// Event category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Wars, invasions, attacks on infrastructure.
    GeopoliticalConflict,
    /// OPEC / OPEC+ production decisions.
    OpecPolicy,
    /// Recessions, financial crises, demand collapses.
    EconomicShock,
    /// Sanctions and embargoes.
    Sanctions,
    /// Pandemics and public health crises.
    Pandemic,
    /// Hurricanes and other natural disasters.
    NaturalDisaster,
    /// Outages and other supply-side disruptions.
    SupplyDisruption,
    /// Anything that does not fit the categories above.
    Other,
}

impl EventType {
    /// Map a free-text category label onto an event type.
    ///
    /// Matching is keyword based and case-insensitive. OPEC is checked first
    /// because OPEC decisions are often labelled as "policy" or "production".
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        let has = |keys: &[&str]| keys.iter().any(|k| label.contains(k));

        if has(&["opec"]) {
            Self::OpecPolicy
        } else if has(&["sanction", "embargo"]) {
            Self::Sanctions
        } else if has(&["pandemic", "covid", "health", "epidemic"]) {
            Self::Pandemic
        } else if has(&[
            "war", "conflict", "invasion", "geopolit", "military", "attack", "terror",
        ]) {
            Self::GeopoliticalConflict
        } else if has(&["econom", "financial", "recession", "crisis", "crash", "demand"]) {
            Self::EconomicShock
        } else if has(&["hurricane", "disaster", "weather", "storm", "earthquake"]) {
            Self::NaturalDisaster
        } else if has(&["supply", "production", "outage", "disruption"]) {
            Self::SupplyDisruption
        } else {
            Self::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GeopoliticalConflict => "geopolitical_conflict",
            Self::OpecPolicy => "opec_policy",
            Self::EconomicShock => "economic_shock",
            Self::Sanctions => "sanctions",
            Self::Pandemic => "pandemic",
            Self::NaturalDisaster => "natural_disaster",
            Self::SupplyDisruption => "supply_disruption",
            Self::Other => "other",
        }
    }
}

/// A dated external event from the event catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Date the event occurred (calendar day, not necessarily a trading day).
    pub date: NaiveDate,

    /// Short event name (e.g., "Iraq invades Kuwait").
    pub name: String,

    /// Event category.
    pub event_type: EventType,

    /// Region or organization involved.
    pub region: String,

    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,

    /// Expected impact as recorded in the catalog (e.g., "price spike").
    #[serde(default)]
    pub expected_impact: Option<String>,
}

impl Event {
    pub fn new(date: NaiveDate, name: &str, event_type: EventType, region: &str) -> Self {
        Self {
            date,
            name: name.to_string(),
            event_type,
            region: region.to_string(),
            description: None,
            expected_impact: None,
        }
    }
}
