//! Price and volatility impact around events and change points.

pub mod quantifier;

pub use quantifier::{
    event_type_volatility, Anchor, EventTypeVolatility, ImpactConfig, ImpactQuantifier,
    ImpactRecord,
};
