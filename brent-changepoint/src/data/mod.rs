//! Input data: daily Brent prices and the event catalog.

pub mod loader;
pub mod types;

pub use loader::{parse_date, CleaningReport, DataLoader, LoadedPrices, LoaderError, DATE_FORMATS};
pub use types::{Event, EventType, PriceObservation, ReturnObservation};
