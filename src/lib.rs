//! epq-rates - Append-only historical logger for Épargne Placements Québec rates
//!
//! Fetches the "taux en vigueur" page (plain HTTP with TLS fingerprint emulation,
//! headless Chrome when the page needs client-side rendering), extracts the
//! effective date and every published rate, and appends one batch per new date
//! to a CSV history.

pub mod commands;
pub mod config;
pub mod epq;
pub mod error;
pub mod format;
pub mod store;

pub use config::Config;
pub use epq::models::{Product, RateObservation};
pub use error::{Error, Result};
pub use store::HistoricalStore;
