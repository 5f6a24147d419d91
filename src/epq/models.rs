//! Data models for rate products, observations, and field lookups.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Note attached to a savings bond observation when the bonds are off sale.
pub const NOT_CURRENTLY_OFFERED: &str = "not_currently_offered";

/// Rate families published on the EPQ "taux en vigueur" page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Product {
    /// Obligations à taux progressif, ten yearly steps.
    Progressive,
    /// Obligations vertes, five-year term.
    Green,
    /// Flexi-Plus.
    Flexible,
    /// Obligations d'épargne.
    SavingsBond,
    /// Placements à taux fixe, a ladder of terms.
    FixedTerm,
}

impl Product {
    /// Returns all products in extraction order.
    pub fn all() -> &'static [Product] {
        &[
            Product::Progressive,
            Product::Green,
            Product::Flexible,
            Product::SavingsBond,
            Product::FixedTerm,
        ]
    }

    /// Returns the code stored in the `product` column.
    pub fn code(&self) -> &'static str {
        match self {
            Product::Progressive => "progressive",
            Product::Green => "green",
            Product::Flexible => "flexible",
            Product::SavingsBond => "savings_bond",
            Product::FixedTerm => "fixed_term",
        }
    }

    /// Returns the product name as shown on the portal.
    pub fn label(&self) -> &'static str {
        match self {
            Product::Progressive => "Obligations à taux progressif",
            Product::Green => "Obligations vertes",
            Product::Flexible => "Flexi-Plus",
            Product::SavingsBond => "Obligations d'épargne",
            Product::FixedTerm => "Placements à taux fixe",
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A single (date, product, term/year, rate) tuple observed on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateObservation {
    /// Effective date published by the source
    #[serde(rename = "date_iso")]
    pub date: NaiveDate,
    /// Rate family
    pub product: Product,
    /// Contract term in years, when the product defines one
    pub term_years: Option<u8>,
    /// Step index, progressive bonds only
    pub year: Option<u8>,
    /// Percentage rate; `None` if unreadable
    pub rate_percent: Option<f64>,
    /// Observation time shared by the whole batch
    pub scraped_at: DateTime<Utc>,
    /// Provenance
    pub source_url: String,
    /// Qualitative annotation, possibly empty
    pub note: String,
}

impl RateObservation {
    /// Renders the observation as a store row, in column order.
    pub fn to_record(&self) -> [String; 8] {
        [
            self.date.format("%Y-%m-%d").to_string(),
            self.product.code().to_string(),
            self.term_years.map(|t| t.to_string()).unwrap_or_default(),
            self.year.map(|y| y.to_string()).unwrap_or_default(),
            self.rate_percent.map(|r| format!("{:.2}", r)).unwrap_or_default(),
            format_timestamp(&self.scraped_at),
            self.source_url.clone(),
            self.note.clone(),
        ]
    }
}

/// Formats a scrape timestamp as RFC 3339, seconds precision, `+00:00` offset.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Why a rate field could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingReason {
    /// No element matched the anchor.
    NoElement,
    /// Element exists but has no text.
    Empty,
    /// Text contains no number.
    Unparseable,
}

impl fmt::Display for MissingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingReason::NoElement => write!(f, "element not found"),
            MissingReason::Empty => write!(f, "element empty"),
            MissingReason::Unparseable => write!(f, "no numeric value"),
        }
    }
}

/// Outcome of a single rate field lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldLookup {
    Found(f64),
    Missing(MissingReason),
}

impl FieldLookup {
    /// Returns the rate, `None` when missing.
    pub fn rate(&self) -> Option<f64> {
        match self {
            FieldLookup::Found(v) => Some(*v),
            FieldLookup::Missing(_) => None,
        }
    }
}
