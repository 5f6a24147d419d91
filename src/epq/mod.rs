//! EPQ-specific modules for page retrieval, parsing, and data models.

pub mod client;
pub mod date;
pub mod models;
pub mod parser;
pub mod render;
pub mod selectors;
pub mod text;

pub use client::{EpqClient, PageSource, PageState};
pub use date::extract_date;
pub use models::{FieldLookup, MissingReason, Product, RateObservation};
pub use parser::Parser;
pub use render::{ChromeRenderer, Renderer};

/// Published rates page.
pub const DEFAULT_URL: &str = "https://epq.gouv.qc.ca/taux-en-vigueur/";
