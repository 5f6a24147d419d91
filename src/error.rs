//! Error types for the fetch → extract → store pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Neither the lightweight fetch nor the rendering fetch produced any HTML.
#[derive(Debug, Error)]
#[error("both fetch strategies failed")]
pub struct FetchError;

/// A French date string could not be turned into a calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateParseError {
    /// Text is not `<day> <month> <year>`.
    #[error("unexpected French date format: {0:?}")]
    Format(String),

    /// Month token is not in the French month table.
    #[error("unknown month: {0:?}")]
    UnknownMonth(String),

    /// Day, month and year do not form a real date (e.g. 31 février).
    #[error("invalid calendar date: {0:?}")]
    InvalidDate(String),
}

/// The effective date could not be located or parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateExtractionError {
    #[error("could not extract effective date from page")]
    NotFound,

    #[error("effective date found but unparseable: {0}")]
    Parse(#[from] DateParseError),
}

/// Reading or writing the historical CSV store failed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed store {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("store {0} has no date_iso column")]
    MissingDateColumn(PathBuf),
}

/// Fatal pipeline errors surfaced to the entry point.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    DateExtraction(#[from] DateExtractionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
