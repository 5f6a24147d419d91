//! Append-only CSV history of rate observations.

use crate::epq::models::RateObservation;
use crate::error::StoreError;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Store columns, in on-disk order.
pub const COLUMNS: [&str; 8] = [
    "date_iso",
    "product",
    "term_years",
    "year",
    "rate_percent",
    "scraped_at",
    "source_url",
    "note",
];

/// The historical dataset on disk.
#[derive(Debug, Clone)]
pub struct HistoricalStore {
    path: PathBuf,
}

/// Overview of what the store holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    pub rows: usize,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
    /// Distinct product codes across all rows
    pub products: BTreeSet<String>,
    /// Rows recorded for `last_date`
    pub latest_rows: usize,
    /// Product codes recorded for `last_date`
    pub latest_products: BTreeSet<String>,
}

impl HistoricalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Missing or 0-byte.
    fn is_empty(&self) -> bool {
        fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true)
    }

    /// Whether any row carries `date`.
    ///
    /// A missing store is `false`. Read or parse failures are logged and also
    /// reported as `false`, so an unverifiable date is re-appended rather than skipped.
    pub fn has_date(&self, date: NaiveDate) -> bool {
        match self.contains_date(date) {
            Ok(found) => {
                if found {
                    info!("Date {} already exists in {}", date, self.path.display());
                }
                found
            }
            Err(e) => {
                warn!("Could not read store, assuming {} is not recorded: {}", date, e);
                false
            }
        }
    }

    /// Strict membership test by date.
    pub fn contains_date(&self, date: NaiveDate) -> Result<bool, StoreError> {
        if self.is_empty() {
            return Ok(false);
        }

        let wanted = date.format("%Y-%m-%d").to_string();
        let dates = self.read_dates()?;
        Ok(dates.iter().any(|d| *d == wanted))
    }

    /// Reads the `date_iso` column of every row, in file order.
    fn read_dates(&self) -> Result<Vec<String>, StoreError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_path(&self.path)
            .map_err(|source| self.csv_error(source))?;

        let headers = reader.headers().map_err(|source| self.csv_error(source))?;
        let idx = headers
            .iter()
            .position(|h| h.trim() == COLUMNS[0])
            .ok_or_else(|| StoreError::MissingDateColumn(self.path.clone()))?;

        let mut dates = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|source| self.csv_error(source))?;
            dates.push(record.get(idx).unwrap_or_default().trim().to_string());
        }

        Ok(dates)
    }

    /// Appends a whole batch, writing the header first if the store is new.
    ///
    /// Returns the number of rows written. Existing rows are never touched; an
    /// unterminated last row only gets its missing newline.
    pub fn append(&self, rows: &[RateObservation]) -> Result<usize, StoreError> {
        let is_new = self.is_empty();
        let needs_newline = !is_new && !self.ends_with_newline()?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io_error(source))?;

        if needs_newline {
            warn!("{} does not end with a newline, terminating its last row", self.path.display());
            file.write_all(b"\n").map_err(|source| self.io_error(source))?;
        }

        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);

        if is_new {
            writer.write_record(COLUMNS).map_err(|source| self.csv_error(source))?;
            info!("Created new store: {}", self.path.display());
        }

        for row in rows {
            writer.write_record(row.to_record()).map_err(|source| self.csv_error(source))?;
        }

        writer.flush().map_err(|source| self.io_error(source))?;

        debug!("Appended {} rows to {}", rows.len(), self.path.display());
        Ok(rows.len())
    }

    fn ends_with_newline(&self) -> Result<bool, StoreError> {
        let mut file = File::open(&self.path).map_err(|source| self.io_error(source))?;
        file.seek(SeekFrom::End(-1)).map_err(|source| self.io_error(source))?;

        let mut last = [0u8; 1];
        file.read_exact(&mut last).map_err(|source| self.io_error(source))?;
        Ok(last[0] == b'\n')
    }

    /// Summarizes the store; an absent or 0-byte store is an empty summary.
    pub fn summary(&self) -> Result<StoreSummary, StoreError> {
        let mut summary = StoreSummary::default();
        if self.is_empty() {
            return Ok(summary);
        }

        let mut reader =
            csv::Reader::from_path(&self.path).map_err(|source| self.csv_error(source))?;
        let headers = reader.headers().map_err(|source| self.csv_error(source))?.clone();
        let date_idx = headers
            .iter()
            .position(|h| h.trim() == COLUMNS[0])
            .ok_or_else(|| StoreError::MissingDateColumn(self.path.clone()))?;
        let product_idx = headers.iter().position(|h| h.trim() == COLUMNS[1]);

        let mut rows: Vec<(String, String)> = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|source| self.csv_error(source))?;
            let date = record.get(date_idx).unwrap_or_default().trim().to_string();
            let product = product_idx
                .and_then(|i| record.get(i))
                .unwrap_or_default()
                .trim()
                .to_string();
            rows.push((date, product));
        }

        summary.rows = rows.len();
        // ISO dates sort lexically
        summary.first_date = rows.iter().map(|(d, _)| d.clone()).min();
        summary.last_date = rows.iter().map(|(d, _)| d.clone()).max();
        summary.products = rows.iter().map(|(_, p)| p.clone()).filter(|p| !p.is_empty()).collect();

        if let Some(last) = &summary.last_date {
            let latest: Vec<_> = rows.iter().filter(|(d, _)| d == last).collect();
            summary.latest_rows = latest.len();
            summary.latest_products =
                latest.iter().map(|(_, p)| p.clone()).filter(|p| !p.is_empty()).collect();
        }

        Ok(summary)
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io { path: self.path.clone(), source }
    }

    fn csv_error(&self, source: csv::Error) -> StoreError {
        StoreError::Csv { path: self.path.clone(), source }
    }
}
