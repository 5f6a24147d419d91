//! Output formatting for rate observations (table, JSON, CSV) and summaries.

use crate::config::OutputFormat;
use crate::epq::models::{format_timestamp, Product, RateObservation};
use crate::store::{StoreSummary, COLUMNS};
use serde::Serialize;

/// Per-product rate statistics for one batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductStats {
    pub product: Product,
    pub observations: usize,
    /// Observations carrying a rate
    pub rates: usize,
    pub average: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Groups a batch by product, in product order; products without rows are omitted.
pub fn product_stats(rows: &[RateObservation]) -> Vec<ProductStats> {
    Product::all()
        .iter()
        .filter_map(|product| {
            let obs: Vec<_> = rows.iter().filter(|r| r.product == *product).collect();
            if obs.is_empty() {
                return None;
            }

            let rates: Vec<f64> = obs.iter().filter_map(|r| r.rate_percent).collect();
            let average =
                (!rates.is_empty()).then(|| rates.iter().sum::<f64>() / rates.len() as f64);

            Some(ProductStats {
                product: *product,
                observations: obs.len(),
                rates: rates.len(),
                average,
                min: rates.iter().copied().reduce(f64::min),
                max: rates.iter().copied().reduce(f64::max),
            })
        })
        .collect()
}

/// Formats observations for output.
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    /// Creates a new formatter.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats an observation batch.
    pub fn format_observations(&self, rows: &[RateObservation]) -> String {
        if rows.is_empty() {
            return match self.format {
                OutputFormat::Json => "[]".to_string(),
                OutputFormat::Csv => COLUMNS.join(","),
                OutputFormat::Table => "No observations.".to_string(),
            };
        }

        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(rows).unwrap_or_else(|_| "[]".to_string())
            }
            OutputFormat::Table => self.table_observations(rows),
            OutputFormat::Csv => self.csv_observations(rows),
        }
    }

    /// Formats per-product statistics.
    pub fn format_stats(&self, stats: &[ProductStats]) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(stats).unwrap_or_else(|_| "[]".to_string())
            }
            OutputFormat::Csv => {
                let records = stats.iter().map(|s| {
                    [
                        s.product.code().to_string(),
                        s.observations.to_string(),
                        s.rates.to_string(),
                        opt_pct(s.average),
                        opt_pct(s.min),
                        opt_pct(s.max),
                    ]
                });
                write_csv(&STATS_COLUMNS, records)
                    .unwrap_or_else(|_| STATS_COLUMNS.join(","))
            }
            OutputFormat::Table => {
                let mut lines = Vec::new();
                for s in stats {
                    lines.push(format!(
                        "  {} ({}): {}/{} rates",
                        s.product,
                        s.product.label(),
                        s.rates,
                        s.observations
                    ));
                    if let (Some(avg), Some(min), Some(max)) = (s.average, s.min, s.max) {
                        lines.push(format!("    Average: {:.2}%", avg));
                        lines.push(format!("    Range: {:.2}% - {:.2}%", min, max));
                    }
                }
                lines.join("\n")
            }
        }
    }

    /// Formats a store summary.
    pub fn format_summary(&self, path: &str, summary: &StoreSummary) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(summary).unwrap_or_else(|_| "{}".to_string())
            }
            OutputFormat::Table | OutputFormat::Csv => {
                if summary.rows == 0 {
                    return format!("Store {} is empty or does not exist yet.", path);
                }

                let mut lines = Vec::new();
                lines.push(format!("Store:      {}", path));
                lines.push(format!("Rows:       {}", summary.rows));
                lines.push(format!(
                    "Date range: {} to {}",
                    summary.first_date.as_deref().unwrap_or("?"),
                    summary.last_date.as_deref().unwrap_or("?")
                ));
                lines.push(format!("Products:   {}", summary.products.len()));
                lines.push(format!(
                    "Latest:     {} records ({})",
                    summary.latest_rows,
                    summary.latest_products.iter().cloned().collect::<Vec<_>>().join(", ")
                ));
                lines.join("\n")
            }
        }
    }

    fn table_observations(&self, rows: &[RateObservation]) -> String {
        let product_width = 12;
        let term_width = 5;
        let year_width = 4;
        let rate_width = 7;

        let mut lines = Vec::new();

        lines.push(format!(
            "{:<10}  {:<product_width$}  {:>term_width$}  {:>year_width$}  {:>rate_width$}  {}",
            "Date", "Product", "Term", "Year", "Rate %", "Note"
        ));
        lines.push(format!(
            "{:-<10}  {:-<product_width$}  {:-<term_width$}  {:-<year_width$}  {:-<rate_width$}  {:-<21}",
            "", "", "", "", "", ""
        ));

        for row in rows {
            lines.push(format!(
                "{:<10}  {:<product_width$}  {:>term_width$}  {:>year_width$}  {:>rate_width$}  {}",
                row.date.format("%Y-%m-%d").to_string(),
                row.product.code(),
                row.term_years.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string()),
                row.year.map(|y| y.to_string()).unwrap_or_else(|| "-".to_string()),
                row.rate_percent.map(|r| format!("{:.2}", r)).unwrap_or_else(|| "N/A".to_string()),
                row.note
            ));
        }

        lines.push(String::new());
        lines.push(format!(
            "Total: {} observations, scraped at {}",
            rows.len(),
            format_timestamp(&rows[0].scraped_at)
        ));

        lines.join("\n")
    }

    fn csv_observations(&self, rows: &[RateObservation]) -> String {
        write_csv(&COLUMNS, rows.iter().map(|row| row.to_record()))
            .unwrap_or_else(|_| COLUMNS.join(","))
    }
}

const STATS_COLUMNS: [&str; 6] = ["product", "observations", "rates", "average", "min", "max"];

/// Encodes a header and records the same way the store writes them, minus the final newline.
fn write_csv<R, F>(header: &[&str], records: impl IntoIterator<Item = R>) -> Result<String, csv::Error>
where
    R: IntoIterator<Item = F>,
    F: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    writer.write_record(header)?;
    for record in records {
        writer.write_record(record)?;
    }

    let bytes = writer.into_inner().map_err(|e| csv::Error::from(e.into_error()))?;
    let mut out = String::from_utf8_lossy(&bytes).into_owned();
    if out.ends_with('\n') {
        out.pop();
    }
    Ok(out)
}

fn opt_pct(v: Option<f64>) -> String {
    v.map(|v| format!("{:.2}", v)).unwrap_or_default()
}
