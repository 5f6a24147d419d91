//! HTML parser for the EPQ rate table.

use crate::epq::date::{element_text, page_text};
use crate::epq::models::{FieldLookup, MissingReason, Product, RateObservation, NOT_CURRENTLY_OFFERED};
use crate::epq::selectors;
use crate::epq::text::{normalize_whitespace, parse_percent};
use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, trace};

/// Rate extractor for one page of the portal.
pub struct Parser {
    source_url: String,
}

/// Shared fields for every observation of one extraction run.
struct Batch<'a> {
    date: NaiveDate,
    scraped_at: DateTime<Utc>,
    source_url: &'a str,
}

impl Batch<'_> {
    fn observation(
        &self,
        product: Product,
        term_years: Option<u8>,
        year: Option<u8>,
        rate_percent: Option<f64>,
    ) -> RateObservation {
        RateObservation {
            date: self.date,
            product,
            term_years,
            year,
            rate_percent,
            scraped_at: self.scraped_at,
            source_url: self.source_url.to_string(),
            note: String::new(),
        }
    }
}

impl Parser {
    /// Creates a parser tagging observations with the given source URL.
    pub fn new(source_url: impl Into<String>) -> Self {
        Self { source_url: source_url.into() }
    }

    /// Extracts all rate observations for `date`, stamped with the current time.
    pub fn extract_rates(&self, html: &str, date: NaiveDate) -> Vec<RateObservation> {
        let scraped_at = Utc::now().trunc_subsecs(0);
        self.extract_rates_at(html, date, scraped_at)
    }

    /// Extracts all rate observations for `date` with an explicit scrape time.
    pub fn extract_rates_at(
        &self,
        html: &str,
        date: NaiveDate,
        scraped_at: DateTime<Utc>,
    ) -> Vec<RateObservation> {
        let document = Html::parse_document(html);
        let batch = Batch { date, scraped_at, source_url: &self.source_url };

        let mut rows = Vec::new();
        for product in Product::all() {
            let found = self.extract_product(*product, &document, &batch);
            debug!("{}: {} observations", product, found.len());
            rows.extend(found);
        }

        let missing = rows.iter().filter(|r| r.rate_percent.is_none()).count();
        debug!("Extracted {} observations ({} without a rate) for {}", rows.len(), missing, date);

        rows
    }

    /// Dispatches to the extraction strategy of one product.
    fn extract_product(
        &self,
        product: Product,
        document: &Html,
        batch: &Batch,
    ) -> Vec<RateObservation> {
        match product {
            Product::Progressive => self.extract_progressive(document, batch),
            Product::Green => {
                let rate = self.lookup_rate(document, &selectors::GREEN, product).rate();
                vec![batch.observation(product, Some(5), None, rate)]
            }
            Product::Flexible => {
                let rate = self.lookup_rate(document, &selectors::FLEXIBLE, product).rate();
                vec![batch.observation(product, None, None, rate)]
            }
            Product::SavingsBond => self.extract_savings_bond(document, batch),
            Product::FixedTerm => self.extract_fixed_term(document, batch),
        }
    }

    /// Ten yearly steps of the progressive bond, ten-year term.
    fn extract_progressive(&self, document: &Html, batch: &Batch) -> Vec<RateObservation> {
        selectors::PROGRESSIVE
            .iter()
            .zip(1..=selectors::PROGRESSIVE_STEPS)
            .map(|(selector, step)| {
                let rate = self.lookup_rate(document, selector, Product::Progressive).rate();
                batch.observation(Product::Progressive, Some(10), Some(step), rate)
            })
            .collect()
    }

    fn extract_savings_bond(&self, document: &Html, batch: &Batch) -> Vec<RateObservation> {
        let rate = self.lookup_rate(document, &selectors::SAVINGS_BOND, Product::SavingsBond).rate();
        let mut obs = batch.observation(Product::SavingsBond, None, None, rate);

        if selectors::NOT_OFFERED_PHRASE.is_match(&page_text(document)) {
            debug!("Savings bonds marked as not currently offered");
            obs.note = NOT_CURRENTLY_OFFERED.to_string();
        }

        vec![obs]
    }

    /// Fixed-term ladder: the `Terme` row gives terms, the `Taux annuel` row gives rates.
    fn extract_fixed_term(&self, document: &Html, batch: &Batch) -> Vec<RateObservation> {
        let Some(anchor) = document.select(&selectors::FIXED_TERM_ANCHOR).next() else {
            debug!("Fixed-term anchor not found");
            return Vec::new();
        };

        let Some(table) = enclosing_table(anchor) else {
            debug!("Fixed-term anchor is not inside a table");
            return Vec::new();
        };

        let rows: Vec<ElementRef> = table.select(&selectors::TABLE_ROW).collect();

        let terms: Vec<u8> = rows
            .iter()
            .map(|tr| row_text(*tr))
            .find(|text| selectors::TERM_ROW.is_match(text))
            .map(|text| parse_terms(&text))
            .unwrap_or_default();

        let rates: Vec<Option<f64>> = rows
            .iter()
            .find(|tr| selectors::ANNUAL_RATE_ROW.is_match(&row_text(**tr)))
            .map(|tr| {
                tr.select(&selectors::TABLE_CELL)
                    .skip(1)
                    .map(|cell| parse_percent(&normalize_whitespace(&element_text(cell, " "))))
                    .collect()
            })
            .unwrap_or_default();

        if terms.len() != rates.len() {
            debug!(
                "Fixed-term ladder has {} terms and {} rates, pairing {}",
                terms.len(),
                rates.len(),
                terms.len().min(rates.len())
            );
        }

        terms
            .into_iter()
            .zip(rates)
            .map(|(term, rate)| batch.observation(Product::FixedTerm, Some(term), None, rate))
            .collect()
    }

    /// Looks up one rate element and parses its text.
    fn lookup_rate(&self, document: &Html, selector: &Selector, product: Product) -> FieldLookup {
        let lookup = match document.select(selector).next() {
            None => FieldLookup::Missing(MissingReason::NoElement),
            Some(element) => {
                let text = normalize_whitespace(&element_text(element, ""));
                if text.is_empty() {
                    FieldLookup::Missing(MissingReason::Empty)
                } else {
                    match parse_percent(&text) {
                        Some(v) => FieldLookup::Found(v),
                        None => FieldLookup::Missing(MissingReason::Unparseable),
                    }
                }
            }
        };

        match lookup {
            FieldLookup::Found(v) => trace!("{}: {}", product, v),
            FieldLookup::Missing(reason) => debug!("{}: rate missing ({})", product, reason),
        }

        lookup
    }
}

/// Nearest `<table>` ancestor of an element.
fn enclosing_table(element: ElementRef) -> Option<ElementRef> {
    element.ancestors().filter_map(ElementRef::wrap).find(|e| e.value().name() == "table")
}

fn row_text(tr: ElementRef) -> String {
    normalize_whitespace(&element_text(tr, " "))
}

/// Every standalone one or two digit integer, in order.
fn parse_terms(text: &str) -> Vec<u8> {
    selectors::TERM_NUMBER
        .captures_iter(text)
        .filter_map(|c| c[1].parse().ok())
        .collect()
}
