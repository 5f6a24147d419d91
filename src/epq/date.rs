//! Effective date lookup.

use crate::epq::selectors;
use crate::epq::text::{normalize_whitespace, parse_french_date};
use crate::error::DateExtractionError;
use chrono::NaiveDate;
use scraper::{ElementRef, Html};
use tracing::debug;

/// Joins an element's text nodes with a separator.
pub(crate) fn element_text(element: ElementRef, sep: &str) -> String {
    element.text().collect::<Vec<_>>().join(sep)
}

/// Flattens a whole document to text, one text node per line.
pub(crate) fn page_text(document: &Html) -> String {
    element_text(document.root_element(), "\n")
}

/// Extracts the effective date from raw HTML.
pub fn extract_date(html: &str) -> Result<NaiveDate, DateExtractionError> {
    let document = Html::parse_document(html);
    extract_date_from(&document)
}

/// Extracts the effective date from a parsed document.
///
/// Looks at `#lblDateModifTaux` first, then falls back to the
/// "Taux en vigueur depuis le ..." phrase anywhere in the page text.
pub fn extract_date_from(document: &Html) -> Result<NaiveDate, DateExtractionError> {
    if let Some(element) = document.select(&selectors::EFFECTIVE_DATE).next() {
        let text = normalize_whitespace(&element_text(element, " "));
        if !text.is_empty() {
            debug!("Found date via {}: {:?}", selectors::RENDERED_MARKER, text);
            return Ok(parse_french_date(&text)?);
        }
    }

    let text = page_text(document);
    if let Some(caps) = selectors::EFFECTIVE_DATE_PHRASE.captures(&text) {
        let fr = normalize_whitespace(&caps[1]);
        debug!("Found date via text pattern: {:?}", fr);
        return Ok(parse_french_date(&fr)?);
    }

    Err(DateExtractionError::NotFound)
}
