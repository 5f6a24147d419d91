//! Markup contract for the EPQ "taux en vigueur" page.
//!
//! Every element id, anchor and French phrase the extractors rely on lives
//! here. Update this file when the portal changes its markup.

use regex::Regex;
use scraper::Selector;
use std::sync::LazyLock;

/// Text only present before client-side rendering (unresolved Vue binding).
pub const TEMPLATE_MARKER: &str = "{{json.produits";

/// Id of the date display element, present once the page has rendered.
pub const RENDERED_MARKER: &str = "lblDateModifTaux";

/// Element the rendering fetch waits for.
pub const RENDER_WAIT_SELECTOR: &str = "span[id^='lblOtpTaux']";

/// Number of yearly steps on the progressive bond.
pub const PROGRESSIVE_STEPS: u8 = 10;

/// Id prefix of the progressive bond step rates (`lblOtpTaux1`..`lblOtpTaux10`).
pub const PROGRESSIVE_PREFIX: &str = "lblOtpTaux";

/// Effective date ("Taux en vigueur depuis le ...").
pub static EFFECTIVE_DATE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#lblDateModifTaux").unwrap());

/// Progressive bond step rates, indexed 1..=10.
pub static PROGRESSIVE: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    (1..=PROGRESSIVE_STEPS)
        .map(|k| Selector::parse(&format!("#{}{}", PROGRESSIVE_PREFIX, k)).unwrap())
        .collect()
});

/// Green bond, five-year term.
pub static GREEN: LazyLock<Selector> = LazyLock::new(|| Selector::parse("#lblOtfVTaux1").unwrap());

/// Flexi-Plus.
pub static FLEXIBLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#lblFlexiTaux1").unwrap());

/// Savings bond.
pub static SAVINGS_BOND: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#lblOeqTaux1").unwrap());

/// Named anchor inside the fixed-term ladder table.
pub static FIXED_TERM_ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[name='OTF']").unwrap());

pub static TABLE_ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());

/// Row cells, label cell included.
pub static TABLE_CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th, td").unwrap());

/// Fallback date phrase in the flattened page text; captures the rest of the line.
pub static EFFECTIVE_DATE_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)taux\s+en\s+vigueur\s+depuis\s+le\s+([^\n\r]+)").unwrap()
});

/// Savings bonds are off sale.
pub static NOT_OFFERED_PHRASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ne\s+sont\s+pas\s+en\s+vente\s+actuellement").unwrap());

/// Ladder row holding the terms.
pub static TERM_ROW: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bterme\b").unwrap());

/// Ladder row holding the annual rates.
pub static ANNUAL_RATE_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)taux\s+annuel").unwrap());

/// Standalone one or two digit integer (a term in years).
pub static TERM_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{1,2})\b").unwrap());
