//! Check command: normalizer self-checks, store status and an optional live fetch.

use crate::config::Config;
use crate::epq::text::{parse_french_date, parse_percent};
use crate::epq::{extract_date, EpqClient, PageSource, Parser};
use crate::format::{product_stats, Formatter};
use crate::store::HistoricalStore;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{error, info};

const RULE: &str = "============================================================";

/// One self-check outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfCheck {
    pub name: String,
    pub passed: bool,
}

/// Check output plus the overall verdict.
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub output: String,
    pub passed: bool,
}

/// Runs the percentage and date normalizers against known inputs.
pub fn self_checks() -> Vec<SelfCheck> {
    let percents: [(&str, Option<f64>); 4] =
        [("3,45%", Some(3.45)), ("4.50", Some(4.5)), ("2,10 %", Some(2.1)), ("", None)];
    let dates = [
        ("15 décembre 2025", (2025, 12, 15)),
        ("1 janvier 2025", (2025, 1, 1)),
        ("31 décembre 2025", (2025, 12, 31)),
    ];

    let mut checks = Vec::new();

    for (input, expected) in percents {
        let got = parse_percent(input);
        checks.push(SelfCheck {
            name: format!("parse_percent({:?}) = {:?}", input, got),
            passed: got == expected,
        });
    }

    for (input, (y, m, d)) in dates {
        let got = parse_french_date(input);
        checks.push(SelfCheck {
            name: match &got {
                Ok(date) => format!("parse_french_date({:?}) = {}", input, date),
                Err(e) => format!("parse_french_date({:?}) failed: {}", input, e),
            },
            passed: got.ok() == NaiveDate::from_ymd_opt(y, m, d),
        });
    }

    let got = parse_french_date("15 brumaire 2025");
    checks.push(SelfCheck {
        name: "parse_french_date(\"15 brumaire 2025\") rejects unknown month".to_string(),
        passed: got.is_err(),
    });

    checks
}

/// Validates the setup.
pub struct CheckCommand {
    config: Config,
}

impl CheckCommand {
    /// Creates a new check command.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Runs the checks, fetching the live page when `full` is set.
    pub async fn execute(&self, full: bool) -> Result<CheckReport> {
        let store = HistoricalStore::new(&self.config.store_path);

        if full {
            let client =
                EpqClient::new(&self.config).await.context("Failed to create HTTP client")?;
            Ok(self.execute_with_client(Some(&client), &store).await)
        } else {
            Ok(self.execute_with_client(None::<&EpqClient>, &store).await)
        }
    }

    /// Runs the checks with a provided page source; `None` skips the fetch.
    pub async fn execute_with_client(
        &self,
        source: Option<&impl PageSource>,
        store: &HistoricalStore,
    ) -> CheckReport {
        let mut lines = Vec::new();
        let mut passed = true;

        section(&mut lines, "NORMALIZERS");
        for check in self_checks() {
            passed &= check.passed;
            lines.push(format!("  {} {}", if check.passed { "ok  " } else { "FAIL" }, check.name));
        }

        section(&mut lines, "STORE");
        let path = store.path().display().to_string();
        match store.summary() {
            Ok(summary) => {
                let text = Formatter::new(self.config.format).format_summary(&path, &summary);
                lines.extend(text.lines().map(|l| format!("  {}", l)));
            }
            Err(e) => {
                passed = false;
                lines.push(format!("  FAIL {}", e));
            }
        }

        match source {
            Some(source) => {
                section(&mut lines, "LIVE FETCH");
                passed &= self.check_live(source, store, &mut lines).await;
            }
            None => {
                lines.push(String::new());
                lines.push("Skipping live fetch (use --full to enable)".to_string());
            }
        }

        lines.push(String::new());
        lines.push(if passed { "All checks passed." } else { "Checks failed." }.to_string());

        CheckReport { output: lines.join("\n"), passed }
    }

    /// Fetches and extracts without writing; `false` on fetch or date failure.
    async fn check_live(
        &self,
        source: &impl PageSource,
        store: &HistoricalStore,
        lines: &mut Vec<String>,
    ) -> bool {
        info!("Fetching {} for validation", self.config.url);

        let html = match source.fetch(&self.config.url).await {
            Ok(html) => html,
            Err(e) => {
                error!("Fetch failed: {}", e);
                lines.push(format!("  FAIL {}", e));
                return false;
            }
        };
        lines.push(format!("  ok   fetched {} chars", html.len()));

        let date = match extract_date(&html) {
            Ok(date) => date,
            Err(e) => {
                error!("Date extraction failed: {}", e);
                lines.push(format!("  FAIL {}", e));
                return false;
            }
        };
        lines.push(format!("  ok   effective date {}", date));

        if store.has_date(date) {
            lines.push("       already recorded in store".to_string());
        } else {
            lines.push("       not yet recorded, a run would append it".to_string());
        }

        let observations = Parser::new(&self.config.url).extract_rates(&html, date);
        lines.push(format!("  ok   extracted {} observations", observations.len()));

        let stats = Formatter::new(self.config.format).format_stats(&product_stats(&observations));
        lines.extend(stats.lines().map(|l| format!("  {}", l)));

        true
    }
}

fn section(lines: &mut Vec<String>, title: &str) {
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(RULE.to_string());
    lines.push(title.to_string());
    lines.push(RULE.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct MockPageSource {
        html: Option<String>,
        fetch_count: Arc<AtomicU32>,
    }

    impl MockPageSource {
        fn new(html: Option<&str>) -> Self {
            Self { html: html.map(String::from), fetch_count: Arc::new(AtomicU32::new(0)) }
        }
    }

    #[async_trait]
    impl PageSource for MockPageSource {
        async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
            self.fetch_count.fetch_add(1, Ordering::SeqCst);
            self.html.clone().ok_or(FetchError)
        }
    }

    const PAGE: &str = r#"<html><body>
        <span id="lblDateModifTaux">15 décembre 2025</span>
        <span id="lblOtpTaux1">2,50</span>
        <span id="lblOtpTaux2">3,00</span>
        <span id="lblFlexiTaux1">2,40</span>
    </body></html>"#;

    fn setup() -> (TempDir, CheckCommand, HistoricalStore) {
        let dir = TempDir::new().unwrap();
        let config = Config { store_path: dir.path().join("epq_taux.csv"), ..Config::default() };
        let store = HistoricalStore::new(&config.store_path);
        (dir, CheckCommand::new(config), store)
    }

    #[test]
    fn test_self_checks_pass() {
        let checks = self_checks();
        assert_eq!(checks.len(), 8);
        for check in &checks {
            assert!(check.passed, "{}", check.name);
        }
    }

    #[tokio::test]
    async fn test_check_without_fetch() {
        let (_dir, cmd, store) = setup();

        let report = cmd.execute_with_client(None::<&MockPageSource>, &store).await;

        assert!(report.passed);
        assert!(report.output.contains("NORMALIZERS"));
        assert!(report.output.contains("empty or does not exist"));
        assert!(report.output.contains("Skipping live fetch"));
        assert!(!store.exists());
    }

    #[tokio::test]
    async fn test_check_full_reports_stats_without_writing() {
        let (_dir, cmd, store) = setup();
        let source = MockPageSource::new(Some(PAGE));

        let report = cmd.execute_with_client(Some(&source), &store).await;

        assert!(report.passed, "{}", report.output);
        assert_eq!(source.fetch_count.load(Ordering::SeqCst), 1);
        assert!(report.output.contains("effective date 2025-12-15"));
        assert!(report.output.contains("progressive (Obligations à taux progressif): 2/10 rates"));
        assert!(report.output.contains("Range: 2.50% - 3.00%"));
        assert!(report.output.contains("flexible (Flexi-Plus): 1/1 rates"));
        assert!(!store.exists());
    }

    #[tokio::test]
    async fn test_check_full_fetch_failure() {
        let (_dir, cmd, store) = setup();
        let source = MockPageSource::new(None);

        let report = cmd.execute_with_client(Some(&source), &store).await;

        assert!(!report.passed);
        assert!(report.output.contains("both fetch strategies failed"));
        assert!(report.output.ends_with("Checks failed."));
    }

    #[tokio::test]
    async fn test_check_full_missing_date() {
        let (_dir, cmd, store) = setup();
        let source = MockPageSource::new(Some("<html><body></body></html>"));

        let report = cmd.execute_with_client(Some(&source), &store).await;

        assert!(!report.passed);
        assert!(report.output.contains("could not extract effective date"));
    }
}
