//! Run command: fetch → date → dedupe → extract → append.

use crate::config::Config;
use crate::epq::{extract_date, EpqClient, PageSource, Parser, RateObservation};
use crate::error::Result as PipelineResult;
use crate::format::Formatter;
use crate::store::HistoricalStore;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::info;

/// What a run did to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The effective date was already in the store; nothing was written.
    AlreadyRecorded { date: NaiveDate },
    /// A new batch was appended.
    Appended { date: NaiveDate, rows: usize },
    /// The batch was extracted but not written.
    DryRun { date: NaiveDate, observations: Vec<RateObservation> },
}

/// Executes one logging run.
pub struct RunCommand {
    config: Config,
}

impl RunCommand {
    /// Creates a new run command.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Runs the pipeline against the live page and returns formatted output.
    pub async fn execute(&self, dry_run: bool) -> Result<String> {
        let client = EpqClient::new(&self.config).await.context("Failed to create HTTP client")?;
        let store = HistoricalStore::new(&self.config.store_path);

        let outcome = self.execute_with_client(&client, &store, dry_run).await?;
        Ok(self.describe(&outcome, &store))
    }

    /// Runs the pipeline with a provided page source (for testing).
    pub async fn execute_with_client(
        &self,
        source: &impl PageSource,
        store: &HistoricalStore,
        dry_run: bool,
    ) -> PipelineResult<RunOutcome> {
        let html = source.fetch(&self.config.url).await?;

        let date = extract_date(&html)?;
        info!("Effective date: {}", date);

        if store.has_date(date) {
            info!("Rates for {} already recorded, skipping", date);
            return Ok(RunOutcome::AlreadyRecorded { date });
        }

        let observations = Parser::new(&self.config.url).extract_rates(&html, date);
        info!("Extracted {} observations", observations.len());

        if dry_run {
            info!("Dry run, not writing to {}", store.path().display());
            return Ok(RunOutcome::DryRun { date, observations });
        }

        let rows = store.append(&observations)?;
        info!("Appended {} rows for {} to {}", rows, date, store.path().display());

        Ok(RunOutcome::Appended { date, rows })
    }

    fn describe(&self, outcome: &RunOutcome, store: &HistoricalStore) -> String {
        match outcome {
            RunOutcome::AlreadyRecorded { date } => format!(
                "Rates for {} already recorded in {}, nothing to do.",
                date,
                store.path().display()
            ),
            RunOutcome::Appended { date, rows } => {
                format!("Appended {} observations for {} to {}", rows, date, store.path().display())
            }
            RunOutcome::DryRun { observations, .. } => {
                Formatter::new(self.config.format).format_observations(observations)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use crate::epq::Product;
    use crate::error::{DateExtractionError, Error, FetchError};
    use async_trait::async_trait;
    use std::fs;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Mock page source serving canned pages in order.
    struct MockPageSource {
        pages: Vec<Option<String>>,
        fetch_count: Arc<AtomicU32>,
    }

    impl MockPageSource {
        fn new(pages: Vec<Option<String>>) -> Self {
            Self { pages, fetch_count: Arc::new(AtomicU32::new(0)) }
        }

        fn serving(html: &str) -> Self {
            Self::new(vec![Some(html.to_string())])
        }

        fn call_count(&self) -> u32 {
            self.fetch_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PageSource for MockPageSource {
        async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
            let idx = self.fetch_count.fetch_add(1, Ordering::SeqCst) as usize;
            let page = self.pages.get(idx).or_else(|| self.pages.last()).cloned().flatten();
            page.ok_or(FetchError)
        }
    }

    fn make_page(date: &str, first_step: &str) -> String {
        format!(
            r#"<html><body>
                <span id="lblDateModifTaux">{date}</span>
                <span id="lblOtpTaux1">{first_step}</span>
                <span id="lblOtpTaux2">2,75</span>
                <span id="lblOtfVTaux1">3,15 %</span>
                <span id="lblFlexiTaux1">2,40</span>
                <p>Les obligations d'épargne ne sont pas en vente actuellement.</p>
                <table>
                    <tr><th><a name="OTF"></a>Placements à taux fixe</th></tr>
                    <tr><td>Terme</td><td>1 an</td><td>2 ans</td><td>3 ans</td></tr>
                    <tr><td>Taux annuel</td><td>3,00</td><td>3,10</td><td>3,20</td></tr>
                </table>
            </body></html>"#
        )
    }

    fn make_test_config(dir: &TempDir) -> Config {
        Config {
            url: "https://epq.gouv.qc.ca/taux-en-vigueur/".to_string(),
            store_path: dir.path().join("epq_taux.csv"),
            render: false,
            format: OutputFormat::Table,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_run_appends_batch() {
        let dir = TempDir::new().unwrap();
        let config = make_test_config(&dir);
        let store = HistoricalStore::new(&config.store_path);
        let source = MockPageSource::serving(&make_page("15 décembre 2025", "2,50"));

        let outcome =
            RunCommand::new(config).execute_with_client(&source, &store, false).await.unwrap();

        let date = NaiveDate::from_ymd_opt(2025, 12, 15).unwrap();
        // 10 progressive + green + flexible + savings bond + 3 fixed-term
        assert_eq!(outcome, RunOutcome::Appended { date, rows: 16 });
        assert!(store.has_date(date));

        let content = fs::read_to_string(store.path()).unwrap();
        assert!(content.contains("2025-12-15,progressive,10,1,2.50,"));
        assert!(content.contains(",not_currently_offered"));
        assert!(content.contains("2025-12-15,fixed_term,3,,3.20,"));
    }

    #[tokio::test]
    async fn test_second_run_same_date_is_noop() {
        let dir = TempDir::new().unwrap();
        let config = make_test_config(&dir);
        let store = HistoricalStore::new(&config.store_path);
        let cmd = RunCommand::new(config);
        let page = make_page("15 décembre 2025", "2,50");

        cmd.execute_with_client(&MockPageSource::serving(&page), &store, false).await.unwrap();
        let before = fs::read(store.path()).unwrap();

        let outcome =
            cmd.execute_with_client(&MockPageSource::serving(&page), &store, false).await.unwrap();

        assert!(matches!(outcome, RunOutcome::AlreadyRecorded { .. }));
        assert_eq!(fs::read(store.path()).unwrap(), before);
    }

    #[tokio::test]
    async fn test_two_dates_accumulate_in_order() {
        let dir = TempDir::new().unwrap();
        let config = make_test_config(&dir);
        let store = HistoricalStore::new(&config.store_path);
        let cmd = RunCommand::new(config);

        let source = MockPageSource::new(vec![
            Some(make_page("15 décembre 2025", "2,50")),
            Some(make_page("1 janvier 2026", "2,60")),
        ]);

        cmd.execute_with_client(&source, &store, false).await.unwrap();
        let first = fs::read(store.path()).unwrap();
        cmd.execute_with_client(&source, &store, false).await.unwrap();
        let content = fs::read(store.path()).unwrap();

        assert_eq!(source.call_count(), 2);
        assert!(content.starts_with(&first));

        let text = String::from_utf8(content).unwrap();
        let dates: Vec<_> =
            text.lines().skip(1).map(|l| l.split(',').next().unwrap_or_default()).collect();
        assert_eq!(dates.len(), 32);
        assert!(dates[..16].iter().all(|d| *d == "2025-12-15"));
        assert!(dates[16..].iter().all(|d| *d == "2026-01-01"));
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let config = make_test_config(&dir);
        let store = HistoricalStore::new(&config.store_path);
        let source = MockPageSource::serving(&make_page("15 décembre 2025", "2,50"));

        let outcome =
            RunCommand::new(config).execute_with_client(&source, &store, true).await.unwrap();

        match outcome {
            RunOutcome::DryRun { date, observations } => {
                assert_eq!(date, NaiveDate::from_ymd_opt(2025, 12, 15).unwrap());
                assert_eq!(observations.len(), 16);
                assert_eq!(observations[0].product, Product::Progressive);
            }
            other => panic!("expected dry run, got {:?}", other),
        }
        assert!(!store.exists());
    }

    #[tokio::test]
    async fn test_date_error_creates_no_store() {
        let dir = TempDir::new().unwrap();
        let config = make_test_config(&dir);
        let store = HistoricalStore::new(&config.store_path);
        let source = MockPageSource::serving("<html><body><p>Aucun taux</p></body></html>");

        let err = RunCommand::new(config)
            .execute_with_client(&source, &store, false)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::DateExtraction(DateExtractionError::NotFound)));
        assert!(!store.exists());
    }

    #[tokio::test]
    async fn test_unknown_month_is_fatal() {
        let dir = TempDir::new().unwrap();
        let config = make_test_config(&dir);
        let store = HistoricalStore::new(&config.store_path);
        let source = MockPageSource::serving(&make_page("15 brumaire 2025", "2,50"));

        let err = RunCommand::new(config)
            .execute_with_client(&source, &store, false)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::DateExtraction(DateExtractionError::Parse(_))));
        assert!(!store.exists());
    }

    #[tokio::test]
    async fn test_fetch_error_is_fatal() {
        let dir = TempDir::new().unwrap();
        let config = make_test_config(&dir);
        let store = HistoricalStore::new(&config.store_path);
        let source = MockPageSource::new(vec![None]);

        let err = RunCommand::new(config)
            .execute_with_client(&source, &store, false)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Fetch(_)));
        assert_eq!(err.to_string(), "both fetch strategies failed");
        assert!(!store.exists());
    }

    #[test]
    fn test_describe_outcomes() {
        let dir = TempDir::new().unwrap();
        let config = make_test_config(&dir);
        let store = HistoricalStore::new(&config.store_path);
        let cmd = RunCommand::new(config);
        let date = NaiveDate::from_ymd_opt(2025, 12, 15).unwrap();

        let appended = cmd.describe(&RunOutcome::Appended { date, rows: 16 }, &store);
        assert!(appended.starts_with("Appended 16 observations for 2025-12-15"));

        let skipped = cmd.describe(&RunOutcome::AlreadyRecorded { date }, &store);
        assert!(skipped.contains("already recorded"));

        let dry = cmd.describe(&RunOutcome::DryRun { date, observations: Vec::new() }, &store);
        assert_eq!(dry, "No observations.");
    }
}
