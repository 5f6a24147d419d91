//! Status command: what the store holds.

use crate::config::Config;
use crate::format::Formatter;
use crate::store::HistoricalStore;
use anyhow::{Context, Result};

/// Prints the store summary.
pub struct StatusCommand {
    config: Config,
}

impl StatusCommand {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<String> {
        let store = HistoricalStore::new(&self.config.store_path);
        let summary = store
            .summary()
            .with_context(|| format!("Failed to summarize {}", store.path().display()))?;

        let formatter = Formatter::new(self.config.format);
        Ok(formatter.format_summary(&store.path().display().to_string(), &summary))
    }
}
