//! Configuration management with TOML, environment variables, and CLI overrides.

use crate::epq::DEFAULT_URL;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Rates page URL
    #[serde(default = "default_url")]
    pub url: String,

    /// Historical CSV store
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Proxy URL (e.g., socks5://host:port)
    #[serde(default)]
    pub proxy: Option<String>,

    /// Plain HTTP fetch timeout in seconds
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Allow escalation to headless Chrome
    #[serde(default = "default_render")]
    pub render: bool,

    /// Wait for the rate elements after page load, in milliseconds
    #[serde(default = "default_render_wait_ms")]
    pub render_wait_ms: u64,

    /// Headless page load timeout in seconds
    #[serde(default = "default_render_load_timeout_secs")]
    pub render_load_timeout_secs: u64,

    /// Chrome/Chromium binary; auto-detected when unset
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,

    /// Output format for printed batches
    #[serde(default)]
    pub format: OutputFormat,
}

fn default_url() -> String {
    DEFAULT_URL.to_string()
}

fn default_store_path() -> PathBuf {
    PathBuf::from("epq_taux.csv")
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_render() -> bool {
    true
}

fn default_render_wait_ms() -> u64 {
    5000
}

fn default_render_load_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: default_url(),
            store_path: default_store_path(),
            proxy: None,
            http_timeout_secs: default_http_timeout_secs(),
            render: default_render(),
            render_wait_ms: default_render_wait_ms(),
            render_load_timeout_secs: default_render_load_timeout_secs(),
            chrome_path: None,
            format: OutputFormat::Table,
        }
    }
}

impl Config {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading config from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Loads configuration with fallback to default locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        // 1. Explicit path takes precedence
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        // 2. Try current directory
        let local_config = Path::new("epq-rates.toml");
        if local_config.exists() {
            debug!("Found epq-rates.toml in current directory");
            return Self::from_file(local_config);
        }

        // 3. Try XDG config directory
        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("epq-rates").join("config.toml");
            if xdg_config.exists() {
                debug!("Found config in XDG config directory");
                return Self::from_file(xdg_config);
            }
        }

        // 4. Return default config
        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Applies environment variable overrides.
    pub fn with_env(mut self) -> Self {
        if let Ok(url) = std::env::var("EPQ_URL") {
            if !url.trim().is_empty() {
                self.url = url;
            }
        }

        if let Ok(store) = std::env::var("EPQ_STORE") {
            if !store.trim().is_empty() {
                self.store_path = PathBuf::from(store);
            }
        }

        if let Ok(proxy) = std::env::var("EPQ_PROXY") {
            self.proxy = Some(proxy);
        }

        if let Ok(chrome) = std::env::var("EPQ_CHROME") {
            self.chrome_path = Some(PathBuf::from(chrome));
        }

        self
    }
}

/// Output format for printed observations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use: table, json, csv", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}
