//! Script-executing fetch through headless Chrome.
//!
//! The browser is launched per fetch and owned by a [`BrowserSession`] that
//! lives only as long as one render. `headless_chrome::Browser` kills its Chrome
//! process in its own `Drop`, which runs when the session goes out of scope.

use crate::config::Config;
use crate::epq::selectors::RENDER_WAIT_SELECTOR;
use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Trait for the script-executing fetch tier - enables mocking for tests.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Renders the page and returns its HTML, `None` on failure.
    async fn render(&self, url: &str) -> Option<String>;
}

/// Headless Chrome settings for one render.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Page load (navigation) timeout
    pub load_timeout: Duration,
    /// How long to wait for the rate elements after load
    pub element_wait: Duration,
    /// Chrome/Chromium binary, auto-detected when `None`
    pub chrome_path: Option<PathBuf>,
}

impl RenderOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            load_timeout: Duration::from_secs(config.render_load_timeout_secs),
            element_wait: Duration::from_millis(config.render_wait_ms),
            chrome_path: config.chrome_path.clone(),
        }
    }
}

/// A launched headless browser scoped to one render.
///
/// Teardown comes from dropping the `browser` field; `Drop` here only logs the
/// session lifetime.
struct BrowserSession {
    browser: Browser,
    started: Instant,
}

impl BrowserSession {
    fn launch(options: &RenderOptions) -> Result<Self> {
        info!("Launching headless Chrome browser");

        let launch = LaunchOptions {
            headless: true,
            sandbox: false,
            path: options.chrome_path.clone(),
            idle_browser_timeout: options.load_timeout + options.element_wait,
            args: vec![
                OsStr::new("--disable-blink-features=AutomationControlled"),
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--lang=fr-CA"),
                OsStr::new("--window-size=1920,1080"),
            ],
            ..Default::default()
        };

        let browser = Browser::new(launch)
            .context("Failed to launch headless Chrome. Is Chrome/Chromium installed?")?;

        Ok(Self { browser, started: Instant::now() })
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        debug!("Closing headless browser after {:?}", self.started.elapsed());
    }
}

/// Loads `url` in a fresh browser and captures the DOM after rendering.
///
/// A timeout on the rate elements is not an error: whatever HTML is present
/// at that point is returned.
fn render_blocking(url: &str, options: &RenderOptions) -> Result<String> {
    let session = BrowserSession::launch(options)?;

    let tab = session.browser.new_tab().context("Failed to create new browser tab")?;
    tab.set_default_timeout(options.load_timeout);

    tab.navigate_to(url).context("Failed to navigate to URL")?;
    tab.wait_until_navigated().context("Timed out waiting for page to load")?;

    if let Err(e) = tab.wait_for_element_with_custom_timeout(RENDER_WAIT_SELECTOR, options.element_wait)
    {
        warn!("Timeout waiting for rate elements, using partial HTML: {}", e);
    }

    tab.get_content().context("Failed to get page content")
}

/// Headless Chrome renderer; each call owns its own browser instance.
pub struct ChromeRenderer {
    options: RenderOptions,
}

impl ChromeRenderer {
    pub fn new(config: &Config) -> Self {
        Self { options: RenderOptions::from_config(config) }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }
}

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn render(&self, url: &str) -> Option<String> {
        let url = url.to_string();
        let options = self.options.clone();

        match tokio::task::spawn_blocking(move || render_blocking(&url, &options)).await {
            Ok(Ok(html)) => {
                info!("Headless render: {} chars after script execution", html.len());
                Some(html)
            }
            Ok(Err(e)) => {
                error!("Headless render failed: {:#}", e);
                None
            }
            Err(e) => {
                error!("Headless render task aborted: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_options_from_config() {
        let config = Config {
            render_wait_ms: 2500,
            render_load_timeout_secs: 45,
            chrome_path: Some(PathBuf::from("/usr/bin/chromium")),
            ..Config::default()
        };

        let renderer = ChromeRenderer::new(&config);
        let options = renderer.options();
        assert_eq!(options.element_wait, Duration::from_millis(2500));
        assert_eq!(options.load_timeout, Duration::from_secs(45));
        assert_eq!(options.chrome_path, Some(PathBuf::from("/usr/bin/chromium")));
    }

    #[test]
    fn test_default_render_wait_is_five_seconds() {
        let options = RenderOptions::from_config(&Config::default());
        assert_eq!(options.element_wait, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_missing_browser_yields_none() {
        let config = Config {
            chrome_path: Some(PathBuf::from("/nonexistent/chrome-binary")),
            ..Config::default()
        };

        let renderer = ChromeRenderer::new(&config);
        assert!(renderer.render("http://127.0.0.1:9/").await.is_none());
    }
}
