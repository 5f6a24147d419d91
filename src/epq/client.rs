//! Two-tier page retrieval: a plain HTTP fetch using wreq for TLS fingerprint
//! emulation, escalating to a headless browser when the page is unrendered.

use crate::config::Config;
use crate::epq::render::{ChromeRenderer, Renderer};
use crate::epq::selectors::{RENDERED_MARKER, TEMPLATE_MARKER};
use crate::error::FetchError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};
use wreq::Client;
use wreq_util::Emulation;

/// Trait for page retrieval - enables mocking for tests.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Returns the page HTML, failing only if every strategy failed.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// What a lightweight fetch tells us about the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    /// Client-side templates are still unresolved.
    NeedsRender,
    /// The rendered date element is present.
    Rendered,
    /// Neither marker found.
    Incomplete,
}

impl PageState {
    /// Classifies HTML by probing for the template and rendered markers.
    pub fn of(html: &str) -> Self {
        if html.contains(TEMPLATE_MARKER) {
            PageState::NeedsRender
        } else if html.contains(RENDERED_MARKER) {
            PageState::Rendered
        } else {
            PageState::Incomplete
        }
    }
}

/// EPQ page client: lightweight HTTP first, headless rendering when needed.
pub struct EpqClient<R: Renderer = ChromeRenderer> {
    client: Client,
    renderer: Option<R>,
}

impl EpqClient<ChromeRenderer> {
    /// Creates a client with the headless Chrome renderer (unless rendering is disabled).
    pub async fn new(config: &Config) -> Result<Self> {
        let renderer = config.render.then(|| ChromeRenderer::new(config));
        Self::with_renderer(config, renderer).await
    }
}

impl<R: Renderer> EpqClient<R> {
    /// Creates a client with a custom renderer (for testing).
    pub async fn with_renderer(config: &Config, renderer: Option<R>) -> Result<Self> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .connect_timeout(Duration::from_secs(10));

        // Configure proxy if specified
        if let Some(proxy_url) = &config.proxy {
            debug!("Configuring proxy: {}", proxy_url);
            let proxy = wreq::Proxy::all(proxy_url).context("Failed to configure proxy")?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build()?;

        Ok(Self { client, renderer })
    }

    /// Performs a plain GET with browser-like headers.
    async fn get(&self, url: &str) -> Result<String> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .emulation(Emulation::Chrome131)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header("Accept-Language", "fr-CA,fr;q=0.9,en-CA;q=0.8,en;q=0.7")
            .header("Cache-Control", "no-cache")
            .header("Pragma", "no-cache")
            .header("Upgrade-Insecure-Requests", "1")
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        debug!("Response status: {}", status);

        if !status.is_success() {
            anyhow::bail!("Request failed with status: {}", status);
        }

        response.text().await.context("Failed to read response body")
    }

    /// Lightweight tier; transport and status errors become `None`.
    async fn fetch_plain(&self, url: &str) -> Option<String> {
        match self.get(url).await {
            Ok(html) => {
                info!("Plain fetch: {} chars", html.len());
                Some(html)
            }
            Err(e) => {
                warn!("Plain fetch failed: {:#}", e);
                None
            }
        }
    }

    /// Rendering tier; `None` when disabled or failed.
    async fn fetch_rendered(&self, url: &str) -> Option<String> {
        match &self.renderer {
            Some(renderer) => renderer.render(url).await,
            None => {
                warn!("Rendering disabled, cannot escalate");
                None
            }
        }
    }
}

#[async_trait]
impl<R: Renderer> PageSource for EpqClient<R> {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        info!("Fetching {}", url);

        let mut incomplete = None;
        match self.fetch_plain(url).await {
            Some(html) => match PageState::of(&html) {
                PageState::Rendered => {
                    info!("Page is rendered, using plain fetch result");
                    return Ok(html);
                }
                PageState::NeedsRender => {
                    info!("Page contains unrendered templates, escalating to headless rendering");
                }
                PageState::Incomplete => {
                    info!("Page not fully loaded, escalating to headless rendering");
                    incomplete = Some(html);
                }
            },
            None => info!("No plain fetch result, escalating to headless rendering"),
        }

        if let Some(html) = self.fetch_rendered(url).await {
            return Ok(html);
        }

        // An incomplete page is returned as-is; a template page never is.
        if let Some(html) = incomplete {
            warn!("Rendering failed, falling back to incomplete plain fetch result");
            return Ok(html);
        }

        Err(FetchError)
    }
}
