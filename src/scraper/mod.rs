pub mod cleaner;
pub mod parsers;

use crate::browser::{self, DomScope, Headless};
use crate::config::ScraperConfig;
use crate::models::{DetailFields, ListingRecord};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::Page;
use chrono::Local;
use rand::RngExt;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable listing source abstraction.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn scrape_page(&self, url: &str) -> Result<Vec<ListingRecord>>;
}

// ── q84sale scraper ───────────────────────────────────────────────────────────

/// Drives one headless browser over q84sale listing pages. The browser
/// context lives for the whole scrape invocation; pages are opened per
/// attempt and per detail fetch and closed before the next one opens.
pub struct QSaleScraper {
    browser: Headless,
    base: Url,
    navigation_timeout: Duration,
    selector_timeout: Duration,
    selector_poll: Duration,
    request_delay_ms: u64,
    jitter_ms: u64,
    max_retries: u32,
}

impl QSaleScraper {
    pub async fn launch(config: &ScraperConfig) -> Result<Self> {
        let browser = Headless::launch(Duration::from_secs(config.navigation_timeout_secs))
            .await
            .context("Failed to launch headless browser")?;
        let base = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid base URL {}", config.base_url))?;

        Ok(Self {
            browser,
            base,
            navigation_timeout: Duration::from_secs(config.navigation_timeout_secs),
            selector_timeout: Duration::from_secs(config.selector_timeout_secs),
            selector_poll: Duration::from_millis(config.selector_poll_ms),
            request_delay_ms: config.request_delay_ms,
            jitter_ms: config.jitter_ms,
            max_retries: config.max_retries,
        })
    }

    /// Close the browser. Must be called exactly once when the invocation is
    /// done, whatever happened in between.
    pub async fn shutdown(self) -> Result<()> {
        self.browser
            .close()
            .await
            .context("Failed to close browser")?;
        Ok(())
    }

    /// Sleep for the configured delay + random jitter before a navigation.
    async fn polite_delay(&self) {
        let jitter = rand::rng().random_range(0..=self.jitter_ms);
        tokio::time::sleep(Duration::from_millis(self.request_delay_ms + jitter)).await;
    }

    /// Walk one listing page: enumerate cards, fetch each card's detail page,
    /// merge. Transient failures retry on a fresh page up to the configured
    /// count; exhausted retries return the last attempt's partial content
    /// instead of an error.
    pub async fn walk(&self, url: &str) -> Vec<ListingRecord> {
        let mut collected = Vec::new();

        for attempt in 1..=self.max_retries {
            collected.clear();

            let page = match self.browser.new_page().await {
                Ok(page) => page,
                Err(e) => {
                    warn!(attempt, url, "Could not open page: {e}");
                    continue;
                }
            };

            let outcome = self.walk_once(&page, url, &mut collected).await;
            browser::close_page(page).await;

            match outcome {
                Ok(()) => {
                    debug!(url, records = collected.len(), "Listing page walked");
                    return collected;
                }
                Err(e) => warn!(attempt, url, "Attempt failed: {e:#}"),
            }
        }

        info!(
            url,
            partial = collected.len(),
            "Retries exhausted, returning partial results"
        );
        collected
    }

    async fn walk_once(
        &self,
        page: &Page,
        url: &str,
        out: &mut Vec<ListingRecord>,
    ) -> Result<()> {
        self.polite_delay().await;
        browser::navigate(page, url, self.navigation_timeout).await?;
        browser::wait_for_selector(page, parsers::CARD, self.selector_timeout, self.selector_poll)
            .await?;

        let cards = page
            .query_all(parsers::CARD)
            .await
            .context("Card enumeration failed")?;
        debug!(url, cards = cards.len(), "Enumerated listing cards");

        for card in &cards {
            let Some(card_fields) = parsers::card_fields(card, &self.base).await else {
                debug!(url, "Skipping card without href");
                continue;
            };
            let detail = self.fetch_detail(&card_fields.link).await;
            out.push(ListingRecord::assemble(card_fields, detail));
        }

        Ok(())
    }

    /// Fetch one listing's detail fields on a page scoped to this call. Any
    /// failure degrades this listing to the fallback fields, never the batch.
    pub async fn fetch_detail(&self, url: &str) -> DetailFields {
        let page = match self.browser.new_page().await {
            Ok(page) => page,
            Err(e) => {
                warn!(url, "Could not open detail page: {e}");
                return DetailFields::default();
            }
        };

        let fields = match self.detail_on(&page, url).await {
            Ok(fields) => fields,
            Err(e) => {
                warn!(url, "Detail scrape failed, keeping fallbacks: {e:#}");
                DetailFields::default()
            }
        };

        browser::close_page(page).await;
        fields
    }

    async fn detail_on(&self, page: &Page, url: &str) -> Result<DetailFields> {
        self.polite_delay().await;
        browser::navigate(page, url, self.navigation_timeout).await?;
        browser::wait_for_selector(page, parsers::CARD, self.selector_timeout, self.selector_poll)
            .await?;

        let html = browser::page_content(page).await?;
        Ok(parsers::detail_fields(page, &html, Local::now().naive_local()).await)
    }
}

#[async_trait]
impl ListingSource for QSaleScraper {
    async fn scrape_page(&self, url: &str) -> Result<Vec<ListingRecord>> {
        Ok(self.walk(url).await)
    }
}
