//! Pipeline orchestrator: fans the page walker out over the category table.
//!
//! Categories run concurrently (one future and one result slot each, merged
//! only after all complete); pages within a category are walked sequentially
//! in ascending index order against the shared browser context. A page that
//! fails is logged and skipped — it never takes sibling pages or categories
//! down. The optional publish-date filter keeps only records published on the
//! target day and drops categories left empty.

use crate::config::AppConfig;
use crate::models::{Category, ListingRecord};
use crate::scraper::{ListingSource, QSaleScraper, cleaner};
use anyhow::{Context, Result};
use chrono::Local;
use futures::future::join_all;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Scrape results keyed by category name. Cross-category ordering carries no
/// meaning; within a category, records are in scrape order.
pub type CategoryResults = BTreeMap<String, Vec<ListingRecord>>;

pub struct Pipeline {
    config: AppConfig,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Run the full batch: launch the browser once, walk every configured
    /// category, close the browser exactly once — on every exit path.
    pub async fn run(&self) -> Result<(CategoryResults, PipelineStats)> {
        let scraper = QSaleScraper::launch(&self.config.scraper)
            .await
            .context("Failed to build scraper")?;

        let outcome = self.run_with(&scraper).await;

        if let Err(e) = scraper.shutdown().await {
            warn!("Browser shutdown failed: {e:#}");
        }

        outcome
    }

    /// Batch logic against any listing source; the seam the tests drive.
    pub async fn run_with<S: ListingSource>(
        &self,
        source: &S,
    ) -> Result<(CategoryResults, PipelineStats)> {
        let filter_day = match &self.config.pipeline.publish_filter {
            Some(raw) => Some(
                cleaner::parse_filter_target(raw, Local::now().date_naive())
                    .context("Invalid publish filter")?,
            ),
            None => None,
        };

        let tasks = self
            .config
            .categories
            .iter()
            .map(|category| self.scrape_category(source, category));
        let slots = join_all(tasks).await;

        let mut results = CategoryResults::new();
        let mut stats = PipelineStats::default();

        for (name, records, page_errors) in slots {
            stats.categories_processed += 1;
            stats.page_errors += page_errors;
            stats.records_scraped += records.len();

            let kept: Vec<ListingRecord> = match filter_day {
                Some(day) => records
                    .into_iter()
                    .filter(|r| cleaner::published_on(r.date_published.as_deref(), day))
                    .collect(),
                None => records,
            };
            stats.records_kept += kept.len();

            if kept.is_empty() {
                info!(category = %name, "No records kept, omitting category");
                continue;
            }
            results.insert(name, kept);
        }

        Ok((results, stats))
    }

    /// Walk every page of one category, accumulating into this category's own
    /// result slot.
    async fn scrape_category<S: ListingSource>(
        &self,
        source: &S,
        category: &Category,
    ) -> (String, Vec<ListingRecord>, usize) {
        let mut records = Vec::new();
        let mut page_errors = 0usize;

        for page in 1..=category.pages {
            let url = category.page_url(page);
            info!(category = %category.name, page, %url, "Scraping listing page");

            match source.scrape_page(&url).await {
                Ok(page_records) => {
                    info!(
                        category = %category.name,
                        page,
                        records = page_records.len(),
                        "Page done"
                    );
                    records.extend(page_records);
                }
                Err(e) => {
                    warn!(category = %category.name, page, "Page scrape failed: {e:#}");
                    page_errors += 1;
                }
            }
        }

        (category.name.clone(), records, page_errors)
    }
}

/// Flatten category results into one combined record list, category by
/// category — the shape the HTTP front-end relays.
pub fn flatten(results: CategoryResults) -> Vec<ListingRecord> {
    results.into_values().flatten().collect()
}

#[derive(Debug, Default)]
pub struct PipelineStats {
    pub categories_processed: usize,
    pub records_scraped: usize,
    pub records_kept: usize,
    pub page_errors: usize,
}
