//! Headless-browsing seam.
//!
//! Everything the scraper needs from a browser goes through here: a launcher
//! owning the Chromium process and its CDP event loop, navigation with an
//! explicit timeout, a polled wait-for-selector, and the `DomScope`/`DomNode`
//! traits the field extractors are written against. Extractors never touch
//! chromiumoxide types directly, so they can be exercised against a fake DOM.

use anyhow::Result;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use chromiumoxide::{Element, Page};
use futures::StreamExt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("navigation to {url} timed out after {timeout:?}")]
    NavigationTimeout { url: String, timeout: Duration },

    #[error("selector `{selector}` did not appear within {timeout:?}")]
    SelectorTimeout { selector: String, timeout: Duration },

    #[error("browser protocol error: {0}")]
    Cdp(#[from] CdpError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ── DOM traits ────────────────────────────────────────────────────────────────

/// A queryable scope: a whole page or a single element subtree.
#[async_trait]
pub trait DomScope: Send + Sync {
    type Node: DomNode;

    /// First match for `selector`, or None. Absence is not an error.
    async fn query_one(&self, selector: &str) -> Result<Option<Self::Node>>;

    /// All matches for `selector`, in DOM order.
    async fn query_all(&self, selector: &str) -> Result<Vec<Self::Node>>;
}

/// A single DOM node: readable text and attributes, queryable within.
#[async_trait]
pub trait DomNode: DomScope<Node = Self> + Sized + Send + Sync {
    async fn inner_text(&self) -> Result<Option<String>>;
    async fn attribute(&self, name: &str) -> Result<Option<String>>;
}

#[async_trait]
impl DomScope for Page {
    type Node = Element;

    async fn query_one(&self, selector: &str) -> Result<Option<Element>> {
        // chromiumoxide reports a missing node as an error; fold it into None.
        Ok(self.find_element(selector).await.ok())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<Element>> {
        Ok(self.find_elements(selector).await?)
    }
}

#[async_trait]
impl DomScope for Element {
    type Node = Element;

    async fn query_one(&self, selector: &str) -> Result<Option<Element>> {
        Ok(self.find_element(selector).await.ok())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<Element>> {
        Ok(self.find_elements(selector).await?)
    }
}

#[async_trait]
impl DomNode for Element {
    async fn inner_text(&self) -> Result<Option<String>> {
        Ok(Element::inner_text(self).await?)
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        Ok(Element::attribute(self, name).await?)
    }
}

// ── Launcher ──────────────────────────────────────────────────────────────────

/// Owns the headless Chromium process and the task draining its CDP events.
/// Launched once per scrape invocation; `close` must be called on every exit
/// path before the value is dropped.
pub struct Headless {
    browser: Browser,
    event_task: JoinHandle<()>,
}

impl Headless {
    pub async fn launch(navigation_timeout: Duration) -> Result<Self, BrowserError> {
        debug!("Launching headless Chromium");
        let config = BrowserConfig::builder()
            .request_timeout(navigation_timeout)
            .build()
            .map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config).await?;

        let event_task = tokio::task::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self { browser, event_task })
    }

    /// Open a fresh blank page. Pages are cheap and short-lived; callers close
    /// them before opening the next one.
    pub async fn new_page(&self) -> Result<Page, BrowserError> {
        Ok(self.browser.new_page("about:blank").await?)
    }

    pub async fn close(mut self) -> Result<(), BrowserError> {
        self.browser.close().await?;
        self.browser.wait().await?;
        let _ = self.event_task.await;
        Ok(())
    }
}

// ── Page operations ───────────────────────────────────────────────────────────

/// Navigate and wait for the document to finish loading, bounded by `timeout`.
pub async fn navigate(page: &Page, url: &str, timeout: Duration) -> Result<(), BrowserError> {
    let nav = async {
        page.goto(url).await?;
        page.wait_for_navigation().await?;
        Ok::<(), CdpError>(())
    };
    match tokio::time::timeout(timeout, nav).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(BrowserError::Cdp(e)),
        Err(_) => Err(BrowserError::NavigationTimeout {
            url: url.to_string(),
            timeout,
        }),
    }
}

/// Poll until `selector` matches something in `scope`, or time out.
pub async fn wait_for_selector<S: DomScope>(
    scope: &S,
    selector: &str,
    timeout: Duration,
    poll: Duration,
) -> Result<(), BrowserError> {
    let deadline = Instant::now() + timeout;
    loop {
        if scope.query_one(selector).await.ok().flatten().is_some() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(BrowserError::SelectorTimeout {
                selector: selector.to_string(),
                timeout,
            });
        }
        tokio::time::sleep(poll).await;
    }
}

/// Full serialized HTML of the current document.
pub async fn page_content(page: &Page) -> Result<String, BrowserError> {
    Ok(page.content().await?)
}

/// Close a page, logging rather than propagating failure — cleanup must not
/// mask the error that got us here.
pub async fn close_page(page: Page) {
    if let Err(e) = page.close().await {
        warn!("Failed to close page: {e}");
    }
}

// ── Fake DOM for tests ────────────────────────────────────────────────────────

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::collections::HashMap;

    /// In-memory DOM node keyed by opaque selector strings.
    #[derive(Debug, Clone, Default)]
    pub struct FakeNode {
        pub text: Option<String>,
        pub attrs: HashMap<String, String>,
        pub children: HashMap<String, Vec<FakeNode>>,
    }

    impl FakeNode {
        pub fn text(text: &str) -> Self {
            Self {
                text: Some(text.to_string()),
                ..Default::default()
            }
        }

        pub fn with_attr(mut self, name: &str, value: &str) -> Self {
            self.attrs.insert(name.to_string(), value.to_string());
            self
        }

        pub fn with_children(mut self, selector: &str, nodes: Vec<FakeNode>) -> Self {
            self.children.insert(selector.to_string(), nodes);
            self
        }
    }

    #[async_trait]
    impl DomScope for FakeNode {
        type Node = FakeNode;

        async fn query_one(&self, selector: &str) -> Result<Option<FakeNode>> {
            Ok(self.children.get(selector).and_then(|v| v.first()).cloned())
        }

        async fn query_all(&self, selector: &str) -> Result<Vec<FakeNode>> {
            Ok(self.children.get(selector).cloned().unwrap_or_default())
        }
    }

    #[async_trait]
    impl DomNode for FakeNode {
        async fn inner_text(&self) -> Result<Option<String>> {
            Ok(self.text.clone())
        }

        async fn attribute(&self, name: &str) -> Result<Option<String>> {
            Ok(self.attrs.get(name).cloned())
        }
    }

    /// Page-level scope: a bag of top-level selector matches.
    #[derive(Debug, Clone, Default)]
    pub struct FakePage {
        pub children: HashMap<String, Vec<FakeNode>>,
    }

    impl FakePage {
        pub fn with_children(mut self, selector: &str, nodes: Vec<FakeNode>) -> Self {
            self.children.insert(selector.to_string(), nodes);
            self
        }
    }

    #[async_trait]
    impl DomScope for FakePage {
        type Node = FakeNode;

        async fn query_one(&self, selector: &str) -> Result<Option<FakeNode>> {
            Ok(self.children.get(selector).and_then(|v| v.first()).cloned())
        }

        async fn query_all(&self, selector: &str) -> Result<Vec<FakeNode>> {
            Ok(self.children.get(selector).cloned().unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::*;
    use super::*;

    #[test]
    fn test_wait_for_selector_times_out_on_empty_scope() {
        tokio_test::block_on(async {
            let page = FakePage::default();
            let err = wait_for_selector(
                &page,
                ".missing",
                Duration::from_millis(30),
                Duration::from_millis(10),
            )
            .await
            .unwrap_err();
            assert!(matches!(err, BrowserError::SelectorTimeout { .. }));
        });
    }

    #[test]
    fn test_wait_for_selector_finds_existing_node() {
        tokio_test::block_on(async {
            let page = FakePage::default().with_children(".grid", vec![FakeNode::text("x")]);
            wait_for_selector(
                &page,
                ".grid",
                Duration::from_millis(30),
                Duration::from_millis(10),
            )
            .await
            .unwrap();
        });
    }
}
