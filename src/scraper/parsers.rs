//! Field extraction rules.
//!
//! One rule per semantic field, each a selector plus a first-match text or
//! attribute read against a [`DomScope`]. A rule that finds nothing yields
//! its fallback (applied in [`cleaner`]) and never an error — a broken field
//! must not take the listing down with it.

use crate::browser::{DomNode, DomScope};
use crate::models::{CardFields, DetailFields};
use crate::scraper::cleaner;
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

// ── Selector table ────────────────────────────────────────────────────────────
// The one place the site's markup is spelled out.

/// Listing-card grid entry; also the content marker awaited on detail pages.
pub const CARD: &str = ".StackedCard_card__Kvggc";

const CARD_TYPE: &str = ".text-6-med.text-neutral_600.styles_category__NQAci";
const CARD_TITLE: &str = ".text-4-med.text-neutral_900.styles_title__l5TTA";
const CARD_DESCRIPTION: &str = ".text-5-regular.text-neutral_500.StackedCard_description__aXpyG";
const CARD_PIN: &str = ".styles_tail__82mnX p.text-6-med.text-neutral_600";

const DETAIL_IMAGE: &str = ".styles_img__PC9G3";
const DETAIL_PRICE: &str = ".h3.m-h5.text-prim_4sale_500";
const DETAIL_ADDRESS: &str = ".text-4-regular.m-text-5-med.text-neutral_600";
const DETAIL_BEDS: &str = ".d-flex.align-items-center.bg-neutral_50.styles_attr__BN3w_ img[alt=\"Rooms\"] + div.text-4-med.m-text-5-med.text-neutral_900";
const DETAIL_AREA: &str = ".d-flex.align-items-center.bg-neutral_50.styles_attr__BN3w_ img[alt=\"Property Area\"] + div.text-4-med.m-text-5-med.text-neutral_900";
const DETAIL_VIEWS: &str =
    ".d-flex.align-items-center.styles_dataWithIcon__For9u .text-5-regular.m-text-6-med.text-neutral_600";
/// Text cells of the top data strip; index 0 is views, index 1 the relative date.
const DETAIL_TOP_DATA_TEXTS: &str =
    ".d-flex.styles_topData__Sx1GF .d-flex.align-items-center.styles_dataWithIcon__For9u div.text-5-regular.m-text-6-med.text-neutral_600";
const SUBMITTER_WRAPPER: &str = ".styles_infoWrapper__v4P8_";
const SUBMITTER_NAME: &str = ".text-4-med.m-h6.text-neutral_900";
const SUBMITTER_DETAILS: &str = ".styles_memberDate__qdUsm span.text-neutral_600";
const EMBEDDED_JSON_SCRIPT: &str = "script#__NEXT_DATA__";

// ── Primitive reads ───────────────────────────────────────────────────────────

/// Trimmed text of the first match, or None. Extraction failures are logged
/// and folded into None.
async fn text_of<S: DomScope>(scope: &S, selector: &str) -> Option<String> {
    let node = match scope.query_one(selector).await {
        Ok(found) => found?,
        Err(e) => {
            debug!(selector, "query failed: {e:#}");
            return None;
        }
    };
    match node.inner_text().await {
        Ok(text) => text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
        Err(e) => {
            debug!(selector, "inner_text failed: {e:#}");
            None
        }
    }
}

/// Trimmed texts of every match, in DOM order.
async fn texts_of<S: DomScope>(scope: &S, selector: &str) -> Vec<String> {
    let nodes = match scope.query_all(selector).await {
        Ok(nodes) => nodes,
        Err(e) => {
            debug!(selector, "query failed: {e:#}");
            return Vec::new();
        }
    };
    let mut texts = Vec::with_capacity(nodes.len());
    for node in &nodes {
        if let Ok(Some(text)) = node.inner_text().await {
            texts.push(text.trim().to_string());
        }
    }
    texts
}

/// Attribute of the first match, or None.
async fn attr_of<S: DomScope>(scope: &S, selector: &str, name: &str) -> Option<String> {
    let node = match scope.query_one(selector).await {
        Ok(found) => found?,
        Err(e) => {
            debug!(selector, "query failed: {e:#}");
            return None;
        }
    };
    match node.attribute(name).await {
        Ok(value) => value,
        Err(e) => {
            debug!(selector, name, "attribute read failed: {e:#}");
            None
        }
    }
}

// ── Card-level extraction ─────────────────────────────────────────────────────

/// Extract the card-only fields. The card anchor's `href` is mandatory — a
/// card without one cannot yield the required absolute link and is skipped.
pub async fn card_fields<N: DomNode>(card: &N, base: &Url) -> Option<CardFields> {
    let href = match card.attribute("href").await {
        Ok(href) => href?,
        Err(e) => {
            debug!("card href read failed: {e:#}");
            return None;
        }
    };

    let pin_texts = texts_of(card, CARD_PIN).await;
    Some(CardFields {
        link: absolute_link(base, &href),
        listing_type: text_of(card, CARD_TYPE).await,
        title: text_of(card, CARD_TITLE).await,
        description: text_of(card, CARD_DESCRIPTION).await,
        pin: cleaner::pin_status(pin_texts.first().map(String::as_str)),
    })
}

/// Absolute listing URL from the fixed base origin and the card's href.
pub fn absolute_link(base: &Url, href: &str) -> String {
    match base.join(href) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{}{}", base.as_str().trim_end_matches('/'), href),
    }
}

/// Trailing numeric segment of the listing URL: `.../slug-<digits>`.
pub fn id_from_link(link: &str) -> Option<String> {
    static ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-(\d+)$").unwrap());
    ID_RE
        .captures(link)
        .map(|caps| caps[1].to_string())
}

// ── Detail-level extraction ───────────────────────────────────────────────────

/// Run every detail-page rule against `scope` and the captured page `html`,
/// normalizing through the fallback table. `now` anchors relative-date
/// resolution.
pub async fn detail_fields<S: DomScope>(scope: &S, html: &str, now: NaiveDateTime) -> DetailFields {
    let (submitter, ads, membership) = submitter_details(scope).await;

    let relative_date = relative_date(scope).await;
    let date_published = relative_date
        .as_deref()
        .map(|raw| cleaner::resolve_relative_date(raw, now).to_string());

    DetailFields {
        image: attr_of(scope, DETAIL_IMAGE, "src").await,
        price: cleaner::price_or_default(text_of(scope, DETAIL_PRICE).await),
        address: cleaner::address_or_default(text_of(scope, DETAIL_ADDRESS).await),
        beds: cleaner::beds_or_default(text_of(scope, DETAIL_BEDS).await),
        area: cleaner::area_or_default(text_of(scope, DETAIL_AREA).await),
        views_no: text_of(scope, DETAIL_VIEWS).await,
        submitter,
        ads,
        membership,
        phone: phone_from_embedded_json(html),
        relative_date,
        date_published,
    }
}

/// Relative-date phrase from the second cell of the top data strip, with the
/// trailing " ago" stripped.
async fn relative_date<S: DomScope>(scope: &S) -> Option<String> {
    let texts = texts_of(scope, DETAIL_TOP_DATA_TEXTS).await;
    texts
        .get(1)
        .map(|raw| cleaner::strip_ago(raw))
        .filter(|s| !s.is_empty())
}

/// Submitter block: name plus the detail strings governed by the
/// ads/membership precedence rules. All None when the block is absent.
async fn submitter_details<S: DomScope>(
    scope: &S,
) -> (Option<String>, Option<String>, Option<String>) {
    let wrappers = match scope.query_all(SUBMITTER_WRAPPER).await {
        Ok(wrappers) => wrappers,
        Err(e) => {
            debug!("submitter wrapper query failed: {e:#}");
            return (None, None, None);
        }
    };
    let Some(wrapper) = wrappers.first() else {
        return (None, None, None);
    };

    let submitter = text_of(wrapper, SUBMITTER_NAME).await;
    let details = texts_of(wrapper, SUBMITTER_DETAILS).await;
    let (ads, membership) = cleaner::ads_and_membership(&details);
    (submitter, Some(ads), membership)
}

/// Phone number from the page-hydration JSON embedded in the document.
/// Tolerates a missing script, malformed JSON, and missing intermediate keys.
pub fn phone_from_embedded_json(html: &str) -> Option<String> {
    let selector = Selector::parse(EMBEDDED_JSON_SCRIPT).ok()?;
    let document = Html::parse_document(html);
    let script = document.select(&selector).next()?;
    let payload = script.text().collect::<String>();

    let data: serde_json::Value = serde_json::from_str(payload.trim()).ok()?;
    match data.pointer("/props/pageProps/listing/phone")? {
        serde_json::Value::String(phone) if !phone.is_empty() => Some(phone.clone()),
        serde_json::Value::Number(phone) => Some(phone.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeNode, FakePage};
    use crate::models::PinStatus;

    fn base() -> Url {
        Url::parse("https://www.q84sale.com").unwrap()
    }

    #[test]
    fn test_id_from_link() {
        assert_eq!(
            id_from_link("https://www.q84sale.com/en/property/villa-salmiya-98765").as_deref(),
            Some("98765")
        );
        assert_eq!(id_from_link("https://www.q84sale.com/en/property/villa"), None);
        assert_eq!(id_from_link("https://www.q84sale.com/en/property/villa-12a"), None);
    }

    #[test]
    fn test_absolute_link_joins_relative_href() {
        assert_eq!(
            absolute_link(&base(), "/en/property/house-123"),
            "https://www.q84sale.com/en/property/house-123"
        );
    }

    #[test]
    fn test_phone_from_embedded_json() {
        let html = r#"<html><head><script id="__NEXT_DATA__" type="application/json">
            {"props":{"pageProps":{"listing":{"phone":"+96512345678"}}}}
        </script></head><body></body></html>"#;
        assert_eq!(phone_from_embedded_json(html).as_deref(), Some("+96512345678"));
    }

    #[test]
    fn test_phone_missing_path_is_none() {
        let html = r#"<html><script id="__NEXT_DATA__">{"props":{"pageProps":{}}}</script></html>"#;
        assert_eq!(phone_from_embedded_json(html), None);
    }

    #[test]
    fn test_phone_malformed_json_is_none() {
        let html = r#"<html><script id="__NEXT_DATA__">{not json</script></html>"#;
        assert_eq!(phone_from_embedded_json(html), None);
    }

    #[test]
    fn test_phone_missing_script_is_none() {
        assert_eq!(phone_from_embedded_json("<html><body></body></html>"), None);
    }

    fn card_node() -> FakeNode {
        FakeNode::default()
            .with_attr("href", "/en/property/for-sale/house-55501")
            .with_children(CARD_TYPE, vec![FakeNode::text("House for Sale")])
            .with_children(CARD_TITLE, vec![FakeNode::text("Corner villa")])
            .with_children(CARD_DESCRIPTION, vec![FakeNode::text("3 floors, driver room")])
            .with_children(CARD_PIN, vec![FakeNode::text("Pinned today")])
    }

    #[test]
    fn test_card_fields_extracts_everything() {
        tokio_test::block_on(async {
            let card = card_fields(&card_node(), &base()).await.unwrap();
            assert_eq!(card.link, "https://www.q84sale.com/en/property/for-sale/house-55501");
            assert_eq!(card.listing_type.as_deref(), Some("House for Sale"));
            assert_eq!(card.title.as_deref(), Some("Corner villa"));
            assert_eq!(card.description.as_deref(), Some("3 floors, driver room"));
            assert_eq!(card.pin, PinStatus::PinnedToday);
        });
    }

    #[test]
    fn test_card_without_href_is_skipped() {
        tokio_test::block_on(async {
            let card = FakeNode::default().with_children(CARD_TITLE, vec![FakeNode::text("x")]);
            assert!(card_fields(&card, &base()).await.is_none());
        });
    }

    #[test]
    fn test_card_pin_badge_mismatch_is_not_pinned() {
        tokio_test::block_on(async {
            let card = card_node().with_children(CARD_PIN, vec![FakeNode::text("Featured")]);
            let fields = card_fields(&card, &base()).await.unwrap();
            assert_eq!(fields.pin, PinStatus::NotPinned);
        });
    }

    fn detail_page() -> FakePage {
        FakePage::default()
            .with_children(DETAIL_IMAGE, vec![FakeNode::default().with_attr("src", "https://cdn.example/img.jpg")])
            .with_children(DETAIL_PRICE, vec![FakeNode::text("185,000 KWD")])
            .with_children(DETAIL_ADDRESS, vec![FakeNode::text("Salmiya, Block 3")])
            .with_children(DETAIL_BEDS, vec![FakeNode::text("4 Beds")])
            .with_children(DETAIL_AREA, vec![FakeNode::text("400 m2")])
            .with_children(DETAIL_VIEWS, vec![FakeNode::text("542")])
            .with_children(
                DETAIL_TOP_DATA_TEXTS,
                vec![FakeNode::text("542"), FakeNode::text("5 Hours ago")],
            )
            .with_children(
                SUBMITTER_WRAPPER,
                vec![FakeNode::default()
                    .with_children(SUBMITTER_NAME, vec![FakeNode::text("Al Deera Real Estate")])
                    .with_children(
                        SUBMITTER_DETAILS,
                        vec![FakeNode::text("12 ads"), FakeNode::text("Member since 2019")],
                    )],
            )
    }

    #[test]
    fn test_detail_fields_full_page() {
        tokio_test::block_on(async {
            let now = chrono::NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(14, 0, 0)
                .unwrap();
            let fields = detail_fields(&detail_page(), "<html></html>", now).await;
            assert_eq!(fields.image.as_deref(), Some("https://cdn.example/img.jpg"));
            assert_eq!(fields.price, "185,000 KWD");
            assert_eq!(fields.address, "Salmiya, Block 3");
            assert_eq!(fields.beds, "4 Beds");
            assert_eq!(fields.area, "400 m2");
            assert_eq!(fields.views_no.as_deref(), Some("542"));
            assert_eq!(fields.submitter.as_deref(), Some("Al Deera Real Estate"));
            assert_eq!(fields.ads.as_deref(), Some("12 ads"));
            assert_eq!(fields.membership.as_deref(), Some("Member since 2019"));
            assert_eq!(fields.relative_date.as_deref(), Some("5 Hours"));
            assert_eq!(fields.date_published.as_deref(), Some("2024-01-15 09:00:00"));
        });
    }

    #[test]
    fn test_detail_fields_empty_page_yields_fallbacks() {
        tokio_test::block_on(async {
            let now = chrono::Local::now().naive_local();
            let fields = detail_fields(&FakePage::default(), "<html></html>", now).await;
            assert_eq!(fields, crate::models::DetailFields::default());
        });
    }

    #[test]
    fn test_detail_extraction_is_idempotent() {
        tokio_test::block_on(async {
            let now = chrono::NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(14, 0, 0)
                .unwrap();
            let page = detail_page();
            let first = detail_fields(&page, "<html></html>", now).await;
            let second = detail_fields(&page, "<html></html>", now).await;
            assert_eq!(first, second);
        });
    }
}
