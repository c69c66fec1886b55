use serde::{Deserialize, Serialize};

// ── Pin status ────────────────────────────────────────────────────────────────

/// Whether the listing card carries the "Pinned today" badge.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum PinStatus {
    #[serde(rename = "Pinned today")]
    PinnedToday,
    #[default]
    #[serde(rename = "Not Pinned")]
    NotPinned,
}

// ── Listing record ────────────────────────────────────────────────────────────

/// One fully assembled property listing: card-level fields merged with
/// detail-page fields. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingRecord {
    /// Trailing numeric segment of `link`; identity for dedup.
    pub id: Option<String>,
    pub date_published: Option<String>,
    pub relative_date: Option<String>,
    pub pin: PinStatus,
    #[serde(rename = "type")]
    pub listing_type: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: String,
    pub image: Option<String>,
    pub price: String,
    pub address: String,
    pub beds: String,
    pub area: String,
    pub views_no: Option<String>,
    pub submitter: Option<String>,
    pub ads: Option<String>,
    pub membership: Option<String>,
    pub phone: Option<String>,
}

impl ListingRecord {
    /// Merge card-level and detail-level fields into the final record.
    /// Card fields win only where the detail page has no equivalent.
    pub fn assemble(card: CardFields, detail: DetailFields) -> Self {
        let id = crate::scraper::parsers::id_from_link(&card.link);
        Self {
            id,
            date_published: detail.date_published,
            relative_date: detail.relative_date,
            pin: card.pin,
            listing_type: card.listing_type,
            title: card.title,
            description: card.description,
            link: card.link,
            image: detail.image,
            price: detail.price,
            address: detail.address,
            beds: detail.beds,
            area: detail.area,
            views_no: detail.views_no,
            submitter: detail.submitter,
            ads: detail.ads,
            membership: detail.membership,
            phone: detail.phone,
        }
    }
}

// ── Raw field bundles ─────────────────────────────────────────────────────────

/// Fields scraped off a listing card in the search-results grid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardFields {
    pub link: String,
    pub listing_type: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub pin: PinStatus,
}

/// Fields scraped off a listing's detail page. `Default` is the empty partial
/// record: every literal fallback plus null for the nullable fields, which is
/// what a failed detail fetch degrades to.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailFields {
    pub image: Option<String>,
    pub price: String,
    pub address: String,
    pub beds: String,
    pub area: String,
    pub views_no: Option<String>,
    pub submitter: Option<String>,
    pub ads: Option<String>,
    pub membership: Option<String>,
    pub phone: Option<String>,
    pub relative_date: Option<String>,
    pub date_published: Option<String>,
}

impl Default for DetailFields {
    fn default() -> Self {
        Self {
            image: None,
            price: crate::scraper::cleaner::FALLBACK_PRICE.to_string(),
            address: crate::scraper::cleaner::FALLBACK_ADDRESS.to_string(),
            beds: crate::scraper::cleaner::FALLBACK_BEDS.to_string(),
            area: crate::scraper::cleaner::FALLBACK_AREA.to_string(),
            views_no: None,
            submitter: None,
            ads: None,
            membership: None,
            phone: None,
            relative_date: None,
            date_published: None,
        }
    }
}

// ── Category ──────────────────────────────────────────────────────────────────

/// A named search facet with its paginated URL template (`{}` is the page
/// index placeholder) and how many pages of it to walk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub name: String,
    pub url_template: String,
    pub pages: u32,
}

impl Category {
    pub fn new(name: &str, url_template: &str, pages: u32) -> Self {
        Self {
            name: name.to_string(),
            url_template: url_template.to_string(),
            pages,
        }
    }

    /// Format the URL for a 1-based page index.
    pub fn page_url(&self, page: u32) -> String {
        self.url_template.replace("{}", &page.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_url() {
        let cat = Category::new(
            "House for Sale",
            "https://www.q84sale.com/en/property/for-sale/house-for-sale/{}",
            5,
        );
        assert_eq!(
            cat.page_url(3),
            "https://www.q84sale.com/en/property/for-sale/house-for-sale/3"
        );
    }

    #[test]
    fn test_empty_detail_fields_carry_fallbacks() {
        let d = DetailFields::default();
        assert_eq!(d.price, "0 KWD");
        assert_eq!(d.address, "Not Mentioned");
        assert_eq!(d.beds, "0 Bed");
        assert_eq!(d.area, "0 m2");
        assert_eq!(d.ads, None);
        assert_eq!(d.phone, None);
    }

    #[test]
    fn test_assemble_takes_id_from_link() {
        let card = CardFields {
            link: "https://www.q84sale.com/en/property/some-house-12345".to_string(),
            listing_type: Some("House for Sale".to_string()),
            title: Some("Nice house".to_string()),
            description: None,
            pin: PinStatus::NotPinned,
        };
        let record = ListingRecord::assemble(card, DetailFields::default());
        assert_eq!(record.id.as_deref(), Some("12345"));
        assert_eq!(record.price, "0 KWD");
        assert_eq!(record.title.as_deref(), Some("Nice house"));
    }
}
