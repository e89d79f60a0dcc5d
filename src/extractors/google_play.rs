//! Google Play
//!
//! Listings are scraped from the details page: `itemprop` microdata first,
//! the `SoftwareApplication` JSON-LD block as fallback. Reviews load on
//! scroll and need a browser session.

use scraper::{ElementRef, Html};
use tracing::debug;

use super::html::{self, first_attr, first_text, labelled_value};
use super::structured::JsonLd;
use super::{fetch_text, url_with_params, PlatformExtractor};
use crate::browser::{scrape_reviews, BrowserLauncher, ReviewPage, WaitPolicy};
use crate::config::PipelineConfig;
use crate::error::ExtractError;
use crate::record::{RawAppRecord, RawReview, StorePlatform};
use crate::units::{parse_count, parse_downloads, parse_price_usd, parse_size_mb};

const DETAILS_URL: &str = "https://play.google.com/store/apps/details";
const APP_TYPES: [&str; 3] = ["SoftwareApplication", "MobileApplication", "VideoGame"];

const REVIEW: &str = r#"[jsname="fk8dgd"]"#;
const REVIEW_TEXT: &str = r#"[jsname="bN97Pc"]"#;
const REVIEW_STARS: &str = r#"span[aria-label="Rated"] > span"#;

pub struct GooglePlayExtractor {
    agent: ureq::Agent,
    browser: Box<dyn BrowserLauncher>,
    wait: WaitPolicy,
}

impl GooglePlayExtractor {
    pub fn new(config: &PipelineConfig, browser: Box<dyn BrowserLauncher>) -> Self {
        Self {
            agent: config.http_agent(),
            browser,
            wait: WaitPolicy::from_config(config),
        }
    }
}

impl PlatformExtractor for GooglePlayExtractor {
    fn platform(&self) -> StorePlatform {
        StorePlatform::GooglePlay
    }

    fn fetch_listing(&self, app_id: &str) -> Result<Option<RawAppRecord>, ExtractError> {
        let url = url_with_params(DETAILS_URL, &[("id", app_id), ("hl", "en_US")])?;
        let page = fetch_text(&self.agent, &url)?;
        Ok(Some(parse_listing(&page, app_id)))
    }

    fn fetch_reviews(&self, app_id: &str, limit: usize) -> Result<Vec<RawReview>, ExtractError> {
        let url = url_with_params(DETAILS_URL, &[("id", app_id), ("showAllReviews", "true")])?;
        let page = ReviewPage {
            url: &url,
            ready_selector: REVIEW,
            infinite_scroll: true,
        };
        scrape_reviews(self.browser.as_ref(), page, limit, self.wait, |source| {
            parse_reviews(source, app_id)
        })
    }
}

/// Parse a details page. Every field degrades to zero/empty on its own.
pub fn parse_listing(page: &str, app_id: &str) -> RawAppRecord {
    let document = Html::parse_document(page);
    let jsonld = JsonLd::from_document(&document);

    let name = first_text(&document, "h1")
        .filter(|s| !s.is_empty())
        .or_else(|| jsonld.text_at(&APP_TYPES, "name"))
        .unwrap_or_default();

    let category = first_text(&document, r#"[itemprop="genre"]"#)
        .or_else(|| jsonld.text_at(&APP_TYPES, "applicationCategory"))
        .unwrap_or_default();

    let rating = first_attr(&document, r#"[itemprop="ratingValue"]"#, "content")
        .or_else(|| jsonld.text_at(&APP_TYPES, "aggregateRating.ratingValue"))
        .and_then(|s| s.trim().parse::<f64>().ok())
        .unwrap_or(0.0);

    let review_count = first_attr(&document, r#"[itemprop="reviewCount"]"#, "content")
        .or_else(|| jsonld.text_at(&APP_TYPES, "aggregateRating.ratingCount"))
        .and_then(|s| parse_count(&s))
        .unwrap_or(0);

    let size_mb = labelled_value(&document, "Size")
        .and_then(|s| parse_size_mb(&s))
        .unwrap_or(0.0);

    let price_usd = first_attr(&document, r#"[itemprop="price"]"#, "content")
        .or_else(|| jsonld.text_at(&APP_TYPES, "offers.price"))
        .and_then(|s| parse_price_usd(&s))
        .unwrap_or(0.0);

    let downloads = labelled_value(&document, "Downloads")
        .or_else(|| labelled_value(&document, "Installs"))
        .and_then(|s| parse_downloads(&s))
        .unwrap_or(0);

    let version = labelled_value(&document, "Current Version")
        .or_else(|| labelled_value(&document, "Version"));

    debug!(app_id, %name, "parsed google play listing");

    RawAppRecord {
        source_platform: StorePlatform::GooglePlay,
        app_id: app_id.to_string(),
        name,
        category,
        rating,
        review_count,
        size_mb,
        price_usd,
        downloads,
        version,
    }
}

/// Parse every review rendered so far
pub fn parse_reviews(page: &str, app_id: &str) -> Vec<RawReview> {
    let document = Html::parse_document(page);
    let Some(selector) = html::selector(REVIEW) else {
        return vec![];
    };

    document
        .select(&selector)
        .map(|el| RawReview {
            app_id: app_id.to_string(),
            text: html::child_text(el, REVIEW_TEXT).unwrap_or_default(),
            rating: html::child_count(el, REVIEW_STARS).min(5) as u8,
            date: review_date(el).unwrap_or_default(),
        })
        .collect()
}

/// Date sits in the review's first direct `div` child
fn review_date(el: ElementRef<'_>) -> Option<String> {
    el.children()
        .filter_map(ElementRef::wrap)
        .find(|child| child.value().name() == "div")
        .map(|child| child.text().collect::<String>().trim().to_string())
}
