//! Amazon App Store
//!
//! Both listings and reviews are scraped. The category is the most specific
//! breadcrumb; Amazon publishes no install counts.

use scraper::Html;
use tracing::debug;

use super::html::{self, first_text, labelled_value};
use super::{fetch_text, PlatformExtractor};
use crate::browser::{scrape_reviews, BrowserLauncher, ReviewPage, WaitPolicy};
use crate::config::PipelineConfig;
use crate::error::ExtractError;
use crate::record::{RawAppRecord, RawReview, StorePlatform};
use crate::units::{parse_count, parse_price_usd, parse_rating, parse_size_mb};

const PRODUCT_URL: &str = "https://www.amazon.com/gp/product";

const BREADCRUMBS: &str = "#wayfinding-breadcrumbs_container a";
const REVIEW: &str = r#"[data-hook="review"]"#;
const REVIEW_BODY: &str = r#"[data-hook="review-body"]"#;
const REVIEW_STARS: &str = r#"[data-hook="review-star-rating"]"#;
const REVIEW_DATE: &str = r#"[data-hook="review-date"]"#;

pub struct AmazonExtractor {
    agent: ureq::Agent,
    browser: Box<dyn BrowserLauncher>,
    wait: WaitPolicy,
}

impl AmazonExtractor {
    pub fn new(config: &PipelineConfig, browser: Box<dyn BrowserLauncher>) -> Self {
        Self {
            agent: config.http_agent(),
            browser,
            wait: WaitPolicy::from_config(config),
        }
    }
}

impl PlatformExtractor for AmazonExtractor {
    fn platform(&self) -> StorePlatform {
        StorePlatform::Amazon
    }

    fn fetch_listing(&self, app_id: &str) -> Result<Option<RawAppRecord>, ExtractError> {
        let page = fetch_text(&self.agent, &format!("{PRODUCT_URL}/{app_id}"))?;
        Ok(Some(parse_listing(&page, app_id)))
    }

    fn fetch_reviews(&self, app_id: &str, limit: usize) -> Result<Vec<RawReview>, ExtractError> {
        let url = format!("{PRODUCT_URL}/{app_id}/reviews");
        let page = ReviewPage {
            url: &url,
            ready_selector: REVIEW,
            infinite_scroll: false,
        };
        scrape_reviews(self.browser.as_ref(), page, limit, self.wait, |source| {
            parse_reviews(source, app_id)
        })
    }
}

/// Parse a product page. Every field degrades to zero/empty on its own.
pub fn parse_listing(page: &str, app_id: &str) -> RawAppRecord {
    let document = Html::parse_document(page);

    let name = first_text(&document, "#productTitle").unwrap_or_default();

    let category = html::all_text(&document, BREADCRUMBS)
        .into_iter()
        .rev()
        .find(|crumb| !crumb.is_empty())
        .unwrap_or_default();

    let rating = first_text(&document, r#"[data-hook="rating-out-of-text"]"#)
        .and_then(|s| parse_rating(&s))
        .unwrap_or(0.0);

    let review_count = first_text(&document, r#"[data-hook="total-review-count"]"#)
        .and_then(|s| parse_count(&s))
        .unwrap_or(0);

    let size_mb = labelled_value(&document, "File Size")
        .and_then(|s| parse_size_mb(&s))
        .unwrap_or(0.0);

    // The offscreen label carries the whole price; `.a-price-whole` only the dollars
    let price_usd = first_text(&document, ".a-price .a-offscreen")
        .or_else(|| first_text(&document, ".a-price-whole"))
        .and_then(|s| parse_price_usd(&s))
        .unwrap_or(0.0);

    let version = labelled_value(&document, "Version");

    debug!(app_id, %name, %category, "parsed amazon listing");

    RawAppRecord {
        source_platform: StorePlatform::Amazon,
        app_id: app_id.to_string(),
        name,
        category,
        rating,
        review_count,
        size_mb,
        price_usd,
        downloads: 0,
        version,
    }
}

/// Parse reviews; star text reads like "4.0 out of 5 stars"
pub fn parse_reviews(page: &str, app_id: &str) -> Vec<RawReview> {
    let document = Html::parse_document(page);
    let Some(selector) = html::selector(REVIEW) else {
        return vec![];
    };

    document
        .select(&selector)
        .map(|el| {
            let rating = html::child_text(el, REVIEW_STARS)
                .and_then(|s| parse_rating(&s))
                .map(|r| r.trunc().clamp(0.0, 5.0) as u8)
                .unwrap_or(0);

            RawReview {
                app_id: app_id.to_string(),
                text: html::child_text(el, REVIEW_BODY).unwrap_or_default(),
                rating,
                date: html::child_text(el, REVIEW_DATE).unwrap_or_default(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
    <html><body>
        <div id="wayfinding-breadcrumbs_container">
            <ul>
                <li><a href="/apps">Apps &amp; Games</a></li>
                <li><a href="/apps/social">Social</a></li>
                <li><a href="/apps/social/messaging">Messaging</a></li>
            </ul>
        </div>
        <span id="productTitle"> Netflix </span>
        <span data-hook="rating-out-of-text">4.5 out of 5</span>
        <span data-hook="total-review-count">12,345</span>
        <span class="a-price"><span class="a-offscreen">$4.99</span><span class="a-price-whole">4.</span></span>
        <table>
            <tr><td>File Size</td><td>1.5 GB</td></tr>
            <tr><td>Version</td><td>8.101.0</td></tr>
        </table>
    </body></html>
    "#;

    #[test]
    fn test_parse_listing() {
        let record = parse_listing(LISTING, "B005ZXWMUS");

        assert_eq!(record.source_platform, StorePlatform::Amazon);
        assert_eq!(record.name, "Netflix");
        assert_eq!(record.category, "Messaging");
        assert_eq!(record.rating, 4.5);
        assert_eq!(record.review_count, 12_345);
        assert_eq!(record.size_mb, 1536.0);
        assert_eq!(record.price_usd, 4.99);
        assert_eq!(record.downloads, 0);
        assert_eq!(record.version.as_deref(), Some("8.101.0"));
    }

    #[test]
    fn test_parse_listing_without_breadcrumbs() {
        let record = parse_listing("<html><body><span id=\"productTitle\">X</span></body></html>", "B0");
        assert_eq!(record.name, "X");
        assert_eq!(record.category, "");
        assert_eq!(record.price_usd, 0.0);
    }

    #[test]
    fn test_parse_reviews() {
        let page = r#"
        <div data-hook="review">
            <i data-hook="review-star-rating"><span>4.0 out of 5 stars</span></i>
            <span data-hook="review-date">Reviewed in the United States on May 3, 2024</span>
            <span data-hook="review-body"><span>Works on my Fire tablet</span></span>
        </div>
        <div data-hook="review">
            <span data-hook="review-body"><span></span></span>
        </div>
        "#;
        let reviews = parse_reviews(page, "B005ZXWMUS");

        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].rating, 4);
        assert_eq!(reviews[0].text, "Works on my Fire tablet");
        assert!(reviews[0].date.ends_with("May 3, 2024"));
        assert_eq!(reviews[1].rating, 0);
        assert_eq!(reviews[1].text, "");
    }
}
