//! Apple App Store
//!
//! Listings come from the iTunes lookup API (JSON, no scraping). The API
//! carries no review text, so reviews are scraped from the public listing
//! page in a browser session.

use scraper::Html;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::html;
use super::structured::value_f64;
use super::{fetch_text, url_with_params, PlatformExtractor};
use crate::browser::{scrape_reviews, BrowserLauncher, ReviewPage, WaitPolicy};
use crate::config::PipelineConfig;
use crate::error::ExtractError;
use crate::record::{RawAppRecord, RawReview, StorePlatform};
use crate::units::parse_rating;

const LOOKUP_URL: &str = "https://itunes.apple.com/lookup";
const LISTING_URL: &str = "https://apps.apple.com/us/app";

const REVIEW: &str = ".we-customer-review";
const REVIEW_BODY: &str = ".we-customer-review__body";
const REVIEW_DATE: &str = ".we-customer-review__date";
const REVIEW_STAR_RATING: &str = ".we-star-rating";
const REVIEW_FILLED_STAR: &str = ".we-star-rating-stars-outlines";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupResponse {
    result_count: usize,
    #[serde(default)]
    results: Vec<LookupResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupResult {
    track_id: u64,
    #[serde(default)]
    track_name: String,
    #[serde(default)]
    primary_genre_name: String,
    #[serde(default)]
    average_user_rating: Option<f64>,
    #[serde(default)]
    user_rating_count: Option<u64>,
    /// Sent as a string by the API
    #[serde(default)]
    file_size_bytes: Option<Value>,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    version: Option<String>,
}

pub struct AppleAppStoreExtractor {
    agent: ureq::Agent,
    browser: Box<dyn BrowserLauncher>,
    wait: WaitPolicy,
}

impl AppleAppStoreExtractor {
    pub fn new(config: &PipelineConfig, browser: Box<dyn BrowserLauncher>) -> Self {
        Self {
            agent: config.http_agent(),
            browser,
            wait: WaitPolicy::from_config(config),
        }
    }
}

impl PlatformExtractor for AppleAppStoreExtractor {
    fn platform(&self) -> StorePlatform {
        StorePlatform::Apple
    }

    fn fetch_listing(&self, app_id: &str) -> Result<Option<RawAppRecord>, ExtractError> {
        let url = url_with_params(LOOKUP_URL, &[("id", app_id), ("entity", "software")])?;
        let body = fetch_text(&self.agent, &url)?;
        parse_lookup(&body).map_err(|e| ExtractError::Json {
            url,
            message: e.to_string(),
        })
    }

    fn fetch_reviews(&self, app_id: &str, limit: usize) -> Result<Vec<RawReview>, ExtractError> {
        let url = format!("{LISTING_URL}/id{app_id}");
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

/// Parse a lookup payload; zero results is `None`
pub fn parse_lookup(body: &str) -> Result<Option<RawAppRecord>, serde_json::Error> {
    let response: LookupResponse = serde_json::from_str(body)?;
    if response.result_count == 0 {
        return Ok(None);
    }
    let Some(result) = response.results.into_iter().next() else {
        return Ok(None);
    };

    let size_mb = result
        .file_size_bytes
        .as_ref()
        .and_then(value_f64)
        .map(|bytes| bytes / (1024.0 * 1024.0))
        .unwrap_or(0.0);

    debug!(track_id = result.track_id, name = %result.track_name, "parsed apple lookup");

    Ok(Some(RawAppRecord {
        source_platform: StorePlatform::Apple,
        app_id: result.track_id.to_string(),
        name: result.track_name,
        category: result.primary_genre_name,
        rating: result.average_user_rating.unwrap_or(0.0),
        review_count: result.user_rating_count.unwrap_or(0),
        size_mb,
        price_usd: result.price.unwrap_or(0.0),
        // not published by Apple
        downloads: 0,
        version: result.version,
    }))
}

/// Parse customer reviews from the listing page
pub fn parse_reviews(page: &str, app_id: &str) -> Vec<RawReview> {
    let document = Html::parse_document(page);
    let Some(selector) = html::selector(REVIEW) else {
        return vec![];
    };

    document
        .select(&selector)
        .map(|el| {
            // "4 out of 5" label when present, otherwise count the filled stars
            let rating = html::child_attr(el, REVIEW_STAR_RATING, "aria-label")
                .and_then(|label| parse_rating(&label))
                .map(|r| r.round() as usize)
                .unwrap_or_else(|| html::child_count(el, REVIEW_FILLED_STAR));

            RawReview {
                app_id: app_id.to_string(),
                text: html::child_text(el, REVIEW_BODY).unwrap_or_default(),
                rating: rating.min(5) as u8,
                date: html::child_text(el, REVIEW_DATE).unwrap_or_default(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::testing::{instant_policy, ScriptedLauncher};

    #[test]
    fn test_parse_lookup() {
        let body = r#"{
            "resultCount": 1,
            "results": [{
                "trackId": 310633997,
                "trackName": "WhatsApp Messenger",
                "primaryGenreName": "Social Networking",
                "averageUserRating": 4.7,
                "userRatingCount": 11000000,
                "fileSizeBytes": "262144000",
                "price": 0.0,
                "version": "24.2.75"
            }]
        }"#;

        let record = parse_lookup(body).unwrap().unwrap();
        assert_eq!(record.app_id, "310633997");
        assert_eq!(record.name, "WhatsApp Messenger");
        assert_eq!(record.category, "Social Networking");
        assert_eq!(record.rating, 4.7);
        assert_eq!(record.review_count, 11_000_000);
        assert_eq!(record.size_mb, 250.0);
        assert_eq!(record.downloads, 0);
        assert_eq!(record.version.as_deref(), Some("24.2.75"));
    }

    #[test]
    fn test_parse_lookup_no_results() {
        assert_eq!(parse_lookup(r#"{"resultCount": 0, "results": []}"#).unwrap(), None);
    }

    #[test]
    fn test_parse_lookup_missing_optional_fields() {
        let body = r#"{"resultCount": 1, "results": [{"trackId": 42}]}"#;
        let record = parse_lookup(body).unwrap().unwrap();
        assert_eq!(record.app_id, "42");
        assert_eq!(record.rating, 0.0);
        assert_eq!(record.size_mb, 0.0);
        assert_eq!(record.price_usd, 0.0);
    }

    #[test]
    fn test_parse_lookup_malformed() {
        assert!(parse_lookup("<html>rate limited</html>").is_err());
    }

    const REVIEWS: &str = r#"
    <html><body>
        <div class="we-customer-review">
            <figure class="we-star-rating" aria-label="4 out of 5"></figure>
            <time class="we-customer-review__date">01/02/2024</time>
            <blockquote class="we-customer-review__body"><p>Solid messenger</p></blockquote>
        </div>
        <div class="we-customer-review">
            <span class="we-star-rating-stars-outlines"></span>
            <span class="we-star-rating-stars-outlines"></span>
            <time class="we-customer-review__date">03/02/2024</time>
            <blockquote class="we-customer-review__body"><p>Meh</p></blockquote>
        </div>
    </body></html>
    "#;

    #[test]
    fn test_parse_reviews() {
        let reviews = parse_reviews(REVIEWS, "310633997");
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].rating, 4);
        assert_eq!(reviews[0].text, "Solid messenger");
        assert_eq!(reviews[0].date, "01/02/2024");
        assert_eq!(reviews[1].rating, 2);
    }

    #[test]
    fn test_fetch_reviews_respects_limit() {
        let launcher = ScriptedLauncher::new(vec![REVIEWS.to_string()]);
        let log = std::rc::Rc::clone(&launcher.log);
        let extractor = AppleAppStoreExtractor {
            agent: PipelineConfig::default().http_agent(),
            browser: Box::new(launcher),
            wait: instant_policy(),
        };

        let reviews = extractor.fetch_reviews("310633997", 1).unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(log.borrow().visited, vec!["https://apps.apple.com/us/app/id310633997"]);
        assert_eq!(log.borrow().closed, 1);
    }
}
