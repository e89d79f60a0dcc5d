//! Platform extractors
//!
//! Each platform hides its own mix of HTML scraping, JSON lookup and scripted
//! browsing behind [`PlatformExtractor`]. Page parsing is kept in pure
//! functions over markup so it can be exercised without a network.

pub mod html;
pub mod structured;

mod amazon;
mod apple;
mod google_play;

pub use amazon::AmazonExtractor;
pub use apple::AppleAppStoreExtractor;
pub use google_play::GooglePlayExtractor;

use crate::error::ExtractError;
use crate::record::{RawAppRecord, RawReview, StorePlatform};

/// Capability contract every platform implements
pub trait PlatformExtractor {
    fn platform(&self) -> StorePlatform;

    /// One listing. `Ok(None)` means the platform knows no such app.
    fn fetch_listing(&self, app_id: &str) -> Result<Option<RawAppRecord>, ExtractError>;

    /// Up to `limit` reviews, fetched fresh on every call
    fn fetch_reviews(&self, app_id: &str, limit: usize) -> Result<Vec<RawReview>, ExtractError>;
}

/// Blocking GET returning the response body as text
pub(crate) fn fetch_text(agent: &ureq::Agent, url: &str) -> Result<String, ExtractError> {
    let response = agent.get(url).call().map_err(|e| ExtractError::http(url, e))?;
    if !response.status().is_success() {
        return Err(ExtractError::http(url, format!("HTTP {}", response.status())));
    }
    response
        .into_body()
        .read_to_string()
        .map_err(|e| ExtractError::http(url, e))
}

/// Build a URL with query parameters
pub(crate) fn url_with_params(base: &str, params: &[(&str, &str)]) -> Result<String, ExtractError> {
    url::Url::parse_with_params(base, params)
        .map(String::from)
        .map_err(|e| ExtractError::http(base, e))
}
