//! Record types flowing through the pipeline
//!
//! Raw records are platform-shaped and come straight out of an extractor.
//! Canonical records share one schema across all stores.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Source platform of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorePlatform {
    GooglePlay,
    Apple,
    Amazon,
}

impl StorePlatform {
    pub const ALL: [StorePlatform; 3] = [
        StorePlatform::GooglePlay,
        StorePlatform::Apple,
        StorePlatform::Amazon,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorePlatform::GooglePlay => "google_play",
            StorePlatform::Apple => "apple",
            StorePlatform::Amazon => "amazon",
        }
    }

    /// File name of the dataset-native batch for this store
    pub fn dataset_file(&self) -> &'static str {
        match self {
            StorePlatform::GooglePlay => "google_play_store.csv",
            StorePlatform::Apple => "apple_app_store.csv",
            StorePlatform::Amazon => "amazon_app_store.csv",
        }
    }
}

impl fmt::Display for StorePlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorePlatform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "google_play" | "googleplay" | "google" => Ok(StorePlatform::GooglePlay),
            "apple" | "app_store" | "ios" => Ok(StorePlatform::Apple),
            "amazon" => Ok(StorePlatform::Amazon),
            other => Err(format!("unknown store: {other}")),
        }
    }
}

/// One app listing as a platform reports it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAppRecord {
    pub source_platform: StorePlatform,
    pub app_id: String,
    pub name: String,
    pub category: String,
    /// 0.0 when the platform shows no rating
    pub rating: f64,
    #[serde(rename = "reviews")]
    pub review_count: u64,
    #[serde(rename = "size")]
    pub size_mb: f64,
    #[serde(rename = "price")]
    pub price_usd: f64,
    /// 0 on platforms that do not publish install counts
    pub downloads: u64,
    #[serde(default)]
    pub version: Option<String>,
}

/// One collected review
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawReview {
    pub app_id: String,
    pub text: String,
    /// Filled stars, 0 when unavailable
    pub rating: u8,
    /// Platform-formatted date, kept verbatim
    pub date: String,
}

/// A listing row in the dataset-native column layout.
///
/// Every field is text: unit parsing happens during normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawListingRow {
    #[serde(rename = "App Name")]
    pub app_name: String,
    #[serde(rename = "App Size", default)]
    pub app_size: Option<String>,
    #[serde(rename = "App Price", default)]
    pub app_price: Option<String>,
    #[serde(rename = "Downloads", default)]
    pub downloads: Option<String>,
    #[serde(rename = "App Type", default)]
    pub app_type: Option<String>,
    #[serde(rename = "App Version", default)]
    pub app_version: Option<String>,
    #[serde(rename = "User Rating", default)]
    pub user_rating: Option<String>,
}

impl From<&RawAppRecord> for RawListingRow {
    fn from(record: &RawAppRecord) -> Self {
        let non_empty = |s: &str| {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        };

        let price = if record.price_usd == 0.0 {
            "Free".to_string()
        } else {
            format!("${:.2}", record.price_usd)
        };

        Self {
            app_name: record.name.clone(),
            app_size: (record.size_mb > 0.0).then(|| format!("{} MB", record.size_mb)),
            app_price: Some(price),
            // Platforms without install counts report 0; leave it to the
            // missing-value policy instead of training on a fake zero.
            downloads: (record.downloads > 0).then(|| record.downloads.to_string()),
            app_type: non_empty(&record.category),
            app_version: record.version.as_deref().and_then(non_empty),
            // 0.0 means the store shows no rating yet
            user_rating: (record.rating > 0.0).then(|| record.rating.to_string()),
        }
    }
}

/// Cross-platform normalized listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalAppRecord {
    pub app_name: String,
    pub app_size_mb: f64,
    pub price_usd: f64,
    pub app_type: String,
    pub app_version: String,
    pub user_rating: f64,
    pub downloads: u64,
    pub store: StorePlatform,
}

/// Canonical column order of the persisted dataset
pub const CANONICAL_COLUMNS: [&str; 8] = [
    "app_name",
    "app_size_mb",
    "price_usd",
    "app_type",
    "app_version",
    "user_rating",
    "downloads",
    "store",
];
