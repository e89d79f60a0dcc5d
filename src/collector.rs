//! Collection over a list of app identifiers
//!
//! A collector drives one extractor sequentially, drops apps whose extraction
//! fails and appends what it got to `<data_dir>/<store>/`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::extractors::PlatformExtractor;
use crate::record::{RawAppRecord, RawReview, StorePlatform};
use crate::storage;

pub const LISTINGS_FILE: &str = "apps.csv";

/// Well-known apps used when no identifiers are given
pub fn default_app_ids(store: StorePlatform) -> Vec<String> {
    let ids: &[&str] = match store {
        StorePlatform::GooglePlay => &[
            "com.whatsapp",
            "com.facebook.katana",
            "com.instagram.android",
            "com.spotify.music",
            "com.netflix.mediaclient",
        ],
        StorePlatform::Apple => &["310633997", "284882215", "389801252", "324684580", "363590051"],
        StorePlatform::Amazon => &["B00YVBFAZG", "B0094BB4TW", "B00387DT2A", "B004DTBKRO", "B005ZXWMUS"],
    };
    ids.iter().map(|s| s.to_string()).collect()
}

pub struct Collector {
    extractor: Box<dyn PlatformExtractor>,
    max_apps: usize,
    review_limit: usize,
    output_dir: PathBuf,
}

impl Collector {
    pub fn new(extractor: Box<dyn PlatformExtractor>, config: &PipelineConfig) -> Self {
        let output_dir = config.data_dir.join(extractor.platform().as_str());
        Self {
            extractor,
            max_apps: config.max_apps_per_platform,
            review_limit: config.review_limit,
            output_dir,
        }
    }

    pub fn platform(&self) -> StorePlatform {
        self.extractor.platform()
    }

    pub fn listings_path(&self) -> PathBuf {
        self.output_dir.join(LISTINGS_FILE)
    }

    pub fn reviews_path(&self, app_id: &str) -> PathBuf {
        let safe: String = app_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        self.output_dir.join(format!("reviews_{safe}.csv"))
    }

    /// Fetch listings for at most `max_apps_per_platform` identifiers.
    ///
    /// One entry is dropped per failed or unknown app. If the batch cannot be
    /// saved the result is empty.
    pub fn collect_listings(&self, app_ids: &[String]) -> Vec<RawAppRecord> {
        let store = self.platform();
        info!(%store, requested = app_ids.len(), cap = self.max_apps, "collecting listings");

        let mut records = Vec::new();
        for app_id in app_ids.iter().take(self.max_apps) {
            match self.extractor.fetch_listing(app_id) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => warn!(%store, %app_id, "no listing found"),
                Err(e) => error!(%store, %app_id, error = %e, "error collecting listing"),
            }
        }

        let path = self.listings_path();
        match storage::append_rows(&path, &records) {
            Ok(()) => {
                info!(%store, saved = records.len(), path = %path.display(), "saved listings");
                records
            }
            Err(e) => {
                error!(%store, error = %e, "error saving listings");
                Vec::new()
            }
        }
    }

    /// Fetch and save up to `review_limit` reviews for one app
    pub fn collect_reviews(&self, app_id: &str) -> Vec<RawReview> {
        let store = self.platform();
        info!(%store, %app_id, "collecting reviews");

        let reviews = match self.extractor.fetch_reviews(app_id, self.review_limit) {
            Ok(reviews) => reviews,
            Err(e) => {
                error!(%store, %app_id, error = %e, "error collecting reviews");
                return Vec::new();
            }
        };

        let path = self.reviews_path(app_id);
        match storage::append_rows(&path, &reviews) {
            Ok(()) => {
                info!(%store, %app_id, saved = reviews.len(), "saved reviews");
                reviews
            }
            Err(e) => {
                error!(%store, %app_id, error = %e, "error saving reviews");
                Vec::new()
            }
        }
    }
}

/// Output of a multi-platform collection run
#[derive(Debug, Default)]
pub struct CollectionRun {
    pub listings: BTreeMap<StorePlatform, Vec<RawAppRecord>>,
    pub reviews: BTreeMap<StorePlatform, Vec<RawReview>>,
}

/// Run each collector in turn over its identifiers.
///
/// Stores missing from `app_ids` fall back to [`default_app_ids`].
pub fn collect_all(
    collectors: &[Collector],
    app_ids: &BTreeMap<StorePlatform, Vec<String>>,
    with_reviews: bool,
) -> CollectionRun {
    let mut run = CollectionRun::default();

    for collector in collectors {
        let store = collector.platform();
        let ids = app_ids
            .get(&store)
            .cloned()
            .unwrap_or_else(|| default_app_ids(store));

        let listings = collector.collect_listings(&ids);
        if with_reviews {
            let reviews = run.reviews.entry(store).or_default();
            for record in &listings {
                reviews.extend(collector.collect_reviews(&record.app_id));
            }
        }
        run.listings.insert(store, listings);
    }

    run
}
