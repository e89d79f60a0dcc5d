//! Cross-store schema normalization
//!
//! Each store batch is parsed into canonical units and tagged with its store,
//! then all batches are concatenated in arrival order. Missing values are
//! filled once, on the concatenated table: numeric columns with the median,
//! categorical columns with the mode. The fill statistics therefore mix
//! stores; one store's gaps are filled from every store's values.

use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use crate::collector::LISTINGS_FILE;
use crate::error::Result;
use crate::record::{CanonicalAppRecord, RawAppRecord, RawListingRow, StorePlatform};
use crate::storage;
use crate::units::{parse_downloads, parse_price_usd, parse_size_mb};

/// Fallback when a categorical column has no value in any row
pub const UNKNOWN_CATEGORY: &str = "unknown";

/// One store's rows before missing-value handling
#[derive(Debug, Clone, PartialEq)]
struct PartialRecord {
    app_name: String,
    app_size_mb: Option<f64>,
    price_usd: Option<f64>,
    app_type: Option<String>,
    app_version: Option<String>,
    user_rating: f64,
    downloads: Option<u64>,
    store: StorePlatform,
}

/// Values used to fill gaps, computed over the combined dataset
#[derive(Debug, Clone, PartialEq)]
pub struct FillValues {
    pub app_size_mb: f64,
    pub price_usd: f64,
    pub downloads: u64,
    pub app_type: String,
    pub app_version: String,
}

/// Normalize every store batch into one canonical table
pub fn normalize(batches: &[(StorePlatform, Vec<RawListingRow>)]) -> Vec<CanonicalAppRecord> {
    let partials: Vec<PartialRecord> = batches
        .iter()
        .flat_map(|(store, rows)| normalize_batch(*store, rows))
        .collect();

    let fills = fill_values(&partials);
    info!(
        rows = partials.len(),
        size_fill = fills.app_size_mb,
        price_fill = fills.price_usd,
        downloads_fill = fills.downloads,
        app_type_fill = %fills.app_type,
        "normalized dataset"
    );

    partials
        .into_iter()
        .map(|p| CanonicalAppRecord {
            app_name: p.app_name,
            app_size_mb: p.app_size_mb.unwrap_or(fills.app_size_mb),
            price_usd: p.price_usd.unwrap_or(fills.price_usd),
            app_type: p.app_type.unwrap_or_else(|| fills.app_type.clone()),
            app_version: p.app_version.unwrap_or_else(|| fills.app_version.clone()),
            user_rating: p.user_rating,
            downloads: p.downloads.unwrap_or(fills.downloads),
            store: p.store,
        })
        .collect()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn normalize_batch(store: StorePlatform, rows: &[RawListingRow]) -> Vec<PartialRecord> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(user_rating) = non_empty(&row.user_rating)
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|r| r.is_finite())
        else {
            warn!(%store, app = %row.app_name, "dropping row without a usable rating");
            continue;
        };

        out.push(PartialRecord {
            app_name: row.app_name.trim().to_string(),
            app_size_mb: non_empty(&row.app_size).and_then(parse_size_mb),
            price_usd: non_empty(&row.app_price).and_then(parse_price_usd),
            app_type: non_empty(&row.app_type).map(str::to_lowercase),
            app_version: non_empty(&row.app_version).map(String::from),
            user_rating,
            downloads: non_empty(&row.downloads).and_then(parse_downloads),
            store,
        });
    }
    out
}

fn fill_values(rows: &[PartialRecord]) -> FillValues {
    let numeric_fill = |column: &str, values: Vec<f64>| {
        median(values).unwrap_or_else(|| {
            warn!(column, "no values to take a median from, filling with 0");
            0.0
        })
    };
    let categorical_fill = |column: &str, values: Vec<&str>| {
        mode(values).unwrap_or_else(|| {
            warn!(column, "no values to take a mode from, filling with {UNKNOWN_CATEGORY}");
            UNKNOWN_CATEGORY.to_string()
        })
    };

    FillValues {
        app_size_mb: numeric_fill(
            "app_size_mb",
            rows.iter().filter_map(|r| r.app_size_mb).collect(),
        ),
        price_usd: numeric_fill("price_usd", rows.iter().filter_map(|r| r.price_usd).collect()),
        downloads: numeric_fill(
            "downloads",
            rows.iter().filter_map(|r| r.downloads).map(|d| d as f64).collect(),
        )
        .round() as u64,
        app_type: categorical_fill(
            "app_type",
            rows.iter().filter_map(|r| r.app_type.as_deref()).collect(),
        ),
        app_version: categorical_fill(
            "app_version",
            rows.iter().filter_map(|r| r.app_version.as_deref()).collect(),
        ),
    }
}

/// Median of the values; mean of the middle pair for even counts
pub fn median(mut values: Vec<f64>) -> Option<f64> {
    values.retain(|v| v.is_finite());
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

/// Most frequent value; ties go to the lexicographically smallest
pub fn mode<'a>(values: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v).or_default() += 1;
    }
    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value.to_string())
}

/// Bridge collected records into dataset-native rows
pub fn listing_rows(records: &[RawAppRecord]) -> Vec<RawListingRow> {
    records.iter().map(RawListingRow::from).collect()
}

/// Load every store's dataset-native batch from `dir`.
///
/// Unreadable files are logged and skipped.
pub fn load_store_batches(dir: &Path) -> Vec<(StorePlatform, Vec<RawListingRow>)> {
    let mut batches = Vec::new();
    for store in StorePlatform::ALL {
        let path = dir.join(store.dataset_file());
        match storage::read_rows::<RawListingRow>(&path) {
            Ok(rows) => {
                info!(%store, records = rows.len(), "loaded store batch");
                batches.push((store, rows));
            }
            Err(e) => warn!(%store, error = %e, "error loading store batch"),
        }
    }
    batches
}

/// Load the listings a collection run appended under `data_dir/<store>/`
pub fn load_collected_batches(data_dir: &Path) -> Vec<(StorePlatform, Vec<RawListingRow>)> {
    let mut batches = Vec::new();
    for store in StorePlatform::ALL {
        let path = data_dir.join(store.as_str()).join(LISTINGS_FILE);
        if !path.exists() {
            continue;
        }
        match storage::read_rows::<RawAppRecord>(&path) {
            Ok(records) => {
                info!(%store, records = records.len(), "loaded collected listings");
                batches.push((store, listing_rows(&records)));
            }
            Err(e) => warn!(%store, error = %e, "error loading collected listings"),
        }
    }
    batches
}

pub fn save_canonical(path: &Path, records: &[CanonicalAppRecord]) -> Result<()> {
    storage::write_rows(path, records)
}

pub fn load_canonical(path: &Path) -> Result<Vec<CanonicalAppRecord>> {
    storage::read_rows(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CANONICAL_COLUMNS;

    fn row(name: &str, size: &str, price: &str, downloads: &str, kind: &str, rating: &str) -> RawListingRow {
        let opt = |s: &str| (!s.is_empty()).then(|| s.to_string());
        RawListingRow {
            app_name: name.to_string(),
            app_size: opt(size),
            app_price: opt(price),
            downloads: opt(downloads),
            app_type: opt(kind),
            app_version: Some("1.0".to_string()),
            user_rating: opt(rating),
        }
    }

    #[test]
    fn test_three_platforms_one_row_each() {
        let batches = vec![
            (StorePlatform::GooglePlay, vec![row("Chat", "45 MB", "Free", "10K", "Social", "4.1")]),
            (StorePlatform::Apple, vec![row("Notes", "1.5 GB", "$4.99", "2.3M", "Productivity", "4.6")]),
            (StorePlatform::Amazon, vec![row("Radio", "12 MB", "Free with In-App Purchases", "1B", "MUSIC", "3.9")]),
        ];

        let records = normalize(&batches);
        assert_eq!(records.len(), 3);
        for r in &records {
            assert!(r.app_size_mb.is_finite());
            assert!(r.price_usd.is_finite());
        }

        assert_eq!(records[0].store, StorePlatform::GooglePlay);
        assert_eq!(records[0].app_type, "social");
        assert_eq!(records[0].downloads, 10_000);
        assert_eq!(records[1].app_size_mb, 1536.0);
        assert_eq!(records[1].price_usd, 4.99);
        assert_eq!(records[1].downloads, 2_300_000);
        assert_eq!(records[2].app_type, "music");
        assert_eq!(records[2].price_usd, 0.0);
        assert_eq!(records[2].store, StorePlatform::Amazon);
    }

    #[test]
    fn test_missing_price_filled_with_combined_median() {
        let batches = vec![
            (
                StorePlatform::GooglePlay,
                vec![
                    row("A", "10 MB", "$1.00", "1K", "tools", "4.0"),
                    row("B", "10 MB", "", "1K", "tools", "4.0"),
                ],
            ),
            (
                StorePlatform::Apple,
                vec![
                    row("C", "10 MB", "$3.00", "1K", "tools", "4.0"),
                    row("D", "10 MB", "$8.00", "1K", "tools", "4.0"),
                ],
            ),
        ];

        let records = normalize(&batches);
        // median of 1.00, 3.00, 8.00
        assert_eq!(records[1].price_usd, 3.0);
    }

    #[test]
    fn test_fill_uses_other_stores_values() {
        // Google Play's only size is missing and gets filled from Apple and
        // Amazon rows: fill statistics are global, not per store.
        let batches = vec![
            (StorePlatform::GooglePlay, vec![row("A", "", "Free", "", "", "4.0")]),
            (StorePlatform::Apple, vec![row("B", "100 MB", "Free", "5K", "games", "4.0")]),
            (
                StorePlatform::Amazon,
                vec![
                    row("C", "300 MB", "Free", "7K", "games", "4.0"),
                    row("D", "400 MB", "Free", "9K", "tools", "4.0"),
                ],
            ),
        ];

        let records = normalize(&batches);
        assert_eq!(records[0].store, StorePlatform::GooglePlay);
        assert_eq!(records[0].app_size_mb, 300.0);
        assert_eq!(records[0].downloads, 7_000);
        assert_eq!(records[0].app_type, "games");
    }

    #[test]
    fn test_unparseable_values_become_missing() {
        let batches = vec![(
            StorePlatform::GooglePlay,
            vec![
                row("A", "Varies with device", "Free", "500+", "tools", "4.0"),
                row("B", "20 MB", "Free", "100+", "tools", "4.0"),
                row("C", "40 MB", "Free", "100+", "tools", "not rated"),
            ],
        )];

        let records = normalize(&batches);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].app_size_mb, 20.0);
        assert_eq!(records[0].downloads, 500);
    }

    #[test]
    fn test_all_missing_column_falls_back() {
        let batches = vec![(StorePlatform::Apple, vec![row("A", "", "", "", "", "4.0")])];
        let records = normalize(&batches);
        assert_eq!(records[0].app_size_mb, 0.0);
        assert_eq!(records[0].downloads, 0);
        assert_eq!(records[0].app_type, UNKNOWN_CATEGORY);
    }

    #[test]
    fn test_median_and_mode() {
        assert_eq!(median(vec![3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(vec![4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(vec![]), None);
        assert_eq!(mode(["b", "a", "b", "a", "c"]), Some("a".to_string()));
        assert_eq!(mode(["x", "y", "y"]), Some("y".to_string()));
        assert_eq!(mode(Vec::<&str>::new()), None);
    }

    #[test]
    fn test_canonical_round_trip_through_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("canonical.csv");
        let records = normalize(&[(
            StorePlatform::GooglePlay,
            vec![row("Chat, Inc", "45 MB", "Free", "10K", "Social", "4.1")],
        )]);

        save_canonical(&path, &records).unwrap();
        let header = std::fs::read_to_string(&path).unwrap();
        assert_eq!(header.lines().next().unwrap(), CANONICAL_COLUMNS.join(","));
        assert_eq!(load_canonical(&path).unwrap(), records);
    }

    #[test]
    fn test_collected_listings_feed_normalizer() {
        let dir = tempfile::tempdir().unwrap();
        let record = RawAppRecord {
            source_platform: StorePlatform::Amazon,
            app_id: "B005ZXWMUS".to_string(),
            name: "Netflix".to_string(),
            category: "Entertainment".to_string(),
            rating: 4.5,
            review_count: 100,
            size_mb: 60.0,
            price_usd: 0.0,
            downloads: 0,
            version: None,
        };
        storage::append_rows(&dir.path().join("amazon").join(LISTINGS_FILE), &[record]).unwrap();

        let batches = load_collected_batches(dir.path());
        assert_eq!(batches.len(), 1);

        let records = normalize(&batches);
        assert_eq!(records[0].app_type, "entertainment");
        assert_eq!(records[0].app_size_mb, 60.0);
        assert_eq!(records[0].user_rating, 4.5);
        assert_eq!(records[0].app_version, UNKNOWN_CATEGORY);
    }

    #[test]
    fn test_non_finite_ratings_are_dropped() {
        let batches = vec![(
            StorePlatform::GooglePlay,
            vec![
                row("Nan", "10 MB", "Free", "1K", "Tools", "nan"),
                row("Inf", "10 MB", "Free", "1K", "Tools", "inf"),
                row("NegInf", "10 MB", "Free", "1K", "Tools", "-infinity"),
                row("Kept", "10 MB", "Free", "1K", "Tools", "4.1"),
            ],
        )];

        let records = normalize(&batches);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].app_name, "Kept");
    }

    #[test]
    fn test_unrated_listing_is_dropped() {
        let listing = |name: &str, rating: f64| RawAppRecord {
            source_platform: StorePlatform::Apple,
            app_id: name.to_lowercase(),
            name: name.to_string(),
            category: "Games".to_string(),
            rating,
            review_count: 0,
            size_mb: 80.0,
            price_usd: 0.0,
            downloads: 0,
            version: Some("2.0".to_string()),
        };
        let rows = listing_rows(&[listing("Unrated", 0.0), listing("Rated", 3.8)]);
        assert_eq!(rows[0].user_rating, None);

        let records = normalize(&[(StorePlatform::Apple, rows)]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].app_name, "Rated");
        assert_eq!(records[0].user_rating, 3.8);
    }

    #[test]
    fn test_load_store_batches_skips_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        storage::write_rows(
            &dir.path().join(StorePlatform::Apple.dataset_file()),
            &[row("Notes", "12 MB", "Free", "1K", "Productivity", "4.5")],
        )
        .unwrap();

        let batches = load_store_batches(dir.path());
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].0, StorePlatform::Apple);
        assert_eq!(batches[0].1[0].app_type.as_deref(), Some("Productivity"));
    }
}
