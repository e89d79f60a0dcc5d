//! Dataset summary statistics

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::record::CanonicalAppRecord;

/// Describe-style summary of one numeric column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; 0.0 for fewer than two values
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

impl ColumnSummary {
    pub fn from_values(mut values: Vec<f64>) -> Option<Self> {
        values.retain(|v| v.is_finite());
        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.total_cmp(b));

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = if values.len() > 1 {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        } else {
            0.0
        };

        Some(Self {
            count: values.len(),
            mean,
            std,
            min: values[0],
            q25: quantile(&values, 0.25),
            median: quantile(&values, 0.5),
            q75: quantile(&values, 0.75),
            max: values[values.len() - 1],
        })
    }
}

/// Linear interpolation between closest ranks; `sorted` must be non-empty
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetStats {
    pub total_apps: usize,
    pub apps_by_store: BTreeMap<String, usize>,
    pub apps_by_type: BTreeMap<String, usize>,
    pub price: Option<ColumnSummary>,
    pub rating: Option<ColumnSummary>,
    pub size_mb: Option<ColumnSummary>,
}

impl DatasetStats {
    pub fn from_records(records: &[CanonicalAppRecord]) -> Self {
        let mut apps_by_store = BTreeMap::new();
        let mut apps_by_type = BTreeMap::new();
        for r in records {
            *apps_by_store.entry(r.store.to_string()).or_insert(0) += 1;
            *apps_by_type.entry(r.app_type.clone()).or_insert(0) += 1;
        }

        Self {
            total_apps: records.len(),
            apps_by_store,
            apps_by_type,
            price: ColumnSummary::from_values(records.iter().map(|r| r.price_usd).collect()),
            rating: ColumnSummary::from_values(records.iter().map(|r| r.user_rating).collect()),
            size_mb: ColumnSummary::from_values(records.iter().map(|r| r.app_size_mb).collect()),
        }
    }
}

impl fmt::Display for DatasetStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total apps: {}", self.total_apps)?;
        writeln!(f, "Apps by store:")?;
        for (store, count) in &self.apps_by_store {
            writeln!(f, "  {store}: {count}")?;
        }
        writeln!(f, "Apps by type:")?;
        for (app_type, count) in &self.apps_by_type {
            writeln!(f, "  {app_type}: {count}")?;
        }
        for (label, summary) in [
            ("Price (USD)", &self.price),
            ("Rating", &self.rating),
            ("Size (MB)", &self.size_mb),
        ] {
            if let Some(s) = summary {
                writeln!(
                    f,
                    "{label}: count={} mean={:.2} std={:.2} min={:.2} 25%={:.2} 50%={:.2} 75%={:.2} max={:.2}",
                    s.count, s.mean, s.std, s.min, s.q25, s.median, s.q75, s.max
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::StorePlatform;

    fn record(price: f64, rating: f64, app_type: &str, store: StorePlatform) -> CanonicalAppRecord {
        CanonicalAppRecord {
            app_name: "App".to_string(),
            app_size_mb: 10.0,
            price_usd: price,
            app_type: app_type.to_string(),
            app_version: "1.0".to_string(),
            user_rating: rating,
            downloads: 100,
            store,
        }
    }

    #[test]
    fn test_summary_matches_describe() {
        let s = ColumnSummary::from_values(vec![4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(s.count, 4);
        assert_eq!(s.mean, 2.5);
        assert!((s.std - 1.290_994).abs() < 1e-6);
        assert_eq!((s.min, s.max), (1.0, 4.0));
        assert_eq!(s.q25, 1.75);
        assert_eq!(s.median, 2.5);
        assert_eq!(s.q75, 3.25);
    }

    #[test]
    fn test_summary_of_nothing() {
        assert_eq!(ColumnSummary::from_values(vec![]), None);
        assert_eq!(ColumnSummary::from_values(vec![7.0]).unwrap().std, 0.0);
    }

    #[test]
    fn test_dataset_stats() {
        let records = vec![
            record(0.0, 4.0, "social", StorePlatform::GooglePlay),
            record(2.0, 3.0, "social", StorePlatform::Apple),
            record(4.0, 5.0, "games", StorePlatform::Apple),
        ];
        let stats = DatasetStats::from_records(&records);

        assert_eq!(stats.total_apps, 3);
        assert_eq!(stats.apps_by_store["apple"], 2);
        assert_eq!(stats.apps_by_store["google_play"], 1);
        assert_eq!(stats.apps_by_type["social"], 2);
        assert_eq!(stats.price.as_ref().unwrap().mean, 2.0);
        assert_eq!(stats.rating.as_ref().unwrap().median, 4.0);

        let text = stats.to_string();
        assert!(text.starts_with("Total apps: 3\n"));
        assert!(text.contains("  games: 1"));
    }
}
