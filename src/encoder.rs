//! Feature encoding against a frozen vocabulary
//!
//! Training discovers every `app_type` and `store` value and freezes them,
//! sorted, into a [`FeatureSchema`]. Inference encodes against that schema
//! only: an unseen category leaves its one-hot group at zero and is reported
//! back as an [`UnrecognizedValue`], never added as a column.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;

use crate::error::{PipelineError, Result};
use crate::record::CanonicalAppRecord;

/// Numeric columns in vector order
pub const NUMERIC_COLUMNS: [&str; 3] = ["app_size_mb", "price_usd", "downloads"];

const APP_TYPE_PREFIX: &str = "app_type_";
const STORE_PREFIX: &str = "store_";

/// Column layout shared by training and every later prediction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub numeric_columns: Vec<String>,
    pub app_types: Vec<String>,
    pub stores: Vec<String>,
}

impl FeatureSchema {
    pub fn width(&self) -> usize {
        self.numeric_columns.len() + self.app_types.len() + self.stores.len()
    }

    pub fn column_names(&self) -> Vec<String> {
        let mut names = self.numeric_columns.clone();
        names.extend(self.app_types.iter().map(|t| format!("{APP_TYPE_PREFIX}{t}")));
        names.extend(self.stores.iter().map(|s| format!("{STORE_PREFIX}{s}")));
        names
    }

    /// Reject schemas naming numeric columns the encoder cannot fill
    pub fn validate(&self) -> Result<()> {
        match self
            .numeric_columns
            .iter()
            .find(|c| !NUMERIC_COLUMNS.contains(&c.as_str()))
        {
            Some(unknown) => Err(PipelineError::UnknownNumericColumn(unknown.clone())),
            None => Ok(()),
        }
    }

    fn app_type_offset(&self) -> usize {
        self.numeric_columns.len()
    }

    fn store_offset(&self) -> usize {
        self.numeric_columns.len() + self.app_types.len()
    }

    /// The `app_type` whose one-hot column is set, if any.
    ///
    /// Returns the vocabulary key, which is trimmed and lowercased, so `" Social"`
    /// decodes as `"social"`.
    pub fn decode_app_type<'a>(&'a self, vector: &FeatureVector) -> Option<&'a str> {
        decode_group(&self.app_types, vector.0.get(self.app_type_offset()..)?)
    }

    /// The store whose one-hot column is set, if any
    pub fn decode_store<'a>(&'a self, vector: &FeatureVector) -> Option<&'a str> {
        decode_group(&self.stores, vector.0.get(self.store_offset()..)?)
    }
}

fn decode_group<'a>(vocabulary: &'a [String], values: &[f64]) -> Option<&'a str> {
    vocabulary
        .iter()
        .zip(values)
        .find(|(_, v)| **v == 1.0)
        .map(|(name, _)| name.as_str())
}

/// One encoded row, laid out per its schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub Vec<f64>);

impl FeatureVector {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// The six fields the encoder reads
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureInput {
    pub app_size_mb: f64,
    pub price_usd: f64,
    pub downloads: f64,
    pub app_type: String,
    pub store: String,
}

impl FeatureInput {
    fn numeric(&self, column: &str) -> Option<f64> {
        match column {
            "app_size_mb" => Some(self.app_size_mb),
            "price_usd" => Some(self.price_usd),
            "downloads" => Some(self.downloads),
            _ => None,
        }
    }
}

impl From<&CanonicalAppRecord> for FeatureInput {
    fn from(record: &CanonicalAppRecord) -> Self {
        Self {
            app_size_mb: record.app_size_mb,
            price_usd: record.price_usd,
            downloads: record.downloads as f64,
            app_type: record.app_type.clone(),
            store: record.store.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureGroup {
    AppType,
    Store,
}

/// A categorical value outside the frozen vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnrecognizedValue {
    pub group: FeatureGroup,
    pub value: String,
}

impl fmt::Display for UnrecognizedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let group = match self.group {
            FeatureGroup::AppType => "app_type",
            FeatureGroup::Store => "store",
        };
        write!(f, "unrecognized {group} `{}`", self.value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodedFeatures {
    pub vector: FeatureVector,
    pub unrecognized: Vec<UnrecognizedValue>,
}

fn category_key(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Discover the vocabulary from `records` and encode all of them
pub fn fit_transform(records: &[CanonicalAppRecord]) -> Result<(Vec<FeatureVector>, FeatureSchema)> {
    if records.is_empty() {
        return Err(PipelineError::EmptyDataset);
    }

    let app_types: BTreeSet<String> = records.iter().map(|r| category_key(&r.app_type)).collect();
    let stores: BTreeSet<String> = records.iter().map(|r| r.store.as_str().to_string()).collect();
    let schema = FeatureSchema {
        numeric_columns: NUMERIC_COLUMNS.iter().map(|c| c.to_string()).collect(),
        app_types: app_types.into_iter().collect(),
        stores: stores.into_iter().collect(),
    };

    let vectors = records
        .iter()
        .map(|r| transform(&FeatureInput::from(r), &schema).vector)
        .collect();
    Ok((vectors, schema))
}

/// Encode one input against a frozen schema.
///
/// Unknown numeric columns in the schema encode as 0.0; call
/// [`FeatureSchema::validate`] when loading a schema to rule them out.
pub fn transform(input: &FeatureInput, schema: &FeatureSchema) -> EncodedFeatures {
    let mut values = vec![0.0; schema.width()];
    let mut unrecognized = Vec::new();

    for (slot, column) in values.iter_mut().zip(&schema.numeric_columns) {
        *slot = input.numeric(column).unwrap_or(0.0);
    }

    let groups = [
        (FeatureGroup::AppType, &schema.app_types, schema.app_type_offset(), &input.app_type),
        (FeatureGroup::Store, &schema.stores, schema.store_offset(), &input.store),
    ];
    for (group, vocabulary, offset, value) in groups {
        let key = category_key(value);
        match vocabulary.iter().position(|v| *v == key) {
            Some(index) => values[offset + index] = 1.0,
            None => {
                let value = UnrecognizedValue {
                    group,
                    value: value.clone(),
                };
                warn!("{value}; its one-hot group is left at zero");
                unrecognized.push(value);
            }
        }
    }

    EncodedFeatures {
        vector: FeatureVector(values),
        unrecognized,
    }
}
