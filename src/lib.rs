//! App rating prediction pipeline
//!
//! - Collect listings and reviews from Google Play, the Apple App Store and
//!   the Amazon App Store
//! - Normalize the per-store batches into one canonical dataset
//! - Encode canonical records against a frozen feature vocabulary
//! - Train a rating regressor and predict ratings for single apps

pub mod browser;
pub mod collector;
pub mod config;
pub mod encoder;
pub mod error;
pub mod extractors;
pub mod model;
pub mod normalizer;
pub mod predict;
pub mod record;
pub mod stats;
pub mod storage;
pub mod units;

pub use config::PipelineConfig;
pub use encoder::{fit_transform, transform, FeatureSchema, FeatureVector};
pub use error::{ExtractError, PipelineError};
pub use normalizer::normalize;
pub use predict::{Prediction, PredictionRequest, RatingPredictor};
pub use record::{CanonicalAppRecord, RawAppRecord, RawReview, StorePlatform};
