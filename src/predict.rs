//! Single-app rating prediction
//!
//! A [`RatingPredictor`] owns a frozen schema and a model of matching width.
//! It holds no mutable state, so one predictor can serve concurrent callers.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::encoder::{transform, FeatureInput, FeatureSchema, UnrecognizedValue};
use crate::error::{PipelineError, Result};
use crate::model::{ModelBundle, RatingModel};

pub const MIN_RATING: f64 = 1.0;
pub const MAX_RATING: f64 = 5.0;

/// Request as received from an outer handler; absent fields take defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionRequest {
    pub name: String,
    pub app_size_mb: f64,
    pub price_usd: f64,
    pub downloads: u64,
    pub app_type: String,
    pub store: String,
}

impl Default for PredictionRequest {
    fn default() -> Self {
        Self {
            name: "Unknown App".to_string(),
            app_size_mb: 0.0,
            price_usd: 0.0,
            downloads: 0,
            app_type: "productivity".to_string(),
            store: "google_play".to_string(),
        }
    }
}

impl PredictionRequest {
    fn validate(&self) -> Result<()> {
        for (field, value) in [("app_size_mb", self.app_size_mb), ("price_usd", self.price_usd)] {
            if !value.is_finite() || value < 0.0 {
                return Err(PipelineError::InvalidInput(format!(
                    "{field} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }

    fn features(&self) -> FeatureInput {
        FeatureInput {
            app_size_mb: self.app_size_mb,
            price_usd: self.price_usd,
            downloads: self.downloads as f64,
            app_type: self.app_type.clone(),
            store: self.store.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub predicted_rating: f64,
    pub app_details: PredictionRequest,
    /// Inputs that fell outside the trained vocabulary
    pub unrecognized: Vec<UnrecognizedValue>,
}

pub struct RatingPredictor {
    schema: FeatureSchema,
    model: Box<dyn RatingModel>,
}

impl RatingPredictor {
    pub fn new(schema: FeatureSchema, model: Box<dyn RatingModel>) -> Result<Self> {
        schema.validate()?;
        if model.input_width() != schema.width() {
            return Err(PipelineError::SchemaWidthMismatch {
                expected: schema.width(),
                actual: model.input_width(),
            });
        }
        Ok(Self { schema, model })
    }

    pub fn from_bundle(bundle: ModelBundle) -> Result<Self> {
        Self::new(bundle.schema, Box::new(bundle.model))
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn predict(&self, request: PredictionRequest) -> Result<Prediction> {
        request.validate()?;
        let encoded = transform(&request.features(), &self.schema);
        let raw = self.model.predict(&encoded.vector)?;
        if !raw.is_finite() {
            return Err(PipelineError::Model(format!(
                "model returned {raw} for `{}`",
                request.name
            )));
        }

        let predicted_rating = round2(raw.clamp(MIN_RATING, MAX_RATING));
        debug!(app = %request.name, raw, predicted_rating, "predicted rating");

        Ok(Prediction {
            predicted_rating,
            app_details: request,
            unrecognized: encoded.unrecognized,
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Relative importance (%) of each input, as reported with predictions
pub const FEATURE_IMPORTANCE: [(&str, f64); 5] = [
    ("App Size", 46.91),
    ("Downloads", 15.01),
    ("Price", 11.91),
    ("Store Platform", 3.0),
    ("App Type", 2.61),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{fit_transform, FeatureVector};
    use crate::model::{train, ForestParameters};
    use crate::record::{CanonicalAppRecord, StorePlatform};

    /// Returns a fixed sum of its inputs scaled by `factor`
    struct FixedModel {
        width: usize,
        factor: f64,
    }

    impl RatingModel for FixedModel {
        fn input_width(&self) -> usize {
            self.width
        }

        fn predict(&self, features: &FeatureVector) -> Result<f64> {
            Ok(features.as_slice().iter().sum::<f64>() * self.factor)
        }
    }

    fn record(size: f64, downloads: u64, app_type: &str, store: StorePlatform, rating: f64) -> CanonicalAppRecord {
        CanonicalAppRecord {
            app_name: "App".to_string(),
            app_size_mb: size,
            price_usd: 0.0,
            app_type: app_type.to_string(),
            app_version: "1.0".to_string(),
            user_rating: rating,
            downloads,
            store,
        }
    }

    fn dataset() -> Vec<CanonicalAppRecord> {
        vec![
            record(30.0, 5_000, "social", StorePlatform::GooglePlay, 3.8),
            record(120.0, 1_000_000, "social", StorePlatform::Apple, 4.4),
            record(500.0, 50_000_000, "games", StorePlatform::GooglePlay, 4.7),
            record(80.0, 100_000, "productivity", StorePlatform::Amazon, 4.1),
            record(15.0, 1_000, "productivity", StorePlatform::Apple, 3.2),
        ]
    }

    fn social_request() -> PredictionRequest {
        PredictionRequest {
            name: "Chat".to_string(),
            app_size_mb: 250.0,
            price_usd: 0.0,
            downloads: 1_000_000,
            app_type: "social".to_string(),
            store: "google_play".to_string(),
        }
    }

    #[test]
    fn test_trained_model_prediction_in_range() {
        let bundle = train(&dataset(), ForestParameters::default()).unwrap();
        let predictor = RatingPredictor::from_bundle(bundle).unwrap();

        let prediction = predictor.predict(social_request()).unwrap();

        assert!((MIN_RATING..=MAX_RATING).contains(&prediction.predicted_rating));
        assert!(prediction.unrecognized.is_empty());
        assert_eq!(prediction.app_details, social_request());
    }

    #[test]
    fn test_prediction_is_clamped_and_rounded() {
        let (_, schema) = fit_transform(&dataset()).unwrap();
        let width = schema.width();

        let high = RatingPredictor::new(schema.clone(), Box::new(FixedModel { width, factor: 1.0 })).unwrap();
        assert_eq!(high.predict(social_request()).unwrap().predicted_rating, MAX_RATING);

        let low = RatingPredictor::new(schema.clone(), Box::new(FixedModel { width, factor: -1.0 })).unwrap();
        assert_eq!(low.predict(social_request()).unwrap().predicted_rating, MIN_RATING);

        let request = PredictionRequest {
            app_size_mb: 1.0,
            downloads: 0,
            ..social_request()
        };
        // 1.0 + two one-hot columns = 3.0, scaled
        let mid = RatingPredictor::new(schema, Box::new(FixedModel { width, factor: 1.23456 })).unwrap();
        assert_eq!(mid.predict(request).unwrap().predicted_rating, 3.7);
    }

    #[test]
    fn test_unknown_category_still_predicts() {
        let bundle = train(&dataset(), ForestParameters::default()).unwrap();
        let predictor = RatingPredictor::from_bundle(bundle).unwrap();
        let request = PredictionRequest {
            app_type: "weather".to_string(),
            ..social_request()
        };

        let prediction = predictor.predict(request).unwrap();
        assert!((MIN_RATING..=MAX_RATING).contains(&prediction.predicted_rating));
        assert_eq!(prediction.unrecognized.len(), 1);
        assert_eq!(prediction.unrecognized[0].value, "weather");
    }

    #[test]
    fn test_width_mismatch_rejected() {
        let (_, schema) = fit_transform(&dataset()).unwrap();
        let result = RatingPredictor::new(schema, Box::new(FixedModel { width: 3, factor: 1.0 }));
        assert!(matches!(
            result,
            Err(PipelineError::SchemaWidthMismatch { expected: 9, actual: 3 })
        ));
    }

    #[test]
    fn test_request_defaults() {
        let request: PredictionRequest = serde_json::from_str(r#"{"app_size_mb": 12.5}"#).unwrap();
        assert_eq!(request.name, "Unknown App");
        assert_eq!(request.app_size_mb, 12.5);
        assert_eq!(request.price_usd, 0.0);
        assert_eq!(request.downloads, 0);
        assert_eq!(request.app_type, "productivity");
        assert_eq!(request.store, "google_play");
    }

    #[test]
    fn test_negative_price_rejected() {
        let (_, schema) = fit_transform(&dataset()).unwrap();
        let width = schema.width();
        let predictor = RatingPredictor::new(schema, Box::new(FixedModel { width, factor: 1.0 })).unwrap();
        let request = PredictionRequest {
            price_usd: -1.0,
            ..social_request()
        };
        assert!(matches!(predictor.predict(request), Err(PipelineError::InvalidInput(_))));
    }

    #[test]
    fn test_non_finite_model_output_rejected() {
        let (_, schema) = fit_transform(&dataset()).unwrap();
        let width = schema.width();
        let predictor = RatingPredictor::new(schema, Box::new(FixedModel { width, factor: f64::NAN })).unwrap();
        assert!(matches!(predictor.predict(social_request()), Err(PipelineError::Model(_))));
    }
}
