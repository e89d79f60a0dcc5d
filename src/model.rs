//! Rating regressor and its persisted bundle
//!
//! The regressor only sees [`FeatureVector`]s, so any model that honours the
//! input width of its schema can stand behind [`RatingModel`]. The bundled
//! implementation is a smartcore random forest, evaluated on a seeded holdout
//! split and by k-fold cross-validation over the training split.

use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::arrays::{Array, Array1, Array2};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::metrics::{mean_absolute_error, mean_squared_error, r2};
use smartcore::model_selection::{train_test_split, BaseKFold, KFold};
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

use crate::encoder::{fit_transform, FeatureSchema, FeatureVector};
use crate::error::{PipelineError, Result};
use crate::record::CanonicalAppRecord;

type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Share of rows held out for evaluation
pub const TEST_FRACTION: f32 = 0.2;
pub const CV_FOLDS: usize = 5;
/// Below this many rows the model is fitted on everything and not evaluated
pub const MIN_EVALUATION_ROWS: usize = 10;

pub trait RatingModel: Send + Sync {
    /// Number of features the model was trained on
    fn input_width(&self) -> usize;

    /// Raw, unclamped rating estimate
    fn predict(&self, features: &FeatureVector) -> Result<f64>;
}

fn training_error(e: impl fmt::Display) -> PipelineError {
    PipelineError::Training(e.to_string())
}

fn matrix(rows: &[FeatureVector]) -> Result<DenseMatrix<f64>> {
    let rows: Vec<Vec<f64>> = rows.iter().map(|r| r.0.clone()).collect();
    DenseMatrix::from_2d_vec(&rows).map_err(training_error)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParameters {
    pub n_trees: u16,
    pub max_depth: u16,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestParameters {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 5,
            seed: 42,
        }
    }
}

impl ForestParameters {
    fn to_smartcore(self) -> RandomForestRegressorParameters {
        RandomForestRegressorParameters::default()
            .with_n_trees(self.n_trees.into())
            .with_max_depth(self.max_depth)
            .with_min_samples_split(self.min_samples_split)
            .with_seed(self.seed)
    }
}

#[derive(Serialize, Deserialize)]
pub struct ForestRatingModel {
    forest: Forest,
    width: usize,
}

impl ForestRatingModel {
    pub fn fit(x: &DenseMatrix<f64>, y: &Vec<f64>, params: ForestParameters) -> Result<Self> {
        let (rows, width) = x.shape();
        if rows == 0 {
            return Err(PipelineError::EmptyDataset);
        }
        if rows != y.len() {
            return Err(PipelineError::Training(format!(
                "{rows} feature rows for {} targets",
                y.len()
            )));
        }
        let forest = Forest::fit(x, y, params.to_smartcore()).map_err(training_error)?;
        Ok(Self { forest, width })
    }

    fn predict_matrix(&self, x: &DenseMatrix<f64>) -> Result<Vec<f64>> {
        self.forest
            .predict(x)
            .map_err(|e| PipelineError::Model(e.to_string()))
    }
}

impl fmt::Debug for ForestRatingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForestRatingModel")
            .field("width", &self.width)
            .finish_non_exhaustive()
    }
}

impl RatingModel for ForestRatingModel {
    fn input_width(&self) -> usize {
        self.width
    }

    fn predict(&self, features: &FeatureVector) -> Result<f64> {
        if features.len() != self.width {
            return Err(PipelineError::SchemaWidthMismatch {
                expected: self.width,
                actual: features.len(),
            });
        }
        let x = matrix(std::slice::from_ref(features))?;
        self.predict_matrix(&x)?
            .first()
            .copied()
            .ok_or_else(|| PipelineError::Model("forest returned no prediction".to_string()))
    }
}

/// Error measures of predictions against known ratings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    /// Undefined when the actual ratings have no variance
    pub r2: Option<f64>,
}

impl RegressionMetrics {
    pub fn compute(actual: &Vec<f64>, predicted: &Vec<f64>) -> Self {
        let mse = mean_squared_error(actual, predicted);
        let score = r2(actual, predicted);
        Self {
            mse,
            rmse: mse.sqrt(),
            mae: mean_absolute_error(actual, predicted),
            r2: score.is_finite().then_some(score),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub train_rows: usize,
    pub test_rows: usize,
    pub holdout: RegressionMetrics,
    /// Mean of per-fold MSE over the training split, square-rooted
    pub cv_rmse: f64,
}

fn cross_validated_rmse(x: &DenseMatrix<f64>, y: &Vec<f64>, params: ForestParameters) -> Result<f64> {
    // the training split is already shuffled
    let folds = KFold::default().with_n_splits(CV_FOLDS).with_shuffle(false);
    let mut total = 0.0;
    let mut count = 0;
    for (train_idx, test_idx) in folds.split(x) {
        let model = ForestRatingModel::fit(&x.take(&train_idx, 0), &y.take(&train_idx), params)?;
        let predicted = model.predict_matrix(&x.take(&test_idx, 0))?;
        total += mean_squared_error(&y.take(&test_idx), &predicted);
        count += 1;
    }
    if count == 0 {
        return Err(PipelineError::Training("cross-validation produced no folds".to_string()));
    }
    Ok((total / count as f64).sqrt())
}

/// Trained model persisted together with the schema it was trained against
#[derive(Debug, Serialize)]
pub struct ModelBundle {
    pub schema: FeatureSchema,
    pub model: ForestRatingModel,
    pub trained_rows: usize,
    pub evaluation: Option<Evaluation>,
}

#[derive(Deserialize)]
struct StoredBundle {
    #[serde(default)]
    schema: Option<FeatureSchema>,
    model: ForestRatingModel,
    #[serde(default)]
    trained_rows: usize,
    #[serde(default)]
    evaluation: Option<Evaluation>,
}

impl ModelBundle {
    /// Check the schema is usable and matches the model's width
    pub fn new(
        schema: FeatureSchema,
        model: ForestRatingModel,
        trained_rows: usize,
        evaluation: Option<Evaluation>,
    ) -> Result<Self> {
        schema.validate()?;
        if model.input_width() != schema.width() {
            return Err(PipelineError::SchemaWidthMismatch {
                expected: schema.width(),
                actual: model.input_width(),
            });
        }
        Ok(Self {
            schema,
            model,
            trained_rows,
            evaluation,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a bundle; fails when the frozen schema is absent
    pub fn from_json(json: &str) -> Result<Self> {
        let stored: StoredBundle = serde_json::from_str(json)?;
        let schema = stored.schema.ok_or(PipelineError::VocabularyMissing)?;
        Self::new(schema, stored.model, stored.trained_rows, stored.evaluation)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
        std::fs::write(path, self.to_json()?).map_err(|e| PipelineError::io(path, e))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        Self::from_json(&json)
    }
}

/// Encode `records`, fit a forest and bundle it with the discovered schema.
///
/// With at least [`MIN_EVALUATION_ROWS`] rows the forest is fitted on a
/// seeded 80% split and evaluated on the rest; smaller datasets are fitted
/// whole and carry no evaluation.
pub fn train(records: &[CanonicalAppRecord], params: ForestParameters) -> Result<ModelBundle> {
    if let Some(bad) = records.iter().find(|r| !r.user_rating.is_finite()) {
        return Err(PipelineError::Training(format!(
            "rating of `{}` is not a finite number",
            bad.app_name
        )));
    }
    let (features, schema) = fit_transform(records)?;
    let targets: Vec<f64> = records.iter().map(|r| r.user_rating).collect();
    let x = matrix(&features)?;

    let (model, evaluation) = if records.len() >= MIN_EVALUATION_ROWS {
        let (x_train, x_test, y_train, y_test) =
            train_test_split(&x, &targets, TEST_FRACTION, true, Some(params.seed));
        let model = ForestRatingModel::fit(&x_train, &y_train, params)?;
        let holdout = RegressionMetrics::compute(&y_test, &model.predict_matrix(&x_test)?);
        let cv_rmse = cross_validated_rmse(&x_train, &y_train, params)?;
        let evaluation = Evaluation {
            train_rows: y_train.len(),
            test_rows: y_test.len(),
            holdout,
            cv_rmse,
        };
        (model, Some(evaluation))
    } else {
        warn!(
            rows = records.len(),
            min = MIN_EVALUATION_ROWS,
            "too few rows to hold out a test split; fitting on all rows"
        );
        (ForestRatingModel::fit(&x, &targets, params)?, None)
    };

    match &evaluation {
        Some(e) => info!(
            rows = records.len(),
            columns = schema.width(),
            mse = e.holdout.mse,
            rmse = e.holdout.rmse,
            mae = e.holdout.mae,
            r2 = ?e.holdout.r2,
            cv_rmse = e.cv_rmse,
            "trained rating model"
        ),
        None => info!(rows = records.len(), columns = schema.width(), "trained rating model"),
    }
    ModelBundle::new(schema, model, records.len(), evaluation)
}
