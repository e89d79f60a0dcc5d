use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use arps::browser::WebDriverLauncher;
use arps::collector::{collect_all, Collector};
use arps::config::FileConfig;
use arps::extractors::{AmazonExtractor, AppleAppStoreExtractor, GooglePlayExtractor, PlatformExtractor};
use arps::model::{self, ForestParameters, ModelBundle};
use arps::normalizer;
use arps::predict::FEATURE_IMPORTANCE;
use arps::stats::DatasetStats;
use arps::{PipelineConfig, PredictionRequest, RatingPredictor, StorePlatform};

const CANONICAL_FILE: &str = "processed/app_data.csv";
const DEFAULT_MODEL_PATH: &str = "models/rating_predictor.json";

#[derive(Parser, Debug)]
#[clap(version, about = "Collect app store listings and predict app ratings")]
struct CliArgs {
    /// Optional TOML file overriding the built-in configuration.
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collect listings (and optionally reviews) from the stores.
    Collect {
        /// Stores to collect from; all of them when omitted.
        #[clap(long = "store")]
        stores: Vec<StorePlatform>,

        #[clap(long, value_delimiter = ',')]
        google_play_ids: Vec<String>,

        #[clap(long, value_delimiter = ',')]
        apple_ids: Vec<String>,

        #[clap(long, value_delimiter = ',')]
        amazon_ids: Vec<String>,

        /// Also collect reviews for every collected app.
        #[clap(long)]
        reviews: bool,
    },

    /// Normalize the per-store batches into the canonical dataset.
    Normalize {
        /// Directory holding google_play_store.csv, apple_app_store.csv and
        /// amazon_app_store.csv. Defaults to the collected listings.
        #[clap(long)]
        input_dir: Option<PathBuf>,

        #[clap(long)]
        output: Option<PathBuf>,
    },

    /// Train a rating model on the canonical dataset.
    Train {
        #[clap(long)]
        dataset: Option<PathBuf>,

        #[clap(long, default_value = DEFAULT_MODEL_PATH)]
        model: PathBuf,

        /// Number of trees in the forest.
        #[clap(long, default_value_t = 100)]
        trees: u16,

        #[clap(long, default_value_t = 10)]
        max_depth: u16,

        /// Seed for bootstrap sampling and the holdout split.
        #[clap(long, default_value_t = 42)]
        seed: u64,
    },

    /// Predict the rating of one app.
    Predict {
        #[clap(long, default_value = DEFAULT_MODEL_PATH)]
        model: PathBuf,

        #[clap(long, default_value = "Unknown App")]
        name: String,

        #[clap(long, default_value_t = 0.0)]
        size_mb: f64,

        #[clap(long, default_value_t = 0.0)]
        price: f64,

        #[clap(long, default_value_t = 0)]
        downloads: u64,

        #[clap(long, default_value = "productivity")]
        app_type: String,

        #[clap(long, default_value = "google_play")]
        store: String,
    },

    /// Print summary statistics of the canonical dataset.
    Stats {
        #[clap(long)]
        dataset: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to install the log subscriber")?;

    let file_config = match &cli_args.config {
        Some(path) => Some(
            FileConfig::load(path)
                .with_context(|| format!("Error loading config file {}", path.display()))?,
        ),
        None => None,
    };
    let config = PipelineConfig::from_env(file_config);
    let canonical_path = config.data_dir.join(CANONICAL_FILE);

    match cli_args.command {
        Command::Collect {
            stores,
            google_play_ids,
            apple_ids,
            amazon_ids,
            reviews,
        } => {
            let stores = if stores.is_empty() {
                StorePlatform::ALL.to_vec()
            } else {
                stores
            };

            let mut app_ids = BTreeMap::new();
            for (store, ids) in [
                (StorePlatform::GooglePlay, google_play_ids),
                (StorePlatform::Apple, apple_ids),
                (StorePlatform::Amazon, amazon_ids),
            ] {
                if !ids.is_empty() {
                    app_ids.insert(store, ids);
                }
            }

            let collectors: Vec<Collector> = stores
                .iter()
                .map(|store| Collector::new(extractor(*store, &config), &config))
                .collect();
            let run = collect_all(&collectors, &app_ids, reviews);

            for (store, listings) in &run.listings {
                let review_count = run.reviews.get(store).map_or(0, Vec::len);
                info!(%store, listings = listings.len(), reviews = review_count, "collection finished");
            }
        }

        Command::Normalize { input_dir, output } => {
            let batches = match input_dir {
                Some(dir) => normalizer::load_store_batches(&dir),
                None => normalizer::load_collected_batches(&config.data_dir),
            };
            if batches.is_empty() {
                bail!("No store batches found to normalize");
            }

            let records = normalizer::normalize(&batches);
            let output = output.unwrap_or(canonical_path);
            normalizer::save_canonical(&output, &records)
                .with_context(|| format!("Error saving dataset to {}", output.display()))?;
            info!(rows = records.len(), path = %output.display(), "saved canonical dataset");
        }

        Command::Train {
            dataset,
            model,
            trees,
            max_depth,
            seed,
        } => {
            let dataset = dataset.unwrap_or(canonical_path);
            let records = normalizer::load_canonical(&dataset)
                .with_context(|| format!("Error loading dataset {}", dataset.display()))?;

            let params = ForestParameters {
                n_trees: trees,
                max_depth,
                seed,
                ..ForestParameters::default()
            };
            let bundle = model::train(&records, params).context("Training failed")?;
            bundle
                .save(&model)
                .with_context(|| format!("Error saving model to {}", model.display()))?;
            match &bundle.evaluation {
                Some(e) => info!(
                    path = %model.display(),
                    rmse = e.holdout.rmse,
                    cv_rmse = e.cv_rmse,
                    "saved model bundle"
                ),
                None => info!(path = %model.display(), "saved unevaluated model bundle"),
            }
        }

        Command::Predict {
            model,
            name,
            size_mb,
            price,
            downloads,
            app_type,
            store,
        } => {
            let bundle = ModelBundle::load(&model)
                .with_context(|| format!("Error loading model bundle {}", model.display()))?;
            let predictor = RatingPredictor::from_bundle(bundle)?;

            let prediction = predictor.predict(PredictionRequest {
                name,
                app_size_mb: size_mb,
                price_usd: price,
                downloads,
                app_type,
                store,
            })?;
            for value in &prediction.unrecognized {
                warn!("{value}; prediction uses a partial encoding");
            }

            println!("{}", serde_json::to_string_pretty(&prediction)?);
            println!("Feature importance (%):");
            for (feature, importance) in FEATURE_IMPORTANCE {
                println!("  {feature}: {importance:.2}");
            }
        }

        Command::Stats { dataset } => {
            let dataset = dataset.unwrap_or(canonical_path);
            let records = normalizer::load_canonical(&dataset)
                .with_context(|| format!("Error loading dataset {}", dataset.display()))?;
            print!("{}", DatasetStats::from_records(&records));
        }
    }

    Ok(())
}

fn extractor(store: StorePlatform, config: &PipelineConfig) -> Box<dyn PlatformExtractor> {
    let browser = Box::new(WebDriverLauncher::new(config));
    match store {
        StorePlatform::GooglePlay => Box::new(GooglePlayExtractor::new(config, browser)),
        StorePlatform::Apple => Box::new(AppleAppStoreExtractor::new(config, browser)),
        StorePlatform::Amazon => Box::new(AmazonExtractor::new(config, browser)),
    }
}
