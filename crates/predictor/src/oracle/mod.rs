//! Regression oracle and its fitted artifacts
//!
//! The oracle is opaque to the rest of the core: given a feature vector it
//! returns a raw, unbounded rent estimate. `ModelArtifacts` bundles the oracle
//! with the location encoder and per-locality training statistics that were
//! produced by the same offline fit.

pub mod forest;
pub mod preprocess;

pub use forest::{Forest, Node, Tree};
pub use preprocess::{LabelEncoder, RobustScaler};

use crate::errors::{PredictorError, Result};
use crate::features::FeatureVector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub const MODEL_FILE: &str = "rent_predictor.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const ENCODER_FILE: &str = "label_encoder.json";
pub const EVALUATION_FILE: &str = "model_evaluation.json";

/// Names reported by health checks once the artifacts are loaded
pub const ARTIFACT_NAMES: [&str; 3] = ["rent_predictor", "scaler", "label_encoder"];

/// Pre-fitted scalar regression function
pub trait RegressionOracle: Send + Sync {
    fn predict(&self, features: &FeatureVector) -> f64;
}

impl<F> RegressionOracle for F
where
    F: Fn(&FeatureVector) -> f64 + Send + Sync,
{
    fn predict(&self, features: &FeatureVector) -> f64 {
        self(features)
    }
}

/// Oracle returning the same value for every input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedOracle(pub f64);

impl RegressionOracle for FixedOracle {
    fn predict(&self, _features: &FeatureVector) -> f64 {
        self.0
    }
}

/// Scaler followed by a tree ensemble
#[derive(Debug, Clone)]
pub struct ForestOracle {
    scaler: RobustScaler,
    forest: Forest,
}

impl ForestOracle {
    pub fn new(scaler: RobustScaler, forest: Forest) -> Result<Self> {
        scaler.validate()?;
        forest.validate()?;
        Ok(Self { scaler, forest })
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }
}

impl RegressionOracle for ForestOracle {
    fn predict(&self, features: &FeatureVector) -> f64 {
        let scaled = self.scaler.transform(features);
        self.forest.score(&scaled)
    }
}

/// Training-set statistics for one locality
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationStats {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub median_rent: f64,
    #[serde(default)]
    pub avg_rent: f64,
}

/// Offline evaluation report written next to the model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelEvaluation {
    #[serde(default)]
    pub model_performance: HashMap<String, f64>,
    #[serde(default)]
    pub location_stats: HashMap<String, LocationStats>,
}

impl ModelEvaluation {
    /// Number of training examples seen for `location`, zero when unknown
    pub fn sample_count(&self, location: &str) -> u64 {
        self.location_stats
            .get(location)
            .map(|s| s.count)
            .unwrap_or(0)
    }
}

/// Everything the pipeline needs from the offline fit
#[derive(Clone)]
pub struct ModelArtifacts {
    pub oracle: Arc<dyn RegressionOracle>,
    pub encoder: LabelEncoder,
    pub evaluation: ModelEvaluation,
    /// Hash of the serialized model, when known
    pub model_hash: Option<String>,
}

impl std::fmt::Debug for ModelArtifacts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelArtifacts")
            .field("encoder", &self.encoder)
            .field("locations_with_stats", &self.evaluation.location_stats.len())
            .field("model_hash", &self.model_hash)
            .finish()
    }
}

fn read_json<T: serde::de::DeserializeOwned>(dir: &Path, file: &str) -> Result<T> {
    let path = dir.join(file);
    let contents = std::fs::read_to_string(&path).map_err(|e| {
        PredictorError::InvalidArtifact(format!("failed to read {}: {e}", path.display()))
    })?;
    serde_json::from_str(&contents).map_err(|e| {
        PredictorError::InvalidArtifact(format!("failed to parse {}: {e}", path.display()))
    })
}

impl ModelArtifacts {
    /// Artifacts around an arbitrary oracle, typically a test stub
    pub fn new(
        oracle: Arc<dyn RegressionOracle>,
        encoder: LabelEncoder,
        evaluation: ModelEvaluation,
    ) -> Self {
        Self {
            oracle,
            encoder,
            evaluation,
            model_hash: None,
        }
    }

    /// Load the forest, scaler, encoder and evaluation report from `dir`
    ///
    /// When `expected_hash` is set the forest must hash to it.
    pub fn load<P: AsRef<Path>>(dir: P, expected_hash: Option<&str>) -> Result<Self> {
        let dir = dir.as_ref();

        let forest: Forest = read_json(dir, MODEL_FILE)?;
        let scaler: RobustScaler = read_json(dir, SCALER_FILE)?;
        let encoder: LabelEncoder = read_json(dir, ENCODER_FILE)?;
        let evaluation: ModelEvaluation = read_json(dir, EVALUATION_FILE)?;
        encoder.validate()?;

        let hash = forest.hash_hex()?;
        if let Some(expected) = expected_hash {
            if !expected.eq_ignore_ascii_case(&hash) {
                return Err(PredictorError::InvalidArtifact(format!(
                    "model hash mismatch: expected {expected}, got {hash}"
                )));
            }
        }

        let trees = forest.num_trees();
        let oracle = ForestOracle::new(scaler, forest)?;
        info!(
            "Loaded rent model from {} ({} trees, {} encoded locations, hash {})",
            dir.display(),
            trees,
            encoder.classes.len(),
            hash
        );

        Ok(Self {
            oracle: Arc::new(oracle),
            encoder,
            evaluation,
            model_hash: Some(hash),
        })
    }

    /// Write a forest bundle to `dir` in the layout `load` expects
    pub fn save_bundle<P: AsRef<Path>>(
        dir: P,
        forest: &Forest,
        scaler: &RobustScaler,
        encoder: &LabelEncoder,
        evaluation: &ModelEvaluation,
    ) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        forest.save_json(dir.join(MODEL_FILE))?;
        std::fs::write(dir.join(SCALER_FILE), serde_json::to_vec_pretty(scaler)?)?;
        std::fs::write(dir.join(ENCODER_FILE), serde_json::to_vec_pretty(encoder)?)?;
        std::fs::write(
            dir.join(EVALUATION_FILE),
            serde_json::to_vec_pretty(evaluation)?,
        )?;
        Ok(())
    }

    pub fn predict(&self, features: &FeatureVector) -> f64 {
        self.oracle.predict(features)
    }
}
