//! Preprocessing artifacts fitted alongside the forest

use crate::catalog::LocalityCatalog;
use crate::errors::{PredictorError, Result};
use crate::features::{FeatureVector, FEATURE_COUNT};
use serde::{Deserialize, Serialize};

/// Median/IQR scaler: `(x - center) / scale` per feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustScaler {
    pub center: Vec<f64>,
    pub scale: Vec<f64>,
}

impl RobustScaler {
    /// Scaler that leaves features unchanged
    pub fn identity() -> Self {
        Self {
            center: vec![0.0; FEATURE_COUNT],
            scale: vec![1.0; FEATURE_COUNT],
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.center.len() != FEATURE_COUNT || self.scale.len() != FEATURE_COUNT {
            return Err(PredictorError::InvalidArtifact(format!(
                "scaler expects {} features, got center={} scale={}",
                FEATURE_COUNT,
                self.center.len(),
                self.scale.len()
            )));
        }
        if self
            .center
            .iter()
            .chain(self.scale.iter())
            .any(|v| !v.is_finite())
        {
            return Err(PredictorError::InvalidArtifact(
                "scaler contains non-finite values".to_string(),
            ));
        }
        Ok(())
    }

    pub fn transform(&self, features: &FeatureVector) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for (i, value) in features.as_slice().iter().enumerate() {
            // Constant features are fitted with a zero spread.
            let scale = match self.scale.get(i) {
                Some(s) if *s != 0.0 => *s,
                _ => 1.0,
            };
            let center = self.center.get(i).copied().unwrap_or(0.0);
            out[i] = (value - center) / scale;
        }
        out
    }
}

/// Ordinal location encoder; a location's code is its index in `classes`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    pub classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new(classes: Vec<String>) -> Self {
        Self { classes }
    }

    /// Encoding a model fitted on exactly the catalog's localities would use
    pub fn from_catalog(catalog: &LocalityCatalog) -> Self {
        let mut classes: Vec<String> = catalog.iter().map(|l| l.name.clone()).collect();
        classes.sort();
        Self { classes }
    }

    pub fn validate(&self) -> Result<()> {
        if self.classes.is_empty() {
            return Err(PredictorError::InvalidArtifact(
                "label encoder has no classes".to_string(),
            ));
        }
        Ok(())
    }

    /// Numeric code for a location, `LocationEncoding` when unseen at fit time
    pub fn encode(&self, location: &str) -> Result<f64> {
        self.classes
            .iter()
            .position(|c| c == location)
            .map(|i| i as f64)
            .ok_or_else(|| {
                PredictorError::LocationEncoding(format!(
                    "{location} (y contains previously unseen labels)"
                ))
            })
    }
}
