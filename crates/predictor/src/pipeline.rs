//! End-to-end prediction pipeline
//!
//! Feature building, oracle call, normalization, plausibility check and
//! confidence, in that order. `Predictor` is immutable after construction and
//! can be shared across threads behind an `Arc`.

use crate::catalog::LocalityCatalog;
use crate::confidence::confidence;
use crate::errors::{PredictorError, Result};
use crate::features::{build_features, validate_bedrooms};
use crate::normalizer::normalize_detailed;
use crate::oracle::{ModelArtifacts, ARTIFACT_NAMES};
use crate::request::PredictionRequest;
use crate::validation::validate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Accepted prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub location: String,
    pub bedrooms: u8,
    pub area_sqft: f64,
    pub predicted_rent: f64,
    pub confidence_score: f64,
    pub timestamp: DateTime<Utc>,
}

/// Health of the loaded model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelHealth {
    pub healthy: bool,
    pub models_loaded: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Predictor {
    catalog: Arc<LocalityCatalog>,
    model: std::result::Result<Arc<ModelArtifacts>, String>,
}

impl Predictor {
    pub fn from_artifacts(catalog: Arc<LocalityCatalog>, artifacts: ModelArtifacts) -> Self {
        Self {
            catalog,
            model: Ok(Arc::new(artifacts)),
        }
    }

    /// Predictor that answers every request with `ModelUnavailable`
    pub fn unavailable(catalog: Arc<LocalityCatalog>, reason: impl Into<String>) -> Self {
        Self {
            catalog,
            model: Err(reason.into()),
        }
    }

    /// Load artifacts from `model_dir`, degrading to unavailable on failure
    pub fn load<P: AsRef<Path>>(
        catalog: Arc<LocalityCatalog>,
        model_dir: P,
        expected_hash: Option<&str>,
    ) -> Self {
        match ModelArtifacts::load(model_dir.as_ref(), expected_hash) {
            Ok(artifacts) => Self::from_artifacts(catalog, artifacts),
            Err(e) => {
                error!(
                    "Failed to load models from {}: {}",
                    model_dir.as_ref().display(),
                    e
                );
                Self::unavailable(catalog, e.to_string())
            }
        }
    }

    pub fn catalog(&self) -> &LocalityCatalog {
        &self.catalog
    }

    pub fn artifacts(&self) -> Option<&ModelArtifacts> {
        self.model.as_ref().ok().map(|m| m.as_ref())
    }

    pub fn is_ready(&self) -> bool {
        self.model.is_ok()
    }

    /// `ModelUnavailable` with the load failure reason, if any
    pub fn ensure_ready(&self) -> Result<&ModelArtifacts> {
        self.model
            .as_ref()
            .map(|m| m.as_ref())
            .map_err(|reason| PredictorError::ModelUnavailable(reason.clone()))
    }

    pub fn health(&self) -> ModelHealth {
        match &self.model {
            Ok(artifacts) => ModelHealth {
                healthy: true,
                models_loaded: ARTIFACT_NAMES.iter().map(|n| n.to_string()).collect(),
                model_hash: artifacts.model_hash.clone(),
                reason: None,
            },
            Err(reason) => ModelHealth {
                healthy: false,
                models_loaded: Vec::new(),
                model_hash: None,
                reason: Some(reason.clone()),
            },
        }
    }

    pub fn predict(&self, request: &PredictionRequest) -> Result<PredictionResult> {
        self.predict_at(request, Utc::now())
    }

    /// Run the pipeline with an explicit timestamp
    pub fn predict_at(
        &self,
        request: &PredictionRequest,
        timestamp: DateTime<Utc>,
    ) -> Result<PredictionResult> {
        let model = self.ensure_ready()?;

        let features = match build_features(request, &self.catalog, &model.encoder) {
            Ok(features) => features,
            Err(e @ PredictorError::LocationEncoding(_)) => {
                warn!("Location encoding mismatch between catalog and model: {}", e);
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let locality = self.catalog.require(&request.location)?;
        let bedrooms = validate_bedrooms(request.bedrooms)?;
        let area_sqft = features.area_sqft();
        let score = features.amenity_score();

        let raw = model.predict(&features);
        let normalized = normalize_detailed(raw, locality, bedrooms, area_sqft, score);
        debug!(
            "{} {}BHK {}sqft: raw {:.2}, correction {:.4}, adjusted {:.2}, rent {:.2}",
            locality.name,
            bedrooms,
            area_sqft,
            raw,
            normalized.correction_factor,
            normalized.adjusted,
            normalized.rent
        );

        if let Err(rejection) = validate(normalized.rent, locality, bedrooms, area_sqft) {
            warn!("Prediction rejected: {}", rejection);
            return Err(PredictorError::PlausibilityRejected(rejection.to_string()));
        }

        let confidence_score = confidence(
            model.evaluation.sample_count(&locality.name),
            normalized.rent,
            normalized.target,
            score,
        );

        Ok(PredictionResult {
            location: locality.name.clone(),
            bedrooms,
            area_sqft,
            predicted_rent: normalized.rent,
            confidence_score,
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amenities::AmenityFlags;
    use crate::oracle::{FixedOracle, LabelEncoder, ModelEvaluation};

    fn predictor(raw: f64) -> Predictor {
        let catalog = Arc::new(LocalityCatalog::vizag());
        let artifacts = ModelArtifacts::new(
            Arc::new(FixedOracle(raw)),
            LabelEncoder::from_catalog(&catalog),
            ModelEvaluation::default(),
        );
        Predictor::from_artifacts(catalog, artifacts)
    }

    #[test]
    fn accepted_prediction_carries_request_shape() {
        let req = PredictionRequest::new("Madhurawada", 2, 900.0, 2.0, AmenityFlags::default());
        let result = predictor(3_000.0).predict(&req).unwrap();
        assert_eq!(result.location, "Madhurawada");
        assert_eq!(result.bedrooms, 2);
        assert_eq!(result.area_sqft, 900.0);
        assert!((result.predicted_rent - 12_500.0).abs() < 1e-9);
        assert!((0.0..=1.0).contains(&result.confidence_score));
    }

    #[test]
    fn unavailable_model_fails_every_request() {
        let p = Predictor::unavailable(Arc::new(LocalityCatalog::vizag()), "no artifacts");
        let req = PredictionRequest::new("Atlantis", 9, 1.0, 1.0, AmenityFlags::default());
        let err = p.predict(&req).unwrap_err();
        assert!(matches!(err, PredictorError::ModelUnavailable(ref r) if r == "no artifacts"));

        let health = p.health();
        assert!(!health.healthy);
        assert!(health.models_loaded.is_empty());
    }

    #[test]
    fn health_lists_artifacts_when_loaded() {
        let health = predictor(1.0).health();
        assert!(health.healthy);
        assert_eq!(
            health.models_loaded,
            vec!["rent_predictor", "scaler", "label_encoder"]
        );
    }

    #[test]
    fn missing_directory_degrades_to_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let p = Predictor::load(
            Arc::new(LocalityCatalog::vizag()),
            dir.path().join("missing"),
            None,
        );
        assert!(!p.is_ready());
        assert!(p.health().reason.unwrap().contains("rent_predictor.json"));
    }

    #[test]
    fn density_violation_is_rejected_after_clamp() {
        // 1BHK Pendurthi over 2000 sqft clamps to 4000, only 2 per sqft.
        let req = PredictionRequest::new("Pendurthi", 1, 2000.0, 1.0, AmenityFlags::default());
        let err = predictor(0.0).predict(&req).unwrap_err();
        assert!(matches!(err, PredictorError::PlausibilityRejected(_)));
    }

    #[test]
    fn encoder_skew_is_its_own_error() {
        let catalog = Arc::new(LocalityCatalog::vizag());
        let encoder = LabelEncoder::new(vec!["Gajuwaka".into()]);
        let artifacts = ModelArtifacts::new(
            Arc::new(FixedOracle(9_000.0)),
            encoder,
            ModelEvaluation::default(),
        );
        let p = Predictor::from_artifacts(catalog, artifacts);
        let req = PredictionRequest::new("Rushikonda", 2, 900.0, 2.0, AmenityFlags::default());
        assert!(matches!(
            p.predict(&req).unwrap_err(),
            PredictorError::LocationEncoding(_)
        ));
    }
}
