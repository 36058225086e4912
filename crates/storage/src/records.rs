//! Persisted record types

use crate::{Result, StorageError};
use chrono::{DateTime, Utc};
use rentseva_predictor::features::{MAX_AREA_SQFT, MAX_BEDROOMS, MIN_AREA_SQFT, MIN_BEDROOMS};
use rentseva_predictor::{Furnishing, PredictionRequest, PredictionResult, TenantPreference};
use serde::{Deserialize, Serialize};

/// Lowest rent accepted into storage
pub const MIN_STORED_RENT: f64 = 4000.0;

/// Request attributes stored with a prediction but not used to compute it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionExtras {
    pub furnishing: Furnishing,
    pub preferred_tenants: TenantPreference,
}

impl From<&PredictionRequest> for PredictionExtras {
    fn from(request: &PredictionRequest) -> Self {
        Self {
            furnishing: request.furnishing,
            preferred_tenants: request.preferred_tenants,
        }
    }
}

/// Full prediction record, the one history lookups return
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: u64,
    pub user_id: String,
    pub location: String,
    pub bedrooms: u8,
    pub area_sqft: f64,
    pub predicted_rent: f64,
    pub confidence_score: f64,
    pub furnishing_status: Furnishing,
    pub preferred_tenants: TenantPreference,
    pub api_version: String,
    pub created_at: DateTime<Utc>,
}

impl PredictionRecord {
    pub fn new(
        id: u64,
        user_id: &str,
        result: &PredictionResult,
        extras: &PredictionExtras,
    ) -> Self {
        Self {
            id,
            user_id: user_id.to_string(),
            location: result.location.clone(),
            bedrooms: result.bedrooms,
            area_sqft: result.area_sqft,
            predicted_rent: result.predicted_rent,
            confidence_score: result.confidence_score,
            furnishing_status: extras.furnishing,
            preferred_tenants: extras.preferred_tenants,
            api_version: rentseva_predictor::API_VERSION.to_string(),
            created_at: result.timestamp,
        }
    }

    /// Field-level checks applied before every write
    pub fn validate(&self) -> Result<()> {
        if self.user_id.is_empty() {
            return Err(StorageError::InvalidRecord("user_id cannot be empty".into()));
        }
        let bedrooms = i64::from(self.bedrooms);
        if !(MIN_BEDROOMS..=MAX_BEDROOMS).contains(&bedrooms) {
            return Err(StorageError::InvalidRecord(format!(
                "bedrooms {} outside {}-{}",
                self.bedrooms, MIN_BEDROOMS, MAX_BEDROOMS
            )));
        }
        if !(MIN_AREA_SQFT..=MAX_AREA_SQFT).contains(&self.area_sqft) {
            return Err(StorageError::InvalidRecord(format!(
                "area {} sqft outside {}-{}",
                self.area_sqft, MIN_AREA_SQFT, MAX_AREA_SQFT
            )));
        }
        if self.predicted_rent.is_nan() || self.predicted_rent < MIN_STORED_RENT {
            return Err(StorageError::InvalidRecord(format!(
                "rent {} below minimum {}",
                self.predicted_rent, MIN_STORED_RENT
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_score) {
            return Err(StorageError::InvalidRecord(format!(
                "confidence {} outside 0-1",
                self.confidence_score
            )));
        }
        Ok(())
    }
}

/// Lightweight estimate log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateHistoryRecord {
    pub id: u64,
    pub user_id: String,
    pub location: String,
    pub bedrooms: u8,
    pub area_sqft: f64,
    pub predicted_rent: f64,
    pub created_at: DateTime<Utc>,
}

impl EstimateHistoryRecord {
    pub fn new(id: u64, user_id: &str, result: &PredictionResult) -> Self {
        Self {
            id,
            user_id: user_id.to_string(),
            location: result.location.clone(),
            bedrooms: result.bedrooms,
            area_sqft: result.area_sqft,
            predicted_rent: result.predicted_rent,
            created_at: result.timestamp,
        }
    }
}

/// Ids assigned to the two records written for one prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedIds {
    pub prediction_id: u64,
    pub history_id: u64,
}
