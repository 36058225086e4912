//! Feature building for the regression oracle
//!
//! Turns validated request attributes into the fixed-order 13-element vector
//! the oracle was fitted on:
//!
//! 0. location code
//! 1. built-up area (sqft)
//! 2. bedrooms
//! 3. bathrooms
//! 4-9. lift, air conditioner, parking, gym, security, water supply (0/1)
//! 10. area per room (`area / (bedrooms + 2)`, living room and kitchen count as rooms)
//! 11. tier-scaled amenity score
//! 12. locality tier

use crate::amenities::{amenity_score, AmenityFlags};
use crate::catalog::LocalityCatalog;
use crate::errors::{PredictorError, Result};
use crate::oracle::LabelEncoder;
use crate::request::PredictionRequest;
use serde::Serialize;

/// Number of features the oracle consumes
pub const FEATURE_COUNT: usize = 13;

/// Accepted bedroom counts
pub const MIN_BEDROOMS: i64 = 1;
pub const MAX_BEDROOMS: i64 = 3;

/// Accepted built-up area in sqft
pub const MIN_AREA_SQFT: f64 = 400.0;
pub const MAX_AREA_SQFT: f64 = 2000.0;

/// Rooms counted on top of bedrooms when computing area per room
const IMPLICIT_ROOMS: f64 = 2.0;

pub const AREA_IDX: usize = 1;
pub const BEDROOMS_IDX: usize = 2;
pub const AREA_PER_ROOM_IDX: usize = 10;
pub const AMENITY_SCORE_IDX: usize = 11;
pub const TIER_IDX: usize = 12;

/// Immutable ordered feature tuple
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        location_code: f64,
        area_sqft: f64,
        bedrooms: f64,
        bathrooms: f64,
        amenities: &AmenityFlags,
        area_per_room: f64,
        amenity_score: f64,
        tier: f64,
    ) -> Self {
        let [lift, ac, parking, gym, security, water] = amenities.indicators();
        Self([
            location_code,
            area_sqft,
            bedrooms,
            bathrooms,
            lift,
            ac,
            parking,
            gym,
            security,
            water,
            area_per_room,
            amenity_score,
            tier,
        ])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn area_sqft(&self) -> f64 {
        self.0[AREA_IDX]
    }

    pub fn area_per_room(&self) -> f64 {
        self.0[AREA_PER_ROOM_IDX]
    }

    pub fn amenity_score(&self) -> f64 {
        self.0[AMENITY_SCORE_IDX]
    }

    pub fn tier(&self) -> f64 {
        self.0[TIER_IDX]
    }
}

/// Area divided among bedrooms plus the implicit living room and kitchen
pub fn area_per_room(area_sqft: f64, bedrooms: u8) -> f64 {
    area_sqft / (f64::from(bedrooms) + IMPLICIT_ROOMS)
}

/// Bedroom count after range validation
pub fn validate_bedrooms(bedrooms: i64) -> Result<u8> {
    if (MIN_BEDROOMS..=MAX_BEDROOMS).contains(&bedrooms) {
        Ok(bedrooms as u8)
    } else {
        Err(PredictorError::InvalidBedroomCount(bedrooms))
    }
}

pub fn validate_area(area_sqft: f64) -> Result<f64> {
    if area_sqft.is_finite() && (MIN_AREA_SQFT..=MAX_AREA_SQFT).contains(&area_sqft) {
        Ok(area_sqft)
    } else {
        Err(PredictorError::InvalidArea(area_sqft))
    }
}

pub fn validate_bathrooms(bathrooms: f64) -> Result<f64> {
    if bathrooms.is_finite() && bathrooms >= 0.0 {
        Ok(bathrooms)
    } else {
        Err(PredictorError::InvalidBathrooms(bathrooms))
    }
}

/// Build the oracle input for a request
///
/// Validation is fail-fast in field order: location, bedrooms, area,
/// bathrooms, then the location encoding.
pub fn build_features(
    request: &PredictionRequest,
    catalog: &LocalityCatalog,
    encoder: &LabelEncoder,
) -> Result<FeatureVector> {
    let locality = catalog.require(&request.location)?;
    let bedrooms = validate_bedrooms(request.bedrooms)?;
    let area_sqft = validate_area(request.area_sqft)?;
    let bathrooms = validate_bathrooms(request.bathrooms)?;
    let location_code = encoder.encode(&request.location)?;

    let score = amenity_score(&request.amenities, locality.tier);

    Ok(FeatureVector::new(
        location_code,
        area_sqft,
        f64::from(bedrooms),
        bathrooms,
        &request.amenities,
        area_per_room(area_sqft, bedrooms),
        score,
        f64::from(locality.tier),
    ))
}
