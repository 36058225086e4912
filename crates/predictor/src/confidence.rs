//! Confidence estimation
//!
//! Blends four signals into a score in [0, 1]:
//! a fixed base, training support for the locality, how central the
//! prediction sits in its target band, and amenity richness.

use crate::catalog::RentRange;
use serde::Serialize;

pub const BASE_CONFIDENCE: f64 = 0.7;

/// Training examples at which locality support saturates
pub const SAMPLE_SATURATION: f64 = 20.0;

const BASE_WEIGHT: f64 = 0.4;
const LOCALITY_WEIGHT: f64 = 0.3;
const RANGE_WEIGHT: f64 = 0.2;
const AMENITY_WEIGHT: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceBreakdown {
    pub base: f64,
    pub locality: f64,
    pub range: f64,
    pub amenity: f64,
    pub score: f64,
}

pub fn locality_confidence(sample_count: u64) -> f64 {
    (sample_count as f64 / SAMPLE_SATURATION).min(1.0)
}

/// 1.0 at the band center, falling linearly to 0.0 at its edges
///
/// A zero-width band has its only value at the center.
pub fn range_confidence(predicted_rent: f64, target: RentRange) -> f64 {
    let width = target.width();
    if width == 0.0 {
        return 1.0;
    }
    1.0 - (predicted_rent - target.mid()).abs() / width
}

pub fn confidence_breakdown(
    sample_count: u64,
    predicted_rent: f64,
    target: RentRange,
    amenity_score: f64,
) -> ConfidenceBreakdown {
    let locality = locality_confidence(sample_count);
    let range = range_confidence(predicted_rent, target);
    let blended = BASE_CONFIDENCE * BASE_WEIGHT
        + locality * LOCALITY_WEIGHT
        + range * RANGE_WEIGHT
        + amenity_score * AMENITY_WEIGHT;

    ConfidenceBreakdown {
        base: BASE_CONFIDENCE,
        locality,
        range,
        amenity: amenity_score,
        score: blended.clamp(0.0, 1.0),
    }
}

/// Confidence score in [0, 1]
pub fn confidence(
    sample_count: u64,
    predicted_rent: f64,
    target: RentRange,
    amenity_score: f64,
) -> f64 {
    confidence_breakdown(sample_count, predicted_rent, target, amenity_score).score
}
