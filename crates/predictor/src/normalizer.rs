//! Rent normalization
//!
//! Rescales the raw oracle output onto the locality/bedroom target band and
//! then applies area dampening, amenity uplift and a final clamp. The result
//! always lies inside the target band, whatever the oracle returns.

use crate::catalog::{Locality, RentRange};
use serde::Serialize;
use tracing::warn;

/// Units larger than this are discounted per square foot
pub const AREA_DAMPENING_THRESHOLD_SQFT: f64 = 1000.0;

/// Fraction of the amenity score applied as uplift
pub const AMENITY_UPLIFT: f64 = 0.2;

/// Every intermediate value of one normalization
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Normalized {
    pub target: RentRange,
    pub correction_factor: f64,
    /// Oracle output after recentering onto the target midpoint
    pub recentered: f64,
    pub area_factor: f64,
    pub amenity_factor: f64,
    /// Value before the final clamp
    pub adjusted: f64,
    pub rent: f64,
}

impl Normalized {
    /// Whether the final clamp changed the value
    pub fn was_clamped(&self) -> bool {
        self.rent != self.adjusted
    }
}

/// Multiplicative correction pinning a positive prediction to `target_mid`
///
/// Non-positive predictions have no meaningful scale and get 1.0.
pub fn correction_factor(raw_prediction: f64, target_mid: f64) -> f64 {
    if raw_prediction > 0.0 {
        let scale = raw_prediction / target_mid;
        if scale > 0.0 && scale.is_finite() {
            return 1.0 / scale;
        }
    }
    1.0
}

/// `min(1, 1000 / area)` above the threshold, 1.0 otherwise
pub fn area_factor(area_sqft: f64) -> f64 {
    if area_sqft > AREA_DAMPENING_THRESHOLD_SQFT {
        (AREA_DAMPENING_THRESHOLD_SQFT / area_sqft).min(1.0)
    } else {
        1.0
    }
}

pub fn amenity_factor(amenity_score: f64) -> f64 {
    1.0 + amenity_score * AMENITY_UPLIFT
}

/// Full normalization with intermediate values
pub fn normalize_detailed(
    raw_prediction: f64,
    locality: &Locality,
    bedrooms: u8,
    area_sqft: f64,
    amenity_score: f64,
) -> Normalized {
    let target = locality.target_range(bedrooms);

    let raw = if raw_prediction.is_finite() {
        raw_prediction
    } else {
        warn!(
            "Oracle returned non-finite output {} for {}; treating as no signal",
            raw_prediction, locality.name
        );
        0.0
    };

    let correction = correction_factor(raw, target.mid());
    let recentered = raw * correction;
    let area = area_factor(area_sqft);
    let amenity = amenity_factor(amenity_score);
    let adjusted = recentered * area * amenity;

    Normalized {
        target,
        correction_factor: correction,
        recentered,
        area_factor: area,
        amenity_factor: amenity,
        adjusted,
        rent: target.clamp(adjusted),
    }
}

/// Normalized rent, guaranteed inside the bedroom-specific target band
pub fn normalize(
    raw_prediction: f64,
    locality: &Locality,
    bedrooms: u8,
    area_sqft: f64,
    amenity_score: f64,
) -> f64 {
    normalize_detailed(raw_prediction, locality, bedrooms, area_sqft, amenity_score).rent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::LocalityCatalog;

    fn locality(name: &str) -> Locality {
        LocalityCatalog::vizag().get(name).cloned().unwrap()
    }

    #[test]
    fn positive_output_is_recentered_on_midpoint() {
        let loc = locality("Madhurawada");
        let n = normalize_detailed(3_000.0, &loc, 2, 900.0, 0.0);
        assert!((n.recentered - 12_500.0).abs() < 1e-9);
        assert!((n.rent - 12_500.0).abs() < 1e-9);
        assert!(!n.was_clamped());
    }

    #[test]
    fn non_positive_output_keeps_unit_correction() {
        assert_eq!(correction_factor(0.0, 15_000.0), 1.0);
        assert_eq!(correction_factor(-5.0, 15_000.0), 1.0);

        let loc = locality("MVP Colony");
        let n = normalize_detailed(0.0, &loc, 2, 850.0, 1.15);
        assert_eq!(n.correction_factor, 1.0);
        assert_eq!(n.rent, 12_000.0);
        assert!(n.was_clamped());
    }

    #[test]
    fn wild_output_is_clamped_into_band() {
        let loc = locality("Pendurthi");
        let rent = normalize(50_000.0, &loc, 1, 600.0, 0.0);
        assert!((4_000.0..=7_000.0).contains(&rent));
    }

    #[test]
    fn large_units_are_dampened() {
        assert_eq!(area_factor(900.0), 1.0);
        assert_eq!(area_factor(1000.0), 1.0);
        assert!((area_factor(1500.0) - 1000.0 / 1500.0).abs() < 1e-12);

        let loc = locality("Beach Road");
        let small = normalize_detailed(20_000.0, &loc, 3, 900.0, 0.0);
        let large = normalize_detailed(20_000.0, &loc, 3, 1500.0, 0.0);
        assert!((large.adjusted / small.adjusted - 1000.0 / 1500.0).abs() < 1e-12);
    }

    #[test]
    fn amenities_lift_the_value() {
        let loc = locality("Rushikonda");
        let plain = normalize_detailed(12_000.0, &loc, 2, 800.0, 0.0);
        let rich = normalize_detailed(12_000.0, &loc, 2, 800.0, 0.5);
        assert!((rich.adjusted / plain.adjusted - 1.1).abs() < 1e-12);
        assert!(rich.rent >= plain.rent);
    }

    #[test]
    fn non_finite_output_stays_bounded() {
        let loc = locality("Gajuwaka");
        for raw in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let rent = normalize(raw, &loc, 2, 900.0, 0.3);
            assert_eq!(rent, 7_500.0);
        }
    }
}
