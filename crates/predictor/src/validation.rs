//! Plausibility validation
//!
//! Second-pass sanity check on a normalized rent, independent of the
//! normalizer: the absolute bedroom band and a tier-indexed price-per-sqft
//! band must both hold.

use crate::catalog::Locality;
use serde::Serialize;
use std::fmt;

/// Price per sqft band for a locality tier
pub fn price_density_band(tier: u8) -> (f64, f64) {
    match tier {
        1 => (5.0, 25.0),
        2 => (8.0, 30.0),
        _ => (10.0, 35.0),
    }
}

/// Which plausibility bound a prediction violated
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Violation {
    BelowRange { rent: f64, min: f64 },
    AboveRange { rent: f64, max: f64 },
    DensityTooLow { price_per_sqft: f64, min: f64 },
    DensityTooHigh { price_per_sqft: f64, max: f64 },
}

/// Rejection with the locality context needed to explain it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub location: String,
    pub bedrooms: u8,
    pub violation: Violation,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.violation {
            Violation::BelowRange { rent, min } => write!(
                f,
                "Predicted rent ₹{rent:.2} is ₹{:.2} below the minimum ₹{min:.2} for {} ({} BHK)",
                min - rent,
                self.location,
                self.bedrooms
            ),
            Violation::AboveRange { rent, max } => write!(
                f,
                "Predicted rent ₹{rent:.2} is ₹{:.2} above the maximum ₹{max:.2} for {} ({} BHK)",
                rent - max,
                self.location,
                self.bedrooms
            ),
            Violation::DensityTooLow { price_per_sqft, min } => write!(
                f,
                "Price per square foot ₹{price_per_sqft:.2} is ₹{:.2} below the minimum ₹{min:.2} for {}",
                min - price_per_sqft,
                self.location
            ),
            Violation::DensityTooHigh { price_per_sqft, max } => write!(
                f,
                "Price per square foot ₹{price_per_sqft:.2} is ₹{:.2} above the maximum ₹{max:.2} for {}",
                price_per_sqft - max,
                self.location
            ),
        }
    }
}

impl std::error::Error for Rejection {}

/// Check a normalized rent against the absolute and density bands
pub fn validate(
    predicted_rent: f64,
    locality: &Locality,
    bedrooms: u8,
    area_sqft: f64,
) -> Result<(), Rejection> {
    let reject = |violation| Rejection {
        location: locality.name.clone(),
        bedrooms,
        violation,
    };

    let range = locality.target_range(bedrooms);
    if predicted_rent.is_nan() || predicted_rent < range.min {
        return Err(reject(Violation::BelowRange {
            rent: predicted_rent,
            min: range.min,
        }));
    }
    if predicted_rent > range.max {
        return Err(reject(Violation::AboveRange {
            rent: predicted_rent,
            max: range.max,
        }));
    }

    let (min_rate, max_rate) = price_density_band(locality.tier);
    let price_per_sqft = predicted_rent / area_sqft;
    if price_per_sqft.is_nan() || price_per_sqft < min_rate {
        return Err(reject(Violation::DensityTooLow {
            price_per_sqft,
            min: min_rate,
        }));
    }
    if price_per_sqft > max_rate {
        return Err(reject(Violation::DensityTooHigh {
            price_per_sqft,
            max: max_rate,
        }));
    }

    Ok(())
}
