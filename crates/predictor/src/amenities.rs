//! Amenity desirability scoring

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-amenity weights. They sum to 1.15, not 1.0; kept exactly as fitted.
pub const LIFT_WEIGHT: f64 = 0.15;
pub const AIR_CONDITIONER_WEIGHT: f64 = 0.30;
pub const PARKING_WEIGHT: f64 = 0.20;
pub const GYM_WEIGHT: f64 = 0.10;
pub const SECURITY_WEIGHT: f64 = 0.20;
pub const WATER_SUPPLY_WEIGHT: f64 = 0.20;

/// Six independent amenity flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmenityFlags {
    pub lift: bool,
    pub air_conditioner: bool,
    pub parking: bool,
    pub gym: bool,
    pub security: bool,
    pub water_supply: bool,
}

/// Loose truthiness of an arbitrary JSON value
///
/// `null`, `false`, zero, empty strings and empty containers are false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn indicator(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}

impl AmenityFlags {
    pub fn all() -> Self {
        Self {
            lift: true,
            air_conditioner: true,
            parking: true,
            gym: true,
            security: true,
            water_supply: true,
        }
    }

    /// Flags as 0.0/1.0 indicators in feature-vector order
    pub fn indicators(&self) -> [f64; 6] {
        [
            indicator(self.lift),
            indicator(self.air_conditioner),
            indicator(self.parking),
            indicator(self.gym),
            indicator(self.security),
            indicator(self.water_supply),
        ]
    }

    pub fn count(&self) -> usize {
        self.indicators().iter().filter(|v| **v > 0.0).count()
    }

    /// Weighted sum of present amenities, before tier scaling
    pub fn weighted_sum(&self) -> f64 {
        let weights = [
            LIFT_WEIGHT,
            AIR_CONDITIONER_WEIGHT,
            PARKING_WEIGHT,
            GYM_WEIGHT,
            SECURITY_WEIGHT,
            WATER_SUPPLY_WEIGHT,
        ];
        self.indicators()
            .iter()
            .zip(weights.iter())
            .map(|(flag, weight)| flag * weight)
            .sum()
    }
}

/// Tier-scaled amenity score: `weighted_sum * tier / 3`
pub fn amenity_score(flags: &AmenityFlags, tier: u8) -> f64 {
    flags.weighted_sum() * (f64::from(tier) / 3.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_flags_score_zero() {
        assert_eq!(amenity_score(&AmenityFlags::default(), 3), 0.0);
    }

    #[test]
    fn full_flags_keep_unnormalized_weights() {
        let all = AmenityFlags::all();
        assert!((all.weighted_sum() - 1.15).abs() < 1e-12);
        assert!((amenity_score(&all, 3) - 1.15).abs() < 1e-12);
        assert!((amenity_score(&all, 1) - 1.15 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn premium_tier_scores_higher() {
        let flags = AmenityFlags {
            air_conditioner: true,
            parking: true,
            ..AmenityFlags::default()
        };
        assert!(amenity_score(&flags, 3) > amenity_score(&flags, 2));
        assert!(amenity_score(&flags, 2) > amenity_score(&flags, 1));
        assert!((amenity_score(&flags, 2) - 0.5 * 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn truthiness_follows_loose_rules() {
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!(false)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!(0.0)));
        assert!(!truthy(&json!("")));
        assert!(!truthy(&json!([])));
        assert!(truthy(&json!(true)));
        assert!(truthy(&json!(2)));
        assert!(truthy(&json!("no")));
        assert!(truthy(&json!({"a": 1})));
    }

    #[test]
    fn count_tracks_true_flags() {
        let flags = AmenityFlags {
            gym: true,
            water_supply: true,
            ..AmenityFlags::default()
        };
        assert_eq!(flags.count(), 2);
        assert_eq!(flags.indicators(), [0.0, 0.0, 0.0, 1.0, 0.0, 1.0]);
    }
}
