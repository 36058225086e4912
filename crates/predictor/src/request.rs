//! Prediction request parsing
//!
//! Requests arrive as loosely typed JSON: numbers may be strings, amenity
//! flags may be any truthy value.

use crate::amenities::{truthy, AmenityFlags};
use crate::errors::{PredictorError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Fields every prediction request must carry
pub const REQUIRED_FIELDS: [&str; 10] = [
    "location",
    "bhk",
    "built_area_sqft",
    "bathrooms",
    "lift",
    "air_conditioner",
    "parking",
    "gym",
    "security",
    "water_supply",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Furnishing {
    #[default]
    Unfurnished,
    SemiFurnished,
    FullyFurnished,
}

impl Furnishing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Furnishing::Unfurnished => "unfurnished",
            Furnishing::SemiFurnished => "semi-furnished",
            Furnishing::FullyFurnished => "fully-furnished",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "unfurnished" => Some(Furnishing::Unfurnished),
            "semi-furnished" => Some(Furnishing::SemiFurnished),
            "fully-furnished" => Some(Furnishing::FullyFurnished),
            _ => None,
        }
    }
}

impl fmt::Display for Furnishing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantPreference {
    Family,
    Bachelors,
    #[default]
    Any,
}

impl TenantPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantPreference::Family => "family",
            TenantPreference::Bachelors => "bachelors",
            TenantPreference::Any => "any",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "family" => Some(TenantPreference::Family),
            "bachelors" => Some(TenantPreference::Bachelors),
            "any" => Some(TenantPreference::Any),
            _ => None,
        }
    }
}

impl fmt::Display for TenantPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request attributes before range validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub location: String,
    pub bedrooms: i64,
    pub area_sqft: f64,
    pub bathrooms: f64,
    pub amenities: AmenityFlags,
    #[serde(default)]
    pub furnishing: Furnishing,
    #[serde(default)]
    pub preferred_tenants: TenantPreference,
}

impl PredictionRequest {
    pub fn new(
        location: impl Into<String>,
        bedrooms: i64,
        area_sqft: f64,
        bathrooms: f64,
        amenities: AmenityFlags,
    ) -> Self {
        Self {
            location: location.into(),
            bedrooms,
            area_sqft,
            bathrooms,
            amenities,
            furnishing: Furnishing::default(),
            preferred_tenants: TenantPreference::default(),
        }
    }

    /// Parse a loosely typed JSON body
    pub fn from_json(body: &Value) -> Result<Self> {
        let fields = body.as_object();
        let missing: Vec<String> = REQUIRED_FIELDS
            .iter()
            .filter(|f| fields.map_or(true, |m| !m.contains_key(**f)))
            .map(|f| f.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(PredictorError::MissingFields(missing));
        }

        let field = |name: &str| body.get(name).unwrap_or(&Value::Null);
        let flag = |name: &str| truthy(field(name));

        let location = match field("location") {
            Value::String(s) => s.trim().to_string(),
            other => other.to_string().trim().to_string(),
        };

        Ok(Self {
            location,
            bedrooms: parse_int(field("bhk"), "bhk")?,
            area_sqft: parse_float(field("built_area_sqft"), "built_area_sqft")?,
            bathrooms: parse_float(field("bathrooms"), "bathrooms")?,
            amenities: AmenityFlags {
                lift: flag("lift"),
                air_conditioner: flag("air_conditioner"),
                parking: flag("parking"),
                gym: flag("gym"),
                security: flag("security"),
                water_supply: flag("water_supply"),
            },
            furnishing: parse_choice(body, "furnishing", Furnishing::parse)?,
            preferred_tenants: parse_choice(body, "preferred_tenants", TenantPreference::parse)?,
        })
    }
}

fn invalid_number(field: &str) -> PredictorError {
    PredictorError::InvalidNumber {
        field: field.to_string(),
    }
}

/// Integers, floats (truncated toward zero), integer strings and booleans
fn parse_int(value: &Value, field: &str) -> Result<i64> {
    match value {
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|v| v.is_finite()).map(|v| v.trunc() as i64))
            .ok_or_else(|| invalid_number(field)),
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| invalid_number(field)),
        _ => Err(invalid_number(field)),
    }
}

fn parse_float(value: &Value, field: &str) -> Result<f64> {
    match value {
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64().ok_or_else(|| invalid_number(field)),
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| invalid_number(field)),
        _ => Err(invalid_number(field)),
    }
}

fn parse_choice<T: Default>(body: &Value, field: &str, parse: fn(&str) -> Option<T>) -> Result<T> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(Value::String(s)) => parse(s.trim()).ok_or_else(|| PredictorError::InvalidChoice {
            field: field.to_string(),
            value: s.clone(),
        }),
        Some(other) => Err(PredictorError::InvalidChoice {
            field: field.to_string(),
            value: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body() -> Value {
        json!({
            "location": " MVP Colony ",
            "bhk": 2,
            "built_area_sqft": 850,
            "bathrooms": 2,
            "lift": true,
            "air_conditioner": 1,
            "parking": "yes",
            "gym": false,
            "security": 0,
            "water_supply": null
        })
    }

    #[test]
    fn parses_loose_body() {
        let req = PredictionRequest::from_json(&body()).unwrap();
        assert_eq!(req.location, "MVP Colony");
        assert_eq!(req.bedrooms, 2);
        assert_eq!(req.area_sqft, 850.0);
        assert_eq!(req.bathrooms, 2.0);
        assert_eq!(
            req.amenities,
            AmenityFlags {
                lift: true,
                air_conditioner: true,
                parking: true,
                gym: false,
                security: false,
                water_supply: false,
            }
        );
        assert_eq!(req.furnishing, Furnishing::Unfurnished);
        assert_eq!(req.preferred_tenants, TenantPreference::Any);
    }

    #[test]
    fn reports_all_missing_fields_in_order() {
        let err = PredictionRequest::from_json(&json!({"location": "Gajuwaka", "lift": true}))
            .unwrap_err();
        match err {
            PredictorError::MissingFields(fields) => assert_eq!(
                fields,
                vec![
                    "bhk",
                    "built_area_sqft",
                    "bathrooms",
                    "air_conditioner",
                    "parking",
                    "gym",
                    "security",
                    "water_supply"
                ]
            ),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn non_object_body_misses_everything() {
        let err = PredictionRequest::from_json(&json!([1, 2])).unwrap_err();
        assert!(matches!(
            err,
            PredictorError::MissingFields(f) if f.len() == REQUIRED_FIELDS.len()
        ));
    }

    #[test]
    fn numeric_strings_and_floats_are_accepted() {
        let mut b = body();
        b["bhk"] = json!("3");
        b["built_area_sqft"] = json!("1200.5");
        b["bathrooms"] = json!(1.5);
        let req = PredictionRequest::from_json(&b).unwrap();
        assert_eq!(req.bedrooms, 3);
        assert_eq!(req.area_sqft, 1200.5);
        assert_eq!(req.bathrooms, 1.5);

        b["bhk"] = json!(2.9);
        assert_eq!(PredictionRequest::from_json(&b).unwrap().bedrooms, 2);
    }

    #[test]
    fn garbage_numbers_name_the_field() {
        let mut b = body();
        b["built_area_sqft"] = json!("big");
        let err = PredictionRequest::from_json(&b).unwrap_err();
        assert!(matches!(
            err,
            PredictorError::InvalidNumber { field } if field == "built_area_sqft"
        ));

        let mut b = body();
        b["bhk"] = json!("2.5");
        assert!(PredictionRequest::from_json(&b).is_err());
    }

    #[test]
    fn optional_choices_are_validated() {
        let mut b = body();
        b["furnishing"] = json!("semi-furnished");
        b["preferred_tenants"] = json!("family");
        let req = PredictionRequest::from_json(&b).unwrap();
        assert_eq!(req.furnishing, Furnishing::SemiFurnished);
        assert_eq!(req.preferred_tenants, TenantPreference::Family);

        b["furnishing"] = json!("luxurious");
        let err = PredictionRequest::from_json(&b).unwrap_err();
        assert!(matches!(
            err,
            PredictorError::InvalidChoice { field, .. } if field == "furnishing"
        ));
    }
}
