//! Error types for the prediction core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while turning a request into a rent prediction
#[derive(Error, Debug)]
pub enum PredictorError {
    /// Location is not part of the locality catalog
    #[error("Invalid location '{location}'. Must be one of: {valid}")]
    InvalidLocation { location: String, valid: String },

    /// Bedroom count outside the supported range
    #[error("Invalid bedroom count {0}: must be between 1 and 3")]
    InvalidBedroomCount(i64),

    /// Built-up area outside the supported range
    #[error("Invalid area {0} sqft: must be between 400 and 2000")]
    InvalidArea(f64),

    /// Bathroom count negative or not finite
    #[error("Invalid bathroom count {0}: must be a non-negative number")]
    InvalidBathrooms(f64),

    /// Location is in the catalog but unknown to the fitted encoder
    #[error("Error encoding location: {0}")]
    LocationEncoding(String),

    /// Oracle or its preprocessing artifacts failed to load
    #[error("ML models not loaded: {0}")]
    ModelUnavailable(String),

    /// Normalized prediction failed the plausibility check
    #[error("Invalid prediction: {0}")]
    PlausibilityRejected(String),

    /// Required request fields were absent
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    /// A numeric field could not be interpreted as a number
    #[error("Invalid numeric value provided for '{field}'")]
    InvalidNumber { field: String },

    /// An enumerated field carried an unknown value
    #[error("Invalid value '{value}' for '{field}'")]
    InvalidChoice { field: String, value: String },

    /// Locality catalog failed validation
    #[error("Invalid locality catalog: {0}")]
    InvalidCatalog(String),

    /// Model artifact failed validation
    #[error("Invalid model artifact: {0}")]
    InvalidArtifact(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Catalog file parse error
    #[error("Catalog parse error: {0}")]
    CatalogParse(#[from] toml::de::Error),
}

/// Coarse error classification surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidLocation,
    InvalidBedroomCount,
    InvalidArea,
    LocationEncodingError,
    ModelUnavailable,
    PlausibilityRejected,
    InvalidInput,
    Internal,
}

impl ErrorKind {
    /// Whether the failure is attributed to the request rather than the service
    pub fn is_client_error(self) -> bool {
        !matches!(self, ErrorKind::ModelUnavailable | ErrorKind::Internal)
    }
}

impl PredictorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PredictorError::InvalidLocation { .. } => ErrorKind::InvalidLocation,
            PredictorError::InvalidBedroomCount(_) => ErrorKind::InvalidBedroomCount,
            PredictorError::InvalidArea(_) => ErrorKind::InvalidArea,
            PredictorError::LocationEncoding(_) => ErrorKind::LocationEncodingError,
            PredictorError::ModelUnavailable(_) => ErrorKind::ModelUnavailable,
            PredictorError::PlausibilityRejected(_) => ErrorKind::PlausibilityRejected,
            PredictorError::InvalidBathrooms(_)
            | PredictorError::MissingFields(_)
            | PredictorError::InvalidNumber { .. }
            | PredictorError::InvalidChoice { .. } => ErrorKind::InvalidInput,
            PredictorError::InvalidCatalog(_)
            | PredictorError::InvalidArtifact(_)
            | PredictorError::Io(_)
            | PredictorError::Serialization(_)
            | PredictorError::CatalogParse(_) => ErrorKind::Internal,
        }
    }
}

/// Result type for prediction core operations
pub type Result<T> = std::result::Result<T, PredictorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_split_client_and_service_failures() {
        assert!(PredictorError::InvalidArea(10.0).kind().is_client_error());
        assert!(PredictorError::PlausibilityRejected("x".into())
            .kind()
            .is_client_error());
        assert!(!PredictorError::ModelUnavailable("gone".into())
            .kind()
            .is_client_error());
        assert_eq!(
            PredictorError::LocationEncoding("Atlantis".into()).kind(),
            ErrorKind::LocationEncodingError
        );
    }

    #[test]
    fn missing_fields_message_lists_every_field() {
        let err = PredictorError::MissingFields(vec!["bhk".into(), "gym".into()]);
        assert_eq!(err.to_string(), "Missing required fields: bhk, gym");
    }
}
