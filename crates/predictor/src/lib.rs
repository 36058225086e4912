//! RentSeva prediction core
//!
//! Turns a rental listing's attributes into a bounded, locality-aware rent
//! estimate with a confidence score. The raw regression oracle is pluggable;
//! everything downstream of it (normalization, plausibility, confidence) is
//! deterministic and holds its bounds whatever the oracle returns.

pub mod amenities;
pub mod catalog;
pub mod confidence;
pub mod errors;
pub mod features;
pub mod normalizer;
pub mod oracle;
pub mod pipeline;
pub mod request;
pub mod validation;

pub use amenities::{amenity_score, AmenityFlags};
pub use catalog::{BedroomRange, Locality, LocalityCatalog, RentRange};
pub use confidence::{confidence, confidence_breakdown, ConfidenceBreakdown};
pub use errors::{ErrorKind, PredictorError, Result};
pub use features::{build_features, FeatureVector, FEATURE_COUNT};
pub use normalizer::{normalize, normalize_detailed, Normalized};
pub use oracle::{
    FixedOracle, Forest, ForestOracle, LabelEncoder, LocationStats, ModelArtifacts,
    ModelEvaluation, RegressionOracle, RobustScaler,
};
pub use pipeline::{ModelHealth, PredictionResult, Predictor};
pub use request::{Furnishing, PredictionRequest, TenantPreference};
pub use validation::{validate, Rejection, Violation};

/// Version of the prediction API surfaced to clients and stored with records
pub const API_VERSION: &str = "1.1";

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
