//! Locality catalog
//!
//! Static, versioned table of supported localities. Each locality carries an
//! absolute rent band, a premium tier (1-3) and bedroom-specific sub-ranges.
//! The catalog is built once at process start and only ever read afterwards.

use crate::errors::{PredictorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// Lowest supported premium tier
pub const MIN_TIER: u8 = 1;
/// Highest supported premium tier
pub const MAX_TIER: u8 = 3;

/// Inclusive rent band in currency units per month
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RentRange {
    pub min: f64,
    pub max: f64,
}

impl RentRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn mid(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Clamp `value` into the band
    pub fn clamp(&self, value: f64) -> f64 {
        self.min.max(value.min(self.max))
    }
}

/// Bedroom-specific rent sub-range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BedroomRange {
    pub bedrooms: u8,
    pub min: f64,
    pub max: f64,
}

/// A named neighborhood with its rent bands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Locality {
    pub name: String,
    pub min_rent: f64,
    pub max_rent: f64,
    pub tier: u8,
    #[serde(default)]
    pub bedroom_ranges: Vec<BedroomRange>,
}

impl Locality {
    /// Locality-wide absolute band
    pub fn overall_range(&self) -> RentRange {
        RentRange::new(self.min_rent, self.max_rent)
    }

    /// Bedroom-specific band, falling back to the locality-wide band
    pub fn target_range(&self, bedrooms: u8) -> RentRange {
        self.bedroom_ranges
            .iter()
            .find(|r| r.bedrooms == bedrooms)
            .map(|r| RentRange::new(r.min, r.max))
            .unwrap_or_else(|| self.overall_range())
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PredictorError::InvalidCatalog(
                "locality name cannot be empty".to_string(),
            ));
        }
        if !(MIN_TIER..=MAX_TIER).contains(&self.tier) {
            return Err(PredictorError::InvalidCatalog(format!(
                "{}: tier {} outside {}-{}",
                self.name, self.tier, MIN_TIER, MAX_TIER
            )));
        }
        if !(self.min_rent.is_finite() && self.max_rent.is_finite())
            || self.min_rent > self.max_rent
        {
            return Err(PredictorError::InvalidCatalog(format!(
                "{}: min_rent {} exceeds max_rent {}",
                self.name, self.min_rent, self.max_rent
            )));
        }

        let mut previous: Option<&BedroomRange> = None;
        let mut ranges: Vec<&BedroomRange> = self.bedroom_ranges.iter().collect();
        ranges.sort_by_key(|r| r.bedrooms);
        for range in ranges {
            if !(1..=3).contains(&range.bedrooms) {
                return Err(PredictorError::InvalidCatalog(format!(
                    "{}: bedroom range key {} outside 1-3",
                    self.name, range.bedrooms
                )));
            }
            if previous.is_some_and(|prev| prev.bedrooms == range.bedrooms) {
                return Err(PredictorError::InvalidCatalog(format!(
                    "{}: duplicate range for {} bedrooms",
                    self.name, range.bedrooms
                )));
            }
            if !(range.min.is_finite() && range.max.is_finite()) || range.min > range.max {
                return Err(PredictorError::InvalidCatalog(format!(
                    "{}: {} bedroom range {}-{} is inverted",
                    self.name, range.bedrooms, range.min, range.max
                )));
            }
            // Kept as data; rents shrinking with more rooms is only reported.
            if let Some(prev) = previous {
                if range.min < prev.min {
                    warn!(
                        "{}: {} bedroom lower bound {} is below the previous bedroom count ({})",
                        self.name, range.bedrooms, range.min, prev.min
                    );
                }
            }
            previous = Some(range);
        }
        Ok(())
    }
}

/// Immutable set of supported localities in declaration order
#[derive(Debug, Clone)]
pub struct LocalityCatalog {
    version: String,
    localities: Vec<Locality>,
    index: HashMap<String, usize>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    version: String,
    localities: Vec<Locality>,
}

fn bhk(bedrooms: u8, min: f64, max: f64) -> BedroomRange {
    BedroomRange { bedrooms, min, max }
}

fn locality(
    name: &str,
    min_rent: f64,
    max_rent: f64,
    tier: u8,
    ranges: [(f64, f64); 3],
) -> Locality {
    Locality {
        name: name.to_string(),
        min_rent,
        max_rent,
        tier,
        bedroom_ranges: ranges
            .iter()
            .enumerate()
            .map(|(i, (min, max))| bhk(i as u8 + 1, *min, *max))
            .collect(),
    }
}

impl LocalityCatalog {
    /// Build a catalog, validating every locality
    pub fn new(version: impl Into<String>, localities: Vec<Locality>) -> Result<Self> {
        if localities.is_empty() {
            return Err(PredictorError::InvalidCatalog(
                "catalog has no localities".to_string(),
            ));
        }

        let mut index = HashMap::with_capacity(localities.len());
        for (i, locality) in localities.iter().enumerate() {
            locality.validate()?;
            if index.insert(locality.name.clone(), i).is_some() {
                return Err(PredictorError::InvalidCatalog(format!(
                    "duplicate locality {}",
                    locality.name
                )));
            }
        }

        Ok(Self {
            version: version.into(),
            localities,
            index,
        })
    }

    /// Built-in Visakhapatnam catalog
    pub fn vizag() -> Self {
        let localities = vec![
            locality(
                "MVP Colony",
                8000.0,
                15000.0,
                3,
                [(8000.0, 12000.0), (12000.0, 18000.0), (16000.0, 25000.0)],
            ),
            locality(
                "Beach Road",
                10000.0,
                18000.0,
                3,
                [(10000.0, 15000.0), (15000.0, 22000.0), (20000.0, 30000.0)],
            ),
            locality(
                "Madhurawada",
                7000.0,
                14000.0,
                2,
                [(6000.0, 10000.0), (10000.0, 15000.0), (14000.0, 20000.0)],
            ),
            locality(
                "Gajuwaka",
                5000.0,
                10000.0,
                1,
                [(5000.0, 8000.0), (7500.0, 15000.0), (12000.0, 18000.0)],
            ),
            locality(
                "Pendurthi",
                4000.0,
                8000.0,
                1,
                [(4000.0, 7000.0), (7000.0, 12000.0), (10000.0, 15000.0)],
            ),
            locality(
                "Seethammadhara",
                8000.0,
                15000.0,
                3,
                [(8000.0, 12000.0), (12000.0, 18000.0), (16000.0, 25000.0)],
            ),
            locality(
                "Rushikonda",
                7000.0,
                14000.0,
                2,
                [(7000.0, 11000.0), (11000.0, 16000.0), (15000.0, 22000.0)],
            ),
        ];
        let index = localities
            .iter()
            .enumerate()
            .map(|(i, l)| (l.name.clone(), i))
            .collect();
        Self {
            version: "vizag-1.1".to_string(),
            localities,
            index,
        }
    }

    /// Parse a catalog from TOML
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(contents)?;
        Self::new(file.version, file.localities)
    }

    /// Load a deploy-time catalog file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let catalog = Self::from_toml_str(&contents)?;
        info!(
            "Loaded locality catalog {} ({} localities) from {}",
            catalog.version,
            catalog.len(),
            path.as_ref().display()
        );
        Ok(catalog)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn get(&self, name: &str) -> Option<&Locality> {
        self.index.get(name).map(|&i| &self.localities[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Locality> {
        self.localities.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.localities.iter().map(|l| l.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.localities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.localities.is_empty()
    }

    /// Look up a locality or fail with `InvalidLocation`
    pub fn require(&self, name: &str) -> Result<&Locality> {
        self.get(name).ok_or_else(|| PredictorError::InvalidLocation {
            location: name.to_string(),
            valid: self.names().join(", "),
        })
    }
}

impl Default for LocalityCatalog {
    fn default() -> Self {
        Self::vizag()
    }
}
