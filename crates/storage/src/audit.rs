//! Soft audit of stored predictions
//!
//! Broad sanity bands that only log. A record outside them is still written.

use crate::records::PredictionRecord;
use tracing::warn;

/// City-wide price per sqft band
pub const CITY_DENSITY_BAND: (f64, f64) = (5.0, 35.0);

/// Broad 1BHK rent band per locality, before the bedroom multiplier
const LOCALITY_BANDS: [(&str, f64, f64); 7] = [
    ("MVP Colony", 8000.0, 30000.0),
    ("Beach Road", 10000.0, 36000.0),
    ("Madhurawada", 7000.0, 28000.0),
    ("Gajuwaka", 5000.0, 20000.0),
    ("Pendurthi", 4000.0, 16000.0),
    ("Seethammadhara", 8000.0, 30000.0),
    ("Rushikonda", 7000.0, 28000.0),
];

pub fn bedroom_multiplier(bedrooms: u8) -> f64 {
    match bedrooms {
        2 => 1.5,
        3 => 2.0,
        _ => 1.0,
    }
}

/// Broad band for a locality and bedroom count, if the locality is audited
pub fn audit_band(location: &str, bedrooms: u8) -> Option<(f64, f64)> {
    let multiplier = bedroom_multiplier(bedrooms);
    LOCALITY_BANDS
        .iter()
        .find(|(name, _, _)| *name == location)
        .map(|(_, min, max)| (min * multiplier, max * multiplier))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditFinding {
    RentOutsideBand,
    DensityOutsideBand,
}

/// Findings for a record; each one is logged at warn
pub fn audit(record: &PredictionRecord) -> Vec<AuditFinding> {
    let mut findings = Vec::new();

    if let Some((min, max)) = audit_band(&record.location, record.bedrooms) {
        if record.predicted_rent < min || record.predicted_rent > max {
            warn!(
                "Rent prediction ₹{:.2} outside expected range (₹{:.2} - ₹{:.2}) for {}",
                record.predicted_rent, min, max, record.location
            );
            findings.push(AuditFinding::RentOutsideBand);
        }
    }

    let price_per_sqft = record.predicted_rent / record.area_sqft;
    let (min_rate, max_rate) = CITY_DENSITY_BAND;
    if !(min_rate..=max_rate).contains(&price_per_sqft) {
        warn!(
            "Price per sqft (₹{:.2}) outside normal range for {}",
            price_per_sqft, record.location
        );
        findings.push(AuditFinding::DensityOutsideBand);
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::PredictionExtras;
    use chrono::Utc;
    use rentseva_predictor::PredictionResult;

    fn record(location: &str, bedrooms: u8, area: f64, rent: f64) -> PredictionRecord {
        let result = PredictionResult {
            location: location.into(),
            bedrooms,
            area_sqft: area,
            predicted_rent: rent,
            confidence_score: 0.5,
            timestamp: Utc::now(),
        };
        PredictionRecord::new(1, "u", &result, &PredictionExtras::default())
    }

    #[test]
    fn bands_scale_with_bedrooms() {
        assert_eq!(audit_band("Pendurthi", 1), Some((4000.0, 16000.0)));
        assert_eq!(audit_band("Pendurthi", 2), Some((6000.0, 24000.0)));
        assert_eq!(audit_band("Beach Road", 3), Some((20000.0, 72000.0)));
        assert_eq!(audit_band("Atlantis", 1), None);
    }

    #[test]
    fn typical_record_is_clean() {
        assert!(audit(&record("Gajuwaka", 2, 900.0, 11_250.0)).is_empty());
    }

    #[test]
    fn findings_are_reported_independently() {
        // 2BHK Pendurthi floor is 6000 after the multiplier.
        let findings = audit(&record("Pendurthi", 2, 1200.0, 5_000.0));
        assert_eq!(
            findings,
            vec![AuditFinding::RentOutsideBand, AuditFinding::DensityOutsideBand]
        );

        let findings = audit(&record("MVP Colony", 1, 400.0, 15_000.0));
        assert_eq!(findings, vec![AuditFinding::DensityOutsideBand]);
    }
}
