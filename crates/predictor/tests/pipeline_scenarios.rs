use chrono::{TimeZone, Utc};
use rentseva_predictor::oracle::{LocationStats, Node};
use rentseva_predictor::{
    normalize_detailed, AmenityFlags, ErrorKind, FeatureVector, FixedOracle, Forest,
    LabelEncoder, LocalityCatalog, ModelArtifacts, ModelEvaluation, PredictionRequest,
    Predictor, PredictorError, RobustScaler,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn catalog() -> Arc<LocalityCatalog> {
    Arc::new(LocalityCatalog::vizag())
}

fn fixed_predictor(raw: f64) -> Predictor {
    let catalog = catalog();
    let artifacts = ModelArtifacts::new(
        Arc::new(FixedOracle(raw)),
        LabelEncoder::from_catalog(&catalog),
        ModelEvaluation::default(),
    );
    Predictor::from_artifacts(catalog, artifacts)
}

#[test]
fn zero_oracle_output_lands_in_band_and_passes() {
    let req = PredictionRequest::new("MVP Colony", 2, 850.0, 2.0, AmenityFlags::all());
    let result = fixed_predictor(0.0).predict(&req).unwrap();
    assert!((12_000.0..=18_000.0).contains(&result.predicted_rent));
    assert_eq!(result.predicted_rent, 12_000.0);
}

#[test]
fn wild_oracle_output_is_clamped() {
    let req = PredictionRequest::new("Pendurthi", 1, 600.0, 1.0, AmenityFlags::default());
    let result = fixed_predictor(50_000.0).predict(&req).unwrap();
    assert!((4_000.0..=7_000.0).contains(&result.predicted_rent));
}

#[test]
fn unknown_location_never_reaches_the_oracle() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let catalog = catalog();
    let artifacts = ModelArtifacts::new(
        Arc::new(move |_: &FeatureVector| {
            counter.fetch_add(1, Ordering::SeqCst);
            10_000.0
        }),
        LabelEncoder::from_catalog(&catalog),
        ModelEvaluation::default(),
    );
    let predictor = Predictor::from_artifacts(catalog, artifacts);

    let req = PredictionRequest::new("Atlantis", 2, 900.0, 2.0, AmenityFlags::default());
    let err = predictor.predict(&req).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidLocation);
    assert!(err.to_string().contains("MVP Colony"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let req = PredictionRequest::new("Gajuwaka", 2, 900.0, 2.0, AmenityFlags::default());
    predictor.predict(&req).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn large_units_are_dampened_before_clamp() {
    let catalog = LocalityCatalog::vizag();
    let loc = catalog.get("Beach Road").unwrap();
    let small = normalize_detailed(21_000.0, loc, 3, 900.0, 0.4);
    let large = normalize_detailed(21_000.0, loc, 3, 1500.0, 0.4);
    let ratio = large.adjusted / small.adjusted;
    assert!((ratio - 1000.0 / 1500.0).abs() < 1e-12);
}

#[test]
fn validation_fails_fast_in_field_order() {
    let predictor = fixed_predictor(10_000.0);

    let req = PredictionRequest::new("Gajuwaka", 5, 100.0, -1.0, AmenityFlags::default());
    assert_eq!(
        predictor.predict(&req).unwrap_err().kind(),
        ErrorKind::InvalidBedroomCount
    );

    let req = PredictionRequest::new("Gajuwaka", 2, 100.0, -1.0, AmenityFlags::default());
    assert_eq!(
        predictor.predict(&req).unwrap_err().kind(),
        ErrorKind::InvalidArea
    );

    let req = PredictionRequest::new("Gajuwaka", 2, 900.0, -1.0, AmenityFlags::default());
    assert!(matches!(
        predictor.predict(&req).unwrap_err(),
        PredictorError::InvalidBathrooms(_)
    ));
}

#[test]
fn confidence_rewards_locality_support() {
    let catalog = catalog();
    let mut evaluation = ModelEvaluation::default();
    evaluation.location_stats.insert(
        "Rushikonda".into(),
        LocationStats {
            count: 40,
            median_rent: 13_000.0,
            avg_rent: 13_400.0,
        },
    );
    let supported = Predictor::from_artifacts(
        Arc::clone(&catalog),
        ModelArtifacts::new(
            Arc::new(FixedOracle(9_000.0)),
            LabelEncoder::from_catalog(&catalog),
            evaluation,
        ),
    );
    let unsupported = fixed_predictor(9_000.0);

    let req = PredictionRequest::new("Rushikonda", 2, 900.0, 2.0, AmenityFlags::default());
    let a = supported.predict(&req).unwrap();
    let b = unsupported.predict(&req).unwrap();
    assert_eq!(a.predicted_rent, b.predicted_rent);
    assert!((a.confidence_score - b.confidence_score - 0.3).abs() < 1e-12);
}

#[test]
fn json_request_runs_end_to_end() {
    let body = json!({
        "location": "Seethammadhara",
        "bhk": "3",
        "built_area_sqft": 1400,
        "bathrooms": 2,
        "lift": true,
        "air_conditioner": true,
        "parking": 1,
        "gym": false,
        "security": "yes",
        "water_supply": true,
        "furnishing": "fully-furnished"
    });
    let req = PredictionRequest::from_json(&body).unwrap();
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    let result = fixed_predictor(18_000.0).predict_at(&req, at).unwrap();
    assert_eq!(result.timestamp, at);
    assert_eq!(result.bedrooms, 3);
    assert!((16_000.0..=25_000.0).contains(&result.predicted_rent));
}

#[test]
fn forest_bundle_serves_predictions() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = catalog();
    let forest = Forest::averaged(vec![
        vec![
            Node::internal(1, 0.0, 1, 2),
            Node::leaf(8_000.0),
            Node::leaf(14_000.0),
        ],
        vec![
            Node::internal(12, 2.5, 1, 2),
            Node::leaf(9_000.0),
            Node::leaf(16_000.0),
        ],
    ]);
    let mut scaler = RobustScaler::identity();
    scaler.center[1] = 1_000.0;
    scaler.scale[1] = 400.0;
    ModelArtifacts::save_bundle(
        dir.path(),
        &forest,
        &scaler,
        &LabelEncoder::from_catalog(&catalog),
        &ModelEvaluation::default(),
    )
    .unwrap();

    let predictor = Predictor::load(Arc::clone(&catalog), dir.path(), None);
    assert!(predictor.is_ready());
    assert!(predictor.health().model_hash.is_some());

    let req = PredictionRequest::new("Madhurawada", 2, 1_100.0, 2.0, AmenityFlags::default());
    let result = predictor.predict(&req).unwrap();
    assert!((10_000.0..=15_000.0).contains(&result.predicted_rent));

    let tampered = Predictor::load(catalog, dir.path(), Some("deadbeef"));
    let err = tampered.predict(&req).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ModelUnavailable);
}
