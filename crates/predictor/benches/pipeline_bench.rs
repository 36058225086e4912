use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rentseva_predictor::oracle::Node;
use rentseva_predictor::{
    AmenityFlags, Forest, ForestOracle, LabelEncoder, LocalityCatalog, ModelArtifacts,
    ModelEvaluation, PredictionRequest, Predictor, RobustScaler,
};
use std::sync::Arc;

fn sample_predictor() -> Predictor {
    // Two shallow trees splitting on area and tier.
    let forest = Forest::averaged(vec![
        vec![
            Node::internal(1, 900.0, 1, 2),
            Node::leaf(9_000.0),
            Node::leaf(14_000.0),
        ],
        vec![
            Node::internal(12, 2.5, 1, 2),
            Node::leaf(10_000.0),
            Node::leaf(17_000.0),
        ],
    ]);
    let oracle = ForestOracle::new(RobustScaler::identity(), forest).unwrap();
    let catalog = Arc::new(LocalityCatalog::vizag());
    let artifacts = ModelArtifacts::new(
        Arc::new(oracle),
        LabelEncoder::from_catalog(&catalog),
        ModelEvaluation::default(),
    );
    Predictor::from_artifacts(catalog, artifacts)
}

fn bench_predict(c: &mut Criterion) {
    let predictor = sample_predictor();
    let request = PredictionRequest::new("MVP Colony", 2, 1_150.0, 2.0, AmenityFlags::all());

    c.bench_function("rent_pipeline_predict", |b| {
        b.iter(|| {
            let result = predictor.predict(black_box(&request));
            black_box(result).ok();
        });
    });
}

criterion_group!(pipeline_benches, bench_predict);
criterion_main!(pipeline_benches);
