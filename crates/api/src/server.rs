use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use rentseva_predictor::{
    ErrorKind, Locality, PredictionRequest, Predictor, PredictorError, API_VERSION,
};
use rentseva_storage::{
    EstimateHistoryRecord, PredictionExtras, PredictionRecord, PredictionStore, StorageError,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::identity::{CallerIdentity, IdentityError, IdentityVerifier};

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Prediction outcome counters exported on /metrics
#[derive(Debug, Default)]
pub struct PredictionCounters {
    pub accepted: AtomicUsize,
    pub rejected_client: AtomicUsize,
    pub rejected_service: AtomicUsize,
}

impl PredictionCounters {
    fn record_rejection(&self, kind: ErrorKind) {
        if kind.is_client_error() {
            self.rejected_client.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rejected_service.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<Predictor>,
    pub store: Arc<dyn PredictionStore>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub start_time: Instant,
    pub req_count: Arc<AtomicUsize>,
    pub predictions: Arc<PredictionCounters>,
}

impl AppState {
    pub fn new(
        predictor: Arc<Predictor>,
        store: Arc<dyn PredictionStore>,
        identity: Arc<dyn IdentityVerifier>,
    ) -> Self {
        Self {
            predictor,
            store,
            identity,
            start_time: Instant::now(),
            req_count: Arc::new(AtomicUsize::new(0)),
            predictions: Arc::new(PredictionCounters::default()),
        }
    }

    fn record_request(&self) -> u64 {
        self.req_count.fetch_add(1, Ordering::Relaxed) as u64 + 1
    }

    fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    fn authenticate(&self, headers: &HeaderMap) -> Result<CallerIdentity, ApiError> {
        self.identity.verify(headers).map_err(ApiError::from)
    }
}

type SharedState = Arc<AppState>;

#[derive(Debug, Serialize)]
struct ApiIndexResponse {
    name: &'static str,
    version: &'static str,
    endpoints: Vec<EndpointInfo>,
}

#[derive(Debug, Serialize)]
struct EndpointInfo {
    method: &'static str,
    path: &'static str,
    description: &'static str,
}

const ENDPOINTS: [(&str, &str, &str); 7] = [
    ("GET", "/api", "API index"),
    ("POST", "/api/predict", "Predict monthly rent for a property"),
    ("GET", "/api/history", "Caller's prediction history, newest first"),
    ("GET", "/api/estimates", "Caller's estimate log, newest first"),
    ("GET", "/api/locations", "Supported localities and their rent bands"),
    ("GET", "/health", "Model load status"),
    ("GET", "/metrics", "Prometheus metrics"),
];

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    models_loaded: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model_hash: Option<String>,
    catalog_version: String,
    uptime_secs: u64,
    req_total: u64,
}

#[derive(Debug, Serialize)]
struct PredictResponse {
    id: u64,
    predicted_rent: f64,
    confidence_score: f64,
    timestamp: DateTime<Utc>,
    history_id: u64,
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    count: usize,
    predictions: Vec<PredictionRecord>,
}

/// Estimate log entry in the shape the web client reads
#[derive(Debug, Serialize)]
struct EstimateEntry {
    id: u64,
    location: String,
    bhk: u8,
    sqft: f64,
    predicted_rent: f64,
    created_at: DateTime<Utc>,
}

impl From<EstimateHistoryRecord> for EstimateEntry {
    fn from(record: EstimateHistoryRecord) -> Self {
        Self {
            id: record.id,
            location: record.location,
            bhk: record.bedrooms,
            sqft: record.area_sqft,
            predicted_rent: record.predicted_rent,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct EstimatesResponse {
    count: usize,
    estimates: Vec<EstimateEntry>,
}

#[derive(Debug, Serialize)]
struct LocationsResponse<'a> {
    version: &'a str,
    locations: Vec<&'a Locality>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<ErrorKind>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    kind: Option<ErrorKind>,
}

impl ApiError {
    fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            message: message.into(),
            kind: None,
        }
    }

    fn bad_request<S: Into<String>>(message: S) -> Self {
        Self {
            kind: Some(ErrorKind::InvalidInput),
            ..Self::new(StatusCode::BAD_REQUEST, message)
        }
    }

    fn unauthorized<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    fn internal<S: Into<String>>(message: S) -> Self {
        Self {
            kind: Some(ErrorKind::Internal),
            ..Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// HTTP status for a prediction failure kind
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

impl From<PredictorError> for ApiError {
    fn from(err: PredictorError) -> Self {
        let kind = err.kind();
        Self {
            status: status_for(kind),
            message: err.to_string(),
            kind: Some(kind),
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        Self::unauthorized(err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidRecord(_) => Self::bad_request(err.to_string()),
            other => Self::internal(format!("failed to persist prediction: {other}")),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let payload = Json(ErrorResponse {
            error: self.message,
            kind: self.kind,
        });
        (self.status, payload).into_response()
    }
}

pub async fn start_server(state: AppState, addr: &str) -> Result<()> {
    let shared = Arc::new(state);
    let app = build_router(shared);
    let listener = bind_listener(addr).await?;
    info!("RentSeva API listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server terminated unexpectedly")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

pub async fn bind_listener(addr: &str) -> Result<tokio::net::TcpListener> {
    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        tokio::net::TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("failed to bind API listener on {socket_addr}"))
    } else {
        tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind API listener on {addr}"))
    }
}

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/api", get(handle_index))
        .route("/api/", get(handle_index))
        .route("/api/predict", post(handle_predict))
        .route("/api/predict/", post(handle_predict))
        .route("/api/history", get(handle_history))
        .route("/api/history/", get(handle_history))
        .route("/api/estimates", get(handle_estimates))
        .route("/api/estimates/", get(handle_estimates))
        .route("/api/locations", get(handle_locations))
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

async fn handle_index(State(state): State<SharedState>) -> Json<ApiIndexResponse> {
    state.record_request();
    Json(ApiIndexResponse {
        name: "RentSeva API",
        version: API_VERSION,
        endpoints: ENDPOINTS
            .iter()
            .map(|&(method, path, description)| EndpointInfo {
                method,
                path,
                description,
            })
            .collect(),
    })
}

async fn handle_health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let req_total = state.record_request();
    let health = state.predictor.health();
    Json(HealthResponse {
        status: if health.healthy { "healthy" } else { "unhealthy" },
        models_loaded: health.models_loaded,
        model_hash: health.model_hash,
        catalog_version: state.predictor.catalog().version().to_string(),
        uptime_secs: state.uptime_seconds(),
        req_total,
    })
}

async fn handle_predict(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PredictResponse>, ApiError> {
    state.record_request();
    let caller = state.authenticate(&headers)?;

    let outcome = predict_for(&state, &caller, &body);
    if let Err(err) = &outcome {
        if let Some(kind) = err.kind {
            state.predictions.record_rejection(kind);
        }
    }
    outcome.map(Json)
}

fn predict_for(
    state: &AppState,
    caller: &CallerIdentity,
    body: &[u8],
) -> Result<PredictResponse, ApiError> {
    state.predictor.ensure_ready()?;

    let payload: serde_json::Value = serde_json::from_slice(body)
        .map_err(|err| ApiError::bad_request(format!("Invalid JSON payload: {err}")))?;
    let request = PredictionRequest::from_json(&payload)?;
    let result = state.predictor.predict(&request)?;

    let ids = state
        .store
        .persist(&caller.user_id, &result, &PredictionExtras::from(&request))?;
    state.predictions.accepted.fetch_add(1, Ordering::Relaxed);
    info!(
        "Prediction {} for {}: {} {}BHK ₹{:.2} (confidence {:.3})",
        ids.prediction_id,
        caller.user_id,
        result.location,
        result.bedrooms,
        result.predicted_rent,
        result.confidence_score
    );

    Ok(PredictResponse {
        id: ids.prediction_id,
        predicted_rent: result.predicted_rent,
        confidence_score: result.confidence_score,
        timestamp: result.timestamp,
        history_id: ids.history_id,
    })
}

async fn handle_history(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<HistoryResponse>, ApiError> {
    state.record_request();
    let caller = state.authenticate(&headers)?;
    let predictions = state
        .store
        .history(&caller.user_id)
        .map_err(|err| ApiError::internal(format!("failed to fetch history: {err}")))?;
    Ok(Json(HistoryResponse {
        count: predictions.len(),
        predictions,
    }))
}

async fn handle_estimates(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<EstimatesResponse>, ApiError> {
    state.record_request();
    let caller = state.authenticate(&headers)?;
    let estimates: Vec<EstimateEntry> = state
        .store
        .estimate_history(&caller.user_id)
        .map_err(|err| ApiError::internal(format!("failed to fetch estimates: {err}")))?
        .into_iter()
        .map(EstimateEntry::from)
        .collect();
    Ok(Json(EstimatesResponse {
        count: estimates.len(),
        estimates,
    }))
}

async fn handle_locations(State(state): State<SharedState>) -> Response {
    state.record_request();
    let catalog = state.predictor.catalog();
    Json(LocationsResponse {
        version: catalog.version(),
        locations: catalog.iter().collect(),
    })
    .into_response()
}

async fn handle_metrics(State(state): State<SharedState>) -> Response {
    let req_total = state.record_request();
    let uptime = state.uptime_seconds();
    let accepted = state.predictions.accepted.load(Ordering::Relaxed);
    let rejected_client = state.predictions.rejected_client.load(Ordering::Relaxed);
    let rejected_service = state.predictions.rejected_service.load(Ordering::Relaxed);
    let model_loaded = u8::from(state.predictor.is_ready());

    let mut metrics =
        "# HELP rentseva_http_requests_total Total number of API requests handled\n".to_string();
    metrics.push_str("# TYPE rentseva_http_requests_total counter\n");
    metrics.push_str(&format!("rentseva_http_requests_total {req_total}\n"));
    metrics.push_str(
        "# HELP rentseva_predictions_accepted_total Predictions returned and persisted\n",
    );
    metrics.push_str("# TYPE rentseva_predictions_accepted_total counter\n");
    metrics.push_str(&format!("rentseva_predictions_accepted_total {accepted}\n"));
    metrics.push_str(
        "# HELP rentseva_predictions_rejected_total Rejected prediction requests by class\n",
    );
    metrics.push_str("# TYPE rentseva_predictions_rejected_total counter\n");
    metrics.push_str(&format!(
        "rentseva_predictions_rejected_total{{class=\"client\"}} {rejected_client}\n"
    ));
    metrics.push_str(&format!(
        "rentseva_predictions_rejected_total{{class=\"service\"}} {rejected_service}\n"
    ));
    metrics.push_str("# HELP rentseva_model_loaded Whether the rent model is loaded\n");
    metrics.push_str("# TYPE rentseva_model_loaded gauge\n");
    metrics.push_str(&format!("rentseva_model_loaded {model_loaded}\n"));
    metrics.push_str("# HELP rentseva_uptime_seconds Uptime of the service in seconds\n");
    metrics.push_str("# TYPE rentseva_uptime_seconds gauge\n");
    metrics.push_str(&format!("rentseva_uptime_seconds {uptime}\n"));

    let mut response = Response::new(Body::from(metrics));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    response
}
