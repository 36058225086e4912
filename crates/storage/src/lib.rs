//! Prediction persistence
//!
//! Every accepted prediction is written twice: a full `PredictionRecord` and a
//! lightweight `EstimateHistoryRecord`. Rejected requests never reach storage.

pub mod audit;
pub mod records;

pub use records::{EstimateHistoryRecord, PersistedIds, PredictionExtras, PredictionRecord};

use parking_lot::RwLock;
use rentseva_predictor::PredictionResult;
use sled::transaction::{abort, TransactionError};
use sled::{Db, Transactional, Tree};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Storage errors
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Accepts one normalized result and fans it out to both record kinds
pub trait PredictionSink: Send + Sync {
    fn persist(
        &self,
        user_id: &str,
        result: &PredictionResult,
        extras: &PredictionExtras,
    ) -> Result<PersistedIds>;
}

/// Read side of prediction storage
pub trait PredictionStore: PredictionSink {
    /// A user's predictions, newest first
    fn history(&self, user_id: &str) -> Result<Vec<PredictionRecord>>;
    /// A user's estimate log, newest first
    fn estimate_history(&self, user_id: &str) -> Result<Vec<EstimateHistoryRecord>>;
    fn get_prediction(&self, id: u64) -> Result<Option<PredictionRecord>>;
    fn prediction_count(&self) -> Result<u64>;
}

/// Build both records for a result, validating and auditing the full one
fn build_records(
    user_id: &str,
    result: &PredictionResult,
    extras: &PredictionExtras,
    ids: PersistedIds,
) -> Result<(PredictionRecord, EstimateHistoryRecord)> {
    let record = PredictionRecord::new(ids.prediction_id, user_id, result, extras);
    record.validate()?;
    audit::audit(&record);
    let estimate = EstimateHistoryRecord::new(ids.history_id, user_id, result);
    Ok((record, estimate))
}

fn newest_first_predictions(records: &mut [PredictionRecord]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

fn newest_first_estimates(records: &mut [EstimateHistoryRecord]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

/// Sled-backed implementation
pub struct SledStorage {
    db: Db,
    predictions: Tree,
    estimates: Tree,
}

impl SledStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        let predictions = db.open_tree("predictions")?;
        let estimates = db.open_tree("estimate_history")?;
        Ok(Self {
            db,
            predictions,
            estimates,
        })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl PredictionSink for SledStorage {
    fn persist(
        &self,
        user_id: &str,
        result: &PredictionResult,
        extras: &PredictionExtras,
    ) -> Result<PersistedIds> {
        let ids = PersistedIds {
            prediction_id: self.db.generate_id()?,
            history_id: self.db.generate_id()?,
        };
        let (record, estimate) = build_records(user_id, result, extras, ids)?;
        let record_value = serde_json::to_vec(&record)?;
        let estimate_value = serde_json::to_vec(&estimate)?;

        // Both rows land together or not at all.
        (&self.predictions, &self.estimates)
            .transaction(|(predictions, estimates)| {
                let prediction_key = record.id.to_be_bytes();
                let estimate_key = estimate.id.to_be_bytes();
                if predictions.get(prediction_key)?.is_some() {
                    return abort(StorageError::InvalidRecord(format!(
                        "prediction id {} already in use",
                        record.id
                    )));
                }
                predictions.insert(&prediction_key[..], record_value.as_slice())?;
                if estimates.get(estimate_key)?.is_some() {
                    return abort(StorageError::InvalidRecord(format!(
                        "estimate id {} already in use",
                        estimate.id
                    )));
                }
                estimates.insert(&estimate_key[..], estimate_value.as_slice())?;
                Ok(())
            })
            .map_err(|err| match err {
                TransactionError::Abort(err) => err,
                TransactionError::Storage(err) => StorageError::Database(err),
            })?;
        debug!(
            "Persisted prediction {} and estimate {} for {}",
            ids.prediction_id, ids.history_id, user_id
        );
        Ok(ids)
    }
}

impl PredictionStore for SledStorage {
    fn history(&self, user_id: &str) -> Result<Vec<PredictionRecord>> {
        let mut records = Vec::new();
        for item in self.predictions.iter() {
            let (_, v) = item?;
            let record: PredictionRecord = serde_json::from_slice(&v)?;
            if record.user_id == user_id {
                records.push(record);
            }
        }
        newest_first_predictions(&mut records);
        Ok(records)
    }

    fn estimate_history(&self, user_id: &str) -> Result<Vec<EstimateHistoryRecord>> {
        let mut records = Vec::new();
        for item in self.estimates.iter() {
            let (_, v) = item?;
            let record: EstimateHistoryRecord = serde_json::from_slice(&v)?;
            if record.user_id == user_id {
                records.push(record);
            }
        }
        newest_first_estimates(&mut records);
        Ok(records)
    }

    fn get_prediction(&self, id: u64) -> Result<Option<PredictionRecord>> {
        self.predictions
            .get(id.to_be_bytes())?
            .map(|v| serde_json::from_slice(&v))
            .transpose()
            .map_err(Into::into)
    }

    fn prediction_count(&self) -> Result<u64> {
        Ok(self.predictions.len() as u64)
    }
}

/// In-memory backend
pub struct MemoryStorage {
    next_id: AtomicU64,
    predictions: Arc<RwLock<Vec<PredictionRecord>>>,
    estimates: Arc<RwLock<Vec<EstimateHistoryRecord>>>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            predictions: Arc::new(RwLock::new(Vec::new())),
            estimates: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn generate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl PredictionSink for MemoryStorage {
    fn persist(
        &self,
        user_id: &str,
        result: &PredictionResult,
        extras: &PredictionExtras,
    ) -> Result<PersistedIds> {
        let ids = PersistedIds {
            prediction_id: self.generate_id(),
            history_id: self.generate_id(),
        };
        let (record, estimate) = build_records(user_id, result, extras, ids)?;
        self.predictions.write().push(record);
        self.estimates.write().push(estimate);
        Ok(ids)
    }
}

impl PredictionStore for MemoryStorage {
    fn history(&self, user_id: &str) -> Result<Vec<PredictionRecord>> {
        let mut records: Vec<_> = self
            .predictions
            .read()
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        newest_first_predictions(&mut records);
        Ok(records)
    }

    fn estimate_history(&self, user_id: &str) -> Result<Vec<EstimateHistoryRecord>> {
        let mut records: Vec<_> = self
            .estimates
            .read()
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        newest_first_estimates(&mut records);
        Ok(records)
    }

    fn get_prediction(&self, id: u64) -> Result<Option<PredictionRecord>> {
        Ok(self.predictions.read().iter().find(|r| r.id == id).cloned())
    }

    fn prediction_count(&self) -> Result<u64> {
        Ok(self.predictions.read().len() as u64)
    }
}
