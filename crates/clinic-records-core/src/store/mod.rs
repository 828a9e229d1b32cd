//! Patient store with remote-first reads and writes and a local fallback.
//!
//! Every operation takes one of two explicit paths:
//!
//! - **Remote**: the record service accepted the call. The same change is
//!   applied to the in-memory mirror.
//! - **Local**: the record service failed. An equivalent change is applied
//!   to the mirror only (creations get a locally generated id) and the
//!   failure is logged, not returned.
//!
//! After any mutation the whole mirror is written to the durable cache.
//! Mutating methods take `&mut self`, so one store has a single mutator.

mod mirror;

pub use mirror::*;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::db::{Database, DbError};
use crate::models::{NewPatient, NewVisit, Patient, PatientUpdate, ValidationError, Visit};
use crate::remote::{DownloadedFile, RecordService, RemoteError, RemoteResult};

/// Store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Cache error: {0}")]
    Cache(#[from] DbError),

    #[error("Record service error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Unreadable attachment: {0}")]
    Attachment(#[from] base64::DecodeError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Which tier served the most recent operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// The record service answered
    Remote,
    /// The record service failed; the mirror or durable cache answered
    Local,
}

/// Patient store mirroring a record service.
pub struct ClinicStore<S> {
    service: S,
    cache: Database,
    mirror: Mirror,
    last_source: DataSource,
}

impl<S: RecordService> ClinicStore<S> {
    /// Build the store and run the initial load.
    ///
    /// The mirror comes from the record service when reachable, otherwise
    /// verbatim from the durable cache (never a merge of the two).
    pub async fn load(service: S, cache: Database) -> StoreResult<Self> {
        let mut store = Self {
            service,
            cache,
            mirror: Mirror::default(),
            last_source: DataSource::Local,
        };
        store.refresh().await?;
        Ok(store)
    }

    /// Re-run the initial load, replacing the whole mirror.
    pub async fn refresh(&mut self) -> StoreResult<()> {
        match self.service.list_patients().await {
            Ok(patients) => {
                info!(count = patients.len(), "Loaded patients from record service");
                self.mirror.replace_all(patients);
                self.last_source = DataSource::Remote;
                self.persist();
            }
            Err(e) => {
                warn!(error = %e, "Record service unavailable, loading durable cache");
                let patients = self.read_cache()?;
                info!(count = patients.len(), "Loaded patients from durable cache");
                self.mirror.replace_all(patients);
                self.last_source = DataSource::Local;
            }
        }
        Ok(())
    }

    /// Cached collection, with corrupt entries treated as empty.
    fn read_cache(&self) -> StoreResult<Vec<Patient>> {
        match self.cache.load_mirror() {
            Ok(patients) => Ok(patients.unwrap_or_default()),
            Err(e @ (DbError::Corrupt(_) | DbError::Json(_))) => {
                error!(error = %e, "Discarding unreadable durable cache");
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write the whole mirror to the durable cache. Failures are logged.
    fn persist(&self) {
        if let Err(e) = self.cache.save_mirror(self.mirror.patients()) {
            error!(error = %e, "Failed to persist patient mirror");
        }
    }

    /// Record which path an operation took, logging fallbacks.
    fn settle<T>(&mut self, result: RemoteResult<T>, op: &str, subject: &str) -> Option<T> {
        match result {
            Ok(value) => {
                self.last_source = DataSource::Remote;
                Some(value)
            }
            Err(e) => {
                warn!(operation = op, subject, error = %e, "Record service failed, using local fallback");
                self.last_source = DataSource::Local;
                None
            }
        }
    }

    /// All patients in the mirror, insertion order.
    pub fn patients(&self) -> &[Patient] {
        self.mirror.patients()
    }

    pub fn mirror(&self) -> &Mirror {
        &self.mirror
    }

    /// Tier that served the last completed operation.
    pub fn last_source(&self) -> DataSource {
        self.last_source
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn cache(&self) -> &Database {
        &self.cache
    }

    /// Create a patient. Always yields a usable id once validation passes.
    pub async fn add_patient(&mut self, fields: NewPatient) -> StoreResult<String> {
        fields.validate()?;

        let result = self.service.create_patient(&fields).await;
        let id = match self.settle(result, "add_patient", &fields.name) {
            Some(id) => id,
            None => uuid::Uuid::new_v4().to_string(),
        };

        self.mirror.insert(Patient::from_new(id.clone(), fields));
        self.persist();
        Ok(id)
    }

    /// Fetch one patient; served from the mirror if the service fails.
    pub async fn get_patient(&mut self, id: &str) -> StoreResult<Option<Patient>> {
        let result = self.service.get_patient(id).await;
        Ok(match self.settle(result, "get_patient", id) {
            Some(found) => found,
            None => self.mirror.get(id).cloned(),
        })
    }

    /// Apply a whitelisted partial update.
    pub async fn update_patient(&mut self, id: &str, update: PatientUpdate) -> StoreResult<()> {
        update.validate()?;

        let result = self.service.update_patient(id, &update).await;
        self.settle(result, "update_patient", id);

        self.mirror.apply_update(id, &update);
        self.persist();
        Ok(())
    }

    /// Delete a patient with its visits and images. Idempotent.
    pub async fn delete_patient(&mut self, id: &str) -> StoreResult<()> {
        let result = self.service.delete_patient(id).await;
        self.settle(result, "delete_patient", id);

        self.mirror.remove(id);
        self.persist();
        Ok(())
    }

    /// Append a visit to a patient and return its id.
    ///
    /// If the service writes the visit but fails on one of its images, the
    /// service keeps a partially populated visit; it is not retried or
    /// rolled back here.
    pub async fn add_visit(&mut self, patient_id: &str, fields: NewVisit) -> StoreResult<String> {
        fields.validate()?;

        let result = self.service.add_visit(patient_id, &fields).await;
        let id = match self.settle(result, "add_visit", patient_id) {
            Some(id) => id,
            None => uuid::Uuid::new_v4().to_string(),
        };

        let visit = Visit::from_new(id.clone(), patient_id.to_string(), fields);
        if !self.mirror.append_visit(visit) {
            warn!(patient_id, visit_id = %id, "Visit owner not in mirror, not mirrored");
        }
        self.persist();
        Ok(id)
    }

    /// Search by name, diagnosis or notes. A blank query returns nothing.
    pub async fn search_patients(&mut self, query: &str) -> StoreResult<Vec<Patient>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let result = self.service.search_patients(query).await;
        Ok(match self.settle(result, "search_patients", query) {
            Some(found) => found,
            None => self.mirror.search(query),
        })
    }

    /// Download a visit's attached file.
    ///
    /// On service failure the mirrored attachment is decoded instead. The
    /// error surfaces only when the visit is not in the mirror.
    pub async fn download_visit_file(&mut self, visit_id: &str) -> StoreResult<Option<DownloadedFile>> {
        let err = match self.service.download_visit_file(visit_id).await {
            Ok(file) => {
                self.last_source = DataSource::Remote;
                return Ok(file);
            }
            Err(e) => e,
        };

        let Some(visit) = self.mirror.find_visit(visit_id) else {
            return Err(err.into());
        };
        warn!(operation = "download_visit_file", subject = visit_id, error = %err, "Record service failed, using local fallback");
        let file = visit
            .attachment()
            .map(|file| DownloadedFile::from_attachment(visit_id, file))
            .transpose()?;
        self.last_source = DataSource::Local;
        Ok(file)
    }

    /// Drop the durable cache entry. The mirror is untouched.
    pub fn clear_cache(&self) -> StoreResult<bool> {
        Ok(self.cache.clear_mirror()?)
    }
}
