//! Clinic Records Core Library
//!
//! Patients, their visits and attached files/images, mirrored from a
//! clinic record service with a durable local fallback.
//!
//! # Architecture
//!
//! ```text
//!                        caller (UI / FFI)
//!                               │
//!                         ClinicStore
//!                               │
//!              ┌────────────────┴────────────────┐
//!              │ 1. attempt                      │ 2. on failure
//!              ▼                                 ▼
//!      RecordService (HTTP)              in-memory Mirror
//!              │ ok                              │
//!              └───────────────┬─────────────────┘
//!                              ▼
//!                   apply change to Mirror
//!                              │
//!                              ▼
//!            persist whole Mirror → durable cache (SQLite)
//! ```
//!
//! # Core Principle
//!
//! **Available over consistent.** Record service failures degrade to the
//! local mirror instead of failing the caller, except where no local
//! equivalent exists (file download).
//!
//! # Modules
//!
//! - [`models`]: Domain types (Patient, Visit, partial updates)
//! - [`remote`]: Record service adapter (trait + reqwest client)
//! - [`db`]: SQLite durable cache for the mirror
//! - [`store`]: Mirror and remote/local reconciliation
//! - [`config`]: Environment-driven configuration

pub mod config;
pub mod db;
pub mod models;
pub mod remote;
pub mod store;

// Re-export commonly used types
pub use config::StoreConfig;
pub use db::Database;
pub use models::{NewPatient, NewVisit, Patient, PatientUpdate, Sex, ValidationError, Visit, VisitFile};
pub use remote::{DownloadedFile, HttpRecordService, RecordService};
pub use store::{ClinicStore, DataSource, Mirror, StoreError};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ClinicRecordsError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Record service error: {0}")]
    ServiceError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Runtime error: {0}")]
    RuntimeError(String),
}

impl From<ValidationError> for ClinicRecordsError {
    fn from(e: ValidationError) -> Self {
        ClinicRecordsError::InvalidInput(e.to_string())
    }
}

impl From<db::DbError> for ClinicRecordsError {
    fn from(e: db::DbError) -> Self {
        ClinicRecordsError::CacheError(e.to_string())
    }
}

impl From<remote::RemoteError> for ClinicRecordsError {
    fn from(e: remote::RemoteError) -> Self {
        ClinicRecordsError::ServiceError(e.to_string())
    }
}

impl From<config::ConfigError> for ClinicRecordsError {
    fn from(e: config::ConfigError) -> Self {
        ClinicRecordsError::ConfigError(e.to_string())
    }
}

impl From<StoreError> for ClinicRecordsError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Validation(e) => e.into(),
            StoreError::Cache(e) => e.into(),
            StoreError::Remote(e) => e.into(),
            StoreError::Attachment(e) => ClinicRecordsError::CacheError(e.to_string()),
        }
    }
}

impl From<std::io::Error> for ClinicRecordsError {
    fn from(e: std::io::Error) -> Self {
        ClinicRecordsError::RuntimeError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for ClinicRecordsError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ClinicRecordsError::RuntimeError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Install a tracing subscriber. `filter` falls back to `RUST_LOG`, then `info`.
/// Later calls are no-ops.
#[uniffi::export]
pub fn init_logging(filter: Option<String>) {
    let filter = filter
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".into());

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Open a store against a record service, with the durable cache at `cache_path`.
#[uniffi::export]
pub fn open_store(
    service_url: String,
    cache_path: String,
) -> Result<Arc<ClinicRecordsCore>, ClinicRecordsError> {
    ClinicRecordsCore::open(StoreConfig::new(service_url, cache_path))
}

/// Open a store configured from `CLINIC_*` environment variables.
#[uniffi::export]
pub fn open_store_with_config() -> Result<Arc<ClinicRecordsCore>, ClinicRecordsError> {
    ClinicRecordsCore::open(StoreConfig::from_env()?)
}

// =========================================================================
// Main API Object
// =========================================================================

/// Blocking, thread-safe store wrapper for FFI.
#[derive(uniffi::Object)]
pub struct ClinicRecordsCore {
    runtime: tokio::runtime::Runtime,
    store: Mutex<ClinicStore<HttpRecordService>>,
}

impl ClinicRecordsCore {
    fn open(config: StoreConfig) -> Result<Arc<Self>, ClinicRecordsError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        let service = HttpRecordService::from_config(&config)?;
        let cache = Database::open(&config.cache_path)?;
        let store = runtime.block_on(ClinicStore::load(service, cache))?;

        Ok(Arc::new(Self {
            runtime,
            store: Mutex::new(store),
        }))
    }
}

#[uniffi::export]
impl ClinicRecordsCore {
    // =========================================================================
    // Patient Operations
    // =========================================================================

    /// All patients currently in the mirror.
    pub fn list_patients(&self) -> Result<Vec<FfiPatient>, ClinicRecordsError> {
        let store = self.store.lock()?;
        Ok(store.patients().iter().cloned().map(Into::into).collect())
    }

    /// Create a patient and return its id.
    pub fn add_patient(&self, patient: FfiNewPatient) -> Result<String, ClinicRecordsError> {
        let fields = NewPatient::try_from(patient)?;
        let mut store = self.store.lock()?;
        Ok(self.runtime.block_on(store.add_patient(fields))?)
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, id: String) -> Result<Option<FfiPatient>, ClinicRecordsError> {
        let mut store = self.store.lock()?;
        let patient = self.runtime.block_on(store.get_patient(&id))?;
        Ok(patient.map(Into::into))
    }

    /// Apply a partial update to a patient.
    pub fn update_patient(
        &self,
        id: String,
        update: FfiPatientUpdate,
    ) -> Result<(), ClinicRecordsError> {
        let update = PatientUpdate::try_from(update)?;
        let mut store = self.store.lock()?;
        Ok(self.runtime.block_on(store.update_patient(&id, update))?)
    }

    /// Delete a patient with all its visits.
    pub fn delete_patient(&self, id: String) -> Result<(), ClinicRecordsError> {
        let mut store = self.store.lock()?;
        Ok(self.runtime.block_on(store.delete_patient(&id))?)
    }

    /// Search patients by name, diagnosis or notes.
    pub fn search_patients(&self, query: String) -> Result<Vec<FfiPatient>, ClinicRecordsError> {
        let mut store = self.store.lock()?;
        let patients = self.runtime.block_on(store.search_patients(&query))?;
        Ok(patients.into_iter().map(Into::into).collect())
    }

    // =========================================================================
    // Visit Operations
    // =========================================================================

    /// Add a visit to a patient and return its id.
    pub fn add_visit(
        &self,
        patient_id: String,
        visit: FfiNewVisit,
    ) -> Result<String, ClinicRecordsError> {
        let mut store = self.store.lock()?;
        Ok(self.runtime.block_on(store.add_visit(&patient_id, visit.into()))?)
    }

    /// Download a visit's attached file.
    pub fn download_visit_file(
        &self,
        visit_id: String,
    ) -> Result<Option<FfiDownloadedFile>, ClinicRecordsError> {
        let mut store = self.store.lock()?;
        let file = self.runtime.block_on(store.download_visit_file(&visit_id))?;
        Ok(file.map(Into::into))
    }

    // =========================================================================
    // Sync Operations
    // =========================================================================

    /// Reload the mirror from the record service (or the cache if unreachable).
    pub fn refresh(&self) -> Result<(), ClinicRecordsError> {
        let mut store = self.store.lock()?;
        Ok(self.runtime.block_on(store.refresh())?)
    }

    /// True if the last operation was served by the local fallback.
    pub fn is_offline(&self) -> Result<bool, ClinicRecordsError> {
        let store = self.store.lock()?;
        Ok(store.last_source() == DataSource::Local)
    }

    /// Drop the durable cache entry.
    pub fn clear_cache(&self) -> Result<bool, ClinicRecordsError> {
        let store = self.store.lock()?;
        Ok(store.clear_cache()?)
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: String,
    pub name: String,
    pub age: u32,
    pub sex: String,
    pub contact: Option<String>,
    pub diagnosis: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub visits: Vec<FfiVisit>,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            id: patient.id,
            name: patient.name,
            age: patient.age,
            sex: patient.sex.to_string(),
            contact: patient.contact,
            diagnosis: patient.diagnosis,
            notes: patient.notes,
            created_at: patient.created_at,
            visits: patient.visits.into_iter().map(Into::into).collect(),
        }
    }
}

/// FFI-safe visit.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVisit {
    pub id: String,
    pub patient_id: String,
    pub date: String,
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
    pub notes: Option<String>,
    pub xray_required: bool,
    pub images: Vec<String>,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub has_file: bool,
}

impl From<Visit> for FfiVisit {
    fn from(visit: Visit) -> Self {
        let has_file = visit.attachment().is_some();
        Self {
            id: visit.id,
            patient_id: visit.patient_id,
            date: visit.date,
            diagnosis: visit.diagnosis,
            prescription: visit.prescription,
            notes: visit.notes,
            xray_required: visit.xray_required,
            images: visit.images,
            file_name: visit.file_name,
            file_type: visit.file_type,
            has_file,
        }
    }
}

/// FFI-safe patient creation fields.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewPatient {
    pub name: String,
    pub age: u32,
    pub sex: String,
    pub contact: Option<String>,
    pub diagnosis: Option<String>,
    pub notes: Option<String>,
}

impl TryFrom<FfiNewPatient> for NewPatient {
    type Error = ValidationError;

    fn try_from(p: FfiNewPatient) -> Result<Self, Self::Error> {
        Ok(NewPatient {
            name: p.name,
            age: p.age,
            sex: p.sex.parse()?,
            contact: p.contact,
            diagnosis: p.diagnosis,
            notes: p.notes,
        })
    }
}

/// FFI-safe partial update.
#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct FfiPatientUpdate {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub sex: Option<String>,
    pub contact: Option<String>,
    pub diagnosis: Option<String>,
    pub notes: Option<String>,
}

impl TryFrom<FfiPatientUpdate> for PatientUpdate {
    type Error = ValidationError;

    fn try_from(u: FfiPatientUpdate) -> Result<Self, Self::Error> {
        Ok(PatientUpdate {
            name: u.name,
            age: u.age,
            sex: u.sex.map(|s| s.parse()).transpose()?,
            contact: u.contact,
            diagnosis: u.diagnosis,
            notes: u.notes,
        })
    }
}

/// FFI-safe visit creation fields.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewVisit {
    pub date: String,
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
    pub notes: Option<String>,
    pub xray_required: bool,
    pub images: Vec<String>,
    pub file_data: Option<String>,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
}

impl From<FfiNewVisit> for NewVisit {
    fn from(v: FfiNewVisit) -> Self {
        let file = v.file_data.map(|data| VisitFile {
            data,
            name: v.file_name.unwrap_or_default(),
            mime_type: v
                .file_type
                .unwrap_or_else(|| models::DEFAULT_CONTENT_TYPE.to_string()),
        });
        NewVisit {
            date: v.date,
            diagnosis: v.diagnosis,
            prescription: v.prescription,
            notes: v.notes,
            xray_required: v.xray_required,
            images: v.images,
            file,
        }
    }
}

/// FFI-safe downloaded file.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDownloadedFile {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
}

impl From<DownloadedFile> for FfiDownloadedFile {
    fn from(file: DownloadedFile) -> Self {
        Self {
            bytes: file.bytes,
            file_name: file.file_name,
            content_type: file.content_type,
        }
    }
}
