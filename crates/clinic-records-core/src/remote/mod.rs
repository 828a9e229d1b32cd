//! Remote store adapter for the clinic record service.
//!
//! Contract (HTTP/JSON):
//!
//! | Operation           | Request                               | Success             |
//! |---------------------|---------------------------------------|---------------------|
//! | List patients       | `GET /api/patients`                   | `[Patient]`         |
//! | Get patient         | `GET /api/patients/:id`               | `Patient` or 404    |
//! | Create patient      | `POST /api/patients`                  | 201 `{id}`          |
//! | Update patient      | `PUT /api/patients/:id`               | `{success: true}`   |
//! | Delete patient      | `DELETE /api/patients/:id`            | `{success: true}`   |
//! | Add visit           | `POST /api/patients/:patientId/visits`| 201 `{id}`          |
//! | Search              | `GET /api/search?query=Q`             | `[Patient]`         |
//! | Download visit file | `GET /api/visits/:visitId/file`       | binary body or 404  |
//!
//! Not-found is a successful `None`, never an error.

mod http;

pub use http::*;

use base64::Engine;
use serde::Deserialize;
use thiserror::Error;

use crate::models::{NewPatient, NewVisit, Patient, PatientUpdate, VisitFile};

/// Failures talking to the record service. Every variant means the
/// service could not be used and the caller may fall back.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Record service returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RemoteError::Decode(e.to_string())
        } else {
            RemoteError::Transport(e.to_string())
        }
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Body of a 201 response.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedId {
    pub id: String,
}

/// Raw file returned by the download endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedFile {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
}

impl DownloadedFile {
    /// Decode a mirrored attachment the way the download endpoint does.
    /// An attachment without a name is named after its visit.
    pub fn from_attachment(visit_id: &str, file: VisitFile) -> Result<Self, base64::DecodeError> {
        let bytes = base64::engine::general_purpose::STANDARD.decode(file.data.as_bytes())?;
        let file_name = if file.name.is_empty() {
            visit_id.to_string()
        } else {
            file.name
        };
        Ok(Self {
            bytes,
            file_name,
            content_type: file.mime_type,
        })
    }
}

/// Operations offered by the record service.
///
/// Implementations perform no mirror bookkeeping; they return data for
/// the store to apply.
#[allow(async_fn_in_trait)]
pub trait RecordService {
    /// All patients with visits and images resolved.
    async fn list_patients(&self) -> RemoteResult<Vec<Patient>>;

    /// One patient, `None` when the service reports absence.
    async fn get_patient(&self, id: &str) -> RemoteResult<Option<Patient>>;

    /// Create a patient and return the service-assigned id.
    async fn create_patient(&self, fields: &NewPatient) -> RemoteResult<String>;

    /// Apply a whitelisted partial update.
    async fn update_patient(&self, id: &str, update: &PatientUpdate) -> RemoteResult<()>;

    /// Delete a patient and, by cascade, its visits and images.
    async fn delete_patient(&self, id: &str) -> RemoteResult<()>;

    /// Create a visit (plus one image row per payload) and return its id.
    ///
    /// The visit row and each image row are written independently; a
    /// failure part way leaves a partially populated visit behind.
    async fn add_visit(&self, patient_id: &str, fields: &NewVisit) -> RemoteResult<String>;

    /// Case-insensitive substring search over name, diagnosis and notes.
    async fn search_patients(&self, query: &str) -> RemoteResult<Vec<Patient>>;

    /// The visit's attached file, `None` if nothing is attached.
    async fn download_visit_file(&self, visit_id: &str) -> RemoteResult<Option<DownloadedFile>>;
}
