//! reqwest-backed record service client.

use std::time::Duration;

use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::{CreatedId, DownloadedFile, RecordService, RemoteError, RemoteResult};
use crate::config::StoreConfig;
use crate::models::{NewPatient, NewVisit, Patient, PatientUpdate, DEFAULT_CONTENT_TYPE};

/// Error body the record service sends with non-2xx statuses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Record service reached over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpRecordService {
    client: Client,
    base_url: String,
}

impl HttpRecordService {
    /// Client with no request timeout.
    pub fn new(base_url: impl Into<String>) -> RemoteResult<Self> {
        Self::build(base_url.into(), None)
    }

    pub fn from_config(config: &StoreConfig) -> RemoteResult<Self> {
        Self::build(config.service_url.clone(), config.request_timeout)
    }

    fn build(base_url: String, timeout: Option<Duration>) -> RemoteResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Pass 2xx responses through, turn anything else into `RemoteError::Status`.
async fn ensure_success(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);

    Err(RemoteError::Status {
        status: status.as_u16(),
        message,
    })
}

/// Extract the filename from `attachment; filename="report.pdf"`.
pub fn parse_content_disposition(header: &str) -> Option<String> {
    header.split(';').find_map(|part| {
        let value = part.trim().strip_prefix("filename=")?;
        let name = value.trim().trim_matches('"');
        (!name.is_empty()).then(|| name.to_string())
    })
}

impl RecordService for HttpRecordService {
    async fn list_patients(&self) -> RemoteResult<Vec<Patient>> {
        debug!("GET /api/patients");
        let response = self.client.get(self.url("/api/patients")).send().await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    async fn get_patient(&self, id: &str) -> RemoteResult<Option<Patient>> {
        debug!(patient_id = id, "GET /api/patients/:id");
        let response = self
            .client
            .get(self.url(&format!("/api/patients/{}", id)))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(ensure_success(response).await?.json().await?))
    }

    async fn create_patient(&self, fields: &NewPatient) -> RemoteResult<String> {
        debug!(name = %fields.name, "POST /api/patients");
        let response = self
            .client
            .post(self.url("/api/patients"))
            .json(fields)
            .send()
            .await?;

        let created: CreatedId = ensure_success(response).await?.json().await?;
        Ok(created.id)
    }

    async fn update_patient(&self, id: &str, update: &PatientUpdate) -> RemoteResult<()> {
        debug!(patient_id = id, fields = ?update.field_names(), "PUT /api/patients/:id");
        let response = self
            .client
            .put(self.url(&format!("/api/patients/{}", id)))
            .json(update)
            .send()
            .await?;

        ensure_success(response).await?;
        Ok(())
    }

    async fn delete_patient(&self, id: &str) -> RemoteResult<()> {
        debug!(patient_id = id, "DELETE /api/patients/:id");
        let response = self
            .client
            .delete(self.url(&format!("/api/patients/{}", id)))
            .send()
            .await?;

        ensure_success(response).await?;
        Ok(())
    }

    async fn add_visit(&self, patient_id: &str, fields: &NewVisit) -> RemoteResult<String> {
        debug!(
            patient_id,
            images = fields.images.len(),
            "POST /api/patients/:patientId/visits"
        );
        let response = self
            .client
            .post(self.url(&format!("/api/patients/{}/visits", patient_id)))
            .json(&fields.to_request())
            .send()
            .await?;

        let created: CreatedId = ensure_success(response).await?.json().await?;
        Ok(created.id)
    }

    async fn search_patients(&self, query: &str) -> RemoteResult<Vec<Patient>> {
        debug!(query, "GET /api/search");
        let response = self
            .client
            .get(self.url("/api/search"))
            .query(&[("query", query)])
            .send()
            .await?;

        Ok(ensure_success(response).await?.json().await?)
    }

    async fn download_visit_file(&self, visit_id: &str) -> RemoteResult<Option<DownloadedFile>> {
        debug!(visit_id, "GET /api/visits/:visitId/file");
        let response = self
            .client
            .get(self.url(&format!("/api/visits/{}/file", visit_id)))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success(response).await?;

        let headers = response.headers();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let file_name = headers
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_disposition)
            .unwrap_or_else(|| visit_id.to_string());

        let bytes = response.bytes().await?.to_vec();

        Ok(Some(DownloadedFile {
            bytes,
            file_name,
            content_type,
        }))
    }
}
