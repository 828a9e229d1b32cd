//! Visit models.

use serde::{Deserialize, Deserializer, Serialize};

use super::ValidationError;

/// A single visit, exclusively owned by one patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub id: String,
    /// Owning patient
    #[serde(default)]
    pub patient_id: String,
    /// Visit date (RFC 3339 or calendar date, as entered)
    pub date: String,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub prescription: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "bool_or_int")]
    pub xray_required: bool,
    /// Image payloads (base64 text) in upload order
    #[serde(default)]
    pub images: Vec<String>,
    /// Attached file payload (base64 text)
    #[serde(default)]
    pub file_data: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
}

impl Visit {
    /// Build the mirror copy of a freshly created visit.
    pub fn from_new(id: String, patient_id: String, fields: NewVisit) -> Self {
        let (file_data, file_name, file_type) = match fields.file {
            Some(file) => (Some(file.data), Some(file.name), Some(file.mime_type)),
            None => (None, None, None),
        };
        Self {
            id,
            patient_id,
            date: fields.date,
            diagnosis: fields.diagnosis,
            prescription: fields.prescription,
            notes: fields.notes,
            xray_required: fields.xray_required,
            images: fields.images,
            file_data,
            file_name,
            file_type,
        }
    }

    /// The attached file, if a payload is present.
    pub fn attachment(&self) -> Option<VisitFile> {
        let data = self.file_data.as_ref().filter(|d| !d.is_empty())?;
        Some(VisitFile {
            data: data.clone(),
            name: self.file_name.clone().unwrap_or_default(),
            mime_type: self
                .file_type
                .clone()
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
        })
    }
}

/// Content type assumed when none was recorded.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A file attached to a visit, payload encoded as base64 text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitFile {
    pub data: String,
    pub name: String,
    pub mime_type: String,
}

/// Fields for creating a visit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewVisit {
    pub date: String,
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
    pub notes: Option<String>,
    pub xray_required: bool,
    pub images: Vec<String>,
    pub file: Option<VisitFile>,
}

impl NewVisit {
    pub fn new(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.date.trim().is_empty() {
            return Err(ValidationError::MissingField("date"));
        }
        Ok(())
    }

    /// Body of `POST /api/patients/:patientId/visits`.
    pub fn to_request(&self) -> NewVisitRequest<'_> {
        NewVisitRequest {
            date: &self.date,
            diagnosis: self.diagnosis.as_deref(),
            prescription: self.prescription.as_deref(),
            notes: self.notes.as_deref(),
            xray_required: self.xray_required,
            images: &self.images,
            file_data: self.file.as_ref().map(|f| f.data.as_str()),
            file_name: self.file.as_ref().map(|f| f.name.as_str()),
            file_type: self.file.as_ref().map(|f| f.mime_type.as_str()),
        }
    }
}

/// Wire form of a new visit, with the attachment flattened.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVisitRequest<'a> {
    pub date: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prescription: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<&'a str>,
    pub xray_required: bool,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    pub images: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_data: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<&'a str>,
}

/// The record service stores the flag as a SQL boolean and returns `0`/`1`.
fn bool_or_int<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Null(()),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
        Flag::Null(()) => false,
    })
}
