//! Patient models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{ValidationError, Visit};

/// Patient sex as recorded by the clinic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Sex {
    Male,
    Female,
    Other,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "Male",
            Sex::Female => "Female",
            Sex::Other => "Other",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sex {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Male" => Ok(Sex::Male),
            "Female" => Ok(Sex::Female),
            "Other" => Ok(Sex::Other),
            other => Err(ValidationError::InvalidValue {
                field: "sex",
                value: other.to_string(),
            }),
        }
    }
}

/// A patient record with its visits nested in entry order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    /// Globally unique, assigned at creation
    pub id: String,
    pub name: String,
    pub age: u32,
    pub sex: Sex,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
    /// Visits in insertion order, not sorted by date
    #[serde(default)]
    pub visits: Vec<Visit>,
}

impl Patient {
    /// Build the mirror copy of a freshly created patient.
    ///
    /// `created_at` is the local clock, not the record service's stored
    /// timestamp; the two can drift.
    pub fn from_new(id: String, fields: NewPatient) -> Self {
        Self {
            id,
            name: fields.name,
            age: fields.age,
            sex: fields.sex,
            contact: fields.contact,
            diagnosis: fields.diagnosis,
            notes: fields.notes,
            created_at: chrono::Utc::now().to_rfc3339(),
            visits: Vec::new(),
        }
    }

    /// Merge a partial update into this record. Absent fields are left alone.
    pub fn apply_update(&mut self, update: &PatientUpdate) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(age) = update.age {
            self.age = age;
        }
        if let Some(sex) = update.sex {
            self.sex = sex;
        }
        if let Some(contact) = &update.contact {
            self.contact = Some(contact.clone());
        }
        if let Some(diagnosis) = &update.diagnosis {
            self.diagnosis = Some(diagnosis.clone());
        }
        if let Some(notes) = &update.notes {
            self.notes = Some(notes.clone());
        }
    }

    /// Find one of this patient's visits.
    pub fn visit(&self, visit_id: &str) -> Option<&Visit> {
        self.visits.iter().find(|v| v.id == visit_id)
    }
}

/// Fields for creating a patient. Body of `POST /api/patients`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewPatient {
    pub name: String,
    pub age: u32,
    pub sex: Sex,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NewPatient {
    /// Create with the required fields.
    pub fn new(name: impl Into<String>, age: u32, sex: Sex) -> Self {
        Self {
            name: name.into(),
            age,
            sex,
            contact: None,
            diagnosis: None,
            notes: None,
        }
    }

    /// Required: non-blank name. Age and sex are present by construction.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        Ok(())
    }
}

/// Partial update restricted to the whitelisted patient fields.
///
/// Deserializing an arbitrary JSON object into this type silently drops
/// every key outside the whitelist (`id`, `createdAt`, `visits`, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatientUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<Sex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl PatientUpdate {
    /// Field names eligible for partial update.
    pub const WHITELIST: [&'static str; 6] = ["name", "age", "sex", "contact", "diagnosis", "notes"];

    /// True when no whitelisted field is set.
    pub fn is_empty(&self) -> bool {
        self.field_names().is_empty()
    }

    /// Names of the fields this update sets, in whitelist order.
    pub fn field_names(&self) -> Vec<&'static str> {
        let set = [
            self.name.is_some(),
            self.age.is_some(),
            self.sex.is_some(),
            self.contact.is_some(),
            self.diagnosis.is_some(),
            self.notes.is_some(),
        ];
        Self::WHITELIST
            .iter()
            .zip(set)
            .filter_map(|(name, present)| present.then_some(*name))
            .collect()
    }

    /// Only an empty update is rejected; field values pass through as the
    /// record service accepts them.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::EmptyUpdate);
        }
        Ok(())
    }
}
