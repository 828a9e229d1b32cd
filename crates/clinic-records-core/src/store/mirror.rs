//! In-memory mirror of the patient collection.

use crate::models::{Patient, PatientUpdate, Visit};

/// Case-insensitive substring match over name, diagnosis and notes.
///
/// The record service applies the same rule to the untrimmed query, so
/// remote and local search agree. A blank query matches nothing.
pub fn matches_query(patient: &Patient, query: &str) -> bool {
    if query.trim().is_empty() {
        return false;
    }
    let needle = query.to_lowercase();
    let contains = |field: &str| field.to_lowercase().contains(&needle);

    contains(&patient.name)
        || patient.diagnosis.as_deref().is_some_and(contains)
        || patient.notes.as_deref().is_some_and(contains)
}

/// Ordered patient collection mirroring the record service.
///
/// Updates are always incremental (append, field merge, removal); only
/// `replace_all` swaps the whole collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mirror {
    patients: Vec<Patient>,
}

impl Mirror {
    pub fn new(patients: Vec<Patient>) -> Self {
        Self { patients }
    }

    pub fn patients(&self) -> &[Patient] {
        &self.patients
    }

    pub fn get(&self, id: &str) -> Option<&Patient> {
        self.patients.iter().find(|p| p.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Patient> {
        self.patients.iter_mut().find(|p| p.id == id)
    }

    pub fn replace_all(&mut self, patients: Vec<Patient>) {
        self.patients = patients;
    }

    pub fn insert(&mut self, patient: Patient) {
        self.patients.push(patient);
    }

    /// Merge an update into the matching patient. Returns whether it was found.
    pub fn apply_update(&mut self, id: &str, update: &PatientUpdate) -> bool {
        match self.get_mut(id) {
            Some(patient) => {
                patient.apply_update(update);
                true
            }
            None => false,
        }
    }

    /// Remove a patient and everything it owns. Returns whether it was found.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.patients.len();
        self.patients.retain(|p| p.id != id);
        self.patients.len() != before
    }

    /// Append a visit to its owning patient. Visits for unknown patients
    /// are dropped so the mirror never holds orphans.
    pub fn append_visit(&mut self, visit: Visit) -> bool {
        match self.get_mut(&visit.patient_id) {
            Some(patient) => {
                patient.visits.push(visit);
                true
            }
            None => false,
        }
    }

    /// Local equivalent of the record service's search.
    pub fn search(&self, query: &str) -> Vec<Patient> {
        self.patients
            .iter()
            .filter(|p| matches_query(p, query))
            .cloned()
            .collect()
    }

    /// Find a visit by id across all patients.
    pub fn find_visit(&self, visit_id: &str) -> Option<&Visit> {
        self.patients
            .iter()
            .flat_map(|p| p.visits.iter())
            .find(|v| v.id == visit_id)
    }
}
