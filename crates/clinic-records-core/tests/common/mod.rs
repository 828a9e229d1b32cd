//! In-process stub of the clinic record service.
//!
//! Keeps patients, visits and images as separate row sets, enforces the
//! visit → patient reference and cascades deletes, and renders responses
//! in the same shape as the real service (including `xrayRequired` as
//! `0`/`1`). File payloads are base64-decoded on download.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use base64::Engine;
use serde_json::{json, Map, Value};

pub struct PatientRow {
    pub id: String,
    pub name: String,
    pub age: u64,
    pub sex: String,
    pub contact: Option<String>,
    pub diagnosis: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
}

pub struct VisitRow {
    pub id: String,
    pub patient_id: String,
    pub date: String,
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
    pub notes: Option<String>,
    pub xray_required: bool,
    pub file_data: Option<String>,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
}

pub struct ImageRow {
    pub id: String,
    pub visit_id: String,
    pub image_data: String,
}

#[derive(Default)]
pub struct ServiceState {
    pub patients: Vec<PatientRow>,
    pub visits: Vec<VisitRow>,
    pub images: Vec<ImageRow>,
    /// Fail the add-visit request when inserting this image index
    pub fail_image_at: Option<usize>,
    /// Answer every request with 500
    pub broken: bool,
    pub requests: usize,
}

impl ServiceState {
    fn render_patient(&self, patient: &PatientRow) -> Value {
        let visits: Vec<Value> = self
            .visits
            .iter()
            .filter(|v| v.patient_id == patient.id)
            .map(|visit| {
                let images: Vec<&str> = self
                    .images
                    .iter()
                    .filter(|i| i.visit_id == visit.id)
                    .map(|i| i.image_data.as_str())
                    .collect();
                json!({
                    "id": visit.id,
                    "patientId": visit.patient_id,
                    "date": visit.date,
                    "diagnosis": visit.diagnosis,
                    "prescription": visit.prescription,
                    "notes": visit.notes,
                    "xrayRequired": if visit.xray_required { 1 } else { 0 },
                    "fileData": visit.file_data,
                    "fileName": visit.file_name,
                    "fileType": visit.file_type,
                    "images": images,
                })
            })
            .collect();

        json!({
            "id": patient.id,
            "name": patient.name,
            "age": patient.age,
            "sex": patient.sex,
            "contact": patient.contact,
            "diagnosis": patient.diagnosis,
            "notes": patient.notes,
            "createdAt": patient.created_at,
            "visits": visits,
        })
    }
}

pub type Shared = Arc<Mutex<ServiceState>>;

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn text(body: &Value, key: &str) -> Option<String> {
    body.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn next_id(prefix: &str, state: &ServiceState) -> String {
    format!(
        "{}-{}",
        prefix,
        state.patients.len() + state.visits.len() + state.images.len() + state.requests
    )
}

/// Count the request and report whether the service is down.
fn enter(state: &mut ServiceState) -> Option<Response> {
    state.requests += 1;
    state
        .broken
        .then(|| error(StatusCode::INTERNAL_SERVER_ERROR, "Service unavailable"))
}

async fn list_patients(State(state): State<Shared>) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(down) = enter(&mut state) {
        return down;
    }
    let body: Vec<Value> = state.patients.iter().map(|p| state.render_patient(p)).collect();
    Json(body).into_response()
}

async fn get_patient(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(down) = enter(&mut state) {
        return down;
    }
    match state.patients.iter().find(|p| p.id == id) {
        Some(patient) => Json(state.render_patient(patient)).into_response(),
        None => error(StatusCode::NOT_FOUND, "Patient not found"),
    }
}

async fn create_patient(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(down) = enter(&mut state) {
        return down;
    }

    let name = text(&body, "name");
    let age = body.get("age").and_then(Value::as_u64).filter(|a| *a > 0);
    let sex = text(&body, "sex");
    let (Some(name), Some(age), Some(sex)) = (name, age, sex) else {
        return error(StatusCode::BAD_REQUEST, "Missing required fields");
    };

    let id = next_id("srv-p", &state);
    state.patients.push(PatientRow {
        id: id.clone(),
        name,
        age,
        sex,
        contact: text(&body, "contact"),
        diagnosis: text(&body, "diagnosis"),
        notes: text(&body, "notes"),
        created_at: "2024-01-01T08:00:00.000Z".to_string(),
    });

    (StatusCode::CREATED, Json(json!({ "id": id }))).into_response()
}

async fn update_patient(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(body): Json<Map<String, Value>>,
) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(down) = enter(&mut state) {
        return down;
    }

    const WHITELIST: [&str; 6] = ["name", "age", "sex", "contact", "diagnosis", "notes"];
    let fields: Vec<(&String, &Value)> = body
        .iter()
        .filter(|(k, _)| WHITELIST.contains(&k.as_str()))
        .collect();
    if fields.is_empty() {
        return error(StatusCode::BAD_REQUEST, "No valid fields to update");
    }

    if let Some(patient) = state.patients.iter_mut().find(|p| p.id == id) {
        for (key, value) in fields {
            let as_text = value.as_str().map(str::to_string);
            match key.as_str() {
                "name" => patient.name = as_text.unwrap_or_default(),
                "age" => patient.age = value.as_u64().unwrap_or(patient.age),
                "sex" => patient.sex = as_text.unwrap_or_default(),
                "contact" => patient.contact = as_text,
                "diagnosis" => patient.diagnosis = as_text,
                "notes" => patient.notes = as_text,
                _ => {}
            }
        }
    }

    Json(json!({ "success": true })).into_response()
}

async fn delete_patient(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(down) = enter(&mut state) {
        return down;
    }

    let removed_visits: Vec<String> = state
        .visits
        .iter()
        .filter(|v| v.patient_id == id)
        .map(|v| v.id.clone())
        .collect();
    state.images.retain(|i| !removed_visits.contains(&i.visit_id));
    state.visits.retain(|v| v.patient_id != id);
    state.patients.retain(|p| p.id != id);

    Json(json!({ "success": true })).into_response()
}

async fn add_visit(
    State(state): State<Shared>,
    Path(patient_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(down) = enter(&mut state) {
        return down;
    }

    if !state.patients.iter().any(|p| p.id == patient_id) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create visit");
    }

    let visit_id = next_id("srv-v", &state);
    state.visits.push(VisitRow {
        id: visit_id.clone(),
        patient_id,
        date: text(&body, "date").unwrap_or_default(),
        diagnosis: text(&body, "diagnosis"),
        prescription: text(&body, "prescription"),
        notes: text(&body, "notes"),
        xray_required: body.get("xrayRequired").and_then(Value::as_bool).unwrap_or(false),
        file_data: text(&body, "fileData"),
        file_name: text(&body, "fileName"),
        file_type: text(&body, "fileType"),
    });

    let images: Vec<String> = body
        .get("images")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();

    for (index, image_data) in images.into_iter().enumerate() {
        if state.fail_image_at == Some(index) {
            return error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create visit");
        }
        let id = next_id("srv-i", &state);
        state.images.push(ImageRow {
            id,
            visit_id: visit_id.clone(),
            image_data,
        });
    }

    (StatusCode::CREATED, Json(json!({ "id": visit_id }))).into_response()
}

async fn search(State(state): State<Shared>, Query(params): Query<HashMap<String, String>>) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(down) = enter(&mut state) {
        return down;
    }

    let query = match params.get("query") {
        Some(q) if !q.is_empty() => q.to_lowercase(),
        _ => return Json(Vec::<Value>::new()).into_response(),
    };
    let hit = |field: &Option<String>| {
        field
            .as_deref()
            .is_some_and(|f| f.to_lowercase().contains(&query))
    };

    let body: Vec<Value> = state
        .patients
        .iter()
        .filter(|p| p.name.to_lowercase().contains(&query) || hit(&p.diagnosis) || hit(&p.notes))
        .map(|p| state.render_patient(p))
        .collect();
    Json(body).into_response()
}

async fn download_file(State(state): State<Shared>, Path(visit_id): Path<String>) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(down) = enter(&mut state) {
        return down;
    }

    let Some(visit) = state.visits.iter().find(|v| v.id == visit_id) else {
        return error(StatusCode::NOT_FOUND, "File not found");
    };
    let Some(encoded) = visit.file_data.as_deref() else {
        return error(StatusCode::NOT_FOUND, "File not found");
    };
    let Ok(data) = base64::engine::general_purpose::STANDARD.decode(encoded) else {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to download file");
    };

    let content_type = visit.file_type.clone().unwrap_or_default();
    let disposition = format!(
        "attachment; filename=\"{}\"",
        visit.file_name.clone().unwrap_or_default()
    );
    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    )
        .into_response()
}

pub fn router(state: Shared) -> Router {
    Router::new()
        .route("/api/patients", get(list_patients).post(create_patient))
        .route(
            "/api/patients/:id",
            get(get_patient).put(update_patient).delete(delete_patient),
        )
        .route("/api/patients/:id/visits", axum::routing::post(add_visit))
        .route("/api/search", get(search))
        .route("/api/visits/:id/file", get(download_file))
        .with_state(state)
}

/// Start the stub on an ephemeral port. Returns its base URL and state.
pub async fn spawn_record_service() -> (String, Shared) {
    let state: Shared = Arc::new(Mutex::new(ServiceState::default()));
    let app = router(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), state)
}

/// Address nothing listens on.
pub const UNREACHABLE_URL: &str = "http://127.0.0.1:1";
