use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::errors::ServiceError;
use crate::models::{Disk, DiskUpdate};
use crate::state::{AppState, OperationStatus};

/// The application router
pub(crate) fn app_router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health))
        .route(
            "/api/disks/{name}",
            get(get_disk).put(create_or_update_disk).delete(delete_disk),
        )
        .route("/api/operations/{id}", get(get_operation))
        .route("/api/animals", get(list_animals))
        .route("/api/animals/{kind}", get(get_animal))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.uptime();

    Json(json!({
        "status": "OK",
        "uptime": uptime,
    }))
}

async fn get_disk(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Disk>, ServiceError> {
    state.disk(&name).await.map(Json)
}

fn operation_header(name: &'static str, id: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&format!("/api/operations/{id}")) {
        headers.insert(HeaderName::from_static(name), value);
    }
    headers
}

async fn create_or_update_disk(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(update): Json<DiskUpdate>,
) -> impl IntoResponse {
    let (id, accepted) = state.begin_create_or_update(&name, update.size_gb).await;
    let headers = operation_header("azure-asyncoperation", &id);

    (StatusCode::CREATED, headers, Json(accepted))
}

async fn delete_disk(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = state.begin_delete(&name).await?;
    let headers = operation_header("operation-location", &id);

    Ok((StatusCode::ACCEPTED, headers))
}

async fn get_operation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ServiceError> {
    let body = match state.poll_operation(&id).await? {
        OperationStatus::Running => json!({ "id": id, "status": "Running" }),
        OperationStatus::Succeeded { resource } => {
            let mut body = json!({ "id": id, "status": "Succeeded" });
            if let (Some(resource), Some(members)) = (resource, body.as_object_mut()) {
                members.insert("resourceLocation".to_string(), json!(resource));
            }
            body
        }
        OperationStatus::Failed { code, message } => json!({
            "id": id,
            "status": "Failed",
            "error": { "code": code, "message": message },
        }),
    };

    Ok(Json(body))
}

fn animal(kind: &str) -> Option<Value> {
    let animal = match kind {
        "dog" => json!({
            "kind": "dog",
            "name": "Rex",
            "breed": "German Shepherd",
            "friends": [
                { "kind": "cat", "name": "Tom", "lives": 9 },
                { "kind": "dog", "name": "Pluto", "breed": "Bloodhound" }
            ]
        }),
        "cat" => json!({ "kind": "cat", "name": "Tom", "lives": 9 }),
        "parrot" => json!({ "kind": "parrot", "name": "Polly", "words": 42 }),
        _ => return None,
    };
    Some(animal)
}

async fn get_animal(Path(kind): Path<String>) -> Result<Json<Value>, ServiceError> {
    animal(&kind)
        .map(Json)
        .ok_or(ServiceError::AnimalNotFound { kind })
}

async fn list_animals() -> Json<Value> {
    let animals = ["dog", "cat", "parrot"]
        .into_iter()
        .filter_map(animal)
        .collect::<Vec<_>>();

    Json(Value::Array(animals))
}
