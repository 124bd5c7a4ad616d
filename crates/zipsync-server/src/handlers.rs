use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info};
use zipsync_storage::Document;

use crate::entity::EntityDefinition;
use crate::error::ApiError;
use crate::lookup::lookup;
use crate::reconcile::{ReconcileError, reconcile};
use crate::server::AppState;
use crate::table::Table;

/// Multipart field carrying the CSV file.
pub const FILE_FIELD: &str = "file";

pub const UPLOAD_SUCCESS_MESSAGE: &str = "Database updated successfully";

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

pub async fn root() -> &'static str {
    "Hello, World!"
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

pub async fn readyz(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state
        .store
        .ping()
        .await
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;
    Ok((
        StatusCode::OK,
        Json(json!({ "status": "ready", "backend": state.store.backend_name() })),
    ))
}

/// `POST /{entity}/download`: one record or placeholder per `Zip` row.
pub async fn download(
    State(state): State<AppState>,
    Path(route): Path<String>,
    multipart: Multipart,
) -> Result<Json<Vec<Document>>, ApiError> {
    let entity = resolve_entity(&state, &route)?;
    let table = Table::from_csv(&read_file(multipart).await?)?;

    let keys = table
        .column(&entity.key_field)
        .ok_or_else(|| ReconcileError::MissingColumn(entity.key_field.clone()))?;
    debug!(entity = %entity.route, keys = keys.len(), "lookup requested");

    let records = lookup(state.store.as_ref(), &entity, &keys).await?;
    debug!(entity = %entity.route, records = ?records, "lookup result");

    Ok(Json(records))
}

/// `POST /{entity}/upload`: validates the whole file, then upserts it.
pub async fn upload(
    State(state): State<AppState>,
    Path(route): Path<String>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let entity = resolve_entity(&state, &route)?;
    let table = Table::from_csv(&read_file(multipart).await?)?;
    debug!(
        entity = %entity.route,
        rows = table.len(),
        columns = ?table.columns().collect::<Vec<_>>(),
        "upload parsed"
    );

    let operations = reconcile(&entity, &table)?;
    let skipped = table.len() - operations.len();

    if !operations.is_empty() {
        let result = state
            .store
            .bulk_upsert(&entity.collection, &operations)
            .await?;
        info!(
            entity = %entity.route,
            matched = result.matched,
            upserted = result.upserted,
            skipped,
            "upload applied"
        );
    } else {
        info!(entity = %entity.route, skipped, "upload had no attributed rows");
    }

    Ok(Json(json!({ "message": UPLOAD_SUCCESS_MESSAGE })))
}

fn resolve_entity(state: &AppState, route: &str) -> Result<Arc<EntityDefinition>, ApiError> {
    state
        .registry
        .get(route)
        .ok_or_else(|| ApiError::UnknownEntity(route.to_string()))
}

async fn read_file(mut multipart: Multipart) -> Result<Bytes, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(FILE_FIELD) {
            return Ok(field.bytes().await?);
        }
    }
    Err(ApiError::MissingFile)
}
