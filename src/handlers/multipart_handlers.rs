//! HTTP handlers for the multipart upload protocol.
//! Each handler unpacks the request and delegates to `UploadCoordinator`.

use crate::{
    errors::AppError,
    models::multipart::{
        CompleteRequest, CompleteResponse, InitiateRequest, InitiateResponse, KeyQuery,
        PartAuthorization,
    },
    services::coordinator::UploadCoordinator,
    store::PartRecord,
};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use serde_json::{Value, json};

/// `POST /s3/multipart` — start a session.
pub async fn initiate_upload(
    State(coordinator): State<UploadCoordinator>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<InitiateResponse>, AppError> {
    let Json(body) = payload?;
    Ok(Json(coordinator.initiate(InitiateRequest::from(body)).await?))
}

/// `GET /s3/multipart/{uploadId}/{partNumber}?key=` — presign one part upload.
pub async fn authorize_part(
    State(coordinator): State<UploadCoordinator>,
    Path((upload_id, part_number)): Path<(String, String)>,
    query: Result<Query<KeyQuery>, QueryRejection>,
) -> Result<Json<PartAuthorization>, AppError> {
    let Query(q) = query?;
    let auth = coordinator
        .authorize_part(&upload_id, q.key.as_deref(), &part_number)
        .await?;
    Ok(Json(auth))
}

/// `GET /s3/multipart/{uploadId}/complete` — the literal `complete` sits in the
/// part-number slot and is rejected like any other non-numeric part number.
pub async fn authorize_complete_segment(
    State(coordinator): State<UploadCoordinator>,
    Path(upload_id): Path<String>,
    query: Result<Query<KeyQuery>, QueryRejection>,
) -> Result<Json<PartAuthorization>, AppError> {
    let Query(q) = query?;
    let auth = coordinator
        .authorize_part(&upload_id, q.key.as_deref(), "complete")
        .await?;
    Ok(Json(auth))
}

/// `GET /s3/multipart/{uploadId}?key=` — every part received so far.
pub async fn list_parts(
    State(coordinator): State<UploadCoordinator>,
    Path(upload_id): Path<String>,
    query: Result<Query<KeyQuery>, QueryRejection>,
) -> Result<Json<Vec<PartRecord>>, AppError> {
    let Query(q) = query?;
    let parts = coordinator.list_parts(&upload_id, q.key.as_deref()).await?;
    Ok(Json(parts))
}

/// `POST /s3/multipart/{uploadId}/complete?key=` — assemble the object.
pub async fn complete_upload(
    State(coordinator): State<UploadCoordinator>,
    Path(upload_id): Path<String>,
    query: Result<Query<KeyQuery>, QueryRejection>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<CompleteResponse>, AppError> {
    let Query(q) = query?;
    let Json(body) = payload?;
    let req = CompleteRequest::from(body);
    let completed = coordinator
        .complete(&upload_id, q.key.as_deref(), &req.parts)
        .await?;
    Ok(Json(completed))
}

/// `DELETE /s3/multipart/{uploadId}?key=` — cancel the session.
pub async fn abort_upload(
    State(coordinator): State<UploadCoordinator>,
    Path(upload_id): Path<String>,
    query: Result<Query<KeyQuery>, QueryRejection>,
) -> Result<Json<Value>, AppError> {
    let Query(q) = query?;
    coordinator.abort(&upload_id, q.key.as_deref()).await?;
    Ok(Json(json!({})))
}
