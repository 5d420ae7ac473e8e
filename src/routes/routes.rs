//! Defines routes for the multipart upload API.
//!
//! ## Structure
//! - **Session endpoints**
//!   - `POST   /s3/multipart` — initiate an upload session
//!   - `GET    /s3/multipart/{uploadId}?key=` — list uploaded parts
//!   - `DELETE /s3/multipart/{uploadId}?key=` — abort the session
//!
//! - **Part endpoints**
//!   - `GET    /s3/multipart/{uploadId}/{partNumber}?key=` — presign a part upload
//!   - `POST   /s3/multipart/{uploadId}/complete?key=` — complete the session
//!
//! `complete` is a static segment and wins over `{partNumber}`, so a GET on
//! `.../complete` is routed to a handler that treats `complete` as a part
//! number and answers 400 with the part-number message.

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        multipart_handlers::{
            abort_upload, authorize_complete_segment, authorize_part, complete_upload,
            initiate_upload, list_parts,
        },
    },
    services::coordinator::UploadCoordinator,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::Method,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Largest accepted JSON body.
pub const BODY_LIMIT_BYTES: usize = 50 * 1024 * 1024;

/// Build the router with every route, CORS, body limit and request tracing.
pub fn routes(coordinator: UploadCoordinator) -> Router {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/s3/multipart", post(initiate_upload))
        .route(
            "/s3/multipart/{upload_id}",
            get(list_parts).delete(abort_upload),
        )
        .route(
            "/s3/multipart/{upload_id}/complete",
            post(complete_upload).get(authorize_complete_segment),
        )
        .route("/s3/multipart/{upload_id}/{part_number}", get(authorize_part))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(cors())
        .layer(TraceLayer::new_for_http())
        .with_state(coordinator)
}

/// Browsers upload from arbitrary origins, so every origin is allowed.
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::PATCH,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
}
