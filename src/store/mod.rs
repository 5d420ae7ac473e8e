//! Object-store collaborator used by the upload coordinator.
//!
//! The coordinator never talks to S3 directly; it goes through
//! [`MultipartStore`], which covers exactly the multipart calls the upload
//! protocol needs. The production implementation lives in [`s3`]; tests plug
//! in their own fakes.

pub mod s3;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{collections::HashMap, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("multipart upload `{upload_id}` does not exist")]
    NoSuchUpload { upload_id: String },
    #[error("store response is missing `{0}`")]
    MissingField(&'static str),
    #[error("presigning failed: {0}")]
    Presign(String),
    #[error("store configuration error: {0}")]
    Config(String),
    #[error("S3 error: {0}")]
    S3(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Identifiers of a freshly created multipart session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedUpload {
    pub key: String,
    pub upload_id: String,
}

/// A part the store has acknowledged for an open session.
///
/// Serialized with the store's own field names so upload clients can read
/// the listing verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartRecord {
    #[serde(rename = "PartNumber")]
    pub part_number: i32,
    #[serde(rename = "ETag")]
    pub etag: String,
    #[serde(rename = "Size")]
    pub size: i64,
    #[serde(rename = "LastModified", skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

/// One page of a part listing.
#[derive(Debug, Clone, Default)]
pub struct PartsPage {
    pub parts: Vec<PartRecord>,
    pub is_truncated: bool,
    /// Marker to pass as `part_number_marker` for the next page.
    pub next_part_number_marker: Option<String>,
}

/// A part as it is handed to the store's complete call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: i32,
    pub etag: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedUpload {
    pub location: Option<String>,
}

/// Multipart API of the backing object store.
///
/// All calls target the single bucket the store handle was built for.
#[async_trait]
pub trait MultipartStore: Send + Sync + 'static {
    async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> StoreResult<CreatedUpload>;

    /// Produce a URL the client can `PUT` one part body to, valid for `expires_in`.
    async fn presign_upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        expires_in: Duration,
    ) -> StoreResult<String>;

    async fn list_parts_page(
        &self,
        key: &str,
        upload_id: &str,
        part_number_marker: Option<&str>,
    ) -> StoreResult<PartsPage>;

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StoreResult<CompletedUpload>;

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> StoreResult<()>;

    /// Cheap reachability check of the configured bucket.
    async fn health_check(&self) -> StoreResult<()>;

    fn backend_name(&self) -> &'static str;
}
