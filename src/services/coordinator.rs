//! UploadCoordinator — the five operations of the client-driven multipart
//! upload protocol.
//!
//! The coordinator keeps no state of its own. Each call validates its inputs
//! first and only then talks to the [`MultipartStore`], which is the single
//! source of truth for which sessions and parts exist. Part bytes never pass
//! through here: clients `PUT` them straight to presigned URLs.

use crate::{
    models::multipart::{CompleteResponse, InitiateRequest, InitiateResponse, PartAuthorization},
    services::rfc2047,
    store::{CompletedPart, MultipartStore, PartRecord, StoreError},
};
use serde_json::Value;
use std::{collections::HashMap, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Lowest and highest part numbers S3 accepts.
pub const MIN_PART_NUMBER: i32 = 1;
pub const MAX_PART_NUMBER: i32 = 10_000;

/// Lifetime of a presigned part URL unless configured otherwise.
pub const DEFAULT_PRESIGN_EXPIRY: Duration = Duration::from_secs(60);

/// Upper bound on part-listing round trips for one `list_parts` call.
///
/// A page holds at least one part and a session at most 10000, so a
/// well-behaved store never gets close.
pub const DEFAULT_MAX_LIST_PAGES: usize = 10_000;

pub const ERR_FILENAME: &str = "s3: content filename must be a string";
pub const ERR_CONTENT_TYPE: &str = "s3: content type must be a string";
pub const ERR_METADATA: &str = "s3: metadata must be an object of string values";
pub const ERR_PART_NUMBER: &str = "s3: the part number must be an integer between 1 and 10000.";
pub const ERR_KEY: &str =
    "s3: the object key must be passed as a query parameter. For example: \"?key=abc.jpg\"";
pub const ERR_PARTS: &str = "s3: `parts` must be an array of {ETag, PartNumber} objects.";

#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The caller sent something malformed. Always raised before the store is touched.
    #[error("{0}")]
    InvalidArgument(String),
    #[error("upstream store failure: {0}")]
    Upstream(#[from] StoreError),
}

impl CoordinatorError {
    fn invalid(msg: &str) -> Self {
        Self::InvalidArgument(msg.to_string())
    }
}

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

#[derive(Clone)]
pub struct UploadCoordinator {
    store: Arc<dyn MultipartStore>,
    presign_expiry: Duration,
    max_list_pages: usize,
}

impl UploadCoordinator {
    pub fn new(store: Arc<dyn MultipartStore>) -> Self {
        Self {
            store,
            presign_expiry: DEFAULT_PRESIGN_EXPIRY,
            max_list_pages: DEFAULT_MAX_LIST_PAGES,
        }
    }

    pub fn with_presign_expiry(mut self, expiry: Duration) -> Self {
        self.presign_expiry = expiry;
        self
    }

    pub fn with_max_list_pages(mut self, pages: usize) -> Self {
        self.max_list_pages = pages.max(1);
        self
    }

    pub fn presign_expiry(&self) -> Duration {
        self.presign_expiry
    }

    pub fn store(&self) -> &Arc<dyn MultipartStore> {
        &self.store
    }

    /// Start a multipart session for `filename`.
    ///
    /// The object key is `<uuid v4>-<filename>` so concurrent uploads of the
    /// same filename never collide and keys cannot be guessed.
    pub async fn initiate(&self, req: InitiateRequest) -> CoordinatorResult<InitiateResponse> {
        let Value::String(filename) = req.filename else {
            return Err(CoordinatorError::invalid(ERR_FILENAME));
        };
        let Value::String(content_type) = req.content_type else {
            return Err(CoordinatorError::invalid(ERR_CONTENT_TYPE));
        };
        let metadata = encode_metadata(req.metadata)?;

        let key = format!("{}-{}", Uuid::new_v4(), filename);
        let created = self
            .store
            .create_multipart_upload(&key, &content_type, metadata)
            .await?;

        info!(key = %created.key, upload_id = %created.upload_id, "multipart upload created");
        Ok(InitiateResponse {
            key: created.key,
            upload_id: created.upload_id,
        })
    }

    /// Presign an upload of one part of an open session.
    pub async fn authorize_part(
        &self,
        upload_id: &str,
        key: Option<&str>,
        part_number: &str,
    ) -> CoordinatorResult<PartAuthorization> {
        let part_number = parse_part_number(part_number)
            .ok_or_else(|| CoordinatorError::invalid(ERR_PART_NUMBER))?;
        let key = require_key(key)?;

        let url = self
            .store
            .presign_upload_part(key, upload_id, part_number, self.presign_expiry)
            .await?;

        debug!(key, upload_id, part_number, "part upload authorized");
        Ok(PartAuthorization {
            url,
            expires: self.presign_expiry.as_secs(),
        })
    }

    /// Every part the store holds for the session, following pagination to the end.
    ///
    /// Pages are fetched one after another since each request needs the
    /// previous page's marker. A failure on any page fails the whole listing.
    pub async fn list_parts(
        &self,
        upload_id: &str,
        key: Option<&str>,
    ) -> CoordinatorResult<Vec<PartRecord>> {
        let key = require_key(key)?;

        let mut parts = Vec::new();
        let mut marker: Option<String> = None;
        for page_index in 0..self.max_list_pages {
            let page = self
                .store
                .list_parts_page(key, upload_id, marker.as_deref())
                .await?;
            debug!(upload_id, page_index, count = page.parts.len(), "fetched parts page");
            parts.extend(page.parts);

            if !page.is_truncated {
                return Ok(parts);
            }
            marker = match page.next_part_number_marker {
                Some(next) => Some(next),
                None => {
                    return Err(StoreError::MissingField("NextPartNumberMarker").into());
                }
            };
        }

        Err(StoreError::S3(
            format!(
                "part listing for upload `{upload_id}` exceeded {} pages",
                self.max_list_pages
            )
            .into(),
        )
        .into())
    }

    /// Assemble the object from the given parts, in the order given.
    pub async fn complete(
        &self,
        upload_id: &str,
        key: Option<&str>,
        parts: &Value,
    ) -> CoordinatorResult<CompleteResponse> {
        let key = require_key(key)?;
        let parts = parse_completed_parts(parts)?;

        let completed = self
            .store
            .complete_multipart_upload(key, upload_id, &parts)
            .await?;

        info!(key, upload_id, parts = parts.len(), "multipart upload completed");
        Ok(CompleteResponse {
            location: completed.location,
        })
    }

    /// Cancel the session; the store discards every uploaded part.
    pub async fn abort(&self, upload_id: &str, key: Option<&str>) -> CoordinatorResult<()> {
        let key = require_key(key)?;
        self.store.abort_multipart_upload(key, upload_id).await?;
        info!(key, upload_id, "multipart upload aborted");
        Ok(())
    }
}

fn require_key(key: Option<&str>) -> CoordinatorResult<&str> {
    match key {
        Some(key) if !key.is_empty() => Ok(key),
        _ => Err(CoordinatorError::invalid(ERR_KEY)),
    }
}

/// Parse a part number, accepting integral forms like `"7"`, `" 7 "` or `"7.0"`.
pub(crate) fn parse_part_number(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    let value = match raw.parse::<i64>() {
        Ok(n) => n,
        Err(_) => {
            let f = raw.parse::<f64>().ok().filter(|f| f.is_finite() && f.fract() == 0.0)?;
            if f.abs() > i64::MAX as f64 {
                return None;
            }
            f as i64
        }
    };
    in_part_range(value)
}

fn in_part_range(value: i64) -> Option<i32> {
    if (MIN_PART_NUMBER as i64..=MAX_PART_NUMBER as i64).contains(&value) {
        Some(value as i32)
    } else {
        None
    }
}

fn part_number_from_json(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => in_part_range(i),
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0)
                .and_then(|f| parse_part_number(&f.to_string())),
        },
        Value::String(s) => parse_part_number(s),
        _ => None,
    }
}

/// Validate the whole `parts` array before anything is sent to the store.
pub(crate) fn parse_completed_parts(parts: &Value) -> CoordinatorResult<Vec<CompletedPart>> {
    let Value::Array(items) = parts else {
        return Err(CoordinatorError::invalid(ERR_PARTS));
    };

    items
        .iter()
        .map(|item| {
            let part_number = item.get("PartNumber").and_then(part_number_from_json);
            let etag = item.get("ETag").and_then(Value::as_str);
            match (part_number, etag) {
                (Some(part_number), Some(etag)) => Ok(CompletedPart {
                    part_number,
                    etag: etag.to_string(),
                }),
                _ => Err(CoordinatorError::invalid(ERR_PARTS)),
            }
        })
        .collect()
}

/// Stringify metadata values and RFC 2047-encode non-ASCII names and values.
fn encode_metadata(metadata: Value) -> CoordinatorResult<HashMap<String, String>> {
    let entries = match metadata {
        Value::Null => return Ok(HashMap::new()),
        Value::Object(entries) => entries,
        _ => return Err(CoordinatorError::invalid(ERR_METADATA)),
    };

    Ok(entries
        .into_iter()
        .map(|(name, value)| {
            let text = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (
                rfc2047::encode_header_value(&name).into_owned(),
                rfc2047::encode_header_value(&text).into_owned(),
            )
        })
        .collect())
}
