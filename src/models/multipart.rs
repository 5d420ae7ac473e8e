//! Multipart upload session requests and responses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /s3/multipart`.
///
/// Fields are read by name only; a body that is not a JSON object has none
/// of them.
#[derive(Clone, Debug, Default)]
pub struct InitiateRequest {
    /// Original filename; must be a JSON string.
    pub filename: Value,

    /// MIME type of the final object (`type` on the wire); must be a JSON string.
    pub content_type: Value,

    /// User metadata stored on the object. Absent or `null` means none.
    pub metadata: Value,
}

impl From<Value> for InitiateRequest {
    fn from(body: Value) -> Self {
        let Value::Object(mut fields) = body else {
            return Self::default();
        };
        Self {
            filename: fields.remove("filename").unwrap_or_default(),
            content_type: fields.remove("type").unwrap_or_default(),
            metadata: fields.remove("metadata").unwrap_or_default(),
        }
    }
}

/// Response of a successful initiate.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InitiateResponse {
    /// Object key, `<uuid>-<filename>`.
    pub key: String,

    /// Store-issued multipart session id.
    pub upload_id: String,
}

/// A presigned part upload destination.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PartAuthorization {
    pub url: String,

    /// Validity window of `url`, in seconds.
    pub expires: u64,
}

/// Body of `POST /s3/multipart/{uploadId}/complete`.
#[derive(Clone, Debug, Default)]
pub struct CompleteRequest {
    /// Expected to be an array of `{PartNumber, ETag}` objects.
    pub parts: Value,
}

impl From<Value> for CompleteRequest {
    fn from(body: Value) -> Self {
        match body {
            Value::Object(mut fields) => Self {
                parts: fields.remove("parts").unwrap_or_default(),
            },
            _ => Self::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CompleteResponse {
    /// Omitted when the store reports no location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// `?key=` query parameter shared by every session-scoped route.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct KeyQuery {
    pub key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn initiate_fields_are_read_by_name() {
        let req = InitiateRequest::from(json!({
            "filename": "cat.png",
            "type": "image/png",
            "metadata": { "a": "b" },
        }));
        assert_eq!(req.filename, json!("cat.png"));
        assert_eq!(req.content_type, json!("image/png"));
        assert_eq!(req.metadata, json!({ "a": "b" }));
    }

    #[test]
    fn non_object_bodies_carry_no_fields() {
        for body in [json!(["cat.png", "image/png"]), json!("cat.png"), Value::Null] {
            let req = InitiateRequest::from(body.clone());
            assert!(req.filename.is_null() && req.content_type.is_null());
            assert!(CompleteRequest::from(body).parts.is_null());
        }
        let req = CompleteRequest::from(json!([[{ "PartNumber": 1, "ETag": "a" }]]));
        assert!(req.parts.is_null());
    }

    #[test]
    fn missing_location_is_left_out() {
        let body = serde_json::to_value(CompleteResponse { location: None }).unwrap();
        assert_eq!(body, json!({}));
        let body = serde_json::to_value(CompleteResponse {
            location: Some("https://b.s3/k".into()),
        })
        .unwrap();
        assert_eq!(body, json!({ "location": "https://b.s3/k" }));
    }
}
