//! S3-compatible multipart store using the AWS SDK.

use super::{
    CompletedPart, CompletedUpload, CreatedUpload, MultipartStore, PartRecord, PartsPage,
    StoreError, StoreResult,
};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, default_provider::credentials::DefaultCredentialsChain};
use aws_smithy_http_client::Builder as SmithyHttpClientBuilder;
use aws_sdk_s3::{
    Client,
    error::SdkError,
    presigning::PresigningConfig,
    types::{CompletedMultipartUpload, CompletedPart as S3CompletedPart},
};
use chrono::{DateTime, Utc};
use std::{collections::HashMap, time::Duration};
use tracing::instrument;

/// Connection settings for [`S3Store::new`].
#[derive(Clone, Default)]
pub struct S3Settings {
    pub bucket: String,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub force_path_style: bool,
}

impl std::fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Settings")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id.as_ref().map(|_| "<redacted>"))
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("force_path_style", &self.force_path_style)
            .finish()
    }
}

/// Multipart store backed by a single S3 bucket.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    region: String,
}

impl std::fmt::Debug for S3Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Store")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl S3Store {
    /// Build the store client once; the handle is then shared read-only.
    ///
    /// Explicit credentials must be given as a pair. Without them the AWS
    /// default credential chain (env, profile, instance metadata) is used.
    pub async fn new(settings: S3Settings) -> StoreResult<Self> {
        if settings.bucket.trim().is_empty() {
            return Err(StoreError::Config("bucket name must not be empty".into()));
        }
        if settings.access_key_id.is_some() ^ settings.secret_access_key.is_some() {
            return Err(StoreError::Config(
                "s3 config requires both access key id and secret access key when either is set"
                    .into(),
            ));
        }

        let region = settings
            .region
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| "us-east-1".to_string());
        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(aws_config::Region::new(region.clone()));

        if let (Some(key_id), Some(secret)) = (settings.access_key_id, settings.secret_access_key)
        {
            let credentials =
                aws_sdk_s3::config::Credentials::new(key_id, secret, None, None, "companion-env");
            builder = builder.credentials_provider(credentials);
        } else {
            let chain = DefaultCredentialsChain::builder()
                .region(aws_config::Region::new(region.clone()))
                .build()
                .await;
            builder = builder.credentials_provider(chain);
        }

        if let Some(endpoint) = settings.endpoint.as_deref().map(normalize_endpoint) {
            // Plain-HTTP endpoints (local MinIO and friends) skip TLS setup entirely.
            if endpoint.to_ascii_lowercase().starts_with("http://") {
                builder = builder.http_client(SmithyHttpClientBuilder::new().build_http());
            }
            builder = builder.endpoint_url(endpoint);
        }
        if settings.force_path_style {
            builder = builder.force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: settings.bucket,
            region,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

/// Bare `host:port` endpoints (e.g. a local MinIO) get an `http://` scheme.
fn normalize_endpoint(endpoint: &str) -> String {
    let lower = endpoint.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    }
}

/// Map an SDK failure, turning 404s on a session into `NoSuchUpload`.
fn map_sdk_error<E>(err: SdkError<E>, upload_id: Option<&str>) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
{
    if let (Some(upload_id), SdkError::ServiceError(service_err)) = (upload_id, &err) {
        if service_err.raw().status().as_u16() == 404 {
            return StoreError::NoSuchUpload {
                upload_id: upload_id.to_string(),
            };
        }
    }
    StoreError::S3(Box::new(err))
}

fn to_chrono(ts: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts.secs(), ts.subsec_nanos())
}

#[async_trait]
impl MultipartStore for S3Store {
    #[instrument(skip(self, metadata), fields(backend = "s3"))]
    async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> StoreResult<CreatedUpload> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .set_metadata(Some(metadata))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, None))?;

        let upload_id = output
            .upload_id()
            .ok_or(StoreError::MissingField("UploadId"))?
            .to_string();
        let key = output.key().unwrap_or(key).to_string();

        Ok(CreatedUpload { key, upload_id })
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn presign_upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        expires_in: Duration,
    ) -> StoreResult<String> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StoreError::Presign(e.to_string()))?;

        let request = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .presigned(presigning)
            .await
            .map_err(|e| StoreError::Presign(e.to_string()))?;

        Ok(request.uri().to_string())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn list_parts_page(
        &self,
        key: &str,
        upload_id: &str,
        part_number_marker: Option<&str>,
    ) -> StoreResult<PartsPage> {
        let output = self
            .client
            .list_parts()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .set_part_number_marker(part_number_marker.map(str::to_string))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, Some(upload_id)))?;

        let mut parts = Vec::with_capacity(output.parts().len());
        for part in output.parts() {
            parts.push(PartRecord {
                part_number: part.part_number().ok_or(StoreError::MissingField("PartNumber"))?,
                etag: part
                    .e_tag()
                    .ok_or(StoreError::MissingField("ETag"))?
                    .to_string(),
                size: part.size().unwrap_or(0),
                last_modified: part.last_modified().and_then(to_chrono),
            });
        }

        Ok(PartsPage {
            parts,
            is_truncated: output.is_truncated() == Some(true),
            next_part_number_marker: output.next_part_number_marker().map(str::to_string),
        })
    }

    #[instrument(skip(self, parts), fields(backend = "s3", parts = parts.len()))]
    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StoreResult<CompletedUpload> {
        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(
                parts
                    .iter()
                    .map(|p| {
                        S3CompletedPart::builder()
                            .part_number(p.part_number)
                            .e_tag(&p.etag)
                            .build()
                    })
                    .collect(),
            ))
            .build();

        let output = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, Some(upload_id)))?;

        Ok(CompletedUpload {
            location: output.location().map(str::to_string),
        })
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> StoreResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, Some(upload_id)))?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn health_check(&self) -> StoreResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, None))?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}
