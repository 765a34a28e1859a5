use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::primitives::ByteStream;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("upload of '{key}' failed: {reason}")]
    Upload { key: String, reason: String },
}

// 1. StorageService Contract
/// StorageService
///
/// Contract for the object storage holding course images. Handlers never talk to S3
/// directly, so tests can run against `MockStorageService`.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the bucket if it is missing. Only called for the local MinIO setup.
    async fn ensure_bucket_exists(&self);

    /// Stores `bytes` under `key` with the given MIME type.
    async fn upload_object(&self, key: &str, content_type: &str, bytes: Vec<u8>) -> Result<(), StorageError>;

    /// Public URL of an object. Pure string derivation, no network call.
    fn public_url(&self, key: &str) -> String;
}

// 2. The Real Implementation (S3/MinIO)
/// S3StorageClient
///
/// `aws-sdk-s3` client. With a custom endpoint (MinIO) it uses path-style addressing;
/// without one it talks to AWS and builds virtual-hosted public URLs.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
    region: String,
    endpoint: Option<String>,
}

impl S3StorageClient {
    pub async fn new(
        endpoint: Option<&str>,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials = s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let mut builder = s3::Config::builder()
            .credentials_provider(credentials)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest();

        if let Some(endpoint) = endpoint {
            // MinIO only understands http://endpoint/bucket/key.
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: s3::Client::from_conf(builder.build()),
            bucket_name: bucket.to_string(),
            region: region.to_string(),
            endpoint: endpoint.map(|e| e.trim_end_matches('/').to_string()),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    async fn ensure_bucket_exists(&self) {
        if let Err(e) = self.client.create_bucket().bucket(&self.bucket_name).send().await {
            // Already-owned buckets also land here.
            tracing::debug!("create_bucket({}) returned: {:?}", self.bucket_name, e);
        }
    }

    async fn upload_object(&self, key: &str, content_type: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map(|_| ())
            .map_err(|e| StorageError::Upload {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    fn public_url(&self, key: &str) -> String {
        match &self.endpoint {
            Some(endpoint) => format!("{}/{}/{}", endpoint, self.bucket_name, key),
            None => format!("https://{}.s3.{}.amazonaws.com/{}", self.bucket_name, self.region, key),
        }
    }
}

/// course_image_key
///
/// Object key for a new course image: `courses/{uuid}.{ext}`. The extension comes from the
/// uploaded filename and falls back to `png` when missing or suspicious.
pub fn course_image_key(filename: Option<&str>) -> String {
    let ext = filename
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "png".to_string());

    format!("courses/{}.{}", Uuid::new_v4(), ext)
}

/// sanitize_key
///
/// Drops empty, `.` and `..` segments so a key can never climb out of its prefix.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

// 3. The Mock Implementation (For Tests)
/// MockStorageService
///
/// In-memory stand-in that records uploaded keys. `new_failing()` simulates an outage.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, every upload returns an error.
    pub should_fail: bool,
    uploads: Arc<Mutex<Vec<String>>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Keys successfully uploaded so far.
    pub fn uploaded_keys(&self) -> Vec<String> {
        self.uploads.lock().map(|keys| keys.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {}

    async fn upload_object(&self, key: &str, _content_type: &str, _bytes: Vec<u8>) -> Result<(), StorageError> {
        if self.should_fail {
            return Err(StorageError::Upload {
                key: key.to_string(),
                reason: "Mock Storage Error: Simulation requested".to_string(),
            });
        }

        if let Ok(mut keys) = self.uploads.lock() {
            keys.push(sanitize_key(key));
        }
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("http://localhost:9000/mock-bucket/{}", sanitize_key(key))
    }
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;
