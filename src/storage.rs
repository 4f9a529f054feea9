use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::presigning::PresigningConfig;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// MediaPointer
///
/// The opaque identifier plus the two URLs derived from it. Replaced as a
/// unit whenever a post's media asset changes.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaPointer {
    pub file_id: String,
    pub file_url: String,
    pub thumbnail_url: String,
}

/// MediaPointerBuilder
///
/// Mints fresh media pointers: a random opaque identifier and two URLs
/// deterministically derived from it via fixed templates. No collision
/// checking — the identifier space is effectively collision-free. Stateless
/// beyond the configured base URL.
#[derive(Debug, Clone)]
pub struct MediaPointerBuilder {
    cdn_base_url: String,
}

impl MediaPointerBuilder {
    pub fn new(cdn_base_url: &str) -> Self {
        Self {
            cdn_base_url: cdn_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Allocates a brand-new pointer. Never reuses an identifier.
    pub fn allocate(&self) -> MediaPointer {
        let file_id = Uuid::new_v4().to_string();
        MediaPointer {
            file_url: format!("{}/files/{}", self.cdn_base_url, file_id),
            thumbnail_url: format!("{}/thumbnails/{}.jpg", self.cdn_base_url, file_id),
            file_id,
        }
    }
}

// --- Blob store access ---

/// StorageService
///
/// Abstract contract for the external blob store. The concrete implementation
/// is swappable: the real S3 client in production, the in-memory mock in
/// tests. The service only ever deals in opaque file identifiers; it never
/// sees post records.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Ensures the configured bucket exists. Used in the `Env::Local` setup
    /// to provision the bucket in MinIO. No-op in production.
    async fn ensure_bucket_exists(&self);

    /// Generates a temporary, signed URL from which a client can fetch the
    /// object, carrying the requested content disposition.
    async fn presigned_download_url(
        &self,
        file_id: &str,
        disposition: &str,
    ) -> Result<String, String>;
}

/// StorageState
///
/// The shared handle to the storage service used across the application state.
pub type StorageState = Arc<dyn StorageService>;

/// S3StorageClient
///
/// Concrete implementation backed by the AWS SDK. S3 compatibility covers
/// both a Dockerized MinIO instance locally and any S3-compatible gateway in
/// production; `force_path_style(true)` is required for those gateways.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
}

impl S3StorageClient {
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    /// CreateBucket is idempotent, so this is safe to call at every startup.
    async fn ensure_bucket_exists(&self) {
        let _ = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await;
    }

    async fn presigned_download_url(
        &self,
        file_id: &str,
        disposition: &str,
    ) -> Result<String, String> {
        // Short-lived: the redirect target is fetched immediately.
        let expires_in = Duration::from_secs(600);

        let presigned_req = self
            .client
            .get_object()
            .bucket(&self.bucket_name)
            .key(sanitize_key(file_id))
            .response_content_disposition(disposition)
            .presigned(
                PresigningConfig::expires_in(expires_in).map_err(|e| e.to_string())?,
            )
            .await
            .map_err(|e| e.to_string())?;

        Ok(presigned_req.uri().to_string())
    }
}

/// Removes directory navigation components from a caller-provided key
/// segment. File ids are server-minted UUIDs, but the id also arrives via a
/// path parameter on the download redirect.
fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// MockStorageService
///
/// Mock implementation used by unit and integration tests, so handler logic
/// can be exercised without a network connection to a blob store.
#[derive(Clone)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

impl Default for MockStorageService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {
        // No-op in mock environment.
    }

    async fn presigned_download_url(
        &self,
        file_id: &str,
        disposition: &str,
    ) -> Result<String, String> {
        if self.should_fail {
            return Err("Mock Storage Error: simulation requested".to_string());
        }

        // Deterministic local-style URL for mock assertions.
        Ok(format!(
            "http://localhost:9000/mock-bucket/{}?disposition={}&signature=fake",
            sanitize_key(file_id),
            disposition
        ))
    }
}
