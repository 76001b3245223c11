use async_trait::async_trait;
use axum::body::Bytes;
use serde::Deserialize;
use std::sync::Arc;

use crate::{config::SanityConfig, error::AppError, models::UploadedAsset};

/// Largest accepted image upload (5 MiB).
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/webp", "image/gif"];

// 1. StorageService Contract
/// StorageService
///
/// Defines the contract for storing uploaded media. The handlers only see this
/// trait, so the Sanity client can be swapped for `MockStorageService` in tests.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Uploads an already validated image and returns its asset id and CDN URL.
    async fn upload_image(
        &self,
        filename: &str,
        content_type: &str,
        bytes: Bytes,
    ) -> Result<UploadedAsset, AppError>;
}

/// validate_image
///
/// Checks the declared MIME type and the payload size before anything leaves
/// the process.
pub fn validate_image(content_type: &str, len: usize) -> Result<(), AppError> {
    if !ALLOWED_IMAGE_TYPES.contains(&content_type) {
        return Err(AppError::validation(format!(
            "unsupported image type `{content_type}` (allowed: jpeg, png, webp, gif)"
        )));
    }
    if len == 0 {
        return Err(AppError::validation("uploaded file is empty"));
    }
    if len > MAX_IMAGE_BYTES {
        return Err(AppError::PayloadTooLarge(format!(
            "images are limited to {} MiB",
            MAX_IMAGE_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

/// sanitize_filename
///
/// Keeps only the last path segment of a client-provided name and replaces
/// anything outside `[A-Za-z0-9._-]`, so directory navigation (`..`, `/`) never
/// reaches the storage backend.
pub fn sanitize_filename(name: &str) -> String {
    let last = name
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .last()
        .unwrap_or("");

    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

// 2. The Real Implementation (Sanity assets API)
/// SanityStorageClient
///
/// Uploads binaries to the Sanity assets endpoint. Sanity answers with the
/// created asset document, whose `_id` and `url` are handed back to the client.
#[derive(Clone)]
pub struct SanityStorageClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

#[derive(Deserialize)]
struct SanityAssetResponse {
    document: SanityAssetDocument,
}

#[derive(Deserialize)]
struct SanityAssetDocument {
    #[serde(rename = "_id")]
    id: String,
    url: String,
}

impl SanityStorageClient {
    pub fn new(config: &SanityConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: format!(
                "https://{}.api.sanity.io/{}/assets/images/{}",
                config.project_id, config.api_version, config.dataset
            ),
            token: config.token.clone(),
        }
    }
}

#[async_trait]
impl StorageService for SanityStorageClient {
    async fn upload_image(
        &self,
        filename: &str,
        content_type: &str,
        bytes: Bytes,
    ) -> Result<UploadedAsset, AppError> {
        let filename = sanitize_filename(filename);
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("filename", filename.as_str())])
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("sanity request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::Storage(format!(
                "sanity rejected upload ({status}): {detail}"
            )));
        }

        let asset: SanityAssetResponse = response
            .json()
            .await
            .map_err(|e| AppError::Storage(format!("unexpected sanity response: {e}")))?;

        Ok(UploadedAsset {
            asset_id: asset.document.id,
            url: asset.document.url,
        })
    }
}

// 3. The Mock Implementation (For Tests)
/// MockStorageService
///
/// A network-free `StorageService` for tests. Returns deterministic CDN-style
/// URLs, or a simulated upstream failure when built with `new_failing`.
#[derive(Clone, Default)]
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

#[async_trait]
impl StorageService for MockStorageService {
    async fn upload_image(
        &self,
        filename: &str,
        _content_type: &str,
        _bytes: Bytes,
    ) -> Result<UploadedAsset, AppError> {
        if self.should_fail {
            return Err(AppError::Storage(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }

        let name = sanitize_filename(filename);
        Ok(UploadedAsset {
            asset_id: format!("image-mock-{name}"),
            url: format!("https://cdn.sanity.io/images/mock-project/test/{name}"),
        })
    }
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_directories_and_odd_characters() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\photos\\my cat.png"), "my-cat.png");
        assert_eq!(sanitize_filename(".."), "upload");
        assert_eq!(sanitize_filename(".hidden."), "hidden");
    }

    #[test]
    fn validate_image_enforces_type_and_size() {
        assert!(validate_image("image/png", 10).is_ok());
        assert!(matches!(
            validate_image("application/pdf", 10),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(validate_image("image/gif", 0), Err(AppError::Validation(_))));
        assert!(matches!(
            validate_image("image/jpeg", MAX_IMAGE_BYTES + 1),
            Err(AppError::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn sanity_endpoint_is_built_from_config() {
        let client = SanityStorageClient::new(&SanityConfig {
            project_id: "abc123".into(),
            dataset: "production".into(),
            token: "t".into(),
            api_version: "v2021-06-07".into(),
        });
        assert_eq!(
            client.endpoint,
            "https://abc123.api.sanity.io/v2021-06-07/assets/images/production"
        );
    }

    #[tokio::test]
    async fn mock_returns_deterministic_url() {
        let asset = MockStorageService::new()
            .upload_image("../cover.png", "image/png", Bytes::from_static(b"png"))
            .await
            .unwrap();
        assert_eq!(asset.url, "https://cdn.sanity.io/images/mock-project/test/cover.png");
    }
}
