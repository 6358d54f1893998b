//! Read-only access to scan artifacts (reports, evidence archives) kept
//! in object storage.

use async_trait::async_trait;

pub mod r2;

pub use r2::R2Store;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object storage request failed: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub key: String,
    pub bytes: Vec<u8>,
}

impl StoredObject {
    pub fn content_type(&self) -> &'static str {
        content_type_for(&self.key)
    }

    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<StoredObject, StorageError>;

    /// Cheap reachability check for the health endpoint.
    async fn is_reachable(&self) -> bool;
}

/// Content type by file extension: `pdf`, `zip`, or opaque bytes.
pub fn content_type_for(key: &str) -> &'static str {
    let extension = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

/// Reject keys that could escape the scan artifact prefix.
pub fn validate_key(key: &str) -> Result<&str, StorageError> {
    let key = key.trim();
    if key.is_empty() || key.starts_with('/') || key.split('/').any(|part| part == "..") {
        return Err(StorageError::NotFound(key.to_string()));
    }
    Ok(key)
}
