// Cloudflare R2 through its S3-compatible API

use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region},
    error::SdkError,
};

use super::{ObjectStore, StorageError, StoredObject};
use crate::config::R2Config;

/// R2 ignores regions but the SDK requires one.
const R2_REGION: &str = "auto";

#[derive(Clone)]
pub struct R2Store {
    client: Client,
    bucket: String,
}

impl R2Store {
    pub fn new(config: &R2Config) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "r2-static",
        );

        let sdk_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(R2_REGION))
            .endpoint_url(config.endpoint.clone())
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for R2Store {
    async fn get(&self, key: &str) -> Result<StoredObject, StorageError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match &e {
                SdkError::ServiceError(service) if service.err().is_no_such_key() => {
                    StorageError::NotFound(key.to_string())
                }
                SdkError::ServiceError(service) if service.raw().status().as_u16() == 404 => {
                    StorageError::NotFound(key.to_string())
                }
                _ => StorageError::Backend(e.to_string()),
            })?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to read object body: {}", e)))?;

        tracing::debug!("Fetched object {} from bucket {}", key, self.bucket);

        Ok(StoredObject {
            key: key.to_string(),
            bytes: body.into_bytes().to_vec(),
        })
    }

    async fn is_reachable(&self) -> bool {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok()
    }
}
