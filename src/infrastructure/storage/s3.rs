use async_trait::async_trait;
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::{Client, config::BehaviorVersion, config::Credentials, config::Region};
use tracing::{debug, info};

use super::{BlobStore, StorageError};
use crate::config::settings::AppConfig;

#[derive(Clone)]
pub struct StorageService {
    pub client: Client,
    pub bucket: String,
}

impl StorageService {
    pub async fn new(config: &AppConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "static",
        );

        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.bucket_region.clone()))
            .credentials_provider(credentials);

        if let Some(endpoint) = &config.endpoint {
            // Custom endpoints (MinIO) need path-style addressing
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let client = Client::from_conf(builder.build());

        info!(
            "✅ S3 client ready (bucket={}, region={})",
            config.bucket_name, config.bucket_region
        );

        Self {
            client,
            bucket: config.bucket_name.clone(),
        }
    }
}

#[async_trait]
impl BlobStore for StorageService {
    async fn get(&self, key: &str) -> Result<ByteStream, StorageError> {
        debug!("GET s3://{}/{}", self.bucket, key);

        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let missing = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false);
                if missing {
                    StorageError::NotFound(key.to_string())
                } else {
                    StorageError::Backend(DisplayErrorContext(&e).to_string())
                }
            })?;

        Ok(output.body)
    }

    async fn put(
        &self,
        key: &str,
        body: ByteStream,
        content_type: &str,
    ) -> Result<(), StorageError> {
        debug!("PUT s3://{}/{} ({})", self.bucket, key, content_type);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::Backend(DisplayErrorContext(&e).to_string()))?;

        Ok(())
    }
}
