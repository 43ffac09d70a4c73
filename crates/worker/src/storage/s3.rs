use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use super::{ContentStore, ObjectPage, ObjectReader, StorageError, StoreFuture};
use crate::config::StorageConfig;

/// Bucket in an S3-compatible object store.
#[derive(Debug, Clone)]
pub struct S3ContentStore {
    client: Client,
    bucket: String,
    page_size: i32,
}

impl S3ContentStore {
    pub fn new(client: Client, bucket: impl Into<String>, page_size: i32) -> Self {
        Self { client, bucket: bucket.into(), page_size }
    }

    /// Build a client from the ambient AWS credential chain plus the
    /// configured region and optional endpoint override.
    pub async fn from_config(config: &StorageConfig) -> Self {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let client = Client::from_conf(builder.build());
        info!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = config.endpoint_url.as_deref().unwrap_or("default"),
            "content store client ready"
        );
        Self::new(client, config.bucket.clone(), config.page_size)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

impl ContentStore for S3ContentStore {
    fn list_page<'a>(
        &'a self,
        prefix: &'a str,
        continuation: Option<&'a str>,
    ) -> StoreFuture<'a, ObjectPage> {
        Box::pin(async move {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .max_keys(self.page_size);
            if let Some(token) = continuation {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(|error| StorageError::List {
                prefix: prefix.to_string(),
                message: DisplayErrorContext(&error).to_string(),
            })?;

            let keys: Vec<String> = response
                .contents()
                .iter()
                .filter_map(|object| object.key())
                .map(str::to_string)
                .collect();
            debug!(bucket = %self.bucket, %prefix, count = keys.len(), "listed object page");

            Ok(ObjectPage {
                keys,
                next_token: response.next_continuation_token().map(str::to_string),
            })
        })
    }

    fn open<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ObjectReader> {
        Box::pin(async move {
            let response = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map_err(|error| StorageError::Read {
                    key: key.to_string(),
                    message: DisplayErrorContext(&error).to_string(),
                })?;

            let reader: ObjectReader = Box::pin(response.body.into_async_read());
            Ok(reader)
        })
    }
}
