//! AWS SDK S3 client implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

use symstash_storage::{ObjectMetadata, PutObjectRequest, StorageClient, StorageError};

use crate::error::classify_service_error;
use crate::settings::S3Settings;

/// StorageClient implementation using AWS SDK for Rust.
pub struct S3StorageClient {
    /// The underlying S3 client.
    s3_client: S3Client,
    /// Expected bucket owner for security validation.
    expected_bucket_owner: Option<String>,
}

impl S3StorageClient {
    /// Create a new S3 storage client.
    ///
    /// Uses the default credential chain unless static credentials are set.
    ///
    /// # Arguments
    /// * `settings` - Region, endpoint and optional credentials
    pub async fn new(settings: S3Settings) -> Result<Self, StorageError> {
        let config_loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(settings.region.clone()));

        let config_loader = if let Some(ref creds) = settings.credentials {
            let credentials = Credentials::new(
                &creds.access_key_id,
                &creds.secret_access_key,
                creds.session_token.clone(),
                None,
                "symstash",
            );
            config_loader.credentials_provider(credentials)
        } else {
            config_loader
        };

        let sdk_config = config_loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(settings.force_path_style);
        if let Some(ref endpoint_url) = settings.endpoint_url {
            log::debug!("Using custom S3 endpoint {}", endpoint_url);
            builder = builder.endpoint_url(endpoint_url);
        }

        Ok(Self {
            s3_client: S3Client::from_conf(builder.build()),
            expected_bucket_owner: settings.expected_bucket_owner,
        })
    }

    /// Create a client from an existing S3Client (for testing).
    ///
    /// # Arguments
    /// * `s3_client` - Pre-configured S3 client
    /// * `expected_bucket_owner` - Optional expected bucket owner
    pub fn from_client(s3_client: S3Client, expected_bucket_owner: Option<String>) -> Self {
        Self {
            s3_client,
            expected_bucket_owner,
        }
    }
}

#[async_trait]
impl StorageClient for S3StorageClient {
    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<ObjectMetadata>, StorageError> {
        let mut request = self.s3_client.head_object().bucket(bucket).key(key);

        if let Some(ref owner) = self.expected_bucket_owner {
            request = request.expected_bucket_owner(owner);
        }

        match request.send().await {
            Ok(output) => {
                let user_metadata: HashMap<String, String> = output
                    .metadata()
                    .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                    .unwrap_or_default();

                Ok(Some(ObjectMetadata {
                    size: output.content_length().map(|l| l as u64).unwrap_or(0),
                    content_type: output.content_type().map(|s| s.to_string()),
                    content_encoding: output.content_encoding().map(|s| s.to_string()),
                    user_metadata,
                }))
            }
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(None)
                } else {
                    Err(classify_service_error(bucket, key, &service_err))
                }
            }
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        request: PutObjectRequest,
    ) -> Result<(), StorageError> {
        let PutObjectRequest {
            body,
            content_encoding,
            content_type,
            metadata,
        } = request;

        let mut put = self
            .s3_client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body));

        if let Some(ref owner) = self.expected_bucket_owner {
            put = put.expected_bucket_owner(owner);
        }

        if let Some(encoding) = content_encoding {
            put = put.content_encoding(encoding);
        }

        if let Some(ct) = content_type {
            put = put.content_type(ct);
        }

        for (k, v) in metadata {
            put = put.metadata(k, v);
        }

        put.send()
            .await
            .map_err(|err| classify_service_error(bucket, key, &err.into_service_error()))?;

        Ok(())
    }

    async fn head_bucket(&self, bucket: &str) -> Result<bool, StorageError> {
        let mut request = self.s3_client.head_bucket().bucket(bucket);

        if let Some(ref owner) = self.expected_bucket_owner {
            request = request.expected_bucket_owner(owner);
        }

        match request.send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    log::warn!("Bucket {} does not exist", bucket);
                    Ok(false)
                } else {
                    Err(classify_service_error(bucket, "", &service_err))
                }
            }
        }
    }
}
