//! S3-compatible multipart store
//!
//! Wraps the AWS SDK for S3-compatible storage access.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
    types::{CompletedMultipartUpload, CompletedPart},
    Client,
};
use std::io::SeekFrom;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::config::StorageConfig;
use crate::engine::UploadedPart;
use crate::error::StorageError;

use super::{MultipartStore, PartRequest, ProgressListener, TransferProgress};

/// Multipart store backed by an S3 client
#[derive(Clone)]
pub struct S3MultipartStore {
    client: Client,
}

impl S3MultipartStore {
    /// Create a store from configuration.
    ///
    /// Explicit credentials win; otherwise the default AWS provider chain
    /// (environment, profile, instance metadata) is used.
    pub async fn new(config: &StorageConfig) -> Self {
        let region = Region::new(config.region.clone());
        let loader = aws_config::defaults(BehaviorVersion::latest()).region(region);

        let loader = match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "resumable-upload",
            )),
            _ => loader,
        };

        let sdk_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint {
            // Required for MinIO and other S3-compatible services
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self::from_client(Client::from_conf(builder.build()))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Check that the bucket is reachable. Failure is only logged.
    pub async fn verify_bucket(&self, bucket: &str) -> bool {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => {
                tracing::info!("Connected to S3 bucket: {}", bucket);
                true
            }
            Err(e) => {
                tracing::warn!(
                    "Could not verify bucket {}: {}. Will attempt operations anyway.",
                    bucket,
                    DisplayErrorContext(&e)
                );
                false
            }
        }
    }

    async fn read_range(request: &PartRequest<'_>) -> Result<Vec<u8>, StorageError> {
        let read_error = |source| StorageError::ReadPart {
            part_number: request.part_number,
            path: request.file_path.display().to_string(),
            source,
        };

        let length = usize::try_from(request.length).map_err(|_| {
            read_error(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "part length exceeds addressable memory",
            ))
        })?;

        let mut file = tokio::fs::File::open(request.file_path)
            .await
            .map_err(read_error)?;
        file.seek(SeekFrom::Start(request.offset))
            .await
            .map_err(read_error)?;

        let mut buf = vec![0u8; length];
        file.read_exact(&mut buf).await.map_err(read_error)?;
        Ok(buf)
    }
}

fn sdk_part_number(part_number: u32) -> Result<i32, StorageError> {
    i32::try_from(part_number).map_err(|_| StorageError::PartNumberOutOfRange(part_number))
}

#[async_trait]
impl MultipartStore for S3MultipartStore {
    async fn initiate(&self, bucket: &str, key: &str) -> Result<String, StorageError> {
        let response = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Initiate {
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        response
            .upload_id()
            .map(|id| id.to_string())
            .ok_or_else(|| StorageError::MissingField {
                key: key.to_string(),
                field: "upload_id",
            })
    }

    async fn upload_part(
        &self,
        request: &PartRequest<'_>,
        listener: &dyn ProgressListener,
    ) -> Result<String, StorageError> {
        let part_number = sdk_part_number(request.part_number)?;
        let body = Self::read_range(request).await?;

        listener.on_progress(TransferProgress {
            part_number: request.part_number,
            transferred_bytes: 0,
            total_bytes: request.length,
        });

        let response = self
            .client
            .upload_part()
            .bucket(request.bucket)
            .key(request.key)
            .upload_id(request.session_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StorageError::UploadPart {
                key: request.key.to_string(),
                part_number: request.part_number,
                message: DisplayErrorContext(&e).to_string(),
            })?;

        listener.on_progress(TransferProgress {
            part_number: request.part_number,
            transferred_bytes: request.length,
            total_bytes: request.length,
        });

        response
            .e_tag()
            .map(|tag| tag.to_string())
            .ok_or_else(|| StorageError::MissingField {
                key: request.key.to_string(),
                field: "e_tag",
            })
    }

    async fn complete(
        &self,
        bucket: &str,
        key: &str,
        session_id: &str,
        parts: &[UploadedPart],
    ) -> Result<(), StorageError> {
        let completed_parts = parts
            .iter()
            .map(|part| {
                Ok(CompletedPart::builder()
                    .part_number(sdk_part_number(part.part_number)?)
                    .e_tag(&part.part_tag)
                    .build())
            })
            .collect::<Result<Vec<_>, StorageError>>()?;

        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(session_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(|e| StorageError::Complete {
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        Ok(())
    }

    async fn abort(&self, bucket: &str, key: &str, session_id: &str) -> Result<(), StorageError> {
        self.client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(session_id)
            .send()
            .await
            .map_err(|e| StorageError::Abort {
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        Ok(())
    }
}
