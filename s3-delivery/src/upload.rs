#![doc = "Object-store integration for the CLI: implements the core `ObjectStore` trait on top of the AWS S3 SDK."]
//
//! # S3 Store (CLI <-> Core)
//!
//! This module provides the bridge between the CLI workflow and the upload
//! abstraction in [`s3_delivery_core::contract`]. It wires up the
//! `ObjectStore` trait for real use against the delivery bucket.
//!
//! - Construct [`S3Store`] from a loaded [`DeliveryConfig`]; the credentials
//!   are passed in, never read from process-wide state.
//! - Files up to [`MULTIPART_THRESHOLD`] go up in a single streamed
//!   `PutObject`; larger files are sent as a multipart upload read from disk
//!   part by part, so nothing is buffered whole in memory.
//! - Retries and timeouts are the SDK's standard policy.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::{ByteStream, Length};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use std::path::Path;

use s3_delivery_core::contract::{ObjectStore, StoredObject};
use s3_delivery_core::TransferError;

use crate::load_config::DeliveryConfig;

/// Files larger than this are sent as multipart uploads.
pub const MULTIPART_THRESHOLD: u64 = 64 * 1024 * 1024;
/// Size of each multipart part (the last one may be smaller).
pub const PART_SIZE: u64 = 16 * 1024 * 1024;

pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// Builds an S3 client from the config's static credentials and region.
    pub async fn connect(config: &DeliveryConfig) -> Self {
        let credentials = Credentials::new(
            config.credentials.access_key_id.clone(),
            config.credentials.secret_access_key.clone(),
            None,
            None,
            "s3-delivery-config",
        );
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;
        tracing::info!(
            bucket = %config.bucket,
            region = %config.region,
            "Initialized S3 client"
        );
        Self::new(Client::new(&shared), config.bucket.clone())
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_single(&self, local_path: &Path, key: &str, size: u64) -> Result<(), TransferError> {
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| TransferError::read(local_path, e))?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_length(size as i64)
            .body(body)
            .send()
            .await
            .map_err(|e| TransferError::store(key, DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    async fn put_multipart(&self, local_path: &Path, key: &str, size: u64) -> Result<(), TransferError> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| TransferError::store(key, DisplayErrorContext(&e).to_string()))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| TransferError::store(key, "no upload id returned"))?
            .to_string();

        match self.upload_parts(local_path, key, &upload_id, size).await {
            Ok(parts) => {
                let completed = CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build();
                self.client
                    .complete_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(completed)
                    .send()
                    .await
                    .map_err(|e| TransferError::store(key, DisplayErrorContext(&e).to_string()))?;
                Ok(())
            }
            Err(e) => {
                if let Err(abort) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    tracing::warn!(
                        key,
                        upload_id = %upload_id,
                        error = %DisplayErrorContext(&abort),
                        "Failed to abort multipart upload"
                    );
                }
                Err(e)
            }
        }
    }

    async fn upload_parts(
        &self,
        local_path: &Path,
        key: &str,
        upload_id: &str,
        size: u64,
    ) -> Result<Vec<CompletedPart>, TransferError> {
        let part_count = size.div_ceil(PART_SIZE).max(1);
        let mut parts = Vec::with_capacity(part_count as usize);
        for index in 0..part_count {
            let offset = index * PART_SIZE;
            let length = PART_SIZE.min(size - offset);
            let body = ByteStream::read_from()
                .path(local_path)
                .offset(offset)
                .length(Length::Exact(length))
                .build()
                .await
                .map_err(|e| TransferError::read(local_path, e))?;
            let part_number = (index + 1) as i32;
            let uploaded = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(body)
                .send()
                .await
                .map_err(|e| TransferError::store(key, DisplayErrorContext(&e).to_string()))?;
            tracing::debug!(key, part_number, length, "Uploaded part");
            parts.push(
                CompletedPart::builder()
                    .e_tag(uploaded.e_tag().unwrap_or_default())
                    .part_number(part_number)
                    .build(),
            );
        }
        Ok(parts)
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put_file(&self, local_path: &Path, key: &str) -> Result<StoredObject, TransferError> {
        let size = tokio::fs::metadata(local_path)
            .await
            .map_err(|e| TransferError::read(local_path, e))?
            .len();
        tracing::debug!(
            path = %local_path.display(),
            bucket = %self.bucket,
            key,
            size,
            "Uploading object"
        );

        if size > MULTIPART_THRESHOLD {
            self.put_multipart(local_path, key, size).await?;
        } else {
            self.put_single(local_path, key, size).await?;
        }

        Ok(StoredObject {
            key: key.to_string(),
            bytes: size,
        })
    }
}
