//! Photo object storage.
//!
//! Wraps the S3 client and bucket name so the rest of the API never touches
//! the SDK directly. Objects are private; reads go out as presigned URLs.

use std::time::Duration;

use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use tracing::info;

use crate::errors::AppError;

/// Presigned GET URLs expire after one hour.
const PRESIGN_EXPIRY_SECS: u64 = 3600;

#[derive(Clone)]
pub struct PhotoStorage {
    s3: S3Client,
    bucket: String,
}

impl PhotoStorage {
    pub fn new(s3: S3Client, bucket: String) -> Self {
        Self { s3, bucket }
    }

    /// Uploads photo bytes under `key`.
    pub async fn put_photo(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), AppError> {
        self.s3
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("S3 upload failed for {key}: {e}")))?;

        info!("Uploaded photo to s3://{}/{}", self.bucket, key);
        Ok(())
    }

    /// Downloads the full object at `key`, for feeding the vision model.
    pub async fn fetch_photo_bytes(&self, key: &str) -> Result<Bytes, AppError> {
        let object = self
            .s3
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("S3 fetch failed for {key}: {e}")))?;

        let data = object
            .body
            .collect()
            .await
            .map_err(|e| AppError::Storage(format!("S3 body read failed for {key}: {e}")))?;

        Ok(data.into_bytes())
    }

    /// Presigned GET URL for a private photo object.
    pub async fn presign_get(&self, key: &str) -> Result<String, AppError> {
        let presigning = PresigningConfig::expires_in(Duration::from_secs(PRESIGN_EXPIRY_SECS))
            .map_err(|e| AppError::Storage(format!("Invalid presigning config: {e}")))?;

        let request = self
            .s3
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| AppError::Storage(format!("S3 presign failed for {key}: {e}")))?;

        Ok(request.uri().to_string())
    }

    /// Deletes the object at `key`.
    pub async fn delete_photo(&self, key: &str) -> Result<(), AppError> {
        self.s3
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("S3 delete failed for {key}: {e}")))?;

        info!("Deleted photo s3://{}/{}", self.bucket, key);
        Ok(())
    }
}
