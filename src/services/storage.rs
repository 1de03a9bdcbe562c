use s3::creds::Credentials;
use s3::{Bucket, Region};

const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// The R2 bucket that holds published report photos. Objects are written
/// once per report and overwritten when a requeued photo is published again.
pub struct PhotoBucket {
    bucket: Box<Bucket>,
}

impl PhotoBucket {
    /// Build a client for `name` behind the account's S3 `endpoint`. No
    /// request is made until the first upload.
    pub fn connect(
        name: &str,
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self, StorageError> {
        let region = Region::Custom {
            // R2 ignores the region; "auto" is what it documents
            region: "auto".to_string(),
            endpoint: endpoint.to_string(),
        };

        let credentials = Credentials::new(Some(access_key), Some(secret_key), None, None, None)
            .map_err(|e| StorageError::InvalidCredentials(e.to_string()))?;

        let bucket = Bucket::new(name, region, credentials)
            .map_err(|e| StorageError::InvalidCredentials(e.to_string()))?;

        Ok(Self { bucket })
    }

    pub async fn put_jpeg(&self, key: &str, jpeg: &[u8]) -> Result<(), StorageError> {
        let response = self
            .bucket
            .put_object_with_content_type(key, jpeg, JPEG_CONTENT_TYPE)
            .await?;

        accepted(key, response.status_code())
    }
}

fn accepted(key: &str, status: u16) -> Result<(), StorageError> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(StorageError::Rejected {
            key: key.to_string(),
            status,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Photo bucket request failed: {0}")]
    Request(#[from] s3::error::S3Error),

    #[error("Photo bucket rejected {key} with status {status}")]
    Rejected { key: String, status: u16 },

    #[error("Photo bucket credentials are invalid: {0}")]
    InvalidCredentials(String),
}
