use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::StorageSettings;
use crate::services::storage::{PhotoBucket, StorageError};

/// Published photos are square crops of this edge length.
pub const PUBLISHED_EDGE: u32 = 512;
const JPEG_QUALITY: u8 = 82;
const PUBLISH_FOLDER: &str = "missing-persons";

/// Turns a staged photo into a durable, publicly reachable image.
#[async_trait]
pub trait ImageProcessor: Send + Sync {
    /// Transform and publish the file at `local_path` under `target_id`,
    /// returning its public URL.
    async fn upload(&self, local_path: &Path, target_id: &str) -> Result<String, ImageProcessorError>;
}

/// Builds a processor for each job. Construction can fail (for example when
/// image store credentials are not configured), which fails only that job.
pub trait ProcessorProvider: Send + Sync {
    fn acquire(&self) -> Result<Arc<dyn ImageProcessor>, ImageProcessorError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ImageProcessorError {
    #[error("Image store credential {0} is not configured")]
    MissingCredentials(&'static str),

    #[error("Failed to read staged photo: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to transform photo: {0}")]
    Image(#[from] image::ImageError),

    #[error("Image store error: {0}")]
    Storage(#[from] StorageError),

    #[error("Photo transform task aborted")]
    TransformAborted,

    #[error("Image store call exceeded {0:?}")]
    Timeout(Duration),
}

/// Crop to a centered square, scale to [`PUBLISHED_EDGE`], and encode as JPEG.
pub fn resize_for_publication(source: &[u8]) -> Result<Vec<u8>, ImageProcessorError> {
    let decoded = image::load_from_memory(source)?;
    let resized = decoded.resize_to_fill(PUBLISHED_EDGE, PUBLISHED_EDGE, FilterType::Lanczos3);

    let mut encoded = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY);
    image::DynamicImage::ImageRgb8(resized.to_rgb8()).write_with_encoder(encoder)?;

    Ok(encoded)
}

/// Object key for a published photo.
pub fn publish_key(target_id: &str) -> String {
    format!("{PUBLISH_FOLDER}/{target_id}.jpg")
}

/// Resizes locally and publishes to an R2 bucket.
pub struct R2ImageProcessor {
    storage: PhotoBucket,
    public_url: String,
}

impl R2ImageProcessor {
    pub fn new(settings: &StorageSettings) -> Result<Self, ImageProcessorError> {
        let bucket = required(&settings.bucket, "R2_BUCKET")?;
        let endpoint = required(&settings.endpoint, "R2_ENDPOINT")?;
        let access_key = required(&settings.access_key, "R2_ACCESS_KEY")?;
        let secret_key = required(&settings.secret_key, "R2_SECRET_KEY")?;
        let public_url = required(&settings.public_url, "R2_PUBLIC_URL")?;

        let storage = PhotoBucket::connect(bucket, endpoint, access_key, secret_key)?;

        Ok(Self {
            storage,
            public_url: public_url.trim_end_matches('/').to_string(),
        })
    }
}

fn required<'a>(
    value: &'a Option<String>,
    name: &'static str,
) -> Result<&'a str, ImageProcessorError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ImageProcessorError::MissingCredentials(name))
}

#[async_trait]
impl ImageProcessor for R2ImageProcessor {
    async fn upload(&self, local_path: &Path, target_id: &str) -> Result<String, ImageProcessorError> {
        let source = tokio::fs::read(local_path).await?;

        let jpeg = tokio::task::spawn_blocking(move || resize_for_publication(&source))
            .await
            .map_err(|_| ImageProcessorError::TransformAborted)??;

        let key = publish_key(target_id);
        self.storage.put_jpeg(&key, &jpeg).await?;

        tracing::debug!(key = %key, bytes = jpeg.len(), "Published photo");

        Ok(format!("{}/{}", self.public_url, key))
    }
}

/// Builds an [`R2ImageProcessor`] from the configured credentials.
pub struct R2ProcessorProvider {
    settings: StorageSettings,
}

impl R2ProcessorProvider {
    pub fn new(settings: StorageSettings) -> Self {
        Self { settings }
    }
}

impl ProcessorProvider for R2ProcessorProvider {
    fn acquire(&self) -> Result<Arc<dyn ImageProcessor>, ImageProcessorError> {
        Ok(Arc::new(R2ImageProcessor::new(&self.settings)?))
    }
}
