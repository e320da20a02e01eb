//! crates/bite_core/src/upload.rs
//!
//! The image upload pipeline. Turns staged local images into durable public URLs:
//! each image is compressed, uploaded under a fresh unique key, and resolved to its
//! public URL. Batches run with a bounded number of uploads in flight and publish
//! their progress on a `watch` channel so callers can drive a progress bar.

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use rand::Rng;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, info, warn};

use crate::domain::PendingImage;
use crate::ports::{CompressOptions, ImageCompressor, ObjectStorage, PortError, PortResult};

pub const DEFAULT_BUCKET: &str = "recipes-assets";
pub const DEFAULT_FOLDER: &str = "images";
pub const DEFAULT_CONCURRENCY: usize = 3;

const KEY_SUFFIX_LEN: usize = 13;
const KEY_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

//=========================================================================================
// Options and Progress
//=========================================================================================

/// Where uploads go and how images are compressed before they leave.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub bucket: String,
    pub folder: String,
    pub compress: CompressOptions,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            folder: DEFAULT_FOLDER.to_string(),
            compress: CompressOptions {
                max_width: 1280,
                quality: 0.85,
                ..CompressOptions::default()
            },
        }
    }
}

/// Aggregate progress of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadProgress {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// round(100 * (completed + failed) / total); 0 for an empty batch.
    pub percentage: u8,
}

impl UploadProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    fn record(&mut self, succeeded: bool) {
        if succeeded {
            self.completed += 1;
        } else {
            self.failed += 1;
        }
        let finished = (self.completed + self.failed) as f64;
        self.percentage = (100.0 * finished / self.total as f64).round() as u8;
    }

    pub fn is_complete(&self) -> bool {
        self.completed + self.failed == self.total
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadStatus {
    pub is_uploading: bool,
    pub progress: UploadProgress,
}

//=========================================================================================
// The Pipeline
//=========================================================================================

pub struct UploadPipeline {
    storage: Arc<dyn ObjectStorage>,
    compressor: Arc<dyn ImageCompressor>,
    options: UploadOptions,
    status: watch::Sender<UploadStatus>,
}

impl UploadPipeline {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        compressor: Arc<dyn ImageCompressor>,
        options: UploadOptions,
    ) -> Self {
        let (status, _) = watch::channel(UploadStatus::default());
        Self {
            storage,
            compressor,
            options,
            status,
        }
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    /// A receiver that observes every progress change of this pipeline's batches.
    pub fn subscribe(&self) -> watch::Receiver<UploadStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> UploadStatus {
        *self.status.borrow()
    }

    /// Uploads one image and returns its public URL, or `None` if any stage failed.
    /// Failures are logged, never propagated.
    pub async fn upload_single_image(
        &self,
        source: &Path,
        bucket: &str,
        folder: &str,
    ) -> Option<String> {
        match self.try_upload(source, bucket, folder).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(source = %source.display(), error = %e, "Image upload failed");
                None
            }
        }
    }

    /// Uploads every image with at most `concurrency` uploads in flight.
    ///
    /// Returns one record per input, in completion order: either with
    /// `uploaded_url` set or with `error` set. The batch itself never fails.
    pub async fn upload_multiple_images(
        &self,
        images: Vec<PendingImage>,
        concurrency: usize,
    ) -> Vec<PendingImage> {
        let total = images.len();
        let concurrency = concurrency.max(1);
        self.status.send_replace(UploadStatus {
            is_uploading: true,
            progress: UploadProgress::new(total),
        });
        info!(total, concurrency, "Starting image upload batch");

        let limiter = Semaphore::new(concurrency);
        let limiter = &limiter;
        let mut uploads: FuturesUnordered<_> = images
            .into_iter()
            .map(|image| async move {
                let outcome = self.upload_gated(limiter, &image.source).await;
                (image, outcome)
            })
            .collect();

        let mut results = Vec::with_capacity(total);
        while let Some((mut image, outcome)) = uploads.next().await {
            image.is_uploading = false;
            match outcome {
                Ok(url) => {
                    image.uploaded_url = Some(url);
                    image.error = None;
                }
                Err(e) => {
                    warn!(source = %image.source.display(), error = %e, "Image upload failed");
                    image.error = Some(e.to_string());
                }
            }

            let succeeded = image.error.is_none();
            self.status.send_modify(|status| status.progress.record(succeeded));
            debug!(progress = ?self.status.borrow().progress, "Upload progress");
            results.push(image);
        }

        self.status.send_modify(|status| status.is_uploading = false);
        let progress = self.status().progress;
        info!(
            completed = progress.completed,
            failed = progress.failed,
            "Image upload batch finished"
        );
        results
    }

    async fn upload_gated(&self, limiter: &Semaphore, source: &Path) -> PortResult<String> {
        let _permit = limiter
            .acquire()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.try_upload(source, &self.options.bucket, &self.options.folder)
            .await
    }

    async fn try_upload(&self, source: &Path, bucket: &str, folder: &str) -> PortResult<String> {
        let compressed = self
            .compressor
            .compress(source, &self.options.compress)
            .await?;
        let key = object_key(folder, compressed.format.extension());
        let path = self
            .storage
            .upload(bucket, &key, compressed.data, compressed.format.content_type())
            .await?;
        Ok(self.storage.public_url(bucket, &path))
    }
}

/// A fresh object key of the form `{folder}/{unix_millis}-{random}.{extension}`.
pub fn object_key(folder: &str, extension: &str) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..KEY_SUFFIX_LEN)
        .map(|_| KEY_ALPHABET[rng.random_range(0..KEY_ALPHABET.len())] as char)
        .collect();
    format!(
        "{}/{}-{}.{}",
        folder,
        Utc::now().timestamp_millis(),
        suffix,
        extension
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ImageRole;
    use crate::ports::{CompressedImage, ImageFormat};
    use async_trait::async_trait;
    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Mutex;
    use uuid::Uuid;

    /// Compresses anything except paths containing "broken".
    struct FakeCompressor;

    #[async_trait]
    impl ImageCompressor for FakeCompressor {
        async fn compress(
            &self,
            source: &Path,
            options: &CompressOptions,
        ) -> PortResult<CompressedImage> {
            if source.to_string_lossy().contains("broken") {
                return Err(PortError::Unexpected("cannot decode image".to_string()));
            }
            Ok(CompressedImage {
                data: Bytes::from(source.to_string_lossy().into_owned()),
                format: options.format,
            })
        }
    }

    #[derive(Default)]
    struct FakeStorage {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        keys: Mutex<HashSet<String>>,
        reject_all: bool,
    }

    #[async_trait]
    impl ObjectStorage for FakeStorage {
        async fn upload(
            &self,
            bucket: &str,
            key: &str,
            _data: Bytes,
            _content_type: &str,
        ) -> PortResult<String> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.reject_all {
                return Err(PortError::Unexpected("storage unavailable".to_string()));
            }
            let path = format!("{}/{}", bucket, key);
            if !self.keys.lock().await.insert(path.clone()) {
                return Err(PortError::AlreadyExists(path));
            }
            Ok(key.to_string())
        }

        fn public_url(&self, bucket: &str, path: &str) -> String {
            format!("https://cdn.test/{}/{}", bucket, path)
        }
    }

    fn pipeline(storage: Arc<FakeStorage>) -> UploadPipeline {
        UploadPipeline::new(storage, Arc::new(FakeCompressor), UploadOptions::default())
    }

    fn pending(path: &str) -> PendingImage {
        PendingImage {
            id: Uuid::new_v4(),
            source: path.into(),
            role: ImageRole::Step,
            step_index: Some(0),
            is_uploading: true,
            uploaded_url: None,
            error: None,
        }
    }

    #[test]
    fn object_keys_have_folder_timestamp_and_random_suffix() {
        let key = object_key("images", "jpg");
        let name = key.strip_prefix("images/").unwrap();
        let stem = name.strip_suffix(".jpg").unwrap();
        let (millis, suffix) = stem.split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(suffix.len(), KEY_SUFFIX_LEN);
        assert!(suffix.bytes().all(|b| KEY_ALPHABET.contains(&b)));
        assert_ne!(object_key("images", "jpg"), key);
    }

    #[tokio::test]
    async fn never_exceeds_concurrency_and_returns_every_image() {
        let storage = Arc::new(FakeStorage::default());
        let pipeline = pipeline(storage.clone());
        let images: Vec<_> = (0..10).map(|i| pending(&format!("/tmp/{}.jpg", i))).collect();

        let results = pipeline.upload_multiple_images(images, 3).await;

        assert_eq!(results.len(), 10);
        let max = storage.max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 3, "saw {} uploads in flight", max);
        assert!(results.iter().all(|r| r.uploaded_url.is_some() && !r.is_uploading));
        assert_eq!(
            pipeline.status(),
            UploadStatus {
                is_uploading: false,
                progress: UploadProgress {
                    total: 10,
                    completed: 10,
                    failed: 0,
                    percentage: 100,
                },
            }
        );
    }

    #[tokio::test]
    async fn a_batch_where_everything_fails_still_resolves() {
        let storage = Arc::new(FakeStorage {
            reject_all: true,
            ..Default::default()
        });
        let pipeline = pipeline(storage);
        let images: Vec<_> = (0..4).map(|i| pending(&format!("/tmp/{}.jpg", i))).collect();

        let results = pipeline.upload_multiple_images(images, 2).await;

        assert_eq!(results.len(), 4);
        for result in &results {
            assert!(result.uploaded_url.is_none());
            assert!(!result.error.as_deref().unwrap_or_default().is_empty());
        }
        let progress = pipeline.status().progress;
        assert_eq!(progress.failed, 4);
        assert_eq!(progress.percentage, 100);
    }

    #[tokio::test]
    async fn failures_are_isolated_to_their_image() {
        let pipeline = pipeline(Arc::new(FakeStorage::default()));
        let good = pending("/tmp/good.jpg");
        let bad = pending("/tmp/broken.jpg");
        let (good_id, bad_id) = (good.id, bad.id);

        let results = pipeline.upload_multiple_images(vec![bad, good], 1).await;

        let good = results.iter().find(|r| r.id == good_id).unwrap();
        let bad = results.iter().find(|r| r.id == bad_id).unwrap();
        assert!(good.uploaded_url.as_deref().unwrap().starts_with("https://cdn.test/recipes-assets/images/"));
        assert!(bad.error.as_deref().unwrap().contains("cannot decode image"));
        assert_eq!(pipeline.status().progress.percentage, 100);
    }

    #[tokio::test]
    async fn progress_is_published_to_subscribers() {
        let pipeline = pipeline(Arc::new(FakeStorage::default()));
        let mut rx = pipeline.subscribe();
        let images = vec![pending("/tmp/a.jpg"), pending("/tmp/broken.jpg"), pending("/tmp/c.jpg")];

        pipeline.upload_multiple_images(images, 3).await;

        assert!(rx.has_changed().unwrap());
        let status = *rx.borrow_and_update();
        assert!(!status.is_uploading);
        assert_eq!(status.progress.completed, 2);
        assert_eq!(status.progress.failed, 1);
        assert!(status.progress.is_complete());
    }

    #[tokio::test]
    async fn empty_batch_finishes_immediately() {
        let pipeline = pipeline(Arc::new(FakeStorage::default()));
        let results = pipeline.upload_multiple_images(Vec::new(), 3).await;
        assert!(results.is_empty());
        assert_eq!(pipeline.status().progress, UploadProgress::new(0));
    }

    #[tokio::test]
    async fn single_upload_returns_none_on_failure() {
        let pipeline = pipeline(Arc::new(FakeStorage::default()));
        let url = pipeline
            .upload_single_image(Path::new("/tmp/a.jpg"), "avatars", "me")
            .await
            .unwrap();
        assert!(url.starts_with("https://cdn.test/avatars/me/"));
        assert!(url.ends_with(".jpg"));

        let missing = pipeline
            .upload_single_image(Path::new("/tmp/broken.jpg"), "avatars", "me")
            .await;
        assert_eq!(missing, None);
    }

    #[test]
    fn percentage_rounds() {
        let mut progress = UploadProgress::new(3);
        progress.record(true);
        assert_eq!(progress.percentage, 33);
        progress.record(false);
        assert_eq!(progress.percentage, 67);
        assert!(!progress.is_complete());
    }

    #[test]
    fn default_options_match_recipe_assets() {
        let options = UploadOptions::default();
        assert_eq!(options.bucket, "recipes-assets");
        assert_eq!(options.compress.max_width, 1280);
        assert_eq!(options.compress.format, ImageFormat::Jpeg);
    }
}
