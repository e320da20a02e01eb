//! services/api/src/adapters/compressor.rs
//!
//! Implements the `ImageCompressor` port with the `image` crate: decode whatever
//! the user picked, shrink it into the configured bounding box, and re-encode.

use async_trait::async_trait;
use bite_core::ports::{CompressOptions, CompressedImage, ImageCompressor, ImageFormat, PortError, PortResult};
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageReader};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Maximum size of a source image (20MB).
pub const MAX_SOURCE_SIZE: u64 = 20 * 1024 * 1024;

#[derive(Clone, Default)]
pub struct ImageCrateCompressor;

impl ImageCrateCompressor {
    pub fn new() -> Self {
        Self
    }
}

/// Maps a 0..=1 quality factor onto the encoder's 1..=100 scale.
fn jpeg_quality(quality: f32) -> u8 {
    (quality.clamp(0.0, 1.0) * 100.0).round().clamp(1.0, 100.0) as u8
}

fn compress_file(source: &Path, options: &CompressOptions) -> Result<Vec<u8>, String> {
    let size = std::fs::metadata(source)
        .map_err(|e| format!("Failed to read image {}: {}", source.display(), e))?
        .len();
    if size > MAX_SOURCE_SIZE {
        return Err(format!(
            "Image too large: {} bytes (max {})",
            size, MAX_SOURCE_SIZE
        ));
    }

    let img = ImageReader::open(source)
        .map_err(|e| format!("Failed to read image {}: {}", source.display(), e))?
        .with_guessed_format()
        .map_err(|e| format!("Failed to read image {}: {}", source.display(), e))?
        .decode()
        .map_err(|e| format!("Failed to decode image: {}", e))?;

    // Only ever shrink; resize() keeps the aspect ratio inside the box.
    let img = if img.width() > options.max_width || img.height() > options.max_height {
        img.resize(
            options.max_width,
            options.max_height,
            image::imageops::FilterType::Triangle,
        )
    } else {
        img
    };

    encode(img, options)
}

fn encode(img: DynamicImage, options: &CompressOptions) -> Result<Vec<u8>, String> {
    let mut buf = Cursor::new(Vec::new());
    match options.format {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, jpeg_quality(options.quality));
            DynamicImage::ImageRgb8(img.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(|e| format!("Failed to encode image: {}", e))?;
        }
        ImageFormat::Png => {
            img.write_to(&mut buf, image::ImageFormat::Png)
                .map_err(|e| format!("Failed to encode image: {}", e))?;
        }
    }
    Ok(buf.into_inner())
}

#[async_trait]
impl ImageCompressor for ImageCrateCompressor {
    async fn compress(
        &self,
        source: &Path,
        options: &CompressOptions,
    ) -> PortResult<CompressedImage> {
        let source: PathBuf = source.to_path_buf();
        let options = *options;
        let data = tokio::task::spawn_blocking(move || compress_file(&source, &options))
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .map_err(PortError::Unexpected)?;

        Ok(CompressedImage {
            data: Bytes::from(data),
            format: options.format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    fn write_png(dir: &TempDir, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.path().join(name);
        let img = ImageBuffer::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
        img.save(&path).unwrap();
        path
    }

    #[tokio::test]
    async fn shrinks_into_the_bounding_box_and_encodes_jpeg() {
        let dir = TempDir::new().unwrap();
        let source = write_png(&dir, "big.png", 400, 200);
        let options = CompressOptions {
            max_width: 100,
            max_height: 100,
            quality: 0.8,
            format: ImageFormat::Jpeg,
        };

        let compressed = ImageCrateCompressor::new().compress(&source, &options).await.unwrap();

        assert_eq!(compressed.format, ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&compressed.data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 50));
    }

    #[tokio::test]
    async fn small_images_are_not_upscaled() {
        let dir = TempDir::new().unwrap();
        let source = write_png(&dir, "small.png", 40, 30);
        let options = CompressOptions {
            format: ImageFormat::Png,
            ..CompressOptions::default()
        };

        let compressed = ImageCrateCompressor::new().compress(&source, &options).await.unwrap();

        let decoded = image::load_from_memory(&compressed.data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (40, 30));
    }

    #[tokio::test]
    async fn non_images_fail() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("notes.txt");
        std::fs::write(&source, b"not an image").unwrap();

        let result = ImageCrateCompressor::new()
            .compress(&source, &CompressOptions::default())
            .await;
        assert!(result.is_err());

        let missing = ImageCrateCompressor::new()
            .compress(&dir.path().join("missing.jpg"), &CompressOptions::default())
            .await;
        assert!(missing.is_err());
    }

    #[test]
    fn quality_maps_to_encoder_scale() {
        assert_eq!(jpeg_quality(0.85), 85);
        assert_eq!(jpeg_quality(0.0), 1);
        assert_eq!(jpeg_quality(2.0), 100);
    }
}
