//! services/api/src/adapters/storage.rs
//!
//! Local filesystem object storage. Implements the `ObjectStorage` port by
//! writing each object to `{base_path}/{bucket}/{key}`; the router serves that
//! tree under `/storage`, which is what `public_url` points at.

use async_trait::async_trait;
use bite_core::ports::{ObjectStorage, PortError, PortResult};
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// URL prefix under which the router exposes stored objects.
pub const PUBLIC_PREFIX: &str = "/storage";

pub struct LocalObjectStorage {
    base_path: PathBuf,
    public_base_url: String,
}

impl LocalObjectStorage {
    pub fn new(base_path: PathBuf, public_base_url: impl Into<String>) -> Self {
        Self {
            base_path,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolves `bucket/key` under the base path, refusing anything that could escape it.
    fn object_path(&self, bucket: &str, key: &str) -> PortResult<PathBuf> {
        let relative = Path::new(bucket).join(key);
        let is_plain = !bucket.is_empty()
            && !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(PortError::Unexpected(format!(
                "Invalid object key {}/{}",
                bucket, key
            )));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> PortResult<String> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
        }

        // create_new: an existing object is never replaced.
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => PortError::AlreadyExists(format!("{}/{}", bucket, key)),
                _ => PortError::Unexpected(e.to_string()),
            })?;
        file.write_all(&data)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        debug!(bucket, key, content_type, bytes = data.len(), "Stored object");
        Ok(key.to_string())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}{}/{}/{}", self.public_base_url, PUBLIC_PREFIX, bucket, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn stores_objects_and_builds_public_urls() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalObjectStorage::new(temp_dir.path().to_path_buf(), "http://localhost:3000/");

        let path = storage
            .upload("recipes-assets", "images/1-abc.jpg", Bytes::from("jpeg"), "image/jpeg")
            .await
            .unwrap();

        assert_eq!(path, "images/1-abc.jpg");
        let stored = fs::read(temp_dir.path().join("recipes-assets/images/1-abc.jpg"))
            .await
            .unwrap();
        assert_eq!(stored, b"jpeg");
        assert_eq!(
            storage.public_url("recipes-assets", &path),
            "http://localhost:3000/storage/recipes-assets/images/1-abc.jpg"
        );
    }

    #[tokio::test]
    async fn never_overwrites_an_existing_key() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalObjectStorage::new(temp_dir.path().to_path_buf(), "http://x");

        storage
            .upload("b", "k.jpg", Bytes::from("first"), "image/jpeg")
            .await
            .unwrap();
        let second = storage
            .upload("b", "k.jpg", Bytes::from("second"), "image/jpeg")
            .await;

        assert!(matches!(second, Err(PortError::AlreadyExists(_))));
        let stored = fs::read(temp_dir.path().join("b/k.jpg")).await.unwrap();
        assert_eq!(stored, b"first");
    }

    #[tokio::test]
    async fn rejects_keys_that_escape_the_bucket() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalObjectStorage::new(temp_dir.path().to_path_buf(), "http://x");

        for key in ["../evil.jpg", "/etc/passwd", ""] {
            let result = storage.upload("b", key, Bytes::from("x"), "image/jpeg").await;
            assert!(result.is_err(), "accepted {:?}", key);
        }
    }
}
