//! Uploaded image storage
//!
//! Images live as files in one folder and are served under `/images`.
//! An image reference is just the file name.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use petfinder_common::documents::ImageRef;
use petfinder_common::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// Route prefix under which stored images are served
pub const IMAGES_ROUTE: &str = "/images";

#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
    public_base_url: String,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Decode and store a base64 JPEG, returning its reference.
    ///
    /// Accepts bare base64 or a `data:` URL.
    pub async fn upload_base64(&self, data: &str) -> Result<ImageRef> {
        let payload = match data.trim().strip_prefix("data:") {
            Some(url) => url.split_once(',').map(|(_, b64)| b64).unwrap_or_default(),
            None => data.trim(),
        };

        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| Error::InvalidInput(format!("Image is not valid base64: {}", e)))?;
        if bytes.is_empty() {
            return Err(Error::InvalidInput("Image is empty".to_string()));
        }

        let image = format!("image_{}.jpg", Uuid::new_v4());
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(&image), &bytes).await?;

        info!(image = %image, bytes = bytes.len(), "Stored uploaded image");
        Ok(image)
    }

    /// Public URL of a stored image
    pub async fn publish(&self, image: &str) -> Result<String> {
        if !is_valid_ref(image) {
            return Err(Error::InvalidInput(format!("'{}' is not an image reference", image)));
        }
        if !tokio::fs::try_exists(self.dir.join(image)).await? {
            return Err(Error::NotFound(format!("Image '{}' does not exist", image)));
        }
        Ok(format!("{}{}/{}", self.public_base_url, IMAGES_ROUTE, image))
    }
}

/// File names only: no separators, no leading dot
fn is_valid_ref(image: &str) -> bool {
    !image.is_empty()
        && !image.starts_with('.')
        && image
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_validation() {
        assert!(is_valid_ref("image_1234.jpg"));
        assert!(!is_valid_ref("../etc/passwd"));
        assert!(!is_valid_ref("sub/dir.jpg"));
        assert!(!is_valid_ref(".hidden"));
        assert!(!is_valid_ref(""));
    }

    #[tokio::test]
    async fn test_upload_then_publish() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path().join("images"), "http://pets.test/");

        let image = store.upload_base64(&STANDARD.encode(b"\xff\xd8jpeg")).await.unwrap();
        assert!(image.starts_with("image_") && image.ends_with(".jpg"));
        assert_eq!(std::fs::read(store.dir().join(&image)).unwrap(), b"\xff\xd8jpeg");

        let url = store.publish(&image).await.unwrap();
        assert_eq!(url, format!("http://pets.test/images/{}", image));
    }

    #[tokio::test]
    async fn test_data_url_prefix_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path(), "http://pets.test");
        let data = format!("data:image/jpeg;base64,{}", STANDARD.encode(b"abc"));
        assert!(store.upload_base64(&data).await.is_ok());
    }

    #[tokio::test]
    async fn test_bad_uploads_are_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path(), "http://pets.test");

        assert!(matches!(store.upload_base64("@@not base64@@").await, Err(Error::InvalidInput(_))));
        assert!(matches!(store.upload_base64("").await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_publish_unknown_image() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path(), "http://pets.test");
        assert!(matches!(store.publish("image_missing.jpg").await, Err(Error::NotFound(_))));
    }
}
