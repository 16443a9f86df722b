use std::path::PathBuf;

use anyhow::Context;
use axum::async_trait;
use bytes::Bytes;

/// Durable home for uploaded recipe images.
///
/// Production writes to the local upload directory that the static file
/// layer serves back out; tests swap in an in-memory store.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Persists `body` under `file_name` inside the image subtree.
    ///
    /// The write is a plain filesystem write: not atomic, and a concurrent
    /// write to the same name races. Callers derive names deterministically
    /// from the recipe id and original file name, so that race is a known
    /// limitation of the scheme rather than something handled here.
    async fn put_image(&self, file_name: &str, body: Bytes) -> anyhow::Result<()>;

    /// The externally addressable path for a stored image, as persisted in
    /// `recipes.image_path` and served by the static file layer.
    fn public_path(&self, file_name: &str) -> String;
}

pub struct LocalImages {
    root: PathBuf,
}

impl LocalImages {
    /// `upload_dir` is the configured upload root; images land in its
    /// `images/` subdirectory and are served under `/uploads/images/`.
    pub fn new(upload_dir: &str) -> Self {
        Self {
            root: PathBuf::from(upload_dir).join("images"),
        }
    }
}

#[async_trait]
impl ImageStore for LocalImages {
    async fn put_image(&self, file_name: &str, body: Bytes) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("create upload dir {}", self.root.display()))?;
        let disk = self.root.join(file_name);
        tokio::fs::write(&disk, body)
            .await
            .with_context(|| format!("write image {}", disk.display()))?;
        Ok(())
    }

    fn public_path(&self, file_name: &str) -> String {
        format!("/uploads/images/{}", file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("recipebook-storage-{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn put_image_creates_directory_and_writes_file() {
        let dir = scratch_dir();
        let store = LocalImages::new(dir.to_str().unwrap());

        store
            .put_image("1_cake.png", Bytes::from_static(b"png-bytes"))
            .await
            .expect("write should succeed");

        let written = tokio::fs::read(dir.join("images").join("1_cake.png"))
            .await
            .expect("file should exist");
        assert_eq!(written, b"png-bytes");

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn put_image_overwrites_existing_file() {
        let dir = scratch_dir();
        let store = LocalImages::new(dir.to_str().unwrap());

        store
            .put_image("2_soup.jpg", Bytes::from_static(b"old"))
            .await
            .unwrap();
        store
            .put_image("2_soup.jpg", Bytes::from_static(b"new"))
            .await
            .unwrap();

        let written = tokio::fs::read(dir.join("images").join("2_soup.jpg"))
            .await
            .unwrap();
        assert_eq!(written, b"new");

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[test]
    fn public_path_is_under_uploads_images() {
        let store = LocalImages::new("uploads");
        assert_eq!(store.public_path("3_pie.webp"), "/uploads/images/3_pie.webp");
    }
}
