//! Local storage for profile photos and institution logos
//!
//! Files live under `UPLOAD_DIR` and are served back at `/storage/...`.

use anyhow::Context;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::error::ApiError;

/// Image formats accepted for uploads, identified by their magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageKind {
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(Self::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else {
            None
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Webp => "webp",
        }
    }
}

/// Upload folders, one per kind of picture
#[derive(Debug, Clone, Copy)]
pub enum Pasta {
    Fotos,
    Logos,
}

impl Pasta {
    fn as_str(&self) -> &'static str {
        match self {
            Pasta::Fotos => "fotos",
            Pasta::Logos => "logos",
        }
    }
}

#[derive(Clone)]
pub struct Storage {
    root: PathBuf,
    public_url: String,
    max_bytes: usize,
}

impl Storage {
    pub fn new(settings: &Settings) -> Self {
        Self {
            root: settings.upload_dir.clone(),
            public_url: settings.public_url.trim_end_matches('/').to_string(),
            max_bytes: settings.max_upload_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Size and type checks, reported on `field` as a 422
    pub fn check_image(&self, field: &str, bytes: &[u8]) -> Result<ImageKind, ApiError> {
        if bytes.is_empty() {
            return Err(ApiError::field(field, "Envie um arquivo de imagem."));
        }
        if bytes.len() > self.max_bytes {
            return Err(ApiError::field(
                field,
                format!(
                    "A imagem deve ter no máximo {} MB.",
                    self.max_bytes / (1024 * 1024)
                ),
            ));
        }
        ImageKind::detect(bytes).ok_or_else(|| {
            ApiError::field(field, "O arquivo deve ser uma imagem PNG, JPEG, GIF ou WEBP.")
        })
    }

    /// Write the image and return its path relative to the storage root
    pub async fn save_image(
        &self,
        pasta: Pasta,
        kind: ImageKind,
        bytes: &[u8],
    ) -> Result<String, ApiError> {
        let relative = format!("{}/{}.{}", pasta.as_str(), Uuid::new_v4(), kind.extension());
        let path = self.root.join(&relative);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        debug!(path = %relative, size = bytes.len(), "Stored upload");
        Ok(relative)
    }

    /// Best effort; a missing file is not an error
    pub async fn delete(&self, relative: &str) {
        let Some(path) = self.resolve(relative) else {
            warn!(path = relative, "Refusing to delete path outside storage root");
            return;
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(path = relative, "Deleted upload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = relative, error = %e, "Failed to delete upload"),
        }
    }

    pub fn public_url(&self, relative: &str) -> String {
        format!("{}/storage/{}", self.public_url, relative.trim_start_matches('/'))
    }

    pub fn public_url_opt(&self, relative: Option<&str>) -> Option<String> {
        relative.map(|r| self.public_url(r))
    }

    fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let candidate = Path::new(relative);
        if candidate
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            Some(self.root.join(candidate))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

    fn storage(dir: &Path) -> Storage {
        let mut settings = Settings::for_tests();
        settings.upload_dir = dir.to_path_buf();
        settings.max_upload_bytes = 1024;
        Storage::new(&settings)
    }

    #[test]
    fn detects_formats_by_magic_bytes() {
        assert_eq!(ImageKind::detect(PNG), Some(ImageKind::Png));
        assert_eq!(ImageKind::detect(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::detect(b"GIF89a...."), Some(ImageKind::Gif));
        assert_eq!(ImageKind::detect(b"RIFF\0\0\0\0WEBPVP8 "), Some(ImageKind::Webp));
        assert_eq!(ImageKind::detect(b"%PDF-1.7"), None);
    }

    #[test]
    fn rejects_large_or_unknown_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());

        assert_eq!(storage.check_image("foto", PNG).unwrap(), ImageKind::Png);
        assert!(matches!(
            storage.check_image("foto", b"plain text"),
            Err(ApiError::Validation(_))
        ));

        let mut big = PNG.to_vec();
        big.resize(2048, 0);
        assert!(matches!(
            storage.check_image("foto", &big),
            Err(ApiError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn save_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());

        let relative = storage
            .save_image(Pasta::Fotos, ImageKind::Png, PNG)
            .await
            .unwrap();
        assert!(relative.starts_with("fotos/") && relative.ends_with(".png"));
        assert!(dir.path().join(&relative).exists());
        assert_eq!(
            storage.public_url(&relative),
            format!("http://localhost:8080/storage/{}", relative)
        );

        storage.delete(&relative).await;
        assert!(!dir.path().join(&relative).exists());
        // second delete is a no-op
        storage.delete(&relative).await;
    }

    #[tokio::test]
    async fn delete_ignores_paths_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("keep.txt");
        std::fs::write(&outside, "x").unwrap();

        let nested = dir.path().join("uploads");
        let storage = storage(&nested);
        storage.delete("../keep.txt").await;
        assert!(outside.exists());
    }
}
