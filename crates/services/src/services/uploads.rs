//! Local storage for uploaded student photos.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;
use utils::text::sanitize_filename;
use uuid::Uuid;

/// Public URL prefix under which the upload directory is served.
pub const UPLOADS_URL_PREFIX: &str = "/uploads";
pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file provided")]
    Missing,
    #[error("Only images are allowed")]
    NotAnImage,
    #[error("File is larger than {} MB", MAX_PHOTO_BYTES / (1024 * 1024))]
    TooLarge,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A file received from a multipart form.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl PhotoUpload {
    /// The declared content type, or one guessed from the file name.
    fn mime(&self) -> String {
        match self.content_type.as_deref().map(str::trim) {
            Some(declared) if !declared.is_empty() && declared != "application/octet-stream" => {
                declared.to_ascii_lowercase()
            }
            _ => mime_guess::from_path(&self.file_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        }
    }

    /// Client file name without its extension, safe to use on disk.
    fn stem(&self) -> String {
        let stem = Path::new(&self.file_name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        sanitize_filename(&stem)
    }
}

/// Raster formats accepted as photos. The stored extension comes from the
/// detected format, never from the client, so the file is always served with
/// an image content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl PhotoFormat {
    /// Detects the format from the file signature.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else {
            None
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Webp => "webp",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PhotoStore {
    root: PathBuf,
}

impl PhotoStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes the photo to `<root>/students/<id>-<name>.<ext>` and returns its URL.
    pub async fn save_student_photo(
        &self,
        student_id: Uuid,
        upload: PhotoUpload,
    ) -> Result<String, UploadError> {
        if upload.bytes.is_empty() {
            return Err(UploadError::Missing);
        }
        if upload.bytes.len() > MAX_PHOTO_BYTES {
            return Err(UploadError::TooLarge);
        }
        let declared = upload.mime();
        if !declared.starts_with("image/") || declared.starts_with("image/svg") {
            return Err(UploadError::NotAnImage);
        }
        let format = PhotoFormat::sniff(&upload.bytes).ok_or(UploadError::NotAnImage)?;

        let file_name = format!("{}-{}.{}", student_id, upload.stem(), format.extension());
        let dir = self.root.join("students");
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&file_name), &upload.bytes).await?;

        info!(student_id = %student_id, file = %file_name, bytes = upload.bytes.len(), "Stored student photo");
        Ok(format!("{UPLOADS_URL_PREFIX}/students/{file_name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

    fn upload(name: &str, content_type: Option<&str>, bytes: &[u8]) -> PhotoUpload {
        PhotoUpload {
            file_name: name.to_string(),
            content_type: content_type.map(str::to_string),
            bytes: bytes.to_vec(),
        }
    }

    #[tokio::test]
    async fn rejects_non_images() {
        let dir = tempfile::tempdir().unwrap();
        let store = PhotoStore::new(dir.path());
        let err = store
            .save_student_photo(Uuid::new_v4(), upload("notes.txt", Some("text/plain"), PNG))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::NotAnImage));
    }

    #[tokio::test]
    async fn guesses_type_from_name_when_undeclared() {
        let dir = tempfile::tempdir().unwrap();
        let store = PhotoStore::new(dir.path());
        let id = Uuid::new_v4();
        let url = store
            .save_student_photo(id, upload("../rosto.JPG", None, JPEG))
            .await
            .unwrap();
        assert_eq!(url, format!("/uploads/students/{id}-rosto.jpg"));
        assert!(dir.path().join("students").join(format!("{id}-rosto.jpg")).exists());
    }

    #[tokio::test]
    async fn declared_image_must_match_its_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = PhotoStore::new(dir.path());
        let html = upload("evil.html", Some("image/png"), b"<script>alert(1)</script>");
        assert!(matches!(
            store.save_student_photo(Uuid::new_v4(), html).await,
            Err(UploadError::NotAnImage)
        ));

        let svg = upload("logo.svg", Some("image/svg+xml"), b"<svg onload=\"x()\"/>");
        assert!(matches!(
            store.save_student_photo(Uuid::new_v4(), svg).await,
            Err(UploadError::NotAnImage)
        ));
        assert!(!dir.path().join("students").exists());
    }

    #[tokio::test]
    async fn stored_extension_follows_the_detected_format() {
        let dir = tempfile::tempdir().unwrap();
        let store = PhotoStore::new(dir.path());
        let id = Uuid::new_v4();
        let url = store
            .save_student_photo(id, upload("evil.html", Some("image/png"), PNG))
            .await
            .unwrap();
        assert_eq!(url, format!("/uploads/students/{id}-evil.png"));
    }

    #[test]
    fn sniffs_supported_signatures() {
        assert_eq!(PhotoFormat::sniff(PNG), Some(PhotoFormat::Png));
        assert_eq!(PhotoFormat::sniff(JPEG), Some(PhotoFormat::Jpeg));
        assert_eq!(PhotoFormat::sniff(b"GIF89a...."), Some(PhotoFormat::Gif));
        assert_eq!(
            PhotoFormat::sniff(b"RIFF\x10\0\0\0WEBPVP8 "),
            Some(PhotoFormat::Webp)
        );
        assert_eq!(PhotoFormat::sniff(b"<svg/>"), None);
    }

    #[tokio::test]
    async fn rejects_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = PhotoStore::new(dir.path());
        let empty = upload("a.png", Some("image/png"), &[]);
        assert!(matches!(
            store.save_student_photo(Uuid::new_v4(), empty).await,
            Err(UploadError::Missing)
        ));
    }
}
