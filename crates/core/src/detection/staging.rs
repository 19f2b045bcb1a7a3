//! Per-invocation staging of input images.
//!
//! Each run writes its image to `{staging_dir}/{invocation_id}.{ext}` so
//! concurrent runs never share a file. The [`StagedImage`] guard removes
//! the file when the run finishes, and from `Drop` if the run's future is
//! dropped before it gets there.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

use super::error::DetectError;

/// Extensions the detector recognises as image files.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp"];

/// Extension used when the upload gives no usable hint.
pub const DEFAULT_EXTENSION: &str = "png";

/// Pick the staged file extension from an upload filename hint.
pub fn staging_extension(hint: Option<&str>) -> &'static str {
    let ext = hint
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    ext.and_then(|ext| IMAGE_EXTENSIONS.iter().copied().find(|known| *known == ext))
        .unwrap_or(DEFAULT_EXTENSION)
}

/// A staged input image, removed when the guard is released.
#[derive(Debug)]
pub struct StagedImage {
    path: PathBuf,
    released: bool,
}

impl StagedImage {
    /// Write `bytes` to a fresh file under `dir`.
    pub async fn write(
        dir: &Path,
        invocation_id: Uuid,
        extension: &str,
        bytes: &[u8],
    ) -> Result<Self, DetectError> {
        let path = dir.join(format!("{invocation_id}.{extension}"));

        if let Err(source) = fs::write(&path, bytes).await {
            let _ = fs::remove_file(&path).await;
            return Err(DetectError::Stage { path, source });
        }

        Ok(Self {
            path,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the staged file. Failures are logged, never returned, so they
    /// cannot mask the run's own result.
    pub async fn release(mut self) {
        self.released = true;
        if let Err(e) = fs::remove_file(&self.path).await {
            log_cleanup_failure(&self.path, &e);
        }
    }
}

impl Drop for StagedImage {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            log_cleanup_failure(&self.path, &e);
        }
    }
}

fn log_cleanup_failure(path: &Path, err: &std::io::Error) {
    if err.kind() == ErrorKind::NotFound {
        return;
    }
    tracing::warn!(
        path = %path.display(),
        error = %err,
        "Failed to remove staged detector input"
    );
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn extension_from_hint() {
        assert_eq!(staging_extension(Some("scan.JPG")), "jpg");
        assert_eq!(staging_extension(Some("page.jpeg")), "jpeg");
        assert_eq!(staging_extension(Some("notes.txt")), DEFAULT_EXTENSION);
        assert_eq!(staging_extension(Some("no_extension")), DEFAULT_EXTENSION);
        assert_eq!(staging_extension(None), DEFAULT_EXTENSION);
    }

    #[tokio::test]
    async fn write_then_release_removes_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let staged = StagedImage::write(dir.path(), Uuid::now_v7(), "png", b"\x89PNG")
            .await
            .expect("stage");
        let path = staged.path().to_path_buf();
        assert_eq!(std::fs::read(&path).expect("read"), b"\x89PNG");

        staged.release().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn drop_removes_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let staged = StagedImage::write(dir.path(), Uuid::now_v7(), "jpg", b"data")
            .await
            .expect("stage");
        let path = staged.path().to_path_buf();
        drop(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn release_after_external_delete_is_quiet() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let staged = StagedImage::write(dir.path(), Uuid::now_v7(), "png", b"x")
            .await
            .expect("stage");
        std::fs::remove_file(staged.path()).expect("delete");
        staged.release().await;
    }

    #[tokio::test]
    async fn missing_directory_is_stage_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let missing = dir.path().join("does/not/exist");
        assert_matches!(
            StagedImage::write(&missing, Uuid::now_v7(), "png", b"x").await,
            Err(DetectError::Stage { .. })
        );
    }
}
