//! Run-scoped scratch space.
//!
//! The directory is removed when the [`Scratch`] is dropped, whatever the
//! outcome of the run.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{Error, Result};

const PREFIX: &str = "pages2pdf-";

#[derive(Debug)]
pub struct Scratch {
    dir: TempDir,
}

impl Scratch {
    /// Creates a fresh directory under `parent`, or the system temp dir.
    pub fn create(parent: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(PREFIX);

        let dir = match parent {
            Some(parent) => builder
                .tempdir_in(parent)
                .map_err(|e| Error::io(parent, e))?,
            None => builder
                .tempdir()
                .map_err(|e| Error::io(std::env::temp_dir(), e))?,
        };

        debug!(path = %dir.path().display(), "created scratch directory");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `data` to `name` inside the scratch directory.
    pub async fn stage(&self, name: &str, data: &[u8]) -> Result<PathBuf> {
        let path = self.dir.path().join(name);
        fs::write(&path, data)
            .await
            .map_err(|e| Error::io(&path, e))?;
        Ok(path)
    }

    /// Moves a staged file to `destination`, copying when a rename is not
    /// possible (e.g. across file systems).
    pub async fn persist(&self, staged: &Path, destination: &Path) -> Result<()> {
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io(parent, e))?;
        }

        if let Err(e) = fs::rename(staged, destination).await {
            warn!("Rename into place failed ({}), copying instead", e);
            fs::copy(staged, destination)
                .await
                .map_err(|e| Error::io(destination, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn staged_file_moves_to_destination() {
        let out = tempfile::tempdir().unwrap();
        let scratch = Scratch::create(Some(out.path())).unwrap();

        let staged = scratch.stage("document.pdf", b"%PDF").await.unwrap();
        let destination = out.path().join("nested").join("book.pdf");
        scratch.persist(&staged, &destination).await.unwrap();

        assert_eq!(std::fs::read(&destination).unwrap(), b"%PDF");
        assert!(!staged.exists());
    }

    #[tokio::test]
    async fn directory_is_removed_on_drop() {
        let parent = tempfile::tempdir().unwrap();
        let scratch = Scratch::create(Some(parent.path())).unwrap();
        scratch.stage("0.png", b"png").await.unwrap();
        let path = scratch.path().to_path_buf();
        assert!(path.exists());

        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn missing_parent_is_an_io_error() {
        let parent = tempfile::tempdir().unwrap();
        let missing = parent.path().join("does-not-exist");
        assert!(matches!(
            Scratch::create(Some(&missing)),
            Err(Error::Io { .. })
        ));
    }
}
