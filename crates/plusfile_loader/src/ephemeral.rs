//! Ownership of the temporary module file written for one load.

use std::fs;
use std::path::{Path, PathBuf};

use plusfile_core::AbsolutePosixPath;

use crate::error::{LoaderError, Result};

/// A generated module file that only lives for the duration of one load.
///
/// [`EphemeralArtifact::release`] deletes the file and reports failures.
/// If the artifact is dropped without being released (a panic while loading,
/// or the loading future being dropped), the file is deleted on drop.
#[derive(Debug)]
pub struct EphemeralArtifact {
    path: PathBuf,
    released: bool,
}

impl EphemeralArtifact {
    /// Write `code` to `path` and take ownership of the file.
    pub fn create(path: &AbsolutePosixPath, code: &str) -> Result<Self> {
        let path = PathBuf::from(path.as_str());

        if let Err(source) = fs::write(&path, code) {
            // A failed write may still have created the file.
            let _ = fs::remove_file(&path);
            return Err(LoaderError::Io {
                action: "write",
                path: path.display().to_string(),
                source,
            });
        }
        tracing::debug!(artifact = %path.display(), "Wrote ephemeral artifact");

        Ok(Self {
            path,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        fs::remove_file(&self.path).map_err(|source| LoaderError::Io {
            action: "remove",
            path: self.path.display().to_string(),
            source,
        })?;
        tracing::debug!(artifact = %self.path.display(), "Removed ephemeral artifact");
        Ok(())
    }
}

impl Drop for EphemeralArtifact {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        tracing::warn!(artifact = %self.path.display(), "Ephemeral artifact was not released, removing it on drop");
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::error!(artifact = %self.path.display(), error = %e, "Failed to remove ephemeral artifact");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact_in(dir: &tempfile::TempDir, name: &str) -> AbsolutePosixPath {
        AbsolutePosixPath::new(dir.path().join(name).to_string_lossy().replace('\\', "/")).unwrap()
    }

    #[test]
    fn test_create_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact_in(&dir, "[build:abc]+config.ts.mjs");

        let artifact = EphemeralArtifact::create(&path, "export default 1;").unwrap();
        assert_eq!(std::fs::read_to_string(artifact.path()).unwrap(), "export default 1;");

        let on_disk = artifact.path().to_path_buf();
        artifact.release().unwrap();
        assert!(!on_disk.exists());
    }

    #[test]
    fn test_drop_removes_unreleased_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact_in(&dir, "[build:def]+config.ts.mjs");

        let artifact = EphemeralArtifact::create(&path, "").unwrap();
        let on_disk = artifact.path().to_path_buf();
        drop(artifact);
        assert!(!on_disk.exists());
    }

    #[test]
    fn test_drop_during_panic_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact_in(&dir, "[build:ghi]+config.ts.mjs");
        let on_disk = PathBuf::from(path.as_str());

        let result = std::panic::catch_unwind(|| {
            let _artifact = EphemeralArtifact::create(&path, "").unwrap();
            panic!("load blew up");
        });
        assert!(result.is_err());
        assert!(!on_disk.exists());
    }

    #[test]
    fn test_release_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact_in(&dir, "[build:jkl]+config.ts.mjs");

        let artifact = EphemeralArtifact::create(&path, "").unwrap();
        std::fs::remove_file(artifact.path()).unwrap();
        assert!(matches!(
            artifact.release(),
            Err(LoaderError::Io { action: "remove", .. })
        ));
    }

    #[test]
    fn test_write_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact_in(&dir, "missing-dir/[build:mno]+config.ts.mjs");
        assert!(matches!(
            EphemeralArtifact::create(&path, ""),
            Err(LoaderError::Io { action: "write", .. })
        ));
    }
}
