//! Scoped scratch directories.
//!
//! A [`ScopedDir`] is an isolated directory that lives exactly as long as the
//! value does. Jobs own one for intermediate and output artifacts, the upload
//! layer owns another for staged request files. Removal happens on explicit
//! [`ScopedDir::release`] or, failing that, on drop, so every exit path
//! (early return, `?`, panic unwinding, an abandoned response stream) reclaims
//! the directory. Cleanup failures are logged and never propagated.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Prefix for per-job working directories.
pub const JOB_PREFIX: &str = "bookforge-job-";

/// Prefix for upload staging directories.
pub const UPLOAD_PREFIX: &str = "bookforge-upload-";

/// An owned temporary directory that is removed when the scope ends.
///
/// # Example
///
/// ```no_run
/// use bf_av::ScopedDir;
///
/// let scope = ScopedDir::acquire(None, bf_av::workspace::JOB_PREFIX)?;
/// let metadata = scope.file("ffmpeg_metadata.txt");
/// std::fs::write(&metadata, ";FFMETADATA1\n")?;
/// scope.release(); // directory and contents are gone
/// # Ok::<(), bf_core::Error>(())
/// ```
#[derive(Debug)]
pub struct ScopedDir {
    temp_dir: Option<TempDir>,
    path: PathBuf,
}

impl ScopedDir {
    /// Create a fresh directory under `root` (or the system temp dir).
    pub fn acquire(root: Option<&Path>, prefix: &str) -> bf_core::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix);
        let temp_dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| {
            // The io error names the host temp path; it stays in the log.
            tracing::error!("Failed to create scratch directory: {e}");
            bf_core::Error::Internal("failed to create scratch directory".into())
        })?;

        let path = temp_dir.path().to_path_buf();
        tracing::debug!("Acquired scratch directory {}", path.display());

        Ok(Self {
            temp_dir: Some(temp_dir),
            path,
        })
    }

    /// Path to the directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path for a named file inside the directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Remove the directory now, logging (and swallowing) any failure.
    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        let Some(temp_dir) = self.temp_dir.take() else {
            return;
        };

        match temp_dir.close() {
            Ok(()) => tracing::debug!("Released scratch directory {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Scratch directory {} already gone", self.path.display());
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to remove scratch directory {}: {e}",
                    self.path.display()
                );
            }
        }
    }
}

impl Drop for ScopedDir {
    fn drop(&mut self) {
        self.remove();
    }
}
