//! Per-subject scratch directory with scoped cleanup.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{LongsegError, Result};

/// Handle to the subject's scratch/template working area
/// (`<derivatives>/sub-<ID>/temp`). Registration and segmentation run in
/// here before the reorganizer moves results into the derivatives tree.
///
/// When created with `remove_on_drop`, the directory is deleted when the
/// handle goes out of scope, including on the subject's error path.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    remove_on_drop: bool,
}

impl ScratchDir {
    /// Create `<derivatives>/sub-<subject>/temp/output`, parents included.
    pub fn create(derivatives: &Path, subject: &str, remove_on_drop: bool) -> Result<Self> {
        let path = derivatives.join(format!("sub-{subject}")).join("temp");
        fs::create_dir_all(path.join("output"))?;
        Ok(Self {
            path,
            remove_on_drop,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The segmentation output area (`<scratch>/output`).
    pub fn output_dir(&self) -> PathBuf {
        self.path.join("output")
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }

    /// Delete the scratch tree now and verify it is gone.
    pub fn remove(mut self) -> Result<()> {
        fs::remove_dir_all(&self.path)?;
        if self.path.exists() {
            return Err(LongsegError::Pipeline(format!(
                "failed to delete scratch directory {}",
                self.path.display()
            )));
        }
        info!(path = %self.path.display(), "removed scratch directory");
        self.remove_on_drop = false;
        Ok(())
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.remove_on_drop {
            let _ = fs::remove_dir_all(&self.path);
        }
    }
}
