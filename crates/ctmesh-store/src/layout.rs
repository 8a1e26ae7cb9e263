//! Where run artifacts live on disk.
//!
//! ```text
//! <root>/segmentations/<session>/<token>_mask.npy
//! <root>/segmentations/<session>/<token>_{axial,sagittal,coronal}.png
//! <root>/models/<session>/<token>_<label>.stl
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ctmesh_core::{validate_session_id, CtmeshError, Plane, Result};

use crate::token::RunToken;

/// File paths for one segmentation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationPaths {
    pub dir: PathBuf,
    pub mask: PathBuf,
    pub axial: PathBuf,
    pub sagittal: PathBuf,
    pub coronal: PathBuf,
}

impl SegmentationPaths {
    #[must_use]
    pub fn thumbnail(&self, plane: Plane) -> &Path {
        match plane {
            Plane::Axial => &self.axial,
            Plane::Sagittal => &self.sagittal,
            Plane::Coronal => &self.coronal,
        }
    }
}

/// Resolves artifact paths below a root directory.
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn segmentation_dir(&self, session_id: &str) -> Result<PathBuf> {
        validate_session_id(session_id)?;
        Ok(self.root.join("segmentations").join(session_id))
    }

    pub fn model_dir(&self, session_id: &str) -> Result<PathBuf> {
        validate_session_id(session_id)?;
        Ok(self.root.join("models").join(session_id))
    }

    /// Paths for a new segmentation run. The directory is created.
    pub fn segmentation_paths(
        &self,
        session_id: &str,
        token: &RunToken,
    ) -> Result<SegmentationPaths> {
        let dir = self.segmentation_dir(session_id)?;
        fs::create_dir_all(&dir)?;
        let file = |suffix: &str| dir.join(format!("{token}_{suffix}"));
        Ok(SegmentationPaths {
            mask: file("mask.npy"),
            axial: file("axial.png"),
            sagittal: file("sagittal.png"),
            coronal: file("coronal.png"),
            dir,
        })
    }

    /// Path for a new mesh file. The directory is created.
    pub fn mesh_path(&self, session_id: &str, token: &RunToken, label: &str) -> Result<PathBuf> {
        let dir = self.model_dir(session_id)?;
        fs::create_dir_all(&dir)?;
        Ok(dir.join(format!("{token}_{label}.stl")))
    }
}

/// Attempts made by [`write_into_dir`] before giving up.
const DIR_WRITE_ATTEMPTS: usize = 3;

/// Runs `write` with `dir` present.
///
/// A concurrent delete in the same session may remove `dir` while it is still
/// empty, so the directory is recreated and the write retried on `NotFound`.
pub fn write_into_dir<T>(dir: &Path, mut write: impl FnMut() -> Result<T>) -> Result<T> {
    let mut attempt = 1;
    loop {
        fs::create_dir_all(dir)?;
        match write() {
            Err(CtmeshError::IoError(e))
                if e.kind() == io::ErrorKind::NotFound && attempt < DIR_WRITE_ATTEMPTS =>
            {
                log::debug!("{} vanished before write, retrying", dir.display());
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Removes `path`, logging instead of failing. A missing file counts as removed.
pub fn remove_file_logged(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => true,
        Err(e) => {
            log::warn!("could not remove {}: {e}", path.display());
            false
        }
    }
}

/// Removes `dir` if it exists and is empty.
pub fn remove_dir_if_empty(dir: &Path) {
    let is_empty = match fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => return,
    };
    if is_empty {
        if let Err(e) = fs::remove_dir(dir) {
            log::warn!("could not remove empty directory {}: {e}", dir.display());
        }
    }
}
