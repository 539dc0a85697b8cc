//! Process-local scratch directory for encoded temp files.
//!
//! Created on demand under the system temp dir with a recognizable
//! `slim-xlsx-` prefix so cleanup tooling can find and remove stray
//! directories left by crashed runs. File names are random hex: multiple
//! shapes within one pass write temp files without guaranteed cleanup
//! ordering on failure paths, so names must be collision-proof.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

/// Directory prefix, kept stable for external cleanup tooling.
const SCRATCH_PREFIX: &str = "slim-xlsx-";

/// An owned scratch directory, removed wholesale when the owning batch
/// operation finishes.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Create a fresh scratch directory under the system temp dir.
    pub fn create() -> io::Result<Self> {
        let path = std::env::temp_dir().join(format!("{SCRATCH_PREFIX}{:08x}", rand::random::<u32>()));
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A unique file path inside the directory with the given extension.
    pub fn unique_path(&self, extension: &str) -> PathBuf {
        self.path
            .join(format!("{:032x}.{extension}", rand::random::<u128>()))
    }

    /// Remove the directory and everything in it, including temp files
    /// leaked by failure paths.
    pub fn cleanup(self) -> io::Result<()> {
        let path = self.path.clone();
        std::mem::forget(self);
        fs::remove_dir_all(path)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            warn!(path = %self.path.display(), %e, "scratch directory not removed");
        }
    }
}
