// SPDX-License-Identifier: MPL-2.0

//! Storage layout for captured photos, processed frames and printed strips

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Booth working directories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoothDirs {
    /// Raw captures
    pub photos: PathBuf,
    /// Tone-processed frames
    pub processing: PathBuf,
    /// Composed strips
    pub output: PathBuf,
    /// Copies of printed strips
    pub archive: PathBuf,
}

impl BoothDirs {
    pub fn new(base: &Path) -> Self {
        Self {
            photos: base.join("photos"),
            processing: base.join("processing"),
            output: base.join("output"),
            archive: base.join("archive"),
        }
    }

    /// Create all directories (idempotent)
    pub fn ensure(&self) -> io::Result<()> {
        for dir in [&self.photos, &self.processing, &self.output, &self.archive] {
            std::fs::create_dir_all(dir)?;
        }
        debug!(photos = %self.photos.display(), "Booth directories ready");
        Ok(())
    }

    /// `photos/photo_<timestamp>_<n>.jpg`
    pub fn capture_path(&self, sequence: u32) -> PathBuf {
        self.photos
            .join(format!("photo_{}_{}.jpg", timestamp(), sequence))
    }

    /// `processing/processed_<n>_<source stem>.jpg`
    ///
    /// Processed frames are always JPEG, whatever the source format.
    pub fn processed_path(&self, sequence: u32, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(timestamp);
        self.processing
            .join(format!("processed_{}_{}.jpg", sequence, stem))
    }

    /// `output/photostrip_<timestamp>_<session>.jpg`
    pub fn strip_path(&self, session_id: Uuid) -> PathBuf {
        self.output.join(format!(
            "photostrip_{}_{}.jpg",
            timestamp_millis(),
            session_id.simple()
        ))
    }

    /// Copy a printed strip into the archive
    pub fn archive(&self, strip: &Path) -> io::Result<PathBuf> {
        let name = strip
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "strip path has no file name"))?;
        let target = self.archive.join(name);
        std::fs::copy(strip, &target)?;
        Ok(target)
    }

    /// Apply the retention limit to captures and processed frames
    pub fn prune(&self, keep: usize) {
        for dir in [&self.photos, &self.processing] {
            match prune_directory(dir, keep) {
                Ok(0) => {}
                Ok(removed) => info!(dir = %dir.display(), removed, "Pruned old photos"),
                Err(e) => warn!(dir = %dir.display(), error = %e, "Failed to prune photos"),
            }
        }
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

fn timestamp_millis() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S_%3f").to_string()
}

/// Image files in `dir` (jpg/jpeg/png), newest first
pub fn list_images(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        let Some(ext) = path.extension() else {
            continue;
        };
        let ext = ext.to_string_lossy();
        if ext.eq_ignore_ascii_case("jpg")
            || ext.eq_ignore_ascii_case("jpeg")
            || ext.eq_ignore_ascii_case("png")
        {
            let modified = entry.metadata().and_then(|m| m.modified()).ok();
            files.push((modified, path));
        }
    }

    // Newest first; ties broken by name so timestamped names sort predictably
    files.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
    Ok(files.into_iter().map(|(_, p)| p).collect())
}

/// Remove all but the `keep` newest images in `dir`; returns the number removed
pub fn prune_directory(dir: &Path, keep: usize) -> io::Result<usize> {
    let files = list_images(dir)?;
    let mut removed = 0;
    for path in files.into_iter().skip(keep) {
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove old photo"),
        }
    }
    Ok(removed)
}
