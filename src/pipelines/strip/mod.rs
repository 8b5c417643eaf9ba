// SPDX-License-Identifier: MPL-2.0

//! Photo strip pipeline
//!
//! ```text
//! Camera → Capture → photos/        (one call per CAPTURE_N)
//!
//! photos/ → verify {1..N} → Tone → processing/ → Compose → output/
//! ```
//!
//! A strip is only produced when the captured set is exactly `{1..N}`. Any
//! failing photo fails the whole run; partial strips are never written.

pub mod capture;
pub mod compose;
pub mod encoding;
pub mod processing;

pub use capture::capture_photo;
pub use compose::{FramePlacement, StripComposer};
pub use processing::{ImageFilter, ToneFilter};

use crate::booth::session::{CapturedPhoto, PhotoStrip, ProcessedPhoto};
use crate::config::BoothConfig;
use crate::errors::{BoothResult, ComposeError, ProcessError};
use crate::storage::BoothDirs;
use image::ImageError;
use tracing::{debug, info};
use uuid::Uuid;

/// Check that `sequences` is exactly `{1..expected}`
///
/// Gaps, duplicates and indexes beyond `expected` are all rejected.
pub fn verify_complete(sequences: &[u32], expected: u32) -> Result<(), ComposeError> {
    let mut sorted = sequences.to_vec();
    sorted.sort_unstable();
    if sorted.iter().copied().eq(1..=expected) {
        Ok(())
    } else {
        Err(ComposeError::IncompleteSet {
            expected,
            got: sorted,
        })
    }
}

/// Process → compose sequencing over booth storage
pub struct StripPipeline {
    filter: Box<dyn ImageFilter>,
    composer: StripComposer,
    dirs: BoothDirs,
}

impl StripPipeline {
    pub fn new(filter: Box<dyn ImageFilter>, composer: StripComposer, dirs: BoothDirs) -> Self {
        Self {
            filter,
            composer,
            dirs,
        }
    }

    pub fn from_config(config: &BoothConfig, dirs: BoothDirs) -> Self {
        Self::new(
            Box::new(ToneFilter::new(config.tone.clone(), &config.strip)),
            StripComposer::new(config.strip.clone()),
            dirs,
        )
    }

    pub fn dirs(&self) -> &BoothDirs {
        &self.dirs
    }

    /// Tone-process one capture into `processing/`
    pub fn process(&self, photo: &CapturedPhoto) -> Result<ProcessedPhoto, ProcessError> {
        let source = &photo.storage_location;
        let data = std::fs::read(source).map_err(|e| ProcessError::Read {
            path: source.clone(),
            source: e,
        })?;
        let decoded = image::load_from_memory(&data).map_err(ProcessError::Decode)?;
        let gray = self.filter.transform(&decoded)?;

        let target = self.dirs.processed_path(photo.sequence_number, source);
        let quality = self.composer.config().jpeg_quality;
        encoding::save_luma_jpeg(&gray, &target, quality).map_err(|e| match e {
            ImageError::IoError(source) => ProcessError::Write {
                path: target.clone(),
                source,
            },
            other => ProcessError::Encode(other),
        })?;

        debug!(
            sequence = photo.sequence_number,
            path = %target.display(),
            "Photo processed"
        );

        Ok(ProcessedPhoto {
            sequence_number: photo.sequence_number,
            storage_location: target,
        })
    }

    /// Process every capture in ascending sequence order; first failure wins
    pub fn process_all<'a, I>(&self, photos: I) -> Result<Vec<ProcessedPhoto>, ProcessError>
    where
        I: IntoIterator<Item = &'a CapturedPhoto>,
    {
        let mut processed: Vec<ProcessedPhoto> = photos
            .into_iter()
            .map(|photo| {
                self.process(photo)
                    .map_err(|e| ProcessError::Photo(photo.sequence_number, Box::new(e)))
            })
            .collect::<Result<_, _>>()?;
        processed.sort_by_key(|p| p.sequence_number);
        Ok(processed)
    }

    /// Compose processed photos into `output/` as one strip
    pub fn compose(
        &self,
        session_id: Uuid,
        processed: &[ProcessedPhoto],
        expected: u32,
    ) -> Result<PhotoStrip, ComposeError> {
        let sequences: Vec<u32> = processed.iter().map(|p| p.sequence_number).collect();
        verify_complete(&sequences, expected)?;

        let mut ordered: Vec<&ProcessedPhoto> = processed.iter().collect();
        ordered.sort_by_key(|p| p.sequence_number);

        let mut images = Vec::with_capacity(ordered.len());
        for photo in ordered {
            let image = image::open(&photo.storage_location).map_err(|source| ComposeError::Open {
                sequence: photo.sequence_number,
                path: photo.storage_location.clone(),
                source,
            })?;
            images.push((photo.sequence_number, image.to_luma8()));
        }

        let (canvas, placements) = self.composer.compose(&images)?;

        let path = self.dirs.strip_path(session_id);
        encoding::save_luma_jpeg(&canvas, &path, self.composer.config().jpeg_quality).map_err(
            |source| ComposeError::Save {
                path: path.clone(),
                source,
            },
        )?;

        info!(path = %path.display(), frames = placements.len(), "Photo strip created");

        Ok(PhotoStrip {
            session_id,
            storage_location: path,
            frames: placements.iter().map(|p| p.sequence).collect(),
            created_at: chrono::Local::now(),
        })
    }

    /// Verify, process and compose a full capture set
    pub fn run<'a, I>(&self, session_id: Uuid, photos: I, expected: u32) -> BoothResult<PhotoStrip>
    where
        I: IntoIterator<Item = &'a CapturedPhoto>,
    {
        let photos: Vec<&CapturedPhoto> = photos.into_iter().collect();
        let sequences: Vec<u32> = photos.iter().map(|p| p.sequence_number).collect();
        verify_complete(&sequences, expected)?;

        let processed = self.process_all(photos)?;
        Ok(self.compose(session_id, &processed, expected)?)
    }
}
