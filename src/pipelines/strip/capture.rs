// SPDX-License-Identifier: MPL-2.0

//! Photo capture into booth storage

use crate::backends::camera::Camera;
use crate::booth::session::CapturedPhoto;
use crate::errors::CaptureError;
use crate::storage::BoothDirs;
use std::time::Duration;
use tracing::{debug, info};

/// Capture photo `sequence` and store it under `dirs.photos`
///
/// Single attempt; no retry on timeout or device error.
pub fn capture_photo(
    camera: &mut dyn Camera,
    dirs: &BoothDirs,
    sequence: u32,
    timeout: Duration,
) -> Result<CapturedPhoto, CaptureError> {
    info!(sequence, camera = camera.name(), "Capturing photo");

    let data = camera.capture(timeout)?;
    if data.is_empty() {
        return Err(CaptureError::EmptyImage);
    }

    let path = dirs.capture_path(sequence);
    std::fs::write(&path, &data).map_err(|source| CaptureError::Save {
        path: path.clone(),
        source,
    })?;

    debug!(sequence, path = %path.display(), size = data.len(), "Photo stored");

    Ok(CapturedPhoto {
        sequence_number: sequence,
        storage_location: path,
        captured_at: chrono::Local::now(),
    })
}
