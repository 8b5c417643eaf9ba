// SPDX-License-Identifier: GPL-3.0-only

//! Booth-wide default values
//!
//! Everything here is only a default; the running booth reads its parameters
//! from [`crate::config::BoothConfig`].

use std::time::Duration;

/// Photos per session
pub const PHOTO_COUNT: u32 = 4;

/// Serial link defaults (Bluetooth SPP bridge to the controller board)
pub mod link {
    /// RFCOMM device bound to the controller board
    pub const DEVICE: &str = "/dev/rfcomm0";

    pub const BAUD_RATE: u32 = 9600;

    /// Read timeout of the link; bounds how long shutdown waits for the read loop
    pub const READ_TIMEOUT_MS: u64 = 100;
}

/// Timing defaults
pub mod timing {
    use super::Duration;

    /// Controller loop poll interval
    pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

    /// Upper bound for one camera capture
    pub const CAPTURE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Upper bound for one printer submission
    pub const PRINT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Interval between dashboard health reports
    pub const HEALTH_INTERVAL: Duration = Duration::from_secs(300);
}

/// Tone curve defaults for B&W output
pub mod tone {
    /// Contrast multiplier (1.0 = no change)
    pub const CONTRAST: f32 = 1.4;

    /// Brightness multiplier for flash-lit photos (1.0 = no change)
    pub const BRIGHTNESS: f32 = 1.3;

    /// Shadow lift multiplier applied below [`MIDPOINT`]
    pub const SHADOW_LIFT: f32 = 1.15;

    pub const MIDPOINT: u8 = 128;
}

/// Strip geometry defaults (pixels)
pub mod strip {
    pub const WIDTH: u32 = 600;

    /// Fits four 280px frames with 20px padding and margins
    pub const HEIGHT: u32 = 1220;

    pub const PHOTO_WIDTH: u32 = 280;
    pub const PHOTO_HEIGHT: u32 = 280;
    pub const PADDING: u32 = 20;
    pub const TOP_MARGIN: u32 = 20;
    pub const BORDER_WIDTH: u32 = 2;

    /// Border luma (0 = black)
    pub const BORDER_LUMA: u8 = 0;

    /// Canvas background luma
    pub const BACKGROUND_LUMA: u8 = 255;

    pub const JPEG_QUALITY: u8 = 95;
}

/// Printer defaults for 4x6 photo stock
pub mod printer {
    pub const MEDIA: &str = "4x6";
    pub const COLOR_MODEL: &str = "Gray";
    pub const JOB_PREFIX: &str = "PhotoBooth";
}

/// Storage defaults
pub mod storage {
    /// Folder under the user's pictures directory
    pub const FOLDER: &str = "photobooth";

    /// Captured/processed photos kept before the oldest are removed
    pub const PHOTOS_TO_KEEP: usize = 100;
}

/// Dashboard defaults
pub mod dashboard {
    pub const SERVER_URL: &str = "http://localhost:5000";
    pub const BOOTH_ID: &str = "booth-001";
    pub const REGION: &str = "default";
    pub const ADDRESS: &str = "unknown";
    pub const DEVICE_TYPE: &str = "raspberry-pi";

    /// Attempts per report, including the first
    pub const MAX_ATTEMPTS: u32 = 3;

    /// How long shutdown waits for queued reports before abandoning them
    pub const FLUSH_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(3);
}

/// Lowest canvas row reached by `count` framed photos stacked from `top_margin`
///
/// Each frame occupies `photo_height + 2 * border` rows; frames start every
/// `photo_height + padding` rows. `None` if the layout does not fit in `u32`.
pub fn required_strip_height(
    count: u32,
    top_margin: u32,
    photo_height: u32,
    padding: u32,
    border: u32,
) -> Option<u32> {
    if count == 0 {
        return Some(top_margin);
    }
    let stride = photo_height.checked_add(padding)?;
    let framed = border.checked_mul(2)?.checked_add(photo_height)?;
    (count - 1)
        .checked_mul(stride)?
        .checked_add(top_margin)?
        .checked_add(framed)
}
