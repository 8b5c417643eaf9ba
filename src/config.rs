// SPDX-License-Identifier: GPL-3.0-only

//! Booth configuration
//!
//! Loaded once from TOML at startup and handed to each component at
//! construction. Every field has a default, so an empty file (or no file at
//! all) yields a working booth.

use crate::constants;
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level booth configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BoothConfig {
    pub link: LinkConfig,
    pub session: SessionConfig,
    pub camera: CameraConfig,
    pub tone: ToneConfig,
    pub strip: StripConfig,
    pub printer: PrinterConfig,
    pub storage: StorageConfig,
    pub dashboard: DashboardConfig,
}

impl BoothConfig {
    /// Load and validate configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: BoothConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Validation(msg));

        if self.session.photo_count == 0 {
            return invalid("session.photo_count must be at least 1".into());
        }
        if self.session.poll_interval_ms == 0 {
            return invalid("session.poll_interval_ms must be positive".into());
        }
        if self.link.baud_rate == 0 {
            return invalid("link.baud_rate must be positive".into());
        }

        if !self.camera.simulate && self.camera.command.is_empty() {
            return invalid("camera.command is empty and camera.simulate is off".into());
        }

        if self.tone.contrast < 0.0 || self.tone.brightness < 0.0 {
            return invalid("tone.contrast and tone.brightness must not be negative".into());
        }
        if self.tone.shadow_lift < 1.0 {
            return invalid(format!(
                "tone.shadow_lift must be >= 1.0, got {}",
                self.tone.shadow_lift
            ));
        }

        let strip = &self.strip;
        if strip.width == 0 || strip.height == 0 || strip.photo_width == 0 || strip.photo_height == 0
        {
            return invalid("strip dimensions must be positive".into());
        }
        let framed_width = strip
            .border_width
            .checked_mul(2)
            .and_then(|borders| borders.checked_add(strip.photo_width));
        match framed_width {
            Some(framed) if framed <= strip.width => {}
            _ => {
                return invalid(format!(
                    "photo width {} with {}px borders exceeds strip width {}",
                    strip.photo_width, strip.border_width, strip.width
                ));
            }
        }
        if strip.border_width.checked_mul(2).is_none_or(|borders| strip.padding < borders) {
            return invalid(format!(
                "strip.padding {} is narrower than two borders of {}",
                strip.padding, strip.border_width
            ));
        }
        let needed = constants::required_strip_height(
            self.session.photo_count,
            strip.top_margin,
            strip.photo_height,
            strip.padding,
            strip.border_width,
        );
        match needed {
            Some(needed) if needed <= strip.height => {}
            Some(needed) => {
                return invalid(format!(
                    "{} frames need a strip height of {}, configured {}",
                    self.session.photo_count, needed, strip.height
                ));
            }
            None => {
                return invalid(format!(
                    "{} frames of {}px do not fit any strip height",
                    self.session.photo_count, strip.photo_height
                ));
            }
        }
        if !(1..=100).contains(&strip.jpeg_quality) {
            return invalid("strip.jpeg_quality must be within 1..=100".into());
        }

        if self.dashboard.enabled && self.dashboard.server_url.trim().is_empty() {
            return invalid("dashboard.server_url is required when the dashboard is enabled".into());
        }

        Ok(())
    }
}

/// Serial link to the controller board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// TTY device path
    pub device: String,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
}

impl LinkConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            device: constants::link::DEVICE.to_string(),
            baud_rate: constants::link::BAUD_RATE,
            read_timeout_ms: constants::link::READ_TIMEOUT_MS,
        }
    }
}

/// Session sequencing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Photos per session (fixed)
    pub photo_count: u32,
    pub poll_interval_ms: u64,
    pub capture_timeout_ms: u64,
}

impl SessionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            photo_count: constants::PHOTO_COUNT,
            poll_interval_ms: constants::timing::POLL_INTERVAL.as_millis() as u64,
            capture_timeout_ms: constants::timing::CAPTURE_TIMEOUT.as_millis() as u64,
        }
    }
}

/// Still camera
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Use a generated test pattern instead of a real camera
    pub simulate: bool,
    /// Capture command; must write a JPEG to stdout
    pub command: Vec<String>,
    pub test_pattern_width: u32,
    pub test_pattern_height: u32,
    pub test_pattern_rgb: [u8; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            simulate: false,
            command: ["rpicam-still", "--nopreview", "--immediate", "-o", "-"]
                .into_iter()
                .map(String::from)
                .collect(),
            test_pattern_width: 1920,
            test_pattern_height: 1080,
            test_pattern_rgb: [0, 0, 255],
        }
    }
}

/// Black & white tone adjustment parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneConfig {
    pub contrast: f32,
    pub brightness: f32,
    pub shadow_lift_enabled: bool,
    /// Multiplier for pixels below `midpoint`; must be >= 1.0
    pub shadow_lift: f32,
    pub midpoint: u8,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            contrast: constants::tone::CONTRAST,
            brightness: constants::tone::BRIGHTNESS,
            shadow_lift_enabled: true,
            shadow_lift: constants::tone::SHADOW_LIFT,
            midpoint: constants::tone::MIDPOINT,
        }
    }
}

/// Strip canvas geometry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StripConfig {
    pub width: u32,
    pub height: u32,
    /// Bounding box each processed photo is downscaled into
    pub photo_width: u32,
    pub photo_height: u32,
    pub padding: u32,
    pub top_margin: u32,
    /// 0 disables the frame border
    pub border_width: u32,
    pub border_luma: u8,
    pub background_luma: u8,
    pub jpeg_quality: u8,
}

impl Default for StripConfig {
    fn default() -> Self {
        use constants::strip;
        Self {
            width: strip::WIDTH,
            height: strip::HEIGHT,
            photo_width: strip::PHOTO_WIDTH,
            photo_height: strip::PHOTO_HEIGHT,
            padding: strip::PADDING,
            top_margin: strip::TOP_MARGIN,
            border_width: strip::BORDER_WIDTH,
            border_luma: strip::BORDER_LUMA,
            background_luma: strip::BACKGROUND_LUMA,
            jpeg_quality: strip::JPEG_QUALITY,
        }
    }
}

/// Printer submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterConfig {
    /// CUPS queue; the first queue reported by lpstat when unset
    pub queue: Option<String>,
    pub media: String,
    pub color_model: String,
    pub job_prefix: String,
    pub timeout_ms: u64,
    pub lp_command: String,
    pub lpstat_command: String,
    pub lpr_command: String,
}

impl PrinterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            queue: None,
            media: constants::printer::MEDIA.to_string(),
            color_model: constants::printer::COLOR_MODEL.to_string(),
            job_prefix: constants::printer::JOB_PREFIX.to_string(),
            timeout_ms: constants::timing::PRINT_TIMEOUT.as_millis() as u64,
            lp_command: "lp".to_string(),
            lpstat_command: "lpstat".to_string(),
            lpr_command: "lpr".to_string(),
        }
    }
}

/// File storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory; `~/Pictures/photobooth` when unset
    pub base_dir: Option<PathBuf>,
    pub photos_to_keep: usize,
}

impl StorageConfig {
    pub fn resolved_base_dir(&self) -> PathBuf {
        self.base_dir.clone().unwrap_or_else(|| {
            dirs::picture_dir()
                .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
                .join(constants::storage::FOLDER)
        })
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            photos_to_keep: constants::storage::PHOTOS_TO_KEEP,
        }
    }
}

/// Booth dashboard reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub server_url: String,
    pub booth_id: String,
    pub region: String,
    pub address: String,
    pub health_interval_secs: u64,
}

impl DashboardConfig {
    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs)
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        use constants::dashboard;
        Self {
            enabled: false,
            server_url: dashboard::SERVER_URL.to_string(),
            booth_id: dashboard::BOOTH_ID.to_string(),
            region: dashboard::REGION.to_string(),
            address: dashboard::ADDRESS.to_string(),
            health_interval_secs: constants::timing::HEALTH_INTERVAL.as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        BoothConfig::default().validate().unwrap();
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = BoothConfig::from_toml("").unwrap();
        assert_eq!(config, BoothConfig::default());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = BoothConfig::from_toml(
            r#"
            [session]
            photo_count = 3

            [link]
            device = "/dev/ttyUSB0"
            "#,
        )
        .unwrap();
        assert_eq!(config.session.photo_count, 3);
        assert_eq!(config.session.poll_interval_ms, 500);
        assert_eq!(config.link.device, "/dev/ttyUSB0");
        assert_eq!(config.link.baud_rate, 9600);
    }

    #[test]
    fn test_rejects_weak_shadow_lift() {
        let err = BoothConfig::from_toml("[tone]\nshadow_lift = 0.9\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_rejects_overflowing_layout() {
        // Four 280px frames need 1220 rows
        let err = BoothConfig::from_toml("[strip]\nheight = 800\n").unwrap_err();
        assert!(err.to_string().contains("strip height"));
    }

    #[test]
    fn test_rejects_huge_geometry_without_overflow() {
        let err = BoothConfig::from_toml("[strip]\nphoto_height = 4294967000\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));

        let err = BoothConfig::from_toml(
            "[strip]\nborder_width = 4294967000\npadding = 4294967295\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));

        let err = BoothConfig::from_toml("[session]\nphoto_count = 4294967295\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_rejects_zero_photo_count() {
        let err = BoothConfig::from_toml("[session]\nphoto_count = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_empty_camera_command_needs_simulation() {
        assert!(BoothConfig::from_toml("[camera]\ncommand = []\n").is_err());
        assert!(BoothConfig::from_toml("[camera]\ncommand = []\nsimulate = true\n").is_ok());
    }
}
