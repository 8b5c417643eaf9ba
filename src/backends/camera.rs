// SPDX-License-Identifier: GPL-3.0-only

//! Still camera providers
//!
//! The booth treats the camera as a black box that returns one encoded image
//! per call. [`CommandCamera`] drives a capture tool (rpicam-still, gphoto2,
//! ...) that writes a JPEG to stdout; [`TestPatternCamera`] stands in when no
//! camera is attached.

use super::process::{RunError, run_with_timeout};
use crate::config::CameraConfig;
use crate::errors::CaptureError;
use crate::pipelines::strip::encoding;
use image::{Rgb, RgbImage};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Camera capability
pub trait Camera: Send {
    /// Capture one still and return its encoded bytes
    ///
    /// Must not take longer than `timeout`; no retries.
    fn capture(&mut self, timeout: Duration) -> Result<Vec<u8>, CaptureError>;

    /// Name for logs
    fn name(&self) -> &str;
}

/// Camera driven by an external capture command
#[derive(Debug, Clone)]
pub struct CommandCamera {
    program: String,
    args: Vec<String>,
}

impl CommandCamera {
    /// `command[0]` is the program, the rest its arguments
    pub fn new(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl Camera for CommandCamera {
    fn capture(&mut self, timeout: Duration) -> Result<Vec<u8>, CaptureError> {
        let output = match run_with_timeout(&self.program, &self.args, timeout) {
            Ok(output) => output,
            Err(RunError::Timeout(t)) => return Err(CaptureError::Timeout(t)),
            Err(RunError::NotFound(e)) | Err(RunError::Io(e)) => {
                return Err(CaptureError::Spawn(e));
            }
        };

        if !output.success() {
            return Err(CaptureError::CommandFailed {
                status: output.status.to_string(),
                stderr: output.stderr,
            });
        }
        if output.stdout.is_empty() {
            return Err(CaptureError::EmptyImage);
        }

        debug!(
            program = %self.program,
            size = output.stdout.len(),
            "Camera command returned image"
        );
        Ok(output.stdout)
    }

    fn name(&self) -> &str {
        &self.program
    }
}

/// Solid-colour JPEG generator for running without a camera
#[derive(Debug, Clone)]
pub struct TestPatternCamera {
    width: u32,
    height: u32,
    rgb: [u8; 3],
}

impl TestPatternCamera {
    pub fn new(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self { width, height, rgb }
    }
}

impl Camera for TestPatternCamera {
    fn capture(&mut self, _timeout: Duration) -> Result<Vec<u8>, CaptureError> {
        let image = RgbImage::from_pixel(self.width, self.height, Rgb(self.rgb));
        encoding::encode_rgb_jpeg(&image, 95)
            .map_err(|e| CaptureError::Device(format!("test pattern encoding failed: {}", e)))
    }

    fn name(&self) -> &str {
        "test-pattern"
    }
}

/// Build the configured camera
pub fn camera_from_config(config: &CameraConfig) -> Box<dyn Camera> {
    if !config.simulate {
        if let Some(camera) = CommandCamera::new(&config.command) {
            info!(program = %camera.program, "Using command camera");
            return Box::new(camera);
        }
        warn!("No camera command configured, using test pattern");
    } else {
        warn!("Camera simulation enabled, using test pattern");
    }

    Box::new(TestPatternCamera::new(
        config.test_pattern_width,
        config.test_pattern_height,
        config.test_pattern_rgb,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(parts: &[&str]) -> CommandCamera {
        let parts: Vec<String> = parts.iter().map(|s| s.to_string()).collect();
        CommandCamera::new(&parts).unwrap()
    }

    #[test]
    fn test_empty_command_is_rejected() {
        assert!(CommandCamera::new(&[]).is_none());
    }

    #[test]
    fn test_command_stdout_is_image() {
        let mut camera = command(&["sh", "-c", "printf JPEGDATA"]);
        let bytes = camera.capture(Duration::from_secs(5)).unwrap();
        assert_eq!(bytes, b"JPEGDATA");
    }

    #[test]
    fn test_failed_command() {
        let mut camera = command(&["sh", "-c", "echo 'no camera' >&2; exit 1"]);
        let err = camera.capture(Duration::from_secs(5)).unwrap_err();
        match err {
            CaptureError::CommandFailed { stderr, .. } => assert_eq!(stderr, "no camera"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_output() {
        let mut camera = command(&["true"]);
        assert!(matches!(
            camera.capture(Duration::from_secs(5)),
            Err(CaptureError::EmptyImage)
        ));
    }

    #[test]
    fn test_capture_timeout() {
        let mut camera = command(&["sleep", "10"]);
        assert!(matches!(
            camera.capture(Duration::from_millis(100)),
            Err(CaptureError::Timeout(_))
        ));
    }

    #[test]
    fn test_pattern_decodes() {
        let mut camera = TestPatternCamera::new(64, 48, [0, 0, 255]);
        let bytes = camera.capture(Duration::from_secs(1)).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn test_simulated_config() {
        let config = CameraConfig {
            simulate: true,
            ..CameraConfig::default()
        };
        assert_eq!(camera_from_config(&config).name(), "test-pattern");
    }
}
