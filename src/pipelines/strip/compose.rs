// SPDX-License-Identifier: GPL-3.0-only

//! Strip composition
//!
//! Frames are stacked top to bottom on a single-channel canvas. Frame `i`
//! (0-based, ascending sequence number) starts at row
//! `top_margin + i * (photo_height + padding)` and is centred horizontally.
//! With a border, the photo sits `border_width` pixels inside its frame.

use crate::config::StripConfig;
use crate::constants;
use crate::errors::ComposeError;
use image::{GrayImage, Luma, imageops};
use tracing::debug;

/// Where one photo landed on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePlacement {
    pub sequence: u32,
    /// Top-left of the photo itself
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub border: u32,
}

impl FramePlacement {
    /// Bordered rectangle as `(x, y, width, height)`
    pub fn frame_rect(&self) -> (u32, u32, u32, u32) {
        (
            self.x - self.border,
            self.y - self.border,
            self.width + 2 * self.border,
            self.height + 2 * self.border,
        )
    }

    /// True if the bordered rectangles share any pixel
    pub fn overlaps(&self, other: &FramePlacement) -> bool {
        let (ax, ay, aw, ah) = self.frame_rect();
        let (bx, by, bw, bh) = other.frame_rect();
        ax < bx + bw && bx < ax + aw && ay < by + bh && by < ay + ah
    }
}

/// Lays out processed photos on the strip canvas
#[derive(Debug, Clone)]
pub struct StripComposer {
    config: StripConfig,
}

impl StripComposer {
    pub fn new(config: StripConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StripConfig {
        &self.config
    }

    /// Placement of a `width`x`height` photo in slot `index`
    pub fn placement(
        &self,
        index: u32,
        sequence: u32,
        width: u32,
        height: u32,
    ) -> Result<FramePlacement, ComposeError> {
        let c = &self.config;
        if width > c.photo_width || height > c.photo_height {
            return Err(ComposeError::Oversized {
                sequence,
                width,
                height,
                box_width: c.photo_width,
                box_height: c.photo_height,
            });
        }

        let frame_width = width + 2 * c.border_width;
        let frame_x = c.width.saturating_sub(frame_width) / 2;
        let frame_y = c.top_margin + index * (c.photo_height + c.padding);

        Ok(FramePlacement {
            sequence,
            x: frame_x + c.border_width,
            y: frame_y + c.border_width,
            width,
            height,
            border: c.border_width,
        })
    }

    /// Compose `photos` (already in ascending sequence order) onto a new canvas
    pub fn compose(
        &self,
        photos: &[(u32, GrayImage)],
    ) -> Result<(GrayImage, Vec<FramePlacement>), ComposeError> {
        let c = &self.config;
        let count = photos.len() as u32;
        let needed = constants::required_strip_height(
            count,
            c.top_margin,
            c.photo_height,
            c.padding,
            c.border_width,
        )
        .unwrap_or(u32::MAX);
        if needed > c.height {
            return Err(ComposeError::CanvasOverflow {
                count,
                needed,
                height: c.height,
            });
        }

        let mut canvas = GrayImage::from_pixel(c.width, c.height, Luma([c.background_luma]));
        let mut placements = Vec::with_capacity(photos.len());

        for (index, (sequence, photo)) in photos.iter().enumerate() {
            let placement = self.placement(index as u32, *sequence, photo.width(), photo.height())?;

            if placement.border > 0 {
                let (fx, fy, fw, fh) = placement.frame_rect();
                let frame = GrayImage::from_pixel(fw, fh, Luma([c.border_luma]));
                imageops::replace(&mut canvas, &frame, fx as i64, fy as i64);
            }
            imageops::replace(&mut canvas, photo, placement.x as i64, placement.y as i64);

            debug!(
                sequence,
                x = placement.x,
                y = placement.y,
                width = placement.width,
                height = placement.height,
                "Placed photo on strip"
            );
            placements.push(placement);
        }

        Ok((canvas, placements))
    }
}
