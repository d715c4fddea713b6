// src/letterbox.rs

use anyhow::{ensure, Result};

/// Geometry of the resize-and-pad transform mapping an arbitrary W×H photo
/// into the fixed square network input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub target: u32,
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub resized_w: u32,
    pub resized_h: u32,
}

impl Letterbox {
    /// Compute scale and padding for fitting `orig_w`×`orig_h` inside a
    /// `target`×`target` canvas, aspect ratio preserved.
    ///
    /// `pad_small_side` / `pad_large_side` shift the leading pad of the
    /// padded axis as fractions of the pad budget; 0/0 centers the image.
    pub fn compute(
        orig_w: u32,
        orig_h: u32,
        target: u32,
        pad_small_side: f32,
        pad_large_side: f32,
    ) -> Result<Self> {
        ensure!(target > 0, "network input size must be positive");
        ensure!(
            orig_w > 0 && orig_h > 0,
            "image dimensions must be positive, got {}x{}",
            orig_w,
            orig_h
        );

        let scale = target as f32 / orig_w.max(orig_h) as f32;
        let resized_w = ((orig_w as f32 * scale).round() as u32).min(target);
        let resized_h = ((orig_h as f32 * scale).round() as u32).min(target);

        // Leading pad fraction of the budget; bias pushes the image off
        // center along the padded axis (always the smaller dimension).
        let fraction = (0.5 + pad_small_side - pad_large_side).clamp(0.0, 1.0);
        let pad_x = (((target - resized_w) as f32) * fraction).floor().max(0.0);
        let pad_y = (((target - resized_h) as f32) * fraction).floor().max(0.0);

        Ok(Self {
            target,
            scale,
            pad_x,
            pad_y,
            resized_w,
            resized_h,
        })
    }
}
