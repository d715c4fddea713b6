// src/preprocessing.rs

use crate::letterbox::Letterbox;
use crate::tensor::InputTensor;
use crate::types::Frame;
use anyhow::{ensure, Result};

/// Gray fill used for the letterbox margins, matching training-time padding.
const PAD_FILL: u8 = 114;

/// Resize an RGBA frame into the letterboxed square canvas and emit the
/// normalized channel-first network input ([1, 3, target, target], /255).
pub fn letterbox_to_tensor(frame: &Frame, letterbox: &Letterbox) -> Result<InputTensor> {
    let target = letterbox.target as usize;
    let expected = frame.width as usize * frame.height as usize * 4;
    ensure!(
        frame.data.len() == expected,
        "frame buffer is {} bytes, expected {} for {}x{} RGBA",
        frame.data.len(),
        expected,
        frame.width,
        frame.height
    );

    let resized = resize_bilinear_rgba(
        &frame.data,
        frame.width as usize,
        frame.height as usize,
        letterbox.resized_w as usize,
        letterbox.resized_h as usize,
    );

    // Paste the resized image onto the gray canvas at the pad offset.
    let mut canvas = vec![PAD_FILL; target * target * 3];
    let pad_x = letterbox.pad_x as usize;
    let pad_y = letterbox.pad_y as usize;
    let resized_w = letterbox.resized_w as usize;
    let resized_h = letterbox.resized_h as usize;

    for y in 0..resized_h {
        let dst_y = y + pad_y;
        if dst_y >= target {
            break;
        }
        for x in 0..resized_w {
            let dst_x = x + pad_x;
            if dst_x >= target {
                break;
            }
            let src_idx = (y * resized_w + x) * 4;
            let dst_idx = (dst_y * target + dst_x) * 3;
            canvas[dst_idx] = resized[src_idx];
            canvas[dst_idx + 1] = resized[src_idx + 1];
            canvas[dst_idx + 2] = resized[src_idx + 2];
        }
    }

    // HWC -> CHW, [0, 255] -> [0, 1]
    let mut input = vec![0.0f32; 3 * target * target];
    for c in 0..3 {
        for y in 0..target {
            for x in 0..target {
                let hwc_idx = (y * target + x) * 3 + c;
                let chw_idx = c * target * target + y * target + x;
                input[chw_idx] = canvas[hwc_idx] as f32 / 255.0;
            }
        }
    }

    Ok(InputTensor::new(input, letterbox.target))
}

/// Mirror an RGBA frame around its vertical axis for the flipped pass.
pub fn flip_horizontal(frame: &Frame) -> Frame {
    let w = frame.width as usize;
    let h = frame.height as usize;
    let mut flipped = vec![0u8; frame.data.len()];

    for y in 0..h {
        for x in 0..w {
            let src = (y * w + x) * 4;
            let dst = (y * w + (w - 1 - x)) * 4;
            flipped[dst..dst + 4].copy_from_slice(&frame.data[src..src + 4]);
        }
    }

    Frame::new(flipped, frame.width, frame.height)
}

/// Bilinear RGBA resize. Alpha is carried through untouched and ignored by
/// the tensor conversion.
fn resize_bilinear_rgba(src: &[u8], src_w: usize, src_h: usize, dst_w: usize, dst_h: usize) -> Vec<u8> {
    let mut dst = vec![0u8; dst_h * dst_w * 4];
    let x_ratio = src_w as f32 / dst_w as f32;
    let y_ratio = src_h as f32 / dst_h as f32;

    for dy in 0..dst_h {
        for dx in 0..dst_w {
            let sx = dx as f32 * x_ratio;
            let sy = dy as f32 * y_ratio;
            let sx0 = (sx.floor() as usize).min(src_w - 1);
            let sy0 = (sy.floor() as usize).min(src_h - 1);
            let sx1 = (sx0 + 1).min(src_w - 1);
            let sy1 = (sy0 + 1).min(src_h - 1);
            let fx = sx - sx0 as f32;
            let fy = sy - sy0 as f32;

            for c in 0..4 {
                let p00 = src[(sy0 * src_w + sx0) * 4 + c] as f32;
                let p10 = src[(sy0 * src_w + sx1) * 4 + c] as f32;
                let p01 = src[(sy1 * src_w + sx0) * 4 + c] as f32;
                let p11 = src[(sy1 * src_w + sx1) * 4 + c] as f32;

                let val = p00 * (1.0 - fx) * (1.0 - fy)
                    + p10 * fx * (1.0 - fy)
                    + p01 * (1.0 - fx) * fy
                    + p11 * fx * fy;

                dst[(dy * dst_w + dx) * 4 + c] = val.round() as u8;
            }
        }
    }
    dst
}
