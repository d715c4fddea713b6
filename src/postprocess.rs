// src/postprocess.rs
//
// Walks the flattened detection head, decodes DFL rows into network-space
// boxes, and maps survivors back to original-image coordinates.

use crate::anchors::AnchorPoints;
use crate::decoder::{decode_row, sigmoid};
use crate::letterbox::Letterbox;
use crate::tensor::OutputTensor;
use crate::types::{Config, FaceBox};
use anyhow::Result;
use tracing::debug;

/// Decode one raw output tensor (normal orientation) into face boxes in
/// original-image pixels. Pure and synchronous.
pub fn decode_yolo_output(
    output: &OutputTensor,
    letterbox: &Letterbox,
    orig_w: u32,
    orig_h: u32,
    score_threshold: f32,
    config: &Config,
) -> Result<Vec<FaceBox>> {
    decode_pass(
        output,
        letterbox,
        orig_w,
        orig_h,
        score_threshold,
        config,
        false,
    )
}

/// One full decode pass over the pyramid. `flipped` marks tensors produced
/// from the horizontally mirrored input.
pub(crate) fn decode_pass(
    output: &OutputTensor,
    letterbox: &Letterbox,
    orig_w: u32,
    _orig_h: u32,
    score_threshold: f32,
    config: &Config,
    flipped: bool,
) -> Result<Vec<FaceBox>> {
    let (_rows, width) = output.validate_head(letterbox.target, config.model.reg_max)?;
    let min_side = config.detection.prefilter_min_side_ratio * letterbox.target as f32;

    let mut boxes = Vec::new();

    for (index, anchor) in AnchorPoints::new(letterbox.target).enumerate() {
        let row = output.row(index, width);

        // The score logit sits after the distribution bins; screening on it
        // first skips the softmax work for the vast majority of rows.
        let score = sigmoid(row[width - 1]);
        if score <= score_threshold {
            continue;
        }

        let distances = decode_row(row, config.model.reg_max);
        let stride = anchor.stride as f32;
        let (cx, cy) = anchor.center();

        let x0 = cx - distances.l * stride;
        let y0 = cy - distances.t * stride;
        let x1 = cx + distances.r * stride;
        let y1 = cy + distances.b * stride;

        if min_side > 0.0 && (x1 - x0).max(y1 - y0) < min_side {
            continue;
        }

        if let Some(face) = unmap_box((x0, y0, x1, y1), letterbox, flipped, orig_w, score) {
            boxes.push(face);
        }
    }

    debug!(
        "decoded {} candidate box(es) ({} pass)",
        boxes.len(),
        if flipped { "flipped" } else { "normal" }
    );

    Ok(boxes)
}

/// Map a network-space box back to original-image pixels, mirroring for the
/// flipped pass. Degenerate or non-finite boxes map to `None`.
pub(crate) fn unmap_box(
    corners: (f32, f32, f32, f32),
    letterbox: &Letterbox,
    flipped: bool,
    orig_w: u32,
    score: f32,
) -> Option<FaceBox> {
    let (nx0, ny0, nx1, ny1) = corners;

    let mut x0 = (nx0 - letterbox.pad_x) / letterbox.scale;
    let mut x1 = (nx1 - letterbox.pad_x) / letterbox.scale;
    let y0 = (ny0 - letterbox.pad_y) / letterbox.scale;
    let y1 = (ny1 - letterbox.pad_y) / letterbox.scale;

    if flipped {
        let (mx0, mx1) = (orig_w as f32 - x1, orig_w as f32 - x0);
        x0 = mx0.min(mx1);
        x1 = mx0.max(mx1);
    }

    let w = x1 - x0;
    let h = y1 - y0;
    if !(x0.is_finite() && y0.is_finite() && w.is_finite() && h.is_finite()) {
        return None;
    }
    if w <= 0.0 || h <= 0.0 {
        return None;
    }

    Some(FaceBox {
        x: x0,
        y: y0,
        w,
        h,
        score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DetectionConfig, ModelConfig};

    fn small_head_config() -> Config {
        Config {
            model: ModelConfig {
                reg_max: 4,
                input_size: 32,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// 21 rows x 17 cols, every score logit strongly negative.
    fn quiet_tensor() -> Vec<f32> {
        let mut data = vec![0.0f32; 21 * 17];
        for row in 0..21 {
            data[row * 17 + 16] = -10.0;
        }
        data
    }

    /// Activate one row: one-hot l,t at bin 0; r,b at bin 1; score logit 6.
    fn activate_row(data: &mut [f32], row: usize) {
        let base = row * 17;
        data[base] = 8.0;
        data[base + 4] = 8.0;
        data[base + 8 + 1] = 8.0;
        data[base + 12 + 1] = 8.0;
        data[base + 16] = 6.0;
    }

    #[test]
    fn test_single_active_anchor_yields_one_box() {
        let config = small_head_config();
        let mut data = quiet_tensor();
        activate_row(&mut data, 0);
        let output = OutputTensor::new(data, vec![1, 21, 17]);
        let lb = Letterbox::compute(32, 32, 32, 0.0, 0.0).unwrap();

        let boxes = decode_yolo_output(&output, &lb, 32, 32, 0.5, &config).unwrap();
        assert_eq!(boxes.len(), 1);

        let face = boxes[0];
        assert!(face.score > 0.9);
        assert!(face.w > 0.0 && face.h > 0.0);
        // Anchor (0,0) at stride 8 centers on (4,4); l,t ~ 0, r,b ~ 8px.
        assert!((face.x - 4.0).abs() < 0.2);
        assert!((face.y - 4.0).abs() < 0.2);
        assert!((face.w - 8.0).abs() < 0.3);
        assert!((face.h - 8.0).abs() < 0.3);
    }

    #[test]
    fn test_score_matches_sigmoid_of_logit() {
        let config = small_head_config();
        let mut data = quiet_tensor();
        activate_row(&mut data, 5);
        let output = OutputTensor::new(data, vec![21, 17]);
        let lb = Letterbox::compute(32, 32, 32, 0.0, 0.0).unwrap();

        let boxes = decode_yolo_output(&output, &lb, 32, 32, 0.5, &config).unwrap();
        assert_eq!(boxes.len(), 1);
        assert!((boxes[0].score - sigmoid(6.0)).abs() < 1e-6);
    }

    #[test]
    fn test_quiet_tensor_returns_empty() {
        let config = small_head_config();
        let output = OutputTensor::new(quiet_tensor(), vec![1, 21, 17]);
        let lb = Letterbox::compute(32, 32, 32, 0.0, 0.0).unwrap();

        let boxes = decode_yolo_output(&output, &lb, 32, 32, 0.5, &config).unwrap();
        assert!(boxes.is_empty());
    }

    #[test]
    fn test_prefilter_drops_small_boxes() {
        let mut config = small_head_config();
        config.detection = DetectionConfig {
            prefilter_min_side_ratio: 0.5, // 16px at target 32
            ..Default::default()
        };
        let mut data = quiet_tensor();
        activate_row(&mut data, 0); // ~8px box
        let output = OutputTensor::new(data, vec![1, 21, 17]);
        let lb = Letterbox::compute(32, 32, 32, 0.0, 0.0).unwrap();

        let boxes = decode_yolo_output(&output, &lb, 32, 32, 0.5, &config).unwrap();
        assert!(boxes.is_empty());
    }

    #[test]
    fn test_dims_mismatch_is_fatal() {
        let config = small_head_config();
        let output = OutputTensor::new(vec![0.0; 20 * 17], vec![1, 20, 17]);
        let lb = Letterbox::compute(32, 32, 32, 0.0, 0.0).unwrap();

        assert!(decode_yolo_output(&output, &lb, 32, 32, 0.5, &config).is_err());
    }

    #[test]
    fn test_non_finite_box_dropped_silently() {
        let config = small_head_config();
        let mut data = quiet_tensor();
        activate_row(&mut data, 0);
        data[0] = f32::INFINITY; // poisons the l expectation
        let output = OutputTensor::new(data, vec![1, 21, 17]);
        let lb = Letterbox::compute(32, 32, 32, 0.0, 0.0).unwrap();

        let boxes = decode_yolo_output(&output, &lb, 32, 32, 0.5, &config).unwrap();
        assert!(boxes.is_empty());
    }

    #[test]
    fn test_unmap_inverts_scale_and_padding() {
        let lb = Letterbox {
            target: 16,
            scale: 0.5,
            pad_x: 4.0,
            pad_y: 2.0,
            resized_w: 8,
            resized_h: 8,
        };
        let face = unmap_box((6.0, 4.0, 10.0, 8.0), &lb, false, 100, 0.9).unwrap();
        assert!((face.x - 4.0).abs() < 1e-5);
        assert!((face.y - 4.0).abs() < 1e-5);
        assert!((face.w - 8.0).abs() < 1e-5);
        assert!((face.h - 8.0).abs() < 1e-5);
    }

    #[test]
    fn test_unmap_mirrors_flipped_pass() {
        let lb = Letterbox {
            target: 16,
            scale: 0.5,
            pad_x: 4.0,
            pad_y: 2.0,
            resized_w: 8,
            resized_h: 8,
        };
        // Maps to [4, 12] unflipped; mirrored around orig_w=100 -> [88, 96].
        let face = unmap_box((6.0, 4.0, 10.0, 8.0), &lb, true, 100, 0.9).unwrap();
        assert!((face.x - 88.0).abs() < 1e-4);
        assert!((face.x + face.w - 96.0).abs() < 1e-4);
    }

    #[test]
    fn test_unmap_drops_degenerate_boxes() {
        let lb = Letterbox {
            target: 16,
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
            resized_w: 16,
            resized_h: 16,
        };
        assert!(unmap_box((10.0, 4.0, 10.0, 8.0), &lb, false, 100, 0.9).is_none());
        assert!(unmap_box((12.0, 4.0, 10.0, 8.0), &lb, false, 100, 0.9).is_none());
    }
}
