// src/types.rs

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub photos: PhotoConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model location: an http(s) URL fetched at startup, or a local path.
    #[serde(default = "default_model_url")]
    pub url: String,
    /// Square network input resolution (pixels).
    #[serde(default = "default_input_size")]
    pub input_size: u32,
    /// Number of distribution bins per box side in the detection head.
    #[serde(default = "default_reg_max")]
    pub reg_max: usize,
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,
    /// IoU above which overlapping candidates collapse into one box.
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,
    /// Minimum box side as a fraction of the network input; 0 disables.
    #[serde(default)]
    pub prefilter_min_side_ratio: f32,
    /// Letterbox pad bias constants, as fractions of the pad budget.
    #[serde(default)]
    pub pad_small_side: f32,
    #[serde(default)]
    pub pad_large_side: f32,
    /// Run a second, horizontally flipped inference pass and fuse both.
    #[serde(default)]
    pub tta_flip: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoConfig {
    #[serde(default = "default_input_dir")]
    pub input_dir: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Write a pixelated copy of each photo next to the JSONL results.
    #[serde(default)]
    pub save_redacted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_model_url() -> String {
    "models/face_det.onnx".to_string()
}

fn default_input_size() -> u32 {
    640
}

fn default_reg_max() -> usize {
    16
}

fn default_num_threads() -> usize {
    4
}

fn default_score_threshold() -> f32 {
    0.5
}

fn default_iou_threshold() -> f32 {
    crate::fusion::FUSION_IOU_THRESHOLD
}

fn default_input_dir() -> String {
    "photos".to_string()
}

fn default_output_dir() -> String {
    "output".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            url: default_model_url(),
            input_size: default_input_size(),
            reg_max: default_reg_max(),
            num_threads: default_num_threads(),
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            score_threshold: default_score_threshold(),
            iou_threshold: default_iou_threshold(),
            prefilter_min_side_ratio: 0.0,
            pad_small_side: 0.0,
            pad_large_side: 0.0,
            tta_flip: false,
        }
    }
}

impl Default for PhotoConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
            save_redacted: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// A decoded photo: tightly packed RGBA rows.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * 4);
        Self {
            data,
            width,
            height,
        }
    }
}

/// A detected face in original-image pixel coordinates.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub score: f32,
}
