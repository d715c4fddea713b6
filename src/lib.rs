//! Face detection core for client-side photo redaction.
//!
//! Recovers face bounding boxes in original-image pixel coordinates from a
//! DFL-encoded detector head (strides 8/16/32 over a square input), with
//! optional horizontal-flip test-time augmentation and cross-pass fusion.

pub mod anchors;
mod config;
pub mod decoder;
pub mod detector;
pub mod fusion;
pub mod inference;
pub mod letterbox;
pub mod model;
pub mod postprocess;
pub mod preprocessing;
pub mod tensor;
pub mod types;

pub use detector::FaceDetector;
pub use fusion::{fuse, FUSION_IOU_THRESHOLD};
pub use inference::{InferenceSession, OrtSession};
pub use letterbox::Letterbox;
pub use model::{ModelLoader, OrtSessionFactory, SessionFactory};
pub use postprocess::decode_yolo_output;
pub use tensor::{InputTensor, OutputTensor};
pub use types::{Config, FaceBox, Frame};
